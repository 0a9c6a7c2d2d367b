//! Freicoin consensus constants

/// Kria per FRC
pub const COIN: i64 = 100_000_000;

/// Maximum money: 21,000,000 FRC in kria.
///
/// This is a sanity bound used by consensus range checks, not the actual
/// money supply.
pub const MAX_MONEY: i64 = 21_000_000 * COIN;

/// Blocks a coinbase output must wait before it can be spent
pub const COINBASE_MATURITY: u32 = 100;

/// Coinbase maturity once the protocol-cleanup rules are active
pub const PROTOCOL_CLEANUP_COINBASE_MATURITY: u32 = 1;

/// Demurrage rate denominator: value decays by 1/2^20 per block
pub const PER_BLOCK_DEMURRAGE_FACTOR: u64 = 1 << 20;

/// Height the inflationary scrip unit is pinned to
pub const SCRIP_EPOCH: i64 = 5_040_000;

/// Maximum public keys assumed for an inaccurately counted CHECKMULTISIG
pub const MAX_PUBKEYS_PER_MULTISIG: u32 = 20;

/// Legacy sigops weigh this much more than witness sigops
pub const WITNESS_SCALE_FACTOR: i64 = 4;

/// Scripts larger than this can never be spent
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Coinbase scriptSig length bounds
pub const MIN_COINBASE_SCRIPT_SIZE: usize = 2;
pub const MAX_COINBASE_SCRIPT_SIZE: usize = 100;

/// Upper bound on any length prefix accepted by the deserializer
pub const MAX_SIZE: u64 = 0x0200_0000;

/// Maximum block weight; also bounds the stripped size of one transaction
pub const MAX_BLOCK_WEIGHT: usize = 4_000_000;

/// Lock times below this are block heights, at or above are UNIX times
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Sequence number of an input that opts out of lock time
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Relative lock time is disabled when this sequence bit is set
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// Relative lock time counts 512-second units when set, blocks otherwise
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;

/// Time-based relative locks are in units of 2^9 seconds
pub const SEQUENCE_LOCKTIME_GRANULARITY: u32 = 9;
