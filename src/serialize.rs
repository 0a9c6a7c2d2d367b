//! Canonical binary serialization
//!
//! Little-endian integers and compact-size length prefixes, as used on the
//! wire and in the coin database. The `(outpoint, coin)` record layout here is
//! the one hashed by the UTXO statistics engine and written to snapshots.

use crate::constants::MAX_SIZE;
use crate::error::{ConsensusError, Result};
use crate::types::{
    Block, BlockHeader, ByteString, Coin, Hash, OutPoint, Transaction, TransactionOutput,
};
use bitcoin_hashes::{sha256, sha256d, Hash as BitcoinHash, HashEngine};
use std::io::Read;

/// Marker byte introducing the extended (witness-carrying) transaction format
const EXTENDED_FORMAT_MARKER: u8 = 0xff;

/// Append a compact-size integer
pub fn write_compact_size(buf: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        buf.push(value as u8);
    } else if value <= 0xffff {
        buf.push(0xfd);
        buf.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        buf.push(0xfe);
        buf.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        buf.push(0xff);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

/// Read a compact-size integer, rejecting non-canonical encodings and
/// values above `MAX_SIZE`
pub fn read_compact_size<R: Read>(reader: &mut R) -> Result<u64> {
    let prefix = read_u8(reader)?;
    let (value, min) = match prefix {
        0xfd => (u16::from_le_bytes(read_array(reader)?) as u64, 0xfd),
        0xfe => (u32::from_le_bytes(read_array(reader)?) as u64, 0x1_0000),
        0xff => (u64::from_le_bytes(read_array(reader)?), 0x1_0000_0000),
        n => (n as u64, 0),
    };
    if value < min {
        return Err(ConsensusError::Serialization(format!(
            "non-canonical compact size {value}"
        )));
    }
    if value > MAX_SIZE {
        return Err(ConsensusError::Serialization(format!(
            "compact size {value} exceeds maximum"
        )));
    }
    Ok(value)
}

pub fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    Ok(read_array::<R, 1>(reader)?[0])
}

pub fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_compact_size(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

pub fn read_bytes<R: Read>(reader: &mut R) -> Result<ByteString> {
    let len = read_compact_size(reader)? as usize;
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    Ok(data)
}

pub fn write_outpoint(buf: &mut Vec<u8>, outpoint: &OutPoint) {
    buf.extend_from_slice(&outpoint.hash);
    buf.extend_from_slice(&outpoint.index.to_le_bytes());
}

pub fn read_outpoint<R: Read>(reader: &mut R) -> Result<OutPoint> {
    let hash = read_array(reader)?;
    let index = u32::from_le_bytes(read_array(reader)?);
    Ok(OutPoint { hash, index })
}

pub fn write_tx_out(buf: &mut Vec<u8>, output: &TransactionOutput) {
    buf.extend_from_slice(&output.value.to_le_bytes());
    write_bytes(buf, &output.script_pubkey);
}

pub fn read_tx_out<R: Read>(reader: &mut R) -> Result<TransactionOutput> {
    let value = i64::from_le_bytes(read_array(reader)?);
    let script_pubkey = read_bytes(reader)?;
    Ok(TransactionOutput { value, script_pubkey })
}

/// Height and coinbase flag packed as `height << 1 | is_coinbase`
fn coin_code(coin: &Coin) -> u32 {
    (coin.height << 1) | coin.is_coinbase as u32
}

/// Canonical `(outpoint, coin)` record:
/// outpoint ‖ u32 code ‖ i64 value ‖ compact-size script length ‖ script
pub fn tx_out_ser(outpoint: &OutPoint, coin: &Coin) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + 4 + 4 + 8 + 3 + coin.output.script_pubkey.len());
    write_outpoint(&mut buf, outpoint);
    buf.extend_from_slice(&coin_code(coin).to_le_bytes());
    write_tx_out(&mut buf, &coin.output);
    buf
}

/// Read one record written by `tx_out_ser`
pub fn read_outpoint_coin<R: Read>(reader: &mut R) -> Result<(OutPoint, Coin)> {
    let outpoint = read_outpoint(reader)?;
    let code = u32::from_le_bytes(read_array(reader)?);
    let output = read_tx_out(reader)?;
    let coin = Coin::new(output, code >> 1, code & 1 == 1);
    Ok((outpoint, coin))
}

/// The trailing lock height is omitted only for version-1 coinbases
fn has_lock_height(tx: &Transaction) -> bool {
    tx.version != 1 || !tx.is_coinbase()
}

/// Serialize a transaction, optionally in the extended witness format.
///
/// The extended format is only used when some input carries witness data.
pub fn serialize_transaction(tx: &Transaction, include_witness: bool) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(tx.version as u32).to_le_bytes());

    let extended = include_witness && tx.has_witness();
    if extended {
        buf.push(EXTENDED_FORMAT_MARKER);
        buf.push(0x01);
    }

    write_compact_size(&mut buf, tx.inputs.len() as u64);
    for input in &tx.inputs {
        write_outpoint(&mut buf, &input.prevout);
        write_bytes(&mut buf, &input.script_sig);
        buf.extend_from_slice(&(input.sequence as u32).to_le_bytes());
    }

    write_compact_size(&mut buf, tx.outputs.len() as u64);
    for output in &tx.outputs {
        write_tx_out(&mut buf, output);
    }

    if extended {
        for input in &tx.inputs {
            write_compact_size(&mut buf, input.script_witness.len() as u64);
            for item in &input.script_witness {
                write_bytes(&mut buf, item);
            }
        }
    }

    buf.extend_from_slice(&(tx.lock_time as u32).to_le_bytes());
    if has_lock_height(tx) {
        buf.extend_from_slice(&tx.lock_height.to_le_bytes());
    }
    buf
}

/// Double SHA-256
pub fn sha256d(data: &[u8]) -> Hash {
    sha256d::Hash::hash(data).into_inner()
}

/// Transaction id: hash of the serialization without witness data
pub fn compute_txid(tx: &Transaction) -> Hash {
    sha256d(&serialize_transaction(tx, false))
}

/// Witness transaction id: hash of the full serialization
pub fn compute_wtxid(tx: &Transaction) -> Hash {
    sha256d(&serialize_transaction(tx, true))
}

pub fn serialize_block_header(header: &BlockHeader) -> Vec<u8> {
    let mut buf = Vec::with_capacity(80);
    buf.extend_from_slice(&(header.version as i32).to_le_bytes());
    buf.extend_from_slice(&header.prev_block_hash);
    buf.extend_from_slice(&header.merkle_root);
    buf.extend_from_slice(&(header.timestamp as u32).to_le_bytes());
    buf.extend_from_slice(&(header.bits as u32).to_le_bytes());
    buf.extend_from_slice(&(header.nonce as u32).to_le_bytes());
    buf
}

pub fn block_hash(block: &Block) -> Hash {
    sha256d(&serialize_block_header(&block.header))
}

/// Render a hash in the byte-reversed hex form used by RPC
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Incremental double SHA-256 over a stream of records
pub struct HashWriter {
    engine: sha256::HashEngine,
}

impl HashWriter {
    pub fn new() -> Self {
        Self { engine: sha256d::Hash::engine() }
    }

    pub fn write(&mut self, data: &[u8]) {
        self.engine.input(data);
    }

    pub fn finalize(self) -> Hash {
        sha256d::Hash::from_engine(self.engine).into_inner()
    }
}

impl Default for HashWriter {
    fn default() -> Self {
        Self::new()
    }
}
