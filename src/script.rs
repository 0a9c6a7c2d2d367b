//! Script parsing for consensus accounting
//!
//! Only the parts of the script language that validation needs outside the
//! interpreter live here: opcode constants, push-operation parsing, template
//! recognition (P2SH, witness programs, unspendable outputs) and signature
//! operation counting. Script execution itself is an external collaborator.

use crate::constants::{MAX_PUBKEYS_PER_MULTISIG, MAX_SCRIPT_SIZE};
use crate::types::ByteString;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_NOP: u8 = 0x61;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DEPTH: u8 = 0x74;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CODESEPARATOR: u8 = 0xab;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;
pub const OP_NOP1: u8 = 0xb0;
pub const OP_NOP10: u8 = 0xb9;

/// One parsed operation: the opcode and, for pushes, the pushed bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Op<'a> {
    pub opcode: u8,
    pub data: &'a [u8],
}

/// A push operation ran past the end of the script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedPush;

/// Iterator over the operations of a script.
///
/// Yields `Err(MalformedPush)` once and then stops if a push is truncated.
pub struct Instructions<'a> {
    script: &'a [u8],
    pc: usize,
    done: bool,
}

impl<'a> Instructions<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self { script, pc: 0, done: false }
    }

    fn read_len(&mut self, width: usize) -> Option<usize> {
        let bytes = self.script.get(self.pc..self.pc + width)?;
        self.pc += width;
        let mut buf = [0u8; 4];
        buf[..width].copy_from_slice(bytes);
        Some(u32::from_le_bytes(buf) as usize)
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = std::result::Result<Op<'a>, MalformedPush>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pc >= self.script.len() {
            return None;
        }
        let opcode = self.script[self.pc];
        self.pc += 1;

        let len = match opcode {
            0x01..=0x4b => Some(opcode as usize),
            OP_PUSHDATA1 => self.read_len(1),
            OP_PUSHDATA2 => self.read_len(2),
            OP_PUSHDATA4 => self.read_len(4),
            _ => return Some(Ok(Op { opcode, data: &[] })),
        };

        let data = len.and_then(|len| {
            let end = self.pc.checked_add(len)?;
            let data = self.script.get(self.pc..end)?;
            self.pc = end;
            Some(data)
        });
        match data {
            Some(data) => Some(Ok(Op { opcode, data })),
            None => {
                self.done = true;
                Some(Err(MalformedPush))
            }
        }
    }
}

/// Decode OP_1..OP_16 to 1..16
pub fn decode_op_n(opcode: u8) -> u32 {
    debug_assert!((OP_1..=OP_16).contains(&opcode));
    (opcode - OP_1 + 1) as u32
}

/// GetSigOpCount: 𝕊 × {accurate, legacy} → ℕ
///
/// CHECKSIG-class opcodes count 1. CHECKMULTISIG-class opcodes count the
/// key total pushed by the immediately preceding OP_1..OP_16 in accurate
/// mode, otherwise MAX_PUBKEYS_PER_MULTISIG. Counting stops at the first
/// malformed push, keeping what was counted so far.
pub fn get_sigop_count(script: &[u8], accurate: bool) -> u32 {
    let mut count = 0u32;
    let mut last_opcode: Option<u8> = None;
    for op in Instructions::new(script) {
        let Ok(op) = op else { break };
        match op.opcode {
            OP_CHECKSIG | OP_CHECKSIGVERIFY => count = count.saturating_add(1),
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                let keys = match last_opcode {
                    Some(prev) if accurate && (OP_1..=OP_16).contains(&prev) => decode_op_n(prev),
                    _ => MAX_PUBKEYS_PER_MULTISIG,
                };
                count = count.saturating_add(keys);
            }
            _ => {}
        }
        last_opcode = Some(op.opcode);
    }
    count
}

/// Sigops of a P2SH redeem script, found as the last push of `script_sig`.
///
/// Returns 0 if the scriptSig is malformed or contains a non-push opcode.
/// For non-P2SH `script_pubkey` this is the accurate count of the
/// scriptPubKey itself.
pub fn get_p2sh_script_sigop_count(script_pubkey: &[u8], script_sig: &[u8]) -> u32 {
    if !is_pay_to_script_hash(script_pubkey) {
        return get_sigop_count(script_pubkey, true);
    }
    match last_push(script_sig) {
        Some(redeem_script) => get_sigop_count(redeem_script, true),
        None => 0,
    }
}

/// Last pushed data of a push-only script, or `None` if the script is
/// malformed or executes anything but pushes.
pub fn last_push(script: &[u8]) -> Option<&[u8]> {
    let mut data: &[u8] = &[];
    for op in Instructions::new(script) {
        let op = op.ok()?;
        if op.opcode > OP_16 {
            return None;
        }
        data = op.data;
    }
    Some(data)
}

/// OP_HASH160 <20 bytes> OP_EQUAL
pub fn is_pay_to_script_hash(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL
}

/// OP_0 followed by a 20- or 32-byte push
pub fn is_pay_to_witness_script_hash(script: &[u8]) -> bool {
    (script.len() == 22 && script[0] == OP_0 && script[1] == 0x14)
        || (script.len() == 34 && script[0] == OP_0 && script[1] == 0x20)
}

/// True if every operation is a push (OP_RESERVED counts as a push)
pub fn is_push_only(script: &[u8]) -> bool {
    Instructions::new(script).all(|op| matches!(op, Ok(op) if op.opcode <= OP_16))
}

/// An output that can never be spent: OP_RETURN prefix or oversized script
pub fn is_unspendable(script: &[u8]) -> bool {
    script.first() == Some(&OP_RETURN) || script.len() > MAX_SCRIPT_SIZE
}

/// A parsed witness program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WitnessProgram<'a> {
    pub version: u8,
    pub program: &'a [u8],
}

/// Recognise a witness program.
///
/// Layout: one version opcode, a 2..=75 byte program push, an optional shard
/// prefix (`0x01 <byte>` or a small-number opcode), and an optional 2..=75
/// byte extension push that must end the script. The version opcode is one
/// of 31 single-byte opcodes, numbered in opcode order.
pub fn witness_program(script: &[u8]) -> Option<WitnessProgram<'_>> {
    if script.len() < 4 || script.len() > 155 {
        return None;
    }
    let push = script[1] as usize;
    if !(2..=75).contains(&push) {
        return None;
    }
    let mut pos = 2 + push;
    if pos > script.len() {
        return None;
    }
    if pos < script.len() {
        match script[pos] {
            0x01 => {
                let prefix = *script.get(pos + 1)?;
                if prefix < 0x10 || prefix == 0x80 {
                    return None;
                }
                pos += 2;
            }
            OP_1NEGATE | OP_1..=OP_16 => pos += 1,
            _ => {}
        }
        if pos != script.len() {
            let ext = script[pos] as usize;
            if !(2..=75).contains(&ext) || pos + 1 + ext != script.len() {
                return None;
            }
        }
    }
    let version = match script[0] {
        OP_0 => 0,
        OP_1NEGATE => 1,
        op @ OP_1..=OP_16 => 2 + op - OP_1,
        OP_NOP => 18,
        OP_DEPTH => 19,
        OP_CODESEPARATOR => 20,
        op @ OP_NOP1..=OP_NOP10 => 21 + op - OP_NOP1,
        _ => return None,
    };
    Some(WitnessProgram { version, program: &script[2..2 + push] })
}

/// Append a minimal push of `data` to `script`
pub fn push_slice(script: &mut ByteString, data: &[u8]) {
    match data.len() {
        len @ 0..=0x4b => script.push(len as u8),
        len @ 0x4c..=0xff => {
            script.push(OP_PUSHDATA1);
            script.push(len as u8);
        }
        len @ 0x100..=0xffff => {
            script.push(OP_PUSHDATA2);
            script.extend_from_slice(&(len as u16).to_le_bytes());
        }
        len => {
            script.push(OP_PUSHDATA4);
            script.extend_from_slice(&(len as u32).to_le_bytes());
        }
    }
    script.extend_from_slice(data);
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let digest = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// scriptPubKey paying to the hash of `redeem_script`
pub fn pay_to_script_hash(redeem_script: &[u8]) -> ByteString {
    let mut script = vec![OP_HASH160];
    push_slice(&mut script, &hash160(redeem_script));
    script.push(OP_EQUAL);
    script
}
