//! Minimal Solidity ABI encoding/decoding for the contract surface.
//!
//! Only the types the attestation contract actually uses are supported:
//! `address`, `uint256` (bounded to u64 on our side), `string`, and
//! `bytes`, plus dynamic tuples in return position. Selectors are derived
//! by hashing the canonical signature string at call time, so a method
//! rename here cannot silently drift from the selector sent on the wire.

use std::fmt;

use crate::codec::keccak256;
use crate::types::{ADDRESS_LEN, Address};

/// 32-byte ABI word size.
const WORD: usize = 32;

/// Error raised when return data does not match the expected layout.
#[derive(Clone, Debug)]
pub struct AbiError(pub String);

impl fmt::Display for AbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "abi decode error: {}", self.0)
    }
}

impl std::error::Error for AbiError {}

/// One encodable argument value.
#[derive(Clone, Debug)]
pub enum Token {
    Address(Address),
    Uint(u64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::Str(_) | Token::Bytes(_))
    }
}

/// 4-byte function selector: first 4 bytes of keccak256 of the canonical
/// signature, e.g. `"mintProductNFT(address,string,string,bytes)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

fn push_uint_word(out: &mut Vec<u8>, value: u64) {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    out.extend_from_slice(&word);
}

fn push_address_word(out: &mut Vec<u8>, addr: &Address) {
    let mut word = [0u8; WORD];
    word[WORD - ADDRESS_LEN..].copy_from_slice(addr.as_bytes());
    out.extend_from_slice(&word);
}

fn push_padded_bytes(out: &mut Vec<u8>, data: &[u8]) {
    push_uint_word(out, data.len() as u64);
    out.extend_from_slice(data);
    let rem = data.len() % WORD;
    if rem != 0 {
        out.extend(std::iter::repeat(0u8).take(WORD - rem));
    }
}

/// Encodes a full calldata payload: selector followed by head/tail
/// encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut head: Vec<u8> = Vec::with_capacity(4 + args.len() * WORD);
    head.extend_from_slice(&selector(signature));

    let head_len = args.len() * WORD;
    let mut tail: Vec<u8> = Vec::new();

    for arg in args {
        match arg {
            Token::Address(addr) => push_address_word(&mut head, addr),
            Token::Uint(v) => push_uint_word(&mut head, *v),
            dynamic => {
                // Offset of this value's tail, relative to the start of
                // the argument block.
                push_uint_word(&mut head, (head_len + tail.len()) as u64);
                match dynamic {
                    Token::Str(s) => push_padded_bytes(&mut tail, s.as_bytes()),
                    Token::Bytes(b) => push_padded_bytes(&mut tail, b),
                    _ => unreachable!("static tokens handled above"),
                }
            }
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Hex form of calldata for JSON-RPC (`0x`-prefixed).
pub fn encode_call_hex(signature: &str, args: &[Token]) -> String {
    format!("0x{}", hex::encode(encode_call(signature, args)))
}

fn word_at(data: &[u8], base: usize, slot: usize) -> Result<&[u8], AbiError> {
    // base comes out of the return data itself and is untrusted.
    let start = slot
        .checked_mul(WORD)
        .and_then(|off| off.checked_add(base))
        .ok_or_else(|| AbiError(format!("slot {slot} at base {base} overflows")))?;
    let end = start
        .checked_add(WORD)
        .ok_or_else(|| AbiError(format!("slot {slot} at base {base} overflows")))?;
    data.get(start..end)
        .ok_or_else(|| AbiError(format!("return data too short for slot {slot} at base {base}")))
}

fn uint_from_word(word: &[u8]) -> Result<u64, AbiError> {
    if word[..WORD - 8].iter().any(|&b| b != 0) {
        return Err(AbiError("uint256 exceeds u64 range".to_string()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(buf))
}

/// Decodes a `uint256` at the given slot (relative to `base`).
pub fn decode_u64(data: &[u8], base: usize, slot: usize) -> Result<u64, AbiError> {
    uint_from_word(word_at(data, base, slot)?)
}

/// Decodes a `bool` at the given slot.
pub fn decode_bool(data: &[u8], base: usize, slot: usize) -> Result<bool, AbiError> {
    Ok(decode_u64(data, base, slot)? != 0)
}

/// Decodes an `address` at the given slot.
pub fn decode_address(data: &[u8], base: usize, slot: usize) -> Result<Address, AbiError> {
    let word = word_at(data, base, slot)?;
    if word[..WORD - ADDRESS_LEN].iter().any(|&b| b != 0) {
        return Err(AbiError("address word has nonzero padding".to_string()));
    }
    let mut addr = [0u8; ADDRESS_LEN];
    addr.copy_from_slice(&word[WORD - ADDRESS_LEN..]);
    Ok(Address(addr))
}

/// Decodes dynamic `bytes` whose offset word sits at `slot` relative to
/// `base`; the offset itself is also relative to `base`.
pub fn decode_bytes(data: &[u8], base: usize, slot: usize) -> Result<Vec<u8>, AbiError> {
    // Offset and length words are untrusted; all position arithmetic is
    // checked so hostile values yield an error rather than a wrap.
    let offset = decode_u64(data, base, slot)? as usize;
    let len_pos = base
        .checked_add(offset)
        .ok_or_else(|| AbiError("dynamic offset overflows".to_string()))?;
    let len_end = len_pos
        .checked_add(WORD)
        .ok_or_else(|| AbiError("dynamic offset overflows".to_string()))?;
    let len = uint_from_word(
        data.get(len_pos..len_end)
            .ok_or_else(|| AbiError("dynamic offset past end of data".to_string()))?,
    )? as usize;
    let end = len_end
        .checked_add(len)
        .ok_or_else(|| AbiError("dynamic length overflows".to_string()))?;
    data.get(len_end..end)
        .map(|b| b.to_vec())
        .ok_or_else(|| AbiError("dynamic payload truncated".to_string()))
}

/// Decodes a `string` (UTF-8 validated) at the given slot.
pub fn decode_string(data: &[u8], base: usize, slot: usize) -> Result<String, AbiError> {
    let bytes = decode_bytes(data, base, slot)?;
    String::from_utf8(bytes).map_err(|e| AbiError(format!("string is not UTF-8: {e}")))
}

/// Resolves the absolute base of a dynamic tuple returned at `slot`.
pub fn tuple_base(data: &[u8], slot: usize) -> Result<usize, AbiError> {
    Ok(decode_u64(data, 0, slot)? as usize)
}
