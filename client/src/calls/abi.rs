use alloy_primitives::{keccak256, Address, Bytes, U256};

use crate::error::ReadError;

/// Selector of the standard `Error(string)` revert payload.
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

const WORD: usize = 32;

/// A single static ABI argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Address(Address),
    Uint(U256),
}

impl Arg {
    fn to_word(self) -> [u8; WORD] {
        match self {
            Arg::Address(address) => address.into_word().0,
            Arg::Uint(value) => value.to_be_bytes::<WORD>(),
        }
    }
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Selector followed by one 32-byte word per argument.
pub fn encode_call(signature: &str, args: &[Arg]) -> Bytes {
    let mut data = Vec::with_capacity(4 + WORD * args.len());
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    data.into()
}

fn word(data: &[u8], index: usize) -> Result<&[u8], ReadError> {
    let start = index * WORD;
    data.get(start..start + WORD).ok_or_else(|| {
        ReadError::Decode(format!(
            "expected at least {} bytes, got {}",
            start + WORD,
            data.len()
        ))
    })
}

pub fn decode_uint(data: &[u8], index: usize) -> Result<U256, ReadError> {
    Ok(U256::from_be_slice(word(data, index)?))
}

pub fn decode_bool(data: &[u8], index: usize) -> Result<bool, ReadError> {
    let value = decode_uint(data, index)?;
    if value.is_zero() {
        Ok(false)
    } else if value == U256::from(1) {
        Ok(true)
    } else {
        Err(ReadError::Decode(format!("{value} is not a bool")))
    }
}

pub fn decode_address(data: &[u8], index: usize) -> Result<Address, ReadError> {
    let word = word(data, index)?;
    if word[..12].iter().any(|b| *b != 0) {
        return Err(ReadError::Decode("address word has dirty high bytes".to_string()));
    }
    Ok(Address::from_slice(&word[12..]))
}

/// Extract the message of an `Error(string)` revert, if that is what `data` holds.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    let offset = usize::try_from(decode_uint(body, 0).ok()?).ok()?;
    let start = offset.checked_add(WORD)?;
    let len_word = body.get(offset..start)?;
    let len = usize::try_from(U256::from_be_slice(len_word)).ok()?;
    let raw = body.get(start..start.checked_add(len)?)?;
    String::from_utf8(raw.to_vec()).ok()
}
