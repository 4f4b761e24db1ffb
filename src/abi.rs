//! Minimal ABI encoding/decoding for the view-function surface this crate
//! consumes. Calls carry only static arguments; returns cover scalars,
//! static tuples with trailing dynamic strings, and arrays of tuples.
//! Decoding works against a closed set of known shapes; a mismatch is an
//! `AbiError`, which callers use as the probe signal when a contract does
//! not expose the attempted accessor.

use alloy_primitives::{keccak256, Address, U256};

#[derive(Debug, Clone)]
pub struct AbiError(pub String);

impl std::fmt::Display for AbiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "abi error: {}", self.0)
    }
}

impl std::error::Error for AbiError {}

/// Call argument. Everything the staking/NFT/pair surface takes is a
/// single static word.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Address(Address),
    Uint(U256),
    U8(u8),
}

/// Return value type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    Uint,
    Address,
    Bool,
    Str,
    Tuple(Vec<ParamType>),
    Array(Box<ParamType>),
}

/// Decoded return value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint(U256),
    Address(Address),
    Bool(bool),
    Str(String),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_uint().map(|v| v.saturating_to::<u64>())
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(vs) => Some(vs),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(vs) => Some(vs),
            _ => None,
        }
    }
}

/// First four bytes of keccak256 over the canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Build calldata: selector followed by one 32-byte word per argument.
pub fn encode_call(signature: &str, args: &[Arg]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * 32);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        let word: [u8; 32] = match arg {
            Arg::Address(a) => {
                let mut w = [0u8; 32];
                w[12..].copy_from_slice(a.as_slice());
                w
            }
            Arg::Uint(v) => v.to_be_bytes::<32>(),
            Arg::U8(v) => U256::from(*v).to_be_bytes::<32>(),
        };
        data.extend_from_slice(&word);
    }
    data
}

/// Decode return data against the expected output types.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Value>, AbiError> {
    if data.is_empty() && !types.is_empty() {
        return Err(AbiError("empty return data".to_string()));
    }
    decode_params(types, data, 0)
}

fn is_dynamic(ty: &ParamType) -> bool {
    match ty {
        ParamType::Str | ParamType::Array(_) => true,
        ParamType::Tuple(fields) => fields.iter().any(is_dynamic),
        _ => false,
    }
}

fn head_words(ty: &ParamType) -> usize {
    if is_dynamic(ty) {
        return 1;
    }
    match ty {
        ParamType::Tuple(fields) => fields.iter().map(head_words).sum(),
        _ => 1,
    }
}

fn word(data: &[u8], at: usize) -> Result<&[u8], AbiError> {
    data.get(at..at + 32)
        .ok_or_else(|| AbiError(format!("truncated data at offset {}", at)))
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, AbiError> {
    let v = U256::from_be_slice(word(data, at)?);
    if v > U256::from(usize::MAX) {
        return Err(AbiError("offset/length exceeds usize".to_string()));
    }
    Ok(v.saturating_to::<usize>())
}

fn decode_params(types: &[ParamType], data: &[u8], base: usize) -> Result<Vec<Value>, AbiError> {
    let mut out = Vec::with_capacity(types.len());
    let mut cursor = base;
    for ty in types {
        if is_dynamic(ty) {
            let ptr = read_usize(data, cursor)?;
            out.push(decode_dynamic(ty, data, base + ptr)?);
        } else {
            out.push(decode_static(ty, data, cursor)?);
        }
        cursor += head_words(ty) * 32;
    }
    Ok(out)
}

fn decode_static(ty: &ParamType, data: &[u8], at: usize) -> Result<Value, AbiError> {
    match ty {
        ParamType::Uint => Ok(Value::Uint(U256::from_be_slice(word(data, at)?))),
        ParamType::Address => {
            let w = word(data, at)?;
            Ok(Value::Address(Address::from_slice(&w[12..])))
        }
        ParamType::Bool => Ok(Value::Bool(word(data, at)?[31] != 0)),
        ParamType::Tuple(fields) => {
            let mut vals = Vec::with_capacity(fields.len());
            let mut cursor = at;
            for field in fields {
                vals.push(decode_static(field, data, cursor)?);
                cursor += head_words(field) * 32;
            }
            Ok(Value::Tuple(vals))
        }
        _ => Err(AbiError("dynamic type in static position".to_string())),
    }
}

fn decode_dynamic(ty: &ParamType, data: &[u8], at: usize) -> Result<Value, AbiError> {
    match ty {
        ParamType::Str => {
            let len = read_usize(data, at)?;
            let bytes = data
                .get(at + 32..at + 32 + len)
                .ok_or_else(|| AbiError("truncated string".to_string()))?;
            Ok(Value::Str(String::from_utf8_lossy(bytes).into_owned()))
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, at)?;
            let elem_types = vec![(**inner).clone(); len];
            let elems = decode_params(&elem_types, data, at + 32)?;
            Ok(Value::Array(elems))
        }
        ParamType::Tuple(fields) => Ok(Value::Tuple(decode_params(fields, data, at)?)),
        _ => Err(AbiError("static type in dynamic position".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint_word(v: u64) -> [u8; 32] {
        U256::from(v).to_be_bytes::<32>()
    }

    #[test]
    fn selector_matches_known_signature() {
        // balanceOf(address) is the canonical ERC20 selector 0x70a08231.
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn encodes_address_and_uint_args() {
        let owner = Address::repeat_byte(0x11);
        let data = encode_call("allowance(address,address)", &[
            Arg::Address(owner),
            Arg::Address(Address::repeat_byte(0x22)),
        ]);
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[16..36], owner.as_slice());
    }

    #[test]
    fn decodes_scalar_returns() {
        let mut data = Vec::new();
        data.extend_from_slice(&uint_word(42));
        let vals = decode(&[ParamType::Uint], &data).unwrap();
        assert_eq!(vals[0].as_u64(), Some(42));
    }

    #[test]
    fn decodes_string_return() {
        // offset 0x20, len 4, "VATO" padded.
        let mut data = Vec::new();
        data.extend_from_slice(&uint_word(32));
        data.extend_from_slice(&uint_word(4));
        let mut text = [0u8; 32];
        text[..4].copy_from_slice(b"VATO");
        data.extend_from_slice(&text);
        let vals = decode(&[ParamType::Str], &data).unwrap();
        assert_eq!(vals[0].as_str(), Some("VATO"));
    }

    #[test]
    fn decodes_array_of_static_tuples() {
        // stakesOf-style return: (uint256,uint64,uint64,uint8,bool)[] with
        // two entries.
        let tuple = ParamType::Tuple(vec![
            ParamType::Uint,
            ParamType::Uint,
            ParamType::Uint,
            ParamType::Uint,
            ParamType::Bool,
        ]);
        let mut data = Vec::new();
        data.extend_from_slice(&uint_word(32)); // offset to array
        data.extend_from_slice(&uint_word(2)); // length
        for (amount, active) in [(1000u64, 1u64), (2000, 0)] {
            data.extend_from_slice(&uint_word(amount));
            data.extend_from_slice(&uint_word(1_700_000_000));
            data.extend_from_slice(&uint_word(1_700_000_000));
            data.extend_from_slice(&uint_word(1));
            data.extend_from_slice(&uint_word(active));
        }
        let vals = decode(&[ParamType::Array(Box::new(tuple))], &data).unwrap();
        let arr = vals[0].as_array().unwrap();
        assert_eq!(arr.len(), 2);
        let first = arr[0].as_tuple().unwrap();
        assert_eq!(first[0].as_u64(), Some(1000));
        assert_eq!(first[4].as_bool(), Some(true));
        let second = arr[1].as_tuple().unwrap();
        assert_eq!(second[4].as_bool(), Some(false));
    }

    #[test]
    fn decodes_static_tuple_with_trailing_string() {
        // design(uint256)-style return: several static words then a string.
        let types = [
            ParamType::Str,
            ParamType::Uint,
            ParamType::Bool,
            ParamType::Str,
        ];
        let mut data = Vec::new();
        data.extend_from_slice(&uint_word(128)); // name offset
        data.extend_from_slice(&uint_word(3)); // tier
        data.extend_from_slice(&uint_word(1)); // active
        data.extend_from_slice(&uint_word(192)); // baseURI offset
        data.extend_from_slice(&uint_word(3));
        let mut name = [0u8; 32];
        name[..3].copy_from_slice(b"cat");
        data.extend_from_slice(&name);
        data.extend_from_slice(&uint_word(7));
        let mut uri = [0u8; 32];
        uri[..7].copy_from_slice(b"ipfs://");
        data.extend_from_slice(&uri);
        let vals = decode(&types, &data).unwrap();
        assert_eq!(vals[0].as_str(), Some("cat"));
        assert_eq!(vals[1].as_u64(), Some(3));
        assert_eq!(vals[2].as_bool(), Some(true));
        assert_eq!(vals[3].as_str(), Some("ipfs://"));
    }

    #[test]
    fn empty_data_is_a_decode_error() {
        assert!(decode(&[ParamType::Uint], &[]).is_err());
    }
}
