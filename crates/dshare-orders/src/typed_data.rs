//! EIP-712 struct table and field encoder.
//!
//! Struct shapes are declared once as [`StructType`] constants and every
//! hash is derived from them:
//! - [`StructType::encode_type`] / [`StructType::type_hash`] build the
//!   canonical `Name(type name,...)` string and its keccak256
//! - [`StructType::encode_data`] / [`StructType::hash_struct`] encode a
//!   value list into 32-byte slots and hash the result
//!
//! Only flat structs of elementary ABI types are supported.

use alloy::primitives::{keccak256, Address, Bytes, B256, I256, U256};
use thiserror::Error;

/// Canonical encoding of the EIP-712 domain struct.
pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Canonical encoding of the EIP-2612 permit struct.
pub const PERMIT_TYPE: &str =
    "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

/// Errors raised while encoding typed data. Never recoverable: a value that
/// fails here must not be signed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("unsupported field type `{0}`")]
    UnsupportedType(String),

    #[error("unknown struct type `{0}`")]
    UnknownStruct(String),

    #[error("struct `{name}` declares {expected} fields, got {actual} values")]
    FieldCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("field `{field}` is declared `{ty}` but got {kind}")]
    TypeMismatch {
        field: String,
        ty: String,
        kind: &'static str,
    },

    #[error("field `{field}`: negative value for unsigned type `{ty}`")]
    NegativeValue { field: String, ty: String },

    #[error("field `{field}`: value does not fit in `{ty}`")]
    Overflow { field: String, ty: String },

    #[error("field `{field}`: invalid address `{input}`")]
    InvalidAddress { field: String, input: String },

    #[error("field `{field}`: invalid number `{input}`")]
    InvalidNumber { field: String, input: String },
}

/// A named struct member and its canonical ABI type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: &'static str,
}

const fn field(name: &'static str, ty: &'static str) -> Field {
    Field { name, ty }
}

/// An EIP-712 struct shape. Field order is part of the type hash and must
/// match the on-chain declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructType {
    pub name: &'static str,
    pub fields: &'static [Field],
}

pub const EIP712_DOMAIN: StructType = StructType {
    name: "EIP712Domain",
    fields: &[
        field("name", "string"),
        field("version", "string"),
        field("chainId", "uint256"),
        field("verifyingContract", "address"),
    ],
};

pub const PERMIT: StructType = StructType {
    name: "Permit",
    fields: &[
        field("owner", "address"),
        field("spender", "address"),
        field("value", "uint256"),
        field("nonce", "uint256"),
        field("deadline", "uint256"),
    ],
};

/// Every struct type this crate knows how to hash.
pub const STRUCT_TYPES: &[StructType] = &[EIP712_DOMAIN, PERMIT];

/// Look up a struct type by name.
pub fn struct_type(name: &str) -> Result<&'static StructType, EncodeError> {
    STRUCT_TYPES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| EncodeError::UnknownStruct(name.to_string()))
}

impl StructType {
    /// `Name(type1 name1,type2 name2,...)` with no whitespace.
    pub fn encode_type(&self) -> String {
        let members = self
            .fields
            .iter()
            .map(|f| format!("{} {}", f.ty, f.name))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({members})", self.name)
    }

    pub fn type_hash(&self) -> B256 {
        keccak256(self.encode_type())
    }

    /// Check that every field uses a canonical elementary type.
    pub fn validate(&self) -> Result<(), EncodeError> {
        self.fields
            .iter()
            .try_for_each(|f| FieldType::parse(f.ty).map(|_| ()))
    }

    /// `typeHash ++ enc(value1) ++ enc(value2) ++ ...`
    ///
    /// `values` must be given in declared field order.
    pub fn encode_data(&self, values: &[Value]) -> Result<Vec<u8>, EncodeError> {
        if values.len() != self.fields.len() {
            return Err(EncodeError::FieldCount {
                name: self.name.to_string(),
                expected: self.fields.len(),
                actual: values.len(),
            });
        }

        let mut out = Vec::with_capacity(32 * (values.len() + 1));
        out.extend_from_slice(self.type_hash().as_slice());
        for (f, value) in self.fields.iter().zip(values) {
            out.extend_from_slice(encode_field(f, value)?.as_slice());
        }
        Ok(out)
    }

    /// `keccak256(encode_data(values))`
    pub fn hash_struct(&self, values: &[Value]) -> Result<B256, EncodeError> {
        Ok(keccak256(self.encode_data(values)?))
    }
}

/// Parsed form of a canonical elementary ABI type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Address,
    Bool,
    String,
    Bytes,
    Uint(usize),
    Int(usize),
    FixedBytes(usize),
}

impl FieldType {
    /// Parse a type name. Aliases (`uint`, `int`, `byte`) are rejected.
    pub fn parse(ty: &str) -> Result<Self, EncodeError> {
        let unsupported = || EncodeError::UnsupportedType(ty.to_string());
        match ty {
            "address" => return Ok(Self::Address),
            "bool" => return Ok(Self::Bool),
            "string" => return Ok(Self::String),
            "bytes" => return Ok(Self::Bytes),
            _ => {}
        }

        if let Some(digits) = ty.strip_prefix("uint") {
            return parse_size(digits)
                .filter(|bits| bits % 8 == 0 && *bits <= 256)
                .map(Self::Uint)
                .ok_or_else(unsupported);
        }
        if let Some(digits) = ty.strip_prefix("int") {
            return parse_size(digits)
                .filter(|bits| bits % 8 == 0 && *bits <= 256)
                .map(Self::Int)
                .ok_or_else(unsupported);
        }
        if let Some(digits) = ty.strip_prefix("bytes") {
            return parse_size(digits)
                .filter(|len| *len <= 32)
                .map(Self::FixedBytes)
                .ok_or_else(unsupported);
        }
        Err(unsupported())
    }
}

// Digits only, non-zero, no leading zero.
fn parse_size(digits: &str) -> Option<usize> {
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok()
}

/// A runtime field value handed to the encoder.
///
/// `Text` carries loosely-typed input (an address or a number read from
/// configuration) and is parsed against the declared field type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Address(Address),
    Bool(bool),
    Uint(U256),
    Int(I256),
    String(String),
    Bytes(Bytes),
    FixedBytes(B256),
    Text(String),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::Address(_) => "an address",
            Self::Bool(_) => "a bool",
            Self::Uint(_) => "an unsigned integer",
            Self::Int(_) => "a signed integer",
            Self::String(_) => "a string",
            Self::Bytes(_) => "a byte string",
            Self::FixedBytes(_) => "a 32-byte word",
            Self::Text(_) => "text",
        }
    }
}

impl From<Address> for Value {
    fn from(v: Address) -> Self {
        Self::Address(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<U256> for Value {
    fn from(v: U256) -> Self {
        Self::Uint(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(U256::from(v))
    }
}

impl From<I256> for Value {
    fn from(v: I256) -> Self {
        Self::Int(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<B256> for Value {
    fn from(v: B256) -> Self {
        Self::FixedBytes(v)
    }
}

/// Encode one field into its 32-byte slot.
pub fn encode_field(field: &Field, value: &Value) -> Result<B256, EncodeError> {
    let mismatch = || EncodeError::TypeMismatch {
        field: field.name.to_string(),
        ty: field.ty.to_string(),
        kind: value.kind(),
    };

    match FieldType::parse(field.ty)? {
        FieldType::Address => match value {
            Value::Address(addr) => Ok(addr.into_word()),
            Value::Text(s) => parse_address(field, s).map(|addr| addr.into_word()),
            _ => Err(mismatch()),
        },
        FieldType::Bool => match value {
            Value::Bool(b) => Ok(B256::from(U256::from(*b as u8).to_be_bytes::<32>())),
            _ => Err(mismatch()),
        },
        FieldType::String => match value {
            Value::String(s) | Value::Text(s) => Ok(keccak256(s.as_bytes())),
            _ => Err(mismatch()),
        },
        FieldType::Bytes => match value {
            Value::Bytes(b) => Ok(keccak256(b)),
            Value::Text(s) => {
                let raw = alloy::hex::decode(s).map_err(|_| mismatch())?;
                Ok(keccak256(raw))
            }
            _ => Err(mismatch()),
        },
        FieldType::Uint(bits) => {
            let v = match value {
                Value::Uint(v) => *v,
                Value::Int(i) if i.is_negative() => return Err(negative(field)),
                Value::Int(i) => i.into_raw(),
                Value::Text(s) => parse_unsigned(field, s)?,
                _ => return Err(mismatch()),
            };
            if bits < 256 && (v >> bits) != U256::ZERO {
                return Err(overflow(field));
            }
            Ok(B256::from(v.to_be_bytes::<32>()))
        }
        FieldType::Int(bits) => {
            let v = match value {
                Value::Int(i) => *i,
                Value::Uint(u) => I256::try_from(*u).map_err(|_| overflow(field))?,
                Value::Text(s) => parse_signed(field, s)?,
                _ => return Err(mismatch()),
            };
            if bits < 256 {
                // Magnitude bits beyond the sign bit must all be zero.
                let raw = v.into_raw();
                let magnitude = if v.is_negative() { !raw } else { raw };
                if (magnitude >> (bits - 1)) != U256::ZERO {
                    return Err(overflow(field));
                }
            }
            Ok(B256::from(v.into_raw().to_be_bytes::<32>()))
        }
        FieldType::FixedBytes(len) => match value {
            Value::FixedBytes(word) => {
                if word[len..].iter().any(|b| *b != 0) {
                    return Err(overflow(field));
                }
                Ok(*word)
            }
            Value::Bytes(b) if b.len() == len => Ok(B256::right_padding_from(b)),
            _ => Err(mismatch()),
        },
    }
}

fn negative(field: &Field) -> EncodeError {
    EncodeError::NegativeValue {
        field: field.name.to_string(),
        ty: field.ty.to_string(),
    }
}

fn overflow(field: &Field) -> EncodeError {
    EncodeError::Overflow {
        field: field.name.to_string(),
        ty: field.ty.to_string(),
    }
}

fn parse_address(field: &Field, input: &str) -> Result<Address, EncodeError> {
    input
        .trim()
        .parse::<Address>()
        .map_err(|_| EncodeError::InvalidAddress {
            field: field.name.to_string(),
            input: input.to_string(),
        })
}

// Decimal or 0x-prefixed hex.
fn parse_unsigned(field: &Field, input: &str) -> Result<U256, EncodeError> {
    let s = input.trim();
    if s.starts_with('-') {
        return Err(negative(field));
    }
    let invalid = || EncodeError::InvalidNumber {
        field: field.name.to_string(),
        input: input.to_string(),
    };
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => U256::from_str_radix(hex, 16),
        Some(_) => return Err(invalid()),
        None if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            U256::from_str_radix(s, 10)
        }
        None => return Err(invalid()),
    };
    parsed.map_err(|_| invalid())
}

fn parse_signed(field: &Field, input: &str) -> Result<I256, EncodeError> {
    let s = input.trim();
    match s.strip_prefix('-') {
        Some(digits) => {
            let magnitude = parse_unsigned(field, digits)?;
            // I256::MIN has magnitude 2^255.
            if magnitude > U256::from(1u8) << 255usize {
                return Err(overflow(field));
            }
            Ok(I256::from_raw(magnitude.wrapping_neg()))
        }
        None => I256::try_from(parse_unsigned(field, s)?).map_err(|_| overflow(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};

    fn uint_field(ty: &'static str) -> Field {
        field("amount", ty)
    }

    #[test]
    fn test_encode_type_matches_canonical_strings() {
        assert_eq!(EIP712_DOMAIN.encode_type(), EIP712_DOMAIN_TYPE);
        assert_eq!(PERMIT.encode_type(), PERMIT_TYPE);
    }

    #[test]
    fn test_type_hashes_are_known_constants() {
        assert_eq!(
            EIP712_DOMAIN.type_hash(),
            b256!("8b73c3c69bb8fe3d512ecc4cf759cc79239f7b179b0ffacaa9a75d522b39400f")
        );
        assert_eq!(
            PERMIT.type_hash(),
            b256!("6e71edae12b1b97f4d1f60370fef10105fa2faae0126114a169c64845d6126c9")
        );
    }

    #[test]
    fn test_table_lookup_and_validation() {
        for ty in STRUCT_TYPES {
            ty.validate().unwrap();
        }
        assert_eq!(struct_type("Permit").unwrap(), &PERMIT);
        assert_eq!(
            struct_type("Order"),
            Err(EncodeError::UnknownStruct("Order".to_string()))
        );
    }

    #[test]
    fn test_field_type_rejects_aliases() {
        for ty in [
            "uint", "int", "byte", "uint7", "uint264", "uint08", "bytes33", "bytes0", "tuple",
            "uint+8",
        ] {
            assert_eq!(
                FieldType::parse(ty),
                Err(EncodeError::UnsupportedType(ty.to_string())),
                "{ty}"
            );
        }
        assert_eq!(FieldType::parse("uint8"), Ok(FieldType::Uint(8)));
        assert_eq!(FieldType::parse("int256"), Ok(FieldType::Int(256)));
        assert_eq!(FieldType::parse("bytes4"), Ok(FieldType::FixedBytes(4)));
    }

    #[test]
    fn test_uint_bounds() {
        let f = uint_field("uint256");
        assert_eq!(encode_field(&f, &Value::Uint(U256::ZERO)).unwrap(), B256::ZERO);
        assert_eq!(
            encode_field(&f, &Value::Uint(U256::MAX)).unwrap(),
            B256::repeat_byte(0xff)
        );
    }

    #[test]
    fn test_uint_rejects_negative_values() {
        let f = uint_field("uint256");
        let err = encode_field(&f, &Value::Int(I256::MINUS_ONE)).unwrap_err();
        assert!(matches!(err, EncodeError::NegativeValue { .. }));

        let err = encode_field(&f, &Value::Text("-5".to_string())).unwrap_err();
        assert!(matches!(err, EncodeError::NegativeValue { .. }));

        // Non-negative signed input is fine.
        let word = encode_field(&f, &Value::Int(I256::from_raw(U256::from(7u64)))).unwrap();
        assert_eq!(word[31], 7);
    }

    #[test]
    fn test_narrow_uint_overflow() {
        let f = uint_field("uint8");
        assert_eq!(encode_field(&f, &Value::from(255u64)).unwrap()[31], 0xff);
        let err = encode_field(&f, &Value::from(256u64)).unwrap_err();
        assert!(matches!(err, EncodeError::Overflow { .. }));
    }

    #[test]
    fn test_uint_text_input() {
        let f = uint_field("uint256");
        let dec = encode_field(&f, &Value::Text("1000000".to_string())).unwrap();
        let hex = encode_field(&f, &Value::Text("0xf4240".to_string())).unwrap();
        assert_eq!(dec, hex);
        assert_eq!(dec, B256::from(U256::from(1_000_000u64).to_be_bytes::<32>()));

        for bad in ["", "0x", "12abc", "1.5"] {
            let err = encode_field(&f, &Value::Text(bad.to_string())).unwrap_err();
            assert!(matches!(err, EncodeError::InvalidNumber { .. }), "{bad}");
        }
    }

    #[test]
    fn test_int_twos_complement() {
        let f = field("delta", "int256");
        assert_eq!(
            encode_field(&f, &Value::Int(I256::MINUS_ONE)).unwrap(),
            B256::repeat_byte(0xff)
        );
        assert_eq!(
            encode_field(&f, &Value::Text("-1".to_string())).unwrap(),
            B256::repeat_byte(0xff)
        );

        let narrow = field("delta", "int8");
        assert!(encode_field(&narrow, &Value::Text("-128".to_string())).is_ok());
        assert!(encode_field(&narrow, &Value::Text("127".to_string())).is_ok());
        assert!(matches!(
            encode_field(&narrow, &Value::Text("-129".to_string())),
            Err(EncodeError::Overflow { .. })
        ));
        assert!(matches!(
            encode_field(&narrow, &Value::Text("128".to_string())),
            Err(EncodeError::Overflow { .. })
        ));
    }

    #[test]
    fn test_address_is_left_padded() {
        let f = field("owner", "address");
        let addr = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        let word = encode_field(&f, &Value::Address(addr)).unwrap();
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], addr.as_slice());

        let from_text = encode_field(
            &f,
            &Value::Text("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string()),
        )
        .unwrap();
        assert_eq!(word, from_text);
    }

    #[test]
    fn test_malformed_address_fails() {
        let f = field("owner", "address");
        for bad in ["0x1234", "not-an-address", "0xZZb86991c6218b36c1d19D4a2e9Eb0cE3606eB48"] {
            let err = encode_field(&f, &Value::Text(bad.to_string())).unwrap_err();
            assert!(matches!(err, EncodeError::InvalidAddress { .. }), "{bad}");
        }
        let err = encode_field(&f, &Value::from(1u64)).unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_dynamic_fields_are_hashed() {
        let name = field("name", "string");
        assert_eq!(
            encode_field(&name, &Value::from("USD Coin")).unwrap(),
            keccak256("USD Coin")
        );

        let data = field("data", "bytes");
        let raw = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(
            encode_field(&data, &Value::Bytes(raw.clone())).unwrap(),
            keccak256(&raw)
        );
        assert_eq!(
            encode_field(&data, &Value::Text("0xdeadbeef".to_string())).unwrap(),
            keccak256(&raw)
        );
    }

    #[test]
    fn test_fixed_bytes() {
        let word = b256!("1111111111111111111111111111111111111111111111111111111111111111");
        let f = field("salt", "bytes32");
        assert_eq!(encode_field(&f, &Value::FixedBytes(word)).unwrap(), word);

        let short = field("selector", "bytes4");
        let padded = encode_field(&short, &Value::Bytes(Bytes::from(vec![1, 2, 3, 4]))).unwrap();
        assert_eq!(&padded[..4], &[1, 2, 3, 4]);
        assert_eq!(&padded[4..], &[0u8; 28]);
        assert!(matches!(
            encode_field(&short, &Value::FixedBytes(word)),
            Err(EncodeError::Overflow { .. })
        ));
    }

    #[test]
    fn test_bool() {
        let f = field("sell", "bool");
        assert_eq!(encode_field(&f, &Value::Bool(true)).unwrap()[31], 1);
        assert_eq!(encode_field(&f, &Value::Bool(false)).unwrap(), B256::ZERO);
    }

    #[test]
    fn test_encode_data_layout() {
        let owner = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
        let spender = address!("1754422ef9910572cCde378a9C07d717eC8D48A0");
        let values = [
            Value::Address(owner),
            Value::Address(spender),
            Value::from(10u64),
            Value::from(0u64),
            Value::from(1_700_000_300u64),
        ];
        let encoded = PERMIT.encode_data(&values).unwrap();
        assert_eq!(encoded.len(), 32 * 6);
        // Type hash leads, unhashed.
        assert_eq!(&encoded[..32], PERMIT.type_hash().as_slice());
        assert_eq!(&encoded[44..64], owner.as_slice());
        assert_eq!(&encoded[76..96], spender.as_slice());
        assert_eq!(PERMIT.hash_struct(&values).unwrap(), keccak256(&encoded));
    }

    #[test]
    fn test_encode_data_field_count() {
        let err = PERMIT.encode_data(&[Value::from(1u64)]).unwrap_err();
        assert_eq!(
            err,
            EncodeError::FieldCount {
                name: "Permit".to_string(),
                expected: 5,
                actual: 1,
            }
        );
    }
}
