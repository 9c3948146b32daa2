//! EIP-712 permit hashing, signing, and signature recovery.
//!
//! Provides functions for:
//! - Hashing the signing domain ([`Domain::separator`]) and permit ([`PermitMessage::struct_hash`])
//! - Combining both into the signed digest ([`signing_hash`], [`typed_data_hash`])
//! - Signing with Ethereum's 27/28 recovery byte ([`sign_permit`], [`sign_digest`])
//! - Recovering the signer with EIP-2 malleability protection ([`recover_permit_signer`])
//! - Encoding signatures to hex ([`encode_signature_hex`])

use std::borrow::Cow;

use alloy::primitives::{keccak256, uint, Address, Signature, B256, U256};
use alloy::signers::SignerSync;
use serde::{Deserialize, Serialize};

use crate::typed_data::{EncodeError, Value, EIP712_DOMAIN, PERMIT};
use crate::OrderError;

/// Lead bytes of every EIP-712 digest preimage. Two raw bytes, not text.
pub const EIP712_PREFIX: [u8; 2] = [0x19, 0x01];

/// The signing context a token contract verifies permits against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: U256,
    pub verifying_contract: Address,
}

impl Domain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id: U256::from(chain_id),
            verifying_contract,
        }
    }

    fn values(&self) -> [Value; 4] {
        [
            Value::String(self.name.clone()),
            Value::String(self.version.clone()),
            Value::Uint(self.chain_id),
            Value::Address(self.verifying_contract),
        ]
    }

    /// `hashStruct(EIP712Domain)`, the token's `DOMAIN_SEPARATOR()`.
    pub fn separator(&self) -> Result<B256, EncodeError> {
        EIP712_DOMAIN.hash_struct(&self.values())
    }

    /// The same domain as alloy's sol-types representation.
    pub fn to_alloy(&self) -> alloy::sol_types::Eip712Domain {
        alloy::sol_types::Eip712Domain {
            name: Some(Cow::Owned(self.name.clone())),
            version: Some(Cow::Owned(self.version.clone())),
            chain_id: Some(self.chain_id),
            verifying_contract: Some(self.verifying_contract),
            salt: None,
        }
    }
}

/// An EIP-2612 permit. Built per order from a freshly read nonce and never
/// reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitMessage {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: U256,
    pub deadline: U256,
}

impl PermitMessage {
    fn values(&self) -> [Value; 5] {
        [
            Value::Address(self.owner),
            Value::Address(self.spender),
            Value::Uint(self.value),
            Value::Uint(self.nonce),
            Value::Uint(self.deadline),
        ]
    }

    /// `hashStruct(Permit)`
    pub fn struct_hash(&self) -> Result<B256, EncodeError> {
        PERMIT.hash_struct(&self.values())
    }
}

/// `keccak256(0x19 ++ 0x01 ++ domainSeparator ++ structHash)`
pub fn typed_data_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut preimage = [0u8; 66];
    preimage[..2].copy_from_slice(&EIP712_PREFIX);
    preimage[2..34].copy_from_slice(domain_separator.as_slice());
    preimage[34..].copy_from_slice(struct_hash.as_slice());
    keccak256(preimage)
}

/// Compute the digest a permit signature must cover.
pub fn signing_hash(domain: &Domain, message: &PermitMessage) -> Result<B256, EncodeError> {
    let domain_separator = domain.separator()?;
    let struct_hash = message.struct_hash()?;
    tracing::debug!(%domain_separator, %struct_hash, "permit hashes");
    Ok(typed_data_hash(domain_separator, struct_hash))
}

/// A permit signature split for `selfPermit(..., v, r, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
    pub r: B256,
    pub s: B256,
    /// Always 27 or 28.
    pub v: u8,
}

impl PermitSignature {
    /// Split a 65-byte `r ++ s ++ v` signature, lifting a raw 0/1 recovery
    /// id to 27/28.
    pub fn from_raw(bytes: &[u8]) -> Result<Self, OrderError> {
        if bytes.len() != 65 {
            return Err(OrderError::SignatureError(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }

        let mut v = bytes[64];
        if v < 27 {
            v += 27;
        }
        if v != 27 && v != 28 {
            return Err(OrderError::SignatureError(format!(
                "invalid recovery byte {}",
                bytes[64]
            )));
        }

        Ok(Self {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
            v,
        })
    }

    /// `r ++ s ++ v`
    pub fn as_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }
}

/// Sign a 32-byte digest.
pub fn sign_digest<S: SignerSync>(
    signer: &S,
    digest: &[u8],
) -> Result<PermitSignature, OrderError> {
    if digest.len() != 32 {
        return Err(OrderError::SignatureError(format!(
            "digest must be 32 bytes, got {}",
            digest.len()
        )));
    }
    let sig = signer
        .sign_hash_sync(&B256::from_slice(digest))
        .map_err(|e| OrderError::SignatureError(format!("signing failed: {e}")))?;
    PermitSignature::from_raw(&sig.as_bytes())
}

/// Hash and sign a permit for `domain`.
pub fn sign_permit<S: SignerSync>(
    signer: &S,
    domain: &Domain,
    message: &PermitMessage,
) -> Result<PermitSignature, OrderError> {
    let digest = signing_hash(domain, message)?;
    tracing::debug!(%digest, "signing permit");
    sign_digest(signer, digest.as_slice())
}

/// secp256k1 group order.
const SECP256K1_N: U256 =
    uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141_U256);

/// Largest accepted `s`. Anything above is the malleable twin (EIP-2).
const SECP256K1_HALF_N: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// Recover the address that signed a permit.
/// Rejects high-s signatures to prevent malleability (EIP-2).
pub fn recover_permit_signer(
    domain: &Domain,
    message: &PermitMessage,
    signature: &PermitSignature,
) -> Result<Address, OrderError> {
    let sig = Signature::from_raw(&signature.as_bytes())
        .map_err(|e| OrderError::SignatureError(format!("invalid signature: {e}")))?;

    if sig.s() > SECP256K1_HALF_N {
        return Err(OrderError::SignatureError(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    let hash = signing_hash(domain, message)?;
    sig.recover_address_from_prehash(&hash)
        .map_err(|e| OrderError::SignatureError(format!("recovery failed: {e}")))
}

/// Encode a signature to a hex string with 0x prefix (65 bytes -> 0x + 130 hex).
pub fn encode_signature_hex(sig: &PermitSignature) -> String {
    format!("0x{}", alloy::hex::encode(sig.as_bytes()))
}
