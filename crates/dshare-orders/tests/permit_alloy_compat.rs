use alloy::primitives::{address, b256, Address, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolStruct;
use dshare::typed_data::{EncodeError, Value, EIP712_DOMAIN, PERMIT};
use dshare::{recover_permit_signer, sign_permit, signing_hash, Domain, PermitMessage};
use std::sync::Arc;
use std::thread;

sol! {
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }
}

const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

fn domain(version: &str) -> Domain {
    Domain::new("USD Coin", version, 1, USDC)
}

fn message() -> PermitMessage {
    PermitMessage {
        owner: address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
        spender: address!("1754422ef9910572cCde378a9C07d717eC8D48A0"),
        value: U256::from(10_500_000u64),
        nonce: U256::from(3),
        deadline: U256::from(1_700_000_300u64),
    }
}

fn as_sol(m: &PermitMessage) -> Permit {
    Permit {
        owner: m.owner,
        spender: m.spender,
        value: m.value,
        nonce: m.nonce,
        deadline: m.deadline,
    }
}

#[test]
fn test_type_strings_match_sol_struct() {
    let permit = as_sol(&message());
    assert_eq!(PERMIT.encode_type(), Permit::eip712_encode_type());
    assert_eq!(PERMIT.type_hash(), permit.eip712_type_hash());
    assert_eq!(
        PERMIT.type_hash(),
        b256!("6e71edae12b1b97f4d1f60370fef10105fa2faae0126114a169c64845d6126c9")
    );
    assert_eq!(
        EIP712_DOMAIN.type_hash(),
        b256!("8b73c3c69bb8fe3d512ecc4cf759cc79239f7b179b0ffacaa9a75d522b39400f")
    );
}

#[test]
fn test_hashes_match_sol_struct() {
    for version in ["1", "2"] {
        let domain = domain(version);
        let message = message();
        let permit = as_sol(&message);

        assert_eq!(domain.separator().unwrap(), domain.to_alloy().separator());
        assert_eq!(message.struct_hash().unwrap(), permit.eip712_hash_struct());
        assert_eq!(
            signing_hash(&domain, &message).unwrap(),
            permit.eip712_signing_hash(&domain.to_alloy())
        );
    }
}

#[test]
fn test_version_one_reference_digest() {
    assert_eq!(
        domain("1").separator().unwrap(),
        b256!("53af746ecdec49e555bd241cdef7a4e3f4012770364b774a3f9b60cc4ae63717")
    );
    assert_eq!(
        signing_hash(&domain("1"), &message()).unwrap(),
        b256!("f77765c496206998ee23c377502c3b06b300f5e2b205b765a99426f3b340a5e6")
    );
}

#[test]
fn test_struct_encoder_rejects_bad_values() {
    let too_few = [Value::from(Address::ZERO), Value::from(Address::ZERO)];
    assert!(matches!(
        PERMIT.hash_struct(&too_few),
        Err(EncodeError::FieldCount {
            expected: 5,
            actual: 2,
            ..
        })
    ));

    let swapped = [
        Value::from(U256::from(1)),
        Value::from(Address::ZERO),
        Value::from(U256::from(1)),
        Value::from(U256::from(1)),
        Value::from(U256::from(1)),
    ];
    assert!(matches!(
        PERMIT.hash_struct(&swapped),
        Err(EncodeError::TypeMismatch { .. })
    ));
}

#[test]
fn test_concurrent_signing_is_consistent() {
    let signer = Arc::new(PrivateKeySigner::random());
    let domain = Arc::new(domain("2"));
    let mut message = message();
    message.owner = signer.address();
    let message = Arc::new(message);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let signer = signer.clone();
            let domain = domain.clone();
            let message = message.clone();
            thread::spawn(move || {
                let digest = signing_hash(&domain, &message).unwrap();
                let sig = sign_permit(signer.as_ref(), &domain, &message).unwrap();
                (digest, sig)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (digest, sig) in &results {
        assert_eq!(*digest, results[0].0);
        assert_eq!(
            recover_permit_signer(&domain, &message, sig).unwrap(),
            signer.address()
        );
    }
}
