// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DIVPOOL - CRYPTOGRAPHY MODULE
//
// Validator co-signatures for dividend distributions (Ed25519).
// - Key generation (random and deterministic from seed)
// - Message signing and verification
// - 20-byte identifier derivation (BLAKE2b-160)
// - Distribution payload digest (SHA3-256, nonce-bound)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha3::Sha3_256;
use zeroize::Zeroize;

/// Length of every identifier (holders, assets, pool anchors).
pub const ADDRESS_LEN: usize = 20;
/// Ed25519 public key length.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Ed25519 secret seed length.
pub const SECRET_KEY_LEN: usize = 32;
/// Ed25519 signature length.
pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug, PartialEq, Eq)]
pub enum CryptoError {
    InvalidKey,
    InvalidSeed,
    VerificationFailed,
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CryptoError::InvalidKey => write!(f, "Invalid key format"),
            CryptoError::InvalidSeed => write!(f, "Seed must be at least 32 bytes"),
            CryptoError::VerificationFailed => write!(f, "Signature verification failed"),
        }
    }
}

impl std::error::Error for CryptoError {}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: Vec<u8>,
}

/// SECURITY: wipe the secret seed when the keypair goes out of scope.
impl Drop for KeyPair {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl KeyPair {
    fn from_signing_key(sk: &SigningKey) -> Self {
        KeyPair {
            public_key: sk.verifying_key().to_bytes().to_vec(),
            secret_key: sk.to_bytes().to_vec(),
        }
    }

    /// Identifier of this key's holder (see [`public_key_to_address`]).
    pub fn address(&self) -> [u8; ADDRESS_LEN] {
        public_key_to_address(&self.public_key)
    }
}

/// Generate a new validator key pair from the OS RNG.
pub fn generate_keypair() -> KeyPair {
    let mut seed = [0u8; SECRET_KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    let sk = SigningKey::from_bytes(&seed);
    seed.zeroize();
    KeyPair::from_signing_key(&sk)
}

/// Generate a DETERMINISTIC key pair from seed material.
///
/// Domain separation:
///   derived = SHA3-256("divpool-ed25519-keygen-v1" || seed)
///
/// The same seed always produces the same key pair and address.
pub fn generate_keypair_from_seed(seed: &[u8]) -> Result<KeyPair, CryptoError> {
    if seed.len() < SECRET_KEY_LEN {
        return Err(CryptoError::InvalidSeed);
    }

    let mut hasher = Sha3_256::new();
    hasher.update(b"divpool-ed25519-keygen-v1");
    hasher.update(seed);
    let mut derived: [u8; SECRET_KEY_LEN] = hasher.finalize().into();

    let sk = SigningKey::from_bytes(&derived);
    derived.zeroize();
    Ok(KeyPair::from_signing_key(&sk))
}

/// Rebuild a key pair from a 32-byte secret seed.
pub fn keypair_from_secret(secret_bytes: &[u8]) -> Result<KeyPair, CryptoError> {
    let sk = signing_key(secret_bytes)?;
    Ok(KeyPair::from_signing_key(&sk))
}

fn signing_key(secret_bytes: &[u8]) -> Result<SigningKey, CryptoError> {
    let mut seed: [u8; SECRET_KEY_LEN] = secret_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey)?;
    let sk = SigningKey::from_bytes(&seed);
    seed.zeroize();
    Ok(sk)
}

/// Sign a message with a 32-byte Ed25519 secret seed.
pub fn sign_message(message: &[u8], secret_key_bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let sk = signing_key(secret_key_bytes)?;
    Ok(sk.sign(message).to_bytes().to_vec())
}

/// Verify an Ed25519 signature. Malformed keys or signatures verify as `false`.
pub fn verify_signature(message: &[u8], signature_bytes: &[u8], public_key_bytes: &[u8]) -> bool {
    let pk_array: [u8; PUBLIC_KEY_LEN] = match public_key_bytes.try_into() {
        Ok(a) => a,
        Err(_) => return false,
    };
    let vk = match VerifyingKey::from_bytes(&pk_array) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let sig = match Signature::from_slice(signature_bytes) {
        Ok(s) => s,
        Err(_) => return false,
    };

    vk.verify(message, &sig).is_ok()
}

/// Derive a 20-byte identifier from a public key: BLAKE2b-512, first 20 bytes.
pub fn public_key_to_address(public_key_bytes: &[u8]) -> [u8; ADDRESS_LEN] {
    let mut hasher = Blake2b512::new();
    hasher.update(public_key_bytes);
    let hash_result = hasher.finalize();

    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(&hash_result[..ADDRESS_LEN]);
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DISTRIBUTION PAYLOAD
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Digest a validator signs to authorize one dividend distribution.
///
/// Layout (raw concatenation, then SHA3-256):
///   anchor  20 bytes
///   amount  32 bytes big-endian (u128 left-padded with zeros)
///   nonce    8 bytes big-endian
///
/// The nonce is the number of distributions the pool has already accepted,
/// so a signature authorizes exactly one distribution.
pub fn distribution_payload(anchor: &[u8; ADDRESS_LEN], amount: u128, nonce: u64) -> [u8; 32] {
    let mut amount_be = [0u8; 32];
    amount_be[16..].copy_from_slice(&amount.to_be_bytes());

    let mut hasher = Sha3_256::new();
    hasher.update(anchor);
    hasher.update(amount_be);
    hasher.update(nonce.to_be_bytes());
    hasher.finalize().into()
}

/// Validator side: sign the payload for `(anchor, amount, nonce)`.
pub fn sign_distribution(
    anchor: &[u8; ADDRESS_LEN],
    amount: u128,
    nonce: u64,
    secret_key_bytes: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let payload = distribution_payload(anchor, amount, nonce);
    sign_message(&payload, secret_key_bytes)
}

/// Pool side: check a distribution signature against the registered validator key.
pub fn verify_distribution(
    anchor: &[u8; ADDRESS_LEN],
    amount: u128,
    nonce: u64,
    signature_bytes: &[u8],
    public_key_bytes: &[u8],
) -> bool {
    let payload = distribution_payload(anchor, amount, nonce);
    verify_signature(&payload, signature_bytes, public_key_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANCHOR: [u8; ADDRESS_LEN] = [0xAB; ADDRESS_LEN];

    #[test]
    fn test_sign_verify_flow() {
        let keypair = generate_keypair();
        let message = b"dividend round";

        let signature = sign_message(message, &keypair.secret_key).unwrap();
        assert_eq!(signature.len(), SIGNATURE_LEN);
        assert!(verify_signature(message, &signature, &keypair.public_key));
        assert!(!verify_signature(b"other", &signature, &keypair.public_key));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let signer = generate_keypair();
        let other = generate_keypair();
        let signature = sign_message(b"msg", &signer.secret_key).unwrap();
        assert!(!verify_signature(b"msg", &signature, &other.public_key));
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        let keypair = generate_keypair();
        let signature = sign_message(b"msg", &keypair.secret_key).unwrap();

        assert!(!verify_signature(b"msg", &signature[..63], &keypair.public_key));
        assert!(!verify_signature(b"msg", &signature, &keypair.public_key[..31]));
        assert!(!verify_signature(b"msg", &[], &[]));
        assert_eq!(
            sign_message(b"msg", &[1u8; 31]).unwrap_err(),
            CryptoError::InvalidKey
        );
    }

    #[test]
    fn test_seeded_keygen_deterministic() {
        let seed = [7u8; 64];
        let a = generate_keypair_from_seed(&seed).unwrap();
        let b = generate_keypair_from_seed(&seed).unwrap();
        assert_eq!(a.public_key, b.public_key);
        assert_eq!(a.address(), b.address());

        let c = generate_keypair_from_seed(&[8u8; 64]).unwrap();
        assert_ne!(a.public_key, c.public_key);
    }

    #[test]
    fn test_short_seed_rejected() {
        assert_eq!(
            generate_keypair_from_seed(&[1u8; 16]).unwrap_err(),
            CryptoError::InvalidSeed
        );
    }

    #[test]
    fn test_keypair_from_secret_roundtrip() {
        let original = generate_keypair();
        let rebuilt = keypair_from_secret(&original.secret_key).unwrap();
        assert_eq!(original.public_key, rebuilt.public_key);
    }

    #[test]
    fn test_payload_layout() {
        let mut expected = Sha3_256::new();
        expected.update(ANCHOR);
        let mut amount = [0u8; 32];
        amount[31] = 0x05;
        expected.update(amount);
        expected.update(3u64.to_be_bytes());
        let expected: [u8; 32] = expected.finalize().into();

        assert_eq!(distribution_payload(&ANCHOR, 5, 3), expected);
    }

    #[test]
    fn test_payload_binds_every_field() {
        let base = distribution_payload(&ANCHOR, 1_500, 0);
        assert_ne!(base, distribution_payload(&ANCHOR, 1_501, 0));
        assert_ne!(base, distribution_payload(&ANCHOR, 1_500, 1));
        assert_ne!(base, distribution_payload(&[0xAC; ADDRESS_LEN], 1_500, 0));
    }

    #[test]
    fn test_distribution_signature() {
        let validator = generate_keypair();
        let sig = sign_distribution(&ANCHOR, 1_000, 0, &validator.secret_key).unwrap();

        assert!(verify_distribution(&ANCHOR, 1_000, 0, &sig, &validator.public_key));
        // Replay under the next nonce fails
        assert!(!verify_distribution(&ANCHOR, 1_000, 1, &sig, &validator.public_key));
        // Different amount fails
        assert!(!verify_distribution(&ANCHOR, 999, 0, &sig, &validator.public_key));
    }

    #[test]
    fn test_address_derivation() {
        let keypair = generate_keypair();
        let addr = public_key_to_address(&keypair.public_key);
        assert_eq!(addr.len(), ADDRESS_LEN);
        assert_eq!(addr, keypair.address());
        assert_ne!(addr, public_key_to_address(&generate_keypair().public_key));
    }
}
