// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DIVPOOL - AUTHORIZATION GATE
//
// A distribution needs BOTH:
//   1. the manager as caller
//   2. a validator co-signature over (anchor, amount, nonce)
// The nonce is the count of distributions already accepted, so each
// signature authorizes exactly one distribution and cannot be replayed.
// Every failure is reported as the same `Unauthorized`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};

use divpool_crypto::{verify_distribution, PUBLIC_KEY_LEN};

use crate::{Address, PoolError};

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGate {
    anchor: Address,
    manager: Address,
    #[serde(with = "hex_bytes")]
    validator_public_key: Vec<u8>,
    next_nonce: u64,
}

impl AuthorizationGate {
    /// The validator key must be a well-formed public key and must not
    /// belong to the manager.
    pub fn new(
        anchor: Address,
        manager: Address,
        validator_public_key: &[u8],
    ) -> Result<Self, PoolError> {
        if validator_public_key.len() != PUBLIC_KEY_LEN {
            return Err(PoolError::Unauthorized);
        }
        if Address::from_public_key(validator_public_key) == manager {
            return Err(PoolError::Unauthorized);
        }
        Ok(Self {
            anchor,
            manager,
            validator_public_key: validator_public_key.to_vec(),
            next_nonce: 0,
        })
    }

    pub fn manager(&self) -> Address {
        self.manager
    }

    pub fn validator(&self) -> Address {
        Address::from_public_key(&self.validator_public_key)
    }

    pub fn validator_public_key(&self) -> &[u8] {
        &self.validator_public_key
    }

    /// Nonce the validator must sign for the next distribution.
    pub fn next_nonce(&self) -> u64 {
        self.next_nonce
    }

    /// Check caller role and co-signature. Returns the nonce that will be
    /// consumed on success. Does not mutate.
    pub fn authorize(
        &self,
        caller: &Address,
        amount: u128,
        signature: &[u8],
    ) -> Result<u64, PoolError> {
        let nonce = self.next_nonce;
        let role_ok = *caller == self.manager;
        // Both checks always run; only their conjunction is reported
        let signature_ok = verify_distribution(
            self.anchor.as_bytes(),
            amount,
            nonce,
            signature,
            &self.validator_public_key,
        );
        if !(role_ok && signature_ok) {
            return Err(PoolError::Unauthorized);
        }
        nonce
            .checked_add(1)
            .map(|_| nonce)
            .ok_or(PoolError::ArithmeticOverflow)
    }

    /// Burn `nonce` after the distribution it authorized was applied.
    pub fn consume(&mut self, nonce: u64) {
        if nonce == self.next_nonce {
            self.next_nonce = nonce + 1;
        }
    }
}
