use secp256k1::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::wallet::{address_of, public_key_of, sign_hex, verify_signature_hex};

/// Origin of a transfer. `Reward` mints the mining reward and carries no
/// signature; on the wire it is a `null` sender.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Sender {
    Reward,
    Address(String),
}

impl Sender {
    pub fn address(&self) -> Option<&str> {
        match self {
            Sender::Reward => None,
            Sender::Address(a) => Some(a),
        }
    }
}

impl From<Option<String>> for Sender {
    fn from(value: Option<String>) -> Self {
        value.map_or(Sender::Reward, Sender::Address)
    }
}

impl From<Sender> for Option<String> {
    fn from(value: Sender) -> Self {
        match value {
            Sender::Reward => None,
            Sender::Address(a) => Some(a),
        }
    }
}

/// Escaped JSON string literal, or `null`.
fn json_str(value: Option<&str>) -> String {
    value.map_or_else(|| "null".to_string(), |s| serde_json::Value::from(s).to_string())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("transaction is already signed")]
    AlreadySigned,
    #[error("signing key does not belong to sender {0}")]
    KeyMismatch(String),
}

/// A value transfer. Field order is the wire/record order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Sender,
    pub receiver: String,
    pub amount: u64,
    /// Hex-encoded DER ECDSA signature
    #[serde(default)]
    pub signature: Option<String>,
}

impl Transaction {
    pub fn new(sender: Sender, receiver: impl Into<String>, amount: u64) -> Self {
        Self {
            sender,
            receiver: receiver.into(),
            amount,
            signature: None,
        }
    }

    /// Reward transaction crediting `miner`.
    pub fn reward(miner: impl Into<String>, amount: u64) -> Self {
        Self::new(Sender::Reward, miner, amount)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == Sender::Reward
    }

    /// Canonical signing payload over (sender, receiver, amount): compact
    /// JSON with keys in sorted order.
    pub fn signing_payload(&self) -> Vec<u8> {
        format!(
            r#"{{"amount":{},"receiver":{},"sender":{}}}"#,
            self.amount,
            json_str(Some(&self.receiver)),
            json_str(self.sender.address()),
        )
        .into_bytes()
    }

    /// SHA-256 of the signing payload.
    pub fn sighash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_payload());
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..]);
        out
    }

    /// Record committed into a block's content hash: compact JSON with keys
    /// in sorted order. Written out by hand so the bytes never depend on how
    /// `serde_json` happens to order map keys.
    pub fn canonical_record(&self) -> String {
        format!(
            r#"{{"amount":{},"receiver":{},"sender":{},"signature":{}}}"#,
            self.amount,
            json_str(Some(&self.receiver)),
            json_str(self.sender.address()),
            json_str(self.signature.as_deref()),
        )
    }

    /// Sign once. Reward transactions are left untouched.
    pub fn sign(&mut self, secret_key: &SecretKey) -> Result<(), SigningError> {
        let Sender::Address(sender) = &self.sender else {
            return Ok(());
        };
        if self.signature.is_some() {
            return Err(SigningError::AlreadySigned);
        }
        if address_of(&public_key_of(secret_key)) != *sender {
            return Err(SigningError::KeyMismatch(sender.clone()));
        }
        self.signature = Some(sign_hex(secret_key, self.sighash()));
        Ok(())
    }

    /// Rewards are always valid. Anything else needs a signature that
    /// verifies under `public_key`; every failure is reported as `false`.
    pub fn is_valid(&self, public_key: Option<&PublicKey>) -> bool {
        if self.is_reward() {
            return true;
        }
        let (Some(pk), Some(sig)) = (public_key, self.signature.as_deref()) else {
            return false;
        };
        verify_signature_hex(pk, sig, self.sighash()).unwrap_or(false)
    }
}
