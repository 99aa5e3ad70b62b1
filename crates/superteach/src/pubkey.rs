//! base58 account keys, blockhashes and signatures

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseKeyError {
    #[error("invalid base58: {0}")]
    Base58(String),
    #[error("expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseKeyError> {
    let bytes = bs58::decode(s.trim())
        .into_vec()
        .map_err(|e| ParseKeyError::Base58(e.to_string()))?;
    if bytes.len() != N {
        return Err(ParseKeyError::Length {
            expected: N,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

macro_rules! base58_type {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn to_bytes(&self) -> [u8; $len] {
                self.0
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; $len])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseKeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<$len>(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

base58_type!(Pubkey, 32);
base58_type!(Blockhash, 32);
base58_type!(Signature, 64);

/// the native system program, all zero bytes
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey([0u8; 32]);

impl Signature {
    /// placeholder slot before a signer has signed
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl From<ed25519_dalek::VerifyingKey> for Pubkey {
    fn from(key: ed25519_dalek::VerifyingKey) -> Self {
        Pubkey(key.to_bytes())
    }
}

impl From<ed25519_dalek::Signature> for Signature {
    fn from(sig: ed25519_dalek::Signature) -> Self {
        Signature(sig.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_program_text_form() {
        assert_eq!(
            SYSTEM_PROGRAM_ID.to_string(),
            "11111111111111111111111111111111"
        );
        let parsed: Pubkey = "11111111111111111111111111111111".parse().unwrap();
        assert_eq!(parsed, SYSTEM_PROGRAM_ID);
    }

    #[test]
    fn test_pubkey_text_roundtrip() {
        let key = Pubkey([7u8; 32]);
        let text = key.to_string();
        assert_eq!(text.parse::<Pubkey>().unwrap(), key);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            "not-base58!".parse::<Pubkey>(),
            Err(ParseKeyError::Base58(_))
        ));
        // valid base58, wrong width
        assert!(matches!(
            "3mJr7AoUXx2Wqd".parse::<Pubkey>(),
            Err(ParseKeyError::Length { expected: 32, .. })
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let key = Pubkey([1u8; 32]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key));
        let back: Pubkey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_empty_signature() {
        assert!(Signature::default().is_empty());
        assert!(!Signature([1u8; 64]).is_empty());
    }
}
