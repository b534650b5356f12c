//! Commitment and Salt for the commit-reveal scheme.

use crate::games::Move;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Errors parsing hex-encoded 32-byte values
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("expected 32 bytes, got {0}")]
    WrongLength(usize),
}

fn decode_32(s: &str) -> Result<[u8; 32], HexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| HexError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(HexError::WrongLength(bytes.len()));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// Secret salt chosen by the committing player (256 bits)
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; 32]);

impl Salt {
    /// Create a new random salt
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Salt {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_32(s).map(Self)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only a prefix, the salt is secret until reveal
        write!(f, "Salt({}..)", hex::encode(&self.0[..4]))
    }
}

/// Commitment = Keccak256(move_byte || salt), the digest an EVM client computes
/// with `keccak256(concat(toBeArray(move), salt))`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment([u8; 32]);

impl Commitment {
    /// The all-zero digest, treated as "no commitment"
    pub const EMPTY: Commitment = Commitment([0u8; 32]);

    /// Create a commitment to a move
    pub fn new(mv: Move, salt: &Salt) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update([mv.to_byte()]);
        hasher.update(salt.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Verify that the given move and salt produce this commitment
    pub fn verify(&self, mv: Move, salt: &Salt) -> bool {
        *self == Self::new(mv, salt)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Commitment {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_32(s).map(Self)
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                self.to_hex().serialize(s)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let hex_str = String::deserialize(d)?;
                hex_str.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(Salt);
hex_serde!(Commitment);

/// Bind a move to a secret salt
pub fn commit(mv: Move, salt: &Salt) -> Commitment {
    Commitment::new(mv, salt)
}

/// Check a revealed (move, salt) pair against a stored commitment
pub fn verify(commitment: &Commitment, mv: Move, salt: &Salt) -> bool {
    commitment.verify(mv, salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVES: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    #[test]
    fn test_commitment_verification() {
        for mv in MOVES {
            let salt = Salt::random();
            assert!(verify(&commit(mv, &salt), mv, &salt));
        }
    }

    #[test]
    fn test_wrong_move_fails_verification() {
        let salt = Salt::random();
        for mv in MOVES {
            let commitment = commit(mv, &salt);
            for other in MOVES.iter().filter(|m| **m != mv) {
                assert!(!commitment.verify(*other, &salt));
            }
        }
    }

    #[test]
    fn test_wrong_salt_fails_verification() {
        let salt1 = Salt::random();
        let salt2 = Salt::random();
        let commitment = commit(Move::Rock, &salt1);

        assert!(!commitment.verify(Move::Rock, &salt2));
    }

    #[test]
    fn test_different_salts_different_commitments() {
        assert_ne!(
            commit(Move::Paper, &Salt::random()),
            commit(Move::Paper, &Salt::random())
        );
    }

    #[test]
    fn test_commitment_matches_evm_client_digest() {
        // keccak256(concat([move], salt)) with a salt of 32 bytes of 0x07
        let salt = Salt::from_bytes([7u8; 32]);
        let rock: Commitment = "0x3d6519cb1e07d463289f5a65e8fbf7aada29fb3cb87076a8f8258aa1e1304f36"
            .parse()
            .unwrap();
        let paper: Commitment = "0a94afd4929396b87da74403d5efcc74dae1bdcd7fb3562e9784528bb339d881"
            .parse()
            .unwrap();

        assert_eq!(commit(Move::Rock, &salt), rock);
        assert_eq!(commit(Move::Paper, &salt), paper);
        assert!(rock.verify(Move::Rock, &salt));
        assert!(!rock.verify(Move::Paper, &salt));
    }

    #[test]
    fn test_keccak_not_sha3() {
        let empty: [u8; 32] = Keccak256::digest(b"").into();
        assert_eq!(
            hex::encode(empty),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_empty_commitment() {
        assert!(Commitment::EMPTY.is_empty());
        assert!(!commit(Move::Rock, &Salt::random()).is_empty());
    }

    #[test]
    fn test_hex_serde() {
        let commitment = commit(Move::Scissors, &Salt::random());
        let json = serde_json::to_string(&commitment).unwrap();
        assert_eq!(json, format!("\"{}\"", commitment.to_hex()));

        let back: Commitment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, commitment);

        let prefixed: Salt = format!("0x{}", "ab".repeat(32)).parse().unwrap();
        assert_eq!(prefixed.as_bytes(), &[0xab; 32]);
    }

    #[test]
    fn test_hex_rejects_wrong_length() {
        assert_eq!("abcd".parse::<Salt>(), Err(HexError::WrongLength(2)));
        assert!(matches!(
            "zz".parse::<Commitment>(),
            Err(HexError::InvalidHex(_))
        ));
        assert!(serde_json::from_str::<Commitment>("\"00\"").is_err());
    }
}
