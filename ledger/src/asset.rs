//! # Asset Kinds
//!
//! Every amount in the ledger is denominated in some fungible asset: the
//! network's native value, or a specific token. The distinction is a tagged
//! variant consumed by the value-transfer boundary, not type-level
//! polymorphism -- a vouch record and an escrow balance carry their
//! [`AssetKind`] as data.
//!
//! Token identifiers are deterministic BLAKE3 hashes of the token's
//! canonical properties (symbol and issuer). The same token always gets the
//! same id regardless of where it is first seen, so no registry or
//! coordination is needed.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// A unique, content-addressed identifier for a fungible token.
///
/// Computed as `BLAKE3(symbol || 0x00 || issuer)`. The separator byte
/// prevents ambiguity when one field's suffix matches another's prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId([u8; 32]);

impl TokenId {
    /// Creates a `TokenId` from a raw 32-byte hash.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32-byte identifier.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the hex-encoded token id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded token id.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Derives a `TokenId` from the token's canonical properties.
    pub fn derive(symbol: &str, issuer: &str) -> Self {
        let mut preimage = Vec::with_capacity(symbol.len() + issuer.len() + 1);
        preimage.extend_from_slice(symbol.as_bytes());
        preimage.push(0x00);
        preimage.extend_from_slice(issuer.as_bytes());

        Self(*blake3::hash(&preimage).as_bytes())
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for TokenId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// ---------------------------------------------------------------------------
// AssetKind
// ---------------------------------------------------------------------------

/// The asset an amount is denominated in.
///
/// Escrow balances are keyed by `(profile, AssetKind)` and the transfer
/// boundary receives the kind alongside every outbound amount, so a single
/// ledger instance can hold balances in any number of assets without
/// ever confusing their units.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// The network's native value unit.
    Native,

    /// A specific fungible token, identified by its content-addressed id.
    Token(TokenId),
}

impl AssetKind {
    /// Returns `true` for the native asset.
    pub fn is_native(&self) -> bool {
        matches!(self, AssetKind::Native)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Native => write!(f, "native"),
            AssetKind::Token(id) => write!(f, "token:{}", id),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
