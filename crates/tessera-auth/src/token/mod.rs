//! Token issuance and verification.
//!
//! This module provides:
//!
//! - JWT encoding and verification (RS256/ES384)
//! - Access/refresh pair issuance with the embedded authorization snapshot
//! - Key generation and JWKS export

pub mod issuer;
pub mod jwt;

pub use issuer::{IssuedPair, SnapshotSource, TokenIssuer};
pub use jwt::{
    AccessClaims, Jwk, Jwks, JwtError, JwtService, RefreshClaims, SigningAlgorithm,
    SigningKeyPair, TOKEN_USE_ACCESS, TOKEN_USE_REFRESH,
};
