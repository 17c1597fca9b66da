//! Typed federated-claim extraction.
//!
//! Federated-login payloads arrive as a bag of claim-URI/value pairs. This
//! module maps a *closed* set of known claim URIs onto a fixed profile
//! structure, with an explicit error when a required claim is absent. There
//! is deliberately no generic "find something that looks like an email"
//! scan: a claim either has a known URI or it is ignored.

use std::collections::HashMap;

use crate::AuthResult;
use crate::error::AuthError;

/// Claim URI carrying the immutable subject identifier.
pub const CLAIM_SUBJECT: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";

/// Claim URI carrying the email address.
pub const CLAIM_EMAIL: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress";

/// Claim URI carrying the display name.
pub const CLAIM_NAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";

/// Claim URI carrying the given name.
pub const CLAIM_GIVEN_NAME: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/givenname";

/// Claim URI carrying the surname.
pub const CLAIM_SURNAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/surname";

/// Profile extracted from a federated assertion's claims.
///
/// `subject` and `email` are required; everything else is best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedProfile {
    /// Immutable subject identifier from the identity provider.
    pub subject: String,

    /// Email address.
    pub email: String,

    /// Display name, when present.
    pub display_name: Option<String>,

    /// Given name, when present.
    pub given_name: Option<String>,

    /// Surname, when present.
    pub surname: Option<String>,
}

impl FederatedProfile {
    /// Extracts a profile from a claim map.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` when a required claim is absent or empty. Unknown
    /// claim URIs are ignored.
    pub fn from_claims(claims: &HashMap<String, String>) -> AuthResult<Self> {
        let subject = required_claim(claims, CLAIM_SUBJECT)?;
        let email = required_claim(claims, CLAIM_EMAIL)?;

        Ok(Self {
            subject,
            email,
            display_name: optional_claim(claims, CLAIM_NAME),
            given_name: optional_claim(claims, CLAIM_GIVEN_NAME),
            surname: optional_claim(claims, CLAIM_SURNAME),
        })
    }
}

fn required_claim(claims: &HashMap<String, String>, uri: &str) -> AuthResult<String> {
    match claims.get(uri).map(String::as_str).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(AuthError::invalid(format!("missing required claim: {uri}"))),
    }
}

fn optional_claim(claims: &HashMap<String, String>, uri: &str) -> Option<String> {
    claims
        .get(uri)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
