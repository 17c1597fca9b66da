//! Domain types for the credential lifecycle engine.
//!
//! Records mirror the persisted tables one-to-one:
//!
//! - [`CredentialRecord`] - refresh-token rows
//! - [`SessionRecord`] - session rows
//! - [`BlacklistEntry`] - revocation blacklist rows
//! - [`ReplayMarker`] - single-use assertion markers

pub mod assertion;
pub mod blacklist;
pub mod credential;
pub mod device;
pub mod pair;
pub mod reason;
pub mod session;
pub mod snapshot;

pub use assertion::ReplayMarker;
pub use blacklist::{BlacklistEntry, TokenClass};
pub use credential::CredentialRecord;
pub use device::DeviceInfo;
pub use pair::TokenPair;
pub use reason::RevocationReason;
pub use session::SessionRecord;
pub use snapshot::{AuthorizationSnapshot, MAX_HIERARCHY_ROOTS, OrgAccess};
