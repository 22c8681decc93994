//! Validated identifiers and fingerprints
//!
//! Nothing here can hold an invalid value: constructors and deserialization
//! both go through the same checks.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh random (v4) id
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|e| {
                    DomainError::InvalidId(format!("{} '{}': {}", stringify!($name), s, e))
                })
            }
        }
    };
}

uuid_id! {
    /// Local identity of a tracked workflow record
    ///
    /// Assigned when the record is first created (first pull or local
    /// staging) and never changed afterwards.
    RecordId
}

uuid_id! {
    /// One registered remote endpoint
    ConnectionId
}

/// Characters that would change the meaning of a URL path or a file path
const FORBIDDEN_IN_REMOTE_ID: [char; 5] = ['/', '\\', '?', '#', '%'];

/// Identity of a workflow in the remote system
///
/// Opaque to us, but it is used verbatim as a URL path segment and a blob
/// file name, so it must be non-empty and free of path separators,
/// whitespace and URL delimiters (`?`, `#`, `%`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains forbidden characters
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be empty".to_string(),
            ));
        }

        if id
            .chars()
            .any(|c| FORBIDDEN_IN_REMOTE_ID.contains(&c) || c.is_whitespace() || c.is_control())
        {
            return Err(DomainError::InvalidRemoteId(format!(
                "Remote ID contains invalid characters: {id}"
            )));
        }

        if id == "." || id == ".." {
            return Err(DomainError::InvalidRemoteId(format!(
                "Remote ID is a reserved name: {id}"
            )));
        }

        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

/// Canonical content fingerprint (SHA-256, lowercase hex)
///
/// Produced by [`crate::hasher`]; never computed anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of a hex-encoded SHA-256 digest
    const HEX_LEN: usize = 64;

    /// Create a new ContentHash
    ///
    /// # Errors
    /// Returns error if the value is not 64 lowercase hex characters
    pub fn new(hash: impl Into<String>) -> Result<Self, DomainError> {
        let hash = hash.into();
        if hash.len() != Self::HEX_LEN {
            return Err(DomainError::InvalidHash(format!(
                "expected {} hex chars, got {}",
                Self::HEX_LEN,
                hash.len()
            )));
        }

        if !hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(DomainError::InvalidHash(format!(
                "not lowercase hex: {hash}"
            )));
        }

        Ok(Self(hash))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines and terminal output
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}
