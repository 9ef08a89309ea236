//! Identifier types for events, bills and participants
//!
//! All identifiers are opaque strings assigned by an external system (the inbox
//! for events, the administrative directory for participants). Bills do not get
//! their own identity: a bill is keyed by the event it was derived from, which
//! is what makes the ingestion upsert idempotent.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TallyError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string-like value
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of one item in the monitored inbox
    EventId
);

string_id!(
    /// Identifier of a participant in the directory
    ParticipantId
);

string_id!(
    /// Identifier of a bill, always derived from its source event
    BillId
);

impl BillId {
    /// The bill id for a given source event
    pub fn for_event(event_id: &EventId) -> Self {
        Self(event_id.0.clone())
    }
}

/// Checks that an identifier can be used as a storage document key.
///
/// Keys end up as path segments in the filesystem handler, so separators,
/// parent references and NUL bytes are rejected.
pub fn validate_document_key(key: &str) -> Result<(), TallyError> {
    if key.is_empty() {
        return Err(TallyError::invalid("Document key cannot be empty"));
    }
    if key.len() > 255 {
        return Err(TallyError::invalid("Document key too long (max 255 characters)"));
    }
    if key == "." || key.contains("..") || key.contains('/') || key.contains('\\') || key.contains('\0') {
        return Err(TallyError::invalid(format!(
            "Document key contains invalid characters: {key:?}"
        )));
    }
    Ok(())
}
