//! Admission control for committing a finished draft.
//!
//! Registered travelers write to the durable store without limit. Anonymous
//! travelers get exactly one device-local slot; a second trip is refused
//! while that slot is occupied.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    Anonymous,
    Registered { user_id: Uuid },
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Identity::Anonymous => None,
            Identity::Registered { user_id } => Some(*user_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreTarget {
    Durable,
    Ephemeral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub target: StoreTarget,
    pub allowed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("anonymous trip limit reached: the device already holds a trip; register for unlimited trips")]
pub struct QuotaExceeded;

impl Authorization {
    pub fn require(self) -> Result<StoreTarget, QuotaExceeded> {
        if self.allowed {
            Ok(self.target)
        } else {
            Err(QuotaExceeded)
        }
    }
}

/// Decide where a finished draft may be written.
///
/// `existing_anonymous_trip_present` is ignored for registered callers.
pub fn authorize(identity: &Identity, existing_anonymous_trip_present: bool) -> Authorization {
    let authorization = match identity {
        Identity::Registered { .. } => Authorization {
            target: StoreTarget::Durable,
            allowed: true,
        },
        Identity::Anonymous => Authorization {
            target: StoreTarget::Ephemeral,
            allowed: !existing_anonymous_trip_present,
        },
    };

    tracing::debug!(
        anonymous = identity.is_anonymous(),
        target = ?authorization.target,
        allowed = authorization.allowed,
        "quota gate decision"
    );

    authorization
}
