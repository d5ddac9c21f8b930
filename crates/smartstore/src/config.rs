//! Client configuration.

use serde::{Deserialize, Serialize};

use smartstore_core::UserId;

/// Configuration for [`SmartStoreClient`](crate::SmartStoreClient).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// The authenticated user whose stores `store(name)` opens.
    ///
    /// Without one, only global stores and explicit-user calls work.
    pub current_user: Option<UserId>,
}

impl ClientConfig {
    /// Config with a current user.
    pub fn for_user(user: UserId) -> Self {
        Self {
            current_user: Some(user),
        }
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
