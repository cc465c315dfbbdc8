//! External identity and membership directory.
//!
//! The gateway never looks up business records itself. Three questions are
//! delegated to the directory:
//!
//! - who does this bearer credential belong to,
//! - what is this subject's entitlement,
//! - which storage key does this business identifier map to.

mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;
use crate::token::BucketClass;

pub use remote::HttpDirectory;

/// Membership state of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    Approved,
    Pending,
    Rejected,
    Expired,
    None,
}

/// A subject's entitlement, as cached by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementDecision {
    pub status: EntitlementStatus,

    /// End of the membership term (Unix epoch seconds), if it has one
    #[serde(default)]
    pub expires_at: Option<u64>,
}

impl EntitlementDecision {
    pub fn approved(expires_at: Option<u64>) -> Self {
        Self {
            status: EntitlementStatus::Approved,
            expires_at,
        }
    }

    pub fn none() -> Self {
        Self {
            status: EntitlementStatus::None,
            expires_at: None,
        }
    }

    /// Whether this decision grants access to non-free content at `now`.
    pub fn is_entitled_at(&self, now: u64) -> bool {
        self.status == EntitlementStatus::Approved && self.expires_at.map_or(true, |end| now < end)
    }
}

/// Where a business resource lives in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLocation {
    pub bucket_class: BucketClass,
    pub key: String,

    /// Free resources skip the entitlement check
    #[serde(default)]
    pub free: bool,

    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub content_type: Option<String>,
}

/// The directory collaborator.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve a bearer credential to a subject id, `None` if it is not valid.
    async fn authenticate(&self, bearer: &str) -> Result<Option<String>, DirectoryError>;

    /// Current entitlement of `subject`.
    async fn entitlement(&self, subject: &str) -> Result<EntitlementDecision, DirectoryError>;

    /// Map a business identifier to a storage location, `None` if unknown.
    async fn resolve_resource(
        &self,
        resource_id: &str,
    ) -> Result<Option<ResourceLocation>, DirectoryError>;
}
