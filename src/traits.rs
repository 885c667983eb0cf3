//! Backend and Repository Traits
//!
//! Trait seams of the crate:
//!
//! - `CacheCodec`: pluggable serialization for cached values
//! - `CacheBackend`: the raw key/value store under the tenant cache
//! - `AppointmentRepository`: the remote source of truth
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use tenant_slot_cache::{CacheBackend, async_trait};
//! use std::time::Duration;
//! use anyhow::Result;
//!
//! struct MyStore { /* ... */ }
//!
//! #[async_trait]
//! impl CacheBackend for MyStore {
//!     async fn get_with_ttl(&self, key: &str) -> Option<(Vec<u8>, Duration)> { /* ... */ }
//!     async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> { /* ... */ }
//!     async fn remove(&self, key: &str) -> Result<()> { /* ... */ }
//!     async fn remove_prefix(&self, prefix: &str) -> Result<Vec<String>> { /* ... */ }
//!     async fn health_check(&self) -> bool { /* ... */ }
//! }
//! ```

use crate::error::RepositoryError;
use crate::models::{AppointmentFilter, AppointmentPatch, AppointmentRecord, BookingRequest};
use crate::tenant::TenantId;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;

/// Trait for cache value serialization/deserialization
///
/// Implementations must be `Send + Sync + Debug` so a codec can be shared
/// across tasks and show up in debug output.
pub trait CacheCodec: Send + Sync + Debug {
    /// Serialize a value to bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented by this codec.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize bytes to a value
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not decode to `T`.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// Raw key/value store with per-key TTL
///
/// Keys arriving here are already tenant-prefixed. Expiry is evaluated on
/// read: an expired entry is reported as missing and evicted.
///
/// Implementations must be `Send + Sync` to support concurrent access across async tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get value by key together with the time left before it expires
    ///
    /// * `Some((bytes, remaining))` - Value found and not expired
    /// * `None` - Key not found or expired
    async fn get_with_ttl(&self, key: &str) -> Option<(Vec<u8>, Duration)>;

    /// Get value by key
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.get_with_ttl(key).await.map(|(value, _)| value)
    }

    /// Store a value, replacing any previous entry
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Remove a value (succeeds if it did not exist)
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every key starting with `prefix`, returning the removed keys
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn remove_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Check if the backend is operational
    async fn health_check(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Remote source of truth for appointments
///
/// Every call carries the resolved tenant explicitly; the implementation is
/// responsible for enforcing it on its side.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// All appointments of `tenant` matching `filter`.
    async fn find_all(
        &self,
        tenant: &TenantId,
        filter: &AppointmentFilter,
    ) -> std::result::Result<Vec<AppointmentRecord>, RepositoryError>;

    async fn find_by_id(
        &self,
        tenant: &TenantId,
        id: &str,
    ) -> std::result::Result<Option<AppointmentRecord>, RepositoryError>;

    /// Create an appointment and return it with its server-issued id.
    ///
    /// Must fail with [`RepositoryError::Conflict`] when the slot is taken.
    async fn create(
        &self,
        tenant: &TenantId,
        request: &BookingRequest,
    ) -> std::result::Result<AppointmentRecord, RepositoryError>;

    async fn update(
        &self,
        tenant: &TenantId,
        id: &str,
        patch: &AppointmentPatch,
    ) -> std::result::Result<AppointmentRecord, RepositoryError>;

    async fn delete(&self, tenant: &TenantId, id: &str) -> std::result::Result<(), RepositoryError>;

    async fn exists(&self, tenant: &TenantId, id: &str) -> std::result::Result<bool, RepositoryError>;
}
