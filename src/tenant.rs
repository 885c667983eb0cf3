//! Tenant identity and cache key namespacing
//!
//! Every cache key is built here. A logical key such as
//! `appointments:barberId=X` only ever reaches a backend as
//! `tenant:{id}:appointments:barberId=X`, and the only way to obtain a
//! [`CacheKey`] is through [`TenantKeyResolver`].

use crate::error::{BookingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every tenant-scoped key.
pub const TENANT_KEY_PREFIX: &str = "tenant:";

/// Opaque storefront identifier.
///
/// Must be non-empty and may not contain whitespace or `:`, so that one
/// tenant's prefix can never be a prefix of another tenant's keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parse a raw identifier, returning `None` when it is unusable.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains(':') || trimmed.chars().any(char::is_whitespace)
        {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value).ok_or(BookingError::NoTenantContext)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Explicit tenant context passed into every cache and repository call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<TenantId>,
}

impl TenantContext {
    /// Context for a known tenant. An unusable identifier yields an empty context.
    pub fn new(tenant: &str) -> Self {
        Self {
            tenant_id: TenantId::parse(tenant),
        }
    }

    /// Context resolved from whatever the caller found at runtime (header,
    /// subdomain, session). `None` or junk produces an empty context.
    pub fn from_raw(raw: Option<&str>) -> Self {
        Self {
            tenant_id: raw.and_then(TenantId::parse),
        }
    }

    /// Context with no tenant.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    /// The tenant, or `NoTenantContext`.
    pub fn require(&self) -> Result<&TenantId> {
        self.tenant_id.as_ref().ok_or(BookingError::NoTenantContext)
    }
}

impl From<TenantId> for TenantContext {
    fn from(id: TenantId) -> Self {
        Self {
            tenant_id: Some(id),
        }
    }
}

/// A fully qualified, tenant-prefixed cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    full: String,
    prefix_len: usize,
}

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// The key without its tenant prefix.
    pub fn logical(&self) -> &str {
        self.full.get(self.prefix_len..).unwrap_or_default()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// Maps a tenant context to its key namespace.
pub struct TenantKeyResolver;

impl TenantKeyResolver {
    /// `tenant:{id}:` for an already-resolved tenant.
    pub fn tenant_prefix(tenant: &TenantId) -> String {
        format!("{TENANT_KEY_PREFIX}{tenant}:")
    }

    /// Namespace prefix for the context's tenant.
    pub fn prefix(ctx: &TenantContext) -> Result<String> {
        ctx.require().map(Self::tenant_prefix)
    }

    /// Qualify `logical` with the context's tenant.
    pub fn key(ctx: &TenantContext, logical: &str) -> Result<CacheKey> {
        ctx.require().map(|tenant| Self::key_for(tenant, logical))
    }

    /// Qualify `logical` with an already-resolved tenant.
    pub fn key_for(tenant: &TenantId, logical: &str) -> CacheKey {
        let prefix = Self::tenant_prefix(tenant);
        let prefix_len = prefix.len();
        CacheKey {
            full: prefix + logical,
            prefix_len,
        }
    }

    /// Strip a tenant's prefix from a raw backend key, if it belongs to that tenant.
    pub fn logical_part<'a>(tenant: &TenantId, raw_key: &'a str) -> Option<&'a str> {
        raw_key.strip_prefix(&Self::tenant_prefix(tenant))
    }
}
