//! # Version Registry
//!
//! Maps the raw protocol version a client announces to the codec variant
//! that speaks it.
//!
//! The registry is populated at startup and sealed before the first client
//! connects; after sealing it is a read-only table shared by every session.
//! Registering after seal, or registering the same raw version twice, is a
//! startup bug and fails loudly rather than silently shadowing an entry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::variant::{self, CodecVariant};

/// Raw-version to codec-variant table.
#[derive(Default)]
pub struct VersionRegistry {
    table: HashMap<i32, Arc<CodecVariant>>,
    sealed: bool,
}

impl std::fmt::Debug for VersionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionRegistry")
            .field("entries", &self.table.len())
            .field("sealed", &self.sealed)
            .finish()
    }
}

impl VersionRegistry {
    /// An empty, unsealed registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with every shipped revision, sealed.
    pub fn with_default_variants() -> Self {
        let mut registry = Self::new();
        let base = variant::v1110();
        let reserved = variant::v1112(Arc::clone(&base));
        let icons = variant::v1121(Arc::clone(&reserved));
        let le = variant::v1125(Arc::clone(&icons));

        // construction above cannot fail: fresh registry, distinct keys
        let _ = registry.register(base);
        let _ = registry.register(reserved);
        let _ = registry.register(icons);
        let _ = registry.register(le);
        registry.seal();
        registry
    }

    /// Register a variant under its own raw version.
    ///
    /// # Errors
    /// `ConfigError` if the registry is sealed or the version is taken.
    pub fn register(&mut self, codec: Arc<CodecVariant>) -> Result<()> {
        self.register_as(codec.raw_version(), codec)
    }

    /// Register a variant under an alias raw version. Lets several client
    /// builds that share a wire dialect resolve to one variant.
    ///
    /// # Errors
    /// `ConfigError` if the registry is sealed or the version is taken.
    pub fn register_as(&mut self, raw_version: i32, codec: Arc<CodecVariant>) -> Result<()> {
        if self.sealed {
            return Err(ProtocolError::ConfigError(
                constants::ERR_REGISTRY_SEALED.into(),
            ));
        }
        if self.table.contains_key(&raw_version) {
            return Err(ProtocolError::ConfigError(format!(
                "raw version {raw_version} already registered"
            )));
        }
        debug!(raw_version, tag = ?codec.tag(), "registered codec variant");
        self.table.insert(raw_version, codec);
        Ok(())
    }

    /// Freeze the table. Idempotent.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Number of registered raw versions.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Resolve the variant for an announced raw version.
    ///
    /// # Errors
    /// `UnknownRawVersion` for any version without an entry; unknown clients
    /// are rejected, never rounded to a neighbor.
    pub fn resolve(&self, raw_version: i32) -> Result<Arc<CodecVariant>> {
        self.table
            .get(&raw_version)
            .cloned()
            .ok_or(ProtocolError::UnknownRawVersion(raw_version))
    }
}
