//! Management-protocol server collaborator
//!
//! The actual server (remote connectivity, wire protocol) lives outside this
//! crate and is consumed through [`ManagementServer`]: register a dispatcher
//! under a name, unregister by name, nothing more. [`InMemoryServer`] is a
//! complete in-process implementation, enough for embedding and for the
//! integration tests.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use tiller_core::ManagedRegistry;

use crate::name::ObjectName;

/// Errors surfaced by a management server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServerError {
    #[error("A registry is already registered under '{0}'")]
    AlreadyExists(String),

    #[error("No registry registered under '{0}'")]
    NotFound(String),

    #[error("Registration failed: {0}")]
    Registration(String),
}

/// The narrow server contract export tracking depends on.
pub trait ManagementServer: Send + Sync {
    /// Register a dispatcher under `name`.
    fn register(&self, registry: Arc<ManagedRegistry>, name: &ObjectName)
        -> Result<(), ServerError>;

    /// Remove the registration under `name`.
    fn unregister(&self, name: &ObjectName) -> Result<(), ServerError>;
}

/// In-process server keeping registrations in a map.
#[derive(Default)]
pub struct InMemoryServer {
    registrations: Mutex<FxHashMap<String, Arc<ManagedRegistry>>>,
}

impl InMemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a registered dispatcher by name.
    pub fn lookup(&self, name: &ObjectName) -> Option<Arc<ManagedRegistry>> {
        self.registrations.lock().get(name.canonical()).cloned()
    }

    /// Canonical names of all current registrations, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registrations.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.lock().is_empty()
    }
}

impl ManagementServer for InMemoryServer {
    fn register(
        &self,
        registry: Arc<ManagedRegistry>,
        name: &ObjectName,
    ) -> Result<(), ServerError> {
        let mut registrations = self.registrations.lock();
        let key = name.canonical().to_string();
        if registrations.contains_key(&key) {
            return Err(ServerError::AlreadyExists(key));
        }
        registrations.insert(key, registry);
        Ok(())
    }

    fn unregister(&self, name: &ObjectName) -> Result<(), ServerError> {
        let mut registrations = self.registrations.lock();
        match registrations.remove(name.canonical()) {
            Some(_) => Ok(()),
            None => Err(ServerError::NotFound(name.canonical().to_string())),
        }
    }
}
