//! Export tracking
//!
//! The [`Exporter`] binds compiled registries to public names: compile the
//! target, register the dispatcher with the server collaborator, remember
//! the binding for later teardown. At most one live binding exists per
//! canonical name; exporting a bound name is a no-op-with-error that leaves
//! the existing binding untouched.
//!
//! Locking discipline: one mutex around the binding map, held across the
//! lookup/register/insert sequence so concurrent exports of the same name
//! serialize. Target operations are never invoked under that lock — the
//! compile step, which does run target getters, happens before it is taken.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use tiller_core::{CompileError, ManagedCompiler, ManagedRegistry, ObjectHandle, TypeRegistry};

use crate::name::ObjectName;
use crate::server::{ManagementServer, ServerError};

/// Errors raised by export tracking.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExportError {
    /// The name is already bound; the existing binding is untouched.
    #[error("'{0}' is already exported")]
    AlreadyExists(String),

    /// The name is not currently bound.
    #[error("'{0}' is not exported")]
    NotFound(String),

    /// The target could not be compiled into a registry.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The server collaborator failed.
    #[error("Management server failure for '{name}': {source}")]
    Server { name: String, source: ServerError },
}

/// One live name-to-registry association.
pub struct Binding {
    name: ObjectName,
    registry: Arc<ManagedRegistry>,
}

impl Binding {
    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn registry(&self) -> &Arc<ManagedRegistry> {
        &self.registry
    }
}

/// Tracks exported registries and guarantees name uniqueness.
pub struct Exporter {
    compiler: ManagedCompiler,
    server: Arc<dyn ManagementServer>,
    bindings: Mutex<FxHashMap<String, Binding>>,
}

impl Exporter {
    pub fn new(types: Arc<TypeRegistry>, server: Arc<dyn ManagementServer>) -> Self {
        Self {
            compiler: ManagedCompiler::new(types),
            server,
            bindings: Mutex::new(FxHashMap::default()),
        }
    }

    /// Compile `target` and bind the resulting registry to `name`.
    pub fn export(
        &self,
        name: ObjectName,
        target: ObjectHandle,
    ) -> Result<Arc<ManagedRegistry>, ExportError> {
        let key = name.canonical().to_string();
        // Cheap pre-check so an already-bound name never pays for a compile.
        if self.bindings.lock().contains_key(&key) {
            return Err(ExportError::AlreadyExists(key));
        }

        let registry = Arc::new(self.compiler.compile(target)?);

        let mut bindings = self.bindings.lock();
        if bindings.contains_key(&key) {
            return Err(ExportError::AlreadyExists(key));
        }
        self.server
            .register(registry.clone(), &name)
            .map_err(|source| match source {
                ServerError::AlreadyExists(existing) => ExportError::AlreadyExists(existing),
                other => ExportError::Server {
                    name: key.clone(),
                    source: other,
                },
            })?;
        debug!(name = %name, "exported");
        bindings.insert(
            key,
            Binding {
                name,
                registry: registry.clone(),
            },
        );
        Ok(registry)
    }

    /// Tear down the binding under `name`.
    ///
    /// The binding is dropped from tracking even when the server has already
    /// lost the name out-of-band; that failure is still reported.
    pub fn unexport(&self, name: &ObjectName) -> Result<(), ExportError> {
        let binding = {
            let mut bindings = self.bindings.lock();
            bindings
                .remove(name.canonical())
                .ok_or_else(|| ExportError::NotFound(name.canonical().to_string()))?
        };
        debug!(name = %name, "unexported");
        self.server
            .unregister(binding.name())
            .map_err(|source| ExportError::Server {
                name: name.canonical().to_string(),
                source,
            })
    }

    /// Tear down every tracked binding, continuing past individual failures.
    ///
    /// Returns a name-to-error map for the bindings whose server teardown
    /// failed; empty when nothing raced out-of-band.
    pub fn unexport_all(&self) -> FxHashMap<String, ExportError> {
        let drained: Vec<Binding> = {
            let mut bindings = self.bindings.lock();
            bindings.drain().map(|(_, binding)| binding).collect()
        };

        let mut failures = FxHashMap::default();
        for binding in drained {
            let key = binding.name().canonical().to_string();
            if let Err(source) = self.server.unregister(binding.name()) {
                failures.insert(
                    key.clone(),
                    ExportError::Server { name: key, source },
                );
            }
        }
        debug!(failures = failures.len(), "unexported all bindings");
        failures
    }

    /// The registry currently bound under `name`.
    pub fn registry(&self, name: &ObjectName) -> Option<Arc<ManagedRegistry>> {
        self.bindings
            .lock()
            .get(name.canonical())
            .map(|binding| binding.registry.clone())
    }

    pub fn contains(&self, name: &ObjectName) -> bool {
        self.bindings.lock().contains_key(name.canonical())
    }

    /// Canonical names of all live bindings, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::InMemoryServer;
    use tiller_core::TypeBuilder;

    fn fixture() -> (Exporter, Arc<InMemoryServer>) {
        let mut types = TypeRegistry::new();
        types.register(TypeBuilder::class("Empty").build());
        let server = Arc::new(InMemoryServer::new());
        (Exporter::new(Arc::new(types), server.clone()), server)
    }

    fn name(suffix: &str) -> ObjectName {
        ObjectName::builder("tiller")
            .property("name", suffix)
            .build()
            .unwrap()
    }

    #[test]
    fn test_export_unexport_lifecycle() {
        let (exporter, server) = fixture();
        exporter
            .export(name("a"), ObjectHandle::new("Empty", ()))
            .unwrap();
        assert!(exporter.contains(&name("a")));
        assert!(server.lookup(&name("a")).is_some());

        exporter.unexport(&name("a")).unwrap();
        assert!(!exporter.contains(&name("a")));
        assert!(server.lookup(&name("a")).is_none());
    }

    #[test]
    fn test_unexport_unbound_name() {
        let (exporter, _server) = fixture();
        assert_eq!(
            exporter.unexport(&name("a")),
            Err(ExportError::NotFound("tiller:name=a".into()))
        );
    }

    #[test]
    fn test_unknown_type_fails_compile() {
        let (exporter, server) = fixture();
        let err = exporter
            .export(name("a"), ObjectHandle::new("Ghost", ()))
            .unwrap_err();
        assert_eq!(
            err,
            ExportError::Compile(CompileError::UnknownType("Ghost".into()))
        );
        assert!(server.is_empty());
        assert!(exporter.is_empty());
    }
}
