//! Tiller export tracking
//!
//! Binds compiled managed registries to canonical public names and tracks
//! the live bindings for teardown. The management-protocol server itself is
//! an external collaborator behind the [`ManagementServer`] trait; an
//! in-process implementation is provided for embedding and tests.

pub mod exporter;
pub mod name;
pub mod server;

pub use exporter::{Binding, ExportError, Exporter};
pub use name::{NameError, ObjectName, ObjectNameBuilder};
pub use server::{InMemoryServer, ManagementServer, ServerError};
