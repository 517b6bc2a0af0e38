//! Manageable-type descriptors and the type relationship table
//!
//! There is no reflection anywhere in this crate. Each manageable type
//! pre-registers a [`TypeDescriptor`] in a [`TypeRegistry`]: its superclass
//! edge, its implemented interfaces in declaration order, and its operation
//! declarations with optional management annotations and invoker closures.
//! The registry is the sole source of hierarchy information for resolution,
//! compilation, and assignability checks.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::TargetFault;
use crate::meta::{OpMeta, TagMap, TagValue};
use crate::value::{Value, VOID};

/// Identity of an operation for dispatch: name plus ordered parameter type
/// names. Two declarations with equal signatures are the same operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ActionSignature {
    pub name: String,
    pub params: Vec<String>,
}

impl ActionSignature {
    pub fn new(name: &str, params: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl fmt::Display for ActionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// Invoker closure running a declaration against an erased target.
pub type Invoker = Arc<dyn Fn(&dyn Any, &[Value]) -> Result<Value, TargetFault> + Send + Sync>;

/// Downcast an erased target to its concrete type.
///
/// A mismatch means the registry was compiled against the wrong table entry,
/// which is breakage in the management layer, not in the target.
pub fn downcast<T: Any>(target: &dyn Any) -> Result<&T, TargetFault> {
    target.downcast_ref::<T>().ok_or_else(|| {
        TargetFault::fatal(format!("target is not a {}", std::any::type_name::<T>()))
    })
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub type_name: String,
    pub description: String,
    pub tags: TagMap,
}

impl ParamDecl {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            description: String::new(),
            tags: TagMap::new(),
        }
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.tags.insert(key, value);
        self
    }
}

/// One operation declaration on a type descriptor.
#[derive(Clone)]
pub struct OperationDecl {
    pub name: String,
    pub params: Vec<ParamDecl>,
    /// `"void"` when the operation returns nothing.
    pub return_type: String,
    /// Compiler-synthesized bridge/covariant shim. Bridges are never
    /// considered during resolution; only authored declarations count.
    pub bridge: bool,
    pub meta: Option<OpMeta>,
    /// Concrete implementation. Interface declarations may carry one to
    /// model default methods, or none when purely abstract.
    pub invoker: Option<Invoker>,
}

impl OperationDecl {
    pub fn signature(&self) -> ActionSignature {
        ActionSignature {
            name: self.name.clone(),
            params: self.params.iter().map(|p| p.type_name.clone()).collect(),
        }
    }
}

impl fmt::Debug for OperationDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDecl")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .field("bridge", &self.bridge)
            .field("meta", &self.meta)
            .field("has_invoker", &self.invoker.is_some())
            .finish()
    }
}

/// Consuming builder for an [`OperationDecl`].
pub struct OperationBuilder {
    decl: OperationDecl,
}

impl OperationBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            decl: OperationDecl {
                name: name.to_string(),
                params: Vec::new(),
                return_type: VOID.to_string(),
                bridge: false,
                meta: None,
                invoker: None,
            },
        }
    }

    /// Append a parameter; declaration order is signature order.
    pub fn param(mut self, param: ParamDecl) -> Self {
        self.decl.params.push(param);
        self
    }

    /// Set the return type (defaults to `"void"`).
    pub fn returns(mut self, type_name: &str) -> Self {
        self.decl.return_type = type_name.to_string();
        self
    }

    /// Mark as a compiler-synthesized bridge shim.
    pub fn bridge(mut self) -> Self {
        self.decl.bridge = true;
        self
    }

    /// Attach a management annotation.
    pub fn managed(mut self, meta: OpMeta) -> Self {
        self.decl.meta = Some(meta);
        self
    }

    /// Attach the concrete implementation.
    pub fn invoke<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Any, &[Value]) -> Result<Value, TargetFault> + Send + Sync + 'static,
    {
        self.decl.invoker = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> OperationDecl {
        self.decl
    }
}

/// A registered type: hierarchy edges plus operation declarations.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: String,
    pub superclass: Option<String>,
    /// Directly implemented interfaces, declaration order preserved. The
    /// order is load-bearing: resolution ties break on the first interface.
    pub interfaces: Vec<String>,
    pub interface: bool,
    /// Type-level annotation supplying the class description.
    pub meta: Option<OpMeta>,
    pub operations: Vec<OperationDecl>,
}

impl TypeDescriptor {
    /// Exact (name, parameter types) match among authored declarations.
    /// Bridge shims are invisible here.
    pub fn find_exact(&self, signature: &ActionSignature) -> Option<&OperationDecl> {
        self.operations
            .iter()
            .find(|op| !op.bridge && op.signature() == *signature)
    }
}

/// Consuming builder for a [`TypeDescriptor`].
pub struct TypeBuilder {
    descriptor: TypeDescriptor,
}

impl TypeBuilder {
    pub fn class(name: &str) -> Self {
        Self {
            descriptor: TypeDescriptor {
                name: name.to_string(),
                superclass: None,
                interfaces: Vec::new(),
                interface: false,
                meta: None,
                operations: Vec::new(),
            },
        }
    }

    pub fn interface(name: &str) -> Self {
        let mut builder = Self::class(name);
        builder.descriptor.interface = true;
        builder
    }

    pub fn extends(mut self, superclass: &str) -> Self {
        self.descriptor.superclass = Some(superclass.to_string());
        self
    }

    /// Append an implemented interface; call order is declaration order.
    pub fn implements(mut self, interface: &str) -> Self {
        self.descriptor.interfaces.push(interface.to_string());
        self
    }

    /// Attach the type-level annotation (class description).
    pub fn managed(mut self, meta: OpMeta) -> Self {
        self.descriptor.meta = Some(meta);
        self
    }

    pub fn operation(mut self, op: OperationBuilder) -> Self {
        self.descriptor.operations.push(op.build());
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

/// The statically available type-relationship table.
///
/// Registered once at startup, then shared read-only behind an `Arc` by
/// compilers and registries. Re-registering a name replaces the previous
/// descriptor.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: FxHashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
