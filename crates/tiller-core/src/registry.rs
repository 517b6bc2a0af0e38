//! The immutable managed registry and its dispatch front
//!
//! A [`ManagedRegistry`] is built once per target snapshot by the compiler
//! and never mutated afterwards: dispatch is a hash lookup plus a delegate
//! call into the target, so concurrent reads need no locking here. The one
//! piece of interior mutability is composite memoization, owned by the
//! suppliers.
//!
//! Error semantics are strict at dispatch time: a missing name or signature
//! is always an error, never a silent default. The bulk variants are the
//! documented exception — best-effort, per-element, reporting failures by
//! omission.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::trace;

use crate::error::{DispatchError, DispatchResult, TargetFault};
use crate::meta::{ManagedMeta, TagMap};
use crate::supplier::Supplier;
use crate::types::{ActionSignature, Invoker, ParamDecl, TypeRegistry};
use crate::value::{is_primitive, Value};

/// A supplier/invoker pair: fetch the object, run the declaration.
#[derive(Clone)]
pub(crate) struct Accessor {
    pub(crate) supplier: Supplier,
    pub(crate) invoker: Invoker,
}

impl Accessor {
    pub(crate) fn call(&self, args: &[Value]) -> Result<Value, TargetFault> {
        let handle = self
            .supplier
            .fetch()?
            .ok_or_else(|| TargetFault::runtime("composite target is null"))?;
        (self.invoker)(handle.as_any(), args)
    }
}

/// A named, typed property backed by a getter and/or setter.
pub struct ManagedAttribute {
    pub(crate) name: String,
    pub(crate) value_type: String,
    pub(crate) write_type: Option<String>,
    pub(crate) boolean_getter: bool,
    pub(crate) meta: ManagedMeta,
    pub(crate) getter: Option<Accessor>,
    pub(crate) setter: Option<Accessor>,
}

impl ManagedAttribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared value type: the getter's return type, or the setter's
    /// parameter type for write-only attributes.
    pub fn value_type(&self) -> &str {
        &self.value_type
    }

    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// True when the getter uses the `is` prefix and returns bool.
    pub fn is_boolean_getter(&self) -> bool {
        self.boolean_getter
    }

    pub fn meta(&self) -> &ManagedMeta {
        &self.meta
    }
}

impl fmt::Debug for ManagedAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedAttribute")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// An invokable, non-attribute operation.
pub struct ManagedOperation {
    pub(crate) signature: ActionSignature,
    pub(crate) params: Vec<ParamDecl>,
    pub(crate) return_type: String,
    pub(crate) meta: ManagedMeta,
    pub(crate) accessor: Accessor,
}

impl ManagedOperation {
    pub fn signature(&self) -> &ActionSignature {
        &self.signature
    }

    pub fn params(&self) -> &[ParamDecl] {
        &self.params
    }

    pub fn return_type(&self) -> &str {
        &self.return_type
    }

    pub fn meta(&self) -> &ManagedMeta {
        &self.meta
    }
}

impl fmt::Debug for ManagedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedOperation")
            .field("signature", &self.signature)
            .field("return_type", &self.return_type)
            .finish()
    }
}

/// Immutable, name-indexed registry over one target snapshot.
pub struct ManagedRegistry {
    description: String,
    attributes: FxHashMap<String, ManagedAttribute>,
    operations: FxHashMap<ActionSignature, ManagedOperation>,
    types: Arc<TypeRegistry>,
}

impl ManagedRegistry {
    pub(crate) fn new(
        description: String,
        attributes: FxHashMap<String, ManagedAttribute>,
        operations: FxHashMap<ActionSignature, ManagedOperation>,
        types: Arc<TypeRegistry>,
    ) -> Self {
        Self {
            description,
            attributes,
            operations,
            types,
        }
    }

    /// Class-level description of the target's concrete type.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn attribute(&self, name: &str) -> Option<&ManagedAttribute> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &ManagedAttribute> {
        self.attributes.values()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn operation(&self, signature: &ActionSignature) -> Option<&ManagedOperation> {
        self.operations.get(signature)
    }

    pub fn operations(&self) -> impl Iterator<Item = &ManagedOperation> {
        self.operations.values()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Read an attribute by name.
    pub fn get_attribute(&self, name: &str) -> DispatchResult<Value> {
        trace!(attribute = name, "get");
        let attribute = self
            .attributes
            .get(name)
            .ok_or_else(|| DispatchError::AttributeNotFound(name.to_string()))?;
        let getter = attribute
            .getter
            .as_ref()
            .ok_or_else(|| DispatchError::AttributeNotFound(name.to_string()))?;
        Ok(getter.call(&[])?)
    }

    /// Write an attribute by name, checking assignability first.
    pub fn set_attribute(&self, name: &str, value: Value) -> DispatchResult<()> {
        trace!(attribute = name, "set");
        let attribute = self
            .attributes
            .get(name)
            .ok_or_else(|| DispatchError::AttributeNotFound(name.to_string()))?;
        let setter = attribute
            .setter
            .as_ref()
            .ok_or_else(|| DispatchError::AttributeNotFound(name.to_string()))?;
        let expected = attribute
            .write_type
            .as_deref()
            .unwrap_or(&attribute.value_type);
        if !self.value_assignable(expected, &value) {
            return Err(DispatchError::InvalidValue {
                name: name.to_string(),
                expected: expected.to_string(),
                actual: value.type_name().to_string(),
            });
        }
        setter.call(&[value])?;
        Ok(())
    }

    /// Invoke an operation by its full action signature.
    pub fn invoke(&self, name: &str, args: &[Value], arg_types: &[&str]) -> DispatchResult<Value> {
        let signature = ActionSignature::new(name, arg_types);
        trace!(%signature, "invoke");
        let operation = self
            .operations
            .get(&signature)
            .ok_or(DispatchError::OperationNotFound(signature))?;
        Ok(operation.accessor.call(args)?)
    }

    /// Best-effort batch read: failing names are dropped from the result.
    pub fn get_attributes(&self, names: &[&str]) -> Vec<(String, Value)> {
        names
            .iter()
            .filter_map(|name| {
                self.get_attribute(name)
                    .ok()
                    .map(|value| ((*name).to_string(), value))
            })
            .collect()
    }

    /// Best-effort batch write: returns the pairs actually applied, skipping
    /// failures.
    pub fn set_attributes(&self, entries: Vec<(String, Value)>) -> Vec<(String, Value)> {
        entries
            .into_iter()
            .filter(|(name, value)| self.set_attribute(name, value.clone()).is_ok())
            .collect()
    }

    /// Passive, serializable snapshot of the registry's shape and metadata.
    pub fn info(&self) -> RegistryInfo {
        let mut attributes: Vec<AttributeInfo> = self
            .attributes
            .values()
            .map(|a| AttributeInfo {
                name: a.name.clone(),
                value_type: a.value_type.clone(),
                readable: a.is_readable(),
                writable: a.is_writable(),
                boolean_getter: a.boolean_getter,
                description: a.meta.description.clone(),
                tags: a.meta.tags.clone(),
            })
            .collect();
        attributes.sort_by(|a, b| a.name.cmp(&b.name));

        let mut operations: Vec<OperationInfo> = self
            .operations
            .values()
            .map(|o| OperationInfo {
                name: o.signature.name.clone(),
                params: o
                    .params
                    .iter()
                    .map(|p| ParamInfo {
                        name: p.name.clone(),
                        type_name: p.type_name.clone(),
                        description: p.description.clone(),
                        tags: p.tags.clone(),
                    })
                    .collect(),
                return_type: o.return_type.clone(),
                description: o.meta.description.clone(),
                tags: o.meta.tags.clone(),
            })
            .collect();
        operations.sort_by(|a, b| (&a.name, a.params.len()).cmp(&(&b.name, b.params.len())));

        RegistryInfo {
            description: self.description.clone(),
            attributes,
            operations,
        }
    }

    fn value_assignable(&self, declared: &str, value: &Value) -> bool {
        if is_primitive(declared) {
            // Exact family match; Null is rejected for primitives.
            return value.type_name() == declared;
        }
        match value {
            Value::Null => true,
            Value::Object(handle) => self.types.is_assignable(handle.type_name(), declared),
            other => other.type_name() == declared,
        }
    }
}

impl fmt::Debug for ManagedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedRegistry")
            .field("description", &self.description)
            .field("attributes", &self.attributes.len())
            .field("operations", &self.operations.len())
            .finish()
    }
}

/// Serializable registry snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryInfo {
    pub description: String,
    pub attributes: Vec<AttributeInfo>,
    pub operations: Vec<OperationInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributeInfo {
    pub name: String,
    pub value_type: String,
    pub readable: bool,
    pub writable: bool,
    pub boolean_getter: bool,
    pub description: String,
    pub tags: TagMap,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationInfo {
    pub name: String,
    pub params: Vec<ParamInfo>,
    pub return_type: String,
    pub description: String,
    pub tags: TagMap,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamInfo {
    pub name: String,
    pub type_name: String,
    pub description: String,
    pub tags: TagMap,
}
