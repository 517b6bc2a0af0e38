//! Attribute/operation compilation
//!
//! The compiler turns a live target into a [`ManagedRegistry`]: it asks the
//! hierarchy walker for every reachable operation, keeps the ones whose
//! resolution found management metadata, shapes them into attributes or
//! standalone operations, and recursively splices in composite children.
//!
//! Naming follows the accessor convention: a `get`/`set`/`is` prefix
//! followed by at least one character derives the exposed attribute name.
//! The match is purely textual, so `settle` shapes as a setter for `tle`;
//! callers own their naming discipline.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::CompileError;
use crate::meta::{CompositeMode, CompositeSpec, ManagedMeta, OpMeta};
use crate::registry::{Accessor, ManagedAttribute, ManagedOperation, ManagedRegistry};
use crate::supplier::Supplier;
use crate::types::{ActionSignature, Invoker, OperationDecl, TypeRegistry};
use crate::value::{ObjectHandle, VOID};

/// Compiles targets into managed registries against a shared type table.
pub struct ManagedCompiler {
    types: Arc<TypeRegistry>,
}

/// Shape of a reachable operation after prefix and arity classification.
enum Shape {
    Getter { exposed: String, boolean: bool },
    Setter { exposed: String },
    Action,
}

struct GetterCand {
    return_type: String,
    boolean: bool,
    meta: OpMeta,
    owner: String,
    invoker: Invoker,
}

struct SetterCand {
    param_type: String,
    meta: OpMeta,
    owner: String,
    invoker: Invoker,
}

struct CompositeCand {
    exposed: String,
    spec: CompositeSpec,
    invoker: Invoker,
}

impl ManagedCompiler {
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self { types }
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Compile `target` into an immutable registry.
    pub fn compile(&self, target: ObjectHandle) -> Result<ManagedRegistry, CompileError> {
        let type_name = target.type_name().to_string();
        let descriptor = self
            .types
            .get(&type_name)
            .ok_or_else(|| CompileError::UnknownType(type_name.clone()))?;
        let description = descriptor
            .meta
            .as_ref()
            .map(|meta| ManagedMeta::resolve(&[meta], &type_name).description)
            .unwrap_or_default();

        let mut attributes = FxHashMap::default();
        let mut operations = FxHashMap::default();
        self.compile_into(
            &mut attributes,
            &mut operations,
            &type_name,
            Supplier::Root(target),
            "",
        );
        debug!(
            type_name,
            attributes = attributes.len(),
            operations = operations.len(),
            "compiled managed registry"
        );
        Ok(ManagedRegistry::new(
            description,
            attributes,
            operations,
            self.types.clone(),
        ))
    }

    /// Compile one type's reachable operations into the shared maps.
    ///
    /// Children are compiled after the type's own members, in discovery
    /// order, so a flattened child overwrites on name collision
    /// (last-compiled wins). An unregistered child type simply contributes
    /// nothing: it has no reachable operations.
    fn compile_into(
        &self,
        attributes: &mut FxHashMap<String, ManagedAttribute>,
        operations: &mut FxHashMap<ActionSignature, ManagedOperation>,
        type_name: &str,
        supplier: Supplier,
        prefix: &str,
    ) {
        let mut pending: FxHashMap<String, (Option<GetterCand>, Option<SetterCand>)> =
            FxHashMap::default();
        let mut composites: Vec<CompositeCand> = Vec::new();

        for op in self.types.reachable_operations(type_name) {
            let Some(owner) = self.types.find_metadata_owner(type_name, &op.signature) else {
                continue; // not manageable; the common case
            };
            let Some(meta) = owner.decl.meta.clone() else {
                continue;
            };
            let Some(invoker) = self.types.find_invoker(type_name, &op.signature) else {
                debug!(signature = %op.signature, type_name, "manageable operation has no implementation; skipped");
                continue;
            };

            match classify(op.decl) {
                Shape::Getter { exposed, boolean } => {
                    if let Some(spec) = meta.composite {
                        composites.push(CompositeCand {
                            exposed,
                            spec,
                            invoker,
                        });
                        continue; // composites are not plain attributes
                    }
                    pending.entry(exposed).or_insert((None, None)).0 = Some(GetterCand {
                        return_type: op.decl.return_type.clone(),
                        boolean,
                        meta,
                        owner: owner.owner.to_string(),
                        invoker,
                    });
                }
                Shape::Setter { exposed } => {
                    pending.entry(exposed).or_insert((None, None)).1 = Some(SetterCand {
                        param_type: op.decl.params[0].type_name.clone(),
                        meta,
                        owner: owner.owner.to_string(),
                        invoker,
                    });
                }
                Shape::Action => {
                    let signature = ActionSignature {
                        name: format!("{prefix}{}", op.signature.name),
                        params: op.signature.params.clone(),
                    };
                    let resolved = ManagedMeta::resolve(&[&meta], owner.owner);
                    operations.insert(
                        signature.clone(),
                        ManagedOperation {
                            signature,
                            params: op.decl.params.clone(),
                            return_type: op.decl.return_type.clone(),
                            meta: resolved,
                            accessor: Accessor {
                                supplier: supplier.clone(),
                                invoker,
                            },
                        },
                    );
                }
            }
        }

        for (exposed, (getter, setter)) in pending {
            let name = format!("{prefix}{exposed}");

            let mut sources: Vec<&OpMeta> = Vec::new();
            if let Some(g) = &getter {
                sources.push(&g.meta);
            }
            if let Some(s) = &setter {
                sources.push(&s.meta);
            }
            let declared_by = getter
                .as_ref()
                .map(|g| g.owner.as_str())
                .or_else(|| setter.as_ref().map(|s| s.owner.as_str()))
                .unwrap_or(type_name);
            let meta = ManagedMeta::resolve(&sources, declared_by);

            let write_type = setter.as_ref().map(|s| s.param_type.clone());
            let value_type = getter
                .as_ref()
                .map(|g| g.return_type.clone())
                .or_else(|| write_type.clone())
                .unwrap_or_else(|| VOID.to_string());

            attributes.insert(
                name.clone(),
                ManagedAttribute {
                    name,
                    value_type,
                    write_type,
                    boolean_getter: getter.as_ref().map(|g| g.boolean).unwrap_or(false),
                    meta,
                    getter: getter.map(|g| Accessor {
                        supplier: supplier.clone(),
                        invoker: g.invoker,
                    }),
                    setter: setter.map(|s| Accessor {
                        supplier: supplier.clone(),
                        invoker: s.invoker,
                    }),
                },
            );
        }

        for composite in composites {
            let child_supplier = Supplier::composite(
                supplier.clone(),
                composite.invoker.clone(),
                composite.spec.cache,
            );
            // Probe the live target, never a cached prior value, to discover
            // the child's runtime type.
            match child_supplier.fetch_fresh() {
                Ok(Some(handle)) => {
                    let child_prefix = match composite.spec.mode {
                        CompositeMode::Flatten => prefix.to_string(),
                        CompositeMode::Nested => format!("{prefix}{}.", composite.exposed),
                    };
                    self.compile_into(
                        attributes,
                        operations,
                        handle.type_name(),
                        child_supplier,
                        &child_prefix,
                    );
                }
                Ok(None) => {
                    debug!(
                        attribute = composite.exposed,
                        type_name, "composite getter returned null during compilation; skipped"
                    );
                }
                Err(fault) => {
                    debug!(
                        attribute = composite.exposed,
                        type_name, %fault, "composite getter failed during compilation; skipped"
                    );
                }
            }
        }
    }
}

fn classify(decl: &OperationDecl) -> Shape {
    match accessor_prefix(&decl.name) {
        Some(("get", rest)) if decl.params.is_empty() && decl.return_type != VOID => {
            Shape::Getter {
                exposed: rest.to_string(),
                boolean: false,
            }
        }
        Some(("is", rest)) if decl.params.is_empty() && decl.return_type != VOID => Shape::Getter {
            exposed: rest.to_string(),
            boolean: decl.return_type == "bool",
        },
        Some(("set", rest)) if decl.params.len() == 1 => Shape::Setter {
            exposed: rest.to_string(),
        },
        _ => Shape::Action,
    }
}

/// Textual accessor-prefix match: `get`, `is`, or `set` followed by at least
/// one character.
fn accessor_prefix(name: &str) -> Option<(&'static str, &str)> {
    for prefix in ["get", "is", "set"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            if !rest.is_empty() {
                return Some((prefix, rest));
            }
        }
    }
    None
}
