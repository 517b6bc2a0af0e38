//! Type-hierarchy walking and metadata resolution
//!
//! Given a concrete type, resolution answers two questions per operation:
//! which declaration is the most-derived one (and therefore supplies the
//! implementation), and which declaration's management metadata wins. The
//! search order is the documented contract: the type itself, then the
//! superclass subtree, then each directly declared interface in declaration
//! order, first match winning.
//!
//! Absence of metadata anywhere in the hierarchy is the common case, not an
//! error: the operation is simply not manageable.

use rustc_hash::FxHashSet;

use crate::types::{ActionSignature, Invoker, OperationDecl, TypeDescriptor, TypeRegistry};

/// A publicly reachable operation with its most-derived declaration.
#[derive(Debug)]
pub struct ReachableOp<'a> {
    pub signature: ActionSignature,
    /// Type whose descriptor holds the most-derived declaration.
    pub declared_in: &'a str,
    pub decl: &'a OperationDecl,
}

/// The declaration whose metadata wins resolution for one signature.
#[derive(Debug)]
pub struct MetaOwner<'a> {
    /// Type whose descriptor supplied the winning annotation.
    pub owner: &'a str,
    pub decl: &'a OperationDecl,
}

impl TypeRegistry {
    /// Enumerate all publicly reachable operations of `type_name`.
    ///
    /// One entry per distinct action signature, keeping the most-derived
    /// declaration. Signatures match on the full parameter type list, so a
    /// same-name override with different parameter types is a distinct
    /// operation. Bridge shims never appear.
    pub fn reachable_operations(&self, type_name: &str) -> Vec<ReachableOp<'_>> {
        let mut seen: FxHashSet<ActionSignature> = FxHashSet::default();
        let mut out = Vec::new();
        self.walk(type_name, &mut |descriptor| {
            for op in &descriptor.operations {
                if op.bridge {
                    continue;
                }
                let signature = op.signature();
                if seen.insert(signature.clone()) {
                    out.push(ReachableOp {
                        signature,
                        declared_in: &descriptor.name,
                        decl: op,
                    });
                }
            }
        });
        out
    }

    /// Find the declaration supplying management metadata for `signature`,
    /// starting at `type_name`.
    ///
    /// An exact annotated declaration on the type itself wins. Otherwise the
    /// superclass subtree is searched; only if that fails, each directly
    /// declared interface in declaration order. The first-interface tie-break
    /// is deliberate and tested.
    pub fn find_metadata_owner(
        &self,
        type_name: &str,
        signature: &ActionSignature,
    ) -> Option<MetaOwner<'_>> {
        let descriptor = self.get(type_name)?;
        if let Some(op) = descriptor.find_exact(signature) {
            if op.meta.is_some() {
                return Some(MetaOwner {
                    owner: &descriptor.name,
                    decl: op,
                });
            }
        }
        if let Some(superclass) = &descriptor.superclass {
            if let Some(found) = self.find_metadata_owner(superclass, signature) {
                return Some(found);
            }
        }
        for interface in &descriptor.interfaces {
            if let Some(found) = self.find_metadata_owner(interface, signature) {
                return Some(found);
            }
        }
        None
    }

    /// Find the most-derived concrete implementation for `signature`.
    ///
    /// Searches the type, then the superclass subtree, then interfaces in
    /// declaration order (covering default-method style declarations).
    pub fn find_invoker(&self, type_name: &str, signature: &ActionSignature) -> Option<Invoker> {
        let descriptor = self.get(type_name)?;
        if let Some(op) = descriptor.find_exact(signature) {
            if let Some(invoker) = &op.invoker {
                return Some(invoker.clone());
            }
        }
        if let Some(superclass) = &descriptor.superclass {
            if let Some(found) = self.find_invoker(superclass, signature) {
                return Some(found);
            }
        }
        for interface in &descriptor.interfaces {
            if let Some(found) = self.find_invoker(interface, signature) {
                return Some(found);
            }
        }
        None
    }

    /// True when `sub` is `sup` or reaches it through superclass or
    /// interface edges. Unregistered names are assignable only to themselves.
    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        let Some(descriptor) = self.get(sub) else {
            return false;
        };
        if let Some(superclass) = &descriptor.superclass {
            if self.is_assignable(superclass, sup) {
                return true;
            }
        }
        descriptor
            .interfaces
            .iter()
            .any(|interface| self.is_assignable(interface, sup))
    }

    /// Depth-first visit: the type, its superclass subtree, then each
    /// interface subtree in declaration order. Diamonds revisit; callers
    /// deduplicate by signature.
    fn walk<'a>(&'a self, type_name: &str, visit: &mut impl FnMut(&'a TypeDescriptor)) {
        let Some(descriptor) = self.get(type_name) else {
            return;
        };
        visit(descriptor);
        if let Some(superclass) = &descriptor.superclass {
            self.walk(superclass, visit);
        }
        for interface in &descriptor.interfaces {
            self.walk(interface, visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::OpMeta;
    use crate::types::{OperationBuilder, ParamDecl, TypeBuilder};
    use crate::value::Value;

    fn table() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(
            TypeBuilder::interface("Measurable")
                .operation(
                    OperationBuilder::new("getSize")
                        .returns("i64")
                        .managed(OpMeta::new().describe("interface size")),
                )
                .build(),
        );
        registry.register(
            TypeBuilder::class("Base")
                .operation(
                    OperationBuilder::new("getSize")
                        .returns("i64")
                        .managed(OpMeta::new().describe("base size"))
                        .invoke(|_, _| Ok(Value::I64(1))),
                )
                .operation(
                    OperationBuilder::new("scale")
                        .param(ParamDecl::new("factor", "i32"))
                        .invoke(|_, _| Ok(Value::Null)),
                )
                .build(),
        );
        registry.register(
            TypeBuilder::class("Derived")
                .extends("Base")
                .implements("Measurable")
                .operation(
                    OperationBuilder::new("getSize")
                        .returns("i64")
                        .invoke(|_, _| Ok(Value::I64(2))),
                )
                .operation(
                    OperationBuilder::new("scale")
                        .param(ParamDecl::new("factor", "i64"))
                        .invoke(|_, _| Ok(Value::Null)),
                )
                .build(),
        );
        registry
    }

    #[test]
    fn test_reachable_keeps_most_derived() {
        let registry = table();
        let ops = registry.reachable_operations("Derived");

        let get_size = ops
            .iter()
            .find(|op| op.signature == ActionSignature::new("getSize", &[]))
            .unwrap();
        assert_eq!(get_size.declared_in, "Derived");
    }

    #[test]
    fn test_overloads_are_distinct_operations() {
        let registry = table();
        let ops = registry.reachable_operations("Derived");

        let scales: Vec<&str> = ops
            .iter()
            .filter(|op| op.signature.name == "scale")
            .map(|op| op.declared_in)
            .collect();
        assert_eq!(scales.len(), 2);
        assert!(scales.contains(&"Derived"));
        assert!(scales.contains(&"Base"));
    }

    #[test]
    fn test_superclass_metadata_beats_interface() {
        let registry = table();
        let owner = registry
            .find_metadata_owner("Derived", &ActionSignature::new("getSize", &[]))
            .unwrap();
        assert_eq!(owner.owner, "Base");
    }

    #[test]
    fn test_interface_metadata_when_superclass_has_none() {
        let mut registry = table();
        registry.register(
            TypeBuilder::class("Bare")
                .implements("Measurable")
                .operation(
                    OperationBuilder::new("getSize")
                        .returns("i64")
                        .invoke(|_, _| Ok(Value::I64(3))),
                )
                .build(),
        );

        let owner = registry
            .find_metadata_owner("Bare", &ActionSignature::new("getSize", &[]))
            .unwrap();
        assert_eq!(owner.owner, "Measurable");
    }

    #[test]
    fn test_missing_metadata_is_not_an_error() {
        let registry = table();
        let owner =
            registry.find_metadata_owner("Derived", &ActionSignature::new("scale", &["i64"]));
        assert!(owner.is_none());
    }

    #[test]
    fn test_invoker_is_most_derived() {
        let registry = table();
        let invoker = registry
            .find_invoker("Derived", &ActionSignature::new("getSize", &[]))
            .unwrap();
        let target = ();
        assert_eq!(invoker(&target, &[]).unwrap(), Value::I64(2));
    }

    #[test]
    fn test_assignability() {
        let registry = table();
        assert!(registry.is_assignable("Derived", "Base"));
        assert!(registry.is_assignable("Derived", "Measurable"));
        assert!(registry.is_assignable("Base", "Base"));
        assert!(!registry.is_assignable("Base", "Derived"));
        assert!(!registry.is_assignable("Unregistered", "Base"));
        assert!(registry.is_assignable("Unregistered", "Unregistered"));
    }
}
