//! Export lifecycle tests
//!
//! Drives the exporter against the in-memory server: uniqueness of public
//! names, teardown semantics, and dispatch through a registered registry.

use std::sync::Arc;

use parking_lot::Mutex;

use tiller_core::{
    downcast, ManagedRegistry, ObjectHandle, OpMeta, OperationBuilder, ParamDecl, TypeBuilder,
    TypeRegistry, Value,
};
use tiller_export::{ExportError, Exporter, InMemoryServer, ObjectName};

struct Endpoint {
    level: Mutex<i32>,
}

fn types() -> Arc<TypeRegistry> {
    let mut types = TypeRegistry::new();
    types.register(
        TypeBuilder::class("Endpoint")
            .managed(OpMeta::new().describe("managed endpoint"))
            .operation(
                OperationBuilder::new("getLevel")
                    .returns("i32")
                    .managed(OpMeta::new())
                    .invoke(|t, _| Ok(Value::I32(*downcast::<Endpoint>(t)?.level.lock()))),
            )
            .operation(
                OperationBuilder::new("setLevel")
                    .param(ParamDecl::new("value", "i32"))
                    .managed(OpMeta::new())
                    .invoke(|t, args| {
                        *downcast::<Endpoint>(t)?.level.lock() = args[0].expect_i32()?;
                        Ok(Value::Null)
                    }),
            )
            .build(),
    );
    Arc::new(types)
}

fn fixture() -> (Exporter, Arc<InMemoryServer>) {
    let server = Arc::new(InMemoryServer::new());
    (Exporter::new(types(), server.clone()), server)
}

fn endpoint(level: i32) -> ObjectHandle {
    ObjectHandle::new(
        "Endpoint",
        Endpoint {
            level: Mutex::new(level),
        },
    )
}

fn name(suffix: &str) -> ObjectName {
    ObjectName::builder("tiller")
        .property("type", "Endpoint")
        .property("name", suffix)
        .build()
        .unwrap()
}

#[test]
fn test_dispatch_through_registered_registry() {
    let (exporter, server) = fixture();
    exporter.export(name("ingest"), endpoint(5)).unwrap();

    let registry: Arc<ManagedRegistry> = server.lookup(&name("ingest")).unwrap();
    assert_eq!(registry.description(), "managed endpoint");
    assert_eq!(registry.get_attribute("Level").unwrap(), Value::I32(5));

    registry.set_attribute("Level", Value::I32(9)).unwrap();
    assert_eq!(registry.get_attribute("Level").unwrap(), Value::I32(9));
}

#[test]
fn test_duplicate_export_leaves_original_untouched() {
    let (exporter, server) = fixture();
    let original = exporter.export(name("ingest"), endpoint(5)).unwrap();

    let err = exporter.export(name("ingest"), endpoint(99)).unwrap_err();
    assert_eq!(
        err,
        ExportError::AlreadyExists("tiller:type=Endpoint,name=ingest".into())
    );

    // The server still serves the original binding's registry.
    let served = server.lookup(&name("ingest")).unwrap();
    assert!(Arc::ptr_eq(&original, &served));
    assert_eq!(served.get_attribute("Level").unwrap(), Value::I32(5));
    assert_eq!(exporter.len(), 1);
}

#[test]
fn test_unexport_releases_the_name() {
    let (exporter, server) = fixture();
    exporter.export(name("a"), endpoint(1)).unwrap();
    exporter.unexport(&name("a")).unwrap();

    assert!(server.lookup(&name("a")).is_none());
    // The name can be taken again after teardown.
    exporter.export(name("a"), endpoint(2)).unwrap();
    assert_eq!(
        server
            .lookup(&name("a"))
            .unwrap()
            .get_attribute("Level")
            .unwrap(),
        Value::I32(2)
    );
}

#[test]
fn test_unexport_all_empties_the_tracker() {
    let (exporter, server) = fixture();
    for i in 0..4 {
        exporter
            .export(name(&format!("e{i}")), endpoint(i))
            .unwrap();
    }
    assert_eq!(exporter.len(), 4);
    assert_eq!(server.len(), 4);

    let failures = exporter.unexport_all();
    assert!(failures.is_empty());
    assert!(exporter.is_empty());
    assert!(server.is_empty());
}

#[test]
fn test_unexport_all_reports_out_of_band_losses() {
    let (exporter, server) = fixture();
    exporter.export(name("kept"), endpoint(1)).unwrap();
    exporter.export(name("lost"), endpoint(2)).unwrap();

    // Something outside the exporter removed one registration.
    use tiller_export::ManagementServer;
    server.unregister(&name("lost")).unwrap();

    let failures = exporter.unexport_all();
    assert_eq!(failures.len(), 1);
    assert!(failures.contains_key("tiller:type=Endpoint,name=lost"));
    // The batch continued past the failure.
    assert!(exporter.is_empty());
    assert!(server.is_empty());
}

#[test]
fn test_enumeration() {
    let (exporter, _server) = fixture();
    exporter.export(name("b"), endpoint(1)).unwrap();
    exporter.export(name("a"), endpoint(2)).unwrap();

    assert_eq!(
        exporter.names(),
        vec![
            "tiller:type=Endpoint,name=a".to_string(),
            "tiller:type=Endpoint,name=b".to_string(),
        ]
    );
    assert!(exporter.contains(&name("a")));
    assert!(!exporter.contains(&name("c")));
    assert!(exporter.registry(&name("a")).is_some());
}
