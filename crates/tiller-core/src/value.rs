//! Dynamic values at the dispatch boundary
//!
//! Management callers address a target by name; everything they read, write,
//! or pass as an operation argument travels as a [`Value`]. The enum covers
//! the primitive families, strings, and erased handles to registered objects.
//! No reflection is involved: an [`ObjectHandle`] carries its registered type
//! name alongside the erased reference, which is all the compiler needs to
//! look up the runtime type of a composite child.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::TargetFault;

/// Return type name of operations that produce nothing.
pub const VOID: &str = "void";

/// A shared, type-named handle to a live object.
#[derive(Clone)]
pub struct ObjectHandle {
    type_name: Arc<str>,
    object: Arc<dyn Any + Send + Sync>,
}

impl ObjectHandle {
    /// Wrap an owned object under its registered type name.
    pub fn new<T: Any + Send + Sync>(type_name: &str, object: T) -> Self {
        Self {
            type_name: Arc::from(type_name),
            object: Arc::new(object),
        }
    }

    /// Wrap an already-shared object under its registered type name.
    pub fn from_shared<T: Any + Send + Sync>(type_name: &str, object: Arc<T>) -> Self {
        Self {
            type_name: Arc::from(type_name),
            object,
        }
    }

    /// The registered type name this handle was created with.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Borrow the erased object for invoker dispatch.
    pub fn as_any(&self) -> &dyn Any {
        self.object.as_ref()
    }

    /// Downcast to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.as_ref().downcast_ref()
    }

    /// True when both handles refer to the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// A dynamically typed management value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent reference. Assignable to string and object attributes only.
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Object(ObjectHandle),
}

impl Value {
    /// Runtime type name, as used in action signatures and assignability
    /// checks.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Object(handle) => handle.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Value::Object(handle) => Some(handle),
            _ => None,
        }
    }

    /// Expect a bool argument; anything else is a runtime fault from the
    /// target's perspective.
    pub fn expect_bool(&self) -> Result<bool, TargetFault> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(Self::mismatch("bool", other)),
        }
    }

    pub fn expect_i8(&self) -> Result<i8, TargetFault> {
        match self {
            Value::I8(v) => Ok(*v),
            other => Err(Self::mismatch("i8", other)),
        }
    }

    pub fn expect_i16(&self) -> Result<i16, TargetFault> {
        match self {
            Value::I16(v) => Ok(*v),
            other => Err(Self::mismatch("i16", other)),
        }
    }

    pub fn expect_i32(&self) -> Result<i32, TargetFault> {
        match self {
            Value::I32(v) => Ok(*v),
            other => Err(Self::mismatch("i32", other)),
        }
    }

    pub fn expect_i64(&self) -> Result<i64, TargetFault> {
        match self {
            Value::I64(v) => Ok(*v),
            other => Err(Self::mismatch("i64", other)),
        }
    }

    pub fn expect_f32(&self) -> Result<f32, TargetFault> {
        match self {
            Value::F32(v) => Ok(*v),
            other => Err(Self::mismatch("f32", other)),
        }
    }

    pub fn expect_f64(&self) -> Result<f64, TargetFault> {
        match self {
            Value::F64(v) => Ok(*v),
            other => Err(Self::mismatch("f64", other)),
        }
    }

    /// Expect a string argument, `None` for `Null`.
    pub fn expect_str(&self) -> Result<Option<&str>, TargetFault> {
        match self {
            Value::Str(v) => Ok(Some(v)),
            Value::Null => Ok(None),
            other => Err(Self::mismatch("string", other)),
        }
    }

    /// Expect an object argument, `None` for `Null`.
    pub fn expect_object(&self) -> Result<Option<&ObjectHandle>, TargetFault> {
        match self {
            Value::Object(handle) => Ok(Some(handle)),
            Value::Null => Ok(None),
            other => Err(Self::mismatch("object", other)),
        }
    }

    fn mismatch(expected: &str, actual: &Value) -> TargetFault {
        TargetFault::runtime(format!(
            "expected a {} argument, got {}",
            expected,
            actual.type_name()
        ))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// True for the families that demand an exact type match on assignment.
/// Strings and objects are reference families and additionally accept `Null`.
pub fn is_primitive(type_name: &str) -> bool {
    matches!(
        type_name,
        "bool" | "i8" | "i16" | "i32" | "i64" | "f32" | "f64"
    )
}
