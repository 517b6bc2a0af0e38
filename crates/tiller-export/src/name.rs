//! Canonical public names
//!
//! An [`ObjectName`] identifies an exported registry to the management
//! server: `<namespace>:<key1>=<value1>,<key2>=<value2>,...` with properties
//! in insertion order. Values containing a reserved character are quoted
//! with backslash escapes. Duplicate keys are rejected at build time.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Characters that force a property value into quoted form.
const RESERVED: &[char] = &[',', '=', ':', '"', '*', '?'];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("Duplicate key '{0}' in object name")]
    DuplicateKey(String),

    #[error("Object name namespace must not be empty")]
    EmptyNamespace,

    #[error("Object name keys must not be empty")]
    EmptyKey,
}

/// A validated public name with its canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName {
    namespace: String,
    properties: Vec<(String, String)>,
    canonical: String,
}

impl ObjectName {
    pub fn builder(namespace: &str) -> ObjectNameBuilder {
        ObjectNameBuilder {
            namespace: namespace.to_string(),
            properties: Vec::new(),
        }
    }

    /// The canonical string form, also the binding identity.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl Serialize for ObjectName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

/// Consuming builder; validation happens in [`ObjectNameBuilder::build`].
pub struct ObjectNameBuilder {
    namespace: String,
    properties: Vec<(String, String)>,
}

impl ObjectNameBuilder {
    /// Append a property; call order is canonical order.
    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.properties.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> Result<ObjectName, NameError> {
        if self.namespace.is_empty() {
            return Err(NameError::EmptyNamespace);
        }
        for (i, (key, _)) in self.properties.iter().enumerate() {
            if key.is_empty() {
                return Err(NameError::EmptyKey);
            }
            if self.properties[..i].iter().any(|(k, _)| k == key) {
                return Err(NameError::DuplicateKey(key.clone()));
            }
        }

        let rendered: Vec<String> = self
            .properties
            .iter()
            .map(|(key, value)| format!("{}={}", key, quote_value(value)))
            .collect();
        let canonical = format!("{}:{}", self.namespace, rendered.join(","));
        Ok(ObjectName {
            namespace: self.namespace,
            properties: self.properties,
            canonical,
        })
    }
}

/// Quote a property value when it contains a reserved character: wrap in
/// double quotes and backslash-escape `"`, `\`, `*`, and `?`.
fn quote_value(value: &str) -> String {
    if !value.contains(RESERVED) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '*' | '?') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
