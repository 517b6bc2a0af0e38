//! Management metadata: tags, annotations, and resolved descriptors
//!
//! A declaration opts into management by carrying an [`OpMeta`] annotation.
//! The extractor merges annotations from multiple sources (a getter and its
//! paired setter), resolves the human description with a fixed precedence,
//! and produces a [`ManagedMeta`] descriptor recording which declaration won.
//!
//! Registries are passive, exportable data: tag values are plain text or
//! lists of text, never live handles. Richer inputs (type references,
//! enumerated constants) are normalized on construction.

use std::fmt;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A primitive-safe tag value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    List(Vec<String>),
}

impl TagValue {
    /// Normalize a type reference to its registered name.
    pub fn type_ref(type_name: &str) -> Self {
        TagValue::Text(type_name.to_string())
    }

    /// Normalize any displayable constant to text.
    pub fn constant<T: fmt::Display>(value: T) -> Self {
        TagValue::Text(value.to_string())
    }

    /// Normalize a list of displayable constants to a text list.
    pub fn constants<T: fmt::Display>(values: impl IntoIterator<Item = T>) -> Self {
        TagValue::List(values.into_iter().map(|v| v.to_string()).collect())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(text) => Some(text),
            TagValue::List(_) => None,
        }
    }
}

impl From<&str> for TagValue {
    fn from(text: &str) -> Self {
        TagValue::Text(text.to_string())
    }
}

impl From<String> for TagValue {
    fn from(text: String) -> Self {
        TagValue::Text(text)
    }
}

impl From<Vec<String>> for TagValue {
    fn from(list: Vec<String>) -> Self {
        TagValue::List(list)
    }
}

impl From<Vec<&str>> for TagValue {
    fn from(list: Vec<&str>) -> Self {
        TagValue::List(list.into_iter().map(str::to_string).collect())
    }
}

/// Insertion-ordered tag map with unique, case-sensitive keys.
///
/// Re-inserting an existing key replaces the value but keeps the key's
/// original position, so iteration order is deterministic across merges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: Vec<(String, TagValue)>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TagValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `later` over this map: the later source wins on key collision.
    pub fn merge(&mut self, later: &TagMap) {
        for (key, value) in later.iter() {
            self.insert(key, value.clone());
        }
    }
}

impl Serialize for TagMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// How a composite child's members are spliced into the parent namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    /// Child members exposed unprefixed. The caller is responsible for
    /// keeping flattened namespaces disjoint; collisions overwrite.
    Flatten,
    /// Child members exposed under a `"<name>."` prefix.
    Nested,
}

/// How often a composite child reference is re-fetched from its getter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Fetch from the parent getter on every access.
    Refetch,
    /// Memoize for the given window, refreshed lazily once stale.
    Ttl(Duration),
    /// Fetch once and keep for the registry's lifetime.
    Pinned,
}

/// Composite marker on a getter annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeSpec {
    pub mode: CompositeMode,
    pub cache: CachePolicy,
}

/// The management annotation attached to one declaration.
///
/// Absence of an annotation anywhere in a type's hierarchy for a signature
/// means the operation is not manageable. That is the expected outcome for
/// most operations, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpMeta {
    pub description: Option<String>,
    pub tags: TagMap,
    pub composite: Option<CompositeSpec>,
}

impl OpMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the generic description field.
    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// Attach a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.tags.insert(key, value);
        self
    }

    /// Mark the getter as a flattened composite, re-fetched on every access.
    pub fn flatten(self) -> Self {
        self.flatten_with(CachePolicy::Refetch)
    }

    /// Mark the getter as a flattened composite with an explicit cache policy.
    pub fn flatten_with(mut self, cache: CachePolicy) -> Self {
        self.composite = Some(CompositeSpec {
            mode: CompositeMode::Flatten,
            cache,
        });
        self
    }

    /// Mark the getter as a nested composite, re-fetched on every access.
    pub fn nested(self) -> Self {
        self.nested_with(CachePolicy::Refetch)
    }

    /// Mark the getter as a nested composite with an explicit cache policy.
    pub fn nested_with(mut self, cache: CachePolicy) -> Self {
        self.composite = Some(CompositeSpec {
            mode: CompositeMode::Nested,
            cache,
        });
        self
    }
}

/// Resolved metadata for a registry entry, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagedMeta {
    /// Human description; empty when no source supplied one, never absent.
    pub description: String,
    pub tags: TagMap,
    /// Name of the type whose declaration supplied the winning annotation.
    pub declared_by: String,
}

impl ManagedMeta {
    /// Resolve a merged annotation set into a descriptor.
    ///
    /// Tags merge in source order, later source winning per key.
    /// Description precedence: an explicit `description` tag, then the first
    /// non-empty description field in merge order, then empty.
    pub fn resolve(sources: &[&OpMeta], declared_by: &str) -> Self {
        let mut tags = TagMap::new();
        for source in sources {
            tags.merge(&source.tags);
        }
        let description = match tags.get("description").and_then(TagValue::as_text) {
            Some(text) => text.to_string(),
            None => sources
                .iter()
                .find_map(|s| s.description.as_deref().filter(|d| !d.is_empty()))
                .unwrap_or_default()
                .to_string(),
        };
        Self {
            description,
            tags,
            declared_by: declared_by.to_string(),
        }
    }

    /// Descriptor with no annotation sources at all.
    pub fn empty(declared_by: &str) -> Self {
        Self {
            description: String::new(),
            tags: TagMap::new(),
            declared_by: declared_by.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut tags = TagMap::new();
        tags.insert("units", "bytes");
        tags.insert("rate", "per-second");
        tags.insert("units", "messages");

        let keys: Vec<&str> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["units", "rate"]);
        assert_eq!(tags.get("units"), Some(&TagValue::Text("messages".into())));
    }

    #[test]
    fn test_merge_later_wins() {
        let mut getter = TagMap::new();
        getter.insert("units", "bytes");
        getter.insert("kind", "gauge");

        let mut setter = TagMap::new();
        setter.insert("units", "messages");
        setter.insert("mutable", "true");

        getter.merge(&setter);
        assert_eq!(getter.get("units"), Some(&TagValue::Text("messages".into())));
        assert_eq!(getter.get("kind"), Some(&TagValue::Text("gauge".into())));
        assert_eq!(getter.len(), 3);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let mut tags = TagMap::new();
        tags.insert("Units", "bytes");
        tags.insert("units", "messages");
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_tag_normalization() {
        assert_eq!(TagValue::type_ref("Widget"), TagValue::Text("Widget".into()));
        assert_eq!(TagValue::constant(42), TagValue::Text("42".into()));
        assert_eq!(
            TagValue::constants(["a", "b"]),
            TagValue::List(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_description_tag_beats_field() {
        let meta = OpMeta::new()
            .describe("generic")
            .tag("description", "explicit");
        let resolved = ManagedMeta::resolve(&[&meta], "Widget");
        assert_eq!(resolved.description, "explicit");
    }

    #[test]
    fn test_description_field_fallback() {
        let first = OpMeta::new();
        let second = OpMeta::new().describe("from setter");
        let resolved = ManagedMeta::resolve(&[&first, &second], "Widget");
        assert_eq!(resolved.description, "from setter");
    }

    #[test]
    fn test_description_defaults_to_empty() {
        let resolved = ManagedMeta::resolve(&[&OpMeta::new()], "Widget");
        assert_eq!(resolved.description, "");
        assert_eq!(resolved.declared_by, "Widget");
    }

    #[test]
    fn test_tag_map_serializes_as_map() {
        let mut tags = TagMap::new();
        tags.insert("units", "bytes");
        tags.insert("flags", vec!["a", "b"]);
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"{"units":"bytes","flags":["a","b"]}"#);
    }
}
