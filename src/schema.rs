// Schema-registry contract consumed by the entry model.
//
// The registry's own storage and lookup algorithms live elsewhere; this
// module only defines what the entry model and the codec require from it:
// attribute-type lookup, value normalization and syntax checking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::LdapError;
use crate::value::ValueBuf;

/// The objectClass attribute name, constant across every schema.
pub const OBJECT_CLASS_AT: &str = "objectClass";
/// The objectClass attribute OID.
pub const OBJECT_CLASS_AT_OID: &str = "2.5.4.0";

/// Schema metadata for an attribute: its OID and its known names.
///
/// Two attribute types are the same attribute iff their OIDs match; names
/// are aliases.
#[derive(Debug, Clone)]
pub struct AttributeType {
    oid: String,
    names: Vec<String>,
}

impl AttributeType {
    pub fn new(oid: impl Into<String>, names: Vec<String>) -> Self {
        AttributeType {
            oid: oid.into(),
            names,
        }
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// The primary name, falling back to the OID when the type is nameless.
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(&self.oid)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl PartialEq for AttributeType {
    fn eq(&self, other: &Self) -> bool {
        self.oid == other.oid
    }
}

impl Eq for AttributeType {}

/// Maps a raw attribute value to its canonical comparable form.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, value: &ValueBuf) -> Result<ValueBuf, LdapError>;
}

/// Validates a raw value against an attribute's syntax.
///
/// An absent value is accepted: emptiness is a cardinality concern, not a
/// syntax one.
pub trait SyntaxChecker: Send + Sync {
    fn is_valid(&self, value: Option<&ValueBuf>) -> bool;
}

/// Lookup service for attribute types. Implementations decide storage;
/// callers only rely on name-or-OID resolution.
pub trait SchemaRegistry: Send + Sync {
    fn lookup_attribute_type(&self, name: &str) -> Result<AttributeType, LdapError>;
}

/// A schema handle shared by every schema-aware entry.
///
/// The objectClass attribute type is registry-wide constant, so it is
/// resolved exactly once here, at context construction, and read without any
/// locking afterwards.
#[derive(Clone)]
pub struct SchemaContext {
    registry: Arc<dyn SchemaRegistry>,
    object_class: Option<AttributeType>,
}

impl SchemaContext {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        let object_class = registry.lookup_attribute_type(OBJECT_CLASS_AT).ok();
        SchemaContext {
            registry,
            object_class,
        }
    }

    pub fn lookup_attribute_type(&self, name: &str) -> Result<AttributeType, LdapError> {
        self.registry.lookup_attribute_type(name)
    }

    /// The cached objectClass attribute type, if the registry knows it.
    pub fn object_class_type(&self) -> Option<&AttributeType> {
        self.object_class.as_ref()
    }
}

impl std::fmt::Debug for SchemaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaContext")
            .field("object_class", &self.object_class)
            .finish_non_exhaustive()
    }
}

/// In-memory registry for embedders and tests. Keys are lower-cased names
/// and OIDs.
#[derive(Default)]
pub struct MapSchemaRegistry {
    types: HashMap<String, AttributeType>,
}

impl MapSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the handful of core attribute types the
    /// tests rely on.
    pub fn with_core_types() -> Self {
        let mut registry = Self::new();
        registry.register(AttributeType::new(
            OBJECT_CLASS_AT_OID,
            vec![OBJECT_CLASS_AT.to_string()],
        ));
        registry.register(AttributeType::new("2.5.4.3", vec!["cn".to_string(), "commonName".to_string()]));
        registry.register(AttributeType::new("2.5.4.4", vec!["sn".to_string(), "surname".to_string()]));
        registry
    }

    pub fn register(&mut self, attribute_type: AttributeType) {
        self.types.insert(
            attribute_type.oid().to_lowercase(),
            attribute_type.clone(),
        );
        for name in attribute_type.names() {
            self.types
                .insert(name.to_lowercase(), attribute_type.clone());
        }
    }
}

impl SchemaRegistry for MapSchemaRegistry {
    fn lookup_attribute_type(&self, name: &str) -> Result<AttributeType, LdapError> {
        let key = name.trim().to_lowercase();
        self.types
            .get(&key)
            .cloned()
            .ok_or_else(|| LdapError::SchemaLookup(name.to_string()))
    }
}

/// Trims both ends, collapses inner whitespace runs to a single space and
/// lower-cases the result. The normalizer used by most case-insensitive
/// directory string matching rules.
#[derive(Debug, Clone)]
pub struct DeepTrimToLowerNormalizer {
    oid: String,
}

impl DeepTrimToLowerNormalizer {
    pub fn new(oid: impl Into<String>) -> Self {
        DeepTrimToLowerNormalizer { oid: oid.into() }
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }
}

impl Normalizer for DeepTrimToLowerNormalizer {
    fn normalize(&self, value: &ValueBuf) -> Result<ValueBuf, LdapError> {
        match value {
            ValueBuf::Text(s) => {
                let normalized = s
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                Ok(ValueBuf::Text(normalized))
            }
            ValueBuf::Binary(_) => Err(LdapError::Normalization(format!(
                "normalizer {} only accepts string values",
                self.oid
            ))),
        }
    }
}

/// Accepts IA5 (7-bit ASCII) strings. Absent values are valid.
#[derive(Debug, Clone, Default)]
pub struct Ia5StringSyntaxChecker;

impl Ia5StringSyntaxChecker {
    pub fn new() -> Self {
        Ia5StringSyntaxChecker
    }
}

impl SyntaxChecker for Ia5StringSyntaxChecker {
    fn is_valid(&self, value: Option<&ValueBuf>) -> bool {
        match value {
            None => true,
            Some(buf) => buf.as_bytes().iter().all(u8::is_ascii),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_type_equality_on_oid() {
        let a = AttributeType::new("2.5.4.3", vec!["cn".to_string()]);
        let b = AttributeType::new("2.5.4.3", vec!["commonName".to_string()]);
        let c = AttributeType::new("2.5.4.4", vec!["cn".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_attribute_type_name_falls_back_to_oid() {
        let at = AttributeType::new("1.2.3.4", vec![]);
        assert_eq!(at.name(), "1.2.3.4");
    }

    #[test]
    fn test_map_registry_lookup_by_name_alias_and_oid() {
        let registry = MapSchemaRegistry::with_core_types();
        assert_eq!(registry.lookup_attribute_type("cn").unwrap().oid(), "2.5.4.3");
        assert_eq!(registry.lookup_attribute_type("commonName").unwrap().oid(), "2.5.4.3");
        assert_eq!(registry.lookup_attribute_type(" CN ").unwrap().oid(), "2.5.4.3");
        assert_eq!(registry.lookup_attribute_type("2.5.4.3").unwrap().oid(), "2.5.4.3");
        assert!(registry.lookup_attribute_type("nosuchattr").is_err());
    }

    #[test]
    fn test_schema_context_caches_object_class() {
        let registry = Arc::new(MapSchemaRegistry::with_core_types());
        let ctx = SchemaContext::new(registry);
        let oc = ctx.object_class_type().unwrap();
        assert_eq!(oc.oid(), OBJECT_CLASS_AT_OID);
        assert_eq!(oc.name(), OBJECT_CLASS_AT);
    }

    #[test]
    fn test_schema_context_without_object_class() {
        let ctx = SchemaContext::new(Arc::new(MapSchemaRegistry::new()));
        assert!(ctx.object_class_type().is_none());
    }

    #[test]
    fn test_deep_trim_to_lower() {
        let normalizer = DeepTrimToLowerNormalizer::new("1.1.1");
        let normalized = normalizer
            .normalize(&ValueBuf::Text("  This is    a   TEST  ".to_string()))
            .unwrap();
        assert_eq!(normalized, ValueBuf::Text("this is a test".to_string()));
    }

    #[test]
    fn test_deep_trim_to_lower_rejects_binary() {
        let normalizer = DeepTrimToLowerNormalizer::new("1.1.1");
        assert!(normalizer.normalize(&ValueBuf::Binary(vec![0x00])).is_err());
    }

    #[test]
    fn test_ia5_checker() {
        let checker = Ia5StringSyntaxChecker::new();
        assert!(checker.is_valid(None));
        assert!(checker.is_valid(Some(&ValueBuf::Text("Test".to_string()))));
        assert!(checker.is_valid(Some(&ValueBuf::Text(String::new()))));
        assert!(!checker.is_valid(Some(&ValueBuf::Text("é".to_string()))));
        assert!(!checker.is_valid(Some(&ValueBuf::Binary(vec![0x80]))));
    }
}
