use std::slice;

use crate::error::LdapError;
use crate::schema::AttributeType;
use crate::value::{Value, ValueBuf};

/// Trimmed, lower-cased canonical form of a user-provided attribute id.
/// Empty ids are rejected before any state changes.
pub(crate) fn canonical_id(up_id: &str) -> Result<String, LdapError> {
    let id = up_id.trim().to_lowercase();

    if id.is_empty() {
        return Err(LdapError::InvalidArgument(
            "attribute id must not be null or empty".to_string(),
        ));
    }

    Ok(id)
}

/// An ordered, duplicate-free collection of values under one attribute
/// identity.
///
/// Schema-agnostic attributes are keyed by their canonical id; schema-aware
/// ones carry an [`AttributeType`] and are keyed by its OID (see
/// [`Attribute::key`]). Duplicate values, by the [`Value`] equality rule,
/// are silently ignored on add.
#[derive(Debug, Clone)]
pub struct Attribute {
    id: String,
    up_id: String,
    attribute_type: Option<AttributeType>,
    values: Vec<Value>,
}

impl Attribute {
    /// Schema-agnostic attribute with no values.
    pub fn new(up_id: &str) -> Result<Self, LdapError> {
        let id = canonical_id(up_id)?;
        Ok(Attribute {
            id,
            up_id: up_id.trim().to_string(),
            attribute_type: None,
            values: Vec::new(),
        })
    }

    /// Schema-agnostic attribute seeded with values.
    pub fn with_values(
        up_id: &str,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self, LdapError> {
        let mut attribute = Attribute::new(up_id)?;
        attribute.add(values);
        Ok(attribute)
    }

    /// Schema-aware attribute. The up-id defaults to the type's primary
    /// name.
    pub fn from_type(attribute_type: AttributeType) -> Self {
        let up_id = attribute_type.name().to_string();
        Attribute {
            id: up_id.to_lowercase(),
            up_id,
            attribute_type: Some(attribute_type),
            values: Vec::new(),
        }
    }

    /// Schema-aware attribute with an explicit user-provided id. An empty
    /// up-id falls back to the type's name.
    pub fn from_type_with_up_id(
        up_id: &str,
        attribute_type: AttributeType,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        let mut attribute = Attribute::from_type(attribute_type);
        let trimmed = up_id.trim();
        if !trimmed.is_empty() {
            attribute.up_id = trimmed.to_string();
            attribute.id = trimmed.to_lowercase();
        }
        attribute.add(values);
        attribute
    }

    /// Canonical id (lower-cased, trimmed).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The user-provided id, original casing preserved.
    pub fn up_id(&self) -> &str {
        &self.up_id
    }

    pub fn attribute_type(&self) -> Option<&AttributeType> {
        self.attribute_type.as_ref()
    }

    /// The identity used for map placement inside an entry: the type's OID
    /// when schema-aware, the canonical id otherwise.
    pub fn key(&self) -> &str {
        match &self.attribute_type {
            Some(at) => at.oid(),
            None => &self.id,
        }
    }

    /// Update the user-provided id. An empty up-id is only acceptable when
    /// an attribute type can supply a name instead.
    pub fn set_up_id(&mut self, up_id: &str) -> Result<(), LdapError> {
        let trimmed = up_id.trim();

        if trimmed.is_empty() {
            match &self.attribute_type {
                Some(at) => {
                    self.up_id = at.name().to_string();
                    self.id = self.up_id.to_lowercase();
                    Ok(())
                }
                None => Err(LdapError::InvalidArgument(
                    "attribute id must not be null or empty".to_string(),
                )),
            }
        } else {
            self.up_id = trimmed.to_string();
            self.id = trimmed.to_lowercase();
            Ok(())
        }
    }

    pub fn set_attribute_type(&mut self, attribute_type: AttributeType) {
        self.attribute_type = Some(attribute_type);
    }

    /// Append values, skipping any already present. Returns how many were
    /// actually added.
    pub fn add(&mut self, values: impl IntoIterator<Item = Value>) -> usize {
        let mut added = 0;

        for value in values {
            if !self.values.contains(&value) {
                self.values.push(value);
                added += 1;
            }
        }

        added
    }

    pub fn add_str(&mut self, values: &[&str]) -> usize {
        self.add(values.iter().map(|s| Value::text(*s)))
    }

    pub fn add_binary(&mut self, values: &[&[u8]]) -> usize {
        self.add(values.iter().map(|b| Value::binary(b.to_vec())))
    }

    /// Remove matching values. Returns true when at least one was removed.
    /// Dropping the attribute once it holds no values is the entry's job,
    /// not this method's.
    pub fn remove(&mut self, values: &[Value]) -> bool {
        let before = self.values.len();
        self.values.retain(|v| !values.contains(v));
        self.values.len() != before
    }

    pub fn remove_str(&mut self, values: &[&str]) -> bool {
        let owned: Vec<Value> = values.iter().map(|s| Value::text(*s)).collect();
        self.remove(&owned)
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    pub fn contains_str(&self, value: &str) -> bool {
        self.contains(&Value::text(value))
    }

    pub fn contains_all(&self, values: &[Value]) -> bool {
        values.iter().all(|v| self.contains(v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn iter(&self) -> slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// Whether any value carries a binary payload.
    pub fn has_binary_value(&self) -> bool {
        self.values
            .iter()
            .any(|v| matches!(v.get(), Some(ValueBuf::Binary(_))))
    }
}

impl<'a> IntoIterator for &'a Attribute {
    type Item = &'a Value;
    type IntoIter = slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl PartialEq for Attribute {
    /// Same identity, same value set. Value order is irrelevant.
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
            && self.values.len() == other.values.len()
            && self.values.iter().all(|v| other.contains(v))
    }
}

impl Eq for Attribute {}
