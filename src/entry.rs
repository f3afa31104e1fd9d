use std::collections::hash_map;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use tracing::{debug, warn};

use crate::attribute::{canonical_id, Attribute};
use crate::dn::Dn;
use crate::error::LdapError;
use crate::schema::{AttributeType, SchemaContext, OBJECT_CLASS_AT_OID};
use crate::value::{Value, ValueBuf};

/// How attribute names map to storage keys. Chosen once at entry
/// construction; every mutating operation goes through this seam instead of
/// re-branching on schema presence.
#[derive(Debug, Clone)]
enum Keying {
    /// No schema: keys are canonical (lower-trimmed) ids.
    Agnostic,
    /// Schema-aware: keys are attribute-type OIDs.
    Aware(SchemaContext),
}

impl Keying {
    fn resolve(&self, up_id: &str) -> Result<Option<AttributeType>, LdapError> {
        match self {
            Keying::Agnostic => Ok(None),
            Keying::Aware(ctx) => ctx.lookup_attribute_type(up_id).map(Some),
        }
    }

    fn canonical_key(&self, up_id: &str) -> Result<String, LdapError> {
        let id = canonical_id(up_id)?;

        match self {
            Keying::Agnostic => Ok(id),
            Keying::Aware(ctx) => Ok(ctx.lookup_attribute_type(&id)?.oid().to_string()),
        }
    }
}

/// The explicit result of [`Entry::set`]: which attributes were displaced
/// and how many placeholders were created. Distinguishes "no prior
/// attribute" from "nothing was affected at all".
#[derive(Debug, Default)]
pub struct SetOutcome {
    pub removed: Vec<Attribute>,
    pub created: usize,
}

/// A directory entry: a [`Dn`] plus a keyed collection of [`Attribute`]s.
///
/// An entry runs in one of two modes fixed at construction: schema-aware
/// (attributes keyed by OID, names resolved through a [`SchemaContext`]) or
/// schema-agnostic (keyed by canonical id). An `Entry` is not safe for
/// concurrent mutation; callers serialize writes.
///
/// Equality and hashing consider the Dn only. Attribute contents are
/// deliberately excluded: this mirrors the long-standing contract downstream
/// code relies on, even though it understates structural equality. Compare
/// attributes explicitly where that matters.
#[derive(Debug, Clone)]
pub struct Entry {
    dn: Dn,
    attributes: HashMap<String, Attribute>,
    keying: Keying,
}

impl Entry {
    /// Empty schema-agnostic entry with an empty Dn.
    pub fn new() -> Self {
        Entry {
            dn: Dn::empty(),
            attributes: HashMap::new(),
            keying: Keying::Agnostic,
        }
    }

    pub fn with_dn(dn: impl Into<Dn>) -> Self {
        Entry {
            dn: dn.into(),
            ..Entry::new()
        }
    }

    /// Schema-agnostic entry pre-seeded with empty placeholder attributes.
    pub fn with_attribute_ids(dn: impl Into<Dn>, up_ids: &[&str]) -> Result<Self, LdapError> {
        let mut entry = Entry::with_dn(dn);
        entry.set(up_ids)?;
        Ok(entry)
    }

    /// Empty schema-aware entry.
    pub fn schema_aware(ctx: SchemaContext) -> Self {
        Entry {
            dn: Dn::empty(),
            attributes: HashMap::new(),
            keying: Keying::Aware(ctx),
        }
    }

    /// Schema-aware entry with a Dn, normalized on the way in.
    pub fn schema_aware_with_dn(ctx: SchemaContext, dn: impl Into<Dn>) -> Self {
        let mut entry = Entry::schema_aware(ctx);
        entry.set_dn(dn.into());
        entry
    }

    /// Deep copy of another entry into schema-aware mode. Attributes whose
    /// type cannot be resolved are skipped with a diagnostic: interactive
    /// construction favors availability over integrity.
    pub fn copy_with_schema(ctx: SchemaContext, source: &Entry) -> Self {
        let mut entry = Entry::schema_aware_with_dn(ctx.clone(), source.dn.clone());

        for attribute in source.iter() {
            let resolved = match attribute.attribute_type() {
                Some(at) => Ok(at.clone()),
                None => ctx.lookup_attribute_type(attribute.id()),
            };

            match resolved {
                Ok(at) => {
                    let copied = Attribute::from_type_with_up_id(
                        attribute.up_id(),
                        at,
                        attribute.iter().cloned(),
                    );
                    entry.attributes.insert(copied.key().to_string(), copied);
                }
                Err(_) => {
                    warn!(id = attribute.id(), "attribute cannot be stored, skipping");
                }
            }
        }

        entry
    }

    pub fn is_schema_aware(&self) -> bool {
        matches!(self.keying, Keying::Aware(_))
    }

    pub fn schema_context(&self) -> Option<&SchemaContext> {
        match &self.keying {
            Keying::Agnostic => None,
            Keying::Aware(ctx) => Some(ctx),
        }
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// Replace the Dn. In schema-aware mode the new Dn is normalized.
    pub fn set_dn(&mut self, dn: impl Into<Dn>) {
        let dn = dn.into();
        self.dn = if self.is_schema_aware() && !dn.is_normalized() {
            dn.normalize()
        } else {
            dn
        };
    }

    /// objectClass values are always strings in the schema; binary payloads
    /// are rejected before any state change, in either mode.
    fn reject_binary_object_class(key: &str, values: &[Value]) -> Result<(), LdapError> {
        let is_object_class = key == OBJECT_CLASS_AT_OID || key.eq_ignore_ascii_case("objectclass");

        if is_object_class
            && values
                .iter()
                .any(|v| matches!(v.get(), Some(ValueBuf::Binary(_))))
        {
            return Err(LdapError::UnsupportedOperation(
                "objectClass does not accept binary values".to_string(),
            ));
        }

        Ok(())
    }

    /// Merge-or-insert: values join an existing attribute (duplicates
    /// silently ignored) or a fresh one is created. The display casing of
    /// the id is refreshed to the caller-supplied form either way.
    pub fn add(&mut self, up_id: &str, values: Vec<Value>) -> Result<(), LdapError> {
        let key = self.keying.canonical_key(up_id)?;
        Self::reject_binary_object_class(&key, &values)?;

        match self.attributes.entry(key) {
            hash_map::Entry::Occupied(mut slot) => {
                let attribute = slot.get_mut();
                attribute.add(values);
                attribute.set_up_id(up_id)?;
            }
            hash_map::Entry::Vacant(slot) => {
                let attribute = match self.keying.resolve(up_id)? {
                    Some(at) => Attribute::from_type_with_up_id(up_id, at, values),
                    None => Attribute::with_values(up_id, values)?,
                };
                slot.insert(attribute);
            }
        }

        Ok(())
    }

    pub fn add_str(&mut self, up_id: &str, values: &[&str]) -> Result<(), LdapError> {
        self.add(up_id, values.iter().map(|s| Value::text(*s)).collect())
    }

    pub fn add_binary(&mut self, up_id: &str, values: &[&[u8]]) -> Result<(), LdapError> {
        self.add(
            up_id,
            values.iter().map(|b| Value::binary(b.to_vec())).collect(),
        )
    }

    /// Merge whole attributes into the entry (the [`Entry::add`] semantics,
    /// attribute-at-a-time). Untyped attributes are resolved first in
    /// schema-aware mode.
    pub fn add_attributes(
        &mut self,
        attributes: impl IntoIterator<Item = Attribute>,
    ) -> Result<(), LdapError> {
        for mut attribute in attributes {
            if self.is_schema_aware() && attribute.attribute_type().is_none() {
                if let Some(at) = self.keying.resolve(attribute.id())? {
                    attribute.set_attribute_type(at);
                }
            }

            match self.attributes.entry(attribute.key().to_string()) {
                hash_map::Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    existing.add(attribute.iter().cloned());
                    existing.set_up_id(attribute.up_id())?;
                }
                hash_map::Entry::Vacant(slot) => {
                    slot.insert(attribute);
                }
            }
        }

        Ok(())
    }

    /// Replace-or-insert. Returns the displaced attribute, if any.
    pub fn put(&mut self, up_id: &str, values: Vec<Value>) -> Result<Option<Attribute>, LdapError> {
        let key = self.keying.canonical_key(up_id)?;
        Self::reject_binary_object_class(&key, &values)?;

        let attribute = match self.keying.resolve(up_id)? {
            Some(at) => Attribute::from_type_with_up_id(up_id, at, values),
            None => Attribute::with_values(up_id, values)?,
        };

        Ok(self.attributes.insert(key, attribute))
    }

    pub fn put_str(&mut self, up_id: &str, values: &[&str]) -> Result<Option<Attribute>, LdapError> {
        self.put(up_id, values.iter().map(|s| Value::text(*s)).collect())
    }

    pub fn put_binary(
        &mut self,
        up_id: &str,
        values: &[&[u8]],
    ) -> Result<Option<Attribute>, LdapError> {
        self.put(
            up_id,
            values.iter().map(|b| Value::binary(b.to_vec())).collect(),
        )
    }

    /// Replace whole attributes. Returns every displaced attribute. In
    /// schema-aware mode an untyped input is resolved by id, and an
    /// unresolvable one fails the call.
    pub fn put_attributes(
        &mut self,
        attributes: impl IntoIterator<Item = Attribute>,
    ) -> Result<Vec<Attribute>, LdapError> {
        let mut previous = Vec::new();

        for mut attribute in attributes {
            if self.is_schema_aware() && attribute.attribute_type().is_none() {
                if let Some(at) = self.keying.resolve(attribute.id())? {
                    attribute.set_attribute_type(at);
                }
            }

            if let Some(displaced) = self
                .attributes
                .insert(attribute.key().to_string(), attribute)
            {
                previous.push(displaced);
            }
        }

        Ok(previous)
    }

    /// Clear-and-create: each named attribute is replaced by an empty
    /// placeholder. Unresolvable names in schema-aware mode are skipped with
    /// a diagnostic.
    pub fn set(&mut self, up_ids: &[&str]) -> Result<SetOutcome, LdapError> {
        if up_ids.is_empty() {
            return Err(LdapError::InvalidArgument(
                "at least one attribute id is required".to_string(),
            ));
        }

        let mut outcome = SetOutcome::default();

        for &up_id in up_ids {
            let id = canonical_id(up_id)?;

            let (key, placeholder) = match &self.keying {
                Keying::Agnostic => (id, Attribute::new(up_id)?),
                Keying::Aware(ctx) => match ctx.lookup_attribute_type(&id) {
                    Ok(at) => (
                        at.oid().to_string(),
                        Attribute::from_type_with_up_id(up_id, at, []),
                    ),
                    Err(err) => {
                        warn!(up_id, %err, "cannot set unknown attribute, skipping");
                        continue;
                    }
                },
            };

            if let Some(removed) = self.attributes.insert(key, placeholder) {
                outcome.removed.push(removed);
            }
            outcome.created += 1;
        }

        Ok(outcome)
    }

    /// Delete whole attributes by name. Unknown names are skipped with a
    /// diagnostic; the removed attributes are returned.
    pub fn remove_attributes(&mut self, up_ids: &[&str]) -> Vec<Attribute> {
        let mut removed = Vec::new();

        for &up_id in up_ids {
            match self.keying.canonical_key(up_id) {
                Ok(key) => {
                    if let Some(attribute) = self.attributes.remove(&key) {
                        removed.push(attribute);
                    } else {
                        debug!(up_id, "attribute not present, nothing removed");
                    }
                }
                Err(err) => {
                    warn!(up_id, %err, "cannot remove attribute, skipping");
                }
            }
        }

        removed
    }

    /// Delete whole attributes by identity. In schema-aware mode every input
    /// must carry an attribute type.
    pub fn remove_matching(&mut self, attributes: &[Attribute]) -> Result<Vec<Attribute>, LdapError> {
        let mut removed = Vec::new();

        for attribute in attributes {
            let key = match (&self.keying, attribute.attribute_type()) {
                (Keying::Aware(_), None) => {
                    return Err(LdapError::InvalidArgument(
                        "attribute type is required in schema-aware mode".to_string(),
                    ));
                }
                (Keying::Aware(_), Some(at)) => at.oid().to_string(),
                (Keying::Agnostic, _) => attribute.id().to_string(),
            };

            if let Some(attribute) = self.attributes.remove(&key) {
                removed.push(attribute);
            }
        }

        Ok(removed)
    }

    /// Delete specific values. The attribute itself is dropped once its
    /// last value goes. Returns whether anything was removed.
    pub fn remove(&mut self, up_id: &str, values: &[Value]) -> Result<bool, LdapError> {
        if up_id.trim().is_empty() {
            return Ok(false);
        }

        let key = match self.keying.canonical_key(up_id) {
            Ok(key) => key,
            Err(err) => {
                warn!(up_id, %err, "cannot remove values from unknown attribute");
                return Ok(false);
            }
        };

        let Some(attribute) = self.attributes.get_mut(&key) else {
            return Ok(false);
        };

        let removed = attribute.remove(values);

        if attribute.is_empty() {
            self.attributes.remove(&key);
            return Ok(true);
        }

        Ok(removed)
    }

    pub fn remove_str(&mut self, up_id: &str, values: &[&str]) -> Result<bool, LdapError> {
        let owned: Vec<Value> = values.iter().map(|s| Value::text(*s)).collect();
        self.remove(up_id, &owned)
    }

    /// Whether the named attribute exists. Unknown names resolve to false,
    /// never an error.
    pub fn contains(&self, up_id: &str) -> bool {
        match self.keying.canonical_key(up_id) {
            Ok(key) => self.attributes.contains_key(&key),
            Err(_) => false,
        }
    }

    pub fn contains_attribute_type(&self, attribute_type: &AttributeType) -> bool {
        self.attributes.contains_key(attribute_type.oid())
    }

    pub fn contains_value(&self, up_id: &str, value: &Value) -> bool {
        self.get(up_id)
            .map(|attribute| attribute.contains(value))
            .unwrap_or(false)
    }

    pub fn contains_str(&self, up_id: &str, value: &str) -> bool {
        self.contains_value(up_id, &Value::text(value))
    }

    pub fn get(&self, up_id: &str) -> Option<&Attribute> {
        let key = self.keying.canonical_key(up_id).ok()?;
        self.attributes.get(&key)
    }

    pub fn get_by_type(&self, attribute_type: &AttributeType) -> Option<&Attribute> {
        self.attributes.get(attribute_type.oid())
    }

    /// Every attribute type present on the entry (schema-aware attributes
    /// only).
    pub fn attribute_types(&self) -> Vec<&AttributeType> {
        self.attributes
            .values()
            .filter_map(Attribute::attribute_type)
            .collect()
    }

    /// Whether the entry's objectClass attribute carries the given class.
    pub fn has_object_class(&self, object_class: &str) -> bool {
        let attribute = match &self.keying {
            Keying::Aware(ctx) => ctx
                .object_class_type()
                .and_then(|at| self.attributes.get(at.oid())),
            Keying::Agnostic => self.attributes.get("objectclass"),
        };

        attribute
            .map(|a| a.contains_str(object_class))
            .unwrap_or(false)
    }

    /// Drop every attribute. The Dn is kept.
    pub fn clear(&mut self) {
        self.attributes.clear();
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub(crate) fn insert_keyed(&mut self, key: String, attribute: Attribute) {
        self.attributes.insert(key, attribute);
    }
}

impl Default for Entry {
    fn default() -> Self {
        Entry::new()
    }
}

impl PartialEq for Entry {
    /// Dn-only comparison; see the type-level note.
    fn eq(&self, other: &Self) -> bool {
        self.dn == other.dn
    }
}

impl Eq for Entry {}

impl Hash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dn.hash(state);
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Entry")?;
        writeln!(f, "    dn: {}", self.dn)?;

        for attribute in self.attributes.values() {
            for value in attribute {
                writeln!(f, "    {}: {}", attribute.up_id(), value)?;
            }
        }

        Ok(())
    }
}
