use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::LdapError;
use crate::schema::{Normalizer, SyntaxChecker};

/// The raw payload of a single attribute value: either a UTF-8 string or
/// opaque bytes. The distinction matters for the objectClass restriction and
/// for the DSML base64 decision, not for the wire codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueBuf {
    Text(String),
    Binary(Vec<u8>),
}

impl ValueBuf {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ValueBuf::Text(s) => s.as_bytes(),
            ValueBuf::Binary(b) => b,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueBuf::Text(s) => Some(s),
            ValueBuf::Binary(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ValueBuf::Text(_))
    }
}

impl From<&str> for ValueBuf {
    fn from(s: &str) -> Self {
        ValueBuf::Text(s.to_string())
    }
}

impl From<String> for ValueBuf {
    fn from(s: String) -> Self {
        ValueBuf::Text(s)
    }
}

impl From<Vec<u8>> for ValueBuf {
    fn from(b: Vec<u8>) -> Self {
        ValueBuf::Binary(b)
    }
}

/// Cached outcome of a syntax check. Validity is re-derivable from the raw
/// value alone, so it is never persisted; deserialized values come back as
/// `Unknown` until re-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validity {
    #[default]
    Unknown,
    Valid,
    Invalid,
}

/// One attribute value with its normalization and validity state.
///
/// A `Value` is owned exclusively by its [`Attribute`](crate::Attribute).
/// Equality and ordering use the normalized form when one exists, the raw
/// form otherwise; hashing sticks to the raw form so bucket placement stays
/// stable across normalization.
#[derive(Debug, Clone, Default)]
pub struct Value {
    raw: Option<ValueBuf>,
    normalized: Option<ValueBuf>,
    is_normalized: bool,
    validity: Validity,
}

impl Value {
    /// A value holding nothing. `is_null` is true until `set` is called.
    pub fn null() -> Self {
        Value::default()
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value {
            raw: Some(ValueBuf::Text(s.into())),
            ..Value::default()
        }
    }

    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Value {
            raw: Some(ValueBuf::Binary(bytes.into())),
            ..Value::default()
        }
    }

    pub fn from_buf(buf: Option<ValueBuf>) -> Self {
        Value {
            raw: buf,
            ..Value::default()
        }
    }

    pub fn get(&self) -> Option<&ValueBuf> {
        self.raw.as_ref()
    }

    pub fn get_copy(&self) -> Option<ValueBuf> {
        self.raw.clone()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.raw.as_ref().and_then(ValueBuf::as_str)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.raw.as_ref().map(ValueBuf::as_bytes)
    }

    pub fn is_null(&self) -> bool {
        self.raw.is_none()
    }

    /// Replace the raw value. Any previous normalization and validity state
    /// is discarded; normalization is never performed implicitly.
    pub fn set(&mut self, raw: Option<ValueBuf>) {
        self.raw = raw;
        self.normalized = None;
        self.is_normalized = false;
        self.validity = Validity::Unknown;
    }

    pub fn clear(&mut self) {
        self.set(None);
    }

    /// Normalize through the schema-provided normalizer. A null raw value
    /// normalizes to nothing but still marks the value as normalized.
    /// Failures from the normalizer propagate untouched.
    pub fn normalize(&mut self, normalizer: &dyn Normalizer) -> Result<(), LdapError> {
        match &self.raw {
            None => {
                self.normalized = None;
                self.is_normalized = true;
            }
            Some(raw) => {
                self.normalized = Some(normalizer.normalize(raw)?);
                self.is_normalized = true;
            }
        }

        Ok(())
    }

    /// The normalized form when one has been computed, the raw form
    /// otherwise.
    pub fn normalized_value(&self) -> Option<&ValueBuf> {
        self.normalized.as_ref().or(self.raw.as_ref())
    }

    pub fn is_normalized(&self) -> bool {
        self.is_normalized
    }

    /// Manually flip the normalized flag. The computed normalized form, if
    /// any, is kept either way.
    pub fn set_normalized(&mut self, normalized: bool) {
        self.is_normalized = normalized;
    }

    /// Check the raw value against a syntax checker and cache the verdict.
    /// Raw and normalized state are left untouched.
    pub fn is_valid(&mut self, checker: &dyn SyntaxChecker) -> bool {
        let valid = checker.is_valid(self.raw.as_ref());
        self.validity = if valid {
            Validity::Valid
        } else {
            Validity::Invalid
        };
        valid
    }

    /// The cached validity verdict, `Unknown` until `is_valid` runs.
    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub(crate) fn normalized_parts(&self) -> (Option<&ValueBuf>, bool) {
        (self.normalized.as_ref(), self.is_normalized)
    }

    pub(crate) fn restore(
        raw: Option<ValueBuf>,
        normalized: Option<ValueBuf>,
        is_normalized: bool,
    ) -> Self {
        Value {
            raw,
            normalized,
            is_normalized,
            validity: Validity::Unknown,
        }
    }

    /// Three-way comparison on the normalized-or-raw form. A null raw value
    /// sorts before any non-null one.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self.normalized_value(), other.normalized_value()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.as_bytes().cmp(b.as_bytes()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            None => f.write_str("null"),
            Some(ValueBuf::Text(s)) => f.write_str(s),
            Some(ValueBuf::Binary(b)) => write!(f, "{:02X?}", b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::binary(b)
    }
}

/// Whether a value must be base64-wrapped when rendered as markup, following
/// the LDIF safe-string rules: non-UTF-8 payloads, embedded control
/// characters, and unsafe leading/trailing characters all force base64.
///
/// This predicate is the only service the XML mapping layer needs from the
/// core.
pub fn needs_base64_encoding(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }

    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => return true,
    };

    if text.chars().any(|c| c.is_control()) {
        return true;
    }

    let first = text.chars().next();
    if matches!(first, Some(' ') | Some(':') | Some('<')) {
        return true;
    }

    text.ends_with(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DeepTrimToLowerNormalizer, Ia5StringSyntaxChecker};

    #[test]
    fn test_null_value() {
        let value = Value::null();
        assert!(value.get().is_none());
        assert!(!value.is_normalized());
        assert!(value.is_null());
        assert!(value.normalized_value().is_none());
    }

    #[test]
    fn test_empty_value() {
        let value = Value::text("");
        assert!(value.get().is_some());
        assert_eq!(value.as_str(), Some(""));
        assert!(!value.is_normalized());
        assert!(!value.is_null());
        assert_eq!(value.normalized_value(), Some(&ValueBuf::Text(String::new())));
    }

    #[test]
    fn test_set_resets_state() {
        let mut value = Value::text("  This is    a   TEST  ");
        value
            .normalize(&DeepTrimToLowerNormalizer::new("1.1.1"))
            .unwrap();
        assert!(value.is_normalized());

        value.set(Some(ValueBuf::from("test")));
        assert!(!value.is_normalized());
        assert_eq!(value.validity(), Validity::Unknown);
        assert_eq!(value.as_str(), Some("test"));
    }

    #[test]
    fn test_clear() {
        let mut value = Value::text("test");
        let mut checker_verdict = value.is_valid(&Ia5StringSyntaxChecker::new());
        assert!(checker_verdict);

        value.clear();
        assert!(value.is_null());
        assert!(!value.is_normalized());
        assert_eq!(value.validity(), Validity::Unknown);
        checker_verdict = value.is_valid(&Ia5StringSyntaxChecker::new());
        assert!(checker_verdict);
    }

    #[test]
    fn test_normalize() {
        let mut value = Value::null();
        value
            .normalize(&DeepTrimToLowerNormalizer::new("1.1.1"))
            .unwrap();
        assert!(value.normalized_value().is_none());
        assert!(value.is_normalized());

        value.set(Some(ValueBuf::from("")));
        value
            .normalize(&DeepTrimToLowerNormalizer::new("1.1.1"))
            .unwrap();
        assert_eq!(value.normalized_value(), Some(&ValueBuf::Text(String::new())));

        value.set(Some(ValueBuf::from("  This is    a   TEST  ")));
        assert_eq!(
            value.normalized_value(),
            Some(&ValueBuf::Text("  This is    a   TEST  ".to_string()))
        );

        value
            .normalize(&DeepTrimToLowerNormalizer::new("1.1.1"))
            .unwrap();
        assert_eq!(
            value.normalized_value(),
            Some(&ValueBuf::Text("this is a test".to_string()))
        );
    }

    #[test]
    fn test_normalize_idempotent() {
        let normalizer = DeepTrimToLowerNormalizer::new("1.1.1");
        let mut value = Value::text("  Mixed   CASE  ");
        value.normalize(&normalizer).unwrap();
        let first = value.normalized_value().cloned();
        value.normalize(&normalizer).unwrap();
        assert_eq!(value.normalized_value().cloned(), first);
    }

    #[test]
    fn test_is_valid_caches_verdict() {
        let checker = Ia5StringSyntaxChecker::new();
        let mut value = Value::text("Test");
        assert!(value.is_valid(&checker));
        assert_eq!(value.validity(), Validity::Valid);

        value.set(Some(ValueBuf::from("é")));
        assert_eq!(value.validity(), Validity::Unknown);
        assert!(!value.is_valid(&checker));
        assert_eq!(value.validity(), Validity::Invalid);
    }

    #[test]
    fn test_compare() {
        let mut a = Value::null();
        let mut b = Value::null();
        assert_eq!(a.compare(&b), Ordering::Equal);

        a.set(Some(ValueBuf::from("Test")));
        assert_eq!(a.compare(&b), Ordering::Greater);
        assert_eq!(b.compare(&a), Ordering::Less);

        b.set(Some(ValueBuf::from("Test")));
        assert_eq!(a.compare(&b), Ordering::Equal);

        a.set(Some(ValueBuf::from("a")));
        b.set(Some(ValueBuf::from("b")));
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(b.compare(&a), Ordering::Greater);
    }

    #[test]
    fn test_equality_on_normalized_form() {
        let mut a = Value::text("  This is    a TEST   ");
        let b = Value::text("this is a test");
        assert_ne!(a, b);

        a.normalize(&DeepTrimToLowerNormalizer::new("1.1.1"))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = Value::text("  This is    a   TEST  ");
        let cloned = original.clone();
        assert_eq!(original, cloned);

        original
            .normalize(&DeepTrimToLowerNormalizer::new("1.1.1"))
            .unwrap();
        assert!(original.is_normalized());
        assert!(!cloned.is_normalized());
    }

    #[test]
    fn test_display() {
        let mut value = Value::null();
        assert_eq!(value.to_string(), "null");

        value.set(Some(ValueBuf::from("Test")));
        assert_eq!(value.to_string(), "Test");

        value.clear();
        assert_eq!(value.to_string(), "null");
    }

    #[test]
    fn test_needs_base64_encoding() {
        assert!(!needs_base64_encoding(b""));
        assert!(!needs_base64_encoding(b"plain text"));
        assert!(needs_base64_encoding(&[0xFF, 0xFE]));
        assert!(needs_base64_encoding(b"line\nbreak"));
        assert!(needs_base64_encoding(b" leading space"));
        assert!(needs_base64_encoding(b":colon first"));
        assert!(needs_base64_encoding(b"<angle first"));
        assert!(needs_base64_encoding(b"trailing space "));
    }
}
