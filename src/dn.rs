use std::fmt;
use std::hash::{Hash, Hasher};

/// A Distinguished Name: the hierarchical path identifying a directory
/// entry.
///
/// The user-provided form is kept verbatim; `normalize` derives the
/// canonical comparable form (RDN components trimmed, lower-cased). Once
/// built a Dn is treated as immutable, which is what makes sharing it
/// between an entry and its clones safe.
#[derive(Debug, Clone, Default)]
pub struct Dn {
    up_name: String,
    norm_name: Option<String>,
}

impl Dn {
    /// The canonical empty Dn, used wherever an entry has no name yet.
    pub const fn empty() -> Self {
        Dn {
            up_name: String::new(),
            norm_name: None,
        }
    }

    pub fn new(name: impl Into<String>) -> Self {
        Dn {
            up_name: name.into(),
            norm_name: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.up_name.is_empty()
    }

    /// The user-provided name, original casing preserved.
    pub fn name(&self) -> &str {
        &self.up_name
    }

    /// The normalized form when available, the user-provided form otherwise.
    pub fn normalized_name(&self) -> &str {
        self.norm_name.as_deref().unwrap_or(&self.up_name)
    }

    pub fn is_normalized(&self) -> bool {
        self.norm_name.is_some()
    }

    /// Derive the canonical form: each RDN component trimmed, the whole name
    /// lower-cased. Idempotent; an already normalized Dn is returned as-is.
    pub fn normalize(&self) -> Dn {
        if self.norm_name.is_some() {
            return self.clone();
        }

        let normalized = self
            .up_name
            .split(',')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(",")
            .to_lowercase();

        Dn {
            up_name: self.up_name.clone(),
            norm_name: Some(normalized),
        }
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.normalized_name() == other.normalized_name()
    }
}

impl Eq for Dn {}

impl Hash for Dn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized_name().hash(state);
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.up_name)
    }
}

impl From<&str> for Dn {
    fn from(name: &str) -> Self {
        Dn::new(name)
    }
}
