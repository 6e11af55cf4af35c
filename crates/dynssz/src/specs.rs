//! Spec-value resolution.
//!
//! Preset parameters ("spec values") are supplied at construction as a name →
//! value map. Tag expressions are resolved against it as opaque whole-string
//! lookups; expression syntax is the concern of an outer layer. Results are
//! cached, including negative ones, since the same expression recurs for
//! every field that references it.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::SszError;

/// A configuration value a preset can bind a name to.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecValue {
    /// A numeric parameter, usable in size/max expressions.
    U64(u64),
    /// A boolean parameter.
    Bool(bool),
    /// A textual parameter.
    Str(String),
}

impl From<u64> for SpecValue {
    fn from(v: u64) -> Self {
        SpecValue::U64(v)
    }
}

impl From<bool> for SpecValue {
    fn from(v: bool) -> Self {
        SpecValue::Bool(v)
    }
}

impl From<&str> for SpecValue {
    fn from(v: &str) -> Self {
        SpecValue::Str(v.to_string())
    }
}

/// Cached name → numeric-value resolution over a preset map.
#[derive(Debug)]
pub(crate) struct SpecResolver {
    values: HashMap<String, SpecValue>,
    cache: RwLock<HashMap<String, Option<u64>>>,
}

impl SpecResolver {
    pub(crate) fn new(values: HashMap<String, SpecValue>) -> Self {
        Self {
            values,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve `expr` to a numeric value. `Ok(None)` means the name is not
    /// bound; a name bound to a non-numeric value is a tag error.
    pub(crate) fn resolve(&self, expr: &str) -> Result<Option<u64>, SszError> {
        if let Some(cached) = self.cache.read().expect("spec cache poisoned").get(expr) {
            return Ok(*cached);
        }
        let resolved = match self.values.get(expr) {
            Some(SpecValue::U64(v)) => Some(*v),
            Some(_) => {
                return Err(SszError::TagParse(format!(
                    "spec value '{expr}' is not numeric"
                )));
            }
            None => None,
        };
        self.cache
            .write()
            .expect("spec cache poisoned")
            .insert(expr.to_string(), resolved);
        Ok(resolved)
    }

    /// Drop all cached resolutions.
    pub(crate) fn flush(&self) {
        self.cache.write().expect("spec cache poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> SpecResolver {
        let mut values = HashMap::new();
        values.insert("MAX_COMMITTEES".to_string(), SpecValue::U64(64));
        values.insert("PRESET_NAME".to_string(), SpecValue::from("minimal"));
        SpecResolver::new(values)
    }

    #[test]
    fn resolves_numeric_values() {
        let r = resolver();
        assert_eq!(r.resolve("MAX_COMMITTEES").unwrap(), Some(64));
        // Second hit comes from the cache.
        assert_eq!(r.resolve("MAX_COMMITTEES").unwrap(), Some(64));
    }

    #[test]
    fn unknown_names_are_unresolved() {
        assert_eq!(resolver().resolve("NO_SUCH_VALUE").unwrap(), None);
    }

    #[test]
    fn non_numeric_values_are_tag_errors() {
        assert!(matches!(
            resolver().resolve("PRESET_NAME"),
            Err(SszError::TagParse(_))
        ));
    }
}
