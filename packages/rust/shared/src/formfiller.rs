//! Static form-value oracle.
//!
//! Grounded in the original crawler's `FormFiller`: a lookup table keyed by
//! the sorted tuple of a form's non-empty field names, returning a value
//! map to submit. Forms whose field-name set has no registered entry are
//! submitted with an empty parameter map — the driver decides what that
//! means (see `statecrawl_crawler::driver`).

use std::collections::BTreeMap;

/// Sorted, deduplicated field names used as the lookup key.
type FieldKey = Vec<String>;

/// Maps a form's field-name signature to the values to submit.
#[derive(Debug, Clone, Default)]
pub struct FormFiller {
    entries: BTreeMap<FieldKey, BTreeMap<String, String>>,
}

impl FormFiller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register values for a form whose non-empty field names are `fields`.
    pub fn add(&mut self, fields: impl IntoIterator<Item = impl Into<String>>, values: BTreeMap<String, String>) {
        let key = normalize_key(fields);
        self.entries.insert(key, values);
    }

    /// Look up the values to submit for a form with these field names.
    /// Returns `None` when no entry matches.
    pub fn get(&self, fields: impl IntoIterator<Item = impl Into<String>>) -> Option<&BTreeMap<String, String>> {
        let key = normalize_key(fields);
        self.entries.get(&key)
    }
}

fn normalize_key(fields: impl IntoIterator<Item = impl Into<String>>) -> FieldKey {
    let mut key: Vec<String> = fields
        .into_iter()
        .map(Into::into)
        .filter(|f| !f.is_empty())
        .collect();
    key.sort();
    key.dedup();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_field_set_ignores_order() {
        let mut filler = FormFiller::new();
        let mut values = BTreeMap::new();
        values.insert("username".to_string(), "alice".to_string());
        values.insert("password".to_string(), "hunter2".to_string());
        filler.add(["username", "password"], values);

        let found = filler.get(["password", "username"]);
        assert!(found.is_some());
        assert_eq!(found.unwrap().get("username"), Some(&"alice".to_string()));
    }

    #[test]
    fn lookup_ignores_empty_field_names() {
        let mut filler = FormFiller::new();
        filler.add(["q", ""], BTreeMap::new());
        assert!(filler.get(["q"]).is_some());
    }

    #[test]
    fn unregistered_field_set_returns_none() {
        let filler = FormFiller::new();
        assert!(filler.get(["search"]).is_none());
    }
}
