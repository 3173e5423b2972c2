use std::collections::HashMap;

use crate::value::Value;

/// Arguments passed to a template render or a function call.
///
/// Keys are case-insensitive; the spelling used on first insert is kept.
#[derive(Debug, Clone, Default)]
pub struct KernelArguments {
    /// Lowercased key → (original key, value).
    values: HashMap<String, (String, Value)>,
}

impl KernelArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a value. Returns the previous value, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let key = name.to_lowercase();
        match self.values.get_mut(&key) {
            Some(entry) => Some(std::mem::replace(&mut entry.1, value.into())),
            None => {
                self.values.insert(key, (name, value.into()));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(&name.to_lowercase()).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(&name.to_lowercase()).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries with their original key spelling, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.values().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for KernelArguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = KernelArguments::new();
        args.extend(iter);
        args
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for KernelArguments {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case() {
        let args = KernelArguments::new().with("City", "Seattle");
        assert_eq!(args.get("city"), Some(&Value::from("Seattle")));
        assert_eq!(args.get("CITY"), Some(&Value::from("Seattle")));
        assert!(args.contains("cItY"));
    }

    #[test]
    fn insert_keeps_first_spelling() {
        let mut args = KernelArguments::new().with("City", "Seattle");
        let previous = args.insert("CITY", "Paris");
        assert_eq!(previous, Some(Value::from("Seattle")));
        assert_eq!(args.len(), 1);
        let (key, value) = args.iter().next().expect("one entry");
        assert_eq!(key, "City");
        assert_eq!(value, &Value::from("Paris"));
    }

    #[test]
    fn collects_from_pairs() {
        let args: KernelArguments = [("a", 1i64), ("b", 2i64)].into_iter().collect();
        assert_eq!(args.len(), 2);
        assert_eq!(args.get("B"), Some(&Value::Integer(2)));
    }

    #[test]
    fn remove_ignores_case() {
        let mut args = KernelArguments::new().with("x", true);
        assert_eq!(args.remove("X"), Some(Value::Boolean(true)));
        assert!(args.is_empty());
    }
}
