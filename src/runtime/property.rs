//! Property table and operations
//!
//! Objects store named properties in insertion order, with a hash index
//! for lookup. Enumeration order is insertion order, which is what `for-in`
//! and `Object.keys` observe.

use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::value::JsValue;

/// A named property
#[derive(Debug, Clone)]
pub struct Property {
    pub key: Rc<str>,
    pub value: JsValue,
    /// Visible to `for-in` and `Object.keys`
    pub enumerable: bool,
}

/// Property table structure
#[derive(Debug, Default)]
pub struct PropertyTable {
    /// Properties in insertion order
    properties: Vec<Property>,
    /// Key -> index into `properties`
    index: HashMap<Rc<str>, usize>,
}

impl PropertyTable {
    /// Create a new empty property table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of properties
    #[inline]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if the table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Find a property by key
    ///
    /// Returns the property index if found.
    pub fn find(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Get a property by key
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.find(key).map(|idx| &self.properties[idx])
    }

    /// Get a mutable property reference by key
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Property> {
        self.find(key).map(move |idx| &mut self.properties[idx])
    }

    /// Insert or update an enumerable property
    ///
    /// Returns true if this was a new property, false if updated.
    pub fn set(&mut self, key: &str, value: JsValue) -> bool {
        if let Some(idx) = self.find(key) {
            self.properties[idx].value = value;
            return false;
        }
        self.insert(Rc::from(key), value, true);
        true
    }

    /// Define a property with explicit enumerability, replacing any existing one
    pub fn define(&mut self, key: &str, value: JsValue, enumerable: bool) {
        match self.find(key) {
            Some(idx) => {
                let prop = &mut self.properties[idx];
                prop.value = value;
                prop.enumerable = enumerable;
            }
            None => self.insert(Rc::from(key), value, enumerable),
        }
    }

    fn insert(&mut self, key: Rc<str>, value: JsValue, enumerable: bool) {
        self.index.insert(key.clone(), self.properties.len());
        self.properties.push(Property {
            key,
            value,
            enumerable,
        });
    }

    /// Delete a property by key
    ///
    /// Returns true if the property existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let Some(idx) = self.index.remove(key) else {
            return false;
        };
        self.properties.remove(idx);
        // Later entries shifted down by one
        for prop in &self.properties[idx..] {
            if let Some(slot) = self.index.get_mut(&prop.key) {
                *slot -= 1;
            }
        }
        true
    }

    /// Check if a property exists
    pub fn has(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Iterate over all properties
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// Iterate over enumerable property keys
    pub fn enumerable_keys(&self) -> impl Iterator<Item = &Rc<str>> + '_ {
        self.properties
            .iter()
            .filter(|p| p.enumerable)
            .map(|p| &p.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(prop: Option<&Property>) -> Option<f64> {
        prop.and_then(|p| p.value.as_number())
    }

    #[test]
    fn test_empty_table() {
        let table = PropertyTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(table.get("x").is_none());
    }

    #[test]
    fn test_set_get_update() {
        let mut table = PropertyTable::new();

        assert!(table.set("x", JsValue::Number(10.0)));
        assert!(!table.set("x", JsValue::Number(20.0)));

        assert_eq!(table.len(), 1);
        assert_eq!(number(table.get("x")), Some(20.0));
    }

    #[test]
    fn test_delete_keeps_order() {
        let mut table = PropertyTable::new();

        table.set("a", JsValue::Number(1.0));
        table.set("b", JsValue::Number(2.0));
        table.set("c", JsValue::Number(3.0));

        assert!(table.delete("b"));
        assert!(!table.delete("b")); // Already deleted
        assert_eq!(table.len(), 2);

        table.set("d", JsValue::Number(4.0));
        let keys: Vec<_> = table.iter().map(|p| p.key.to_string()).collect();
        assert_eq!(keys, ["a", "c", "d"]);
        assert_eq!(number(table.get("c")), Some(3.0));
        assert_eq!(number(table.get("d")), Some(4.0));
    }

    #[test]
    fn test_enumerable_keys() {
        let mut table = PropertyTable::new();

        table.set("visible", JsValue::Null);
        table.define("hidden", JsValue::Null, false);

        let keys: Vec<_> = table.enumerable_keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["visible"]);
        assert!(table.has("hidden"));
    }

    #[test]
    fn test_multiple_properties() {
        let mut table = PropertyTable::new();

        for i in 0..100 {
            table.set(&i.to_string(), JsValue::Number(i as f64 * 2.0));
        }

        assert_eq!(table.len(), 100);
        for i in 0..100 {
            assert_eq!(number(table.get(&i.to_string())), Some(i as f64 * 2.0));
        }
    }
}
