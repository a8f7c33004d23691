//! Storage behind `Map`, `Set`, `WeakMap` and `WeakSet`.
//!
//! Ordered collections keep their entries in insertion order and leave a
//! tombstone where an entry was deleted, so an iterator can walk by position
//! and still visit entries added after it started. A hash index keyed by
//! SameValueZero finds entries without scanning.

use std::sync::Arc;

use num_bigint::BigInt;
use rustc_hash::{FxHashMap, FxHashSet};

use super::string::JsString;
use super::value::{Symbol, Value};
use crate::gc::{ObjectRef, Trace, Tracer};

/// A value normalized so that equal keys under SameValueZero hash alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum EntryKey {
    Undefined,
    Null,
    Boolean(bool),
    Number(u64),
    String(JsString),
    Symbol(Symbol),
    BigInt(Arc<BigInt>),
    Object(ObjectRef),
}

impl EntryKey {
    fn of(value: &Value) -> Self {
        match value {
            Value::Undefined | Value::Empty => EntryKey::Undefined,
            Value::Null => EntryKey::Null,
            Value::Boolean(b) => EntryKey::Boolean(*b),
            Value::Number(n) if n.is_nan() => EntryKey::Number(f64::NAN.to_bits()),
            Value::Number(n) if *n == 0.0 => EntryKey::Number(0.0f64.to_bits()),
            Value::Number(n) => EntryKey::Number(n.to_bits()),
            Value::String(s) => EntryKey::String(s.clone()),
            Value::Symbol(symbol) => EntryKey::Symbol(symbol.clone()),
            Value::BigInt(n) => EntryKey::BigInt(n.clone()),
            Value::Object(object) => EntryKey::Object(*object),
        }
    }
}

/// Entries of a `Map` or `Set`. A set stores `undefined` as every value.
#[derive(Debug, Clone, Default)]
pub struct OrderedMap {
    entries: Vec<Option<(Value, Value)>>,
    index: FxHashMap<EntryKey, usize>,
}

impl OrderedMap {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The value stored under `key`.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        let position = *self.index.get(&EntryKey::of(key))?;
        self.entries[position].as_ref().map(|(_, value)| value)
    }

    /// Whether `key` is present.
    pub fn has(&self, key: &Value) -> bool {
        self.index.contains_key(&EntryKey::of(key))
    }

    /// Inserts or overwrites. A new key goes last; `-0` is stored as `+0`.
    pub fn set(&mut self, key: Value, value: Value) {
        let entry_key = EntryKey::of(&key);
        if let Some(&position) = self.index.get(&entry_key)
            && let Some(entry) = self.entries[position].as_mut()
        {
            entry.1 = value;
            return;
        }
        let key = match key {
            Value::Number(n) if n == 0.0 => Value::Number(0.0),
            other => other,
        };
        self.index.insert(entry_key, self.entries.len());
        self.entries.push(Some((key, value)));
    }

    /// Removes `key`, leaving a tombstone. Returns whether it was present.
    pub fn delete(&mut self, key: &Value) -> bool {
        match self.index.remove(&EntryKey::of(key)) {
            Some(position) => {
                self.entries[position] = None;
                true
            }
            None => false,
        }
    }

    /// Removes every entry. Positions already handed out stay valid.
    pub fn clear(&mut self) {
        self.index.clear();
        for entry in &mut self.entries {
            *entry = None;
        }
    }

    /// The first live entry at or after `position`, with its position.
    pub fn entry_from(&self, position: usize) -> Option<(usize, &Value, &Value)> {
        self.entries
            .iter()
            .enumerate()
            .skip(position)
            .find_map(|(at, entry)| entry.as_ref().map(|(key, value)| (at, key, value)))
    }

    /// Live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().flatten().map(|(key, value)| (key, value))
    }
}

impl Trace for OrderedMap {
    fn trace(&self, tracer: &mut Tracer) {
        for (key, value) in self.iter() {
            tracer.value(key);
            tracer.value(value);
        }
    }
}

/// Entries of a `WeakMap`, or of a `WeakSet` with `undefined` values.
///
/// Keys do not keep their objects alive: the collector traces a value only
/// once its key is reachable by other means, then drops entries whose key
/// died.
#[derive(Debug, Clone, Default)]
pub struct WeakTable {
    entries: FxHashMap<ObjectRef, Value>,
}

impl WeakTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value stored under `key`.
    pub fn get(&self, key: ObjectRef) -> Option<&Value> {
        self.entries.get(&key)
    }

    /// Whether `key` is present.
    pub fn has(&self, key: ObjectRef) -> bool {
        self.entries.contains_key(&key)
    }

    /// Inserts or overwrites.
    pub fn set(&mut self, key: ObjectRef, value: Value) {
        self.entries.insert(key, value);
    }

    /// Removes `key`. Returns whether it was present.
    pub fn delete(&mut self, key: ObjectRef) -> bool {
        self.entries.remove(&key).is_some()
    }

    /// Number of entries, dead keys included until the next collection.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops the entries whose key is in `dead`.
    pub(crate) fn forget(&mut self, dead: &FxHashSet<ObjectRef>) {
        self.entries.retain(|key, _| !dead.contains(key));
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.entries.keys().copied()
    }
}

impl Trace for WeakTable {
    fn trace(&self, tracer: &mut Tracer) {
        for (key, value) in &self.entries {
            tracer.ephemeron(*key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_value_zero_keys() {
        let mut map = OrderedMap::new();
        map.set(Value::Number(-0.0), Value::from("zero"));
        map.set(Value::Number(f64::NAN), Value::from("nan"));
        assert_eq!(map.get(&Value::Number(0.0)), Some(&Value::from("zero")));
        assert_eq!(map.get(&Value::Number(f64::NAN)), Some(&Value::from("nan")));
        assert!(map.iter().all(|(key, _)| !matches!(key, Value::Number(n) if n.is_sign_negative())));
        assert!(!map.has(&Value::from("0")));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_positions_survive_deletion() {
        let mut map = OrderedMap::new();
        for n in 0..3 {
            map.set(Value::Number(n as f64), Value::Undefined);
        }
        assert!(map.delete(&Value::Number(1.0)));
        assert!(!map.delete(&Value::Number(1.0)));
        let (at, key, _) = map.entry_from(1).unwrap();
        assert_eq!((at, key), (2, &Value::Number(2.0)));
        map.set(Value::Number(1.0), Value::Undefined);
        assert_eq!(map.entry_from(3).map(|(at, _, _)| at), Some(3));
        map.clear();
        assert!(map.is_empty());
        assert!(map.entry_from(0).is_none());
    }

    #[test]
    fn test_overwrite_keeps_order() {
        let mut map = OrderedMap::new();
        map.set(Value::from("a"), Value::Number(1.0));
        map.set(Value::from("b"), Value::Number(2.0));
        map.set(Value::from("a"), Value::Number(3.0));
        let order: Vec<_> = map.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        assert_eq!(order, vec![("a".into(), "3".into()), ("b".into(), "2".into())]);
    }
}
