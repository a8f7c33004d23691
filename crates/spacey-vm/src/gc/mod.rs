//! Heap storage and garbage collection.
//!
//! Objects and scopes live in two [`Arena`]s and refer to each other through
//! generation-checked handles, so cyclic graphs (prototype chains, closures
//! capturing their own scope) need no reference counting. [`Heap::collect`]
//! is a mark-and-sweep pass over everything reachable from the roots the
//! caller supplies; it only runs between script executions, when no frame
//! holds values the roots don't see. Entries of weak collections are
//! ephemerons: their value is traced only once their key is marked, and
//! entries whose key dies are dropped before the sweep.

pub mod arena;

pub use arena::{Arena, Handle};

use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::runtime::environment::Scope;
use crate::runtime::object::JsObject;
use crate::runtime::value::Value;

/// A reference to a heap object.
pub type ObjectRef = Handle<JsObject>;

/// A reference to a heap scope.
pub type ScopeRef = Handle<Scope>;

/// Reports the heap references held by a value.
pub trait Trace {
    /// Hands every directly held object and scope to `tracer`.
    fn trace(&self, tracer: &mut Tracer);
}

/// Work list of the mark phase.
#[derive(Debug, Default)]
pub struct Tracer {
    objects: Vec<ObjectRef>,
    scopes: Vec<ScopeRef>,
    /// Weak entries whose value waits on its key
    ephemerons: Vec<(ObjectRef, ObjectRef)>,
}

impl Tracer {
    /// Marks an object as reachable.
    pub fn object(&mut self, object: ObjectRef) {
        self.objects.push(object);
    }

    /// Marks a scope as reachable.
    pub fn scope(&mut self, scope: ScopeRef) {
        self.scopes.push(scope);
    }

    /// Marks the object a value refers to, if any.
    pub fn value(&mut self, value: &Value) {
        if let Value::Object(object) = value {
            self.objects.push(*object);
        }
    }

    /// A weak entry: `value` is reachable only if `key` is.
    pub fn ephemeron(&mut self, key: ObjectRef, value: &Value) {
        if let Value::Object(object) = value {
            self.ephemerons.push((key, *object));
        }
    }

    /// Marks the objects of several values.
    pub fn values<'v>(&mut self, values: impl IntoIterator<Item = &'v Value>) {
        for value in values {
            self.value(value);
        }
    }
}

/// Outcome of one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Objects reclaimed
    pub objects_freed: usize,
    /// Scopes reclaimed
    pub scopes_freed: usize,
    /// Objects still alive
    pub objects_live: usize,
    /// Scopes still alive
    pub scopes_live: usize,
}

/// The object and scope arenas of one realm.
#[derive(Default)]
pub struct Heap {
    objects: Arena<JsObject>,
    scopes: Arena<Scope>,
}

impl Heap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an object.
    pub fn alloc_object(&mut self, object: JsObject) -> ObjectRef {
        self.objects.alloc(object)
    }

    /// Borrows an object.
    #[inline]
    pub fn object(&self, object: ObjectRef) -> Result<&JsObject> {
        self.objects.get(object)
    }

    /// Mutably borrows an object.
    #[inline]
    pub fn object_mut(&mut self, object: ObjectRef) -> Result<&mut JsObject> {
        self.objects.get_mut(object)
    }

    /// Allocates a scope.
    pub fn alloc_scope(&mut self, scope: Scope) -> ScopeRef {
        self.scopes.alloc(scope)
    }

    /// Borrows a scope.
    #[inline]
    pub fn scope(&self, scope: ScopeRef) -> Result<&Scope> {
        self.scopes.get(scope)
    }

    /// Mutably borrows a scope.
    #[inline]
    pub fn scope_mut(&mut self, scope: ScopeRef) -> Result<&mut Scope> {
        self.scopes.get_mut(scope)
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of live scopes.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Frees everything not reachable from `roots`.
    pub fn collect(&mut self, roots: &dyn Trace) -> GcStats {
        let mut tracer = Tracer::default();
        let mut weak_holders = Vec::new();
        roots.trace(&mut tracer);
        loop {
            if let Some(object) = tracer.objects.pop() {
                if self.objects.mark(object)
                    && let Ok(cell) = self.objects.get(object)
                {
                    cell.trace(&mut tracer);
                    if cell.weak_table().is_some() {
                        weak_holders.push(object);
                    }
                }
                continue;
            }
            if let Some(scope) = tracer.scopes.pop() {
                if self.scopes.mark(scope)
                    && let Ok(cell) = self.scopes.get(scope)
                {
                    cell.trace(&mut tracer);
                }
                continue;
            }
            let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut tracer.ephemerons)
                .into_iter()
                .partition(|(key, _)| self.objects.is_marked(*key));
            tracer.ephemerons = waiting;
            if ready.is_empty() {
                break;
            }
            tracer.objects.extend(ready.into_iter().map(|(_, value)| value));
        }
        self.forget_dead_keys(&weak_holders);
        let stats = GcStats {
            objects_freed: self.objects.sweep(),
            scopes_freed: self.scopes.sweep(),
            objects_live: self.objects.len(),
            scopes_live: self.scopes.len(),
        };
        tracing::debug!(
            objects_freed = stats.objects_freed,
            scopes_freed = stats.scopes_freed,
            objects_live = stats.objects_live,
            scopes_live = stats.scopes_live,
            "garbage collected"
        );
        stats
    }

    /// Drops weak entries whose key was not marked.
    fn forget_dead_keys(&mut self, holders: &[ObjectRef]) {
        for &holder in holders {
            let dead: FxHashSet<ObjectRef> = match self.objects.get(holder).ok().and_then(JsObject::weak_table) {
                Some(table) => table.keys().filter(|key| !self.objects.is_marked(*key)).collect(),
                None => continue,
            };
            if !dead.is_empty()
                && let Ok(object) = self.objects.get_mut(holder)
                && let Some(table) = object.weak_table_mut()
            {
                table.forget(&dead);
            }
        }
    }
}

impl<T: Trace> Trace for [T] {
    fn trace(&self, tracer: &mut Tracer) {
        for item in self {
            item.trace(tracer);
        }
    }
}

impl Trace for Value {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.value(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::collections::WeakTable;
    use crate::runtime::object::{ObjectKind, PropertyKey};

    struct Roots(Vec<ObjectRef>);

    impl Trace for Roots {
        fn trace(&self, tracer: &mut Tracer) {
            for object in &self.0 {
                tracer.object(*object);
            }
        }
    }

    #[test]
    fn test_collect_keeps_reachable_cycle() {
        let mut heap = Heap::new();
        let a = heap.alloc_object(JsObject::ordinary(None));
        let b = heap.alloc_object(JsObject::ordinary(Some(a)));
        heap.object_mut(a)
            .unwrap()
            .insert_data(PropertyKey::from("b"), Value::Object(b));
        let garbage = heap.alloc_object(JsObject::ordinary(Some(a)));

        let stats = heap.collect(&Roots(vec![a]));
        assert_eq!(stats.objects_freed, 1);
        assert_eq!(stats.objects_live, 2);
        assert!(heap.object(b).is_ok());
        assert!(heap.object(garbage).is_err());
    }

    #[test]
    fn test_collect_traces_scopes() {
        let mut heap = Heap::new();
        let held = heap.alloc_object(JsObject::ordinary(None));
        let scope = heap.alloc_scope(Scope::with_object(held, None));
        let holder = heap.alloc_object(JsObject::ordinary(None));
        heap.collect(&Roots(vec![holder]));
        assert!(heap.scope(scope).is_err());
        assert!(heap.object(held).is_err());
    }

    #[test]
    fn test_weak_entries_follow_their_key() {
        let mut heap = Heap::new();
        let live_key = heap.alloc_object(JsObject::ordinary(None));
        let dead_key = heap.alloc_object(JsObject::ordinary(None));
        let live_value = heap.alloc_object(JsObject::ordinary(None));
        let dead_value = heap.alloc_object(JsObject::ordinary(None));
        let mut table = WeakTable::new();
        table.set(live_key, Value::Object(live_value));
        table.set(dead_key, Value::Object(dead_value));
        // A value that refers back to its own key must not keep the key alive
        heap.object_mut(dead_value)
            .unwrap()
            .insert_data(PropertyKey::from("key"), Value::Object(dead_key));
        let weak_map = heap.alloc_object(JsObject::with_kind(None, ObjectKind::WeakMap(Box::new(table))));

        let stats = heap.collect(&Roots(vec![weak_map, live_key]));
        assert_eq!(stats.objects_freed, 2);
        assert!(heap.object(live_value).is_ok());
        assert!(heap.object(dead_key).is_err());
        assert!(heap.object(dead_value).is_err());
        let table = heap.object(weak_map).unwrap().weak_table().unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.has(live_key));
    }

    #[test]
    fn test_ephemeron_chains_resolve() {
        let mut heap = Heap::new();
        let first = heap.alloc_object(JsObject::ordinary(None));
        let second = heap.alloc_object(JsObject::ordinary(None));
        let third = heap.alloc_object(JsObject::ordinary(None));
        let mut table = WeakTable::new();
        // second is only reachable as the value of first, third as the value of second
        table.set(second, Value::Object(third));
        table.set(first, Value::Object(second));
        let weak_map = heap.alloc_object(JsObject::with_kind(None, ObjectKind::WeakMap(Box::new(table))));

        let stats = heap.collect(&Roots(vec![weak_map, first]));
        assert_eq!(stats.objects_freed, 0);
        assert_eq!(heap.object(weak_map).unwrap().weak_table().unwrap().len(), 2);
    }
}
