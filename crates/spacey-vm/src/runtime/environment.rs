//! Heap scopes for captured and dynamically resolved bindings.
//!
//! Bindings that are not captured by a closure live in frame locals and
//! never reach this module. Everything else sits in a [`Scope`] on the heap,
//! addressed by slot (for `GetScope`/`SetScope`) or by name (for `with`,
//! direct `eval` and globals).

use rustc_hash::FxHashMap;

use super::string::JsString;
use super::value::Value;
use crate::compiler::bytecode::ScopeTemplate;
use crate::gc::{ObjectRef, ScopeRef, Trace, Tracer};

/// What kind of environment a scope is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Block or catch scope
    Declarative,
    /// Bindings of a function body
    Function,
    /// `with` statement over an object
    With(ObjectRef),
    /// Global lexical bindings; `var`s go to the global object
    Global,
}

/// A variable binding.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Binding name
    pub name: JsString,
    /// The value; [`Value::Empty`] while in the temporal dead zone
    pub value: Value,
    /// Whether assignments are allowed (let vs const)
    pub mutable: bool,
    /// Whether a sloppy assignment to an immutable binding is ignored
    pub silent: bool,
}

/// A heap-allocated environment.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Kind of environment
    pub kind: ScopeKind,
    /// The enclosing scope
    pub parent: Option<ScopeRef>,
    /// Receives `var` declarations made by direct `eval`
    pub var_scope: bool,
    bindings: Vec<Binding>,
    index: FxHashMap<JsString, u32>,
}

impl Scope {
    fn empty(kind: ScopeKind, parent: Option<ScopeRef>, var_scope: bool) -> Self {
        Self {
            kind,
            parent,
            var_scope,
            bindings: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Creates the global scope.
    pub fn global() -> Self {
        Self::empty(ScopeKind::Global, None, true)
    }

    /// Creates a scope laid out by a compiler template.
    pub fn from_template(template: &ScopeTemplate, kind: ScopeKind, parent: Option<ScopeRef>) -> Self {
        let mut scope = Self::empty(kind, parent, template.var_scope);
        scope.bindings.reserve(template.bindings.len());
        for binding in &template.bindings {
            let value = if binding.lexical { Value::Empty } else { Value::Undefined };
            scope.push(Binding {
                name: binding.name.clone(),
                value,
                mutable: binding.mutable,
                silent: binding.silent,
            });
        }
        scope
    }

    /// Creates a `with` scope over `object`.
    pub fn with_object(object: ObjectRef, parent: Option<ScopeRef>) -> Self {
        Self::empty(ScopeKind::With(object), parent, false)
    }

    fn push(&mut self, binding: Binding) -> u32 {
        let slot = self.bindings.len() as u32;
        self.index.insert(binding.name.clone(), slot);
        self.bindings.push(binding);
        slot
    }

    /// Slot of the binding named `name`.
    pub fn lookup(&self, name: &JsString) -> Option<u32> {
        self.index.get(name).copied()
    }

    /// Borrows the binding in `slot`.
    pub fn binding(&self, slot: u32) -> Option<&Binding> {
        self.bindings.get(slot as usize)
    }

    /// Mutably borrows the binding in `slot`.
    pub fn binding_mut(&mut self, slot: u32) -> Option<&mut Binding> {
        self.bindings.get_mut(slot as usize)
    }

    /// Adds a binding at run time (`eval` declarations, global `let`).
    /// An existing binding of the same name is kept.
    pub fn declare(&mut self, name: JsString, value: Value, mutable: bool) -> u32 {
        if let Some(slot) = self.lookup(&name) {
            return slot;
        }
        self.push(Binding {
            name,
            value,
            mutable,
            silent: false,
        })
    }

    /// All bindings, in slot order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}

impl Trace for Scope {
    fn trace(&self, tracer: &mut Tracer) {
        if let Some(parent) = self.parent {
            tracer.scope(parent);
        }
        if let ScopeKind::With(object) = self.kind {
            tracer.object(object);
        }
        for binding in &self.bindings {
            tracer.value(&binding.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::BindingTemplate;

    fn template() -> ScopeTemplate {
        ScopeTemplate {
            var_scope: false,
            bindings: vec![
                BindingTemplate {
                    name: JsString::from("a"),
                    mutable: true,
                    lexical: true,
                    silent: false,
                },
                BindingTemplate {
                    name: JsString::from("b"),
                    mutable: true,
                    lexical: false,
                    silent: false,
                },
            ],
        }
    }

    #[test]
    fn test_template_bindings_start_in_tdz() {
        let scope = Scope::from_template(&template(), ScopeKind::Declarative, None);
        assert_eq!(scope.lookup(&JsString::from("a")), Some(0));
        assert_eq!(scope.binding(0).map(|b| &b.value), Some(&Value::Empty));
        assert_eq!(scope.binding(1).map(|b| &b.value), Some(&Value::Undefined));
        assert!(scope.lookup(&JsString::from("c")).is_none());
    }

    #[test]
    fn test_declare_keeps_existing() {
        let mut scope = Scope::global();
        let slot = scope.declare(JsString::from("x"), Value::from(1), true);
        assert_eq!(scope.declare(JsString::from("x"), Value::from(2), true), slot);
        assert_eq!(scope.binding(slot).map(|b| &b.value), Some(&Value::from(1)));
    }

    #[test]
    fn test_copy_is_independent() {
        let original = Scope::from_template(&template(), ScopeKind::Declarative, None);
        let mut copy = original.clone();
        if let Some(binding) = copy.binding_mut(1) {
            binding.value = Value::from(5);
        }
        assert_eq!(original.binding(1).map(|b| &b.value), Some(&Value::Undefined));
    }
}
