//! The realm: global object, global scope and intrinsic objects.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::environment::Scope;
use super::function::{Callable, NativeFn, NativeFunction};
use super::object::{ArrayData, JsObject, ObjectKind};
use super::string::JsString;
use super::value::Symbol;
use crate::builtins;
use crate::gc::{Heap, ObjectRef, ScopeRef, Trace, Tracer};

/// The error constructors of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// `Error`
    Error,
    /// `EvalError`
    Eval,
    /// `RangeError`
    Range,
    /// `ReferenceError`
    Reference,
    /// `SyntaxError`
    Syntax,
    /// `TypeError`
    Type,
    /// `URIError`
    Uri,
}

impl ErrorType {
    /// Every error type, `Error` first.
    pub const ALL: [ErrorType; 7] = [
        ErrorType::Error,
        ErrorType::Eval,
        ErrorType::Range,
        ErrorType::Reference,
        ErrorType::Syntax,
        ErrorType::Type,
        ErrorType::Uri,
    ];

    /// The constructor name.
    pub fn name(self) -> &'static str {
        match self {
            ErrorType::Error => "Error",
            ErrorType::Eval => "EvalError",
            ErrorType::Range => "RangeError",
            ErrorType::Reference => "ReferenceError",
            ErrorType::Syntax => "SyntaxError",
            ErrorType::Type => "TypeError",
            ErrorType::Uri => "URIError",
        }
    }
}

/// Objects the engine needs to reach without going through the global object.
#[derive(Debug, Clone)]
pub struct Intrinsics {
    /// `Object.prototype`
    pub object_prototype: ObjectRef,
    /// `Function.prototype`
    pub function_prototype: ObjectRef,
    /// `Array.prototype`
    pub array_prototype: ObjectRef,
    /// `String.prototype`
    pub string_prototype: ObjectRef,
    /// `Number.prototype`
    pub number_prototype: ObjectRef,
    /// `Boolean.prototype`
    pub boolean_prototype: ObjectRef,
    /// `Symbol.prototype`
    pub symbol_prototype: ObjectRef,
    /// `BigInt.prototype`
    pub bigint_prototype: ObjectRef,
    /// `RegExp.prototype`
    pub regexp_prototype: ObjectRef,
    /// `Date.prototype`
    pub date_prototype: ObjectRef,
    /// `Map.prototype`
    pub map_prototype: ObjectRef,
    /// `Set.prototype`
    pub set_prototype: ObjectRef,
    /// `WeakMap.prototype`
    pub weak_map_prototype: ObjectRef,
    /// `WeakSet.prototype`
    pub weak_set_prototype: ObjectRef,
    /// Prototypes of the error constructors, in [`ErrorType::ALL`] order
    pub error_prototypes: [ObjectRef; 7],
    /// `%IteratorPrototype%`
    pub iterator_prototype: ObjectRef,
    /// `%ArrayIteratorPrototype%`
    pub array_iterator_prototype: ObjectRef,
    /// `%StringIteratorPrototype%`
    pub string_iterator_prototype: ObjectRef,
    /// `%MapIteratorPrototype%`
    pub map_iterator_prototype: ObjectRef,
    /// `%SetIteratorPrototype%`
    pub set_iterator_prototype: ObjectRef,
    /// `%GeneratorFunction.prototype%`
    pub generator_function_prototype: ObjectRef,
    /// `%GeneratorFunction.prototype.prototype%`
    pub generator_prototype: ObjectRef,
    /// The global `eval`; calling it directly is a direct eval
    pub eval: ObjectRef,
    /// `Array.prototype.values`
    pub array_values: ObjectRef,
}

impl Intrinsics {
    /// Prototype of instances of `kind`.
    pub fn error_prototype(&self, kind: ErrorType) -> ObjectRef {
        let index = ErrorType::ALL.iter().position(|k| *k == kind).unwrap_or(0);
        self.error_prototypes[index]
    }
}

impl Trace for Intrinsics {
    fn trace(&self, tracer: &mut Tracer) {
        for object in [
            self.object_prototype,
            self.function_prototype,
            self.array_prototype,
            self.string_prototype,
            self.number_prototype,
            self.boolean_prototype,
            self.symbol_prototype,
            self.bigint_prototype,
            self.regexp_prototype,
            self.date_prototype,
            self.map_prototype,
            self.set_prototype,
            self.weak_map_prototype,
            self.weak_set_prototype,
            self.iterator_prototype,
            self.array_iterator_prototype,
            self.string_iterator_prototype,
            self.map_iterator_prototype,
            self.set_iterator_prototype,
            self.generator_function_prototype,
            self.generator_prototype,
            self.eval,
            self.array_values,
        ]
        .into_iter()
        .chain(self.error_prototypes)
        {
            tracer.object(object);
        }
    }
}

/// Symbols with special meaning to the engine.
#[derive(Debug, Clone)]
pub struct WellKnownSymbols {
    /// `Symbol.iterator`
    pub iterator: Symbol,
    /// `Symbol.toPrimitive`
    pub to_primitive: Symbol,
    /// `Symbol.toStringTag`
    pub to_string_tag: Symbol,
    /// `Symbol.hasInstance`
    pub has_instance: Symbol,
}

impl WellKnownSymbols {
    fn new() -> Self {
        let make = |name: &str| Symbol::new(Some(JsString::from(name)));
        Self {
            iterator: make("Symbol.iterator"),
            to_primitive: make("Symbol.toPrimitive"),
            to_string_tag: make("Symbol.toStringTag"),
            has_instance: make("Symbol.hasInstance"),
        }
    }
}

/// An isolated global environment with its intrinsic objects.
#[derive(Debug)]
pub struct Realm {
    /// The global object
    pub global_object: ObjectRef,
    /// Global lexical bindings (`let`, `const` at script top level)
    pub global_scope: ScopeRef,
    /// Intrinsic objects
    pub intrinsics: Intrinsics,
    /// Well-known symbols
    pub symbols: WellKnownSymbols,
    /// `Symbol.for` registry
    pub symbol_registry: FxHashMap<JsString, Symbol>,
    /// Template objects by call site id
    pub template_cache: FxHashMap<u64, ObjectRef>,
    /// `module` objects of loaded modules by id
    pub module_cache: FxHashMap<Arc<str>, ObjectRef>,
}

impl Realm {
    /// Allocates the intrinsics and global object in `heap`, then installs
    /// the standard library.
    pub fn new(heap: &mut Heap) -> Self {
        let object_prototype = heap.alloc_object(JsObject::ordinary(None));
        let proto = Some(object_prototype);
        let function_prototype = heap.alloc_object(JsObject::with_kind(
            proto,
            ObjectKind::Function(native("", builtins::function::empty)),
        ));
        let with_kind = |heap: &mut Heap, kind: ObjectKind| heap.alloc_object(JsObject::with_kind(proto, kind));
        let array_prototype = with_kind(heap, ObjectKind::Array(ArrayData::from_elements(Vec::new())));
        let string_prototype = with_kind(heap, ObjectKind::String(JsString::empty()));
        let number_prototype = with_kind(heap, ObjectKind::Number(0.0));
        let boolean_prototype = with_kind(heap, ObjectKind::Boolean(false));
        let symbol_prototype = with_kind(heap, ObjectKind::Ordinary);
        let bigint_prototype = with_kind(heap, ObjectKind::Ordinary);
        let regexp_prototype = with_kind(heap, ObjectKind::Ordinary);
        let date_prototype = with_kind(heap, ObjectKind::Ordinary);
        let map_prototype = with_kind(heap, ObjectKind::Ordinary);
        let set_prototype = with_kind(heap, ObjectKind::Ordinary);
        let weak_map_prototype = with_kind(heap, ObjectKind::Ordinary);
        let weak_set_prototype = with_kind(heap, ObjectKind::Ordinary);
        let error_base = with_kind(heap, ObjectKind::Ordinary);
        let mut error_prototypes = [error_base; 7];
        for prototype in error_prototypes.iter_mut().skip(1) {
            *prototype = heap.alloc_object(JsObject::ordinary(Some(error_base)));
        }
        let iterator_prototype = with_kind(heap, ObjectKind::Ordinary);
        let array_iterator_prototype = heap.alloc_object(JsObject::ordinary(Some(iterator_prototype)));
        let string_iterator_prototype = heap.alloc_object(JsObject::ordinary(Some(iterator_prototype)));
        let map_iterator_prototype = heap.alloc_object(JsObject::ordinary(Some(iterator_prototype)));
        let set_iterator_prototype = heap.alloc_object(JsObject::ordinary(Some(iterator_prototype)));
        let generator_prototype = heap.alloc_object(JsObject::ordinary(Some(iterator_prototype)));
        let generator_function_prototype = heap.alloc_object(JsObject::ordinary(Some(function_prototype)));
        let function = |heap: &mut Heap, name: &str, call: NativeFn| {
            heap.alloc_object(JsObject::with_kind(
                Some(function_prototype),
                ObjectKind::Function(native(name, call)),
            ))
        };
        let eval = function(heap, "eval", builtins::global::eval);
        let array_values = function(heap, "values", builtins::array::values);

        let intrinsics = Intrinsics {
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
            symbol_prototype,
            bigint_prototype,
            regexp_prototype,
            date_prototype,
            map_prototype,
            set_prototype,
            weak_map_prototype,
            weak_set_prototype,
            error_prototypes,
            iterator_prototype,
            array_iterator_prototype,
            string_iterator_prototype,
            map_iterator_prototype,
            set_iterator_prototype,
            generator_function_prototype,
            generator_prototype,
            eval,
            array_values,
        };
        let global_object = heap.alloc_object(JsObject::ordinary(Some(object_prototype)));
        let global_scope = heap.alloc_scope(Scope::global());
        let mut realm = Self {
            global_object,
            global_scope,
            intrinsics,
            symbols: WellKnownSymbols::new(),
            symbol_registry: FxHashMap::default(),
            template_cache: FxHashMap::default(),
            module_cache: FxHashMap::default(),
        };
        builtins::install(heap, &mut realm);
        realm
    }
}

fn native(name: &str, call: NativeFn) -> Callable {
    Callable::Native(NativeFunction {
        name: Arc::from(name),
        call,
        construct: None,
    })
}

impl Trace for Realm {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.object(self.global_object);
        tracer.scope(self.global_scope);
        self.intrinsics.trace(tracer);
        for object in self.template_cache.values().chain(self.module_cache.values()) {
            tracer.object(*object);
        }
    }
}
