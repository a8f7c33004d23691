//! Built-in JavaScript objects and constructors.
//!
//! [`install`] populates a fresh realm: the intrinsic prototypes allocated by
//! [`Realm::new`] get their methods, and the constructors and namespaces are
//! defined on the global object as non-enumerable properties.
//!
//! - Object, Function, Array, String, Number, Boolean, Symbol, BigInt
//! - Math, JSON, RegExp, Date
//! - Map, Set, WeakMap, WeakSet, Reflect
//! - Error types
//! - Iterator and generator prototypes
//! - console, `require` (installed once a module loader is set)

pub mod array;
pub mod bigint;
pub mod boolean;
pub mod collection;
pub mod console;
pub mod date;
pub mod error;
pub mod function;
pub mod global;
pub mod iterator;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod reflect;
pub mod regexp;
pub mod require;
pub mod string;
pub mod symbol;
pub mod weak;

use std::sync::Arc;

use crate::gc::{Heap, ObjectRef};
use crate::runtime::context::{Intrinsics, Realm, WellKnownSymbols};
use crate::runtime::function::{Callable, NativeConstructor, NativeFn, NativeFunction};
use crate::runtime::object::{Attributes, JsObject, ObjectKind, PropertyKey, PropertySlot};
use crate::runtime::value::{Symbol, Value};

/// Register all built-in functions and objects.
pub fn install(heap: &mut Heap, realm: &mut Realm) {
    let mut builder = Builder {
        heap,
        intrinsics: realm.intrinsics.clone(),
        symbols: realm.symbols.clone(),
        global: realm.global_object,
    };
    let global = builder.global;
    builder.value(global, "globalThis", Value::Object(global));

    object::register(&mut builder);
    function::register(&mut builder);
    array::register(&mut builder);
    string::register(&mut builder);
    number::register(&mut builder);
    boolean::register(&mut builder);
    symbol::register(&mut builder);
    bigint::register(&mut builder);
    error::register(&mut builder);
    regexp::register(&mut builder);
    iterator::register(&mut builder);
    collection::register(&mut builder);
    weak::register(&mut builder);
    date::register(&mut builder);
    reflect::register(&mut builder);
    math::register(&mut builder);
    json::register(&mut builder);
    global::register(&mut builder);
    console::register(&mut builder);
}

/// Defines native functions and properties while a realm is being set up.
pub struct Builder<'a> {
    heap: &'a mut Heap,
    /// The realm's intrinsics
    pub intrinsics: Intrinsics,
    /// The realm's well-known symbols
    pub symbols: WellKnownSymbols,
    /// The global object
    pub global: ObjectRef,
}

impl Builder<'_> {
    /// Create a native function object.
    pub fn make_native(&mut self, name: &str, length: u32, call: NativeFn, construct: Option<NativeConstructor>) -> ObjectRef {
        let mut function = JsObject::with_kind(
            Some(self.intrinsics.function_prototype),
            ObjectKind::Function(Callable::Native(NativeFunction {
                name: Arc::from(name),
                call,
                construct,
            })),
        );
        function.insert(
            PropertyKey::from("length"),
            PropertySlot::data(Value::from(length), Attributes::CONFIGURABLE),
        );
        function.insert(
            PropertyKey::from("name"),
            PropertySlot::data(Value::from(name), Attributes::CONFIGURABLE),
        );
        self.heap.alloc_object(function)
    }

    /// Allocates a plain object.
    pub fn object(&mut self) -> ObjectRef {
        self.heap
            .alloc_object(JsObject::ordinary(Some(self.intrinsics.object_prototype)))
    }

    /// Adds a property with explicit attributes.
    pub fn define(&mut self, target: ObjectRef, key: PropertyKey, slot: PropertySlot) {
        if let Ok(object) = self.heap.object_mut(target) {
            object.insert(key, slot);
        }
    }

    /// Replaces the `[[Prototype]]` of `target`.
    pub fn set_prototype(&mut self, target: ObjectRef, prototype: ObjectRef) {
        if let Ok(object) = self.heap.object_mut(target) {
            object.prototype = Some(prototype);
        }
    }

    /// A non-enumerable data property, the default for built-ins.
    pub fn value(&mut self, target: ObjectRef, name: &str, value: Value) {
        self.define(target, PropertyKey::from(name), PropertySlot::data(value, Attributes::HIDDEN));
    }

    /// A read-only constant such as `Math.PI`.
    pub fn constant(&mut self, target: ObjectRef, name: &str, value: Value) {
        self.define(target, PropertyKey::from(name), PropertySlot::data(value, Attributes::FROZEN));
    }

    /// A method.
    pub fn method(&mut self, target: ObjectRef, name: &str, length: u32, call: NativeFn) -> ObjectRef {
        let function = self.make_native(name, length, call, None);
        self.value(target, name, Value::Object(function));
        function
    }

    /// A method keyed by a symbol; `name` is the function's name.
    pub fn symbol_method(&mut self, target: ObjectRef, symbol: Symbol, name: &str, length: u32, call: NativeFn) {
        let function = self.make_native(name, length, call, None);
        self.define(
            target,
            PropertyKey::Symbol(symbol),
            PropertySlot::data(Value::Object(function), Attributes::HIDDEN),
        );
    }

    /// An accessor with a native getter and an optional setter.
    pub fn accessor(&mut self, target: ObjectRef, key: PropertyKey, get: NativeFn, set: Option<NativeFn>) {
        let name = key.to_string();
        let getter = self.make_native(&format!("get {name}"), 0, get, None);
        let setter = set.map(|set| self.make_native(&format!("set {name}"), 1, set, None));
        self.define(
            target,
            key,
            PropertySlot::Accessor {
                get: Some(getter),
                set: setter,
                attributes: Attributes::new(false, false, true),
            },
        );
    }

    /// `Symbol.toStringTag`.
    pub fn to_string_tag(&mut self, target: ObjectRef, tag: &str) {
        let key = PropertyKey::Symbol(self.symbols.to_string_tag.clone());
        self.define(target, key, PropertySlot::data(Value::from(tag), Attributes::CONFIGURABLE));
    }

    /// A constructor linked with its prototype object and defined as a
    /// global.
    pub fn constructor(
        &mut self,
        name: &str,
        length: u32,
        call: NativeFn,
        construct: Option<NativeConstructor>,
        prototype: ObjectRef,
    ) -> ObjectRef {
        let constructor = self.make_native(name, length, call, construct);
        self.define(
            constructor,
            PropertyKey::from("prototype"),
            PropertySlot::data(Value::Object(prototype), Attributes::FROZEN),
        );
        self.value(prototype, "constructor", Value::Object(constructor));
        let global = self.global;
        self.value(global, name, Value::Object(constructor));
        constructor
    }

    /// A namespace object such as `Math` or `JSON`, defined as a global.
    pub fn namespace(&mut self, name: &str) -> ObjectRef {
        let namespace = self.object();
        self.to_string_tag(namespace, name);
        let global = self.global;
        self.value(global, name, Value::Object(namespace));
        namespace
    }
}

/// The argument at `index`, `undefined` when absent.
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::compiler::compile;
    use crate::error::{Error, Result};
    use crate::options::CompileOptions;
    use crate::runtime::value::Value;
    use crate::vm::VM;

    pub fn run(vm: &mut VM, src: &str) -> Result<Value> {
        let code = compile(src, &CompileOptions::default())?;
        let this = Value::Object(vm.global_object());
        vm.run_script(code, this, Vec::new())
    }

    /// Runs `src` in a fresh VM and converts the completion value to a string.
    pub fn eval_str(src: &str) -> String {
        let mut vm = VM::default();
        let value = run(&mut vm, src).expect("script should complete normally");
        vm.to_string(&value).expect("completion should convert").to_string()
    }

    /// Runs `src`, expecting it to throw, and converts the exception to a string.
    pub fn thrown(src: &str) -> String {
        let mut vm = VM::default();
        match run(&mut vm, src) {
            Err(Error::Thrown(value)) => vm.to_string(&value).expect("exception should convert").to_string(),
            other => panic!("expected a thrown value, got {other:?}"),
        }
    }
}
