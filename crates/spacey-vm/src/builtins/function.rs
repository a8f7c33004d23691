//! Function constructor and `Function.prototype`.

use super::{Builder, arg};
use crate::error::{Result, type_error};
use crate::gc::ObjectRef;
use crate::runtime::function::{BoundFunction, Callable};
use crate::runtime::object::{Attributes, JsObject, ObjectKind, PropertyKey, PropertySlot};
use crate::runtime::string::JsString;
use crate::runtime::value::Value;
use crate::vm::VM;

pub(super) fn register(builder: &mut Builder<'_>) {
    let prototype = builder.intrinsics.function_prototype;
    builder.define(prototype, PropertyKey::from("length"), PropertySlot::data(Value::from(0), Attributes::CONFIGURABLE));
    builder.define(prototype, PropertyKey::from("name"), PropertySlot::data(Value::from(""), Attributes::CONFIGURABLE));
    builder.constructor("Function", 1, function_call, Some(function_construct), prototype);

    builder.method(prototype, "call", 1, call);
    builder.method(prototype, "apply", 2, apply);
    builder.method(prototype, "bind", 1, bind);
    builder.method(prototype, "toString", 0, to_string);
    let has_instance = builder.symbols.has_instance.clone();
    builder.symbol_method(prototype, has_instance, "[Symbol.hasInstance]", 1, has_instance_method);

    // %GeneratorFunction.prototype%
    let generator_function_prototype = builder.intrinsics.generator_function_prototype;
    let generator_prototype = builder.intrinsics.generator_prototype;
    builder.define(
        generator_function_prototype,
        PropertyKey::from("prototype"),
        PropertySlot::data(Value::Object(generator_prototype), Attributes::CONFIGURABLE),
    );
    builder.define(
        generator_prototype,
        PropertyKey::from("constructor"),
        PropertySlot::data(Value::Object(generator_function_prototype), Attributes::CONFIGURABLE),
    );
    builder.to_string_tag(generator_function_prototype, "GeneratorFunction");
}

/// `Function.prototype` itself: accepts anything, returns `undefined`.
pub fn empty(_vm: &mut VM, _this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Undefined)
}

/// Function(p1, ..., body)
fn function_call(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let (body, params) = match args.split_last() {
        Some((body, params)) => (vm.to_rust_string(body)?, params),
        None => (String::new(), &[][..]),
    };
    let mut names = Vec::with_capacity(params.len());
    for param in params {
        names.push(vm.to_rust_string(param)?);
    }
    let source = format!("(function anonymous({}\n) {{\n{body}\n}})", names.join(","));
    vm.eval_indirect(&source)
}

/// new Function(p1, ..., body)
fn function_construct(vm: &mut VM, args: &[Value], _new_target: ObjectRef) -> Result<Value> {
    function_call(vm, &Value::Undefined, args)
}

fn require_callable(vm: &VM, this: &Value, method: &str) -> Result<()> {
    if !vm.is_callable(this) {
        return type_error(format!("Function.prototype.{method} called on {}", vm.describe(this)));
    }
    Ok(())
}

/// Function.prototype.call(thisArg, ...args)
fn call(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    require_callable(vm, this, "call")?;
    let rest = args.get(1..).unwrap_or(&[]);
    vm.call(this, &arg(args, 0), rest)
}

/// Function.prototype.apply(thisArg, argArray)
fn apply(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    require_callable(vm, this, "apply")?;
    let list = arg(args, 1);
    let arguments = match &list {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Object(_) => vm.array_like_to_vec(&list)?,
        other => return type_error(format!("CreateListFromArrayLike called on non-object {}", vm.describe(other))),
    };
    vm.call(this, &arg(args, 0), &arguments)
}

/// Function.prototype.bind(thisArg, ...args)
fn bind(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    require_callable(vm, this, "bind")?;
    let Value::Object(target) = this else {
        return type_error("Bind must be called on a function");
    };
    let bound_args = args.get(1..).unwrap_or(&[]).to_vec();

    let target_length = match vm.get_named(this, "length")? {
        Value::Number(n) if n.is_finite() => (n.trunc() - bound_args.len() as f64).max(0.0),
        Value::Number(n) if n == f64::INFINITY => n,
        _ => 0.0,
    };
    let target_name = match vm.get_named(this, "name")? {
        Value::String(name) => name,
        _ => JsString::empty(),
    };

    let prototype = vm.get_prototype_of(*target)?;
    let mut bound = JsObject::with_kind(
        prototype,
        ObjectKind::Function(Callable::Bound(BoundFunction {
            target: *target,
            this: arg(args, 0),
            args: bound_args,
        })),
    );
    bound.insert(
        PropertyKey::from("length"),
        PropertySlot::data(Value::Number(target_length), Attributes::CONFIGURABLE),
    );
    bound.insert(
        PropertyKey::from("name"),
        PropertySlot::data(Value::String(JsString::from("bound ").concat(&target_name)), Attributes::CONFIGURABLE),
    );
    Ok(Value::Object(vm.alloc(bound)))
}

/// Function.prototype.toString()
fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let Some(object) = this.as_object() else {
        return type_error("Function.prototype.toString requires that 'this' be a Function");
    };
    let text = match &vm.heap.object(object)?.kind {
        ObjectKind::Function(Callable::Script(script)) => script.code.source_text().to_string(),
        ObjectKind::Function(Callable::Native(native)) => format!("function {}() {{ [native code] }}", native.name),
        ObjectKind::Function(Callable::Bound(_)) => "function () { [native code] }".to_string(),
        ObjectKind::Host(host) if host.0.is_callable() => "function () { [native code] }".to_string(),
        _ => return type_error("Function.prototype.toString requires that 'this' be a Function"),
    };
    Ok(Value::from(text))
}

/// Function.prototype[Symbol.hasInstance](v)
fn has_instance_method(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(vm.ordinary_has_instance(this, &arg(args, 0))?))
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_call_and_apply() {
        assert_eq!(eval_str("function f(a, b) { return this.x + a + b; } f.call({ x: 1 }, 2, 3)"), "6");
        assert_eq!(eval_str("function f(a, b) { return this.x + a + b; } f.apply({ x: 1 }, [2, 3])"), "6");
        assert_eq!(eval_str("Math.max.apply(null, [1, 5, 3])"), "5");
        assert!(thrown("Function.prototype.call.call(1)").starts_with("TypeError"));
    }

    #[test]
    fn test_bind() {
        let src = "function f(a, b) { return [this.x, a, b].join(); } \
                   var g = f.bind({ x: 1 }, 2); [g(3), g.name, g.length].join('|')";
        assert_eq!(eval_str(src), "1,2,3|bound f|1");
        let src = "function P(x) { this.x = x; } var B = P.bind(null, 7); var p = new B(); \
                   [p.x, p instanceof P, p instanceof B].join()";
        assert_eq!(eval_str(src), "7,true,true");
    }

    #[test]
    fn test_function_constructor() {
        assert_eq!(eval_str("new Function('a', 'b', 'return a + b')(2, 3)"), "5");
        assert_eq!(eval_str("Function('return this')() === globalThis"), "true");
        assert_eq!(eval_str("var x = 'global'; function f() { var x = 'local'; return Function('return x')(); } f()"), "global");
        assert!(thrown("Function('return +')").starts_with("SyntaxError"));
    }

    #[test]
    fn test_to_string() {
        assert_eq!(eval_str("function add(a, b) { return a + b; } add.toString()"), "function add(a, b) { return a + b; }");
        assert_eq!(eval_str("Math.max.toString()"), "function max() { [native code] }");
    }

    #[test]
    fn test_function_prototype_is_callable() {
        assert_eq!(eval_str("typeof Function.prototype + Function.prototype()"), "functionundefined");
        assert_eq!(eval_str("(function () {}) instanceof Function"), "true");
    }
}
