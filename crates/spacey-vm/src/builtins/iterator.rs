//! Iterator prototypes: `%IteratorPrototype%`, the array and string
//! iterators, and `%GeneratorPrototype%`.

use super::{Builder, arg};
use crate::error::{Result, type_error};
use crate::gc::ObjectRef;
use crate::runtime::function::ResumeMode;
use crate::runtime::object::{IterationKind, ListIterator, ObjectKind, PropertyKey};
use crate::runtime::value::Value;
use crate::vm::VM;

pub(super) fn register(builder: &mut Builder<'_>) {
    let iterator_prototype = builder.intrinsics.iterator_prototype;
    let iterator = builder.symbols.iterator.clone();
    builder.symbol_method(iterator_prototype, iterator, "[Symbol.iterator]", 0, return_this);

    let array_iterator = builder.intrinsics.array_iterator_prototype;
    builder.method(array_iterator, "next", 0, array_iterator_next);
    builder.to_string_tag(array_iterator, "Array Iterator");

    let string_iterator = builder.intrinsics.string_iterator_prototype;
    builder.method(string_iterator, "next", 0, string_iterator_next);
    builder.to_string_tag(string_iterator, "String Iterator");

    let generator = builder.intrinsics.generator_prototype;
    builder.method(generator, "next", 1, generator_next);
    builder.method(generator, "return", 1, generator_return);
    builder.method(generator, "throw", 1, generator_throw);
    builder.to_string_tag(generator, "Generator");
}

/// %IteratorPrototype%[Symbol.iterator]()
fn return_this(_vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(this.clone())
}

fn iterator_state(vm: &VM, this: &Value, name: &str) -> Result<(ObjectRef, ListIterator)> {
    if let Some(object) = this.as_object()
        && let ObjectKind::Iterator(state) = &vm.heap.object(object)?.kind
    {
        return Ok((object, state.clone()));
    }
    type_error(format!("{name}.prototype.next called on incompatible receiver {}", vm.describe(this)))
}

fn store_state(vm: &mut VM, object: ObjectRef, state: ListIterator) -> Result<()> {
    vm.heap.object_mut(object)?.kind = ObjectKind::Iterator(state);
    Ok(())
}

/// %ArrayIteratorPrototype%.next(). The length is read on every step, so
/// elements pushed during iteration are visited.
fn array_iterator_next(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (object, state) = iterator_state(vm, this, "Array Iterator")?;
    let ListIterator::Array { target: Some(target), index, kind } = state else {
        return Ok(vm.iter_result(Value::Undefined, true));
    };
    let target_object = vm.to_object(&target)?;
    let length = vm.length_of_array_like(target_object)?;
    if u64::from(index) >= length {
        store_state(vm, object, ListIterator::Array { target: None, index, kind })?;
        return Ok(vm.iter_result(Value::Undefined, true));
    }
    store_state(
        vm,
        object,
        ListIterator::Array {
            target: Some(target.clone()),
            index: index + 1,
            kind,
        },
    )?;
    let value = match kind {
        IterationKind::Keys => Value::from(index),
        IterationKind::Values => vm.get(target_object, &PropertyKey::Index(index), &target)?,
        IterationKind::Entries => {
            let element = vm.get(target_object, &PropertyKey::Index(index), &target)?;
            Value::Object(vm.new_array(vec![Value::from(index), element]))
        }
    };
    Ok(vm.iter_result(value, false))
}

/// %StringIteratorPrototype%.next(): one code point per step.
fn string_iterator_next(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (object, state) = iterator_state(vm, this, "String Iterator")?;
    let ListIterator::String { string, position } = state else {
        return Ok(vm.iter_result(Value::Undefined, true));
    };
    let Some(code_point) = string.code_point_at(position) else {
        return Ok(vm.iter_result(Value::Undefined, true));
    };
    let width = if code_point > 0xFFFF { 2 } else { 1 };
    let value = Value::String(string.slice(position, position + width));
    store_state(vm, object, ListIterator::String { string, position: position + width })?;
    Ok(vm.iter_result(value, false))
}

/// %GeneratorPrototype%.next(value)
fn generator_next(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    vm.generator_resume(this, ResumeMode::Next, arg(args, 0))
}

/// %GeneratorPrototype%.return(value)
fn generator_return(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    vm.generator_resume(this, ResumeMode::Return, arg(args, 0))
}

/// %GeneratorPrototype%.throw(exception)
fn generator_throw(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    vm.generator_resume(this, ResumeMode::Throw, arg(args, 0))
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_string_iterator_yields_lone_surrogates() {
        assert_eq!(eval_str("var out = []; for (var c of 'a\\ud800\\u{1F600}') out.push(c.length); out.join()"), "1,1,2");
    }

    #[test]
    fn test_array_iterator_protocol() {
        let src = "var it = [1, 2][Symbol.iterator](); var a = it.next(), b = it.next(), c = it.next(); \
                   [a.value, a.done, b.value, c.value, c.done].join()";
        assert_eq!(eval_str(src), "1,false,2,,true");
        assert_eq!(eval_str("var it = [].values(); it[Symbol.iterator]() === it"), "true");
        assert_eq!(eval_str("Object.prototype.toString.call([].keys())"), "[object Array Iterator]");
    }

    #[test]
    fn test_array_iterator_sees_growth() {
        let src = "var a = [1]; var n = 0; for (var x of a) { if (a.length < 3) a.push(x + 1); n += x; } n";
        assert_eq!(eval_str(src), "6");
    }

    #[test]
    fn test_exhausted_iterator_stays_done() {
        let src = "var a = [1]; var it = a.values(); it.next(); it.next(); a.push(2); it.next().done";
        assert_eq!(eval_str(src), "true");
    }

    #[test]
    fn test_string_iterator() {
        let src = "var it = 'a😀'[Symbol.iterator](); [it.next().value, it.next().value.length, it.next().done].join()";
        assert_eq!(eval_str(src), "a,2,true");
        assert_eq!(eval_str("Object.prototype.toString.call(''[Symbol.iterator]())"), "[object String Iterator]");
    }

    #[test]
    fn test_generator_methods() {
        let src = "function* g() { var x = yield 1; yield x * 2; } var it = g(); \
                   [it.next().value, it.next(5).value, it.next().done].join()";
        assert_eq!(eval_str(src), "1,10,true");
        let src = "function* g() { try { yield 1; } finally { log.push('cleanup'); } } var log = []; \
                   var it = g(); it.next(); var r = it.return(9); [r.value, r.done, log[0]].join()";
        assert_eq!(eval_str(src), "9,true,cleanup");
        let src = "function* g() { try { yield 1; } catch (e) { yield 'caught ' + e; } } \
                   var it = g(); it.next(); it.throw('boom').value";
        assert_eq!(eval_str(src), "caught boom");
        assert_eq!(thrown("function* g() {} g().throw(new Error('x'))"), "Error: x");
        assert!(thrown("var next = (function* () {})().next; next.call({})").starts_with("TypeError"));
    }
}
