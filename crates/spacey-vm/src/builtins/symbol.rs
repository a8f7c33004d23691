//! Symbol built-in object.

use super::{Builder, arg};
use crate::error::{Result, type_error};
use crate::runtime::object::{Attributes, ObjectKind, PropertyKey, PropertySlot};
use crate::runtime::value::{Symbol, Value};
use crate::vm::VM;

pub(super) fn register(builder: &mut Builder<'_>) {
    let prototype = builder.intrinsics.symbol_prototype;
    // `new Symbol()` throws: no construct behaviour.
    let constructor = builder.constructor("Symbol", 0, symbol_call, None, prototype);
    builder.method(constructor, "for", 1, symbol_for);
    builder.method(constructor, "keyFor", 1, key_for);

    let well_known = builder.symbols.clone();
    for (name, symbol) in [
        ("hasInstance", well_known.has_instance),
        ("iterator", well_known.iterator),
        ("toPrimitive", well_known.to_primitive.clone()),
        ("toStringTag", well_known.to_string_tag),
    ] {
        builder.constant(constructor, name, Value::Symbol(symbol));
    }

    builder.method(prototype, "toString", 0, to_string);
    builder.method(prototype, "valueOf", 0, value_of);
    builder.accessor(prototype, PropertyKey::from("description"), description, None);
    let to_primitive = builder.make_native("[Symbol.toPrimitive]", 1, value_of, None);
    builder.define(
        prototype,
        PropertyKey::Symbol(well_known.to_primitive),
        PropertySlot::data(Value::Object(to_primitive), Attributes::CONFIGURABLE),
    );
    builder.to_string_tag(prototype, "Symbol");
}

/// Symbol(description)
fn symbol_call(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let description = match arg(args, 0) {
        Value::Undefined => None,
        value => Some(vm.to_string(&value)?),
    };
    Ok(Value::Symbol(Symbol::new(description)))
}

/// Symbol.for(key): the registry's symbol for `key`, created on first use.
fn symbol_for(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let key = vm.to_string(&arg(args, 0))?;
    let symbol = vm
        .realm
        .symbol_registry
        .entry(key.clone())
        .or_insert_with(|| Symbol::new(Some(key)))
        .clone();
    Ok(Value::Symbol(symbol))
}

/// Symbol.keyFor(symbol)
fn key_for(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let Value::Symbol(symbol) = arg(args, 0) else {
        return type_error(format!("{} is not a symbol", vm.describe(&arg(args, 0))));
    };
    let key = vm
        .realm
        .symbol_registry
        .iter()
        .find(|(_, registered)| **registered == symbol)
        .map(|(key, _)| Value::String(key.clone()));
    Ok(key.unwrap_or_default())
}

/// thisSymbolValue
fn this_symbol(vm: &VM, this: &Value, method: &str) -> Result<Symbol> {
    match this {
        Value::Symbol(symbol) => Ok(symbol.clone()),
        Value::Object(object) => match &vm.heap.object(*object)?.kind {
            ObjectKind::Symbol(symbol) => Ok(symbol.clone()),
            _ => type_error(format!("Symbol.prototype.{method} requires that 'this' be a Symbol")),
        },
        _ => type_error(format!("Symbol.prototype.{method} requires that 'this' be a Symbol")),
    }
}

/// Symbol.prototype.toString()
fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(this_symbol(vm, this, "toString")?.to_string()))
}

/// Symbol.prototype.valueOf() and Symbol.prototype[Symbol.toPrimitive]()
fn value_of(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Symbol(this_symbol(vm, this, "valueOf")?))
}

/// get Symbol.prototype.description
fn description(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let symbol = this_symbol(vm, this, "description")?;
    Ok(symbol.description().cloned().map(Value::String).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_symbols_are_unique() {
        assert_eq!(eval_str("Symbol('a') === Symbol('a')"), "false");
        assert_eq!(eval_str("typeof Symbol() + ',' + Symbol('x').toString() + ',' + Symbol('x').description"), "symbol,Symbol(x),x");
        assert_eq!(eval_str("String(Symbol().description)"), "undefined");
        assert!(thrown("new Symbol()").starts_with("TypeError"));
        assert!(thrown("Symbol() + ''").starts_with("TypeError"));
    }

    #[test]
    fn test_registry() {
        assert_eq!(eval_str("Symbol.for('app') === Symbol.for('app')"), "true");
        assert_eq!(eval_str("Symbol.keyFor(Symbol.for('app'))"), "app");
        assert_eq!(eval_str("String(Symbol.keyFor(Symbol('app')))"), "undefined");
        assert!(thrown("Symbol.keyFor('app')").starts_with("TypeError"));
    }

    #[test]
    fn test_well_known_symbols() {
        assert_eq!(eval_str("typeof Symbol.iterator + ',' + (Symbol.iterator in [])"), "symbol,true");
        let src = "var o = { [Symbol.toPrimitive](hint) { return hint === 'number' ? 42 : 'str'; } }; \
                   (+o) + ',' + `${o}`";
        assert_eq!(eval_str(src), "42,str");
        assert_eq!(eval_str("var o = { [Symbol.toStringTag]: 'Custom' }; Object.prototype.toString.call(o)"), "[object Custom]");
    }

    #[test]
    fn test_symbol_properties_are_hidden_from_keys() {
        assert_eq!(eval_str("var s = Symbol('k'); var o = { a: 1, [s]: 2 }; Object.keys(o).length + ',' + o[s]"), "1,2");
        assert_eq!(eval_str("var s = Symbol('k'); var o = { [s]: 2 }; Object.getOwnPropertySymbols(o)[0] === s"), "true");
    }
}
