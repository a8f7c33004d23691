//! Observable guarantees of the object model and the interpreter.

use spacey_vm::{CompileOptions, Completion, Engine, Value};

fn eval(source: &str) -> String {
    let mut engine = Engine::new();
    let value = engine.eval(source).unwrap();
    engine.to_string(&value).unwrap()
}

#[test]
fn test_round_trip_determinism() {
    let source = "var log = []; var o = { b: 1, a: 2, 10: 3, 2: 4 }; \
                  var coerced = { valueOf() { log.push('valueOf'); return 1; }, toString() { log.push('toString'); return 'x'; } }; \
                  for (var k in o) log.push(k); log.push(coerced + 1); log.push(JSON.stringify(o)); log.join(';')";
    let code = spacey_vm::compile(source, &CompileOptions::default()).unwrap();

    let mut first = Engine::new();
    let mut second = Engine::new();
    let a = first.run(code.clone()).unwrap();
    let b = second.run(code).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.value().to_string(), "2;10;b;a;valueOf;2;{\"2\":4,\"10\":3,\"b\":1,\"a\":2}");
}

#[test]
fn test_property_enumeration_order() {
    let src = "var o = {}; o.b = 1; o.a = 1; o[2] = 1; o[1] = 1; Object.keys(o).join()";
    assert_eq!(eval(src), "1,2,b,a");
    let src = "var o = {}; o.b = 1; o.a = 1; o[2] = 1; o[1] = 1; var r = []; for (var k in o) r.push(k); r.join()";
    assert_eq!(eval(src), "1,2,b,a");
    let src = "var o = { b: 1, a: 1, 2: 1, 1: 1 }; Object.getOwnPropertyNames(o).join()";
    assert_eq!(eval(src), "1,2,b,a");
    // Symbols come last and are skipped by string-keyed enumeration
    let src = "var s = Symbol('s'); var o = { [s]: 1, z: 1, 0: 1 }; Object.keys(o).join() + '|' + Object.getOwnPropertySymbols(o).length";
    assert_eq!(eval(src), "0,z|1");
}

#[test]
fn test_prototype_resolution() {
    let src = "var c = { x: 'from c' }; var b = {}; var a = {}; a.__proto__ = b; b.__proto__ = c; a.x";
    assert_eq!(eval(src), "from c");
    let src = "var c = { x: 1 }; var b = Object.create(c); var a = Object.create(b); a.x = 5; \
               [a.x, c.x, a.hasOwnProperty('x'), b.hasOwnProperty('x')].join()";
    assert_eq!(eval(src), "5,1,true,false");
}

#[test]
fn test_inherited_setter_and_read_only() {
    let src = "var log = []; var proto = { set x(v) { log.push(v); } }; var o = Object.create(proto); o.x = 7; \
               [log[0], o.hasOwnProperty('x')].join()";
    assert_eq!(eval(src), "7,false");
    let src = "var proto = Object.defineProperty({}, 'x', { value: 1, writable: false }); var o = Object.create(proto); \
               o.x = 2; [o.x, o.hasOwnProperty('x')].join()";
    assert_eq!(eval(src), "1,false");
    let src = "'use strict'; var o = Object.freeze({ x: 1 }); try { o.x = 2; 'no error' } catch (e) { e.name }";
    assert_eq!(eval(src), "TypeError");
}

#[test]
fn test_finally_runs_once_before_throw_propagates() {
    let mut engine = Engine::new();
    let completion = engine
        .evaluate("var calls = 0; function sideEffect() { calls++; } try { throw 1; } finally { sideEffect(); }")
        .unwrap();
    assert_eq!(completion, Completion::Thrown(Value::Number(1.0)));
    assert_eq!(engine.get_global("calls").unwrap(), Value::Number(1.0));
}

#[test]
fn test_finally_overrides_return() {
    assert_eq!(eval("function f() { try { return 1; } finally { return 2; } } f()"), "2");
    assert_eq!(eval("function f() { try { throw 1; } finally { return 2; } } f()"), "2");
    let src = "var log = []; function f() { try { return log.push('try'); } finally { log.push('finally'); } } \
               f(); log.join()";
    assert_eq!(eval(src), "try,finally");
    let src = "var log = []; for (var i = 0; i < 2; i++) { try { continue; } finally { log.push(i); } } log.join()";
    assert_eq!(eval(src), "0,1");
}

#[test]
fn test_generator_suspension() {
    let src = "function* g() { yield 1; yield 2; return 3; } var it = g(); \
               var r = [it.next(), it.next(), it.next(), it.next()]; \
               r.map(x => x.value + ':' + x.done).join()";
    assert_eq!(eval(src), "1:false,2:false,3:true,undefined:true");
}

#[test]
fn test_independent_generators() {
    let src = "function* count(from) { while (true) yield from++; } var a = count(0); var b = count(100); \
               [a.next().value, b.next().value, a.next().value, b.next().value].join()";
    assert_eq!(eval(src), "0,100,1,101");
}

#[test]
fn test_coercion_order() {
    let src = "var log = []; var obj = { valueOf() { log.push('valueOf'); return 41; }, toString() { log.push('toString'); return 'str'; } }; \
               var r = obj + 1; [r, log.join('/')].join()";
    assert_eq!(eval(src), "42,valueOf");
    let src = "var log = []; var obj = { valueOf() { log.push('valueOf'); return {}; }, toString() { log.push('toString'); return 'str'; } }; \
               var r = obj + 1; [r, log.join('/')].join()";
    assert_eq!(eval(src), "str1,valueOf/toString");
    let src = "var log = []; function mk(n) { return { valueOf() { log.push(n); return n; } }; } \
               var r = mk('a') + mk('b'); [r, log.join('')].join()";
    assert_eq!(eval(src), "ab,ab");
    let src = "var obj = { [Symbol.toPrimitive](hint) { return hint; } }; [obj + '', `${obj}`, +{ [Symbol.toPrimitive]() { return 3; } }].join()";
    assert_eq!(eval(src), "default,string,3");
}

#[test]
fn test_scope_shadowing() {
    assert_eq!(eval("var x = 1; { let x = 2; } ; x"), "1");
    assert_eq!(eval("var x = 1; function f(){ x = 2; } f(); x"), "2");
    assert_eq!(eval("var x = 1; function f(){ var x = 2; } f(); x"), "1");
    assert_eq!(eval("let x = 'outer'; function f() { let x = 'inner'; return x; } f() + x"), "innerouter");
    assert_eq!(eval("var x = 1; try { throw 2; } catch (x) { x = 3; } x"), "1");
}

#[test]
fn test_destructuring_evaluation_order() {
    let src = "var log = []; var calls = 0; \
               function getObjWithSideEffects() { calls++; return { get b() { log.push('b'); return 2; }, get a() { log.push('a'); return 1; } }; } \
               let { a: x, b: y } = getObjWithSideEffects(); [calls, log.join(''), x, y].join()";
    assert_eq!(eval(src), "1,ab,1,2");
    let src = "var log = []; var { [(log.push('key1'), 'p')]: p = (log.push('default'), 0), q } = \
               { get p() { log.push('get p'); }, get q() { log.push('get q'); return 1; } }; log.join()";
    assert_eq!(eval(src), "key1,get p,default,get q");
}
