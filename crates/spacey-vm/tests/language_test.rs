//! Language semantics, driven through the public engine API.

use spacey_vm::{CompileErrorKind, CompileOptions, Completion, Engine, EngineConfig, Error, Value};

fn eval(source: &str) -> String {
    let mut engine = Engine::new();
    let value = engine.eval(source).unwrap();
    engine.to_string(&value).unwrap()
}

/// Runs `source` and returns `String(exception)`.
fn throws(source: &str) -> String {
    let mut engine = Engine::new();
    match engine.evaluate(source).unwrap() {
        Completion::Thrown(value) => engine.to_string(&value).unwrap(),
        Completion::Normal(value) => panic!("expected an exception, got {value:?}"),
    }
}

fn syntax_error(source: &str) -> String {
    let mut engine = Engine::new();
    match engine.evaluate(source) {
        Err(Error::SyntaxError(error)) => error.message,
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn test_arithmetic() {
    let mut engine = Engine::new();

    assert_eq!(engine.eval("5 + 3;").unwrap().to_string(), "8");
    assert_eq!(engine.eval("10 - 4;").unwrap().to_string(), "6");
    assert_eq!(engine.eval("6 * 7;").unwrap().to_string(), "42");
    assert_eq!(engine.eval("15 / 3;").unwrap().to_string(), "5");
    assert_eq!(engine.eval("17 % 5;").unwrap().to_string(), "2");
    assert_eq!(engine.eval("2 ** 10;").unwrap().to_string(), "1024");
    assert_eq!(engine.eval("0.1 + 0.2;").unwrap().to_string(), "0.30000000000000004");
    assert_eq!(engine.eval("1 / 0;").unwrap().to_string(), "Infinity");
    assert_eq!(engine.eval("-7 >> 1;").unwrap().to_string(), "-4");
    assert_eq!(engine.eval("-7 >>> 28;").unwrap().to_string(), "15");
}

#[test]
fn test_string_concatenation_and_coercion() {
    assert_eq!(eval("'a' + 1 + 2"), "a12");
    assert_eq!(eval("1 + 2 + 'a'"), "3a");
    assert_eq!(eval("'3' * '4'"), "12");
    assert_eq!(eval("[1, 2] + [3]"), "1,23");
    assert_eq!(eval("({}) + ''"), "[object Object]");
    assert_eq!(eval("null + 1"), "1");
    assert_eq!(eval("undefined + 1"), "NaN");
    assert_eq!(eval("true + true"), "2");
}

#[test]
fn test_equality() {
    assert_eq!(eval("[0 == '', null == undefined, null === undefined, NaN == NaN].join()"), "true,true,false,false");
    assert_eq!(eval("['1' == 1, 0 == false, '' == 0, [1] == 1].join()"), "true,true,true,true");
    assert_eq!(eval("var o = {}; [o == o, o === {}, null == 0].join()"), "true,false,false");
}

#[test]
fn test_typeof() {
    assert_eq!(
        eval("[typeof 1, typeof 'a', typeof true, typeof undefined, typeof null, typeof {}, typeof function(){}, typeof Symbol(), typeof 1n].join()"),
        "number,string,boolean,undefined,object,object,function,symbol,bigint"
    );
    assert_eq!(eval("typeof notDeclared"), "undefined");
}

#[test]
fn test_control_flow() {
    assert_eq!(eval("var x; if (false) { x = 1; } else { x = 2; } x"), "2");
    assert_eq!(eval("var sum = 0; for (var i = 1; i <= 5; i++) { sum += i; } sum"), "15");
    assert_eq!(eval("var i = 0; do { i++; } while (i < 3); i"), "3");
    assert_eq!(eval("var n = 0; while (true) { if (++n > 4) break; } n"), "5");
    assert_eq!(
        eval("var s = ''; for (var i = 0; i < 5; i++) { if (i % 2) continue; s += i; } s"),
        "024"
    );
    assert_eq!(
        eval("var r = []; for (var x of ['a', 'b']) r.push(x); for (var k in { p: 1, q: 2 }) r.push(k); r.join()"),
        "a,b,p,q"
    );
}

#[test]
fn test_switch() {
    let src = "function f(x) { var r = ''; switch (x) { case 1: r += 'one'; case 2: r += 'two'; break; default: r += 'other'; } return r; } \
               [f(1), f(2), f(3)].join()";
    assert_eq!(eval(src), "onetwo,two,other");
    assert_eq!(eval("var r; switch ('1') { case 1: r = 'number'; break; case '1': r = 'string'; } r"), "string");
}

#[test]
fn test_labeled_statements() {
    let src = "var hits = 0; outer: for (var i = 0; i < 3; i++) { for (var j = 0; j < 3; j++) { \
               if (j === 1) continue outer; if (i === 2) break outer; hits++; } } hits";
    assert_eq!(eval(src), "2");
    assert_eq!(eval("var x = 0; block: { x = 1; break block; x = 2; } x"), "1");
}

#[test]
fn test_closures_capture_bindings() {
    let src = "function counter() { var n = 0; return function () { return ++n; }; } \
               var c = counter(); c(); c(); c()";
    assert_eq!(eval(src), "3");
    let src = "var fs = []; for (let i = 0; i < 3; i++) fs.push(() => i); fs.map(f => f()).join()";
    assert_eq!(eval(src), "0,1,2");
    let src = "var fs = []; for (var i = 0; i < 3; i++) fs.push(() => i); fs.map(f => f()).join()";
    assert_eq!(eval(src), "3,3,3");
}

#[test]
fn test_hoisting() {
    assert_eq!(eval("var r = f(); function f() { return 'hoisted'; } r"), "hoisted");
    assert_eq!(eval("var r = typeof v; var v = 1; r"), "undefined");
    assert!(throws("x; let x = 1;").starts_with("ReferenceError"));
    assert!(throws("{ f(); let y = 1; function f() { return y; } }").starts_with("ReferenceError"));
}

#[test]
fn test_const() {
    assert_eq!(syntax_error("const a = 1; a = 2;"), "Assignment to constant variable");
    assert_eq!(syntax_error("const a = 1; function g() { a = 2; } 1"), "Assignment to constant variable");
    assert_eq!(syntax_error("const a = 1; a++;"), "Assignment to constant variable");
    assert!(throws("const a = 1; eval('a = 2')").starts_with("TypeError"));
    assert_eq!(eval("const o = { v: 1 }; o.v = 2; o.v"), "2");
    assert_eq!(eval("const a = 1; function g() { let a = 0; a = 2; return a; } g()"), "2");

    // A later script cannot see the declaration statically
    let mut engine = Engine::new();
    engine.eval("const shared = 1;").unwrap();
    let completion = engine.evaluate("shared = 2").unwrap();
    assert!(completion.is_thrown());
    assert_eq!(engine.eval("shared").unwrap(), spacey_vm::Value::Number(1.0));
}

#[test]
fn test_implicit_globals() {
    assert_eq!(eval("function f() { leaked = 5; } f(); leaked"), "5");
    assert!(throws("'use strict'; leaked = 5;").starts_with("ReferenceError"));

    let config = EngineConfig {
        implicit_globals: false,
        ..EngineConfig::default()
    };
    let mut engine = Engine::with_config(config);
    assert!(engine.evaluate("leaked = 5").unwrap().is_thrown());

    let mut engine = Engine::new();
    let strict = CompileOptions {
        strict_mode: true,
        source_url: None,
    };
    assert!(engine.evaluate_with("leaked = 5", &strict).unwrap().is_thrown());
}

#[test]
fn test_this_binding() {
    assert_eq!(eval("var o = { v: 1, read() { return this.v; } }; o.read()"), "1");
    assert_eq!(eval("function f() { return this; } f() === this"), "true");
    assert_eq!(eval("function f() { 'use strict'; return this; } f() === undefined"), "true");
    assert_eq!(eval("var o = { v: 2, f() { return () => this.v; } }; o.f()()"), "2");
}

#[test]
fn test_new_and_prototypes() {
    let src = "function Point(x, y) { this.x = x; this.y = y; } \
               Point.prototype.sum = function () { return this.x + this.y; }; \
               var p = new Point(1, 2); [p.sum(), p instanceof Point, p.constructor === Point].join()";
    assert_eq!(eval(src), "3,true,true");
    assert_eq!(eval("function F() { return { other: 1 }; } new F().other"), "1");
    assert_eq!(eval("function F() { return new.target === F; } [new F() instanceof F, F()].join()"), "true,false");
}

#[test]
fn test_object_literals() {
    let src = "var k = 'dyn'; var x = 1; var o = { x, [k + 1]: 2, get g() { return 3; }, m() { return 4; }, 'quoted': 5 }; \
               [o.x, o.dyn1, o.g, o.m(), o.quoted].join()";
    assert_eq!(eval(src), "1,2,3,4,5");
    assert_eq!(eval("var p = { a: 1 }; var o = { __proto__: p }; o.a"), "1");
    assert_eq!(eval("var o = { a: 1, ...{ b: 2, c: 3 } }; Object.keys(o).join()"), "a,b,c");
    assert_eq!(eval("var o = { set s(v) { this.v = v * 2; } }; o.s = 4; o.v"), "8");
}

#[test]
fn test_spread_and_rest() {
    assert_eq!(eval("function f(a, ...rest) { return rest.length; } f(1, 2, 3)"), "2");
    assert_eq!(eval("Math.max(...[1, 5, 3])"), "5");
    assert_eq!(eval("[0, ...'ab', ...[1, 2]].join()"), "0,a,b,1,2");
    assert_eq!(eval("function f(a, b = a + 1) { return b; } f(1)"), "2");
}

#[test]
fn test_destructuring() {
    assert_eq!(eval("var [a, , b = 5, ...c] = [1, 2, undefined, 4, 6]; [a, b, c].join()"), "1,5,4,6");
    assert_eq!(eval("var { x, y: { z }, ...rest } = { x: 1, y: { z: 2 }, p: 3, q: 4 }; [x, z, Object.keys(rest)].join()"), "1,2,p,q");
    assert_eq!(eval("var a = 1, b = 2; [a, b] = [b, a]; a + ',' + b"), "2,1");
    assert_eq!(eval("function f({ a = 1 } = {}) { return a; } f()"), "1");
    assert!(throws("var { a } = null;").starts_with("TypeError"));
}

#[test]
fn test_optional_chaining_and_nullish() {
    assert_eq!(eval("var o = null; [o?.a, o?.a.b.c, o?.[1], o?.m()].join()"), ",,,");
    assert_eq!(eval("var o = { a: { b: 1 } }; o?.a?.b"), "1");
    assert_eq!(eval("[null ?? 'd', 0 ?? 'd', '' || 'e'].join()"), "d,0,e");
    assert_eq!(eval("var a = null, b = 0, c = 1; a ??= 1; b ||= 2; c &&= 3; [a, b, c].join()"), "1,2,3");
}

#[test]
fn test_template_literals() {
    assert_eq!(eval("var n = 2; `a${n}b${n * 2}`"), "a2b4");
    let src = "function tag(strings, ...values) { return strings.raw.join('|') + values.join('|'); } tag`x${1}\\n${2}`";
    assert_eq!(eval(src), "x|\\n|1|2");
    assert_eq!(eval("function t(s) { return s; } function f() { return t`a`; } f() === f()"), "true");
}

#[test]
fn test_exceptions() {
    assert_eq!(eval("try { throw 1; } catch (e) { e + 1 }"), "2");
    assert_eq!(eval("try { null.x; } catch (e) { e instanceof TypeError }"), "true");
    assert_eq!(eval("try { undefinedName; } catch (e) { e.name }"), "ReferenceError");
    assert_eq!(eval("try { throw 1; } catch { 'no binding' }"), "no binding");
    assert_eq!(throws("throw new RangeError('bad')"), "RangeError: bad");
    assert_eq!(throws("function f() { throw 'deep'; } function g() { f(); } g()"), "deep");
}

#[test]
fn test_runtime_errors_carry_location() {
    let mut engine = Engine::new();
    let options = CompileOptions::with_source_url("app.js");
    let Completion::Thrown(error) = engine.evaluate_with("var a = 1;\nnull.x;", &options).unwrap() else {
        panic!("expected a TypeError");
    };
    let file = engine.vm().get_named(&error, "fileName").unwrap();
    let line = engine.vm().get_named(&error, "lineNumber").unwrap();
    assert_eq!(file.to_string(), "app.js");
    assert_eq!(line.to_string(), "2");
}

#[test]
fn test_syntax_errors() {
    let mut engine = Engine::new();
    let options = CompileOptions::with_source_url("broken.js");
    match engine.evaluate_with("var a = ;", &options) {
        Err(Error::SyntaxError(error)) => {
            assert_eq!(error.kind, CompileErrorKind::Syntax);
            assert_eq!(error.line, 1);
            assert_eq!(error.source_url.as_deref(), Some("broken.js"));
        }
        other => panic!("expected a syntax error, got {other:?}"),
    }
    match engine.evaluate("1 = 2") {
        Err(Error::SyntaxError(error)) => assert_eq!(error.kind, CompileErrorKind::Reference),
        other => panic!("expected an early reference error, got {other:?}"),
    }
    syntax_error("let a; let a;");
    syntax_error("'use strict'; with ({}) {}");
    syntax_error("'use strict'; var x = 010;");
    syntax_error("function f(a, a) { 'use strict'; }");
    assert!(syntax_error("class A {}").contains("Classes"));
}

#[test]
fn test_with_statement() {
    assert_eq!(eval("var o = { a: 1 }; var r; with (o) { r = a; a = 2; } r + ',' + o.a"), "1,2");
    assert_eq!(eval("var a = 'outer'; with ({}) { a = 'set'; } a"), "set");
}

#[test]
fn test_eval() {
    assert_eq!(eval("var x = 1; function f() { var x = 2; return eval('x'); } f()"), "2");
    assert_eq!(eval("var x = 1; function f() { var x = 2; return (0, eval)('x'); } f()"), "1");
    assert_eq!(eval("function f() { eval('var local = 3'); return local; } f()"), "3");
    assert_eq!(eval("eval('1; var y = 2;')"), "1");
    assert_eq!(eval("new Function('a', 'b', 'return a * b')(6, 7)"), "42");
    assert!(throws("eval('var')").starts_with("SyntaxError"));
}

#[test]
fn test_arguments_object() {
    assert_eq!(eval("function f() { return arguments.length + ':' + arguments[1]; } f(1, 2, 3)"), "3:2");
    assert_eq!(eval("function f(a) { a = 2; return arguments[0]; } f(1)"), "1");
}

#[test]
fn test_function_names() {
    assert_eq!(eval("var f = function () {}; f.name"), "f");
    assert_eq!(eval("var o = { m: () => 1 }; o.m.name"), "m");
    assert_eq!(eval("function named(a, b) {} named.name + named.length"), "named2");
}

#[test]
fn test_generators() {
    let src = "function* range(n) { for (let i = 0; i < n; i++) yield i; } [...range(4)].join()";
    assert_eq!(eval(src), "0,1,2,3");
    let src = "function* inner() { yield 1; yield 2; return 'r'; } \
               function* outer() { var r = yield* inner(); yield r; } [...outer()].join()";
    assert_eq!(eval(src), "1,2,r");
    let src = "function* g() { yield 1; } var it = g(); var o = { *m() { yield 'm'; } }; o.m().next().value";
    assert_eq!(eval(src), "m");
    assert!(throws("function* g() { it.next(); yield 1; } var it = g(); it.next()").starts_with("TypeError"));
}

#[test]
fn test_iterator_close_on_break() {
    let src = "var closed = false; var iterable = { [Symbol.iterator]() { var i = 0; return { \
               next() { return { value: i++, done: false }; }, return() { closed = true; return {}; } }; } }; \
               for (var v of iterable) { if (v === 2) break; } closed";
    assert_eq!(eval(src), "true");
    let src = "var closed = false; var iterable = { [Symbol.iterator]() { return { \
               next() { return { value: 1, done: false }; }, return() { closed = true; return {}; } }; } }; \
               var [a] = iterable; closed";
    assert_eq!(eval(src), "true");
}

#[test]
fn test_delete_and_in() {
    assert_eq!(eval("var o = { a: 1 }; delete o.a; 'a' in o"), "false");
    assert_eq!(eval("var a = [1, 2, 3]; delete a[1]; [a.length, 1 in a].join()"), "3,false");
    assert_eq!(eval("'toString' in {}"), "true");
}

#[test]
fn test_comma_void_and_conditional() {
    assert_eq!(eval("(1, 2, 3)"), "3");
    assert_eq!(eval("void 0 === undefined"), "true");
    assert_eq!(eval("var x = 5; x > 3 ? 'big' : 'small'"), "big");
}

#[test]
fn test_bigint_arithmetic() {
    assert_eq!(eval("(2n ** 64n).toString()"), "18446744073709551616");
    assert_eq!(eval("7n / 2n"), "3");
    assert_eq!(eval("[1n < 2, 2n == 2, 2n === 2].join()"), "true,true,false");
    assert!(throws("1n + 1").starts_with("TypeError"));
}

/// Runs `source` on a thread with the default test stack size.
fn on_small_stack(source: &'static str, config: EngineConfig) -> spacey_vm::Result<Completion> {
    std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(move || Engine::with_config(config).evaluate(source))
        .unwrap()
        .join()
        .unwrap()
}

const NATIVE_RECURSION: &[&str] = &[
    "var o = { get x() { return this.x; } }; o.x",
    "var o = { toString: function () { return '' + this; } }; '' + o",
    "function f() { return [1].map(f); } f()",
    "function* g() { yield* g(); } g().next()",
    "var a = []; a.push(a); a.flat(Infinity)",
    "var o = { valueOf: function () { return +this; } }; o * 2",
    "var o = {}; Object.defineProperty(o, 'x', { set: function (v) { this.x = v; } }); o.x = 1",
];

#[test]
fn test_native_recursion_overflows_cleanly() {
    for &source in NATIVE_RECURSION {
        let result = on_small_stack(source, EngineConfig::default());
        assert!(matches!(result, Err(Error::StackOverflow)), "{source}: {result:?}");
    }
}

#[test]
fn test_native_recursion_is_catchable() {
    let config = EngineConfig {
        catchable_stack_overflow: true,
        ..EngineConfig::default()
    };
    for &source in NATIVE_RECURSION {
        let wrapped: &'static str =
            Box::leak(format!("try {{ {source}; 'none' }} catch (e) {{ e instanceof RangeError }}").into_boxed_str());
        match on_small_stack(wrapped, config.clone()) {
            Ok(Completion::Normal(value)) => assert_eq!(value.to_string(), "true", "{source}"),
            other => panic!("{source}: {other:?}"),
        }
    }
}

#[test]
fn test_native_depth_limit_is_configurable() {
    let config = EngineConfig {
        max_native_depth: 1_000,
        ..EngineConfig::default()
    };
    let result = on_small_stack("var o = { get x() { return this.x; } }; o.x", config.clone());
    assert!(matches!(result, Err(Error::StackOverflow)));

    let result = on_small_stack(
        "var n = 0; var o = { get x() { return ++n < 500 ? this.x : n; } }; o.x",
        config,
    );
    assert!(matches!(result, Ok(Completion::Normal(Value::Number(n))) if n == 500.0));
}

#[test]
fn test_deeply_nested_source_is_a_syntax_error() {
    let source = format!("x = {}1{};", "[".repeat(20_000), "]".repeat(20_000));
    assert_eq!(syntax_error(&source), "Maximum nesting depth exceeded");
    let source = format!("{}{}", "{".repeat(20_000), "}".repeat(20_000));
    assert_eq!(syntax_error(&source), "Maximum nesting depth exceeded");
    assert_eq!(eval(&format!("{}1{}", "[".repeat(100), "]".repeat(100) + ".flat(Infinity)[0]")), "1");
}

#[test]
fn test_stack_overflow() {
    let mut engine = Engine::new();
    let result = engine.evaluate("function f() { return f(); } f()");
    assert!(matches!(result, Err(Error::StackOverflow)));

    let config = EngineConfig {
        catchable_stack_overflow: true,
        ..EngineConfig::default()
    };
    let mut engine = Engine::with_config(config);
    let value = engine.eval("function f() { return f(); } try { f(); } catch (e) { e.name }").unwrap();
    assert_eq!(value.to_string(), "RangeError");
}
