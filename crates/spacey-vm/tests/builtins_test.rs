//! The standard library as scripts see it.

use spacey_vm::{Completion, Engine};

fn eval(source: &str) -> String {
    let mut engine = Engine::new();
    let value = engine.eval(source).unwrap();
    engine.to_string(&value).unwrap()
}

fn throws(source: &str) -> String {
    let mut engine = Engine::new();
    match engine.evaluate(source).unwrap() {
        Completion::Thrown(value) => engine.to_string(&value).unwrap(),
        Completion::Normal(value) => panic!("expected an exception, got {value:?}"),
    }
}

#[test]
fn test_global_functions() {
    assert_eq!(eval("[parseInt('42px'), parseInt('ff', 16), parseFloat('3.5e2x'), isNaN('abc'), isFinite('12')].join()"), "42,255,350,true,true");
    assert_eq!(eval("parseInt === Number.parseInt && parseFloat === Number.parseFloat"), "true");
    assert_eq!(eval("encodeURIComponent('a b&c') + ' ' + decodeURIComponent('%E2%82%AC')"), "a%20b%26c €");
    assert_eq!(eval("typeof globalThis + ',' + (globalThis === this)"), "object,true");
}

#[test]
fn test_object_statics() {
    assert_eq!(eval("var o = { a: 1, b: 2 }; [Object.keys(o), Object.values(o), Object.entries(o)].join('|')"), "a,b|1,2|a,1,b,2");
    assert_eq!(eval("Object.assign({ a: 1 }, { b: 2 }, null, { a: 3 }).a"), "3");
    let src = "var o = {}; Object.defineProperty(o, 'hidden', { value: 1, enumerable: false }); \
               var d = Object.getOwnPropertyDescriptor(o, 'hidden'); [Object.keys(o).length, d.value, d.writable, d.configurable].join()";
    assert_eq!(eval(src), "0,1,false,false");
    assert_eq!(eval("var o = Object.freeze({ a: 1 }); o.a = 2; [o.a, Object.isFrozen(o), Object.isExtensible(o)].join()"), "1,true,false");
    assert_eq!(eval("var o = Object.seal({ a: 1 }); delete o.a; o.b = 1; [o.a, o.b, Object.isSealed(o)].join()"), "1,,true");
    assert_eq!(eval("var p = {}; var o = Object.create(p); Object.getPrototypeOf(o) === p"), "true");
    assert_eq!(eval("var o = Object.setPrototypeOf({}, null); Object.getPrototypeOf(o)"), "null");
    assert_eq!(eval("Object.fromEntries([['a', 1], ['b', 2]]).b"), "2");
    assert_eq!(eval("[Object.is(NaN, NaN), Object.is(0, -0)].join()"), "true,false");
    assert!(throws("Object.defineProperty(Object.freeze({}), 'x', { value: 1 })").starts_with("TypeError"));
}

#[test]
fn test_object_prototype() {
    assert_eq!(eval("Object.prototype.toString.call([])"), "[object Array]");
    assert_eq!(eval("Object.prototype.toString.call(null)"), "[object Null]");
    assert_eq!(eval("({ [Symbol.toStringTag]: 'Custom' }).toString()"), "[object Custom]");
    assert_eq!(eval("({ a: 1 }).propertyIsEnumerable('a') + ',' + Object.prototype.isPrototypeOf.call(Object.prototype, {})"), "true,true");
}

#[test]
fn test_function_prototype() {
    assert_eq!(eval("function f(a, b) { return this.v + a + b; } f.call({ v: 1 }, 2, 3)"), "6");
    assert_eq!(eval("function f(a, b) { return this.v + a + b; } f.apply({ v: 1 }, [2, 3])"), "6");
    let src = "function f(a, b) { return this.v + a + b; } var g = f.bind({ v: 1 }, 2); [g(3), g.name, g.length].join()";
    assert_eq!(eval(src), "6,bound f,1");
    assert_eq!(eval("function P(x) { this.x = x; } var B = P.bind(null, 4); var b = new B(); [b.x, b instanceof P].join()"), "4,true");
    assert!(eval("function f() { return 1; } f.toString()").contains("function"));
}

#[test]
fn test_array_methods() {
    assert_eq!(eval("[3, 1, 2].sort().join()"), "1,2,3");
    assert_eq!(eval("[10, 9, 1].sort().join()"), "1,10,9");
    assert_eq!(eval("[10, 9, 1].sort((a, b) => a - b).join()"), "1,9,10");
    assert_eq!(eval("[1, 2, 3, 4].filter(x => x % 2).map(x => x * 10).reduce((a, b) => a + b)"), "40");
    assert_eq!(eval("var a = [1, 2, 3, 4, 5]; var removed = a.splice(1, 2, 'x'); [a, removed].join('|')"), "1,x,4,5|2,3");
    assert_eq!(eval("[1, [2, [3, [4]]]].flat(Infinity).join()"), "1,2,3,4");
    assert_eq!(eval("[1, 2, 3].includes(2) + ',' + [NaN].includes(NaN) + ',' + [NaN].indexOf(NaN)"), "true,true,-1");
    assert_eq!(eval("Array.from({ length: 3 }, (_, i) => i * i).join()"), "0,1,4");
    assert_eq!(eval("Array.from('abc').reverse().join('')"), "cba");
    assert_eq!(eval("[1, 2, 3].at(-1) + [1, 2, 3].findLast(x => x < 3)"), "5");
    assert_eq!(eval("var a = []; a[5] = 1; a.length"), "6");
    assert_eq!(eval("var a = [1, 2, 3]; a.length = 1; a.join()"), "1");
    assert_eq!(eval("Array.isArray([]) + ',' + Array.isArray({ length: 0 })"), "true,false");
    assert_eq!(eval("var a = [1]; a.push(a); a.join()"), "1,");
    assert!(throws("new Array(-1)").starts_with("RangeError"));
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("'Hello'.toUpperCase() + 'Hello'.toLowerCase()"), "HELLOhello");
    assert_eq!(eval("'  pad  '.trim() + '|' + 'x'.padStart(3, '-') + '|' + 'ab'.repeat(2)"), "pad|--x|abab");
    assert_eq!(eval("'a,b,,c'.split(',').length + ',' + 'abc'.split('').join('-')"), "4,a-b-c");
    assert_eq!(eval("'hello world'.indexOf('o') + ',' + 'hello world'.lastIndexOf('o')"), "4,7");
    assert_eq!(eval("'abcdef'.slice(-3) + 'abcdef'.substring(4, 1) + 'abc'.charAt(1)"), "defbcdb");
    assert_eq!(eval("'😀'.length + ',' + [...'😀'].length + ',' + '😀'.codePointAt(0)"), "2,1,128512");
    assert_eq!(eval("String.fromCharCode(72, 105) + String.fromCodePoint(128512).length"), "Hi2");
    assert_eq!(eval("String.raw`a\\nb${1}`"), "a\\nb1");
    assert_eq!(eval("'abc'.startsWith('ab') && 'abc'.endsWith('bc') && 'abc'.includes('b')"), "true");
}

#[test]
fn test_regexp() {
    assert_eq!(eval("/(\\d+)-(\\d+)/.exec('tel 12-34').slice(1).join()"), "12,34");
    assert_eq!(eval("'a1b22c333'.replace(/\\d+/g, n => '<' + n.length + '>')"), "a<1>b<2>c<3>");
    assert_eq!(eval("'2020-01-02'.replace(/(?<y>\\d+)-(?<m>\\d+)-(?<d>\\d+)/, '$<d>/$<m>/$<y>')"), "02/01/2020");
    assert_eq!(eval("'one two  three'.split(/\\s+/).join('|')"), "one|two|three");
    assert_eq!(eval("var r = /a/g; r.test('aa'); r.lastIndex"), "1");
    assert_eq!(eval("[...'a1b2'.matchAll(/\\d/g)].map(m => m[0] + '@' + m.index).join()"), "1@1,2@3");
    assert_eq!(eval("/x/gimsuy.flags + ' ' + new RegExp('a/b').source"), "gimsuy a\\/b");
    assert_eq!(eval("'aBc'.search(/b/i) + ',' + ('abc'.match(/z/) === null)"), "1,true");
    assert!(throws("new RegExp('(')").starts_with("SyntaxError"));
}

#[test]
fn test_number_formatting() {
    assert_eq!(eval("(255).toString(16) + ',' + (0.5).toString(2) + ',' + (-255).toString(36)"), "ff,0.1,-73");
    assert_eq!(eval("[(1.005).toFixed(2), (1.45).toFixed(1), (1e21).toFixed(2)].join()"), "1.00,1.4,1e+21");
    assert_eq!(eval("[(123.456).toExponential(2), (0.00015).toPrecision(2), (123456).toPrecision(2)].join()"), "1.23e+2,0.00015,1.2e+5");
    assert_eq!(eval("[1e21, 1e-7, 123e-20, -0, 2 ** 53].join()"), "1e+21,1e-7,1.23e-18,0,9007199254740992");
    assert_eq!(eval("[Number.isInteger(5.0), Number.isSafeInteger(2 ** 53), Number.EPSILON > 0].join()"), "true,false,true");
    assert!(throws("(1).toFixed(101)").starts_with("RangeError"));
}

#[test]
fn test_math() {
    assert_eq!(eval("[Math.floor(-1.5), Math.round(-1.5), Math.abs(-2), Math.max(), Math.sign(-3)].join()"), "-2,-1,2,-Infinity,-1");
    assert_eq!(eval("var r = Math.random(); r >= 0 && r < 1"), "true");
}

#[test]
fn test_symbols() {
    assert_eq!(eval("Symbol('d').toString() + ',' + Symbol('d').description"), "Symbol(d),d");
    assert_eq!(eval("Symbol.for('k') === Symbol.for('k') && Symbol.keyFor(Symbol.for('k')) === 'k'"), "true");
    assert_eq!(eval("Symbol('a') === Symbol('a')"), "false");
    assert!(throws("new Symbol()").starts_with("TypeError"));
    assert!(throws("Symbol() + ''").starts_with("TypeError"));
}

#[test]
fn test_bigint() {
    assert_eq!(eval("BigInt(10) * 3n + BigInt('7')"), "37");
    assert_eq!(eval("BigInt.asUintN(8, 257n) + ',' + BigInt.asIntN(8, 255n)"), "1,-1");
    assert_eq!(eval("(255n).toString(16) + ',' + typeof Object(1n)"), "ff,object");
    assert!(throws("BigInt(1.5)").starts_with("RangeError"));
}

#[test]
fn test_json() {
    assert_eq!(eval("JSON.stringify({ a: [1, 'x', null, true], b: undefined, c: () => 1 })"), "{\"a\":[1,\"x\",null,true]}");
    assert_eq!(eval("JSON.stringify({ a: 1, b: [1] }, null, 2)"), "{\n  \"a\": 1,\n  \"b\": [\n    1\n  ]\n}");
    assert_eq!(eval("JSON.stringify({ toJSON() { return 'custom'; } })"), "\"custom\"");
    assert_eq!(eval("JSON.parse('{\"a\":[1,2,{\"b\":null}]}').a[2].b"), "null");
    assert_eq!(eval("JSON.parse('[1,2]', (k, v) => typeof v === 'number' ? v * 2 : v).join()"), "2,4");
    assert_eq!(eval("JSON.stringify('\\u2028\"')"), "\"\u{2028}\\\"\"");
    assert!(throws("JSON.parse('{bad}')").starts_with("SyntaxError"));
    assert!(throws("var o = {}; o.self = o; JSON.stringify(o)").starts_with("TypeError"));
}

#[test]
fn test_errors() {
    assert_eq!(eval("var e = new TypeError('bad'); [e.name, e.message, e instanceof Error, String(e)].join('|')"), "TypeError|bad|true|TypeError: bad");
    assert_eq!(eval("Error('no new') instanceof Error"), "true");
    assert_eq!(eval("new Error('x', { cause: 'why' }).cause"), "why");
    assert_eq!(eval("Object.getPrototypeOf(RangeError) === Error"), "true");
    assert_eq!(eval("var e = new Error(); e.hasOwnProperty('message')"), "false");
}

#[test]
fn test_iterators() {
    assert_eq!(eval("var it = [1, 2].entries(); it.next().value.join()"), "0,1");
    assert_eq!(eval("var m = { *[Symbol.iterator]() { yield 'a'; yield 'b'; } }; [...m].join()"), "a,b");
    let src = "function* g() {} Object.getPrototypeOf(g.prototype) === Object.getPrototypeOf(g()).__proto__";
    assert_eq!(eval(src), "true");
}

#[test]
fn test_wrappers() {
    assert_eq!(eval("typeof new Number(1) + ',' + typeof Number('1') + ',' + (new Boolean(false) ? 'truthy' : 'falsy')"), "object,number,truthy");
    assert_eq!(eval("new String('ab').length + ',' + Object('ab')[1]"), "2,b");
    assert_eq!(eval("(5).constructor === Number && 'x'.constructor === String"), "true");
}

#[test]
fn test_keyed_collections() {
    let src = "var m = new Map(); var key = {}; m.set(key, 'object').set('key', 'string'); \
               [m.get(key), m.get('key'), m.size, [...m.keys()].length].join()";
    assert_eq!(eval(src), "object,string,2,2");
    assert_eq!(eval("var s = new Set([3, 1, 3, 2]); Array.from(s).join()"), "3,1,2");
    assert_eq!(eval("var w = new WeakMap(); var k = {}; w.set(k, 5); w.get(k) + w.has({})"), "5");
    assert!(throws("new WeakSet().add(1)").starts_with("TypeError"));
}

#[test]
fn test_reflect() {
    assert_eq!(eval("Reflect.ownKeys({ a: 1, [Symbol.iterator]: 2 }).length"), "2");
    assert_eq!(eval("var o = Object.preventExtensions({}); Reflect.set(o, 'x', 1) + ',' + Reflect.has(o, 'x')"), "false,false");
    assert_eq!(eval("Reflect.construct(Date, [0]).getTime()"), "0");
}

#[test]
fn test_dates() {
    assert_eq!(eval("new Date(Date.UTC(1999, 11, 31, 23, 59, 59)).toISOString()"), "1999-12-31T23:59:59.000Z");
    assert_eq!(eval("JSON.stringify(new Date(86400000))"), "\"1970-01-02T00:00:00.000Z\"");
    assert_eq!(eval("new Date(2000, 0, 1) < new Date(2000, 0, 2)"), "true");
    assert_eq!(eval("new Date('garbage').getTime()"), "NaN");
}
