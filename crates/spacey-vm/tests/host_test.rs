//! Host interfaces: interop objects, modules, console, regex backends,
//! cancellation, garbage collection and shared compiled code.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use spacey_vm::host::{BufferConsole, DefaultRegexEngine, RegexMatch, RegexProgram};
use spacey_vm::{
    CodeCache, CompileOptions, Completion, ConsoleLevel, Engine, EngineConfig, Error, HostObject,
    MemoryModuleLoader, ObserverAction, PropertyKey, RegexEngine, Result, VM, Value,
};

/// A host object with one read-only property, one counter and a free-form
/// property bag.
#[derive(Default)]
struct Settings {
    reads: AtomicU32,
    stored: Mutex<Vec<(String, String)>>,
}

impl HostObject for Settings {
    fn class_name(&self) -> &str {
        "Settings"
    }

    fn get(&self, _vm: &mut VM, key: &PropertyKey) -> Result<Option<Value>> {
        if key.is("version") {
            return Ok(Some(Value::from("1.2.3")));
        }
        if key.is("reads") {
            let reads = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(Some(Value::from(reads)));
        }
        let name = key.to_value().to_string();
        let stored = self.stored.lock();
        Ok(stored.iter().find(|(k, _)| *k == name).map(|(_, v)| Value::from(v.as_str())))
    }

    fn set(&self, vm: &mut VM, key: &PropertyKey, value: Value) -> Result<bool> {
        if key.is("local") {
            return Ok(false);
        }
        let text = vm.to_string(&value)?.to_string();
        self.stored.lock().push((key.to_value().to_string(), text));
        Ok(true)
    }

    fn keys(&self) -> Vec<PropertyKey> {
        vec![PropertyKey::from("version")]
    }
}

/// A callable host object adding its arguments.
struct Adder;

impl HostObject for Adder {
    fn get(&self, _vm: &mut VM, _key: &PropertyKey) -> Result<Option<Value>> {
        Ok(None)
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(&self, vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
        let mut sum = 0.0;
        for arg in args {
            sum += vm.to_number(arg)?;
        }
        Ok(Value::Number(sum))
    }
}

fn eval_in(engine: &mut Engine, source: &str) -> String {
    let value = engine.eval(source).unwrap();
    engine.to_string(&value).unwrap()
}

#[test]
fn test_host_object_properties() {
    let mut engine = Engine::new();
    let settings = Arc::new(Settings::default());
    let wrapper = engine.host_object(settings.clone());
    engine.set_global("settings", wrapper).unwrap();

    assert_eq!(eval_in(&mut engine, "settings.version"), "1.2.3");
    assert_eq!(eval_in(&mut engine, "settings.reads + settings.reads"), "3");
    assert_eq!(eval_in(&mut engine, "settings.theme = 'dark'; settings.theme"), "dark");
    assert_eq!(eval_in(&mut engine, "settings.local = 5; settings.local"), "5");
    assert_eq!(eval_in(&mut engine, "Object.keys(settings).join()"), "local,version");
    assert_eq!(eval_in(&mut engine, "Object.prototype.toString.call(settings)"), "[object Settings]");
    assert_eq!(eval_in(&mut engine, "typeof settings.hasOwnProperty"), "function");
    assert_eq!(settings.stored.lock().as_slice(), &[("theme".to_string(), "dark".to_string())]);
}

#[test]
fn test_callable_host_object() {
    let mut engine = Engine::new();
    let adder = engine.host_object(Arc::new(Adder));
    engine.set_global("add", adder).unwrap();
    assert_eq!(eval_in(&mut engine, "add(1, 2, '3')"), "6");
    assert_eq!(eval_in(&mut engine, "typeof add"), "function");
    assert_eq!(eval_in(&mut engine, "add.call(null, 4, 5)"), "9");
}

#[test]
fn test_require_and_module_syntax() {
    let loader = Arc::new(MemoryModuleLoader::new());
    loader.insert("lib/math.js", "export function double(x) { return x * 2; } export const name = 'math';");
    loader.insert("lib/main.js", "import { double, name } from './math'; export default double(21) + ' from ' + name;");
    loader.insert("counter", "var n = 0; module.exports = { next: function () { return ++n; } };");

    let mut engine = Engine::new();
    assert_eq!(eval_in(&mut engine, "typeof require"), "undefined");
    engine.set_module_loader(loader).unwrap();

    assert_eq!(eval_in(&mut engine, "require('lib/main').default"), "42 from math");
    assert_eq!(eval_in(&mut engine, "require('counter').next(); require('counter').next()"), "2");
    let completion = engine.evaluate("require('nowhere')").unwrap();
    let Completion::Thrown(error) = completion else {
        panic!("a missing module should throw");
    };
    assert!(engine.to_string(&error).unwrap().contains("Cannot find module 'nowhere'"));
}

#[test]
fn test_import_outside_module_is_syntax_error() {
    let mut engine = Engine::new();
    assert!(matches!(engine.evaluate("import a from 'a';"), Err(Error::SyntaxError(_))));
}

#[test]
fn test_console_sink() {
    let console = Arc::new(BufferConsole::new());
    let mut engine = Engine::new();
    engine.set_console(console.clone());
    engine.eval("console.log('a', 1, [2, 3]); console.warn('careful'); console.error(Symbol('s'))").unwrap();
    assert_eq!(
        console.take(),
        vec![
            (ConsoleLevel::Log, "a 1 2,3".to_string()),
            (ConsoleLevel::Warn, "careful".to_string()),
            (ConsoleLevel::Error, "Symbol(s)".to_string()),
        ]
    );
}

/// Matches literal text only, counting compilations.
struct LiteralEngine {
    compiled: AtomicU32,
}

struct LiteralProgram(String);

impl RegexProgram for LiteralProgram {
    fn exec(&self, input: &str, start: usize, sticky: bool) -> Option<RegexMatch> {
        let units: Vec<u16> = input.encode_utf16().collect();
        let needle: Vec<u16> = self.0.encode_utf16().collect();
        let last = units.len().checked_sub(needle.len())?;
        let candidates = if sticky { start..start + 1 } else { start..last + 1 };
        candidates
            .filter(|&at| at <= last)
            .find(|&at| units[at..at + needle.len()] == needle[..])
            .map(|at| RegexMatch {
                start: at,
                end: at + needle.len(),
                captures: Vec::new(),
            })
    }

    fn group_names(&self) -> Vec<Option<String>> {
        Vec::new()
    }
}

impl RegexEngine for LiteralEngine {
    fn compile(&self, pattern: &str, _flags: &str) -> std::result::Result<Arc<dyn RegexProgram>, String> {
        self.compiled.fetch_add(1, Ordering::SeqCst);
        if pattern.contains('(') {
            return Err("groups are not supported".to_string());
        }
        Ok(Arc::new(LiteralProgram(pattern.to_string())))
    }
}

#[test]
fn test_custom_regex_engine() {
    let backend = Arc::new(LiteralEngine {
        compiled: AtomicU32::new(0),
    });
    let mut engine = Engine::new();
    engine.set_regex_engine(backend.clone());
    assert_eq!(eval_in(&mut engine, "'a.b.c'.replace(/./g, '-')"), "a-b-c");
    assert_eq!(eval_in(&mut engine, "/b/.exec('abc').index"), "1");
    assert!(backend.compiled.load(Ordering::SeqCst) >= 2);
    assert!(engine.evaluate("new RegExp('(x)')").unwrap().is_thrown());

    engine.set_regex_engine(Arc::new(DefaultRegexEngine));
    assert_eq!(eval_in(&mut engine, "'a.b.c'.replace(/./g, '-')"), "-----");
}

#[test]
fn test_observer_terminates_runaway_script() {
    let config = EngineConfig {
        instruction_threshold: 1_000,
        ..EngineConfig::default()
    };
    let mut engine = Engine::with_config(config);
    engine.set_observer(|instructions: u64| {
        if instructions > 50_000 {
            ObserverAction::Terminate("budget exhausted".to_string())
        } else {
            ObserverAction::Continue
        }
    });
    let result = engine.evaluate("try { while (true) {} } finally { globalThis.cleanedUp = true; }");
    assert_eq!(result, Err(Error::Terminated("budget exhausted".to_string())));
    assert_eq!(engine.get_global("cleanedUp").unwrap(), Value::Undefined);
}

#[test]
fn test_observer_allows_finite_scripts() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen = calls.clone();
    let config = EngineConfig {
        instruction_threshold: 100,
        ..EngineConfig::default()
    };
    let mut engine = Engine::with_config(config);
    engine.set_observer(move |_: u64| {
        seen.fetch_add(1, Ordering::SeqCst);
        ObserverAction::Continue
    });
    assert_eq!(eval_in(&mut engine, "var s = 0; for (var i = 0; i < 1000; i++) s += i; s"), "499500");
    assert!(calls.load(Ordering::SeqCst) > 0);
}

#[test]
fn test_garbage_collection_keeps_reachable_objects() {
    let mut engine = Engine::new();
    engine
        .eval("var keep = { nested: { value: 'kept' } }; (function () { for (var i = 0; i < 100; i++) ({ i: i }); })();")
        .unwrap();
    let stats = engine.collect_garbage().unwrap();
    assert!(stats.objects_freed >= 100);
    let again = engine.collect_garbage().unwrap();
    assert_eq!(again.objects_freed, 0);
    assert_eq!(again.objects_live, stats.objects_live);
    assert_eq!(eval_in(&mut engine, "keep.nested.value"), "kept");
}

#[test]
fn test_garbage_collection_drops_dead_weak_keys() {
    let mut engine = Engine::new();
    engine
        .eval("var live = {}; var table = new WeakMap(); table.set(live, 'live'); \
               (function () { for (var i = 0; i < 50; i++) table.set({}, { payload: i }); })();")
        .unwrap();
    let stats = engine.collect_garbage().unwrap();
    // Each dead entry frees its key and its value
    assert!(stats.objects_freed >= 100);
    assert_eq!(eval_in(&mut engine, "table.get(live)"), "live");
}

#[test]
fn test_code_shared_across_engines_and_threads() {
    let cache = Arc::new(CodeCache::new());
    let options = CompileOptions::with_source_url("shared.js");
    let source = "var total = 0; for (var i = 1; i <= 10; i++) total += i; total";

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let options = options.clone();
            std::thread::spawn(move || {
                let mut engine = Engine::with_cache(EngineConfig::default(), cache);
                let code = engine.compile(source, &options).unwrap();
                engine.run(code).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Completion::Normal(Value::Number(55.0)));
    }
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_engine_moves_between_threads() {
    let mut engine = Engine::new();
    engine.eval("var state = 'built on one thread'").unwrap();
    let value = std::thread::spawn(move || {
        let value = engine.eval("state + ', run on another'").unwrap();
        engine.to_string(&value).unwrap()
    })
    .join()
    .unwrap();
    assert_eq!(value, "built on one thread, run on another");
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_compilation() {
    use spacey_vm::{CompileJob, ParallelExecutor};

    let jobs: Vec<CompileJob> = (0..16)
        .map(|i| CompileJob::new(format!("job{i}.js"), format!("var x = {i}; x * 2")))
        .collect();
    let executor = ParallelExecutor::new(4).unwrap();
    let compiled = executor.compile_all(&jobs);

    let mut engine = Engine::new();
    for (i, code) in compiled.into_iter().enumerate() {
        let completion = engine.run(code.unwrap()).unwrap();
        assert_eq!(completion, Completion::Normal(Value::Number(i as f64 * 2.0)));
    }
}
