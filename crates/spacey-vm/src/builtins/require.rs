//! `require(specifier)`, installed by [`VM::set_module_loader`].
//!
//! The global `require` resolves bare and absolute specifiers; each module
//! receives a copy bound to its own id, so relative specifiers resolve
//! against the requiring module.

use super::arg;
use crate::error::Result;
use crate::runtime::string::JsString;
use crate::runtime::value::Value;
use crate::vm::VM;

/// require(specifier). `this` is the id of the requiring module, if any.
pub fn require(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let specifier = vm.to_rust_string(&arg(args, 0))?;
    let referrer = this.as_string().map(JsString::to_std_string_lossy);
    vm.require_module(&specifier, referrer.as_deref())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::builtins::testing::run;
    use crate::error::Error;
    use crate::host::MemoryModuleLoader;
    use crate::vm::VM;

    fn vm_with_modules(modules: &[(&str, &str)]) -> VM {
        let loader = MemoryModuleLoader::new();
        for (id, source) in modules {
            loader.insert(*id, *source);
        }
        let mut vm = VM::default();
        vm.set_module_loader(Arc::new(loader)).unwrap();
        vm
    }

    fn eval(vm: &mut VM, src: &str) -> String {
        let value = run(vm, src).unwrap();
        vm.to_string(&value).unwrap().to_string()
    }

    #[test]
    fn test_require_exports() {
        let mut vm = vm_with_modules(&[("math", "exports.double = function (x) { return x * 2; };")]);
        assert_eq!(eval(&mut vm, "require('math').double(21)"), "42");
    }

    #[test]
    fn test_module_exports_replacement_and_caching() {
        let mut vm = vm_with_modules(&[(
            "counter",
            "var n = 0; module.exports = function () { return ++n; };",
        )]);
        assert_eq!(eval(&mut vm, "require('counter')(); require('counter')()"), "2");
        assert_eq!(eval(&mut vm, "require('counter') === require('counter')"), "true");
    }

    #[test]
    fn test_relative_specifiers_resolve_against_the_requiring_module() {
        let mut vm = vm_with_modules(&[
            ("lib/index.js", "module.exports = require('./util').name;"),
            ("lib/util.js", "exports.name = 'util@' + module.id;"),
        ]);
        assert_eq!(eval(&mut vm, "require('lib/index')"), "util@lib/util.js");
    }

    #[test]
    fn test_missing_module_throws() {
        let mut vm = vm_with_modules(&[]);
        match run(&mut vm, "require('nope')") {
            Err(Error::Thrown(value)) => {
                let message = vm.to_string(&value).unwrap();
                assert_eq!(message, "TypeError: Cannot find module 'nope'");
            }
            other => panic!("expected a TypeError, got {other:?}"),
        }
    }

    #[test]
    fn test_cyclic_requires_see_partial_exports() {
        let mut vm = vm_with_modules(&[
            ("a", "exports.early = 1; var b = require('b'); exports.fromB = b.sawA;"),
            ("b", "exports.sawA = require('a').early;"),
        ]);
        assert_eq!(eval(&mut vm, "require('a').fromB"), "1");
    }
}
