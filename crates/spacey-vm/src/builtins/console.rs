//! The `console` namespace. Output goes to the VM's
//! [`ConsoleSink`](crate::host::ConsoleSink).

use super::Builder;
use crate::error::Result;
use crate::host::ConsoleLevel;
use crate::runtime::value::Value;
use crate::vm::VM;

pub(super) fn register(builder: &mut Builder<'_>) {
    let console = builder.namespace("console");
    builder.method(console, "log", 0, log);
    builder.method(console, "info", 0, info);
    builder.method(console, "warn", 0, warn);
    builder.method(console, "error", 0, error);
    builder.method(console, "debug", 0, debug);
}

/// Joins the arguments with spaces.
fn format_args(vm: &mut VM, args: &[Value]) -> Result<String> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        match value {
            Value::Symbol(symbol) => parts.push(symbol.to_string()),
            other => parts.push(vm.to_string(other)?.to_string()),
        }
    }
    Ok(parts.join(" "))
}

fn write(vm: &mut VM, level: ConsoleLevel, args: &[Value]) -> Result<Value> {
    let message = format_args(vm, args)?;
    vm.console.write(level, &message);
    Ok(Value::Undefined)
}

/// console.log(...args)
fn log(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    write(vm, ConsoleLevel::Log, args)
}

/// console.info(...args)
fn info(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    write(vm, ConsoleLevel::Info, args)
}

/// console.warn(...args)
fn warn(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    write(vm, ConsoleLevel::Warn, args)
}

/// console.error(...args)
fn error(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    write(vm, ConsoleLevel::Error, args)
}

/// console.debug(...args)
fn debug(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    write(vm, ConsoleLevel::Debug, args)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::builtins::testing::run;
    use crate::host::{BufferConsole, ConsoleLevel};
    use crate::vm::VM;

    #[test]
    fn test_output_reaches_sink() {
        let sink = Arc::new(BufferConsole::new());
        let mut vm = VM::default();
        vm.set_console(sink.clone());
        run(&mut vm, "console.log('a', 1, null, [1, 2]); console.warn(Symbol('s'))").unwrap();
        assert_eq!(
            sink.take(),
            vec![
                (ConsoleLevel::Log, "a 1 null 1,2".to_string()),
                (ConsoleLevel::Warn, "Symbol(s)".to_string()),
            ]
        );
    }

    #[test]
    fn test_console_returns_undefined() {
        let mut vm = VM::default();
        vm.set_console(Arc::new(BufferConsole::new()));
        let value = run(&mut vm, "console.error('x')").unwrap();
        assert!(value.is_undefined());
    }
}
