//! Tests for the bytecode compiler.

use super::*;
use crate::compiler::bytecode::COMPLETION_THROW;
use crate::parser::Parser;

fn compile_source(src: &str) -> CompileResult<Arc<CompiledFunction>> {
    let program = Parser::new(src).parse_program()?;
    let source = Arc::new(SourceText::new(src, None));
    Compiler::compile_program(&program, RootKind::Script, source)
}

fn compile_ok(src: &str) -> Arc<CompiledFunction> {
    compile_source(src).expect("Compilation should succeed")
}

fn opcodes(function: &CompiledFunction) -> Vec<OpCode> {
    function.bytecode.instructions.iter().map(|i| i.opcode).collect()
}

fn nested(function: &CompiledFunction, index: usize) -> Arc<CompiledFunction> {
    function
        .bytecode
        .constants
        .iter()
        .filter_map(|c| match c {
            Constant::Function(f) => Some(f.clone()),
            _ => None,
        })
        .nth(index)
        .expect("nested function")
}

/// Every function with code must have recorded a stack height.
fn assert_balanced(function: &CompiledFunction) {
    assert!(function.max_stack > 0 || function.bytecode.instructions.len() <= 2);
    for constant in &function.bytecode.constants {
        if let Constant::Function(inner) = constant {
            assert_balanced(inner);
        }
    }
}

#[test]
fn test_compile_empty_program() {
    let function = compile_ok("");
    assert_eq!(function.kind, CodeKind::Script);
    assert_eq!(opcodes(&function).last(), Some(&OpCode::Return));
}

#[test]
fn test_compile_expression_statement_records_completion() {
    let function = compile_ok("1 + 2;");
    let ops = opcodes(&function);
    assert!(ops.contains(&OpCode::Add));
    assert!(ops.contains(&OpCode::InitLocal));
    assert_eq!(function.local_names.first().map(|n| &**n), Some("%completion"));
}

#[test]
fn test_compile_script_globals() {
    let function = compile_ok("var x = 1; let y = 2; const z = 3; function f() {}");
    let ops = opcodes(&function);
    assert!(ops.contains(&OpCode::DeclareVar));
    assert!(ops.contains(&OpCode::DeclareLet));
    assert!(ops.contains(&OpCode::DeclareConst));
    assert!(ops.contains(&OpCode::InitVar));
    assert!(ops.contains(&OpCode::SetGlobal));
    assert!(ops.contains(&OpCode::InitName));
}

#[test]
fn test_compile_function_locals() {
    let function = compile_ok("function f(a, b) { var c = a + b; return c; }");
    let f = nested(&function, 0);
    assert_eq!(f.param_count, 2);
    assert!(f.local_count >= 3);
    assert!(f.function_scope.is_none());
    let ops = opcodes(&f);
    assert!(ops.contains(&OpCode::GetArg));
    assert!(ops.contains(&OpCode::GetLocal));
    assert!(!ops.contains(&OpCode::GetName));
}

#[test]
fn test_compile_closure_capture() {
    let function = compile_ok("function outer() { let n = 0; return function() { return ++n; }; }");
    let outer = nested(&function, 0);
    assert!(outer.function_scope.is_some());
    let inner = nested(&outer, 0);
    assert!(opcodes(&inner).contains(&OpCode::GetScope));
    assert!(inner.captures.iter().any(|c| &**c == "n"));
}

#[test]
fn test_compile_with_uses_dynamic_lookup() {
    let function = compile_ok("function f(o) { var x = 1; with (o) { x; } }");
    let f = nested(&function, 0);
    let ops = opcodes(&f);
    assert!(ops.contains(&OpCode::PushWith));
    assert!(ops.contains(&OpCode::GetName));
    assert!(ops.contains(&OpCode::PopScope));
}

#[test]
fn test_compile_direct_eval() {
    let function = compile_ok("function f() { var x = 1; return eval('x'); }");
    let f = nested(&function, 0);
    assert!(f.has_direct_eval);
    assert!(opcodes(&f).contains(&OpCode::CallEval));
}

#[test]
fn test_compile_try_catch_finally_handlers() {
    let function = compile_ok("try { a(); } catch (e) { b(e); } finally { c(); }");
    let kinds: Vec<HandlerKind> = function.handlers.iter().map(|h| h.kind).collect();
    assert!(kinds.contains(&HandlerKind::Catch));
    assert!(kinds.contains(&HandlerKind::Finally));
    let catch_index = kinds.iter().position(|k| *k == HandlerKind::Catch);
    let finally_index = kinds.iter().position(|k| *k == HandlerKind::Finally);
    assert!(catch_index < finally_index);
    assert!(opcodes(&function).contains(&OpCode::EndFinally));
    assert_eq!(COMPLETION_THROW, 0.0);
}

#[test]
fn test_compile_return_inlines_finally() {
    let function = compile_ok("function f() { try { return 1; } finally { g(); } }");
    let f = nested(&function, 0);
    let calls = opcodes(&f).iter().filter(|op| **op == OpCode::Call).count();
    // One copy for the return, one for normal completion, one for the handler.
    assert_eq!(calls, 3);
    let finally = f.handlers.iter().find(|h| h.kind == HandlerKind::Finally).unwrap();
    let returns: Vec<usize> = opcodes(&f)
        .iter()
        .enumerate()
        .filter(|(_, op)| **op == OpCode::Return)
        .map(|(i, _)| i)
        .collect();
    assert!(returns.iter().all(|&r| r < finally.start as usize || r >= finally.end as usize));
}

#[test]
fn test_compile_for_of_closes_iterator() {
    let function = compile_ok("for (const x of xs) { if (x) break; }");
    let ops = opcodes(&function);
    assert!(ops.contains(&OpCode::GetIterator));
    assert!(ops.contains(&OpCode::ForOfStep));
    assert!(ops.contains(&OpCode::IteratorClose));
    assert!(ops.contains(&OpCode::CloseIteratorAbrupt));
    assert!(function.handlers.iter().any(|h| h.kind == HandlerKind::Finally));
}

#[test]
fn test_compile_labeled_continue() {
    let function = compile_ok("outer: for (var i = 0; i < 3; i++) { for (;;) { continue outer; } }");
    assert!(opcodes(&function).contains(&OpCode::Jump));
}

#[test]
fn test_compile_per_iteration_scope() {
    let function = compile_ok("var fs = []; for (let i = 0; i < 3; i++) { fs.push(() => i); }");
    let ops = opcodes(&function);
    assert!(ops.contains(&OpCode::PushScope));
    assert!(ops.contains(&OpCode::CopyScope));
}

#[test]
fn test_compile_destructuring() {
    let function = compile_ok("let {a: x, b: [y, ...z] = []} = o;");
    let ops = opcodes(&function);
    assert!(ops.contains(&OpCode::RequireObjectCoercible));
    assert!(ops.contains(&OpCode::DestructureStep));
    assert!(ops.contains(&OpCode::DestructureRest));
    assert!(ops.contains(&OpCode::DestructureClose));
    assert!(ops.contains(&OpCode::JumpIfNotUndefined));
}

#[test]
fn test_compile_optional_chain() {
    let function = compile_ok("a?.b.c(); a?.[0] ?? d;");
    let ops = opcodes(&function);
    assert!(ops.contains(&OpCode::OptionalJump));
    assert!(ops.contains(&OpCode::JumpIfNotNullishKeep));
}

#[test]
fn test_compile_generator() {
    let function = compile_ok("function* g() { yield 1; yield* h(); }");
    let g = nested(&function, 0);
    assert!(g.is_generator);
    assert!(!g.is_constructor());
    let ops = opcodes(&g);
    assert!(ops.contains(&OpCode::GeneratorStart));
    assert!(ops.contains(&OpCode::Yield));
    assert!(ops.contains(&OpCode::DelegateStep));
}

#[test]
fn test_compile_arguments_only_when_used() {
    let function = compile_ok("function f() { return 1; } function g() { return arguments.length; }");
    assert!(!opcodes(&nested(&function, 0)).contains(&OpCode::CreateArguments));
    assert!(opcodes(&nested(&function, 1)).contains(&OpCode::CreateArguments));
}

#[test]
fn test_compile_name_inference() {
    let function = compile_ok("var f = function() {}; let o = { m: () => 1 };");
    assert_eq!(nested(&function, 0).name, "f");
    assert_eq!(nested(&function, 1).name, "m");
}

#[test]
fn test_compile_const_assignment_is_error() {
    let err = compile_source("function f() { const x = 1; x = 2; }").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::Syntax);
    assert!(err.message.contains("constant"));
    assert_eq!(err.line, 1);

    let err = compile_source("const x = 1;\nfunction g() { x += 1; }").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::Syntax);
    assert_eq!(err.line, 2);
    compile_ok("const x = 1; with (o) { x = 2; }");
}

#[test]
fn test_compile_tagged_template_sites_are_unique() {
    let function = compile_ok("tag`a${1}b`; tag`a${1}b`;");
    let ids: Vec<u64> = function
        .bytecode
        .constants
        .iter()
        .filter_map(|c| match c {
            Constant::Template(site) => Some(site.id),
            _ => None,
        })
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_compile_source_positions() {
    let function = compile_ok("x;\n\nthrow 1;");
    let throw_at = opcodes(&function).iter().position(|op| *op == OpCode::Throw).unwrap();
    assert_eq!(function.line_col(throw_at).map(|(line, _)| line), Some(3));
}

#[test]
fn test_compile_module_imports_and_exports() {
    let src = "import a, { b as c } from 'm'; export const d = a + c; export * from 'n';";
    let program = Parser::new(src).module().parse_program().unwrap();
    let source = Arc::new(SourceText::new(src, None));
    let function = Compiler::compile_program(&program, RootKind::Module, source).unwrap();
    let ops = opcodes(&function);
    assert!(ops.contains(&OpCode::ImportModule));
    assert!(ops.contains(&OpCode::ImportDefault));
    assert!(ops.contains(&OpCode::CopyDataProperties));
    assert!(function.bytecode.constants.iter().any(|c| matches!(c, Constant::String(s) if *s == "__esModule")));
}

#[test]
fn test_compile_max_stack_is_tracked() {
    let function = compile_ok("f(1, 2, [3, 4], {a: 5});");
    assert!(function.max_stack >= 6);
    assert_balanced(&function);
}

#[test]
fn test_compile_deep_nesting_on_small_thread() {
    let handle = std::thread::Builder::new()
        .stack_size(512 * 1024)
        .spawn(|| {
            let parens = format!("x = {}1{};", "(".repeat(400), ")".repeat(400));
            let arrays = format!("x = {}1{};", "[".repeat(400), "]".repeat(400));
            let chain = format!("x = 1{};", " + 1".repeat(1_200));
            let blocks = format!("{}x = 1;{}", "{".repeat(600), "}".repeat(600));
            [parens, arrays, chain, blocks]
                .iter()
                .all(|source| compile_source(source).is_ok())
        })
        .unwrap();
    assert!(handle.join().unwrap());
}

#[test]
fn test_compile_rejects_runaway_nesting() {
    let error = compile_source(&format!("x = {}1{};", "(".repeat(5_000), ")".repeat(5_000))).unwrap_err();
    assert_eq!(error.kind, CompileErrorKind::Syntax);
}
