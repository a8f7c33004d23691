//! Code generation from AST to bytecode.
//!
//! This module contains the `Compiler` which transforms parsed JavaScript AST
//! into executable bytecode for the VM. Each function literal is compiled
//! into its own [`CompiledFunction`], stored in the constant pool of the
//! enclosing function.
//!
//! The compiler tracks the operand stack height of every instruction it
//! emits, so exception handlers can record the height to restore.
//! `finally` blocks are duplicated at every `break`, `continue` and `return`
//! leaving them; the exception path enters a single copy registered as a
//! `Finally` handler.

mod expressions;
mod patterns;
mod scope;
mod statements;

#[cfg(test)]
mod tests;

pub use scope::{RootKind, ScopeAnalysis};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::ast::*;
use crate::compiler::bytecode::{
    Bytecode, CodeKind, CompiledFunction, Constant, ExceptionHandler, HandlerKind, Instruction,
    OpCode, Operand, SourceText,
};
use crate::error::{CompileError, CompileErrorKind};
use crate::lexer::Span;
use crate::runtime::string::JsString;

use scope::{BindingKind, Resolution, ScopeId, ScopeKind, Storage};

/// Result alias for code generation.
pub type CompileResult<T> = Result<T, CompileError>;

static NEXT_TEMPLATE_SITE: AtomicU64 = AtomicU64::new(1);

/// How a store to a binding behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StoreMode {
    /// An assignment: checks the temporal dead zone and constness, keeps the value
    Assign,
    /// Initialization of a declaration, pops the value
    Init,
}

/// Instruction ranges covered by a handler, split around inlined `finally` code.
#[derive(Debug, Default)]
pub(super) struct RangeSet {
    ranges: Vec<(u32, u32)>,
    open: Option<u32>,
}

impl RangeSet {
    fn opened(at: u32) -> Self {
        Self {
            ranges: Vec::new(),
            open: Some(at),
        }
    }

    fn close(&mut self, at: u32) -> bool {
        match self.open.take() {
            Some(start) => {
                if at > start {
                    self.ranges.push((start, at));
                }
                true
            }
            None => false,
        }
    }

    fn reopen(&mut self, at: u32) {
        self.open = Some(at);
    }
}

pub(super) struct TryControl<'a> {
    catch: Option<RangeSet>,
    finally: Option<(RangeSet, &'a BlockStatement)>,
    scope: ScopeId,
    scope_depth: u32,
    stack_depth: i32,
}

pub(super) enum ControlKind<'a> {
    /// while, do-while and for loops
    Loop,
    /// Holds the key iterator
    ForIn,
    /// Holds the iterator and its `next` method
    ForOf(RangeSet),
    /// Holds the discriminant
    Switch,
    /// A labeled statement that is not a loop
    Labeled,
    /// A scope pushed at run time
    Scope,
    Try(TryControl<'a>),
    /// Code of a `finally` block with values of a pending completion below it
    FinallyBody { items: u32 },
}

pub(super) struct Control<'a> {
    kind: ControlKind<'a>,
    labels: Vec<String>,
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

impl Control<'_> {
    fn is_loop(&self) -> bool {
        matches!(
            self.kind,
            ControlKind::Loop | ControlKind::ForIn | ControlKind::ForOf(_)
        )
    }
}

/// Per-function code generation state.
struct FunctionState<'a> {
    bytecode: Bytecode,
    kind: CodeKind,
    strict: bool,
    is_generator: bool,
    root: ScopeId,
    scope: ScopeId,
    scope_depth: u32,
    depth: i32,
    max_depth: i32,
    handlers: Vec<ExceptionHandler>,
    positions: Vec<(u32, u32)>,
    controls: Vec<Control<'a>>,
    pending_labels: Vec<String>,
    completion: Option<u32>,
    /// Base stack height and pending short-circuit jumps of open optional chains
    chains: Vec<(i32, Vec<usize>)>,
    local_count: u32,
    local_names: Vec<Arc<str>>,
    strings: FxHashMap<JsString, u32>,
}

impl<'a> FunctionState<'a> {
    fn new(kind: CodeKind, strict: bool, root: ScopeId, analysis: &ScopeAnalysis) -> Self {
        let info = analysis.scope(root);
        Self {
            bytecode: Bytecode::new(),
            kind,
            strict,
            is_generator: false,
            root,
            scope: root,
            scope_depth: 0,
            depth: 0,
            max_depth: 0,
            handlers: Vec::new(),
            positions: Vec::new(),
            controls: Vec::new(),
            pending_labels: Vec::new(),
            completion: None,
            chains: Vec::new(),
            local_count: info.local_count,
            local_names: info.local_names.clone(),
            strings: FxHashMap::default(),
        }
    }
}

/// Compiles AST to bytecode.
pub struct Compiler<'a> {
    analysis: ScopeAnalysis,
    source: Arc<SourceText>,
    state: FunctionState<'a>,
}

impl<'a> Compiler<'a> {
    /// Compiles a whole program into the function that runs it.
    pub fn compile_program(
        program: &'a Program,
        root_kind: RootKind,
        source: Arc<SourceText>,
    ) -> CompileResult<Arc<CompiledFunction>> {
        let analysis = ScopeAnalysis::analyze(program, root_kind);
        let root = analysis.scope_of(program.id).unwrap_or(0);
        let kind = match root_kind {
            RootKind::Script => CodeKind::Script,
            RootKind::Eval => CodeKind::Eval,
            RootKind::Module => CodeKind::Module,
        };
        let state = FunctionState::new(kind, program.strict, root, &analysis);
        let mut compiler = Compiler {
            analysis,
            source,
            state,
        };
        compiler.compile_root(program, root_kind)?;
        let span = (0, compiler.source.text.len() as u32);
        let function = compiler.finish_function(JsString::empty(), 0, span);
        tracing::debug!(
            kind = ?root_kind,
            instructions = function.bytecode.instructions.len(),
            locals = function.local_count,
            "compiled program"
        );
        Ok(Arc::new(function))
    }

    // ========================================================================
    // Roots and functions
    // ========================================================================

    fn compile_root(&mut self, program: &'a Program, root_kind: RootKind) -> CompileResult<()> {
        let root = self.state.root;
        if root_kind != RootKind::Module {
            let slot = self.alloc_local("%completion");
            self.state.completion = Some(slot);
        }
        let info = self.analysis.scope(root);
        let root_lexicals = info.root_lexicals.clone();
        let root_vars = info.root_vars.clone();
        for (name, is_const) in &root_lexicals {
            let index = self.name_constant(name);
            let opcode = if *is_const { OpCode::DeclareConst } else { OpCode::DeclareLet };
            self.emit_with(opcode, Operand::Name(index));
        }
        for name in &root_vars {
            let index = self.name_constant(name);
            self.emit_with(OpCode::DeclareVar, Operand::Name(index));
        }
        if root_kind == RootKind::Module {
            for (index, name) in ["exports", "require", "module"].iter().enumerate() {
                self.emit_with(OpCode::GetArg, Operand::ArgCount(index as u32));
                self.store_name(name, StoreMode::Init, Span::default())?;
            }
        }
        self.clear_lexicals(root);
        if root_kind == RootKind::Module {
            self.compile_imports(&program.body)?;
        }
        self.instantiate_functions(&program.body, true)?;
        if root_kind == RootKind::Module {
            self.compile_hoisted_exports(&program.body)?;
        }
        for statement in &program.body {
            self.compile_statement(statement)?;
        }
        match self.state.completion {
            Some(slot) => self.emit_with(OpCode::GetLocal, Operand::Local(slot)),
            None => self.emit_op(OpCode::Undefined),
        };
        self.emit_op(OpCode::Return);
        Ok(())
    }

    /// Compiles a nested function literal and returns its constant index.
    pub(super) fn compile_function(
        &mut self,
        function: &'a FunctionLiteral,
        name_hint: Option<&str>,
    ) -> CompileResult<u32> {
        let root = self
            .analysis
            .scope_of(function.id)
            .ok_or_else(|| self.error(function.span, "Function scope missing"))?;
        let kind = match function.kind {
            FunctionKind::Normal => CodeKind::Normal,
            FunctionKind::Arrow => CodeKind::Arrow,
            FunctionKind::Method => CodeKind::Method,
            FunctionKind::Getter => CodeKind::Getter,
            FunctionKind::Setter => CodeKind::Setter,
        };
        let mut state = FunctionState::new(kind, function.strict, root, &self.analysis);
        state.is_generator = function.is_generator;
        let saved = std::mem::replace(&mut self.state, state);
        let result = self.compile_function_body(function);
        let name = match (&function.name, name_hint) {
            (Some(name), _) => JsString::from(name.name.as_str()),
            (None, Some(hint)) => JsString::from(hint),
            (None, None) => JsString::empty(),
        };
        let span = (function.span.start as u32, function.span.end as u32);
        let compiled = self.finish_function(name, function.expected_arguments(), span);
        self.state = saved;
        result?;
        tracing::debug!(
            name = %compiled.name,
            instructions = compiled.bytecode.instructions.len(),
            locals = compiled.local_count,
            "compiled function"
        );
        Ok(self.add_constant(Constant::Function(Arc::new(compiled))))
    }

    fn compile_function_body(&mut self, function: &'a FunctionLiteral) -> CompileResult<()> {
        let root = self.state.root;
        self.mark(function.span.start);
        let bindings: Vec<(String, BindingKind)> = self
            .analysis
            .scope(root)
            .bindings
            .iter()
            .map(|b| (b.name.clone(), b.kind))
            .collect();
        for (name, kind) in &bindings {
            match kind {
                BindingKind::Arguments => {
                    self.emit_op(OpCode::CreateArguments);
                    self.store_name(name, StoreMode::Init, function.span)?;
                }
                BindingKind::Callee => {
                    self.emit_op(OpCode::Callee);
                    self.store_name(name, StoreMode::Init, function.span)?;
                }
                _ => {}
            }
        }
        self.clear_lexicals(root);
        for (index, param) in function.params.iter().enumerate() {
            self.emit_with(OpCode::GetArg, Operand::ArgCount(index as u32));
            self.bind_pattern(param, StoreMode::Init)?;
        }
        if let Some(rest) = &function.rest {
            self.emit_with(OpCode::RestArgs, Operand::ArgCount(function.params.len() as u32));
            self.bind_pattern(rest, StoreMode::Init)?;
        }
        self.instantiate_functions(&function.body, true)?;
        if function.is_generator {
            self.emit_op(OpCode::GeneratorStart);
        }
        for statement in &function.body {
            self.compile_statement(statement)?;
        }
        self.emit_op(OpCode::Undefined);
        self.emit_op(OpCode::Return);
        Ok(())
    }

    fn finish_function(&mut self, name: JsString, param_count: u32, span: (u32, u32)) -> CompiledFunction {
        let root = self.state.root;
        let info = self.analysis.scope(root);
        let function_scope = if info.materialized { info.template.clone() } else { None };
        let captures = info.captures.clone();
        let has_direct_eval = info.contains_eval;
        let state = &mut self.state;
        CompiledFunction {
            name,
            kind: state.kind,
            is_generator: state.is_generator,
            strict: state.strict,
            param_count,
            bytecode: std::mem::take(&mut state.bytecode),
            local_count: state.local_count,
            local_names: std::mem::take(&mut state.local_names),
            max_stack: state.max_depth.max(0) as u32,
            handlers: std::mem::take(&mut state.handlers),
            positions: std::mem::take(&mut state.positions),
            captures,
            function_scope,
            has_direct_eval,
            source: self.source.clone(),
            span,
        }
    }

    /// Creates closures for the function declarations of a statement list.
    pub(super) fn instantiate_functions(&mut self, statements: &'a [Statement], top_level: bool) -> CompileResult<()> {
        for statement in statements {
            let function = if top_level {
                scope::top_level_function(statement)
            } else {
                match statement {
                    Statement::FunctionDeclaration(function) => Some(function.as_ref()),
                    _ => None,
                }
            };
            let Some(function) = function else { continue };
            let Some(name) = &function.name else { continue };
            let index = self.compile_function(function, None)?;
            self.emit_with(OpCode::Closure, Operand::Constant(index));
            let root_var = top_level
                && matches!(self.analysis.scope(self.state.root).kind, ScopeKind::Script | ScopeKind::Eval)
                && self.analysis.scope(self.state.root).root_vars.contains(&name.name);
            if root_var {
                let index = self.name_constant(&name.name);
                self.emit_with(OpCode::InitVar, Operand::Name(index));
            } else {
                self.store_name(&name.name, StoreMode::Init, name.span)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Emission
    // ========================================================================

    pub(super) fn ip(&self) -> u32 {
        self.state.bytecode.instructions.len() as u32
    }

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.state.depth += instruction.stack_effect();
        self.state.max_depth = self.state.max_depth.max(self.state.depth);
        self.state.bytecode.emit(instruction)
    }

    pub(super) fn emit_op(&mut self, opcode: OpCode) -> usize {
        self.emit(Instruction::simple(opcode))
    }

    pub(super) fn emit_with(&mut self, opcode: OpCode, operand: Operand) -> usize {
        self.emit(Instruction::with_operand(opcode, operand))
    }

    /// Emits a jump whose target is patched later.
    pub(super) fn emit_jump(&mut self, opcode: OpCode) -> usize {
        self.emit_with(opcode, Operand::Jump(u32::MAX))
    }

    /// Emits a jump back to a known target.
    pub(super) fn emit_loop(&mut self, opcode: OpCode, target: u32) -> usize {
        self.emit_with(opcode, Operand::Jump(target))
    }

    /// Points a previously emitted jump at the next instruction.
    pub(super) fn patch(&mut self, at: usize) {
        let target = self.ip();
        self.patch_to(at, target);
    }

    pub(super) fn patch_to(&mut self, at: usize, target: u32) {
        if let Some(instruction) = self.state.bytecode.instructions.get_mut(at) {
            instruction.operand = match instruction.operand {
                Some(Operand::Branch { pop, .. }) => Some(Operand::Branch { target, pop }),
                _ => Some(Operand::Jump(target)),
            };
        }
    }

    pub(super) fn depth(&self) -> i32 {
        self.state.depth
    }

    /// Sets the stack height after a point only reached by jumps.
    pub(super) fn set_depth(&mut self, depth: i32) {
        self.state.depth = depth;
        self.state.max_depth = self.state.max_depth.max(depth);
    }

    /// Records the source position of the next instruction.
    pub(super) fn mark(&mut self, offset: usize) {
        let ip = self.ip();
        let offset = offset as u32;
        match self.state.positions.last_mut() {
            Some(last) if last.0 == ip => last.1 = offset,
            Some(last) if last.1 == offset => {}
            _ => self.state.positions.push((ip, offset)),
        }
    }

    pub(super) fn add_constant(&mut self, constant: Constant) -> u32 {
        self.state.bytecode.add_constant(constant)
    }

    /// Index of a string constant, shared between equal strings.
    pub(super) fn name_constant(&mut self, name: &str) -> u32 {
        self.string_constant(&JsString::from(name))
    }

    pub(super) fn string_constant(&mut self, value: &JsString) -> u32 {
        if let Some(&index) = self.state.strings.get(value) {
            return index;
        }
        let index = self.add_constant(Constant::String(value.clone()));
        self.state.strings.insert(value.clone(), index);
        index
    }

    pub(super) fn emit_string(&mut self, value: &str) {
        let index = self.name_constant(value);
        self.emit_with(OpCode::Constant, Operand::Constant(index));
    }

    pub(super) fn emit_js_string(&mut self, value: &JsString) {
        let index = self.string_constant(value);
        self.emit_with(OpCode::Constant, Operand::Constant(index));
    }

    pub(super) fn next_template_site() -> u64 {
        NEXT_TEMPLATE_SITE.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserves a frame-local slot not visible to scripts.
    pub(super) fn alloc_local(&mut self, name: &str) -> u32 {
        let slot = self.state.local_count;
        self.state.local_count += 1;
        self.state.local_names.push(Arc::from(name));
        slot
    }

    pub(super) fn error(&self, span: Span, message: impl Into<String>) -> CompileError {
        self.error_kind(CompileErrorKind::Syntax, span, message)
    }

    pub(super) fn error_kind(&self, kind: CompileErrorKind, span: Span, message: impl Into<String>) -> CompileError {
        let (line, column) = self.source.line_col(span.start as u32);
        CompileError {
            kind,
            message: message.into(),
            line,
            column,
            source_url: self.source.url.clone(),
        }
    }

    // ========================================================================
    // Scopes and bindings
    // ========================================================================

    /// Enters the scope created for `node`, pushing it at run time if needed.
    /// Returns whether a scope was entered.
    pub(super) fn enter_scope(&mut self, node: NodeId) -> bool {
        let Some(scope) = self.analysis.scope_of(node) else {
            return false;
        };
        self.state.scope = scope;
        let info = self.analysis.scope(scope);
        if info.materialized
            && let Some(template) = info.template.clone()
        {
            let index = self.add_constant(Constant::Scope(template));
            self.emit_with(OpCode::PushScope, Operand::Constant(index));
            self.state.scope_depth += 1;
            self.push_control(ControlKind::Scope);
        }
        self.clear_lexicals(scope);
        true
    }

    /// Leaves a scope entered with [`Self::enter_scope`].
    pub(super) fn leave_scope(&mut self, node: NodeId) {
        let Some(scope) = self.analysis.scope_of(node) else {
            return;
        };
        if self.analysis.scope(scope).template.is_some() && self.analysis.scope(scope).materialized {
            self.emit_op(OpCode::PopScope);
            self.state.scope_depth -= 1;
            self.state.controls.pop();
        }
        if let Some(parent) = self.analysis.scope(scope).parent {
            self.state.scope = parent;
        }
    }

    /// Whether the scope for `node` was pushed at run time.
    pub(super) fn scope_is_materialized(&self, node: NodeId) -> bool {
        self.analysis
            .scope_of(node)
            .is_some_and(|scope| {
                let info = self.analysis.scope(scope);
                info.materialized && info.template.is_some()
            })
    }

    /// Puts the frame-local lexical bindings of a scope into their temporal
    /// dead zone.
    fn clear_lexicals(&mut self, scope: ScopeId) {
        let slots: Vec<u32> = self
            .analysis
            .scope(scope)
            .bindings
            .iter()
            .filter(|b| b.kind.is_lexical())
            .filter_map(|b| match b.storage {
                Storage::Local(slot) => Some(slot),
                Storage::Heap(_) => None,
            })
            .collect();
        for slot in slots {
            self.emit_with(OpCode::ClearLocal, Operand::Local(slot));
        }
    }

    fn resolve(&self, name: &str) -> Resolution {
        self.analysis.resolve(self.state.scope, name)
    }

    /// Pushes the value of a variable.
    pub(super) fn load_name(&mut self, name: &str) {
        match self.resolve(name) {
            Resolution::Local { slot, .. } => {
                self.emit_with(OpCode::GetLocal, Operand::Local(slot));
            }
            Resolution::Heap { hops, slot, .. } => {
                self.emit_with(OpCode::GetScope, Operand::Scope { hops, slot });
            }
            Resolution::Global => {
                let index = self.name_constant(name);
                self.emit_with(OpCode::GetGlobal, Operand::Name(index));
            }
            Resolution::Dynamic => {
                let index = self.name_constant(name);
                self.emit_with(OpCode::GetName, Operand::Name(index));
            }
        }
    }

    /// Stores the top value into a variable.
    pub(super) fn store_name(&mut self, name: &str, mode: StoreMode, span: Span) -> CompileResult<()> {
        let resolution = self.resolve(name);
        self.store_resolved(name, resolution, mode, span)
    }

    fn store_resolved(
        &mut self,
        name: &str,
        resolution: Resolution,
        mode: StoreMode,
        span: Span,
    ) -> CompileResult<()> {
        if mode == StoreMode::Assign && resolution == Resolution::Global && self.analysis.is_script_const(name) {
            return Err(self.error(span, "Assignment to constant variable"));
        }
        if mode == StoreMode::Assign
            && let Resolution::Local { kind, .. } | Resolution::Heap { kind, .. } = resolution
        {
            match kind {
                BindingKind::Const | BindingKind::Import => {
                    return Err(self.error(span, "Assignment to constant variable"));
                }
                BindingKind::Callee => {
                    if self.state.strict {
                        let index = self.name_constant("Assignment to constant variable.");
                        self.emit_with(OpCode::ThrowTypeError, Operand::Constant(index));
                    }
                    return Ok(());
                }
                _ => {}
            }
        }
        let index = match resolution {
            Resolution::Global | Resolution::Dynamic => self.name_constant(name),
            _ => 0,
        };
        match (resolution, mode) {
            (Resolution::Local { slot, .. }, StoreMode::Assign) => {
                self.emit_with(OpCode::SetLocal, Operand::Local(slot))
            }
            (Resolution::Local { slot, .. }, StoreMode::Init) => {
                self.emit_with(OpCode::InitLocal, Operand::Local(slot))
            }
            (Resolution::Heap { hops, slot, .. }, StoreMode::Assign) => {
                self.emit_with(OpCode::SetScope, Operand::Scope { hops, slot })
            }
            (Resolution::Heap { hops, slot, .. }, StoreMode::Init) => {
                self.emit_with(OpCode::InitScope, Operand::Scope { hops, slot })
            }
            (Resolution::Global, StoreMode::Assign) => self.emit_with(OpCode::SetGlobal, Operand::Name(index)),
            (Resolution::Dynamic, StoreMode::Assign) => self.emit_with(OpCode::SetName, Operand::Name(index)),
            (Resolution::Global | Resolution::Dynamic, StoreMode::Init) => {
                self.emit_with(OpCode::InitName, Operand::Name(index))
            }
        };
        Ok(())
    }

    /// Assigns to the `var` binding of a sloppy block-level function.
    pub(super) fn store_annex_b(&mut self, name: &str, span: Span) -> CompileResult<()> {
        let root = self.state.root;
        if matches!(self.analysis.scope(root).kind, ScopeKind::Script | ScopeKind::Eval)
            && self.analysis.scope(root).root_vars.iter().any(|v| v == name)
        {
            let index = self.name_constant(name);
            self.emit_with(OpCode::InitVar, Operand::Name(index));
            return Ok(());
        }
        let resolution = self.analysis.resolve_from(self.state.scope, root, name);
        self.store_resolved(name, resolution, StoreMode::Assign, span)?;
        self.emit_op(OpCode::Pop);
        Ok(())
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    pub(super) fn push_control(&mut self, kind: ControlKind<'a>) {
        let labels = match kind {
            ControlKind::Scope | ControlKind::Try(_) | ControlKind::FinallyBody { .. } => Vec::new(),
            _ => std::mem::take(&mut self.state.pending_labels),
        };
        self.state.controls.push(Control {
            kind,
            labels,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
    }

    pub(super) fn pop_control(&mut self) -> Option<Control<'a>> {
        self.state.controls.pop()
    }

    /// Points the `continue` jumps of the innermost control at `target`.
    pub(super) fn patch_continues(&mut self, target: u32) {
        let continues = match self.state.controls.last_mut() {
            Some(control) => std::mem::take(&mut control.continues),
            None => Vec::new(),
        };
        for at in continues {
            self.patch_to(at, target);
        }
    }

    pub(super) fn patch_breaks(&mut self, control: &Control<'a>) {
        for &at in &control.breaks {
            self.patch(at);
        }
    }

    fn find_break_target(&self, label: Option<&str>) -> Option<usize> {
        self.state.controls.iter().rposition(|control| match label {
            Some(label) => control.labels.iter().any(|l| l == label),
            None => control.is_loop() || matches!(control.kind, ControlKind::Switch),
        })
    }

    fn find_continue_target(&self, label: Option<&str>) -> Option<usize> {
        self.state.controls.iter().rposition(|control| {
            control.is_loop()
                && match label {
                    Some(label) => control.labels.iter().any(|l| l == label),
                    None => true,
                }
        })
    }

    pub(super) fn compile_break(&mut self, label: Option<&str>, span: Span) -> CompileResult<()> {
        let target = self
            .find_break_target(label)
            .ok_or_else(|| self.error(span, "Illegal break statement"))?;
        self.jump_out(target, false, span)
    }

    pub(super) fn compile_continue(&mut self, label: Option<&str>, span: Span) -> CompileResult<()> {
        let target = self
            .find_continue_target(label)
            .ok_or_else(|| self.error(span, "Illegal continue statement"))?;
        self.jump_out(target, true, span)
    }

    fn jump_out(&mut self, target: usize, is_continue: bool, span: Span) -> CompileResult<()> {
        let depth = self.depth();
        let scope = self.state.scope;
        let scope_depth = self.state.scope_depth;
        let mut closed = Vec::new();
        for index in (target + 1..self.state.controls.len()).rev() {
            self.emit_exit(index, 0, &mut closed, span)?;
        }
        if !is_continue {
            let at = self.ip();
            match &mut self.state.controls[target].kind {
                ControlKind::ForOf(ranges) => {
                    if ranges.close(at) {
                        closed.push(target);
                    }
                    self.emit_op(OpCode::IteratorClose);
                }
                ControlKind::ForIn | ControlKind::Switch => {
                    self.emit_op(OpCode::Pop);
                }
                _ => {}
            }
        }
        let jump = self.emit_jump(OpCode::Jump);
        let control = &mut self.state.controls[target];
        if is_continue {
            control.continues.push(jump);
        } else {
            control.breaks.push(jump);
        }
        self.reopen_ranges(&closed);
        self.set_depth(depth);
        self.state.scope = scope;
        self.state.scope_depth = scope_depth;
        Ok(())
    }

    /// Compiles `return` with the value already on the stack.
    pub(super) fn compile_return_value(&mut self, span: Span) -> CompileResult<()> {
        let depth = self.depth();
        let scope = self.state.scope;
        let scope_depth = self.state.scope_depth;
        let mut closed = Vec::new();
        for index in (0..self.state.controls.len()).rev() {
            self.emit_exit(index, 1, &mut closed, span)?;
        }
        self.emit_op(OpCode::Return);
        self.reopen_ranges(&closed);
        self.set_depth(depth - 1);
        self.state.scope = scope;
        self.state.scope_depth = scope_depth;
        Ok(())
    }

    fn reopen_ranges(&mut self, closed: &[usize]) {
        let at = self.ip();
        for &index in closed {
            match &mut self.state.controls[index].kind {
                ControlKind::ForOf(ranges) => ranges.reopen(at),
                ControlKind::Try(control) => {
                    if let Some(ranges) = &mut control.catch {
                        ranges.reopen(at);
                    }
                    if let Some((ranges, _)) = &mut control.finally {
                        ranges.reopen(at);
                    }
                }
                _ => {}
            }
        }
    }

    /// Emits the code leaving control `index`, keeping `keep` values on top.
    fn emit_exit(&mut self, index: usize, keep: u32, closed: &mut Vec<usize>, span: Span) -> CompileResult<()> {
        let at = self.ip();
        let mut inline = None;
        match &mut self.state.controls[index].kind {
            ControlKind::Loop | ControlKind::Labeled => {}
            ControlKind::ForOf(ranges) => {
                if ranges.close(at) {
                    closed.push(index);
                }
                if keep == 1 {
                    self.emit_op(OpCode::Rot3);
                }
                self.emit_op(OpCode::IteratorClose);
            }
            ControlKind::ForIn | ControlKind::Switch => self.pop_under(1, keep),
            ControlKind::FinallyBody { items } => {
                let items = *items;
                self.pop_under(items, keep);
            }
            ControlKind::Scope => {
                self.emit_op(OpCode::PopScope);
                self.state.scope_depth = self.state.scope_depth.saturating_sub(1);
            }
            ControlKind::Try(control) => {
                let mut was_open = false;
                if let Some(ranges) = &mut control.catch {
                    was_open |= ranges.close(at);
                }
                if let Some((ranges, block)) = &mut control.finally {
                    was_open |= ranges.close(at);
                    inline = Some((*block, control.scope, control.scope_depth));
                }
                if was_open {
                    closed.push(index);
                }
            }
        }
        if let Some((block, scope, scope_depth)) = inline {
            self.inline_finally(index, block, scope, scope_depth, keep, span)?;
        }
        Ok(())
    }

    fn pop_under(&mut self, count: u32, keep: u32) {
        for _ in 0..count {
            if keep == 1 {
                self.emit_op(OpCode::Swap);
            }
            self.emit_op(OpCode::Pop);
        }
    }

    /// Compiles a copy of a `finally` block for a jump leaving its `try`.
    fn inline_finally(
        &mut self,
        index: usize,
        block: &'a BlockStatement,
        scope: ScopeId,
        scope_depth: u32,
        keep: u32,
        _span: Span,
    ) -> CompileResult<()> {
        let inner = self.state.controls.split_off(index);
        let saved_scope = self.state.scope;
        let saved_depth = self.state.scope_depth;
        let saved_labels = std::mem::take(&mut self.state.pending_labels);
        let saved_completion = self.state.completion.take();
        self.state.scope = scope;
        self.state.scope_depth = scope_depth;
        self.push_control(ControlKind::FinallyBody { items: keep });
        let result = self.compile_block(block);
        self.pop_control();
        self.state.controls.extend(inner);
        self.state.scope = saved_scope;
        self.state.scope_depth = saved_depth;
        self.state.pending_labels = saved_labels;
        self.state.completion = saved_completion;
        result
    }

    /// Registers handlers for every range of a closed range set.
    pub(super) fn add_handlers(&mut self, ranges: RangeSet, target: u32, stack_depth: i32, scope_depth: u32, kind: HandlerKind) {
        for (start, end) in ranges.ranges {
            self.state.handlers.push(ExceptionHandler {
                start,
                end,
                target,
                stack_depth: stack_depth.max(0) as u32,
                scope_depth,
                kind,
            });
        }
    }

    pub(super) fn set_pending_labels(&mut self, labels: Vec<String>) {
        self.state.pending_labels = labels;
    }

    pub(super) fn take_pending_labels(&mut self) -> Vec<String> {
        std::mem::take(&mut self.state.pending_labels)
    }

    pub(super) fn is_annex_b(&self, id: NodeId) -> bool {
        self.analysis.annex_b.contains(&id)
    }

    pub(super) fn last_control_mut(&mut self) -> Option<&mut Control<'a>> {
        self.state.controls.last_mut()
    }

    /// Opens a handler region for an iterator held on the stack; see
    /// [`Self::close_iterator_region`].
    pub(super) fn open_iterator_region(&mut self) -> RangeSet {
        RangeSet::opened(self.ip())
    }

    /// Closes an iterator region and emits its handler, which closes the
    /// iterator before the exception or return continues.
    pub(super) fn close_iterator_region(&mut self, mut ranges: RangeSet, stack_depth: i32) {
        let at = self.ip();
        ranges.close(at);
        if ranges.ranges.is_empty() {
            return;
        }
        let depth = self.depth();
        let skip = self.emit_jump(OpCode::Jump);
        let target = self.ip();
        self.set_depth(stack_depth + 4);
        self.emit_op(OpCode::Rot4);
        self.emit_op(OpCode::Rot4);
        self.emit_op(OpCode::CloseIteratorAbrupt);
        self.emit_op(OpCode::EndFinally);
        self.patch(skip);
        self.set_depth(depth);
        let scope_depth = self.state.scope_depth;
        self.add_handlers(ranges, target, stack_depth + 2, scope_depth, HandlerKind::Finally);
    }
}

impl<'a> TryControl<'a> {
    pub(super) fn new(
        compiler: &Compiler<'a>,
        has_catch: bool,
        finalizer: Option<&'a BlockStatement>,
    ) -> Self {
        let at = compiler.ip();
        Self {
            catch: has_catch.then(|| RangeSet::opened(at)),
            finally: finalizer.map(|block| (RangeSet::opened(at), block)),
            scope: compiler.state.scope,
            scope_depth: compiler.state.scope_depth,
            stack_depth: compiler.state.depth,
        }
    }
}
