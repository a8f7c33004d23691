//! Scope analysis for variable resolution during compilation.
//!
//! A pre-pass over the whole compilation unit builds a tree of scopes keyed
//! by AST node id, declares every binding (with hoisting), and resolves every
//! identifier occurrence once to find out which bindings are captured by
//! closures or reachable by name through `with` or a direct `eval`. Captured
//! bindings are stored in heap scopes; all others get a frame-local slot.
//!
//! Top-level `var`, function and lexical declarations of scripts (and the
//! `var`s of sloppy eval code) are not bindings here: they live in the
//! realm's global scope or the caller's variable environment and are
//! resolved by name.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::*;
use crate::compiler::bytecode::{BindingTemplate, ScopeTemplate};
use crate::runtime::string::JsString;
use crate::stack;

pub(super) type ScopeId = usize;

/// What kind of code a compilation unit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// A script
    Script,
    /// Eval code
    Eval,
    /// A CommonJS-style module body with `(exports, require, module)`
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ScopeKind {
    Script,
    Eval,
    Function { arrow: bool },
    Block,
    With,
}

impl ScopeKind {
    fn is_root(self) -> bool {
        matches!(self, ScopeKind::Script | ScopeKind::Eval | ScopeKind::Function { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BindingKind {
    Var,
    Let,
    Const,
    Param,
    Function,
    CatchParam,
    /// The name of a named function expression, visible in its own body
    Callee,
    Arguments,
    Import,
}

impl BindingKind {
    pub(super) fn is_lexical(self) -> bool {
        matches!(self, BindingKind::Let | BindingKind::Const | BindingKind::Import)
    }

    pub(super) fn is_mutable(self) -> bool {
        !matches!(self, BindingKind::Const | BindingKind::Import | BindingKind::Callee)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Storage {
    Local(u32),
    Heap(u32),
}

#[derive(Debug, Clone)]
pub(super) struct Binding {
    pub name: String,
    pub kind: BindingKind,
    pub captured: bool,
    pub storage: Storage,
}

#[derive(Debug, Clone)]
pub(super) struct ScopeInfo {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Nearest enclosing script, eval or function scope (itself for those)
    pub root: ScopeId,
    pub strict: bool,
    pub bindings: Vec<Binding>,
    names: FxHashMap<String, usize>,
    /// A direct eval occurs in this scope or a nested one
    pub contains_eval: bool,
    /// Sloppy direct eval in this function may add `var` bindings
    pub sloppy_eval: bool,
    /// Allocated on the heap at run time
    pub materialized: bool,
    pub template: Option<Arc<ScopeTemplate>>,
    // Root scopes only.
    pub local_count: u32,
    pub local_names: Vec<Arc<str>>,
    pub captures: Vec<Arc<str>>,
    /// Names declared with `var` that live outside this unit's bindings
    pub root_vars: Vec<String>,
    /// Global lexical declarations of a script: `(name, is_const)`
    pub root_lexicals: Vec<(String, bool)>,
}

impl ScopeInfo {
    fn new(kind: ScopeKind, parent: Option<ScopeId>, root: ScopeId, strict: bool) -> Self {
        Self {
            kind,
            parent,
            root,
            strict,
            bindings: Vec::new(),
            names: FxHashMap::default(),
            contains_eval: false,
            sloppy_eval: false,
            materialized: false,
            template: None,
            local_count: 0,
            local_names: Vec::new(),
            captures: Vec::new(),
            root_vars: Vec::new(),
            root_lexicals: Vec::new(),
        }
    }

    pub(super) fn lookup(&self, name: &str) -> Option<&Binding> {
        self.names.get(name).map(|&index| &self.bindings[index])
    }

    pub(super) fn binding_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }
}

/// How an identifier reference resolves at a given point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Resolution {
    Local { slot: u32, kind: BindingKind },
    Heap { hops: u32, slot: u32, kind: BindingKind },
    Global,
    Dynamic,
}

/// The result of analyzing one compilation unit.
#[derive(Debug)]
pub struct ScopeAnalysis {
    pub(super) scopes: Vec<ScopeInfo>,
    by_node: FxHashMap<NodeId, ScopeId>,
    /// Sloppy block-level function declarations also assigned to a `var`
    pub(super) annex_b: FxHashSet<NodeId>,
    references: Vec<(ScopeId, String)>,
    eval_sites: Vec<ScopeId>,
}

impl ScopeAnalysis {
    /// Analyzes a whole program.
    pub fn analyze(program: &Program, root_kind: RootKind) -> Self {
        let mut analysis = Self {
            scopes: Vec::new(),
            by_node: FxHashMap::default(),
            annex_b: FxHashSet::default(),
            references: Vec::new(),
            eval_sites: Vec::new(),
        };
        let kind = match root_kind {
            RootKind::Script => ScopeKind::Script,
            RootKind::Eval => ScopeKind::Eval,
            RootKind::Module => ScopeKind::Function { arrow: false },
        };
        let root = analysis.push_scope(kind, None, program.strict, program.id);
        if root_kind == RootKind::Module {
            for name in ["exports", "require", "module"] {
                analysis.declare(root, name, BindingKind::Param);
            }
        }
        analysis.hoist_root(root, &program.body);
        for statement in &program.body {
            analysis.visit_statement(statement, root);
        }
        analysis.finish();
        analysis
    }

    /// Scope created for an AST node.
    pub(super) fn scope_of(&self, id: NodeId) -> Option<ScopeId> {
        self.by_node.get(&id).copied()
    }

    pub(super) fn scope(&self, id: ScopeId) -> &ScopeInfo {
        &self.scopes[id]
    }

    fn push_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>, strict: bool, node: NodeId) -> ScopeId {
        let id = self.scopes.len();
        let root = match (kind.is_root(), parent) {
            (false, Some(parent)) => self.scopes[parent].root,
            _ => id,
        };
        self.scopes.push(ScopeInfo::new(kind, parent, root, strict));
        self.by_node.insert(node, id);
        id
    }

    fn declare(&mut self, scope: ScopeId, name: &str, kind: BindingKind) {
        let info = &mut self.scopes[scope];
        if let Some(&index) = info.names.get(name) {
            let existing = &mut info.bindings[index];
            let replace = match (existing.kind, kind) {
                (BindingKind::Callee, _) => true,
                (_, BindingKind::Function) => true,
                (_, BindingKind::Let | BindingKind::Const) => true,
                _ => false,
            };
            if replace {
                existing.kind = kind;
            }
            return;
        }
        info.names.insert(name.to_string(), info.bindings.len());
        info.bindings.push(Binding {
            name: name.to_string(),
            kind,
            captured: false,
            storage: Storage::Local(0),
        });
    }

    fn declare_pattern(&mut self, scope: ScopeId, pattern: &Pattern, kind: BindingKind) {
        let mut names = Vec::new();
        pattern.bound_names(&mut names);
        for id in names {
            self.declare(scope, &id.name, kind);
        }
    }

    // ========================================================================
    // Hoisting
    // ========================================================================

    fn hoist_root(&mut self, root: ScopeId, body: &[Statement]) {
        let mut vars = Vec::new();
        let mut block_functions = Vec::new();
        for statement in body {
            collect_var_names(statement, &mut vars, &mut block_functions, true);
        }
        let global_vars = match self.scopes[root].kind {
            ScopeKind::Script => true,
            ScopeKind::Eval => !self.scopes[root].strict,
            _ => false,
        };
        let strict = self.scopes[root].strict;

        // Lexical declarations first so Annex B hoisting can see conflicts.
        let mut lexicals = Vec::new();
        collect_lexical_names(body, &mut lexicals, false);
        for (name, kind) in &lexicals {
            if self.scopes[root].kind == ScopeKind::Script {
                self.scopes[root]
                    .root_lexicals
                    .push((name.clone(), *kind == BindingKind::Const));
            } else {
                self.declare(root, name, *kind);
            }
        }
        for statement in body {
            if let Statement::Import(import) = statement {
                for specifier in &import.specifiers {
                    let local = match specifier {
                        ImportSpecifier::Default(id) | ImportSpecifier::Namespace(id) => id,
                        ImportSpecifier::Named { local, .. } => local,
                    };
                    self.declare(root, &local.name, BindingKind::Import);
                }
            }
        }

        if !strict {
            for (name, id) in block_functions {
                let conflicts = lexicals.iter().any(|(lexical, _)| *lexical == name)
                    || self.scopes[root]
                        .lookup(&name)
                        .is_some_and(|b| b.kind.is_lexical() || b.kind == BindingKind::Param);
                if !conflicts {
                    self.annex_b.insert(id);
                    vars.push(name);
                }
            }
        }

        for name in vars {
            if global_vars {
                if !self.scopes[root].root_vars.contains(&name) {
                    self.scopes[root].root_vars.push(name);
                }
            } else {
                self.declare(root, &name, BindingKind::Var);
            }
        }
        for statement in body {
            if let Some(function) = top_level_function(statement) {
                if let Some(name) = &function.name {
                    if global_vars {
                        if !self.scopes[root].root_vars.contains(&name.name) {
                            self.scopes[root].root_vars.push(name.name.clone());
                        }
                    } else {
                        self.declare(root, &name.name, BindingKind::Function);
                    }
                }
            }
        }
    }

    fn hoist_block(&mut self, scope: ScopeId, body: &[Statement]) {
        let mut lexicals = Vec::new();
        collect_lexical_names(body, &mut lexicals, true);
        for (name, kind) in lexicals {
            self.declare(scope, &name, kind);
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn visit_statements(&mut self, statements: &[Statement], scope: ScopeId) {
        for statement in statements {
            self.visit_statement(statement, scope);
        }
    }

    fn visit_block(&mut self, block: &BlockStatement, parent: ScopeId) {
        let strict = self.scopes[parent].strict;
        let scope = self.push_scope(ScopeKind::Block, Some(parent), strict, block.id);
        self.hoist_block(scope, &block.body);
        self.visit_statements(&block.body, scope);
    }

    fn visit_statement(&mut self, statement: &Statement, scope: ScopeId) {
        stack::guarded(|| self.visit_statement_kind(statement, scope))
    }

    fn visit_statement_kind(&mut self, statement: &Statement, scope: ScopeId) {
        match statement {
            Statement::VariableDeclaration(declaration) => self.visit_declaration(declaration, scope),
            Statement::FunctionDeclaration(function) => {
                if let Some(name) = &function.name {
                    self.reference(scope, &name.name);
                }
                self.visit_function(function, scope, false);
            }
            Statement::Expression(statement) => self.visit_expression(&statement.expression, scope),
            Statement::Block(block) => self.visit_block(block, scope),
            Statement::If(statement) => {
                self.visit_expression(&statement.test, scope);
                self.visit_statement(&statement.consequent, scope);
                if let Some(alternate) = &statement.alternate {
                    self.visit_statement(alternate, scope);
                }
            }
            Statement::Switch(switch) => {
                self.visit_expression(&switch.discriminant, scope);
                let strict = self.scopes[scope].strict;
                let inner = self.push_scope(ScopeKind::Block, Some(scope), strict, switch.id);
                for case in &switch.cases {
                    self.hoist_block(inner, &case.consequent);
                }
                for case in &switch.cases {
                    if let Some(test) = &case.test {
                        self.visit_expression(test, inner);
                    }
                    self.visit_statements(&case.consequent, inner);
                }
            }
            Statement::While(statement) => {
                self.visit_expression(&statement.test, scope);
                self.visit_statement(&statement.body, scope);
            }
            Statement::DoWhile(statement) => {
                self.visit_statement(&statement.body, scope);
                self.visit_expression(&statement.test, scope);
            }
            Statement::For(statement) => {
                let strict = self.scopes[scope].strict;
                let inner = self.push_scope(ScopeKind::Block, Some(scope), strict, statement.id);
                match &statement.init {
                    Some(ForInit::Declaration(declaration)) => {
                        if declaration.kind != VariableKind::Var {
                            let kind = lexical_kind(declaration.kind);
                            for declarator in &declaration.declarations {
                                self.declare_pattern(inner, &declarator.id, kind);
                            }
                        }
                        self.visit_declaration(declaration, inner);
                    }
                    Some(ForInit::Expression(expression)) => self.visit_expression(expression, inner),
                    None => {}
                }
                if let Some(test) = &statement.test {
                    self.visit_expression(test, inner);
                }
                if let Some(update) = &statement.update {
                    self.visit_expression(update, inner);
                }
                self.visit_statement(&statement.body, inner);
            }
            Statement::ForIn(statement) => {
                self.visit_for_in_of(&statement.left, &statement.right, &statement.body, statement.id, scope)
            }
            Statement::ForOf(statement) => {
                self.visit_for_in_of(&statement.left, &statement.right, &statement.body, statement.id, scope)
            }
            Statement::Return(statement) => {
                if let Some(argument) = &statement.argument {
                    self.visit_expression(argument, scope);
                }
            }
            Statement::Throw(statement) => self.visit_expression(&statement.argument, scope),
            Statement::Try(statement) => {
                self.visit_block(&statement.block, scope);
                if let Some(handler) = &statement.handler {
                    let strict = self.scopes[scope].strict;
                    let inner = self.push_scope(ScopeKind::Block, Some(scope), strict, handler.id);
                    if let Some(param) = &handler.param {
                        self.declare_pattern(inner, param, BindingKind::CatchParam);
                        self.visit_pattern(param, inner);
                    }
                    self.visit_block(&handler.body, inner);
                }
                if let Some(finalizer) = &statement.finalizer {
                    self.visit_block(finalizer, scope);
                }
            }
            Statement::With(statement) => {
                self.visit_expression(&statement.object, scope);
                let strict = self.scopes[scope].strict;
                let inner = self.push_scope(ScopeKind::With, Some(scope), strict, statement.id);
                self.visit_statement(&statement.body, inner);
            }
            Statement::Labeled(statement) => self.visit_statement(&statement.body, scope),
            Statement::Import(import) => {
                for specifier in &import.specifiers {
                    let local = match specifier {
                        ImportSpecifier::Default(id) | ImportSpecifier::Namespace(id) => id,
                        ImportSpecifier::Named { local, .. } => local,
                    };
                    self.reference(scope, &local.name);
                }
            }
            Statement::Export(export) => match export {
                ExportDeclaration::Declaration(statement) => self.visit_statement(statement, scope),
                ExportDeclaration::Named { specifiers, source, .. } => {
                    if source.is_none() {
                        for (local, _) in specifiers {
                            self.reference(scope, local);
                        }
                    }
                }
                ExportDeclaration::All { .. } => {}
                ExportDeclaration::Default(expression) => {
                    if let Expression::Function(function) = expression {
                        self.visit_function(function, scope, false);
                    } else {
                        self.visit_expression(expression, scope);
                    }
                }
            },
            Statement::Break(_) | Statement::Continue(_) | Statement::Debugger | Statement::Empty => {}
        }
    }

    fn visit_declaration(&mut self, declaration: &VariableDeclaration, scope: ScopeId) {
        for declarator in &declaration.declarations {
            self.visit_pattern(&declarator.id, scope);
            if let Some(init) = &declarator.init {
                self.visit_expression(init, scope);
            }
        }
    }

    fn visit_for_in_of(&mut self, left: &ForHead, right: &Expression, body: &Statement, id: NodeId, scope: ScopeId) {
        self.visit_expression(right, scope);
        let strict = self.scopes[scope].strict;
        let inner = self.push_scope(ScopeKind::Block, Some(scope), strict, id);
        match left {
            ForHead::Declaration { kind, pattern } => {
                if *kind != VariableKind::Var {
                    self.declare_pattern(inner, pattern, lexical_kind(*kind));
                }
                self.visit_pattern(pattern, inner);
            }
            ForHead::Pattern(pattern) => self.visit_pattern(pattern, inner),
        }
        self.visit_statement(body, inner);
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn visit_function(&mut self, function: &FunctionLiteral, parent: ScopeId, is_expression: bool) {
        let arrow = function.kind == FunctionKind::Arrow;
        let scope = self.push_scope(ScopeKind::Function { arrow }, Some(parent), function.strict, function.id);
        if is_expression
            && function.kind == FunctionKind::Normal
            && let Some(name) = &function.name
        {
            self.declare(scope, &name.name, BindingKind::Callee);
        }
        for param in &function.params {
            self.declare_pattern(scope, param, BindingKind::Param);
        }
        if let Some(rest) = &function.rest {
            self.declare_pattern(scope, rest, BindingKind::Param);
        }
        self.hoist_root(scope, &function.body);
        for param in &function.params {
            self.visit_pattern(param, scope);
        }
        if let Some(rest) = &function.rest {
            self.visit_pattern(rest, scope);
        }
        self.visit_statements(&function.body, scope);
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn visit_pattern(&mut self, pattern: &Pattern, scope: ScopeId) {
        match pattern {
            Pattern::Identifier(id) => self.reference(scope, &id.name),
            Pattern::Member(expression) => self.visit_expression(expression, scope),
            Pattern::Object(object) => {
                for property in &object.properties {
                    if let PropertyName::Computed(key) = &property.key {
                        self.visit_expression(key, scope);
                    }
                    self.visit_pattern(&property.value, scope);
                }
                if let Some(rest) = &object.rest {
                    self.visit_pattern(rest, scope);
                }
            }
            Pattern::Array(array) => {
                for element in array.elements.iter().flatten() {
                    self.visit_pattern(element, scope);
                }
                if let Some(rest) = &array.rest {
                    self.visit_pattern(rest, scope);
                }
            }
            Pattern::Assignment(assignment) => {
                self.visit_pattern(&assignment.target, scope);
                self.visit_expression(&assignment.default, scope);
            }
        }
    }

    fn visit_arguments(&mut self, arguments: &[Argument], scope: ScopeId) {
        for argument in arguments {
            match argument {
                Argument::Expression(expression) | Argument::Spread(expression) => {
                    self.visit_expression(expression, scope)
                }
            }
        }
    }

    fn visit_expression(&mut self, expression: &Expression, scope: ScopeId) {
        stack::guarded(|| self.visit_expression_kind(expression, scope))
    }

    fn visit_expression_kind(&mut self, expression: &Expression, scope: ScopeId) {
        match expression {
            Expression::Identifier(id) => self.reference(scope, &id.name),
            Expression::Literal(_) | Expression::This | Expression::NewTarget => {}
            Expression::Template(template) => {
                for expression in &template.expressions {
                    self.visit_expression(expression, scope);
                }
            }
            Expression::TaggedTemplate(tagged) => {
                self.visit_expression(&tagged.tag, scope);
                for expression in &tagged.quasi.expressions {
                    self.visit_expression(expression, scope);
                }
            }
            Expression::Array(array) => {
                for element in &array.elements {
                    match element {
                        ArrayElement::Expression(expression) | ArrayElement::Spread(expression) => {
                            self.visit_expression(expression, scope)
                        }
                        ArrayElement::Hole => {}
                    }
                }
            }
            Expression::Object(object) => {
                for property in &object.properties {
                    match property {
                        ObjectProperty::KeyValue { key, value, .. } => {
                            if let PropertyName::Computed(key) = key {
                                self.visit_expression(key, scope);
                            }
                            self.visit_expression(value, scope);
                        }
                        ObjectProperty::Getter { key, function } | ObjectProperty::Setter { key, function } => {
                            if let PropertyName::Computed(key) = key {
                                self.visit_expression(key, scope);
                            }
                            self.visit_function(function, scope, true);
                        }
                        ObjectProperty::Spread(expression) | ObjectProperty::Proto(expression) => {
                            self.visit_expression(expression, scope)
                        }
                        ObjectProperty::CoverInitialized { name, default } => {
                            self.reference(scope, &name.name);
                            self.visit_expression(default, scope);
                        }
                    }
                }
            }
            Expression::Function(function) => self.visit_function(function, scope, true),
            Expression::Unary(unary) => self.visit_expression(&unary.argument, scope),
            Expression::Update(update) => self.visit_expression(&update.argument, scope),
            Expression::Binary(binary) => {
                self.visit_expression(&binary.left, scope);
                self.visit_expression(&binary.right, scope);
            }
            Expression::Logical(logical) => {
                self.visit_expression(&logical.left, scope);
                self.visit_expression(&logical.right, scope);
            }
            Expression::Assignment(assignment) => {
                self.visit_pattern(&assignment.target, scope);
                self.visit_expression(&assignment.value, scope);
            }
            Expression::Conditional(conditional) => {
                self.visit_expression(&conditional.test, scope);
                self.visit_expression(&conditional.consequent, scope);
                self.visit_expression(&conditional.alternate, scope);
            }
            Expression::Call(call) => {
                if matches!(call.callee.as_ref(), Expression::Identifier(id) if id.name == "eval") {
                    self.eval_sites.push(scope);
                }
                self.visit_expression(&call.callee, scope);
                self.visit_arguments(&call.arguments, scope);
            }
            Expression::New(new) => {
                self.visit_expression(&new.callee, scope);
                self.visit_arguments(&new.arguments, scope);
            }
            Expression::Member(member) => {
                self.visit_expression(&member.object, scope);
                if let MemberProperty::Computed(property) = &member.property {
                    self.visit_expression(property, scope);
                }
            }
            Expression::OptionalChain(inner) | Expression::Parenthesized(inner) => {
                self.visit_expression(inner, scope)
            }
            Expression::Sequence(expressions) => {
                for expression in expressions {
                    self.visit_expression(expression, scope);
                }
            }
            Expression::Yield(expression) => {
                if let Some(argument) = &expression.argument {
                    self.visit_expression(argument, scope);
                }
            }
        }
    }

    fn reference(&mut self, scope: ScopeId, name: &str) {
        self.references.push((scope, name.to_string()));
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    fn finish(&mut self) {
        for index in 0..self.eval_sites.len() {
            self.mark_eval(self.eval_sites[index]);
        }
        let references = std::mem::take(&mut self.references);
        for (scope, name) in &references {
            self.resolve_reference(*scope, name);
        }
        for scope in &mut self.scopes {
            if scope.contains_eval {
                for binding in &mut scope.bindings {
                    binding.captured = true;
                }
            }
        }
        self.assign_storage();
    }

    fn mark_eval(&mut self, site: ScopeId) {
        let root = self.scopes[site].root;
        if !self.scopes[site].strict {
            self.scopes[root].sloppy_eval = true;
        }
        let mut current = Some(site);
        let mut arguments_declared = false;
        while let Some(scope) = current {
            self.scopes[scope].contains_eval = true;
            if !arguments_declared && self.scopes[scope].kind == (ScopeKind::Function { arrow: false }) {
                arguments_declared = true;
                if self.scopes[scope].lookup("arguments").is_none() {
                    self.declare(scope, "arguments", BindingKind::Arguments);
                }
            }
            current = self.scopes[scope].parent;
        }
    }

    fn resolve_reference(&mut self, from: ScopeId, name: &str) {
        let mut current = from;
        let mut crossed = false;
        loop {
            let scope = &self.scopes[current];
            let found = scope.binding_index(name);
            let found = match found {
                None if name == "arguments" && scope.kind == (ScopeKind::Function { arrow: false }) => {
                    self.declare(current, "arguments", BindingKind::Arguments);
                    self.scopes[current].binding_index(name)
                }
                other => other,
            };
            if let Some(index) = found {
                if crossed {
                    self.scopes[current].bindings[index].captured = true;
                    let root = self.scopes[from].root;
                    let name: Arc<str> = Arc::from(name);
                    if !self.scopes[root].captures.contains(&name) {
                        self.scopes[root].captures.push(name);
                    }
                }
                return;
            }
            let scope = &self.scopes[current];
            if scope.kind.is_root() || scope.kind == ScopeKind::With || scope.sloppy_eval {
                crossed = true;
            }
            match scope.parent {
                Some(parent) => current = parent,
                None => return,
            }
        }
    }

    fn assign_storage(&mut self) {
        let mut next_local: FxHashMap<ScopeId, u32> = FxHashMap::default();
        for id in 0..self.scopes.len() {
            let root = self.scopes[id].root;
            let var_scope = match self.scopes[id].kind {
                ScopeKind::Function { .. } => true,
                ScopeKind::Eval => self.scopes[id].strict,
                _ => false,
            };
            let mut template = ScopeTemplate {
                var_scope,
                bindings: Vec::new(),
            };
            let mut local_names = Vec::new();
            let counter = next_local.entry(root).or_insert(0);
            for binding in &mut self.scopes[id].bindings {
                if binding.captured {
                    binding.storage = Storage::Heap(template.bindings.len() as u32);
                    template.bindings.push(BindingTemplate {
                        name: JsString::from(binding.name.as_str()),
                        mutable: binding.kind.is_mutable(),
                        lexical: binding.kind.is_lexical(),
                        silent: binding.kind == BindingKind::Callee,
                    });
                } else {
                    binding.storage = Storage::Local(*counter);
                    *counter += 1;
                    local_names.push(Arc::from(binding.name.as_str()));
                }
            }
            let scope = &mut self.scopes[id];
            scope.materialized = !template.bindings.is_empty()
                || scope.kind == ScopeKind::With
                || (scope.sloppy_eval && matches!(scope.kind, ScopeKind::Function { .. }));
            if scope.materialized && scope.kind != ScopeKind::With {
                scope.template = Some(Arc::new(template));
            }
            self.scopes[root].local_names.extend(local_names);
        }
        for (root, count) in next_local {
            self.scopes[root].local_count = count;
        }
    }

    /// Whether `name` is a `const` declared at the top level of the script
    /// being compiled.
    pub(super) fn is_script_const(&self, name: &str) -> bool {
        self.scopes.first().is_some_and(|root| {
            root.kind == ScopeKind::Script && root.root_lexicals.iter().any(|(n, constant)| *constant && n == name)
        })
    }

    /// Resolves `name` as seen from `from`.
    pub(super) fn resolve(&self, from: ScopeId, name: &str) -> Resolution {
        self.resolve_from(from, from, name)
    }

    /// Resolves `name` starting the search at `start`, counting hops from
    /// `from`, which must be `start` or nested inside it.
    pub(super) fn resolve_from(&self, from: ScopeId, start: ScopeId, name: &str) -> Resolution {
        let mut hops = 0;
        let mut current = from;
        while current != start {
            if self.scopes[current].materialized {
                hops += 1;
            }
            match self.scopes[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        let mut dynamic = false;
        loop {
            let scope = &self.scopes[current];
            if let Some(binding) = scope.lookup(name) {
                if dynamic {
                    return Resolution::Dynamic;
                }
                return match binding.storage {
                    Storage::Local(slot) if scope.root == self.scopes[from].root => Resolution::Local {
                        slot,
                        kind: binding.kind,
                    },
                    Storage::Local(_) => Resolution::Dynamic,
                    Storage::Heap(slot) => Resolution::Heap {
                        hops,
                        slot,
                        kind: binding.kind,
                    },
                };
            }
            if scope.kind == ScopeKind::With || scope.kind == ScopeKind::Eval || scope.sloppy_eval {
                dynamic = true;
            }
            if scope.materialized {
                hops += 1;
            }
            match scope.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        if dynamic { Resolution::Dynamic } else { Resolution::Global }
    }
}

fn lexical_kind(kind: VariableKind) -> BindingKind {
    match kind {
        VariableKind::Const => BindingKind::Const,
        _ => BindingKind::Let,
    }
}

/// The function declared by a top-level statement, if any.
pub(super) fn top_level_function(statement: &Statement) -> Option<&FunctionLiteral> {
    match statement {
        Statement::FunctionDeclaration(function) => Some(function),
        Statement::Export(ExportDeclaration::Declaration(inner)) => top_level_function(inner),
        Statement::Labeled(labeled) => top_level_function(&labeled.body),
        _ => None,
    }
}

/// Collects `let`/`const` names of a statement list, plus function
/// declarations when the list is a block body.
fn collect_lexical_names(statements: &[Statement], names: &mut Vec<(String, BindingKind)>, block: bool) {
    for statement in statements {
        let statement = match statement {
            Statement::Export(ExportDeclaration::Declaration(inner)) => inner.as_ref(),
            other => other,
        };
        match statement {
            Statement::VariableDeclaration(declaration) if declaration.kind != VariableKind::Var => {
                let kind = lexical_kind(declaration.kind);
                for declarator in &declaration.declarations {
                    let mut bound = Vec::new();
                    declarator.id.bound_names(&mut bound);
                    names.extend(bound.into_iter().map(|id| (id.name.clone(), kind)));
                }
            }
            Statement::FunctionDeclaration(function) if block => {
                if let Some(name) = &function.name {
                    names.push((name.name.clone(), BindingKind::Function));
                }
            }
            _ => {}
        }
    }
}

/// Collects `var` names hoisted out of a statement, and function
/// declarations nested in blocks (candidates for Annex B hoisting).
fn collect_var_names(
    statement: &Statement,
    vars: &mut Vec<String>,
    block_functions: &mut Vec<(String, NodeId)>,
    top_level: bool,
) {
    let push_pattern = |pattern: &Pattern, vars: &mut Vec<String>| {
        let mut bound = Vec::new();
        pattern.bound_names(&mut bound);
        for id in bound {
            if !vars.contains(&id.name) {
                vars.push(id.name.clone());
            }
        }
    };
    match statement {
        Statement::VariableDeclaration(declaration) if declaration.kind == VariableKind::Var => {
            for declarator in &declaration.declarations {
                push_pattern(&declarator.id, vars);
            }
        }
        Statement::FunctionDeclaration(function) if !top_level => {
            if let Some(name) = &function.name {
                block_functions.push((name.name.clone(), function.id));
            }
        }
        Statement::Block(block) => {
            for inner in &block.body {
                collect_var_names(inner, vars, block_functions, false);
            }
        }
        Statement::If(statement) => {
            collect_var_names(&statement.consequent, vars, block_functions, false);
            if let Some(alternate) = &statement.alternate {
                collect_var_names(alternate, vars, block_functions, false);
            }
        }
        Statement::Switch(switch) => {
            for case in &switch.cases {
                for inner in &case.consequent {
                    collect_var_names(inner, vars, block_functions, false);
                }
            }
        }
        Statement::While(statement) => collect_var_names(&statement.body, vars, block_functions, false),
        Statement::DoWhile(statement) => collect_var_names(&statement.body, vars, block_functions, false),
        Statement::For(statement) => {
            if let Some(ForInit::Declaration(declaration)) = &statement.init
                && declaration.kind == VariableKind::Var
            {
                for declarator in &declaration.declarations {
                    push_pattern(&declarator.id, vars);
                }
            }
            collect_var_names(&statement.body, vars, block_functions, false);
        }
        Statement::ForIn(ForInStatement { left, body, .. }) | Statement::ForOf(ForOfStatement { left, body, .. }) => {
            if let ForHead::Declaration {
                kind: VariableKind::Var,
                pattern,
            } = left
            {
                push_pattern(pattern, vars);
            }
            collect_var_names(body, vars, block_functions, false);
        }
        Statement::Try(statement) => {
            for inner in &statement.block.body {
                collect_var_names(inner, vars, block_functions, false);
            }
            if let Some(handler) = &statement.handler {
                for inner in &handler.body.body {
                    collect_var_names(inner, vars, block_functions, false);
                }
            }
            if let Some(finalizer) = &statement.finalizer {
                for inner in &finalizer.body {
                    collect_var_names(inner, vars, block_functions, false);
                }
            }
        }
        Statement::With(statement) => collect_var_names(&statement.body, vars, block_functions, false),
        Statement::Labeled(statement) => collect_var_names(&statement.body, vars, block_functions, top_level),
        Statement::Export(ExportDeclaration::Declaration(inner)) => {
            collect_var_names(inner, vars, block_functions, top_level)
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn analyze(source: &str) -> (Program, ScopeAnalysis) {
        let program = Parser::new(source).parse_program().unwrap();
        let analysis = ScopeAnalysis::analyze(&program, RootKind::Script);
        (program, analysis)
    }

    fn function_scope<'a>(analysis: &'a ScopeAnalysis, program: &Program) -> &'a ScopeInfo {
        match &program.body[0] {
            Statement::FunctionDeclaration(function) => {
                analysis.scope(analysis.scope_of(function.id).unwrap())
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_uncaptured_bindings_are_local() {
        let (program, analysis) = analyze("function f(a) { var b = a; let c = b; return c; }");
        let scope = function_scope(&analysis, &program);
        assert!(!scope.materialized);
        assert_eq!(scope.local_count, 3);
        assert!(scope.bindings.iter().all(|b| matches!(b.storage, Storage::Local(_))));
    }

    #[test]
    fn test_captured_binding_goes_to_heap() {
        let (program, analysis) = analyze("function f() { var x = 1; var y = 2; return () => x; }");
        let scope = function_scope(&analysis, &program);
        assert!(scope.materialized);
        assert_eq!(scope.lookup("x").unwrap().storage, Storage::Heap(0));
        assert!(matches!(scope.lookup("y").unwrap().storage, Storage::Local(_)));
        let template = scope.template.as_ref().unwrap();
        assert_eq!(template.bindings.len(), 1);
        assert_eq!(template.bindings[0].name, "x");
    }

    #[test]
    fn test_eval_captures_everything() {
        let (program, analysis) = analyze("function f(a) { var b; eval('a'); }");
        let scope = function_scope(&analysis, &program);
        assert!(scope.sloppy_eval);
        assert!(scope.bindings.iter().all(|b| b.captured));
        assert!(scope.lookup("arguments").is_some());
    }

    #[test]
    fn test_with_forces_dynamic_lookup() {
        let (program, analysis) = analyze("function f(o) { var x; with (o) { x; } }");
        let scope = function_scope(&analysis, &program);
        assert!(scope.lookup("x").unwrap().captured);
    }

    #[test]
    fn test_arguments_declared_on_use() {
        let (program, analysis) = analyze("function f() { return () => arguments[0]; }");
        let scope = function_scope(&analysis, &program);
        let binding = scope.lookup("arguments").unwrap();
        assert_eq!(binding.kind, BindingKind::Arguments);
        assert!(binding.captured);
    }

    #[test]
    fn test_script_globals_are_not_bindings() {
        let (program, analysis) = analyze("var a; let b; const c = 1; function d() {}");
        let root = analysis.scope(analysis.scope_of(program.id).unwrap());
        assert!(root.bindings.is_empty());
        assert_eq!(root.root_vars, vec!["a".to_string(), "d".to_string()]);
        assert_eq!(root.root_lexicals, vec![("b".to_string(), false), ("c".to_string(), true)]);
    }

    #[test]
    fn test_annex_b_block_function() {
        let (program, analysis) = analyze("{ function g() {} }");
        let root = analysis.scope(analysis.scope_of(program.id).unwrap());
        assert_eq!(root.root_vars, vec!["g".to_string()]);
        assert_eq!(analysis.annex_b.len(), 1);

        let strict = Parser::new("'use strict'; { function g() {} }").parse_program().unwrap();
        let analysis = ScopeAnalysis::analyze(&strict, RootKind::Script);
        assert!(analysis.annex_b.is_empty());
    }

    #[test]
    fn test_resolution_hops() {
        let source = "function f() { let x = 1; { let y = 2; (() => x + y); } }";
        let (program, analysis) = analyze(source);
        let Statement::FunctionDeclaration(function) = &program.body[0] else {
            panic!("expected function");
        };
        let Statement::Block(block) = &function.body[1] else {
            panic!("expected block");
        };
        let block_scope = analysis.scope_of(block.id).unwrap();
        assert!(matches!(
            analysis.resolve(block_scope, "x"),
            Resolution::Heap { hops: 1, slot: 0, .. }
        ));
        assert!(matches!(
            analysis.resolve(block_scope, "y"),
            Resolution::Heap { hops: 0, slot: 0, .. }
        ));
        assert_eq!(analysis.resolve(block_scope, "z"), Resolution::Global);
    }
}
