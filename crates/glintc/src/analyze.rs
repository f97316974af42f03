//! The expression/statement semantic analyzer (§4.4, pass 1): lowers AST
//! into the typed [`semantic_ir`] tree, applying overload resolution and
//! inserting implicit conversions.
//!
//! Grounded on `original_source/lib/comp/sem/*Expression.cpp`'s per-node
//! `analyze` methods, collapsed into one `match` per §9's redesign note.

use crate::{
    ast,
    diagnostics::{DiagnosticId, DiagnosticSink, SourceSpan, report},
    scope::ScopeStack,
    semantic_ir::{Expr, ExprKind, LValue, ResolvedSymbol, Stmt, StmtKind},
    symbols::Symbol,
    types::{BinOpKind, BuiltinType, OverloadFail, Type},
    world::World,
};

/// Per-declaration analysis context: owns the live scope chain and a
/// handle to whatever constant-cycle check is in effect (empty outside
/// constant-initializer analysis).
pub(crate) struct Analyzer<'a> {
    pub world: &'a mut World,
    pub sink: &'a mut dyn DiagnosticSink,
    pub scopes: ScopeStack,
    pub resolving_constants: &'a ahash::AHashSet<crate::symbols::GlobalVariableId>,
}

impl<'a> Analyzer<'a> {
    pub(crate) fn new(world: &'a mut World, sink: &'a mut dyn DiagnosticSink, resolving_constants: &'a ahash::AHashSet<crate::symbols::GlobalVariableId>) -> Self {
        Self { world, sink, scopes: ScopeStack::new(), resolving_constants }
    }

    fn error_expr(&self, span: SourceSpan) -> Expr {
        Expr { kind: ExprKind::ConstNothing, ty: Type::Builtin(BuiltinType::Error), span }
    }

    fn implicit_convert(&mut self, expr: Expr, target: Type) -> Expr {
        if expr.ty == target {
            return expr;
        }
        match self.world.types.find_conversion(expr.ty, target) {
            crate::types::ConversionLookup::Identity => expr,
            crate::types::ConversionLookup::Found(conversion) => {
                let span = expr.span;
                Expr { kind: ExprKind::Convert { conversion, inner: Box::new(expr) }, ty: target, span }
            }
            crate::types::ConversionLookup::NoPath => {
                let span = expr.span;
                report(self.sink, DiagnosticId::SemaNoImplicitConversion, span)
                    .arg(type_name(self.world, expr.ty))
                    .arg(type_name(self.world, target))
                    .emit();
                self.error_expr(span)
            }
        }
    }

    fn convert_to_bool(&mut self, expr: Expr) -> Expr {
        self.implicit_convert(expr, Type::Builtin(BuiltinType::Bool))
    }

    pub(crate) fn analyze_expr(&mut self, expr: &ast::Expr) -> Expr {
        let span = expr.span;
        match &expr.kind {
            ast::ExprKind::Literal(lit) => self.analyze_literal(lit, span),
            ast::ExprKind::Identifier(name) => self.analyze_identifier(*name, span),
            ast::ExprKind::Unary { op, operand } => self.analyze_unary(*op, operand, span),
            ast::ExprKind::Binary { op, left, right } => self.analyze_binary(*op, left, right, span),
            ast::ExprKind::Assign { target, value } => self.analyze_assign(target, value, span),
            ast::ExprKind::LogicalAnd(left, right) => self.analyze_logical_and(left, right, span),
            ast::ExprKind::LogicalOr(left, right) => self.analyze_logical_or(left, right, span),
            ast::ExprKind::Ternary { cond, then_branch, else_branch } => self.analyze_ternary(cond, then_branch, else_branch, span),
            ast::ExprKind::VarDecl { name, declared_type, init } => self.analyze_var_decl(*name, declared_type.as_ref(), init.as_deref(), span),
            ast::ExprKind::Call { callee, args } => self.analyze_call(*callee, args, span),
        }
    }

    fn analyze_literal(&mut self, lit: &ast::Literal, span: SourceSpan) -> Expr {
        match lit {
            ast::Literal::Int(v) => Expr { kind: ExprKind::ConstInt(*v), ty: Type::Builtin(BuiltinType::Int), span },
            ast::Literal::Str(s) => Expr { kind: ExprKind::ConstString(*s), ty: Type::Builtin(BuiltinType::String), span },
            ast::Literal::Bool(b) => Expr { kind: ExprKind::ConstBool(*b), ty: Type::Builtin(BuiltinType::Bool), span },
            ast::Literal::Nothing => Expr { kind: ExprKind::ConstNothing, ty: Type::Builtin(BuiltinType::Nothing), span },
        }
    }

    fn analyze_identifier(&mut self, name: crate::intern::StringId, span: SourceSpan) -> Expr {
        match self.scopes.resolve_symbol(self.world, name) {
            Some(Symbol::Local(local)) => {
                let function = self.scopes.current_function();
                let ty = self.world.function(function).local(local).ty;
                Expr { kind: ExprKind::Symbol(ResolvedSymbol::Symbol(Symbol::Local(local))), ty, span }
            }
            Some(Symbol::Global(global)) => {
                if self.resolving_constants.contains(&global) {
                    report(self.sink, DiagnosticId::SemaConstantInitializerCycle, span)
                        .arg(self.world.strings.resolve(name).to_owned())
                        .emit();
                    return self.error_expr(span);
                }
                let ty = self.world.global(global).ty;
                Expr { kind: ExprKind::Symbol(ResolvedSymbol::Symbol(Symbol::Global(global))), ty, span }
            }
            Some(Symbol::FunctionGroup(_) | Symbol::Class(_)) => {
                // Neither is a value expression on its own in this
                // language (no first-class functions, no class literals);
                // surfaced as `Error` rather than inventing a value.
                report(self.sink, DiagnosticId::SemaUnresolvedSymbol, span).arg(self.world.strings.resolve(name).to_owned()).emit();
                self.error_expr(span)
            }
            None => {
                report(self.sink, DiagnosticId::SemaUnresolvedSymbol, span).arg(self.world.strings.resolve(name).to_owned()).emit();
                self.error_expr(span)
            }
        }
    }

    /// There is no unary-operator table in this language's type registry
    /// (§3.1 only specifies binary operators and conversions); the two
    /// unary forms are resolved directly against the one built-in type
    /// each targets, mirroring the absence of a parallel registry in the
    /// original implementation rather than inventing one.
    fn analyze_unary(&mut self, op: ast::UnaryOp, operand: &ast::Expr, span: SourceSpan) -> Expr {
        let operand = self.analyze_expr(operand);
        if matches!(operand.ty, Type::Builtin(BuiltinType::Error)) {
            return self.error_expr(span);
        }
        let (target, function): (Type, &'static str) = match op {
            ast::UnaryOp::Neg => (Type::Builtin(BuiltinType::Int), "glint_neg_int"),
            ast::UnaryOp::Not => (Type::Builtin(BuiltinType::Bool), "glint_not_bool"),
        };
        let operand = self.implicit_convert(operand, target);
        if matches!(operand.ty, Type::Builtin(BuiltinType::Error)) {
            return self.error_expr(span);
        }
        Expr {
            kind: ExprKind::UnaryOp { function: crate::types::RuntimeFn(function), can_throw: false, operand: Box::new(operand) },
            ty: target,
            span,
        }
    }

    fn analyze_binary(&mut self, op: crate::types::BinOpKind, left: &ast::Expr, right: &ast::Expr, span: SourceSpan) -> Expr {
        let left = self.analyze_expr(left);
        let right = self.analyze_expr(right);
        if matches!(left.ty, Type::Builtin(BuiltinType::Error)) || matches!(right.ty, Type::Builtin(BuiltinType::Error)) {
            return self.error_expr(span);
        }
        match self.world.types.find_binary_operator(op, left.ty, right.ty) {
            Ok(resolved) => {
                let left = self.implicit_convert(left, resolved.left);
                let right = self.implicit_convert(right, resolved.right);
                Expr { kind: ExprKind::BinaryOp { op: resolved, left: Box::new(left), right: Box::new(right) }, ty: resolved.result_type, span }
            }
            Err(OverloadFail::NoMatch) => {
                report(self.sink, DiagnosticId::SemaNoMatchingOverload, span).arg(operator_name(op)).emit();
                self.error_expr(span)
            }
            Err(OverloadFail::Ambiguous) => {
                report(self.sink, DiagnosticId::SemaAmbiguousOverload, span).arg(operator_name(op)).emit();
                self.error_expr(span)
            }
        }
    }

    fn analyze_assign(&mut self, target: &ast::Expr, value: &ast::Expr, span: SourceSpan) -> Expr {
        let lvalue = match self.resolve_lvalue(target) {
            Some((lvalue, ty)) => (lvalue, ty),
            None => {
                report(self.sink, DiagnosticId::SemaInvalidLValue, target.span).emit();
                return self.error_expr(span);
            }
        };
        let (lvalue, ty) = lvalue;
        let value = self.analyze_expr(value);
        let value = self.implicit_convert(value, ty);
        Expr { kind: ExprKind::Assign { target: lvalue, value: Box::new(value) }, ty, span }
    }

    fn resolve_lvalue(&mut self, target: &ast::Expr) -> Option<(LValue, Type)> {
        let ast::ExprKind::Identifier(name) = &target.kind else { return None };
        match self.scopes.resolve_symbol(self.world, *name) {
            Some(Symbol::Local(local)) => {
                let function = self.scopes.current_function();
                Some((LValue::Local(local), self.world.function(function).local(local).ty))
            }
            Some(Symbol::Global(global)) if !self.world.global(global).is_constant => Some((LValue::Global(global), self.world.global(global).ty)),
            _ => None,
        }
    }

    fn analyze_logical_and(&mut self, left: &ast::Expr, right: &ast::Expr, span: SourceSpan) -> Expr {
        // `a && b` => `if a { b } else { false }` (§4.4: short-circuit is
        // structural).
        let left = self.analyze_expr(left);
        let left = self.convert_to_bool(left);
        let right = self.analyze_expr(right);
        let right = self.convert_to_bool(right);
        let else_branch = Expr { kind: ExprKind::ConstBool(false), ty: Type::Builtin(BuiltinType::Bool), span };
        Expr {
            kind: ExprKind::If { cond: Box::new(left), then_branch: Box::new(right), else_branch: Box::new(else_branch) },
            ty: Type::Builtin(BuiltinType::Bool),
            span,
        }
    }

    fn analyze_logical_or(&mut self, left: &ast::Expr, right: &ast::Expr, span: SourceSpan) -> Expr {
        // `a || b` => `if a { true } else { b }`.
        let left = self.analyze_expr(left);
        let left = self.convert_to_bool(left);
        let right = self.analyze_expr(right);
        let right = self.convert_to_bool(right);
        let then_branch = Expr { kind: ExprKind::ConstBool(true), ty: Type::Builtin(BuiltinType::Bool), span };
        Expr {
            kind: ExprKind::If { cond: Box::new(left), then_branch: Box::new(then_branch), else_branch: Box::new(right) },
            ty: Type::Builtin(BuiltinType::Bool),
            span,
        }
    }

    fn analyze_ternary(&mut self, cond: &ast::Expr, then_branch: &ast::Expr, else_branch: &ast::Expr, span: SourceSpan) -> Expr {
        let cond = self.analyze_expr(cond);
        let cond = self.convert_to_bool(cond);
        let then_branch = self.analyze_expr(then_branch);
        let else_branch = self.analyze_expr(else_branch);
        // Both arms must agree on type; the `then` arm's type wins and
        // the `else` arm is implicitly converted to it (no separate
        // "common type" search is specified — §4.1's conversion table is
        // reused directly).
        let ty = then_branch.ty;
        let else_branch = self.implicit_convert(else_branch, ty);
        Expr { kind: ExprKind::If { cond: Box::new(cond), then_branch: Box::new(then_branch), else_branch: Box::new(else_branch) }, ty, span }
    }

    fn analyze_var_decl(&mut self, name: crate::intern::StringId, declared_type: Option<&ast::TypeRef>, init: Option<&ast::Expr>, span: SourceSpan) -> Expr {
        let init = init.map(|e| self.analyze_expr(e));
        let ty = match declared_type {
            Some(type_ref) => self.scopes.resolve_type(self.world, self.sink, type_ref),
            None => init.as_ref().map_or(Type::Builtin(BuiltinType::Any), |e| e.ty),
        };
        let init = init.map(|e| self.implicit_convert(e, ty));
        let local = self.scopes.declare_local(self.world, self.sink, name, span, ty);
        Expr { kind: ExprKind::VarDecl { local, init: init.map(Box::new) }, ty, span }
    }

    fn analyze_call(&mut self, callee: crate::intern::StringId, args: &[ast::Expr], span: SourceSpan) -> Expr {
        let args: Vec<Expr> = args.iter().map(|a| self.analyze_expr(a)).collect();
        let Some(Symbol::FunctionGroup(group)) = self.scopes.resolve_symbol(self.world, callee) else {
            report(self.sink, DiagnosticId::SemaUnresolvedSymbol, span).arg(self.world.strings.resolve(callee).to_owned()).emit();
            return self.error_expr(span);
        };
        match resolve_overload(self.world, group, &args) {
            Ok(function) => {
                let param_types = self.world.function(function).param_types.clone();
                let return_type = self.world.function(function).return_type;
                let args = args.into_iter().zip(param_types).map(|(arg, pt)| self.implicit_convert(arg, pt)).collect();
                Expr { kind: ExprKind::Call { function, args }, ty: return_type, span }
            }
            Err(OverloadFail::NoMatch) => {
                report(self.sink, DiagnosticId::SemaNoMatchingOverload, span).arg(self.world.strings.resolve(callee).to_owned()).emit();
                self.error_expr(span)
            }
            Err(OverloadFail::Ambiguous) => {
                report(self.sink, DiagnosticId::SemaAmbiguousOverload, span).arg(self.world.strings.resolve(callee).to_owned()).emit();
                self.error_expr(span)
            }
        }
    }

    pub(crate) fn analyze_stmt(&mut self, stmt: &ast::Stmt) -> Stmt {
        let span = stmt.span;
        let kind = match &stmt.kind {
            ast::StmtKind::Expr(e) => StmtKind::Expr(self.analyze_expr(e)),
            ast::StmtKind::If { cond, then_branch, else_branch } => {
                let cond = self.analyze_expr(cond);
                let cond = self.convert_to_bool(cond);
                let then_branch = self.analyze_block(then_branch);
                let else_branch = else_branch.as_ref().map(|b| self.analyze_block(b));
                StmtKind::If { cond, then_branch, else_branch }
            }
            ast::StmtKind::Try { try_body, catch_var, catch_body } => {
                let try_body = self.analyze_block(try_body);
                self.scopes.push_block();
                let catch_local = catch_var.map(|name| {
                    self.scopes.declare_local(self.world, self.sink, name, span, Type::Builtin(BuiltinType::Any))
                });
                let catch_body = catch_body.iter().map(|s| self.analyze_stmt(s)).collect();
                self.scopes.pop_block();
                StmtKind::Try { try_body, catch_local, catch_body }
            }
            ast::StmtKind::Return(expr) => {
                let function = self.scopes.current_function();
                let return_type = self.world.function(function).return_type;
                match expr {
                    Some(e) => {
                        if return_type == Type::Builtin(BuiltinType::Nothing) {
                            report(self.sink, DiagnosticId::SemaReturnValueNotExpected, span).emit();
                        }
                        let e = self.analyze_expr(e);
                        let e = self.implicit_convert(e, return_type);
                        StmtKind::Return(Some(e))
                    }
                    None => {
                        if return_type != Type::Builtin(BuiltinType::Nothing) {
                            report(self.sink, DiagnosticId::SemaReturnValueExpected, span).emit();
                        }
                        StmtKind::Return(None)
                    }
                }
            }
            ast::StmtKind::Compound(stmts) => StmtKind::Compound(self.analyze_block(stmts)),
        };
        Stmt { kind, span }
    }

    fn analyze_block(&mut self, stmts: &[ast::Stmt]) -> Vec<Stmt> {
        self.scopes.push_block();
        let lowered = stmts.iter().map(|s| self.analyze_stmt(s)).collect();
        self.scopes.pop_block();
        lowered
    }
}

/// Analyzes one resolved overload's parameter list and body (§4.2,
/// §4.4): pushes the `Namespace -> Function -> Block` scope chain,
/// declares each parameter as a local in order (so their [`LocalId`]s
/// land contiguously at the front, per (I2)), then lowers the body.
/// Returns the lowered body alongside the parameter locals, since the IR
/// builder needs both to emit each parameter's entry-lifetime bookkeeping
/// (§4.5.4).
pub(crate) fn analyze_function_body(
    world: &mut World,
    sink: &mut dyn DiagnosticSink,
    resolving_constants: &ahash::AHashSet<crate::symbols::GlobalVariableId>,
    owner: crate::symbols::NamespaceId,
    function: crate::symbols::FunctionId,
    params: &[ast::Param],
    body: &[ast::Stmt],
) -> (crate::semantic_ir::Body, Vec<crate::symbols::LocalId>) {
    let mut analyzer = Analyzer::new(world, sink, resolving_constants);
    analyzer.scopes.push_namespace(owner);
    analyzer.scopes.push_function(function);
    analyzer.scopes.push_block();
    let param_types = analyzer.world.function(function).param_types.clone();
    let mut param_locals = Vec::with_capacity(params.len());
    for (param, ty) in params.iter().zip(param_types) {
        let local = analyzer.scopes.declare_local(analyzer.world, analyzer.sink, param.name, param.span, ty);
        param_locals.push(local);
    }
    let statements = body.iter().map(|s| analyzer.analyze_stmt(s)).collect();
    analyzer.scopes.pop_block();
    analyzer.scopes.pop_function();
    analyzer.scopes.pop_namespace();
    (crate::semantic_ir::Body { statements }, param_locals)
}

/// Analyzes a global variable or constant initializer (§4.3's worklist
/// entry into pass 1 for globals, which have no function scope of their
/// own). `target` is `Some` for a declared-type global — the result is
/// implicitly converted to it — and `None` for a constant, whose type is
/// whatever the initializer produces.
pub(crate) fn analyze_global_init(
    world: &mut World,
    sink: &mut dyn DiagnosticSink,
    resolving_constants: &ahash::AHashSet<crate::symbols::GlobalVariableId>,
    owner: crate::symbols::NamespaceId,
    target: Option<Type>,
    init: &ast::Expr,
) -> crate::semantic_ir::Expr {
    let mut analyzer = Analyzer::new(world, sink, resolving_constants);
    analyzer.scopes.push_namespace(owner);
    let mut expr = analyzer.analyze_expr(init);
    if let Some(target) = target {
        expr = analyzer.implicit_convert(expr, target);
    }
    analyzer.scopes.pop_namespace();
    expr
}

/// Selects the overload in `group` matching `args` by the same
/// conversion-count/softness tie-breaking §4.1 specifies for binary
/// operators (SPEC_FULL.md: ties beyond those rules are ambiguous).
fn resolve_overload(world: &World, group: crate::symbols::FunctionGroupId, args: &[Expr]) -> Result<crate::symbols::FunctionId, OverloadFail> {
    let mut best: Option<(crate::symbols::FunctionId, u32, u32)> = None;
    let mut tied = false;
    for &candidate in &world.function_group(group).overloads {
        let f = world.function(candidate);
        if f.param_types.len() != args.len() {
            continue;
        }
        let mut conversions = 0u32;
        let mut softness = 0u32;
        let mut matches = true;
        for (arg, &param_ty) in args.iter().zip(&f.param_types) {
            match world.types.find_conversion(arg.ty, param_ty) {
                crate::types::ConversionLookup::Identity => {}
                crate::types::ConversionLookup::Found(_) => {
                    conversions += 1;
                    if is_soft_builtin(param_ty) {
                        softness += 1;
                    }
                }
                crate::types::ConversionLookup::NoPath => {
                    matches = false;
                    break;
                }
            }
        }
        if !matches {
            continue;
        }
        match &best {
            None => {
                best = Some((candidate, conversions, softness));
                tied = false;
            }
            Some((_, bc, bs)) => match (conversions.cmp(bc), softness.cmp(bs)) {
                (std::cmp::Ordering::Less, _) | (std::cmp::Ordering::Equal, std::cmp::Ordering::Less) => {
                    best = Some((candidate, conversions, softness));
                    tied = false;
                }
                (std::cmp::Ordering::Equal, std::cmp::Ordering::Equal) => tied = true,
                _ => {}
            },
        }
    }
    match best {
        None => Err(OverloadFail::NoMatch),
        Some(_) if tied => Err(OverloadFail::Ambiguous),
        Some((f, ..)) => Ok(f),
    }
}

fn is_soft_builtin(ty: Type) -> bool {
    matches!(ty, Type::Builtin(BuiltinType::SoftBool | BuiltinType::SoftInt | BuiltinType::SoftString))
}

fn operator_name(op: BinOpKind) -> &'static str {
    match op {
        BinOpKind::Add => "+",
        BinOpKind::Sub => "-",
        BinOpKind::Mul => "*",
        BinOpKind::Div => "/",
        BinOpKind::Eq => "==",
        BinOpKind::Ne => "!=",
        BinOpKind::Lt => "<",
    }
}

fn type_name(world: &World, ty: Type) -> String {
    match ty {
        Type::Builtin(b) => b.display_name().to_owned(),
        Type::Class(c) | Type::ClassOpt(c) => world.strings.resolve(world.types.class_name(c)).to_owned(),
    }
}
