//! The IR builder (§4.5) — the hard core. Walks the semantic IR and
//! produces code IR: basic blocks, write-once temps, and a cleanup stack
//! that turns structured exception unwinding into explicit landing-pad
//! blocks (§4.5.2).
//!
//! Grounded on `original_source/lib/comp/sem/Builder.cpp` and
//! `include/qore/comp/sem/Builder.h`: mutable builder state (current
//! block, free-temp pool, cleanup stack, landing-pad cache) modeled as
//! one struct threaded by `&mut self` through every lowering method, per
//! §9's redesign note — no hidden globals.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::{
    code_ir::{BlockId, CodeBody, Instruction, Temp, Terminator},
    semantic_ir::{self, ExprKind, LValue, ResolvedSymbol, StmtKind},
    symbols::{FunctionId, GlobalVariableId, LocalId, Symbol},
    types::{BinaryOp, BuiltinType, Type},
    world::World,
};

/// One live, unwind-sensitive resource (§4.5.2). `Copy + Eq + Hash` so a
/// whole stack snapshot can key the landing-pad cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CleanupEntry {
    RefCountedTemp(Temp),
    Local(LocalId),
    GlobalReadLock(GlobalVariableId),
    GlobalWriteLock(GlobalVariableId),
    /// Unwinding that reaches this entry transfers to `catch_block` after
    /// releasing everything above it; entries below stay untouched unless
    /// the catch body itself unwinds.
    TryStatement(BlockId),
}

struct Builder<'a> {
    world: &'a mut World,
    body: CodeBody,
    current: BlockId,
    next_temp: u32,
    free_temps: SmallVec<[Temp; 8]>,
    cleanup: Vec<CleanupEntry>,
    /// Keyed by the full cleanup-stack snapshot at the point a pad was
    /// requested. §4.5.2 describes the cache as keyed by "cleanup-stack
    /// prefixes"; keying on the complete stack is a safe specialization
    /// (strictly fewer shares, never a wrong one) recorded in the design
    /// ledger rather than the literal prefix scheme.
    lpad_cache: AHashMap<Vec<CleanupEntry>, BlockId>,
}

impl<'a> Builder<'a> {
    fn new(world: &'a mut World) -> Self {
        let mut body = CodeBody::new();
        let entry = body.create_block();
        Self { world, body, current: entry, next_temp: 0, free_temps: SmallVec::new(), cleanup: Vec::new(), lpad_cache: AHashMap::new() }
    }

    fn temp(&mut self) -> Temp {
        if let Some(t) = self.free_temps.pop() {
            return t;
        }
        let t = Temp::new(self.next_temp);
        self.next_temp += 1;
        t
    }

    fn free_temp(&mut self, t: Temp) {
        self.free_temps.push(t);
    }

    fn emit(&mut self, instruction: Instruction) {
        self.body.push(self.current, instruction);
    }

    fn is_terminated(&self) -> bool {
        self.body.is_terminated(self.current)
    }

    /// Pops the cleanup entry owning `temp`'s refcount if it is on top —
    /// the discipline this builder follows throughout is that a temp's
    /// cleanup entry is popped by whoever consumes the temp next, and it
    /// is always on top when that happens.
    fn consume(&mut self, temp: Temp) {
        if matches!(self.cleanup.last(), Some(CleanupEntry::RefCountedTemp(t)) if *t == temp) {
            self.cleanup.pop();
        }
    }

    fn push_cleanup_if_ref_counted(&mut self, temp: Temp, ty: Type) {
        if is_ref_counted(ty) {
            self.cleanup.push(CleanupEntry::RefCountedTemp(temp));
        }
    }

    /// Returns a landing pad for the cleanup stack as it stands right
    /// now (§4.5.2): reused from cache, or synthesized by walking the
    /// stack in reverse.
    fn landing_pad(&mut self) -> BlockId {
        if let Some(&cached) = self.lpad_cache.get(&self.cleanup) {
            return cached;
        }
        let pad = self.body.create_block();
        let saved = self.current;
        self.current = pad;
        for entry in self.cleanup.clone().into_iter().rev() {
            match entry {
                CleanupEntry::RefCountedTemp(t) => self.emit(Instruction::RefDecNoexcept { temp: t }),
                CleanupEntry::Local(lv) => {
                    let t = self.temp();
                    self.emit(Instruction::LocalGet { dest: t, local: lv });
                    self.emit(Instruction::RefDecNoexcept { temp: t });
                    self.free_temp(t);
                }
                CleanupEntry::GlobalReadLock(gv) => self.emit(Instruction::GlobalReadUnlock { global: gv }),
                CleanupEntry::GlobalWriteLock(gv) => self.emit(Instruction::GlobalWriteUnlock { global: gv }),
                CleanupEntry::TryStatement(catch_block) => {
                    self.body.terminate(pad, Terminator::Jump(catch_block));
                    self.current = saved;
                    self.lpad_cache.insert(self.cleanup.clone(), pad);
                    return pad;
                }
            }
        }
        self.body.terminate(pad, Terminator::ResumeUnwind);
        self.current = saved;
        self.lpad_cache.insert(self.cleanup.clone(), pad);
        pad
    }

    fn maybe_lpad(&mut self, can_throw: bool) -> Option<BlockId> {
        if can_throw { Some(self.landing_pad()) } else { None }
    }

    // ---- §4.5.3 expression lowering -----------------------------------

    /// Lowers `expr`, letting the root instruction write into `target`
    /// when given one instead of a fresh temp. Used by the value-`If`
    /// lowering so both arms deposit their result into the same `Temp`
    /// id — legal here since a temp only needs to be written exactly
    /// once along any single acyclic path (§3.4), not globally once.
    fn lower_expr_to(&mut self, expr: &semantic_ir::Expr, target: Option<Temp>) -> Temp {
        match &expr.kind {
            ExprKind::ConstInt(v) => {
                let t = target.unwrap_or_else(|| self.temp());
                self.emit(Instruction::ConstInt { dest: t, value: *v });
                t
            }
            ExprKind::ConstString(s) => {
                let t = target.unwrap_or_else(|| self.temp());
                self.emit(Instruction::ConstString { dest: t, value: *s });
                self.push_cleanup_if_ref_counted(t, expr.ty);
                t
            }
            // `Bool` shares `Int`'s primitive slot (§3.2); no dedicated
            // opcode, so a bool literal still lowers through `ConstInt`.
            ExprKind::ConstBool(b) => {
                let t = target.unwrap_or_else(|| self.temp());
                self.emit(Instruction::ConstInt { dest: t, value: i64::from(*b) });
                t
            }
            ExprKind::ConstNothing => {
                let t = target.unwrap_or_else(|| self.temp());
                self.emit(Instruction::ConstNothing { dest: t });
                t
            }
            ExprKind::Symbol(ResolvedSymbol::Symbol(Symbol::Local(local))) => self.lower_local_get(*local, expr.ty, target),
            ExprKind::Symbol(ResolvedSymbol::Symbol(Symbol::Global(global))) => self.lower_global_get(*global, expr.ty, target),
            ExprKind::Symbol(_) => {
                let t = target.unwrap_or_else(|| self.temp());
                self.emit(Instruction::ConstNothing { dest: t });
                t
            }
            ExprKind::UnaryOp { function, can_throw, operand } => {
                let arg = self.lower_expr(operand);
                self.consume(arg);
                let conv = crate::types::Conversion { from: operand.ty, to: expr.ty, function: *function, can_throw: *can_throw };
                let lpad = self.maybe_lpad(*can_throw);
                let d = target.unwrap_or_else(|| self.temp());
                self.emit(Instruction::InvokeConversion { dest: d, conv, arg, lpad });
                self.free_temp(arg);
                self.push_cleanup_if_ref_counted(d, expr.ty);
                d
            }
            ExprKind::BinaryOp { op, left, right } => self.lower_binary_op(*op, left, right, expr.ty, target),
            ExprKind::Convert { conversion, inner } => {
                let arg = self.lower_expr(inner);
                self.consume(arg);
                let lpad = self.maybe_lpad(conversion.can_throw);
                let d = target.unwrap_or_else(|| self.temp());
                self.emit(Instruction::InvokeConversion { dest: d, conv: *conversion, arg, lpad });
                self.free_temp(arg);
                self.push_cleanup_if_ref_counted(d, expr.ty);
                d
            }
            ExprKind::Assign { target: lvalue, value } => self.lower_assign(*lvalue, value),
            ExprKind::If { cond, then_branch, else_branch } => self.lower_value_if(cond, then_branch, else_branch, expr.ty),
            ExprKind::VarDecl { local, init } => self.lower_var_decl(*local, init.as_deref(), expr.ty),
            ExprKind::Call { function, args } => self.lower_call(*function, args, expr.ty),
        }
    }

    fn lower_expr(&mut self, expr: &semantic_ir::Expr) -> Temp {
        self.lower_expr_to(expr, None)
    }

    fn lower_local_get(&mut self, local: LocalId, ty: Type, target: Option<Temp>) -> Temp {
        let t = target.unwrap_or_else(|| self.temp());
        self.emit(Instruction::LocalGet { dest: t, local });
        if is_ref_counted(ty) {
            self.emit(Instruction::RefInc { temp: t });
            self.cleanup.push(CleanupEntry::RefCountedTemp(t));
        }
        t
    }

    fn lower_global_get(&mut self, global: GlobalVariableId, ty: Type, target: Option<Temp>) -> Temp {
        self.emit(Instruction::GlobalReadLock { global });
        self.cleanup.push(CleanupEntry::GlobalReadLock(global));
        let t = target.unwrap_or_else(|| self.temp());
        self.emit(Instruction::GlobalGet { dest: t, global });
        if is_ref_counted(ty) {
            self.emit(Instruction::RefInc { temp: t });
        }
        self.emit(Instruction::GlobalReadUnlock { global });
        assert_eq!(self.cleanup.pop(), Some(CleanupEntry::GlobalReadLock(global)));
        self.push_cleanup_if_ref_counted(t, ty);
        t
    }

    fn lower_binary_op(&mut self, op: BinaryOp, left: &semantic_ir::Expr, right: &semantic_ir::Expr, result_ty: Type, target: Option<Temp>) -> Temp {
        let l = self.lower_expr(left);
        let r = self.lower_expr(right);
        let lpad = self.maybe_lpad(op.can_throw);
        let dest = target.unwrap_or_else(|| self.temp());
        self.emit(Instruction::InvokeBinaryOperator { dest, op, left: l, right: r, lpad });
        self.consume(r);
        self.free_temp(r);
        self.consume(l);
        self.free_temp(l);
        self.push_cleanup_if_ref_counted(dest, result_ty);
        dest
    }

    /// Assignment to a local or global (§4.5.3): the new value replaces
    /// whatever the slot held, and the old (reference-counted) value is
    /// released afterward, its own potential `RefDec` throw covered by a
    /// landing pad built from the state that holds once the new value is
    /// already in place (so an unwind from here still releases it too).
    /// The returned temp is the expression's value as an assignment;
    /// since the slot keeps its own ownership, this gets an independent
    /// `RefInc`'d copy rather than aliasing the slot's reference.
    fn lower_assign(&mut self, target: LValue, value: &semantic_ir::Expr) -> Temp {
        let refcounted = is_ref_counted(value.ty);
        match target {
            LValue::Local(lv) => {
                let rhs = self.lower_expr(value);
                if refcounted {
                    let old = self.temp();
                    self.emit(Instruction::LocalGet { dest: old, local: lv });
                    self.emit(Instruction::LocalSet { local: lv, src: rhs });
                    self.consume(rhs);
                    let lpad = self.maybe_lpad(true);
                    self.emit(Instruction::RefDec { temp: old, lpad });
                    self.free_temp(old);
                    self.emit(Instruction::RefInc { temp: rhs });
                    self.cleanup.push(CleanupEntry::RefCountedTemp(rhs));
                } else {
                    self.emit(Instruction::LocalSet { local: lv, src: rhs });
                }
                rhs
            }
            LValue::Global(gv) => {
                self.emit(Instruction::GlobalWriteLock { global: gv });
                self.cleanup.push(CleanupEntry::GlobalWriteLock(gv));
                let rhs = self.lower_expr(value);
                let old = self.temp();
                self.emit(Instruction::GlobalGet { dest: old, global: gv });
                self.emit(Instruction::GlobalSet { global: gv, src: rhs });
                self.consume(rhs);
                self.emit(Instruction::GlobalWriteUnlock { global: gv });
                assert_eq!(self.cleanup.pop(), Some(CleanupEntry::GlobalWriteLock(gv)));
                if refcounted {
                    let lpad = self.maybe_lpad(true);
                    self.emit(Instruction::RefDec { temp: old, lpad });
                    self.emit(Instruction::RefInc { temp: rhs });
                    self.cleanup.push(CleanupEntry::RefCountedTemp(rhs));
                }
                self.free_temp(old);
                rhs
            }
        }
    }

    /// Value-producing `If` (the structural lowering target of `&&`,
    /// `||`, `?:`, §4.4): each arm lowers its own subtree but both write
    /// into the same `result` temp, so code after the merge point can
    /// reference one stable value regardless of which arm ran.
    fn lower_value_if(&mut self, cond: &semantic_ir::Expr, then_branch: &semantic_ir::Expr, else_branch: &semantic_ir::Expr, ty: Type) -> Temp {
        let cond_temp = self.lower_expr(cond);
        self.consume(cond_temp);
        let then_block = self.body.create_block();
        let else_block = self.body.create_block();
        let cont_block = self.body.create_block();
        self.body.terminate(self.current, Terminator::Branch { cond: cond_temp, then_block, else_block });
        self.free_temp(cond_temp);

        let result = self.temp();

        self.current = then_block;
        let produced = self.lower_expr_to(then_branch, Some(result));
        debug_assert_eq!(produced, result);
        if !self.is_terminated() {
            self.body.terminate(then_block, Terminator::Jump(cont_block));
        }

        self.current = else_block;
        let produced = self.lower_expr_to(else_branch, Some(result));
        debug_assert_eq!(produced, result);
        if !self.is_terminated() {
            self.body.terminate(else_block, Terminator::Jump(cont_block));
        }

        self.current = cont_block;
        self.push_cleanup_if_ref_counted(result, ty);
        result
    }

    /// `my x = init` (§4.5.4 "entering a local's lifetime"): the slot was
    /// already allocated during analysis; this stores the initial value
    /// and, for a reference-counted type, transfers the initializer's own
    /// ownership to the local's `Local(lv)` cleanup entry rather than
    /// adding a redundant `RefInc` (the initializer is a freshly produced
    /// value here, not a borrowed one).
    fn lower_var_decl(&mut self, local: LocalId, init: Option<&semantic_ir::Expr>, ty: Type) -> Temp {
        match init {
            Some(init_expr) => {
                let t = self.lower_expr(init_expr);
                self.emit(Instruction::LocalSet { local, src: t });
                self.consume(t);
                if is_ref_counted(ty) {
                    self.cleanup.push(CleanupEntry::Local(local));
                }
                t
            }
            None => {
                let t = self.temp();
                self.emit(Instruction::ConstNothing { dest: t });
                self.emit(Instruction::LocalSet { local, src: t });
                t
            }
        }
    }

    /// Arguments are passed "borrowed" (§4.6: `InvokeFunction` docs) — the
    /// callee does not take ownership — so after the call this releases
    /// each reference-counted argument itself, the same as any other
    /// point where a produced temp is consumed.
    fn lower_call(&mut self, function: FunctionId, args: &[semantic_ir::Expr], ty: Type) -> Temp {
        let arg_temps: Vec<Temp> = args.iter().map(|a| self.lower_expr(a)).collect();
        let lpad = self.landing_pad();
        let is_void = ty == Type::Builtin(BuiltinType::Nothing);
        let dest = if is_void { None } else { Some(self.temp()) };
        self.emit(Instruction::InvokeFunction { dest, function, args: arg_temps.clone(), lpad: Some(lpad) });
        for (arg, t) in args.iter().zip(arg_temps) {
            if is_ref_counted(arg.ty) {
                self.consume(t);
                let arg_lpad = self.landing_pad();
                self.emit(Instruction::RefDec { temp: t, lpad: Some(arg_lpad) });
            }
            self.free_temp(t);
        }
        match dest {
            Some(d) => {
                self.push_cleanup_if_ref_counted(d, ty);
                d
            }
            None => {
                let t = self.temp();
                self.emit(Instruction::ConstNothing { dest: t });
                t
            }
        }
    }

    // ---- §4.5.3 / §4.5.4 statement lowering ---------------------------

    fn lower_stmt(&mut self, stmt: &semantic_ir::Stmt) {
        if self.is_terminated() {
            return;
        }
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                let t = self.lower_expr(expr);
                self.consume(t);
                self.free_temp(t);
            }
            StmtKind::If { cond, then_branch, else_branch } => self.lower_if_stmt(cond, then_branch, else_branch.as_deref()),
            StmtKind::Try { try_body, catch_local, catch_body } => self.lower_try(try_body, *catch_local, catch_body),
            StmtKind::Return(expr) => self.lower_return(expr.as_ref()),
            StmtKind::Compound(stmts) => self.lower_compound(stmts),
        }
    }

    fn lower_if_stmt(&mut self, cond: &semantic_ir::Expr, then_branch: &[semantic_ir::Stmt], else_branch: Option<&[semantic_ir::Stmt]>) {
        let cond_temp = self.lower_expr(cond);
        self.consume(cond_temp);
        let then_block = self.body.create_block();
        let else_block = self.body.create_block();
        let cont_block = self.body.create_block();
        self.body.terminate(self.current, Terminator::Branch { cond: cond_temp, then_block, else_block });
        self.free_temp(cond_temp);

        self.current = then_block;
        for s in then_branch {
            self.lower_stmt(s);
        }
        if !self.is_terminated() {
            self.body.terminate(then_block, Terminator::Jump(cont_block));
        }

        self.current = else_block;
        if let Some(else_branch) = else_branch {
            for s in else_branch {
                self.lower_stmt(s);
            }
        }
        if !self.is_terminated() {
            self.body.terminate(else_block, Terminator::Jump(cont_block));
        }

        self.current = cont_block;
    }

    /// `try`/`catch` (§4.5.3): pushes a `TryStatement` cleanup entry so
    /// any throwing instruction in `try_body` builds a landing pad that
    /// jumps here once everything above this entry has been released.
    fn lower_try(&mut self, try_body: &[semantic_ir::Stmt], catch_local: Option<LocalId>, catch_body: &[semantic_ir::Stmt]) {
        let catch_block = self.body.create_block();
        let cont_block = self.body.create_block();
        self.cleanup.push(CleanupEntry::TryStatement(catch_block));
        for s in try_body {
            self.lower_stmt(s);
        }
        if !self.is_terminated() {
            self.body.terminate(self.current, Terminator::Jump(cont_block));
        }
        assert_eq!(self.cleanup.pop(), Some(CleanupEntry::TryStatement(catch_block)));

        self.current = catch_block;
        if let Some(local) = catch_local {
            let t = self.temp();
            self.emit(Instruction::ConstNothing { dest: t });
            self.emit(Instruction::LocalSet { local, src: t });
            self.free_temp(t);
        }
        for s in catch_body {
            self.lower_stmt(s);
        }
        if !self.is_terminated() {
            self.body.terminate(self.current, Terminator::Jump(cont_block));
        }

        self.current = cont_block;
    }

    fn lower_return(&mut self, expr: Option<&semantic_ir::Expr>) {
        match expr {
            Some(expr) => {
                let t = self.lower_expr(expr);
                // The returned value's own cleanup entry is intentionally
                // not released — ownership transfers to the caller
                // (§4.6: `Ret` "transfers the reference-counted value").
                self.consume(t);
                self.release_all_live_cleanups();
                self.body.terminate(self.current, Terminator::Ret(t));
            }
            None => {
                self.release_all_live_cleanups();
                self.body.terminate(self.current, Terminator::RetVoid);
            }
        }
    }

    /// Releases every remaining live local/lock on the normal-return
    /// path, in reverse order — the same shape landing-pad synthesis
    /// uses, but each `RefDec` still gets its own landing pad rather than
    /// being suppressed with `RefDecNoexcept`, since a `Ret` is still on
    /// a throwing path until every local is actually released.
    fn release_all_live_cleanups(&mut self) {
        while let Some(entry) = self.cleanup.last().copied() {
            match entry {
                CleanupEntry::Local(lv) => {
                    let t = self.temp();
                    self.emit(Instruction::LocalGet { dest: t, local: lv });
                    self.cleanup.pop();
                    let lpad = self.landing_pad();
                    self.emit(Instruction::RefDec { temp: t, lpad: Some(lpad) });
                    self.free_temp(t);
                }
                CleanupEntry::GlobalReadLock(gv) => {
                    self.emit(Instruction::GlobalReadUnlock { global: gv });
                    self.cleanup.pop();
                }
                CleanupEntry::GlobalWriteLock(gv) => {
                    self.emit(Instruction::GlobalWriteUnlock { global: gv });
                    self.cleanup.pop();
                }
                CleanupEntry::RefCountedTemp(_) | CleanupEntry::TryStatement(_) => {
                    self.cleanup.pop();
                }
            }
        }
    }

    /// `CompoundStatement` (§4.5.3): releases every local declared within
    /// the block, in reverse declaration order, once control reaches the
    /// end of the block normally.
    fn lower_compound(&mut self, stmts: &[semantic_ir::Stmt]) {
        let marker = self.cleanup.len();
        for s in stmts {
            self.lower_stmt(s);
            if self.is_terminated() {
                break;
            }
        }
        if self.is_terminated() {
            self.cleanup.truncate(marker);
            return;
        }
        while self.cleanup.len() > marker {
            let entry = self.cleanup[self.cleanup.len() - 1];
            if let CleanupEntry::Local(lv) = entry {
                let t = self.temp();
                self.emit(Instruction::LocalGet { dest: t, local: lv });
                self.cleanup.pop();
                let lpad = self.landing_pad();
                self.emit(Instruction::RefDec { temp: t, lpad: Some(lpad) });
                self.free_temp(t);
            } else {
                self.cleanup.pop();
            }
        }
    }
}

fn is_ref_counted(ty: Type) -> bool {
    matches!(ty, Type::Builtin(b) if b.is_ref_counted()) || matches!(ty, Type::Class(_) | Type::ClassOpt(_))
}

/// Lowers one resolved function's body (§4.5). `param_locals` is the
/// list of already-declared parameter locals, in order; this only emits
/// their entry-lifetime bookkeeping (§4.5.4) — the values themselves are
/// assumed already placed into those slots by calling convention.
pub(crate) fn build_function_body(world: &mut World, function: FunctionId, param_locals: &[LocalId], body: &semantic_ir::Body) -> CodeBody {
    let mut builder = Builder::new(world);
    for &local in param_locals {
        let ty = builder.world.function(function).local(local).ty;
        if is_ref_counted(ty) {
            let t = builder.temp();
            builder.emit(Instruction::LocalGet { dest: t, local });
            builder.emit(Instruction::RefInc { temp: t });
            builder.free_temp(t);
            builder.cleanup.push(CleanupEntry::Local(local));
        }
    }
    for stmt in &body.statements {
        builder.lower_stmt(stmt);
    }
    if !builder.is_terminated() {
        builder.release_all_live_cleanups();
        let return_type = builder.world.function(function).return_type;
        if return_type == Type::Builtin(BuiltinType::Nothing) {
            builder.body.terminate(builder.current, Terminator::RetVoid);
        } else {
            let t = builder.temp();
            builder.emit(Instruction::ConstNothing { dest: t });
            builder.body.terminate(builder.current, Terminator::Ret(t));
        }
    }
    builder.world.function_mut(function).next_temp = builder.next_temp;
    builder.body
}

/// Builds the synthesized `qInit` (§6.2): one `GlobalInit` per global
/// with an initializer, in declaration order, bypassing the read/write
/// locks ordinary `GlobalGet`/`GlobalSet` require — this is a one-shot
/// setup, not concurrent access (§8 scenario 2).
pub(crate) fn build_qinit(world: &mut World, inits: &[(GlobalVariableId, semantic_ir::Expr)]) -> (CodeBody, u32) {
    let mut builder = Builder::new(world);
    for (global, expr) in inits {
        let t = builder.lower_expr(expr);
        builder.consume(t);
        builder.emit(Instruction::GlobalInit { global: *global, src: t });
        builder.free_temp(t);
    }
    if !builder.is_terminated() {
        builder.body.terminate(builder.current, Terminator::RetVoid);
    }
    (builder.body, builder.next_temp)
}

/// Builds the synthesized `qDone` (§6.2): releases every reference-
/// counted global, in reverse declaration order.
pub(crate) fn build_qdone(world: &mut World, globals_in_order: &[GlobalVariableId]) -> (CodeBody, u32) {
    let mut builder = Builder::new(world);
    for &global in globals_in_order.iter().rev() {
        let ty = builder.world.global(global).ty;
        if !is_ref_counted(ty) {
            continue;
        }
        builder.emit(Instruction::GlobalWriteLock { global });
        let old = builder.temp();
        builder.emit(Instruction::GlobalGet { dest: old, global });
        builder.emit(Instruction::GlobalWriteUnlock { global });
        let lpad = builder.landing_pad();
        builder.emit(Instruction::RefDec { temp: old, lpad: Some(lpad) });
        builder.free_temp(old);
    }
    if !builder.is_terminated() {
        builder.body.terminate(builder.current, Terminator::RetVoid);
    }
    (builder.body, builder.next_temp)
}

#[cfg(test)]
mod tests {
    use super::{build_function_body, build_qdone, build_qinit};
    use crate::{
        code_ir::{Instruction, Terminator},
        diagnostics::SourceSpan,
        semantic_ir::{Body, Expr, ExprKind, ResolvedSymbol, Stmt, StmtKind},
        symbols::{Function, GlobalVariable, Symbol},
        types::{BuiltinType, Type},
        world::World,
    };

    fn span() -> SourceSpan {
        SourceSpan::synthetic()
    }

    #[test]
    fn empty_int_function_returns_a_default_constant() {
        let mut world = World::new();
        let root = world.root_namespace();
        let name = world.intern("f");
        let group = world.get_or_create_function_group(root, name);
        let function = world.add_function(Function::new(group, vec![], Type::Builtin(BuiltinType::Int)));
        let body = Body::default();
        let code = build_function_body(&mut world, function, &[], &body);
        let entry = code.entry();
        assert!(matches!(code.block(entry).terminator, Some(Terminator::Ret(_))));
    }

    #[test]
    fn returning_a_string_local_does_not_release_the_returned_value() {
        let mut world = World::new();
        let root = world.root_namespace();
        let name = world.intern("f");
        let group = world.get_or_create_function_group(root, name);
        let mut function = Function::new(group, vec![Type::Builtin(BuiltinType::String)], Type::Builtin(BuiltinType::String));
        let arg_name = world.intern("s");
        let local = function.declare_local(arg_name, span(), Type::Builtin(BuiltinType::String));
        let function = world.add_function(function);

        let body = Body {
            statements: vec![Stmt {
                kind: StmtKind::Return(Some(Expr {
                    kind: ExprKind::Symbol(ResolvedSymbol::Symbol(Symbol::Local(local))),
                    ty: Type::Builtin(BuiltinType::String),
                    span: span(),
                })),
                span: span(),
            }],
        };
        let code = build_function_body(&mut world, function, &[local], &body);
        let entry = code.entry();
        assert!(matches!(code.block(entry).terminator, Some(Terminator::Ret(_))));
        // The entry block must not RefDec the returned value itself — the
        // only live local *is* the return value and must survive into the
        // caller.
        let refdecs = code.block(entry).instructions.iter().filter(|i| matches!(i, Instruction::RefDec { .. })).count();
        assert_eq!(refdecs, 0);
    }

    #[test]
    fn qinit_is_empty_but_well_formed_when_there_are_no_globals() {
        let mut world = World::new();
        let (code, _) = build_qinit(&mut world, &[]);
        assert!(matches!(code.block(code.entry()).terminator, Some(Terminator::RetVoid)));
    }

    #[test]
    fn qdone_skips_non_ref_counted_globals() {
        let mut world = World::new();
        let root = world.root_namespace();
        let name = world.intern("g");
        let global = world.declare_global(root, GlobalVariable { full_name: name, ty: Type::Builtin(BuiltinType::Int), has_value: true, is_constant: false });
        let (code, _) = build_qdone(&mut world, &[global]);
        let entry = code.entry();
        assert!(code.block(entry).instructions.is_empty());
        assert!(matches!(code.block(entry).terminator, Some(Terminator::RetVoid)));
    }
}
