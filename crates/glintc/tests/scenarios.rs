//! Literal input -> observable output scenarios, plus the cross-cutting
//! well-formedness properties every compiled function must satisfy.
//! There is no lexer/parser in this crate, so each scenario's source text
//! is expressed directly as the [`ast`] tree a parser would have produced
//! for it.

use glintc::{
    ast, compile, compile_with_limits,
    code_ir::{Instruction, Terminator},
    diagnostics::{CollectingSink, DiagnosticId},
    limits::Limits,
    types::Type,
    world::World,
    Backend,
};

fn span() -> glintc::diagnostics::SourceSpan {
    glintc::diagnostics::SourceSpan::synthetic()
}

fn type_ref(world: &mut World, name: &str) -> ast::TypeRef {
    let segment = world.intern(name);
    ast::TypeRef { root_qualified: false, segments: vec![segment], asterisk: false, span: span() }
}

fn ident(world: &mut World, name: &str) -> glintc::intern::StringId {
    world.intern(name)
}

fn top_level(stmt: ast::StmtKind) -> ast::Decl {
    ast::Decl { kind: ast::DeclKind::TopLevelStatement(ast::Stmt { kind: stmt, span: span() }), span: span() }
}

/// Scenario 1: `print 1 + 2;` lowers to two int constants, a non-throwing
/// `int + int` invocation (no landing pad — neither operand is ever
/// reference-counted), and a call to `print` whose landing pad is
/// synthesized but trivial, since nothing is live on the cleanup stack at
/// the call site.
#[test]
fn scenario_1_print_of_an_int_sum_has_no_live_cleanups() {
    let mut world = World::new();
    let mut sink = CollectingSink::new();

    let print_name = ident(&mut world, "print");
    let int_ty = type_ref(&mut world, "int");
    let nothing_ty = type_ref(&mut world, "nothing");
    let param_name = ident(&mut world, "x");

    let print_decl = ast::Decl {
        kind: ast::DeclKind::Function {
            name: print_name,
            params: vec![ast::Param { name: param_name, declared_type: int_ty, span: span() }],
            return_type: nothing_ty,
            body: vec![],
        },
        span: span(),
    };

    let call = ast::Expr {
        kind: ast::ExprKind::Call {
            callee: print_name,
            args: vec![ast::Expr {
                kind: ast::ExprKind::Binary {
                    op: glintc::types::BinOpKind::Add,
                    left: Box::new(ast::Expr { kind: ast::ExprKind::Literal(ast::Literal::Int(1)), span: span() }),
                    right: Box::new(ast::Expr { kind: ast::ExprKind::Literal(ast::Literal::Int(2)), span: span() }),
                },
                span: span(),
            }],
        },
        span: span(),
    };
    let stmt = top_level(ast::StmtKind::Expr(call));

    let unit = ast::CompilationUnit { decls: vec![print_decl, stmt] };
    compile(&mut world, &mut sink, &unit);

    assert_eq!(sink.count(), 0);
    let backend = Backend::new(&world);
    let qmain = backend.q_main().expect("top-level statement produces qMain");
    let entry = qmain.entry().expect("qMain always gets a built body");
    let block = qmain.block(entry).unwrap();

    let const_ints = block.instructions.iter().filter(|i| matches!(i, Instruction::ConstInt { .. })).count();
    assert_eq!(const_ints, 2);
    let adds: Vec<_> = block.instructions.iter().filter(|i| matches!(i, Instruction::InvokeBinaryOperator { .. })).collect();
    assert_eq!(adds.len(), 1);
    assert!(matches!(adds[0], Instruction::InvokeBinaryOperator { lpad: None, .. }), "int + int never throws");
    let calls: Vec<_> = block.instructions.iter().filter(|i| matches!(i, Instruction::InvokeFunction { .. })).collect();
    assert_eq!(calls.len(), 1);
    let Instruction::InvokeFunction { lpad, .. } = calls[0] else { unreachable!() };
    let lpad_block = qmain.block(lpad.expect("calls always get a landing pad")).unwrap();
    assert!(lpad_block.instructions.is_empty(), "nothing is live on the cleanup stack at this call site");
    assert!(matches!(lpad_block.terminator, Some(Terminator::ResumeUnwind)));
    assert!(matches!(block.terminator, Some(Terminator::RetVoid)));
}

/// Scenario 2: `our string g = ""; g = "x";` — `qInit` stores the
/// declared initializer into `g`, and the top-level assignment to `g` is
/// bracketed by a write lock/unlock pair with a landing pad that unlocks
/// if the string construction throws.
#[test]
fn scenario_2_global_assignment_is_bracketed_by_a_write_lock() {
    let mut world = World::new();
    let mut sink = CollectingSink::new();

    let g_name = ident(&mut world, "g");
    let string_ty = type_ref(&mut world, "string");
    let empty = world.intern("");
    let init = ast::Expr { kind: ast::ExprKind::Literal(ast::Literal::Str(empty)), span: span() };
    let global_decl = ast::Decl { kind: ast::DeclKind::GlobalVariable { name: g_name, declared_type: string_ty, init: Some(init) }, span: span() };

    let literal = world.intern("x");
    let assign = ast::Expr {
        kind: ast::ExprKind::Assign {
            target: Box::new(ast::Expr { kind: ast::ExprKind::Identifier(g_name), span: span() }),
            value: Box::new(ast::Expr { kind: ast::ExprKind::Literal(ast::Literal::Str(literal)), span: span() }),
        },
        span: span(),
    };
    let stmt = top_level(ast::StmtKind::Expr(assign));

    let unit = ast::CompilationUnit { decls: vec![global_decl, stmt] };
    compile(&mut world, &mut sink, &unit);

    assert_eq!(sink.count(), 0);
    let backend = Backend::new(&world);

    let qinit = backend.q_init().expect("qInit always exists");
    let init_block = qinit.block(qinit.entry().unwrap()).unwrap();
    assert!(init_block.instructions.iter().any(|i| matches!(i, Instruction::GlobalInit { .. })));

    let qmain = backend.q_main().expect("the assignment is a top-level statement");
    let entry_block = qmain.block(qmain.entry().unwrap()).unwrap();
    assert!(entry_block.instructions.iter().any(|i| matches!(i, Instruction::GlobalWriteLock { .. })));
    assert!(entry_block.instructions.iter().any(|i| matches!(i, Instruction::GlobalWriteUnlock { .. })));

    let lock_idx = entry_block.instructions.iter().position(|i| matches!(i, Instruction::GlobalWriteLock { .. })).unwrap();
    let unlock_idx = entry_block.instructions.iter().position(|i| matches!(i, Instruction::GlobalWriteUnlock { .. })).unwrap();
    assert!(lock_idx < unlock_idx, "the write lock must enclose the assignment");
}

/// Scenario 5: `if (0) print "y"; else print "n";` — the condition is
/// converted to `bool`, the two arms end in a `Branch`, and each arm
/// jumps to a shared continuation block; the `if` itself introduces no
/// landing pads.
#[test]
fn scenario_5_if_else_branches_and_converges() {
    let mut world = World::new();
    let mut sink = CollectingSink::new();

    let print_name = ident(&mut world, "print");
    let string_ty = type_ref(&mut world, "string");
    let nothing_ty = type_ref(&mut world, "nothing");
    let param_name = ident(&mut world, "x");
    let print_decl = ast::Decl {
        kind: ast::DeclKind::Function {
            name: print_name,
            params: vec![ast::Param { name: param_name, declared_type: string_ty, span: span() }],
            return_type: nothing_ty,
            body: vec![],
        },
        span: span(),
    };

    let yes = world.intern("y");
    let no = world.intern("n");
    let call = |callee, text| ast::Stmt {
        kind: ast::StmtKind::Expr(ast::Expr {
            kind: ast::ExprKind::Call { callee, args: vec![ast::Expr { kind: ast::ExprKind::Literal(ast::Literal::Str(text)), span: span() }] },
            span: span(),
        }),
        span: span(),
    };

    let if_stmt = ast::StmtKind::If {
        cond: ast::Expr { kind: ast::ExprKind::Literal(ast::Literal::Bool(false)), span: span() },
        then_branch: vec![call(print_name, yes)],
        else_branch: Some(vec![call(print_name, no)]),
    };

    let unit = ast::CompilationUnit { decls: vec![print_decl, top_level(if_stmt)] };
    compile(&mut world, &mut sink, &unit);

    assert_eq!(sink.count(), 0);
    let backend = Backend::new(&world);
    let qmain = backend.q_main().unwrap();

    let branch_blocks: Vec<_> = qmain
        .block_ids()
        .filter_map(|id| {
            let block = qmain.block(id).unwrap();
            match block.terminator {
                Some(Terminator::Branch { then_block, else_block, .. }) => Some((then_block, else_block)),
                _ => None,
            }
        })
        .collect();
    assert_eq!(branch_blocks.len(), 1, "the if lowers to exactly one Branch");
    let (then_block, else_block) = branch_blocks[0];

    let jump_target = |id: glintc::code_ir::BlockId| match qmain.block(id).unwrap().terminator {
        Some(Terminator::Jump(target)) => Some(target),
        _ => None,
    };
    let then_target = jump_target(then_block).expect("then arm falls through to a continuation");
    let else_target = jump_target(else_block).expect("else arm falls through to the same continuation");
    assert_eq!(then_target, else_target);
}

/// Scenario 6: two same-named globals in one namespace produce exactly
/// the diagnosed-collision pair, the second declaration never enters the
/// symbol model, and `qInit`/`qDone` reflect exactly one global.
#[test]
fn scenario_6_duplicate_global_name_keeps_only_the_first_declaration() {
    let mut world = World::new();
    let mut sink = CollectingSink::new();

    let name = ident(&mut world, "count");
    let int_ty_a = type_ref(&mut world, "int");
    let int_ty_b = type_ref(&mut world, "int");
    let decl_a = ast::Decl { kind: ast::DeclKind::GlobalVariable { name, declared_type: int_ty_a, init: None }, span: span() };
    let decl_b = ast::Decl { kind: ast::DeclKind::GlobalVariable { name, declared_type: int_ty_b, init: None }, span: span() };

    let unit = ast::CompilationUnit { decls: vec![decl_a, decl_b] };
    compile(&mut world, &mut sink, &unit);

    assert!(sink.has_id(DiagnosticId::SemaDuplicateGlobalVariableName));
    assert!(sink.has_id(DiagnosticId::SemaPreviousDeclaration));
    assert_eq!(world.global_count(), 1);

    let backend = Backend::new(&world);
    let root = backend.root_namespace();
    assert_eq!(root.globals().count(), 1);
}

/// Scenario 7: two same-named classes in one namespace produce exactly the
/// diagnosed-collision pair and the second declaration never enters the
/// symbol model — the class analog of scenario 6.
#[test]
fn scenario_7_duplicate_class_name_keeps_only_the_first_declaration() {
    let mut world = World::new();
    let mut sink = CollectingSink::new();

    let name = ident(&mut world, "Widget");
    let decl_a = ast::Decl { kind: ast::DeclKind::Class { name, superclass: None }, span: span() };
    let decl_b = ast::Decl { kind: ast::DeclKind::Class { name, superclass: None }, span: span() };

    let unit = ast::CompilationUnit { decls: vec![decl_a, decl_b] };
    compile(&mut world, &mut sink, &unit);

    assert!(sink.has_id(DiagnosticId::SemaDuplicateClassName));
    assert!(sink.has_id(DiagnosticId::SemaPreviousDeclaration));

    let backend = Backend::new(&world);
    let root = backend.root_namespace();
    assert_eq!(root.classes().count(), 1);
}

/// A superclass chain deeper than `Limits::max_class_hierarchy_depth` must
/// be refused rather than accepted outright: one class too many in a
/// straight inheritance line trips the bound. Uses a lowered limit so the
/// test doesn't need to construct dozens of classes to exercise it.
#[test]
fn superclass_chain_past_the_depth_limit_is_refused() {
    let mut world = World::new();
    let mut sink = CollectingSink::new();

    let mut decls = Vec::new();
    let mut previous_name = None;
    for i in 0..4 {
        let name = ident(&mut world, &format!("C{i}"));
        let superclass = previous_name.map(|prev| type_ref(&mut world, &format!("C{prev}")));
        decls.push(ast::Decl { kind: ast::DeclKind::Class { name, superclass }, span: span() });
        previous_name = Some(i);
    }

    let unit = ast::CompilationUnit { decls };
    compile_with_limits(&mut world, &mut sink, &unit, Limits { max_class_hierarchy_depth: 2, ..Limits::default() });

    assert!(sink.has_id(DiagnosticId::InternalInconsistency), "a chain of depth 3 must exceed a configured limit of 2");
}

/// P1: every compiled function's every block ends in exactly one
/// terminator, with no instruction following it.
#[test]
fn p1_every_block_terminates_exactly_once() {
    let mut world = World::new();
    let mut sink = CollectingSink::new();

    let g = ident(&mut world, "g");
    let int_ty = type_ref(&mut world, "int");
    let literal = ast::Expr { kind: ast::ExprKind::Literal(ast::Literal::Int(7)), span: span() };
    let global = ast::Decl { kind: ast::DeclKind::GlobalVariable { name: g, declared_type: int_ty, init: Some(literal) }, span: span() };

    let unit = ast::CompilationUnit { decls: vec![global] };
    compile(&mut world, &mut sink, &unit);

    let backend = Backend::new(&world);
    for view in [backend.q_init(), backend.q_done(), backend.q_main()].into_iter().flatten() {
        for id in view.block_ids() {
            let block = view.block(id).unwrap();
            assert!(block.terminator.is_some(), "every block must terminate");
        }
    }
}

/// P6: every built-in type name round-trips through `resolveType` to the
/// same singleton `Type`, independent of any compiled program.
#[test]
fn p6_builtin_type_names_round_trip() {
    let world = World::new();
    for name in ["int", "string", "bool", "nothing", "any", "softint", "softstring", "softbool", "*int", "*string"] {
        let ty = world.types.lookup_builtin_type(name, false).unwrap_or_else(|| panic!("{name} should resolve"));
        if let Type::Builtin(b) = ty {
            assert_eq!(b.display_name(), name);
        } else {
            panic!("builtin lookup must return a Builtin type");
        }
    }
}
