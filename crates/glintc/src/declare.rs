//! The declaration processor (§4.3, pass 1): a single walk over a
//! [`CompilationUnit`](ast::CompilationUnit) that populates the symbol
//! model and defers anything needing resolved types onto the worklist's
//! queues.
//!
//! Grounded on `original_source/lib/comp/sem/Core.cpp`'s
//! `processDeclaration` dispatch: one function per declaration kind,
//! namespaces recursed into immediately (they need no deferred
//! resolution), everything else queued.

use crate::{
    ast::{self, DeclKind},
    diagnostics::{DiagnosticId, DiagnosticSink, SourceSpan, report},
    intern::StringId,
    limits::LimitExceeded,
    scope::ScopeStack,
    symbols::{Function, GlobalVariable, NamespaceId},
    types::{BuiltinType, ClassId, Type},
    world::World,
    worklist::{PendingBody, PendingClass, PendingGlobal, PendingOverload, WorklistDriver},
};

/// Top-level statements collected for the synthetic `qMain` (§4.3, last
/// bullet); returned so the caller can decide whether `qMain` exists at
/// all (§6.2: "may be absent when empty").
#[derive(Default)]
pub(crate) struct TopLevel {
    pub statements: Vec<ast::Stmt>,
}

/// Walks every declaration in `unit`, namespaced under `owner` (normally
/// the root namespace).
pub(crate) fn process_unit(
    world: &mut World,
    sink: &mut dyn DiagnosticSink,
    driver: &mut WorklistDriver,
    owner: NamespaceId,
    unit: &ast::CompilationUnit,
    top_level: &mut TopLevel,
) {
    for decl in &unit.decls {
        process_decl(world, sink, driver, owner, decl, top_level);
    }
}

fn process_decl(
    world: &mut World,
    sink: &mut dyn DiagnosticSink,
    driver: &mut WorklistDriver,
    owner: NamespaceId,
    decl: &ast::Decl,
    top_level: &mut TopLevel,
) {
    match &decl.kind {
        DeclKind::Namespace { name, body } => {
            let child = world.get_or_create_namespace(owner, *name);
            for inner in body {
                process_decl(world, sink, driver, child, inner, top_level);
            }
        }
        DeclKind::Class { name, superclass } => {
            if diagnose_if_colliding(world, sink, owner, *name, decl.span, DiagnosticId::SemaDuplicateClassName) {
                return;
            }
            // Reserved now, superclass linked later (process_class): this is
            // what makes the name visible to name_collides for any sibling
            // declaration processed after this one in the same walk.
            let id = world.declare_class(owner, *name, None);
            driver.enqueue_class(PendingClass { namespace: owner, name: *name, id, superclass: superclass.clone(), span: decl.span });
        }
        DeclKind::GlobalVariable { name, declared_type, init } => {
            if diagnose_if_colliding(world, sink, owner, *name, decl.span, DiagnosticId::SemaDuplicateGlobalVariableName) {
                return;
            }
            let id = world.declare_global(owner, GlobalVariable { full_name: *name, ty: error_type(), has_value: false, is_constant: false });
            driver.enqueue_global(PendingGlobal {
                namespace: owner,
                name: *name,
                id,
                declared_type: declared_type.clone(),
                init: init.clone(),
                span: decl.span,
                is_constant: false,
            });
        }
        DeclKind::Function { name, params, return_type, body } => {
            let group = world.get_or_create_function_group(owner, *name);
            driver.enqueue_overload(PendingOverload {
                group,
                params: params.clone(),
                return_type: return_type.clone(),
                body: body.clone(),
                span: decl.span,
            });
        }
        DeclKind::Constant { name, init } => {
            if diagnose_if_colliding(world, sink, owner, *name, decl.span, DiagnosticId::SemaDuplicateGlobalVariableName) {
                return;
            }
            // Constants follow "the same discipline as globals" (§4.3):
            // queued separately so §4.3's ordering still drains all
            // globals before any constant.
            let synthetic_type = ast::TypeRef { root_qualified: false, segments: Vec::new(), asterisk: false, span: decl.span };
            let id = world.declare_global(owner, GlobalVariable { full_name: *name, ty: error_type(), has_value: false, is_constant: true });
            driver.enqueue_constant(PendingGlobal {
                namespace: owner,
                name: *name,
                id,
                declared_type: synthetic_type,
                init: Some(init.clone()),
                span: decl.span,
                is_constant: true,
            });
        }
        DeclKind::TopLevelStatement(stmt) => {
            top_level.statements.push(stmt.clone());
        }
    }
}

/// (I1) checks name uniqueness within `owner` before the caller adds the
/// new member; returns `true` (and emits the diagnostic pair) if it
/// collides, in which case the declaration must be dropped.
fn diagnose_if_colliding(
    world: &World,
    sink: &mut dyn DiagnosticSink,
    owner: NamespaceId,
    name: StringId,
    span: SourceSpan,
    id: DiagnosticId,
) -> bool {
    if world.namespace(owner).name_collides(name) {
        report(sink, id, span).arg(world.strings.resolve(name).to_owned()).emit();
        report(sink, DiagnosticId::SemaPreviousDeclaration, span).emit();
        true
    } else {
        false
    }
}

pub(crate) fn error_type() -> Type {
    Type::Builtin(BuiltinType::Error)
}

/// Counts the ancestors `start` would bring with it, stopping as soon as the
/// count exceeds `limit` rather than walking the chain to its end — this
/// bounds the walk even if the chain loops back on itself.
fn superclass_chain_depth(world: &World, mut current: Option<ClassId>, limit: u32) -> u32 {
    let mut depth = 0u32;
    while let Some(class) = current {
        depth += 1;
        if depth > limit {
            return depth;
        }
        current = world.types.class_superclass(class);
    }
    depth
}

/// Drains one [`PendingClass`] (§4.3 stage 1): resolves the optional
/// superclass name in `namespace`'s scope and links it to the class (already
/// reserved by `process_decl`). A superclass name that resolves to something
/// other than a class is silently dropped — `resolve_type` already reported
/// the lookup failure. A chain deeper than `Limits::max_class_hierarchy_depth`
/// is refused and the class is left without a superclass instead.
pub(crate) fn process_class(world: &mut World, sink: &mut dyn DiagnosticSink, item: PendingClass, driver: &mut WorklistDriver) {
    let mut scopes = ScopeStack::new();
    scopes.push_namespace(item.namespace);
    let superclass = item.superclass.as_ref().and_then(|type_ref| match scopes.resolve_type(world, sink, type_ref) {
        Type::Class(c) | Type::ClassOpt(c) => Some(c),
        _ => None,
    });

    let depth = superclass_chain_depth(world, superclass, driver.limits.max_class_hierarchy_depth);
    if depth > driver.limits.max_class_hierarchy_depth {
        report(sink, DiagnosticId::InternalInconsistency, item.span)
            .arg(LimitExceeded::ClassHierarchyDepth(driver.limits.max_class_hierarchy_depth).to_string())
            .emit();
        return;
    }
    world.set_class_superclass(item.id, superclass);
}

/// Drains one [`PendingOverload`] (§4.3 stage 3): resolves parameter and
/// return types, registers the overload, and enqueues its body for pass 2
/// once every signature in this iteration has been registered.
pub(crate) fn process_overload(world: &mut World, sink: &mut dyn DiagnosticSink, item: PendingOverload, driver: &mut WorklistDriver) {
    let owner = world.function_group(item.group).owner;
    let mut scopes = ScopeStack::new();
    scopes.push_namespace(owner);
    let param_types: Vec<Type> = item.params.iter().map(|p| scopes.resolve_type(world, sink, &p.declared_type)).collect();
    let return_type = scopes.resolve_type(world, sink, &item.return_type);
    let function = world.add_function(Function::new(item.group, param_types, return_type));
    driver.enqueue_body(PendingBody { function, params: item.params, body: item.body });
}

/// Drains one [`PendingGlobal`] (§4.3 stages 2 and 4 — globals and
/// constants share this callback): resolves the declared type (globals)
/// or defers to the initializer's own type (constants), analyzes the
/// initializer, and registers the global. Returns the analyzed
/// initializer so the caller can fold it into `qInit` once every global
/// has been through this pass, in the order processing actually
/// completed for each — "declaration order" for initializer purposes,
/// since dependency-driven reordering across worklist iterations can
/// otherwise shuffle textual order.
pub(crate) fn process_global(
    world: &mut World,
    sink: &mut dyn DiagnosticSink,
    item: PendingGlobal,
    driver: &mut WorklistDriver,
) -> Option<(crate::symbols::GlobalVariableId, crate::semantic_ir::Expr)> {
    let owner = item.namespace;
    let id = item.id;
    if item.is_constant {
        driver.resolving_constants.insert(id);
        let init = item.init.as_ref().expect("constants always carry an initializer");
        let expr = crate::analyze::analyze_global_init(world, sink, &driver.resolving_constants, owner, None, init);
        driver.resolving_constants.remove(&id);
        world.global_mut(id).ty = expr.ty;
        world.global_mut(id).has_value = true;
        return Some((id, expr));
    }

    let declared_ty = {
        let mut scopes = ScopeStack::new();
        scopes.push_namespace(owner);
        scopes.resolve_type(world, sink, &item.declared_type)
    };
    world.global_mut(id).ty = declared_ty;
    match &item.init {
        Some(init) => {
            world.global_mut(id).has_value = true;
            let expr = crate::analyze::analyze_global_init(world, sink, &driver.resolving_constants, owner, Some(declared_ty), init);
            Some((id, expr))
        }
        None => None,
    }
}
