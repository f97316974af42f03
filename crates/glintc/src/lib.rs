//! Semantic analysis and code IR generation for a dynamically-typed,
//! reference-counted scripting language.
//!
//! This crate sits between a parser (not provided here) and a back end
//! (also not provided here): it takes a validated [`ast::CompilationUnit`]
//! and turns it into a populated [`World`] — a symbol table plus, for
//! every function, a lowered [`code_ir::CodeBody`] ready for an
//! interpreter or a native-code back end to walk. [`backend::Backend`] is
//! the read-only view meant for that consumer.
//!
//! The pipeline is two passes over the unit, driven by [`worklist`]:
//!
//! 1. [`declare`] discovers every namespace, class, global, overload and
//!    function body and queues whatever needs a resolved type before it
//!    can be registered.
//! 2. [`analyze`] lowers each queued item's expressions/statements into
//!    [`semantic_ir`] (types resolved, overloads picked, conversions
//!    inserted), and [`builder`] lowers that into [`code_ir`] (basic
//!    blocks, write-once temps, explicit landing pads for unwinding).
#![expect(clippy::module_name_repetitions, reason = "`FunctionId`/`GlobalVariableId` etc. read better fully qualified at call sites")]

pub mod analyze;
pub mod ast;
pub mod backend;
pub mod builder;
pub mod code_ir;
pub mod declare;
pub mod diagnostics;
pub mod errors;
pub mod intern;
pub mod limits;
pub mod scope;
pub mod semantic_ir;
pub mod symbols;
pub mod types;
pub mod worklist;
pub mod world;

pub use crate::{
    backend::Backend,
    diagnostics::{CollectingSink, Diagnostic, DiagnosticId, DiagnosticSink},
    limits::Limits,
    world::World,
};

use crate::{
    diagnostics::DiagnosticSink,
    symbols::{FunctionId, GlobalVariableId},
    types::{BuiltinType, Type},
    worklist::WorklistDriver,
};

/// Runs the full pipeline over `unit`, populating `world` with every
/// namespace, class, global, function and — once both passes complete —
/// the synthesized `qInit`/`qDone`/`qMain` (§6.2). Diagnostics are
/// reported to `sink`; a unit with errors still produces a best-effort
/// `World` rather than aborting partway (§4.1: callers decide whether to
/// proceed based on `sink`).
pub fn compile(world: &mut World, sink: &mut dyn DiagnosticSink, unit: &ast::CompilationUnit) {
    compile_with_limits(world, sink, unit, Limits::default());
}

/// As [`compile`], but with caller-supplied [`Limits`] — mainly useful
/// for tests that want to exercise the worklist's runaway-iteration
/// guard without constructing a pathological unit.
pub fn compile_with_limits(world: &mut World, sink: &mut dyn DiagnosticSink, unit: &ast::CompilationUnit, limits: Limits) {
    let root = world.root_namespace();
    let mut driver = WorklistDriver::new(limits);
    let mut top_level = declare::TopLevel::default();
    declare::process_unit(world, sink, &mut driver, root, unit, &mut top_level);

    let mut inits: Vec<(GlobalVariableId, semantic_ir::Expr)> = Vec::new();
    driver.drain(
        world,
        sink,
        declare::process_class,
        |world, sink, item, driver| {
            if let Some(pair) = declare::process_global(world, sink, item, driver) {
                inits.push(pair);
            }
        },
        declare::process_overload,
        |world, sink, item| process_function_body(world, sink, item),
    );

    let globals_in_order: Vec<GlobalVariableId> = (0..world.global_count()).map(|i| world.global_id_at(i)).collect();

    let (qinit_body, qinit_temps) = builder::build_qinit(world, &inits);
    let qinit_fn = register_synthetic_function(world, "qinit", Vec::new(), Type::Builtin(BuiltinType::Nothing));
    world.function_mut(qinit_fn).body = Some(qinit_body);
    world.function_mut(qinit_fn).next_temp = qinit_temps;
    world.q_init = Some(qinit_fn);

    let (qdone_body, qdone_temps) = builder::build_qdone(world, &globals_in_order);
    let qdone_fn = register_synthetic_function(world, "qdone", Vec::new(), Type::Builtin(BuiltinType::Nothing));
    world.function_mut(qdone_fn).body = Some(qdone_body);
    world.function_mut(qdone_fn).next_temp = qdone_temps;
    world.q_done = Some(qdone_fn);

    // Absent rather than an empty body when there were no top-level
    // statements (§6.2: "may be absent when empty").
    if !top_level.statements.is_empty() {
        let qmain_fn = register_synthetic_function(world, "qmain", Vec::new(), Type::Builtin(BuiltinType::Nothing));
        let no_constants_in_flight = ahash::AHashSet::new();
        let (sem_body, _params) = analyze::analyze_function_body(world, sink, &no_constants_in_flight, root, qmain_fn, &[], &top_level.statements);
        let code = builder::build_function_body(world, qmain_fn, &[], &sem_body);
        world.function_mut(qmain_fn).body = Some(code);
        world.q_main = Some(qmain_fn);
    }
}

/// Drains one [`worklist::PendingBody`] (§4.3 stage 5, the last to run
/// each iteration): a function body can't reference a constant that is
/// still being resolved, since stage 4 always completes before stage 5
/// within the same iteration, so there is nothing to pass for
/// `resolving_constants` here.
fn process_function_body(world: &mut World, sink: &mut dyn DiagnosticSink, item: worklist::PendingBody) {
    let worklist::PendingBody { function, params, body } = item;
    let owner = world.function_group(world.function(function).group).owner;
    let no_constants_in_flight = ahash::AHashSet::new();
    let (sem_body, param_locals) = analyze::analyze_function_body(world, sink, &no_constants_in_flight, owner, function, &params, &body);
    let code = builder::build_function_body(world, function, &param_locals, &sem_body);
    world.function_mut(function).body = Some(code);
}

/// Registers a compiler-synthesized function (`qInit`/`qDone`/`qMain`)
/// under its own function group in the root namespace, the way a
/// reserved name would look to the symbol model without actually going
/// through the name-collision diagnostics user declarations get.
fn register_synthetic_function(world: &mut World, name: &str, param_types: Vec<Type>, return_type: Type) -> FunctionId {
    let root = world.root_namespace();
    let interned = world.intern(name);
    let group = world.get_or_create_function_group(root, interned);
    world.add_function(symbols::Function::new(group, param_types, return_type))
}
