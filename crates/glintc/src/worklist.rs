//! The worklist driver (§4.3 "Worklist ordering", §5): orchestrates the
//! five queues the declaration processor fills so that types exist
//! before signatures, signatures before bodies, and so on.
//!
//! Grounded on `original_source/include/qore/comp/sem/Core.h`: queues are
//! drained in a fixed stage order, and — per `FunctionOverloadPack.h`'s
//! `addToQueue` — a queue only becomes "registered" (participates in
//! draining) the first time something is pushed onto it, not eagerly.
//! Here that's modeled by queues starting empty and the driver simply
//! skipping empty stages; "registered" has no separate observable effect
//! beyond that, so no extra flag is needed to preserve the behavior.

use ahash::AHashSet;
use smallvec::SmallVec;

use crate::{
    ast,
    diagnostics::{DiagnosticId, DiagnosticSink, report},
    limits::Limits,
    symbols::{FunctionGroupId, FunctionId, GlobalVariableId, NamespaceId},
    types::ClassId,
    world::World,
};

/// `id` is reserved synchronously during declaration processing (before
/// this item ever reaches the queue), so the namespace already carries its
/// name by the time a second, colliding declaration is checked.
pub(crate) struct PendingClass {
    pub namespace: NamespaceId,
    pub name: crate::intern::StringId,
    pub id: ClassId,
    pub superclass: Option<ast::TypeRef>,
    pub span: crate::diagnostics::SourceSpan,
}

/// `id` is reserved synchronously during declaration processing, same as
/// [`PendingClass::id`].
pub(crate) struct PendingGlobal {
    pub namespace: NamespaceId,
    pub name: crate::intern::StringId,
    pub id: GlobalVariableId,
    pub declared_type: ast::TypeRef,
    pub init: Option<ast::Expr>,
    pub span: crate::diagnostics::SourceSpan,
    pub is_constant: bool,
}

pub(crate) struct PendingOverload {
    pub group: FunctionGroupId,
    pub params: Vec<ast::Param>,
    pub return_type: ast::TypeRef,
    pub body: Vec<ast::Stmt>,
    pub span: crate::diagnostics::SourceSpan,
}

pub(crate) struct PendingBody {
    pub function: FunctionId,
    pub params: Vec<ast::Param>,
    pub body: Vec<ast::Stmt>,
}

/// The five queues of §4.3, drained in the documented order:
/// class → global-variable → function-overload-pack → constant →
/// function-body. Each stage may push onto a later stage; the driver
/// loops to a fixed point (bounded by [`Limits`]).
#[derive(Default)]
pub(crate) struct WorklistDriver {
    classes: Vec<PendingClass>,
    globals: Vec<PendingGlobal>,
    overloads: Vec<PendingOverload>,
    constants: Vec<PendingGlobal>,
    bodies: Vec<PendingBody>,
    /// Constants currently being resolved, for the cycle check mentioned
    /// in §4.3 ("currently resolving" marker).
    pub(crate) resolving_constants: AHashSet<GlobalVariableId>,
    pub(crate) limits: Limits,
}

impl WorklistDriver {
    #[must_use]
    pub(crate) fn new(limits: Limits) -> Self {
        Self { limits, ..Self::default() }
    }

    pub(crate) fn enqueue_class(&mut self, item: PendingClass) {
        self.classes.push(item);
    }

    pub(crate) fn enqueue_global(&mut self, item: PendingGlobal) {
        self.globals.push(item);
    }

    pub(crate) fn enqueue_overload(&mut self, item: PendingOverload) {
        self.overloads.push(item);
    }

    pub(crate) fn enqueue_constant(&mut self, item: PendingGlobal) {
        self.constants.push(item);
    }

    pub(crate) fn enqueue_body(&mut self, item: PendingBody) {
        self.bodies.push(item);
    }

    fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.globals.is_empty()
            && self.overloads.is_empty()
            && self.constants.is_empty()
            && self.bodies.is_empty()
    }

    /// Runs every stage to a fixed point, in the order mandated by §4.3.
    /// `process_*` callbacks are supplied by `crate::declare` /
    /// `crate::analyze` / `crate::builder` so this module stays a pure
    /// scheduler.
    pub(crate) fn drain(
        &mut self,
        world: &mut World,
        sink: &mut dyn DiagnosticSink,
        mut process_class: impl FnMut(&mut World, &mut dyn DiagnosticSink, PendingClass, &mut Self),
        mut process_global: impl FnMut(&mut World, &mut dyn DiagnosticSink, PendingGlobal, &mut Self),
        mut process_overload: impl FnMut(&mut World, &mut dyn DiagnosticSink, PendingOverload, &mut Self),
        mut process_body: impl FnMut(&mut World, &mut dyn DiagnosticSink, PendingBody),
    ) {
        let mut iterations = 0u32;
        loop {
            if self.is_empty() {
                break;
            }
            iterations += 1;
            if iterations > self.limits.max_worklist_iterations {
                report(sink, DiagnosticId::InternalInconsistency, crate::diagnostics::SourceSpan::synthetic())
                    .arg(crate::limits::LimitExceeded::WorklistIterations(self.limits.max_worklist_iterations).to_string())
                    .emit();
                break;
            }

            let classes: SmallVec<[PendingClass; 4]> = self.classes.drain(..).collect();
            for item in classes {
                process_class(world, sink, item, self);
            }

            let globals: SmallVec<[PendingGlobal; 4]> = self.globals.drain(..).collect();
            for item in globals {
                process_global(world, sink, item, self);
            }

            let overloads: SmallVec<[PendingOverload; 4]> = self.overloads.drain(..).collect();
            for item in overloads {
                process_overload(world, sink, item, self);
            }

            let constants: SmallVec<[PendingGlobal; 4]> = self.constants.drain(..).collect();
            for item in constants {
                process_global(world, sink, item, self);
            }

            let bodies: SmallVec<[PendingBody; 4]> = self.bodies.drain(..).collect();
            for item in bodies {
                process_body(world, sink, item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WorklistDriver;
    use crate::limits::Limits;

    #[test]
    fn empty_driver_needs_no_iterations() {
        let mut driver = WorklistDriver::new(Limits::default());
        let mut world = crate::world::World::new();
        let mut sink = crate::diagnostics::CollectingSink::new();
        driver.drain(&mut world, &mut sink, |_, _, _, _| panic!("no classes"), |_, _, _, _| panic!("no globals"), |_, _, _, _| panic!("no overloads"), |_, _, _| panic!("no bodies"));
        assert_eq!(sink.count(), 0);
    }
}
