//! The read-only back-end view (§6.2): everything a code-generating or
//! interpreting consumer needs to walk a compiled [`World`] — namespace
//! contents, per-function metadata, the block graph from each function's
//! entry, and the synthesized `qInit`/`qDone`/`qMain` — without any of the
//! mutation methods used while compiling it.
//!
//! Grounded on `original_source/include/qore/comp/` back-end-facing
//! headers, which expose the same shape (namespace tree, per-function
//! signature + locals + blocks) behind a narrower interface than the
//! compiler-internal one.

use crate::{
    code_ir::{Block, BlockId},
    intern::StringId,
    symbols::{ClassId, FunctionGroupId, FunctionId, GlobalVariableId, LocalVariable, NamespaceId},
    types::Type,
    world::World,
};

/// Entry point into the read-only view over a compiled `World`.
#[derive(Clone, Copy)]
pub struct Backend<'a> {
    world: &'a World,
}

impl<'a> Backend<'a> {
    #[must_use]
    pub fn new(world: &'a World) -> Self {
        Self { world }
    }

    #[must_use]
    pub fn root_namespace(&self) -> NamespaceView<'a> {
        NamespaceView { world: self.world, id: self.world.root_namespace() }
    }

    #[must_use]
    pub fn q_init(&self) -> Option<FunctionView<'a>> {
        self.world.q_init.map(|id| FunctionView { world: self.world, id })
    }

    #[must_use]
    pub fn q_done(&self) -> Option<FunctionView<'a>> {
        self.world.q_done.map(|id| FunctionView { world: self.world, id })
    }

    /// Absent when the unit had no top-level statements (§6.2).
    #[must_use]
    pub fn q_main(&self) -> Option<FunctionView<'a>> {
        self.world.q_main.map(|id| FunctionView { world: self.world, id })
    }

    #[must_use]
    pub fn resolve_string(&self, id: StringId) -> &'a str {
        self.world.strings.resolve(id)
    }
}

/// A namespace and its transitive contents.
#[derive(Clone, Copy)]
pub struct NamespaceView<'a> {
    world: &'a World,
    id: NamespaceId,
}

impl<'a> NamespaceView<'a> {
    /// `None` only for the root namespace.
    #[must_use]
    pub fn name(&self) -> Option<&'a str> {
        self.world.namespace(self.id).name.map(|s| self.world.strings.resolve(s))
    }

    pub fn namespaces(&self) -> impl Iterator<Item = NamespaceView<'a>> + 'a {
        let world = self.world;
        self.world.namespace(self.id).children.values().map(move |&id| NamespaceView { world, id })
    }

    pub fn function_groups(&self) -> impl Iterator<Item = FunctionGroupView<'a>> + 'a {
        let world = self.world;
        self.world.namespace(self.id).function_groups.values().map(move |&id| FunctionGroupView { world, id })
    }

    pub fn globals(&self) -> impl Iterator<Item = GlobalView<'a>> + 'a {
        let world = self.world;
        self.world.namespace(self.id).globals.values().map(move |&id| GlobalView { world, id })
    }

    pub fn classes(&self) -> impl Iterator<Item = ClassId> + 'a {
        self.world.namespace(self.id).classes.values().copied()
    }
}

/// The set of overloads sharing one name within a namespace.
#[derive(Clone, Copy)]
pub struct FunctionGroupView<'a> {
    world: &'a World,
    id: FunctionGroupId,
}

impl<'a> FunctionGroupView<'a> {
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.world.strings.resolve(self.world.function_group(self.id).full_name)
    }

    pub fn overloads(&self) -> impl Iterator<Item = FunctionView<'a>> + 'a {
        let world = self.world;
        self.world.function_group(self.id).overloads.iter().map(move |&id| FunctionView { world, id })
    }
}

/// A module-level variable or constant.
#[derive(Clone, Copy)]
pub struct GlobalView<'a> {
    world: &'a World,
    id: GlobalVariableId,
}

impl<'a> GlobalView<'a> {
    #[must_use]
    pub fn id(&self) -> GlobalVariableId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'a str {
        self.world.strings.resolve(self.world.global(self.id).full_name)
    }

    #[must_use]
    pub fn ty(&self) -> Type {
        self.world.global(self.id).ty
    }

    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.world.global(self.id).is_constant
    }

    #[must_use]
    pub fn has_value(&self) -> bool {
        self.world.global(self.id).has_value
    }
}

/// One resolved function overload, with its lowered block graph if pass 2
/// has run for it.
#[derive(Clone, Copy)]
pub struct FunctionView<'a> {
    world: &'a World,
    id: FunctionId,
}

impl<'a> FunctionView<'a> {
    #[must_use]
    pub fn id(&self) -> FunctionId {
        self.id
    }

    #[must_use]
    pub fn argument_count(&self) -> usize {
        self.world.function(self.id).param_types.len()
    }

    #[must_use]
    pub fn argument_types(&self) -> &'a [Type] {
        &self.world.function(self.id).param_types
    }

    #[must_use]
    pub fn return_type(&self) -> Type {
        self.world.function(self.id).return_type
    }

    /// Upper bound on live temps at once; not every index below this is
    /// necessarily still live at any given point (§3.4, free-list reuse).
    #[must_use]
    pub fn temp_count(&self) -> u32 {
        self.world.function(self.id).next_temp
    }

    #[must_use]
    pub fn locals(&self) -> &'a [LocalVariable] {
        &self.world.function(self.id).locals
    }

    /// `None` until the IR builder (§4.5) has run for this function.
    #[must_use]
    pub fn entry(&self) -> Option<BlockId> {
        self.world.function(self.id).body.as_ref().map(crate::code_ir::CodeBody::entry)
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&'a Block> {
        self.world.function(self.id).body.as_ref().map(|b| b.block(id))
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.world.function(self.id).body.as_ref().map_or(0, crate::code_ir::CodeBody::block_count)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + 'a {
        let body = self.world.function(self.id).body.as_ref();
        body.into_iter().flat_map(crate::code_ir::CodeBody::block_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::Backend;
    use crate::{
        symbols::{Function, GlobalVariable},
        types::{BuiltinType, Type},
        world::World,
    };

    #[test]
    fn root_namespace_reflects_declared_members() {
        let mut world = World::new();
        let root = world.root_namespace();
        let name = world.intern("greeting");
        world.declare_global(root, GlobalVariable { full_name: name, ty: Type::Builtin(BuiltinType::String), has_value: true, is_constant: false });
        let group_name = world.intern("greet");
        let group = world.get_or_create_function_group(root, group_name);
        world.add_function(Function::new(group, vec![], Type::Builtin(BuiltinType::Nothing)));

        let backend = Backend::new(&world);
        let ns = backend.root_namespace();
        assert!(ns.name().is_none());
        assert_eq!(ns.globals().count(), 1);
        assert_eq!(ns.function_groups().count(), 1);
        assert_eq!(ns.globals().next().unwrap().name(), "greeting");
    }

    #[test]
    fn function_without_a_built_body_reports_no_entry() {
        let mut world = World::new();
        let root = world.root_namespace();
        let name = world.intern("f");
        let group = world.get_or_create_function_group(root, name);
        let function = world.add_function(Function::new(group, vec![], Type::Builtin(BuiltinType::Nothing)));

        let backend = Backend::new(&world);
        let view = backend.root_namespace().function_groups().next().unwrap().overloads().next().unwrap();
        assert_eq!(view.id(), function);
        assert!(view.entry().is_none());
        assert_eq!(view.block_count(), 0);
    }

    #[test]
    fn synthesized_functions_are_absent_before_compilation_runs() {
        let world = World::new();
        let backend = Backend::new(&world);
        assert!(backend.q_init().is_none());
        assert!(backend.q_done().is_none());
        assert!(backend.q_main().is_none());
    }
}
