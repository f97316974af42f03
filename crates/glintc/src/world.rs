//! Owns every long-lived table the symbol model and code IR reference:
//! namespaces, function groups, functions, globals, the string table, and
//! the type registry. Analogous to `ouros`'s `Executor`/`PrepareResult`
//! pairing, but holding compile-time rather than runtime state.

use crate::{
    intern::{StringId, StringTable},
    symbols::{
        Function, FunctionGroup, FunctionGroupId, FunctionId, GlobalVariable, GlobalVariableId, Namespace,
        NamespaceId,
    },
    types::{ClassId, TypeRegistry},
};

pub struct World {
    pub strings: StringTable,
    pub types: TypeRegistry,
    namespaces: Vec<Namespace>,
    function_groups: Vec<FunctionGroup>,
    functions: Vec<Function>,
    globals: Vec<GlobalVariable>,
    /// Synthesized functions (§6.2): present only once their bodies exist.
    pub q_init: Option<FunctionId>,
    pub q_done: Option<FunctionId>,
    pub q_main: Option<FunctionId>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        Self {
            strings: StringTable::new(),
            types: TypeRegistry::new(),
            namespaces: vec![Namespace::new(None, None)],
            function_groups: Vec::new(),
            functions: Vec::new(),
            globals: Vec::new(),
            q_init: None,
            q_done: None,
            q_main: None,
        }
    }

    /// The single root namespace (§4.2's `RootNamespaceScope`).
    #[must_use]
    pub fn root_namespace(&self) -> NamespaceId {
        NamespaceId::new(0)
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        self.strings.intern(s)
    }

    #[must_use]
    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.index()]
    }

    pub fn namespace_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        &mut self.namespaces[id.index()]
    }

    /// Creates a fresh child namespace, or returns the existing one if a
    /// namespace with this name already exists under `parent` — namespace
    /// declarations merge rather than collide (§4.3).
    pub fn get_or_create_namespace(&mut self, parent: NamespaceId, name: StringId) -> NamespaceId {
        if let Some(&existing) = self.namespace(parent).children.get(&name) {
            return existing;
        }
        let id = NamespaceId::new(self.namespaces.len());
        self.namespaces.push(Namespace::new(Some(name), Some(parent)));
        self.namespace_mut(parent).children.insert(name, id);
        id
    }

    pub fn get_or_create_function_group(&mut self, owner: NamespaceId, name: StringId) -> FunctionGroupId {
        if let Some(&existing) = self.namespace(owner).function_groups.get(&name) {
            return existing;
        }
        let id = FunctionGroupId::new(self.function_groups.len());
        self.function_groups.push(FunctionGroup { full_name: name, owner, overloads: Vec::new() });
        self.namespace_mut(owner).function_groups.insert(name, id);
        id
    }

    #[must_use]
    pub fn function_group(&self, id: FunctionGroupId) -> &FunctionGroup {
        &self.function_groups[id.index()]
    }

    pub fn function_group_mut(&mut self, id: FunctionGroupId) -> &mut FunctionGroup {
        &mut self.function_groups[id.index()]
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        let group = function.group;
        let id = FunctionId::new(self.functions.len());
        self.functions.push(function);
        self.function_group_mut(group).overloads.push(id);
        id
    }

    #[must_use]
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn declare_global(&mut self, owner: NamespaceId, global: GlobalVariable) -> GlobalVariableId {
        let name = global.full_name;
        let id = GlobalVariableId::new(self.globals.len());
        self.globals.push(global);
        self.namespace_mut(owner).globals.insert(name, id);
        id
    }

    #[must_use]
    pub fn global(&self, id: GlobalVariableId) -> &GlobalVariable {
        &self.globals[id.index()]
    }

    pub fn global_mut(&mut self, id: GlobalVariableId) -> &mut GlobalVariable {
        &mut self.globals[id.index()]
    }

    /// Used to build `qInit`/`qDone` in (reverse) declaration order (§6.2).
    #[must_use]
    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    #[must_use]
    pub fn global_id_at(&self, index: usize) -> GlobalVariableId {
        GlobalVariableId::new(index)
    }

    /// Registers a class under `owner`, chaining it to `superclass` in the
    /// type registry at the same time so the two tables never disagree
    /// about a class's ancestry.
    pub fn declare_class(&mut self, owner: NamespaceId, name: StringId, superclass: Option<ClassId>) -> ClassId {
        let id = self.types.declare_class(name, superclass);
        self.namespace_mut(owner).classes.insert(name, id);
        id
    }

    /// Links an already-reserved class to its resolved superclass. Used once
    /// the class's name has already been registered (to make it visible to
    /// collision checks) but its superclass reference still needs resolving.
    pub fn set_class_superclass(&mut self, id: ClassId, superclass: Option<ClassId>) {
        self.types.set_superclass(id, superclass);
    }
}
