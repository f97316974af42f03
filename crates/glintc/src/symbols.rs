//! The runtime symbol model (§3.3): immutable identity objects the code
//! IR references. Populated by the declaration processor (§4.3) and never
//! mutated by pass 2 (§5, "Ordering between compiler passes").

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    diagnostics::SourceSpan,
    intern::StringId,
    types::{ClassId, Type},
};

/// Index of a namespace within [`crate::declare::World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NamespaceId(u32);

impl NamespaceId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("namespace table overflow"))
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a [`FunctionGroup`] within `World`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FunctionGroupId(u32);

impl FunctionGroupId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("function group table overflow"))
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a resolved overload within `World`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FunctionId(u32);

impl FunctionId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("function table overflow"))
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a [`GlobalVariable`] within `World`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GlobalVariableId(u32);

impl GlobalVariableId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("global variable table overflow"))
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A namespace: name, optional parent, ordered collections of nested
/// namespaces, classes, global variables and function groups (§3.3).
#[derive(Debug)]
pub struct Namespace {
    /// `None` only for the root namespace, which has no name of its own.
    pub name: Option<StringId>,
    pub parent: Option<NamespaceId>,
    pub children: IndexMap<StringId, NamespaceId>,
    pub classes: IndexMap<StringId, ClassId>,
    pub globals: IndexMap<StringId, GlobalVariableId>,
    pub function_groups: IndexMap<StringId, FunctionGroupId>,
}

impl Namespace {
    pub(crate) fn new(name: Option<StringId>, parent: Option<NamespaceId>) -> Self {
        Self {
            name,
            parent,
            children: IndexMap::new(),
            classes: IndexMap::new(),
            globals: IndexMap::new(),
            function_groups: IndexMap::new(),
        }
    }

    /// (I1) every name is unique across `{namespace, class, global, function
    /// group}` within one namespace.
    #[must_use]
    pub fn name_collides(&self, name: StringId) -> bool {
        self.children.contains_key(&name)
            || self.classes.contains_key(&name)
            || self.globals.contains_key(&name)
            || self.function_groups.contains_key(&name)
    }
}

/// The set of overloads sharing one name within a namespace (§3.3).
#[derive(Debug)]
pub struct FunctionGroup {
    pub full_name: StringId,
    pub owner: NamespaceId,
    pub overloads: Vec<FunctionId>,
}

/// A resolved, single function overload (§3.3).
#[derive(Debug)]
pub struct Function {
    pub group: FunctionGroupId,
    pub param_types: Vec<Type>,
    pub return_type: Type,
    pub locals: Vec<LocalVariable>,
    /// Monotonic temp counter used while lowering this function's body.
    pub next_temp: u32,
    /// Filled in by the IR builder (§4.5); `None` until pass 2 runs.
    pub body: Option<crate::code_ir::CodeBody>,
}

impl Function {
    #[must_use]
    pub(crate) fn new(group: FunctionGroupId, param_types: Vec<Type>, return_type: Type) -> Self {
        Self { group, param_types, return_type, locals: Vec::new(), next_temp: 0, body: None }
    }

    /// (I2) local indices are contiguous from 0: this is the only place a
    /// `LocalVariable` is created, so the invariant holds by construction.
    pub fn declare_local(&mut self, name: StringId, span: SourceSpan, ty: Type) -> LocalId {
        let id = LocalId(u32::try_from(self.locals.len()).expect("local variable overflow"));
        self.locals.push(LocalVariable { name, span, ty, index: id.0 });
        id
    }

    #[must_use]
    pub fn local(&self, id: LocalId) -> &LocalVariable {
        &self.locals[id.index()]
    }
}

/// Index of a [`LocalVariable`] within its owning [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LocalId(u32);

impl LocalId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Name, type, source location, and zero-based index of a local variable
/// (function argument or declared `my` variable) (§3.3).
#[derive(Debug, Clone)]
pub struct LocalVariable {
    pub name: StringId,
    pub span: SourceSpan,
    pub ty: Type,
    pub index: u32,
}

/// A module-level variable with a reader-writer lock at the runtime
/// boundary (§3.3, §5).
#[derive(Debug)]
pub struct GlobalVariable {
    pub full_name: StringId,
    pub ty: Type,
    pub has_value: bool,
    /// Constants follow "the same discipline as globals" (§4.3) and are
    /// folded into this table rather than given a parallel one; they are
    /// never targets of `Assignment to Global` lowering (§4.5.3).
    pub is_constant: bool,
}

/// Anything a name can resolve to (§4.2's `resolveSymbol`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Local(LocalId),
    Global(GlobalVariableId),
    FunctionGroup(FunctionGroupId),
    Class(ClassId),
}

/// Arbitrary additional name-to-type bindings a class scope or similar
/// might need; kept as a thin map since class member processing is out of
/// this spec's depth (§9 Open Questions) beyond existence and `*T`.
pub type NameMap = AHashMap<StringId, Symbol>;
