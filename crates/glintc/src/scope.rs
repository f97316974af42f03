//! The scope stack (§4.2): `BlockScope -> FunctionScope -> (optional
//! ClassScope) -> NamespaceScope -> RootNamespaceScope`, innermost first.
//!
//! Grounded on `original_source/include/qore/comp/sem/{BlockScope,
//! FunctionScope,NamespaceScope,GlobalScope}.h`: each scope level answers
//! `resolveType`/`resolveSymbol`/`declareLocal` by either handling the
//! query itself or delegating outward. Here that's a single `ScopeStack`
//! walked from the end, rather than a virtual-dispatch chain of objects —
//! the stack shape is the same, only the dispatch mechanism changes
//! (§9: "visitor hierarchies... become one dispatch function").

use ahash::AHashMap;

use crate::{
    ast::TypeRef,
    diagnostics::{DiagnosticId, SourceSpan, report},
    intern::StringId,
    symbols::{FunctionId, LocalId, Symbol},
    types::{ClassId, Type},
    world::World,
};

struct BlockFrame {
    /// Only names declared *directly* in this block; lookups that miss
    /// here fall through to the enclosing block/function frame.
    locals: AHashMap<StringId, LocalId>,
}

enum Frame {
    Block(BlockFrame),
    Function(FunctionId),
    Class(ClassId),
    Namespace(crate::symbols::NamespaceId),
}

/// The live chain of lexical contexts while lowering one function body
/// (or the synthesized `qMain`/`qInit`/`qDone`).
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    #[must_use]
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push_namespace(&mut self, ns: crate::symbols::NamespaceId) {
        self.frames.push(Frame::Namespace(ns));
    }

    pub fn pop_namespace(&mut self) {
        assert!(matches!(self.frames.pop(), Some(Frame::Namespace(_))));
    }

    pub fn push_class(&mut self, class: ClassId) {
        self.frames.push(Frame::Class(class));
    }

    pub fn pop_class(&mut self) {
        assert!(matches!(self.frames.pop(), Some(Frame::Class(_))));
    }

    pub fn push_function(&mut self, function: FunctionId) {
        self.frames.push(Frame::Function(function));
    }

    pub fn pop_function(&mut self) {
        assert!(matches!(self.frames.pop(), Some(Frame::Function(_))));
    }

    pub fn push_block(&mut self) {
        self.frames.push(Frame::Block(BlockFrame { locals: AHashMap::new() }));
    }

    pub fn pop_block(&mut self) {
        assert!(matches!(self.frames.pop(), Some(Frame::Block(_))));
    }

    #[must_use]
    pub fn current_function(&self) -> FunctionId {
        self.frames
            .iter()
            .rev()
            .find_map(|f| if let Frame::Function(f) = f { Some(*f) } else { None })
            .expect("declareLocal/resolveSymbol used outside a function scope")
    }

    /// `declareLocal(name, loc, type)`: duplicate in the *same* block is
    /// diagnosed; the local is still created (so pass 2 sees a
    /// well-formed tree) but the duplicate name is not added to the
    /// block's lookup map, so it shadows nothing (§4.2).
    pub fn declare_local(&mut self, world: &mut World, sink: &mut dyn crate::diagnostics::DiagnosticSink, name: StringId, span: SourceSpan, ty: Type) -> LocalId {
        let function = self.current_function();
        let id = world.function_mut(function).declare_local(name, span, ty);
        let block = self
            .frames
            .iter_mut()
            .rev()
            .find_map(|f| if let Frame::Block(b) = f { Some(b) } else { None })
            .expect("declareLocal used outside a block scope");
        if let Some(&previous) = block.locals.get(&name) {
            let previous_span = world.function(function).local(previous).span;
            report(sink, DiagnosticId::SemaDuplicateLocalVariableName, span)
                .arg(world.strings.resolve(name).to_owned())
                .emit();
            report(sink, DiagnosticId::SemaPreviousDeclaration, previous_span).emit();
        } else {
            block.locals.insert(name, id);
        }
        id
    }

    /// `resolveSymbol(name)`: local/argument, then global, function
    /// group, constant, or class in the nearest enclosing namespace.
    pub fn resolve_symbol(&self, world: &World, name: StringId) -> Option<Symbol> {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Block(b) => {
                    if let Some(&local) = b.locals.get(&name) {
                        return Some(Symbol::Local(local));
                    }
                }
                Frame::Function(_) | Frame::Class(_) => {}
                Frame::Namespace(ns) => {
                    let namespace = world.namespace(*ns);
                    if let Some(&g) = namespace.globals.get(&name) {
                        return Some(Symbol::Global(g));
                    }
                    if let Some(&fg) = namespace.function_groups.get(&name) {
                        return Some(Symbol::FunctionGroup(fg));
                    }
                    if let Some(&c) = namespace.classes.get(&name) {
                        return Some(Symbol::Class(c));
                    }
                }
            }
        }
        None
    }

    /// `resolveType(astType)`: built-ins short-circuit; otherwise the
    /// token names a class, resolved by walking namespace frames from
    /// innermost outward — unless root-qualified, which forces
    /// root-only lookup.
    pub fn resolve_type(
        &self,
        world: &World,
        sink: &mut dyn crate::diagnostics::DiagnosticSink,
        type_ref: &TypeRef,
    ) -> Type {
        if !type_ref.root_qualified && type_ref.segments.len() == 1 {
            let token = world.strings.resolve(type_ref.segments[0]);
            if let Some(ty) = world.types.lookup_builtin_type(token, type_ref.asterisk) {
                return ty;
            }
        }
        if let Some(class) = self.resolve_class_path(world, type_ref) {
            return world.types.class_type(class, type_ref.asterisk);
        }
        let name = type_ref.segments.iter().map(|s| world.strings.resolve(*s)).collect::<Vec<_>>().join("::");
        report(sink, DiagnosticId::SemaUnresolvedClass, type_ref.span).arg(name).emit();
        Type::Builtin(crate::types::BuiltinType::Error)
    }

    fn resolve_class_path(&self, world: &World, type_ref: &TypeRef) -> Option<ClassId> {
        if type_ref.root_qualified {
            return Self::lookup_path_from(world, world.root_namespace(), &type_ref.segments);
        }
        for frame in self.frames.iter().rev() {
            if let Frame::Namespace(ns) = frame
                && let Some(class) = Self::lookup_path_from(world, *ns, &type_ref.segments)
            {
                return Some(class);
            }
        }
        None
    }

    fn lookup_path_from(world: &World, start: crate::symbols::NamespaceId, segments: &[StringId]) -> Option<ClassId> {
        let (last, prefix) = segments.split_last()?;
        let mut ns = start;
        for &segment in prefix {
            ns = *world.namespace(ns).children.get(&segment)?;
        }
        world.namespace(ns).classes.get(last).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::ScopeStack;
    use crate::{
        diagnostics::CollectingSink,
        symbols::{Function, Symbol},
        types::{BuiltinType, Type},
        world::World,
    };

    #[test]
    fn duplicate_local_in_same_block_is_diagnosed_but_still_created() {
        let mut world = World::new();
        let mut sink = CollectingSink::new();
        let root = world.root_namespace();
        let group_name = world.intern("f");
        let group = world.get_or_create_function_group(root, group_name);
        let f = world.add_function(Function::new(group, vec![], Type::Builtin(BuiltinType::Nothing)));

        let mut scopes = ScopeStack::new();
        scopes.push_namespace(root);
        scopes.push_function(f);
        scopes.push_block();

        let x = world.intern("x");
        let span = crate::diagnostics::SourceSpan::synthetic();
        let int = Type::Builtin(BuiltinType::Int);
        let first = scopes.declare_local(&mut world, &mut sink, x, span, int);
        let second = scopes.declare_local(&mut world, &mut sink, x, span, int);
        assert_ne!(first, second);
        assert!(sink.has_id(crate::diagnostics::DiagnosticId::SemaDuplicateLocalVariableName));
        assert_eq!(scopes.resolve_symbol(&world, x), Some(Symbol::Local(first)));
    }
}
