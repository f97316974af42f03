//! Type registry & operator/conversion tables (§3.1, §4.1).
//!
//! Grounded in `original_source/include/qore/core/{Any,BinaryOperator,
//! Conversion}.h`: the built-in set is closed, conversions and binary
//! operators are small finite tables keyed by `(from, to)` /
//! `(kind, left, right)`, and `Any` participates as an ordinary — if
//! last-resort — entry rather than a special case threaded through the
//! resolver.

use std::fmt;

use ahash::AHashMap;

use crate::intern::StringId;

/// Stable identity for a user class, handed out by [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ClassId(u32);

impl ClassId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The closed built-in type set (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Error,
    Any,
    Nothing,
    Bool,
    SoftBool,
    Int,
    IntOpt,
    SoftInt,
    String,
    StringOpt,
    SoftString,
}

impl BuiltinType {
    const ALL: [Self; 11] = [
        Self::Error,
        Self::Any,
        Self::Nothing,
        Self::Bool,
        Self::SoftBool,
        Self::Int,
        Self::IntOpt,
        Self::SoftInt,
        Self::String,
        Self::StringOpt,
        Self::SoftString,
    ];

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Any => "any",
            Self::Nothing => "nothing",
            Self::Bool => "bool",
            Self::SoftBool => "softbool",
            Self::Int => "int",
            Self::IntOpt => "*int",
            Self::SoftInt => "softint",
            Self::String => "string",
            Self::StringOpt => "*string",
            Self::SoftString => "softstring",
        }
    }

    /// True iff values of this type are heap-allocated and reference
    /// counted (§3.1). `Nothing`, `Bool`, `Int` are primitive; `Any` and
    /// `String` (and their soft/optional forms, which still box through
    /// `Any` or a boxed string) are reference counted.
    #[must_use]
    pub const fn is_ref_counted(self) -> bool {
        match self {
            Self::Nothing | Self::Bool | Self::SoftBool | Self::Int | Self::IntOpt | Self::SoftInt => false,
            Self::Error | Self::Any | Self::String | Self::StringOpt | Self::SoftString => true,
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.display_name().trim_start_matches('*') == token.trim_start_matches('*'))
    }
}

/// A resolved type: either one of the closed built-ins, a user class, or
/// the optional (`*T`) form of a user class (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Builtin(BuiltinType),
    Class(ClassId),
    /// `*T`: a class type that additionally admits `Nothing`.
    ClassOpt(ClassId),
}

impl Type {
    #[must_use]
    pub const fn is_ref_counted_builtin(self) -> bool {
        matches!(self, Self::Builtin(b) if b.is_ref_counted())
    }
}

/// A stable, non-executing identity for a runtime conversion or operator
/// function: the IR references this, back ends resolve it to an actual
/// callable. Not a [`crate::symbols::Function`] — these are compiler
/// intrinsics, never user-overloadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeFn(pub &'static str);

impl fmt::Display for RuntimeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the implicit-conversion table (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub from: Type,
    pub to: Type,
    pub function: RuntimeFn,
    pub can_throw: bool,
}

/// Outcome of looking up a conversion: identity needs no code, a real
/// conversion was found, or no path exists and the caller must diagnose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionLookup {
    Identity,
    Found(Conversion),
    NoPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
}

/// One entry of the binary-operator table (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryOp {
    pub kind: BinOpKind,
    pub left: Type,
    pub right: Type,
    pub function: RuntimeFn,
    pub result_type: Type,
    pub can_throw: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadFail {
    NoMatch,
    Ambiguous,
}

struct ClassInfo {
    name: StringId,
    superclass: Option<ClassId>,
}

/// Owns the built-in type singletons, the class universe, and the finite
/// conversion / binary-operator tables.
///
/// One registry is shared (by reference) across an entire compiled unit;
/// class ids it hands out remain valid for the registry's lifetime.
pub struct TypeRegistry {
    classes: Vec<ClassInfo>,
    conversions: Vec<Conversion>,
    binary_ops: Vec<BinaryOp>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut reg = Self { classes: Vec::new(), conversions: Vec::new(), binary_ops: Vec::new() };
        reg.seed_conversions();
        reg.seed_binary_ops();
        reg
    }

    pub fn declare_class(&mut self, name: StringId, superclass: Option<ClassId>) -> ClassId {
        let id = ClassId(u32::try_from(self.classes.len()).expect("class table overflow"));
        self.classes.push(ClassInfo { name, superclass });
        id
    }

    /// Links `id` to `superclass` after the fact — used when a class is
    /// reserved (to make its name visible for collision checks) before its
    /// superclass reference has been resolved.
    pub(crate) fn set_superclass(&mut self, id: ClassId, superclass: Option<ClassId>) {
        self.classes[id.index()].superclass = superclass;
    }

    #[must_use]
    pub fn class_name(&self, id: ClassId) -> StringId {
        self.classes[id.index()].name
    }

    #[must_use]
    pub fn class_superclass(&self, id: ClassId) -> Option<ClassId> {
        self.classes[id.index()].superclass
    }

    /// `lookupBuiltinType(token, asterisk)`. Built-in names never take an
    /// asterisk form of their own: `*int`/`*string` are already distinct
    /// built-ins (`IntOpt`/`StringOpt`), so `asterisk = true` only ever
    /// produces a result for user classes, handled by the scope stack's
    /// class lookup instead.
    #[must_use]
    pub fn lookup_builtin_type(&self, token: &str, asterisk: bool) -> Option<Type> {
        if asterisk {
            return None;
        }
        BuiltinType::from_token(token).map(Type::Builtin)
    }

    #[must_use]
    pub fn class_type(&self, id: ClassId, optional: bool) -> Type {
        if optional { Type::ClassOpt(id) } else { Type::Class(id) }
    }

    /// `findConversion(from, to)`.
    #[must_use]
    pub fn find_conversion(&self, from: Type, to: Type) -> ConversionLookup {
        if from == to {
            return ConversionLookup::Identity;
        }
        if let Some(c) = self.conversions.iter().find(|c| c.from == from && c.to == to) {
            return ConversionLookup::Found(*c);
        }
        if let Some(c) = self.structural_class_conversion(from, to) {
            return ConversionLookup::Found(c);
        }
        ConversionLookup::NoPath
    }

    /// Conversions involving `*T` that hold for every class `T`, so they
    /// aren't enumerable in the finite table: `Nothing -> *T`, `T -> *T`
    /// (both widening, never throw), and `*T -> T` (narrowing, throws if
    /// the value is `Nothing`).
    fn structural_class_conversion(&self, from: Type, to: Type) -> Option<Conversion> {
        match (from, to) {
            (Type::Builtin(BuiltinType::Nothing), Type::ClassOpt(_)) => {
                Some(Conversion { from, to, function: RuntimeFn("glint_widen_nothing_to_class_opt"), can_throw: false })
            }
            (Type::Class(c), Type::ClassOpt(c2)) if c == c2 => {
                Some(Conversion { from, to, function: RuntimeFn("glint_widen_class_to_class_opt"), can_throw: false })
            }
            (Type::ClassOpt(c), Type::Class(c2)) if c == c2 => {
                Some(Conversion { from, to, function: RuntimeFn("glint_narrow_class_opt_to_class"), can_throw: true })
            }
            _ => None,
        }
    }

    /// `findBinaryOperator(kind, left, right)`, with the tie-breaking
    /// rules of §4.1: fewer operand conversions wins, then fewer soft
    /// operand types; a genuine tie is ambiguous.
    pub fn find_binary_operator(&self, kind: BinOpKind, left: Type, right: Type) -> Result<BinaryOp, OverloadFail> {
        let mut best: Option<(BinaryOp, u32, u32)> = None;
        let mut tied = false;
        for candidate in self.binary_ops.iter().filter(|op| op.kind == kind) {
            let Some(left_conv) = self.find_conversion(left, candidate.left).ok_len() else { continue };
            let Some(right_conv) = self.find_conversion(right, candidate.right).ok_len() else { continue };
            let conversions = left_conv + right_conv;
            let softness = u32::from(is_soft(candidate.left)) + u32::from(is_soft(candidate.right));
            match &best {
                None => {
                    best = Some((*candidate, conversions, softness));
                    tied = false;
                }
                Some((_, bc, bs)) => match (conversions.cmp(bc), softness.cmp(bs)) {
                    (std::cmp::Ordering::Less, _) | (std::cmp::Ordering::Equal, std::cmp::Ordering::Less) => {
                        best = Some((*candidate, conversions, softness));
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
            Some((op, ..)) => Ok(op),
        }
    }

    fn seed_conversions(&mut self) {
        use BuiltinType::{Any, Bool, Int, IntOpt, SoftBool, SoftInt, SoftString, String, StringOpt};
        let mut push = |from: BuiltinType, to: BuiltinType, function: &'static str, can_throw: bool| {
            self.conversions.push(Conversion {
                from: Type::Builtin(from),
                to: Type::Builtin(to),
                function: RuntimeFn(function),
                can_throw,
            });
        };
        // Widening into a soft or optional sibling never throws.
        push(Int, SoftInt, "glint_int_to_softint", false);
        push(SoftInt, Int, "glint_softint_to_int", false);
        push(Bool, SoftBool, "glint_bool_to_softbool", false);
        push(SoftBool, Bool, "glint_softbool_to_bool", false);
        push(String, SoftString, "glint_string_to_softstring", false);
        push(SoftString, String, "glint_softstring_to_string", false);
        push(Int, IntOpt, "glint_int_to_intopt", false);
        push(IntOpt, Int, "glint_intopt_to_int", true);
        push(String, StringOpt, "glint_string_to_stringopt", false);
        push(StringOpt, String, "glint_stringopt_to_string", true);
        // Boxing any built-in into Any never throws.
        for t in [Bool, SoftBool, Int, IntOpt, SoftInt, String, StringOpt, SoftString] {
            push(t, Any, "glint_box_any", false);
        }
        // Any is the source of last resort: runtime tag dispatch, can throw.
        for t in [Bool, SoftBool, Int, IntOpt, SoftInt, String, StringOpt, SoftString] {
            push(Any, t, "glint_unbox_any", true);
        }
    }

    fn seed_binary_ops(&mut self) {
        use BinOpKind::{Add, Eq, Lt};
        use BuiltinType::{Any, Int, SoftInt, String};
        let mut push = |kind: BinOpKind, left: BuiltinType, right: BuiltinType, result: BuiltinType, function: &'static str, can_throw: bool| {
            self.binary_ops.push(BinaryOp {
                kind,
                left: Type::Builtin(left),
                right: Type::Builtin(right),
                function: RuntimeFn(function),
                result_type: Type::Builtin(result),
                can_throw,
            });
        };
        push(Add, Int, Int, Int, "glint_add_int_int", false);
        push(Add, SoftInt, SoftInt, SoftInt, "glint_add_softint_softint", false);
        push(Add, String, String, String, "glint_add_string_string", true);
        push(Add, Any, Any, Any, "glint_add_any_any", true);
        push(Eq, Int, Int, BuiltinType::Bool, "glint_eq_int_int", false);
        push(Lt, Int, Int, BuiltinType::Bool, "glint_lt_int_int", false);
    }
}

fn is_soft(ty: Type) -> bool {
    matches!(ty, Type::Builtin(BuiltinType::SoftBool | BuiltinType::SoftInt | BuiltinType::SoftString))
}

trait ConversionCost {
    fn ok_len(self) -> Option<u32>;
}

impl ConversionCost for ConversionLookup {
    fn ok_len(self) -> Option<u32> {
        match self {
            Self::Identity => Some(0),
            Self::Found(_) => Some(1),
            Self::NoPath => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BinOpKind, BuiltinType, ConversionLookup, OverloadFail, Type, TypeRegistry};

    #[test]
    fn identity_conversion_is_free() {
        let reg = TypeRegistry::new();
        let int = Type::Builtin(BuiltinType::Int);
        assert_eq!(reg.find_conversion(int, int), ConversionLookup::Identity);
    }

    #[test]
    fn softint_plus_softint_is_not_the_any_generic() {
        let reg = TypeRegistry::new();
        let soft = Type::Builtin(BuiltinType::SoftInt);
        let op = reg.find_binary_operator(BinOpKind::Add, soft, soft).expect("should resolve");
        assert_eq!(op.function.0, "glint_add_softint_softint");
    }

    #[test]
    fn any_plus_any_prefers_generic_over_unboxing_both_sides() {
        let reg = TypeRegistry::new();
        let any = Type::Builtin(BuiltinType::Any);
        let op = reg.find_binary_operator(BinOpKind::Add, any, any).expect("should resolve");
        assert_eq!(op.function.0, "glint_add_any_any");
    }

    #[test]
    fn unrelated_types_fail_to_resolve() {
        let reg = TypeRegistry::new();
        let string = Type::Builtin(BuiltinType::String);
        let int = Type::Builtin(BuiltinType::Int);
        assert_eq!(reg.find_binary_operator(BinOpKind::Lt, string, int), Err(OverloadFail::NoMatch));
    }

    #[test]
    fn class_opt_admits_nothing() {
        let mut reg = TypeRegistry::new();
        let name = crate::intern::StringTable::new().intern("Widget");
        // fresh table above only to mint a StringId cheaply; class name text
        // itself is irrelevant to this conversion check.
        let class = reg.declare_class(name, None);
        let nothing = Type::Builtin(BuiltinType::Nothing);
        let opt = Type::ClassOpt(class);
        assert!(matches!(reg.find_conversion(nothing, opt), ConversionLookup::Found(_)));
    }
}
