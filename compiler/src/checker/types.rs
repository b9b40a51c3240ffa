//! Interned semantic types
//!
//! Every distinct [`Type`] is stored once in the [`TypeTable`] and referred to
//! by [`TypeId`], so type equality is id equality. Unions are normalized on
//! construction (flattened, deduplicated, sorted) which keeps that property
//! for them too.

use std::fmt;

use fxhash::FxHashMap;

use crate::id_types::{NodeId, TypeId};

/// Value types that live unboxed in locals and fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Char,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    /// Surface keyword; `number` is accepted as an alias of `double`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(PrimitiveKind::Boolean),
            "byte" => Some(PrimitiveKind::Byte),
            "short" => Some(PrimitiveKind::Short),
            "char" => Some(PrimitiveKind::Char),
            "int" => Some(PrimitiveKind::Int),
            "long" => Some(PrimitiveKind::Long),
            "float" => Some(PrimitiveKind::Float),
            "double" | "number" => Some(PrimitiveKind::Double),
            _ => None,
        }
    }

    pub fn from_boxed_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.boxed_name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Short => "Short",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::Int => "Int",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Double => "Double",
        }
    }

    pub fn is_numeric(self) -> bool {
        self != PrimitiveKind::Boolean
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Char | PrimitiveKind::Int | PrimitiveKind::Long
        )
    }

    fn rank(self) -> u8 {
        match self {
            PrimitiveKind::Boolean => 0,
            PrimitiveKind::Byte => 1,
            PrimitiveKind::Short | PrimitiveKind::Char => 2,
            PrimitiveKind::Int => 3,
            PrimitiveKind::Long => 4,
            PrimitiveKind::Float => 5,
            PrimitiveKind::Double => 6,
        }
    }

    /// Implicit widening conversion
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        if self == target {
            return true;
        }
        if !self.is_numeric() || !target.is_numeric() {
            return false;
        }
        // short and char do not convert into each other
        if self.rank() == target.rank() {
            return false;
        }
        if self == PrimitiveKind::Char && target == PrimitiveKind::Short {
            return false;
        }
        self.rank() < target.rank()
    }

    /// Result kind of an arithmetic operator; integral operands promote to
    /// at least `int`
    pub fn arithmetic_result(self, other: PrimitiveKind) -> PrimitiveKind {
        let wider = if self.rank() >= other.rank() { self } else { other };
        if wider.rank() < PrimitiveKind::Int.rank() {
            PrimitiveKind::Int
        } else {
            wider
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveKind),
    /// Reference wrapper of a primitive (`Int`, `Double` ...)
    Boxed(PrimitiveKind),
    String,
    BigInt,
    Undefined,
    Null,
    Void,
    /// Root of every reference type
    Object,
    Class {
        decl: NodeId,
        name: String,
    },
    Interface {
        decl: NodeId,
        name: String,
    },
    Array(TypeId),
    /// Normalized: at least two arms, sorted, no nested unions
    Union(Vec<TypeId>),
    Function {
        params: Vec<TypeId>,
        ret: TypeId,
    },
    /// Result of a failed check; compatible with everything
    Error,
}

#[derive(Debug, Clone)]
struct CommonTypes {
    boolean: TypeId,
    int: TypeId,
    double: TypeId,
    string: TypeId,
    bigint: TypeId,
    undefined: TypeId,
    null: TypeId,
    void: TypeId,
    object: TypeId,
    error: TypeId,
}

#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<Type>,
    index: FxHashMap<Type, TypeId>,
    /// Direct supertypes of class and interface declarations
    supertypes: FxHashMap<NodeId, Vec<TypeId>>,
    common: CommonTypes,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            index: FxHashMap::default(),
            supertypes: FxHashMap::default(),
            common: CommonTypes {
                boolean: TypeId::invalid(),
                int: TypeId::invalid(),
                double: TypeId::invalid(),
                string: TypeId::invalid(),
                bigint: TypeId::invalid(),
                undefined: TypeId::invalid(),
                null: TypeId::invalid(),
                void: TypeId::invalid(),
                object: TypeId::invalid(),
                error: TypeId::invalid(),
            },
        };
        table.common = CommonTypes {
            boolean: table.intern(Type::Primitive(PrimitiveKind::Boolean)),
            int: table.intern(Type::Primitive(PrimitiveKind::Int)),
            double: table.intern(Type::Primitive(PrimitiveKind::Double)),
            string: table.intern(Type::String),
            bigint: table.intern(Type::BigInt),
            undefined: table.intern(Type::Undefined),
            null: table.intern(Type::Null),
            void: table.intern(Type::Void),
            object: table.intern(Type::Object),
            error: table.intern(Type::Error),
        };
        table
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.index.get(&ty) {
            return id;
        }
        let id = TypeId::from_index(self.types.len());
        self.types.push(ty.clone());
        self.index.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    // === Common types ===

    pub fn boolean_type(&self) -> TypeId {
        self.common.boolean
    }

    pub fn int_type(&self) -> TypeId {
        self.common.int
    }

    pub fn double_type(&self) -> TypeId {
        self.common.double
    }

    pub fn string_type(&self) -> TypeId {
        self.common.string
    }

    pub fn bigint_type(&self) -> TypeId {
        self.common.bigint
    }

    pub fn undefined_type(&self) -> TypeId {
        self.common.undefined
    }

    pub fn null_type(&self) -> TypeId {
        self.common.null
    }

    pub fn void_type(&self) -> TypeId {
        self.common.void
    }

    pub fn object_type(&self) -> TypeId {
        self.common.object
    }

    pub fn error_type(&self) -> TypeId {
        self.common.error
    }

    // === Construction ===

    pub fn primitive(&mut self, kind: PrimitiveKind) -> TypeId {
        self.intern(Type::Primitive(kind))
    }

    pub fn boxed(&mut self, kind: PrimitiveKind) -> TypeId {
        self.intern(Type::Boxed(kind))
    }

    pub fn array(&mut self, element: TypeId) -> TypeId {
        self.intern(Type::Array(element))
    }

    pub fn function(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern(Type::Function { params, ret })
    }

    pub fn class(&mut self, decl: NodeId, name: &str) -> TypeId {
        self.intern(Type::Class {
            decl,
            name: name.to_string(),
        })
    }

    pub fn interface(&mut self, decl: NodeId, name: &str) -> TypeId {
        self.intern(Type::Interface {
            decl,
            name: name.to_string(),
        })
    }

    /// Flatten, sort and deduplicate; a single remaining arm is returned as is
    pub fn union(&mut self, arms: Vec<TypeId>) -> TypeId {
        let mut flat = Vec::with_capacity(arms.len());
        for arm in arms {
            match self.get(arm) {
                Type::Union(inner) => flat.extend(inner.iter().copied()),
                _ => flat.push(arm),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => self.error_type(),
            1 => flat[0],
            _ => self.intern(Type::Union(flat)),
        }
    }

    // === Queries ===

    pub fn primitive_kind(&self, id: TypeId) -> Option<PrimitiveKind> {
        match self.get(id) {
            Type::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Primitive kind of a primitive or its boxed wrapper
    pub fn numeric_kind(&self, id: TypeId) -> Option<PrimitiveKind> {
        match self.get(id) {
            Type::Primitive(kind) | Type::Boxed(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_primitive(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Primitive(_))
    }

    pub fn is_reference(&self, id: TypeId) -> bool {
        !matches!(self.get(id), Type::Primitive(_) | Type::Void | Type::Error)
    }

    pub fn is_error(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Error)
    }

    /// Declaration node of a class or interface type
    pub fn declaration(&self, id: TypeId) -> Option<NodeId> {
        match self.get(id) {
            Type::Class { decl, .. } | Type::Interface { decl, .. } => Some(*decl),
            _ => None,
        }
    }

    pub fn set_supertypes(&mut self, decl: NodeId, supertypes: Vec<TypeId>) {
        self.supertypes.insert(decl, supertypes);
    }

    pub fn supertypes(&self, decl: NodeId) -> &[TypeId] {
        self.supertypes.get(&decl).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `sub` equals `sup` or inherits from it through extends/implements
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        let mut pending = vec![sub];
        let mut seen = Vec::new();
        while let Some(current) = pending.pop() {
            if current == sup {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            if let Some(decl) = self.declaration(current) {
                pending.extend(self.supertypes(decl).iter().copied());
            }
        }
        false
    }

    pub fn is_assignable(&self, source: TypeId, target: TypeId) -> bool {
        if source == target {
            return true;
        }
        match (self.get(source), self.get(target)) {
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::Union(arms), _) => arms.iter().all(|arm| self.is_assignable(*arm, target)),
            (_, Type::Union(arms)) => arms.iter().any(|arm| self.is_assignable(source, *arm)),
            (Type::Primitive(from), Type::Primitive(to))
            | (Type::Primitive(from), Type::Boxed(to))
            | (Type::Boxed(from), Type::Primitive(to)) => from.widens_to(*to),
            (Type::Void | Type::Undefined | Type::Null, Type::Object) => false,
            (_, Type::Object) => true,
            (Type::Class { .. } | Type::Interface { .. }, Type::Class { .. } | Type::Interface { .. }) => {
                self.is_subtype(source, target)
            }
            (Type::Array(a), Type::Array(b)) => a == b,
            _ => false,
        }
    }

    /// Parseable surface syntax for a type
    pub fn type_to_string(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Primitive(kind) => kind.name().to_string(),
            Type::Boxed(kind) => kind.boxed_name().to_string(),
            Type::String => "string".into(),
            Type::BigInt => "bigint".into(),
            Type::Undefined => "undefined".into(),
            Type::Null => "null".into(),
            Type::Void => "void".into(),
            Type::Object => "Object".into(),
            Type::Class { name, .. } | Type::Interface { name, .. } => name.clone(),
            Type::Array(element) => {
                let inner = self.type_to_string(*element);
                if matches!(self.get(*element), Type::Union(_)) {
                    format!("({})[]", inner)
                } else {
                    format!("{}[]", inner)
                }
            }
            Type::Union(arms) => arms
                .iter()
                .map(|arm| self.type_to_string(*arm))
                .collect::<Vec<_>>()
                .join(" | "),
            Type::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| self.type_to_string(*p)).collect();
                format!("({}) => {}", params.join(", "), self.type_to_string(*ret))
            }
            Type::Error => "<error>".into(),
        }
    }
}
