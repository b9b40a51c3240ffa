//! Owned syntax tree produced by the grammar parser
//!
//! Every node carries a byte [`Span`] into the parsed text. Placeholders only
//! appear in trees parsed in format mode; the compiler replaces them with
//! caller-supplied fragments when it moves the tree into its arena.

use std::fmt;

/// Byte range into the parsed text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Byte offset of the start (inclusive)
    pub start: usize,
    /// Byte offset of the end (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Placeholders
// =============================================================================

/// Kind code of a placeholder token (`@@E1`, `@@I2`, `@@[S3` ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// `E`: any expression
    Expression,
    /// `I`: an identifier
    Identifier,
    /// `T`: a type annotation
    Type,
    /// `S`: a list of statements
    Statements,
    /// `N`: any node
    Node,
}

impl PlaceholderKind {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'E' => Some(PlaceholderKind::Expression),
            'I' => Some(PlaceholderKind::Identifier),
            'T' => Some(PlaceholderKind::Type),
            'S' => Some(PlaceholderKind::Statements),
            'N' => Some(PlaceholderKind::Node),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            PlaceholderKind::Expression => 'E',
            PlaceholderKind::Identifier => 'I',
            PlaceholderKind::Type => 'T',
            PlaceholderKind::Statements => 'S',
            PlaceholderKind::Node => 'N',
        }
    }
}

/// A typed hole in a format template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    /// Written with the `[` array marker, or an `S` placeholder
    pub array: bool,
    /// 1-based index into the insertion list
    pub index: usize,
    pub span: Span,
}

impl Placeholder {
    /// True when the placeholder splices a list of nodes rather than one node
    pub fn is_list(&self) -> bool {
        self.array || self.kind == PlaceholderKind::Statements
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@{}{}{}",
            if self.array { "[" } else { "" },
            self.kind.code(),
            self.index
        )
    }
}

/// An entry of a node list: either a parsed node or a list placeholder whose
/// fragments are spliced in place.
#[derive(Debug, Clone, PartialEq)]
pub enum Item<T> {
    Node(T),
    Splice(Placeholder),
}

// =============================================================================
// Names and modifiers
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Ident {
    Name { name: String, span: Span },
    Placeholder(Placeholder),
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Ident::Name {
            name: name.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Ident::Name { span, .. } => *span,
            Ident::Placeholder(p) => p.span,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Ident::Name { name, .. } => Some(name),
            Ident::Placeholder(_) => None,
        }
    }
}

/// Declaration modifiers as a bit set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModifierFlags(u32);

impl ModifierFlags {
    pub const NONE: Self = Self(0);
    pub const PUBLIC: Self = Self(1 << 0);
    pub const PRIVATE: Self = Self(1 << 1);
    pub const PROTECTED: Self = Self(1 << 2);
    pub const STATIC: Self = Self(1 << 3);
    pub const ABSTRACT: Self = Self(1 << 4);
    pub const READONLY: Self = Self(1 << 5);
    pub const OVERRIDE: Self = Self(1 << 6);
    /// Property declared with `?`
    pub const OPTIONAL: Self = Self(1 << 7);

    pub const ACCESS: Self = Self(Self::PUBLIC.0 | Self::PRIVATE.0 | Self::PROTECTED.0);

    /// Modifiers in the order the printer emits them
    pub const KEYWORDS: [(Self, &'static str); 7] = [
        (Self::PUBLIC, "public"),
        (Self::PRIVATE, "private"),
        (Self::PROTECTED, "protected"),
        (Self::STATIC, "static"),
        (Self::ABSTRACT, "abstract"),
        (Self::OVERRIDE, "override"),
        (Self::READONLY, "readonly"),
    ];

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::KEYWORDS
            .iter()
            .find(|(_, kw)| *kw == word)
            .map(|(flag, _)| *flag)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Operators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Ushr,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
        }
    }

    /// Binding strength, higher binds tighter. `as` sits at the relational level.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::BitOr => 3,
            BinaryOp::BitXor => 4,
            BinaryOp::BitAnd => 5,
            BinaryOp::Eq | BinaryOp::NotEq => 6,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 7,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => 8,
            BinaryOp::Add | BinaryOp::Sub => 9,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 10,
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::Shl
                | BinaryOp::Shr
                | BinaryOp::Ushr
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

pub const RELATIONAL_PRECEDENCE: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-expr`
    Neg,
    /// `+expr`
    Plus,
    /// `!expr`
    Not,
    /// `~expr`
    BitNot,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl UpdateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOp::Increment => "++",
            UpdateOp::Decrement => "--",
        }
    }

    /// The arithmetic operator an update applies with a literal one
    pub fn binary_op(self) -> BinaryOp {
        match self {
            UpdateOp::Increment => BinaryOp::Add,
            UpdateOp::Decrement => BinaryOp::Sub,
        }
    }
}

/// Assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    UshrAssign,
}

impl AssignOp {
    /// Longest spelling first so `>>>=` is never read as `>>=`
    pub const ALL: [(&'static str, AssignOp); 12] = [
        (">>>=", AssignOp::UshrAssign),
        (">>=", AssignOp::ShrAssign),
        ("<<=", AssignOp::ShlAssign),
        ("+=", AssignOp::AddAssign),
        ("-=", AssignOp::SubAssign),
        ("*=", AssignOp::MulAssign),
        ("/=", AssignOp::DivAssign),
        ("%=", AssignOp::ModAssign),
        ("&=", AssignOp::AndAssign),
        ("|=", AssignOp::OrAssign),
        ("^=", AssignOp::XorAssign),
        ("=", AssignOp::Assign),
    ];

    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(s, _)| *s)
            .unwrap_or("=")
    }

    /// Operator combined by a compound assignment; `None` for plain `=`
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
            AssignOp::DivAssign => Some(BinaryOp::Div),
            AssignOp::ModAssign => Some(BinaryOp::Mod),
            AssignOp::AndAssign => Some(BinaryOp::BitAnd),
            AssignOp::OrAssign => Some(BinaryOp::BitOr),
            AssignOp::XorAssign => Some(BinaryOp::BitXor),
            AssignOp::ShlAssign => Some(BinaryOp::Shl),
            AssignOp::ShrAssign => Some(BinaryOp::Shr),
            AssignOp::UshrAssign => Some(BinaryOp::Ushr),
        }
    }

    pub fn is_compound(self) -> bool {
        self != AssignOp::Assign
    }
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub kind: TypeKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// `int`, `Foo`, `undefined`, `void` ...
    Named(String),
    /// `A | B | C`
    Union(Vec<Type>),
    /// `T[]`
    Array(Box<Type>),
    Placeholder(Placeholder),
}

// =============================================================================
// Expressions
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Number literal, kept as written (`1`, `2.5`)
    Number(String),
    /// `123n`, digits only
    BigInt(String),
    String(String),
    Bool(bool),
    Undefined,
    Null,
    This,
    Ident(Ident),
    /// `object.property`
    Member { object: Box<Expr>, property: Ident },
    /// `object[index]`
    Index { object: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Item<Expr>> },
    New { class: Ident, args: Vec<Item<Expr>> },
    Array(Vec<Item<Expr>>),
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Update { op: UpdateOp, prefix: bool, operand: Box<Expr> },
    Assign { op: AssignOp, target: Box<Expr>, value: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
    As { expr: Box<Expr>, ty: Type },
    /// `({ statements })`
    Block(Block),
    /// `@@E1`, `@@N1` or `@@I1` in expression position
    Placeholder(Placeholder),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Expressions that may stand on the left of `=` or under `++`/`--`
    pub fn is_assignment_target(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Ident(_)
                | ExprKind::Member { .. }
                | ExprKind::Index { .. }
                | ExprKind::Placeholder(_)
        )
    }
}

// =============================================================================
// Statements and declarations
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub items: Vec<Item<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Let,
    Const,
}

impl VarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Var {
        kind: VarKind,
        name: Ident,
        ty: Option<Type>,
        init: Option<Expr>,
    },
    Block(Block),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Empty,
    Expr(Expr),
    Function(FunctionDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    /// A lone `@@N1` or `@@E1` standing for a whole statement
    Placeholder(Placeholder),
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub modifiers: ModifierFlags,
    pub name: Ident,
    pub extends: Option<Ident>,
    pub implements: Vec<Ident>,
    pub body: Vec<Item<ClassElement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: Ident,
    pub extends: Vec<Ident>,
    pub body: Vec<Item<ClassElement>>,
    /// Span of the `{ ... }` member list
    pub body_span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Method,
    Get,
    Set,
    Constructor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassElement {
    pub modifiers: ModifierFlags,
    pub kind: ClassElementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassElementKind {
    Property {
        name: Ident,
        ty: Type,
        init: Option<Expr>,
    },
    Method {
        kind: MethodKind,
        name: Ident,
        params: Vec<Param>,
        return_type: Option<Type>,
        body: Option<Block>,
    },
    /// `@@N1` standing for a whole member
    Placeholder(Placeholder),
}

/// A parsed compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub items: Vec<Item<Stmt>>,
    pub span: Span,
}

// =============================================================================
// Placeholder collection
// =============================================================================

/// Every placeholder of a tree in source order
pub trait CollectPlaceholders {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>);

    fn placeholders(&self) -> Vec<Placeholder> {
        let mut out = Vec::new();
        self.collect_placeholders(&mut out);
        out
    }
}

impl<T: CollectPlaceholders> CollectPlaceholders for Item<T> {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        match self {
            Item::Node(node) => node.collect_placeholders(out),
            Item::Splice(p) => out.push(*p),
        }
    }
}

impl<T: CollectPlaceholders> CollectPlaceholders for Vec<T> {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        for item in self {
            item.collect_placeholders(out);
        }
    }
}

impl<T: CollectPlaceholders> CollectPlaceholders for Option<T> {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        if let Some(inner) = self {
            inner.collect_placeholders(out);
        }
    }
}

impl<T: CollectPlaceholders> CollectPlaceholders for Box<T> {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        self.as_ref().collect_placeholders(out);
    }
}

impl CollectPlaceholders for Ident {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        if let Ident::Placeholder(p) = self {
            out.push(*p);
        }
    }
}

impl CollectPlaceholders for Type {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        match &self.kind {
            TypeKind::Named(_) => {}
            TypeKind::Union(arms) => arms.collect_placeholders(out),
            TypeKind::Array(element) => element.collect_placeholders(out),
            TypeKind::Placeholder(p) => out.push(*p),
        }
    }
}

impl CollectPlaceholders for Expr {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        match &self.kind {
            ExprKind::Number(_)
            | ExprKind::BigInt(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Undefined
            | ExprKind::Null
            | ExprKind::This => {}
            ExprKind::Ident(ident) => ident.collect_placeholders(out),
            ExprKind::Member { object, property } => {
                object.collect_placeholders(out);
                property.collect_placeholders(out);
            }
            ExprKind::Index { object, index } => {
                object.collect_placeholders(out);
                index.collect_placeholders(out);
            }
            ExprKind::Call { callee, args } => {
                callee.collect_placeholders(out);
                args.collect_placeholders(out);
            }
            ExprKind::New { class, args } => {
                class.collect_placeholders(out);
                args.collect_placeholders(out);
            }
            ExprKind::Array(items) => items.collect_placeholders(out),
            ExprKind::Binary { left, right, .. } => {
                left.collect_placeholders(out);
                right.collect_placeholders(out);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Update { operand, .. } => {
                operand.collect_placeholders(out)
            }
            ExprKind::Assign { target, value, .. } => {
                target.collect_placeholders(out);
                value.collect_placeholders(out);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.collect_placeholders(out);
                consequent.collect_placeholders(out);
                alternate.collect_placeholders(out);
            }
            ExprKind::As { expr, ty } => {
                expr.collect_placeholders(out);
                ty.collect_placeholders(out);
            }
            ExprKind::Block(block) => block.collect_placeholders(out),
            ExprKind::Placeholder(p) => out.push(*p),
        }
    }
}

impl CollectPlaceholders for Block {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        self.items.collect_placeholders(out);
    }
}

impl CollectPlaceholders for Param {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        self.name.collect_placeholders(out);
        self.ty.collect_placeholders(out);
    }
}

impl CollectPlaceholders for Stmt {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        match &self.kind {
            StmtKind::Var { name, ty, init, .. } => {
                name.collect_placeholders(out);
                ty.collect_placeholders(out);
                init.collect_placeholders(out);
            }
            StmtKind::Block(block) => block.collect_placeholders(out),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                test.collect_placeholders(out);
                consequent.collect_placeholders(out);
                alternate.collect_placeholders(out);
            }
            StmtKind::While { test, body } => {
                test.collect_placeholders(out);
                body.collect_placeholders(out);
            }
            StmtKind::Return(value) => value.collect_placeholders(out),
            StmtKind::Empty => {}
            StmtKind::Expr(expr) => expr.collect_placeholders(out),
            StmtKind::Function(func) => func.collect_placeholders(out),
            StmtKind::Class(class) => class.collect_placeholders(out),
            StmtKind::Interface(iface) => iface.collect_placeholders(out),
            StmtKind::Placeholder(p) => out.push(*p),
        }
    }
}

impl CollectPlaceholders for FunctionDecl {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        self.name.collect_placeholders(out);
        self.params.collect_placeholders(out);
        self.return_type.collect_placeholders(out);
        self.body.collect_placeholders(out);
    }
}

impl CollectPlaceholders for ClassDecl {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        self.name.collect_placeholders(out);
        self.extends.collect_placeholders(out);
        self.implements.collect_placeholders(out);
        self.body.collect_placeholders(out);
    }
}

impl CollectPlaceholders for InterfaceDecl {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        self.name.collect_placeholders(out);
        self.extends.collect_placeholders(out);
        self.body.collect_placeholders(out);
    }
}

impl CollectPlaceholders for ClassElement {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        match &self.kind {
            ClassElementKind::Property { name, ty, init } => {
                name.collect_placeholders(out);
                ty.collect_placeholders(out);
                init.collect_placeholders(out);
            }
            ClassElementKind::Method {
                name,
                params,
                return_type,
                body,
                ..
            } => {
                name.collect_placeholders(out);
                params.collect_placeholders(out);
                return_type.collect_placeholders(out);
                body.collect_placeholders(out);
            }
            ClassElementKind::Placeholder(p) => out.push(*p),
        }
    }
}

impl CollectPlaceholders for Module {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        self.items.collect_placeholders(out);
    }
}
