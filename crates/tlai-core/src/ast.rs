//! Abstract syntax tree for the supported TLA+ subset
//!
//! Every node carries a span into the (rewritten) source so evaluation
//! errors can point back at the text that produced them. Junction lists
//! (vertically aligned `/\` and `\/` bullets) are kept as flat n-ary
//! nodes; the evaluator treats the binary forms as two-element lists.

use crate::span::{Span, Spanned};
use num_bigint::BigInt;

/// A TLA+ module
#[derive(Debug, Clone)]
pub struct Module {
    /// Module name
    pub name: Spanned<String>,
    /// Extended modules (recorded, otherwise ignored)
    pub extends: Vec<Spanned<String>>,
    /// Module body units
    pub units: Vec<Spanned<Unit>>,
    /// Full span of the module
    pub span: Span,
}

/// A unit in a module (top-level declaration or definition)
#[derive(Debug, Clone)]
pub enum Unit {
    /// VARIABLE x, y, z
    Variables(Vec<Spanned<String>>),

    /// CONSTANT c1, c2
    Constants(Vec<Spanned<String>>),

    /// Operator definition: Op(x, y) == body
    Operator(OperatorDef),

    /// Function definition: f[x \in S] == body
    Function(FunctionDef),

    /// Separator line (-----)
    Separator,
}

/// An operator definition
#[derive(Debug, Clone)]
pub struct OperatorDef {
    pub name: Spanned<String>,
    pub params: Vec<Spanned<String>>,
    pub body: Spanned<Expr>,
}

/// A function definition: f[x \in S, y \in T] == body
///
/// Semantically equivalent to `f == [x \in S, y \in T |-> body]`.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Spanned<String>,
    pub bounds: Vec<BoundVar>,
    pub body: Spanned<Expr>,
}

/// A binder pattern: a plain name or a tuple destructuring
#[derive(Debug, Clone)]
pub enum BoundPattern {
    /// Simple variable: x
    Name(String),
    /// Tuple pattern: <<x, y>>
    Tuple(Vec<Spanned<String>>),
}

/// One binder group: patterns sharing a domain, as in `x, y \in S`
///
/// After rewriter normalization, quantifiers carry exactly one group
/// with exactly one pattern. Comprehensions and function literals may
/// keep multiple groups.
#[derive(Debug, Clone)]
pub struct BoundVar {
    pub patterns: Vec<Spanned<BoundPattern>>,
    pub domain: Box<Spanned<Expr>>,
}

impl BoundVar {
    /// Whether this group binds exactly one pattern
    pub fn is_single(&self) -> bool {
        self.patterns.len() == 1
    }
}

/// A case arm in a CASE expression
#[derive(Debug, Clone)]
pub struct CaseArm {
    pub guard: Spanned<Expr>,
    pub body: Spanned<Expr>,
}

/// An EXCEPT specification: !path = value
#[derive(Debug, Clone)]
pub struct ExceptSpec {
    pub path: Vec<ExceptPathElem>,
    pub value: Spanned<Expr>,
}

/// An element in an EXCEPT path
#[derive(Debug, Clone)]
pub enum ExceptPathElem {
    /// Function index: `[i]` or `[i, j]` (multiple args index by tuple)
    Index(Vec<Spanned<Expr>>),
    /// Record field: .field
    Field(Spanned<String>),
}

/// TLA+ expressions (the supported subset)
#[derive(Debug, Clone)]
pub enum Expr {
    // === Literals ===
    /// TRUE or FALSE
    Bool(bool),
    /// Integer literal
    Int(BigInt),
    /// String literal
    Str(String),
    /// The two-element set BOOLEAN
    BooleanSet,

    // === Names ===
    /// Identifier reference
    Ident(String),
    /// Operator application: Op(args)
    Apply(Spanned<String>, Vec<Spanned<Expr>>),

    // === Logic ===
    /// Conjunction: A /\ B
    And(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Disjunction: A \/ B
    Or(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Negation: ~A
    Not(Box<Spanned<Expr>>),
    /// Implication: A => B
    Implies(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Bullet conjunction list (vertically aligned /\)
    AndList(Vec<Spanned<Expr>>),
    /// Bullet disjunction list (vertically aligned \/)
    OrList(Vec<Spanned<Expr>>),

    // === Quantifiers ===
    /// Universal: \A x \in S : P
    Forall(Vec<BoundVar>, Box<Spanned<Expr>>),
    /// Existential: \E x \in S : P
    Exists(Vec<BoundVar>, Box<Spanned<Expr>>),
    /// Choice: CHOOSE x \in S : P
    Choose(BoundVar, Box<Spanned<Expr>>),

    // === Sets ===
    /// Set enumeration: {a, b, c}
    SetEnum(Vec<Spanned<Expr>>),
    /// Map comprehension: {expr : x \in S, y \in T}
    SetBuilder(Box<Spanned<Expr>>, Vec<BoundVar>),
    /// Filter comprehension: {x \in S : P}
    SetFilter(BoundVar, Box<Spanned<Expr>>),
    /// Membership: x \in S (desugared away by the rewriter)
    In(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Non-membership: x \notin S (desugared away by the rewriter)
    NotIn(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Union: S \cup T
    Union(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Intersection: S \cap T
    Intersect(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Set difference: S \ T
    SetMinus(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Cartesian product: S \X T \X U
    Times(Vec<Spanned<Expr>>),
    /// Powerset: SUBSET S
    Powerset(Box<Spanned<Expr>>),
    /// Domain: DOMAIN f
    Domain(Box<Spanned<Expr>>),

    // === Functions and records ===
    /// Function literal: [x \in S |-> expr]
    FcnLit(Vec<BoundVar>, Box<Spanned<Expr>>),
    /// Function application: `f[x]` or `f[x, y]` (tuple argument)
    FcnApply(Box<Spanned<Expr>>, Vec<Spanned<Expr>>),
    /// Set of functions: [S -> T]
    FcnSet(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Singleton function: d :> v
    SingletonFcn(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Function merge: f @@ g (left wins on overlap)
    FcnMerge(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Record literal: [a |-> 1, b |-> 2]
    RecordLit(Vec<(Spanned<String>, Spanned<Expr>)>),
    /// Set of records: [a : S, b : T]
    RecordSet(Vec<(Spanned<String>, Spanned<Expr>)>),
    /// Record field access: r.field
    RecordAccess(Box<Spanned<Expr>>, Spanned<String>),
    /// EXCEPT: [f EXCEPT ![a] = b, !.c = d]
    Except(Box<Spanned<Expr>>, Vec<ExceptSpec>),
    /// Previous value at the EXCEPT path: @
    At,

    // === Tuples ===
    /// Tuple: <<a, b, c>>
    Tuple(Vec<Spanned<Expr>>),

    // === Actions ===
    /// Prime: x'
    Prime(Box<Spanned<Expr>>),
    /// ENABLED A
    Enabled(Box<Spanned<Expr>>),
    /// UNCHANGED x or UNCHANGED <<x, y>>
    Unchanged(Box<Spanned<Expr>>),

    // === Control ===
    /// IF cond THEN a ELSE b
    If(
        Box<Spanned<Expr>>,
        Box<Spanned<Expr>>,
        Box<Spanned<Expr>>,
    ),
    /// CASE arms [] OTHER -> default
    Case(Vec<CaseArm>, Option<Box<Spanned<Expr>>>),
    /// LET defs IN body
    Let(Vec<OperatorDef>, Box<Spanned<Expr>>),

    // === Comparison ===
    /// Equality (or assignment, see evaluator): a = b
    Eq(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Inequality: a # b
    Neq(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Less than: a < b
    Lt(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Less or equal: a <= b
    Leq(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Greater than: a > b
    Gt(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Greater or equal: a >= b
    Geq(Box<Spanned<Expr>>, Box<Spanned<Expr>>),

    // === Arithmetic ===
    /// Addition: a + b
    Add(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Subtraction: a - b
    Sub(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Multiplication: a * b
    Mul(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Modulo: a % b
    Mod(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Unary minus: -a
    Neg(Box<Spanned<Expr>>),
    /// Inclusive range: a..b
    Range(Box<Spanned<Expr>>, Box<Spanned<Expr>>),

    // === Sequences ===
    /// Concatenation: s \o t
    Concat(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
}

impl Expr {
    /// Whether this expression is a bare identifier, returning the name
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }
}
