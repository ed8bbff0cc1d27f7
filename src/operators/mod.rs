//! Operators.
//!
//! Every expression stored in the [memo](crate::memo::Memo) is identified by an [Operator] tag.
//! Per-operator behaviour (flags, field layout, name) is described by a static [OperatorInfo]
//! table indexed by the tag.

use std::fmt::{Display, Formatter};

pub mod private;

/// Operator flags.
pub const SCALAR: u8 = 1;
pub const RELATIONAL: u8 = 1 << 1;
pub const ENFORCER: u8 = 1 << 2;
/// The operator is commutative: `op(a, b) = op(b, a)`.
pub const COMMUTATIVE: u8 = 1 << 3;
/// The operator is a comparison.
pub const COMPARISON: u8 = 1 << 4;
/// The operator is a join or an apply.
pub const JOIN: u8 = 1 << 5;
/// The operator is an apply (a join whose right input may reference columns of the left input).
pub const APPLY: u8 = 1 << 6;

/// The kind of a field of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A child group. Occupies one word.
    Group,
    /// A list of child groups. Occupies two words (offset and length).
    List,
    /// A private value. Occupies one word.
    Private,
}

impl FieldKind {
    /// The number of 32-bit words occupied by a field of this kind.
    pub const fn num_words(&self) -> usize {
        match self {
            FieldKind::Group | FieldKind::Private => 1,
            FieldKind::List => 2,
        }
    }
}

/// Static description of an operator.
#[derive(Debug)]
pub struct OperatorInfo {
    pub name: &'static str,
    pub flags: u8,
    pub layout: &'static [FieldKind],
}

use FieldKind::{Group as G, List as L, Private as P};

const GROUP_GROUP: &[FieldKind] = &[G, G];
const GROUP_GROUP_GROUP: &[FieldKind] = &[G, G, G];

/// Operators. The discriminant is the tag used in the encoded form of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Operator {
    // scalar operators
    Variable = 1,
    Const,
    List,
    Filters,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Mult,
    Div,
    Function,
    Subquery,
    Exists,
    Projections,
    Aggregations,
    // relational operators
    Scan,
    Values,
    Select,
    Project,
    GroupBy,
    Union,
    Intersect,
    Except,
    InnerJoin,
    LeftJoin,
    RightJoin,
    FullJoin,
    SemiJoin,
    AntiJoin,
    InnerJoinApply,
    LeftJoinApply,
    RightJoinApply,
    FullJoinApply,
    SemiJoinApply,
    AntiJoinApply,
    // enforcers
    Sort,
    Arrange,
}

const OPERATORS: [OperatorInfo; 44] = [
    OperatorInfo { name: "Variable", flags: SCALAR, layout: &[P] },
    OperatorInfo { name: "Const", flags: SCALAR, layout: &[P] },
    OperatorInfo { name: "List", flags: SCALAR, layout: &[L] },
    OperatorInfo { name: "Filters", flags: SCALAR, layout: &[L] },
    OperatorInfo { name: "And", flags: SCALAR | COMMUTATIVE, layout: GROUP_GROUP },
    OperatorInfo { name: "Or", flags: SCALAR | COMMUTATIVE, layout: GROUP_GROUP },
    OperatorInfo { name: "Not", flags: SCALAR, layout: &[G] },
    OperatorInfo { name: "Eq", flags: SCALAR | COMMUTATIVE | COMPARISON, layout: GROUP_GROUP },
    OperatorInfo { name: "Ne", flags: SCALAR | COMMUTATIVE | COMPARISON, layout: GROUP_GROUP },
    OperatorInfo { name: "Lt", flags: SCALAR | COMPARISON, layout: GROUP_GROUP },
    OperatorInfo { name: "Le", flags: SCALAR | COMPARISON, layout: GROUP_GROUP },
    OperatorInfo { name: "Gt", flags: SCALAR | COMPARISON, layout: GROUP_GROUP },
    OperatorInfo { name: "Ge", flags: SCALAR | COMPARISON, layout: GROUP_GROUP },
    OperatorInfo { name: "Plus", flags: SCALAR | COMMUTATIVE, layout: GROUP_GROUP },
    OperatorInfo { name: "Minus", flags: SCALAR, layout: GROUP_GROUP },
    OperatorInfo { name: "Mult", flags: SCALAR | COMMUTATIVE, layout: GROUP_GROUP },
    OperatorInfo { name: "Div", flags: SCALAR, layout: GROUP_GROUP },
    OperatorInfo { name: "Function", flags: SCALAR, layout: &[L, P] },
    OperatorInfo { name: "Subquery", flags: SCALAR, layout: GROUP_GROUP },
    OperatorInfo { name: "Exists", flags: SCALAR, layout: &[G] },
    OperatorInfo { name: "Projections", flags: SCALAR, layout: &[L, P] },
    OperatorInfo { name: "Aggregations", flags: SCALAR, layout: &[L, P] },
    OperatorInfo { name: "Scan", flags: RELATIONAL, layout: &[P] },
    OperatorInfo { name: "Values", flags: RELATIONAL, layout: &[L, P] },
    OperatorInfo { name: "Select", flags: RELATIONAL, layout: GROUP_GROUP },
    OperatorInfo { name: "Project", flags: RELATIONAL, layout: GROUP_GROUP },
    OperatorInfo { name: "GroupBy", flags: RELATIONAL, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "Union", flags: RELATIONAL, layout: &[G, G, P] },
    OperatorInfo { name: "Intersect", flags: RELATIONAL, layout: &[G, G, P] },
    OperatorInfo { name: "Except", flags: RELATIONAL, layout: &[G, G, P] },
    OperatorInfo { name: "InnerJoin", flags: RELATIONAL | JOIN, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "LeftJoin", flags: RELATIONAL | JOIN, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "RightJoin", flags: RELATIONAL | JOIN, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "FullJoin", flags: RELATIONAL | JOIN, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "SemiJoin", flags: RELATIONAL | JOIN, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "AntiJoin", flags: RELATIONAL | JOIN, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "InnerJoinApply", flags: RELATIONAL | JOIN | APPLY, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "LeftJoinApply", flags: RELATIONAL | JOIN | APPLY, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "RightJoinApply", flags: RELATIONAL | JOIN | APPLY, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "FullJoinApply", flags: RELATIONAL | JOIN | APPLY, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "SemiJoinApply", flags: RELATIONAL | JOIN | APPLY, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "AntiJoinApply", flags: RELATIONAL | JOIN | APPLY, layout: GROUP_GROUP_GROUP },
    OperatorInfo { name: "Sort", flags: RELATIONAL | ENFORCER, layout: &[G] },
    OperatorInfo { name: "Arrange", flags: RELATIONAL | ENFORCER, layout: &[G] },
];

impl Operator {
    /// All operators in tag order.
    pub const ALL: [Operator; 44] = [
        Operator::Variable,
        Operator::Const,
        Operator::List,
        Operator::Filters,
        Operator::And,
        Operator::Or,
        Operator::Not,
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::Plus,
        Operator::Minus,
        Operator::Mult,
        Operator::Div,
        Operator::Function,
        Operator::Subquery,
        Operator::Exists,
        Operator::Projections,
        Operator::Aggregations,
        Operator::Scan,
        Operator::Values,
        Operator::Select,
        Operator::Project,
        Operator::GroupBy,
        Operator::Union,
        Operator::Intersect,
        Operator::Except,
        Operator::InnerJoin,
        Operator::LeftJoin,
        Operator::RightJoin,
        Operator::FullJoin,
        Operator::SemiJoin,
        Operator::AntiJoin,
        Operator::InnerJoinApply,
        Operator::LeftJoinApply,
        Operator::RightJoinApply,
        Operator::FullJoinApply,
        Operator::SemiJoinApply,
        Operator::AntiJoinApply,
        Operator::Sort,
        Operator::Arrange,
    ];

    /// The number of operators.
    pub const COUNT: usize = Operator::ALL.len();

    /// Returns an operator with the given tag.
    pub fn from_tag(tag: u32) -> Option<Operator> {
        if tag == 0 {
            None
        } else {
            Operator::ALL.get(tag as usize - 1).copied()
        }
    }

    /// The tag of this operator.
    pub fn tag(&self) -> u32 {
        *self as u32
    }

    /// The static description of this operator.
    pub fn info(&self) -> &'static OperatorInfo {
        &OPERATORS[*self as usize - 1]
    }

    pub fn name(&self) -> &'static str {
        self.info().name
    }

    /// The field layout of expressions of this operator.
    pub fn layout(&self) -> &'static [FieldKind] {
        self.info().layout
    }

    /// The number of words occupied by the fields of this operator.
    pub fn num_words(&self) -> usize {
        self.layout().iter().map(|f| f.num_words()).sum()
    }

    pub fn is_scalar(&self) -> bool {
        self.info().flags & SCALAR != 0
    }

    pub fn is_relational(&self) -> bool {
        self.info().flags & RELATIONAL != 0
    }

    pub fn is_enforcer(&self) -> bool {
        self.info().flags & ENFORCER != 0
    }

    pub fn is_commutative(&self) -> bool {
        self.info().flags & COMMUTATIVE != 0
    }

    pub fn is_comparison(&self) -> bool {
        self.info().flags & COMPARISON != 0
    }

    /// Returns `true` for joins and applies.
    pub fn is_join(&self) -> bool {
        self.info().flags & JOIN != 0
    }

    pub fn is_apply(&self) -> bool {
        self.info().flags & APPLY != 0
    }

    pub fn is_set_op(&self) -> bool {
        matches!(self, Operator::Union | Operator::Intersect | Operator::Except)
    }

    /// The kind of join of a join or an apply operator.
    pub fn join_kind(&self) -> Option<JoinKind> {
        let kind = match self {
            Operator::InnerJoin | Operator::InnerJoinApply => JoinKind::Inner,
            Operator::LeftJoin | Operator::LeftJoinApply => JoinKind::Left,
            Operator::RightJoin | Operator::RightJoinApply => JoinKind::Right,
            Operator::FullJoin | Operator::FullJoinApply => JoinKind::Full,
            Operator::SemiJoin | Operator::SemiJoinApply => JoinKind::Semi,
            Operator::AntiJoin | Operator::AntiJoinApply => JoinKind::Anti,
            _ => return None,
        };
        Some(kind)
    }

    /// For an apply operator returns the join operator of the same kind.
    pub fn apply_to_join(&self) -> Option<Operator> {
        let op = match self {
            Operator::InnerJoinApply => Operator::InnerJoin,
            Operator::LeftJoinApply => Operator::LeftJoin,
            Operator::RightJoinApply => Operator::RightJoin,
            Operator::FullJoinApply => Operator::FullJoin,
            Operator::SemiJoinApply => Operator::SemiJoin,
            Operator::AntiJoinApply => Operator::AntiJoin,
            _ => return None,
        };
        Some(op)
    }

    /// For a comparison returns the comparison with swapped operands: `a < b` ⇔ `b > a`.
    pub fn commute_comparison(&self) -> Option<Operator> {
        let op = match self {
            Operator::Eq => Operator::Eq,
            Operator::Ne => Operator::Ne,
            Operator::Lt => Operator::Gt,
            Operator::Le => Operator::Ge,
            Operator::Gt => Operator::Lt,
            Operator::Ge => Operator::Le,
            _ => return None,
        };
        Some(op)
    }

    /// For a comparison returns its negation: `NOT (a < b)` ⇔ `a >= b`.
    pub fn negate_comparison(&self) -> Option<Operator> {
        let op = match self {
            Operator::Eq => Operator::Ne,
            Operator::Ne => Operator::Eq,
            Operator::Lt => Operator::Ge,
            Operator::Le => Operator::Gt,
            Operator::Gt => Operator::Le,
            Operator::Ge => Operator::Lt,
            _ => return None,
        };
        Some(op)
    }

    /// The symbol used to display binary scalar operators.
    pub fn symbol(&self) -> Option<&'static str> {
        let s = match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Mult => "*",
            Operator::Div => "/",
            _ => return None,
        };
        Some(s)
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Kinds of joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

impl JoinKind {
    /// Returns `true` if the output of a join of this kind consists only of columns of the left input.
    pub fn left_only(&self) -> bool {
        matches!(self, JoinKind::Semi | JoinKind::Anti)
    }
}
