//! Memo expressions and identifiers of memo objects.

use std::fmt::{Debug, Display, Formatter};

use crate::memo::arena::Arena;
use crate::memo::fingerprint::Fingerprint;
use crate::memo::Memo;
use crate::operators::{FieldKind, Operator};

/// The maximum number of 32-bit words occupied by the fields of an expression.
pub const MAX_FIELD_WORDS: usize = 3;

/// The size of an encoded expression header: group id and operator tag.
const HEADER_WORDS: usize = 2;

/// Uniquely identifies a group in a memo. Identifier `0` is reserved for an unknown group.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u32);

impl GroupId {
    /// The identifier of an unknown group.
    pub const UNKNOWN: GroupId = GroupId(0);

    pub(crate) fn new(id: u32) -> Self {
        GroupId(id)
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == 0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub(crate) fn word(&self) -> u32 {
        self.0
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Debug for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

/// Identifies a list of groups: an offset and a length into the flat list array of a memo.
/// The empty list has offset `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId {
    offset: u32,
    len: u32,
}

impl ListId {
    /// The empty list.
    pub const EMPTY: ListId = ListId { offset: 0, len: 0 };

    pub(crate) fn new(offset: u32, len: u32) -> Self {
        ListId { offset, len }
    }

    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Display for ListId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.offset, self.len)
    }
}

/// Identifies an interned private value. Identifier `0` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrivateId(u32);

impl PrivateId {
    pub(crate) fn new(id: u32) -> Self {
        PrivateId(id)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for PrivateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The offset of an expression body in the arena of a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprOffset(u32);

impl ExprOffset {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Display for ExprOffset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A value of a field of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Group(GroupId),
    List(ListId),
    Private(PrivateId),
}

impl FieldValue {
    fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Group(_) => FieldKind::Group,
            FieldValue::List(_) => FieldKind::List,
            FieldValue::Private(_) => FieldKind::Private,
        }
    }
}

/// An expression: a header (group, operator) followed by the fields of the operator.
///
/// A `MemoExpr` is either a copy of an expression stored in a memo or a transient expression
/// that has not been interned yet. The group of a transient expression is [unknown](GroupId::UNKNOWN).
/// Two expressions are structurally identical iff their operators and fields are equal.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MemoExpr {
    group: GroupId,
    op: Operator,
    fields: [u32; MAX_FIELD_WORDS],
}

impl MemoExpr {
    /// Creates a transient expression.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the given fields do not match the field layout of the operator.
    pub fn new(op: Operator, values: &[FieldValue]) -> Self {
        debug_assert!(
            op.layout().len() == values.len() && op.layout().iter().zip(values.iter()).all(|(k, v)| *k == v.kind()),
            "Fields do not match the layout of {}: {:?}",
            op,
            values
        );
        let mut fields = [0u32; MAX_FIELD_WORDS];
        let mut i = 0;
        for value in values {
            match value {
                FieldValue::Group(g) => {
                    fields[i] = g.0;
                    i += 1;
                }
                FieldValue::List(l) => {
                    fields[i] = l.offset;
                    fields[i + 1] = l.len;
                    i += 2;
                }
                FieldValue::Private(p) => {
                    fields[i] = p.0;
                    i += 1;
                }
            }
        }
        MemoExpr {
            group: GroupId::UNKNOWN,
            op,
            fields,
        }
    }

    /// The group of this expression. Unknown for transient expressions.
    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn op(&self) -> Operator {
        self.op
    }

    /// Returns the fields of this expression.
    pub fn fields(&self) -> Vec<FieldValue> {
        let mut values = Vec::with_capacity(self.op.layout().len());
        let mut i = 0;
        for kind in self.op.layout() {
            match kind {
                FieldKind::Group => values.push(FieldValue::Group(GroupId(self.fields[i]))),
                FieldKind::List => values.push(FieldValue::List(ListId::new(self.fields[i], self.fields[i + 1]))),
                FieldKind::Private => values.push(FieldValue::Private(PrivateId(self.fields[i]))),
            }
            i += kind.num_words();
        }
        values
    }

    /// Returns the value of the `i`-th field.
    ///
    /// # Panics
    ///
    /// This method panics if the operator has no such field.
    pub fn field(&self, i: usize) -> FieldValue {
        let layout = self.op.layout();
        assert!(i < layout.len(), "{} has no field {}", self.op, i);
        let word: usize = layout[..i].iter().map(|k| k.num_words()).sum();
        match layout[i] {
            FieldKind::Group => FieldValue::Group(GroupId(self.fields[word])),
            FieldKind::List => FieldValue::List(ListId::new(self.fields[word], self.fields[word + 1])),
            FieldKind::Private => FieldValue::Private(PrivateId(self.fields[word])),
        }
    }

    /// Returns the group stored in the `i`-th field.
    ///
    /// # Panics
    ///
    /// This method panics if the `i`-th field is not a group.
    pub fn group_field(&self, i: usize) -> GroupId {
        match self.field(i) {
            FieldValue::Group(g) => g,
            other => panic!("Field {} of {} is not a group: {:?}", i, self.op, other),
        }
    }

    /// Returns the list stored in the `i`-th field.
    ///
    /// # Panics
    ///
    /// This method panics if the `i`-th field is not a list.
    pub fn list_field(&self, i: usize) -> ListId {
        match self.field(i) {
            FieldValue::List(l) => l,
            other => panic!("Field {} of {} is not a list: {:?}", i, self.op, other),
        }
    }

    /// Returns the private value identifier stored in the `i`-th field.
    ///
    /// # Panics
    ///
    /// This method panics if the `i`-th field is not a private value.
    pub fn private_field(&self, i: usize) -> PrivateId {
        match self.field(i) {
            FieldValue::Private(p) => p,
            other => panic!("Field {} of {} is not a private value: {:?}", i, self.op, other),
        }
    }

    /// Returns the first private value of this expression, if any.
    pub fn private(&self) -> Option<PrivateId> {
        self.fields().into_iter().find_map(|f| match f {
            FieldValue::Private(p) => Some(p),
            _ => None,
        })
    }

    /// The number of children of this expression. Every item of a list field is a child.
    pub fn child_count(&self) -> usize {
        self.fields()
            .iter()
            .map(|f| match f {
                FieldValue::Group(_) => 1,
                FieldValue::List(l) => l.len(),
                FieldValue::Private(_) => 0,
            })
            .sum()
    }

    /// Returns the `i`-th child of this expression.
    ///
    /// # Panics
    ///
    /// This method panics if there is no such child.
    pub fn child(&self, memo: &Memo, i: usize) -> GroupId {
        let mut remaining = i;
        for field in self.fields() {
            match field {
                FieldValue::Group(g) if remaining == 0 => return g,
                FieldValue::Group(_) => remaining -= 1,
                FieldValue::List(l) if remaining < l.len() => return memo.list(l)[remaining],
                FieldValue::List(l) => remaining -= l.len(),
                FieldValue::Private(_) => {}
            }
        }
        panic!("{} has no child {}", self.op, i)
    }

    /// Returns the children of this expression.
    pub fn children(&self, memo: &Memo) -> Vec<GroupId> {
        let mut children = Vec::with_capacity(self.child_count());
        for field in self.fields() {
            match field {
                FieldValue::Group(g) => children.push(g),
                FieldValue::List(l) => children.extend_from_slice(memo.list(l)),
                FieldValue::Private(_) => {}
            }
        }
        children
    }

    /// The fingerprint of this expression. The group of an expression does not affect its fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        let num_words = self.op.num_words();
        let mut buf = [0u8; 1 + 4 * MAX_FIELD_WORDS];
        buf[0] = self.op as u8;
        for (i, word) in self.fields[..num_words].iter().enumerate() {
            buf[1 + i * 4..1 + (i + 1) * 4].copy_from_slice(&word.to_le_bytes());
        }
        Fingerprint::new(&buf[..1 + 4 * num_words])
    }

    /// Returns a copy of this expression that belongs to the given group.
    pub(crate) fn with_group(mut self, group: GroupId) -> Self {
        self.group = group;
        self
    }

    /// Copies this expression into the arena and returns the offset of its body.
    pub(crate) fn write(&self, arena: &mut Arena) -> Result<ExprOffset, crate::error::OptimizerError> {
        let num_words = self.op.num_words();
        let mut words = [0u32; HEADER_WORDS + MAX_FIELD_WORDS];
        words[0] = self.group.0;
        words[1] = self.op.tag();
        words[HEADER_WORDS..HEADER_WORDS + num_words].copy_from_slice(&self.fields[..num_words]);
        arena.alloc_words(&words[..HEADER_WORDS + num_words]).map(ExprOffset)
    }

    /// Reads an expression stored at the given offset.
    ///
    /// # Panics
    ///
    /// This method panics if the offset does not point to an expression body.
    pub(crate) fn read(arena: &Arena, offset: ExprOffset) -> Self {
        let group = GroupId(arena.read_u32(offset.0));
        let tag = arena.read_u32(offset.0 + 4);
        let op = Operator::from_tag(tag).unwrap_or_else(|| panic!("Invalid operator tag {} at {}", tag, offset));
        let mut fields = [0u32; MAX_FIELD_WORDS];
        for (i, field) in fields.iter_mut().enumerate().take(op.num_words()) {
            *field = arena.read_u32(offset.0 + 4 * (HEADER_WORDS + i) as u32);
        }
        MemoExpr { group, op, fields }
    }

    /// Returns `(left, right)` of an expression with two group fields
    /// (binary scalar operators, select, project, subquery).
    pub fn as_binary(&self) -> Option<(GroupId, GroupId)> {
        match self.op.layout() {
            [FieldKind::Group, FieldKind::Group] => Some((GroupId(self.fields[0]), GroupId(self.fields[1]))),
            _ => None,
        }
    }

    /// Returns the input of an expression with a single group field (not, exists, enforcers).
    pub fn as_unary(&self) -> Option<GroupId> {
        match self.op.layout() {
            [FieldKind::Group] => Some(GroupId(self.fields[0])),
            _ => None,
        }
    }

    /// Returns the list of an expression whose first field is a list.
    pub fn as_list(&self) -> Option<ListId> {
        match self.op.layout().first() {
            Some(FieldKind::List) => Some(ListId::new(self.fields[0], self.fields[1])),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<SelectView> {
        match self.op {
            Operator::Select => Some(SelectView {
                input: GroupId(self.fields[0]),
                filter: GroupId(self.fields[1]),
            }),
            _ => None,
        }
    }

    pub fn as_project(&self) -> Option<ProjectView> {
        match self.op {
            Operator::Project => Some(ProjectView {
                input: GroupId(self.fields[0]),
                projections: GroupId(self.fields[1]),
            }),
            _ => None,
        }
    }

    pub fn as_group_by(&self) -> Option<GroupByView> {
        match self.op {
            Operator::GroupBy => Some(GroupByView {
                input: GroupId(self.fields[0]),
                groupings: GroupId(self.fields[1]),
                aggregations: GroupId(self.fields[2]),
            }),
            _ => None,
        }
    }

    /// Returns a view of a join or an apply.
    pub fn as_join(&self) -> Option<JoinView> {
        if self.op.is_join() {
            Some(JoinView {
                op: self.op,
                left: GroupId(self.fields[0]),
                right: GroupId(self.fields[1]),
                filter: GroupId(self.fields[2]),
            })
        } else {
            None
        }
    }

    pub fn as_set_op(&self) -> Option<SetOpView> {
        if self.op.is_set_op() {
            Some(SetOpView {
                op: self.op,
                left: GroupId(self.fields[0]),
                right: GroupId(self.fields[1]),
                column_map: PrivateId(self.fields[2]),
            })
        } else {
            None
        }
    }
}

impl Debug for MemoExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("MemoExpr");
        s.field("group", &self.group);
        s.field("op", &self.op);
        s.field("fields", &self.fields());
        s.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectView {
    pub input: GroupId,
    pub filter: GroupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectView {
    pub input: GroupId,
    pub projections: GroupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupByView {
    pub input: GroupId,
    /// Projections of grouping columns.
    pub groupings: GroupId,
    pub aggregations: GroupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinView {
    pub op: Operator,
    pub left: GroupId,
    pub right: GroupId,
    pub filter: GroupId,
}

impl JoinView {
    /// Returns a join expression of the given operator with the inputs and the filter of this join.
    pub fn to_expr(&self, op: Operator) -> MemoExpr {
        join_expr(op, self.left, self.right, self.filter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOpView {
    pub op: Operator,
    pub left: GroupId,
    pub right: GroupId,
    pub column_map: PrivateId,
}

/// Creates a join (or an apply) expression.
pub fn join_expr(op: Operator, left: GroupId, right: GroupId, filter: GroupId) -> MemoExpr {
    MemoExpr::new(
        op,
        &[
            FieldValue::Group(left),
            FieldValue::Group(right),
            FieldValue::Group(filter),
        ],
    )
}

/// Creates an expression with two group fields.
pub fn binary_expr(op: Operator, left: GroupId, right: GroupId) -> MemoExpr {
    MemoExpr::new(op, &[FieldValue::Group(left), FieldValue::Group(right)])
}
