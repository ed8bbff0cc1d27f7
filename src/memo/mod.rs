//! Memo is the primary data structure used by the cost-based optimizer:
//!  * It stores each expression as a group of logically equivalent expressions.
//!  * It provides memoization of identical sub-expressions within an expression tree.
//!
//! Expressions live in an [arena](arena::Arena) and refer to their children by group identifiers,
//! lists of group identifiers and identifiers of private values. Expressions are deduplicated by their
//! [fingerprints](fingerprint::Fingerprint).

use std::collections::HashMap;

use log::trace;
use triomphe::Arc;

use crate::datatypes::{DataType, ScalarValue};
use crate::error::OptimizerError;
use crate::memo::arena::Arena;
use crate::memo::expr::{ExprOffset, GroupId, ListId, MemoExpr, PrivateId};
use crate::memo::fingerprint::Fingerprint;
use crate::memo::group::{MemoGroup, OptimizePass};
use crate::meta::{ColumnId, Metadata};
use crate::operators::private::Private;
use crate::operators::Operator;
use crate::properties::logical::{LogicalProps, LogicalPropsBuilder, LogicalPropsProvider};
use crate::properties::physical::{PhysicalProps, PhysicalPropsId, PhysicalPropsStore};

pub mod arena;
pub mod expr;
pub mod fingerprint;
mod format;
pub mod group;


/// The location of an expression with a given fingerprint.
/// An alternate fingerprint has no offset: it only records the group its expression reduces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExprLocation {
    group: GroupId,
    offset: Option<ExprOffset>,
}

/// The memo. See the [module docs](self).
#[derive(Debug)]
pub struct Memo {
    arena: Arena,
    groups: Vec<MemoGroup>,
    index: HashMap<Fingerprint, ExprLocation>,
    // index 0 is reserved for the empty list.
    lists: Vec<GroupId>,
    list_index: HashMap<Vec<u8>, ListId>,
    privates: Vec<Arc<Private>>,
    private_index: HashMap<Arc<Private>, PrivateId>,
    physical_props: PhysicalPropsStore,
    metadata: Metadata,
    props_provider: Box<dyn LogicalPropsProvider>,
    pass: OptimizePass,
}

impl Memo {
    /// Creates a new memo.
    pub fn new(metadata: Metadata) -> Self {
        Memo::with_props_provider(metadata, Box::new(LogicalPropsBuilder))
    }

    /// Creates a new memo that uses the given provider to build logical properties of groups.
    pub fn with_props_provider(metadata: Metadata, props_provider: Box<dyn LogicalPropsProvider>) -> Self {
        Memo::with_arena(Arena::new(), metadata, props_provider)
    }

    pub(crate) fn with_arena(arena: Arena, metadata: Metadata, props_provider: Box<dyn LogicalPropsProvider>) -> Self {
        Memo {
            arena,
            groups: Vec::new(),
            index: HashMap::new(),
            lists: vec![GroupId::UNKNOWN],
            list_index: HashMap::new(),
            privates: Vec::new(),
            private_index: HashMap::new(),
            physical_props: PhysicalPropsStore::new(),
            metadata,
            props_provider,
            pass: OptimizePass::default(),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Interns the given expression.
    ///
    /// If an expression with the same fingerprint already exists the group of that expression is returned.
    /// Otherwise the expression is copied into the memo and added to the `target` group or, when `target`
    /// is not specified, to a new group.
    ///
    /// Returns an error if the fingerprint of the expression is an alternate fingerprint of a group
    /// other than `target` or if the arena is exhausted.
    pub fn intern_expr(&mut self, expr: &MemoExpr, target: Option<GroupId>) -> Result<GroupId, OptimizerError> {
        if expr.op().is_enforcer() {
            return Err(OptimizerError::internal(format!("Enforcers can not be added to a memo: {:?}", expr)));
        }
        let fingerprint = expr.fingerprint();
        if let Some(location) = self.index.get(&fingerprint) {
            return match (location.offset, target) {
                (None, Some(target)) if target != location.group => Err(OptimizerError::internal(format!(
                    "Alternate fingerprint {:?} of group {} conflicts with group {}",
                    fingerprint, location.group, target
                ))),
                _ => Ok(location.group),
            };
        }

        let (group_id, new_group) = match target {
            Some(target) => {
                self.get_group(target)?;
                (target, None)
            }
            None => {
                let props = self.props_provider.build_props(self, expr)?;
                let group_id = GroupId::new(self.groups.len() as u32 + 1);
                (group_id, Some(MemoGroup::new(group_id, props)))
            }
        };

        // the group is added only after its first member has been written into the arena.
        let offset = expr.with_group(group_id).write(&mut self.arena)?;
        if let Some(group) = new_group {
            trace!("New group {}: {:?}", group_id, expr);
            self.groups.push(group);
        }
        self.groups[group_id.index() - 1].exprs.push(offset);
        self.index.insert(
            fingerprint,
            ExprLocation {
                group: group_id,
                offset: Some(offset),
            },
        );
        Ok(group_id)
    }

    /// Records that an expression with the given fingerprint reduces to the given group.
    /// Returns an error if the fingerprint already belongs to another group.
    pub fn add_alt_fingerprint(&mut self, fingerprint: Fingerprint, group: GroupId) -> Result<(), OptimizerError> {
        match self.index.get(&fingerprint) {
            Some(location) if location.group != group => Err(OptimizerError::internal(format!(
                "Fingerprint {:?} belongs to group {} and can not be added to group {}",
                fingerprint, location.group, group
            ))),
            Some(_) => Ok(()),
            None => {
                trace!("Alternate fingerprint {:?} of group {}", fingerprint, group);
                self.index.insert(fingerprint, ExprLocation { group, offset: None });
                Ok(())
            }
        }
    }

    /// Returns the group of an expression with the given fingerprint.
    pub fn find_group(&self, fingerprint: &Fingerprint) -> Option<GroupId> {
        self.index.get(fingerprint).map(|l| l.group)
    }

    /// Returns `true` if the given fingerprint is an alternate fingerprint.
    pub fn is_alt_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        matches!(self.index.get(fingerprint), Some(ExprLocation { offset: None, .. }))
    }

    /// Interns the given list of groups.
    pub fn intern_list(&mut self, items: &[GroupId]) -> ListId {
        if items.is_empty() {
            return ListId::EMPTY;
        }
        let key: Vec<u8> = items.iter().flat_map(|g| g.word().to_le_bytes()).collect();
        if let Some(list) = self.list_index.get(&key) {
            return *list;
        }
        let list = ListId::new(self.lists.len() as u32, items.len() as u32);
        self.lists.extend_from_slice(items);
        self.list_index.insert(key, list);
        list
    }

    /// Interns the given private value.
    pub fn intern_private(&mut self, value: Private) -> PrivateId {
        if let Some(id) = self.private_index.get(&value) {
            return *id;
        }
        let value = Arc::new(value);
        let id = PrivateId::new(self.privates.len() as u32 + 1);
        self.privates.push(value.clone());
        self.private_index.insert(value, id);
        id
    }

    /// Interns the given physical properties.
    pub fn intern_physical_props(&mut self, props: PhysicalProps) -> PhysicalPropsId {
        self.physical_props.intern(props)
    }

    /// Returns a group with the given identifier.
    pub fn get_group(&self, id: GroupId) -> Result<&MemoGroup, OptimizerError> {
        id.index()
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .ok_or_else(|| OptimizerError::internal(format!("Unknown group: {}", id)))
    }

    /// Returns an expression stored at the given offset.
    pub fn get_expr(&self, offset: ExprOffset) -> Result<MemoExpr, OptimizerError> {
        if !self.arena.contains(offset.value(), 8) {
            return Err(OptimizerError::internal(format!("Unknown expression: {}", offset)));
        }
        let expr = MemoExpr::read(&self.arena, offset);
        match self.get_group(expr.group()) {
            Ok(group) if group.exprs.contains(&offset) => Ok(expr),
            _ => Err(OptimizerError::internal(format!("Unknown expression: {}", offset))),
        }
    }

    /// Returns the items of the given list.
    pub fn get_list(&self, id: ListId) -> Result<&[GroupId], OptimizerError> {
        if id.is_empty() {
            return Ok(&[]);
        }
        self.lists
            .get(id.offset()..id.offset() + id.len())
            .filter(|_| id.offset() > 0)
            .ok_or_else(|| OptimizerError::internal(format!("Unknown list: {}", id)))
    }

    /// Returns the private value with the given identifier.
    pub fn get_private(&self, id: PrivateId) -> Result<&Private, OptimizerError> {
        id.index()
            .checked_sub(1)
            .and_then(|i| self.privates.get(i))
            .map(|p| p.as_ref())
            .ok_or_else(|| OptimizerError::internal(format!("Unknown private: {}", id)))
    }

    /// Returns the physical properties with the given identifier.
    pub fn get_physical_props(&self, id: PhysicalPropsId) -> Result<&PhysicalProps, OptimizerError> {
        self.physical_props
            .get(id)
            .ok_or_else(|| OptimizerError::internal(format!("Unknown physical properties: {}", id)))
    }

    /// Returns a group with the given identifier.
    ///
    /// # Panics
    ///
    /// This method panics if there is no such group.
    pub fn group(&self, id: GroupId) -> &MemoGroup {
        match self.get_group(id) {
            Ok(group) => group,
            Err(_) => panic!("group id is invalid: {}", id),
        }
    }

    pub(crate) fn group_mut(&mut self, id: GroupId) -> &mut MemoGroup {
        match id.index().checked_sub(1).and_then(|i| self.groups.get_mut(i)) {
            Some(group) => group,
            None => panic!("group id is invalid: {}", id),
        }
    }

    /// Returns an expression stored at the given offset.
    ///
    /// # Panics
    ///
    /// This method panics if the offset does not point to an expression.
    pub fn expr(&self, offset: ExprOffset) -> MemoExpr {
        MemoExpr::read(&self.arena, offset)
    }

    /// Returns the items of the given list.
    ///
    /// # Panics
    ///
    /// This method panics if there is no such list.
    pub fn list(&self, id: ListId) -> &[GroupId] {
        match self.get_list(id) {
            Ok(items) => items,
            Err(_) => panic!("list id is invalid: {}", id),
        }
    }

    /// Returns the private value with the given identifier.
    ///
    /// # Panics
    ///
    /// This method panics if there is no such value.
    pub fn private(&self, id: PrivateId) -> &Private {
        match self.get_private(id) {
            Ok(value) => value,
            Err(_) => panic!("private id is invalid: {}", id),
        }
    }

    /// Returns the physical properties with the given identifier.
    ///
    /// # Panics
    ///
    /// This method panics if there are no such properties.
    pub fn physical_props(&self, id: PhysicalPropsId) -> &PhysicalProps {
        match self.physical_props.get(id) {
            Some(props) => props,
            None => panic!("physical properties id is invalid: {}", id),
        }
    }

    /// Returns the normal form of the given group.
    pub fn normal_expr(&self, group: GroupId) -> MemoExpr {
        self.expr(self.group(group).exprs[0])
    }

    /// Returns the `i`-th member of the given group.
    pub fn group_expr(&self, group: GroupId, i: usize) -> MemoExpr {
        self.expr(self.group(group).exprs[i])
    }

    /// Returns the members of the given group.
    pub fn group_exprs(&self, group: GroupId) -> Vec<MemoExpr> {
        self.group(group).exprs.iter().map(|offset| self.expr(*offset)).collect()
    }

    /// Logical properties of the given group.
    pub fn props(&self, group: GroupId) -> &LogicalProps {
        &self.group(group).props
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// The total number of expressions stored in this memo.
    pub fn num_exprs(&self) -> usize {
        self.groups.iter().map(|g| g.exprs.len()).sum()
    }

    /// Returns an iterator over groups in the order of their creation.
    pub fn groups(&self) -> impl Iterator<Item = &MemoGroup> {
        self.groups.iter()
    }

    /// The current optimization pass.
    pub fn pass(&self) -> OptimizePass {
        self.pass
    }

    pub(crate) fn set_pass(&mut self, pass: OptimizePass) {
        self.pass = pass;
    }

    /// Returns the column referenced by a variable. `None` if the group is not a variable.
    pub fn as_column(&self, group: GroupId) -> Option<ColumnId> {
        let expr = self.normal_expr(group);
        match expr.op() {
            Operator::Variable => self.private(expr.private_field(0)).as_column(),
            _ => None,
        }
    }

    /// Returns the value of a constant. `None` if the group is not a constant.
    pub fn as_const(&self, group: GroupId) -> Option<&ScalarValue> {
        let expr = self.normal_expr(group);
        match expr.op() {
            Operator::Const => self.private(expr.private_field(0)).as_value(),
            _ => None,
        }
    }

    /// Returns the value of a boolean constant.
    pub fn as_bool_const(&self, group: GroupId) -> Option<bool> {
        self.as_const(group).and_then(|v| v.as_bool())
    }

    /// Returns the columns of an equality between two variables.
    pub fn as_column_equality(&self, group: GroupId) -> Option<(ColumnId, ColumnId)> {
        let expr = self.normal_expr(group);
        match (expr.op(), expr.as_binary()) {
            (Operator::Eq, Some((l, r))) => Some((self.as_column(l)?, self.as_column(r)?)),
            _ => None,
        }
    }

    /// Returns the conjuncts of a filter: the items of a [filter list](Operator::Filters),
    /// nothing for a `true` constant, the filter itself otherwise.
    pub fn conjuncts(&self, filter: GroupId) -> Vec<GroupId> {
        let expr = self.normal_expr(filter);
        match expr.op() {
            Operator::Filters => self.list(expr.list_field(0)).to_vec(),
            Operator::Const if self.as_bool_const(filter) == Some(true) => Vec::new(),
            _ => vec![filter],
        }
    }

    /// Returns the columns defined by a group of [projections](Operator::Projections)
    /// or [aggregations](Operator::Aggregations).
    pub fn projection_columns(&self, group: GroupId) -> &[ColumnId] {
        let expr = self.normal_expr(group);
        match expr.op() {
            Operator::Projections | Operator::Aggregations => {
                self.private(expr.private_field(1)).as_columns().unwrap_or(&[])
            }
            _ => &[],
        }
    }

    /// Returns the data type of a scalar group.
    pub fn infer_type(&self, group: GroupId) -> DataType {
        self.props(group).scalar().map(|p| p.data_type).unwrap_or_default()
    }
}
