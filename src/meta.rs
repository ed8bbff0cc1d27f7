//! Query metadata: table references and the columns they contribute.

use std::fmt::{Debug, Display, Formatter};

use crate::catalog::TableRef;
use crate::datatypes::DataType;

/// Uniquely identifies a column within a query. Column identifiers start from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnId(usize);

impl ColumnId {
    /// Creates a column identifier.
    ///
    /// # Panics
    ///
    /// This method panics if `id` is `0`.
    pub fn new(id: usize) -> Self {
        assert!(id > 0, "column id must be positive");
        ColumnId(id)
    }

    /// The numeric value of this identifier.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for ColumnId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a reference to a table within a query. Two references to the same catalog table
/// have different identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(usize);

impl TableId {
    /// The numeric value of this identifier.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for TableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference to a catalog table.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    id: TableId,
    alias: String,
    table: TableRef,
    base: ColumnId,
}

impl TableMetadata {
    /// The identifier of this table reference.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// The name this table is referred by in a query.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The catalog table.
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// The identifier of the first column of this table reference.
    pub fn base(&self) -> ColumnId {
        self.base
    }

    /// Returns an iterator over the column identifiers of this table reference.
    pub fn columns(&self) -> impl Iterator<Item = ColumnId> + '_ {
        (0..self.table.columns().len()).map(move |i| ColumnId(self.base.0 + i))
    }

    /// Returns the identifier of the column at the given position of the table.
    pub fn column_at(&self, position: usize) -> ColumnId {
        ColumnId(self.base.0 + position)
    }
}

/// Column metadata. If the table is set then this column belongs to a table reference.
/// Otherwise this is a synthetic column derived from an expression.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    id: ColumnId,
    label: String,
    data_type: DataType,
    nullable: bool,
    table: Option<TableId>,
}

impl ColumnMetadata {
    /// The identifier of this column.
    pub fn id(&self) -> ColumnId {
        self.id
    }

    /// The label of this column.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The type of this column.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Whether this column is declared nullable. Synthetic columns are nullable.
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// The table reference this column belongs to.
    pub fn table(&self) -> Option<TableId> {
        self.table
    }
}

/// Stores table references and columns of a query. Owned by the [memo](crate::memo::Memo).
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    tables: Vec<TableMetadata>,
    columns: Vec<ColumnMetadata>,
}

impl Metadata {
    /// Creates an empty metadata.
    pub fn new() -> Self {
        Metadata::default()
    }

    /// Adds a reference to the given table and assigns a contiguous range of column identifiers to it.
    /// Every call returns a new reference even when the table has been added before.
    pub fn add_table(&mut self, table: TableRef, alias: Option<&str>) -> TableId {
        let id = TableId(self.tables.len() + 1);
        let base = ColumnId(self.columns.len() + 1);

        for column in table.columns() {
            self.columns.push(ColumnMetadata {
                id: ColumnId(self.columns.len() + 1),
                label: column.name().to_string(),
                data_type: column.data_type(),
                nullable: column.nullable(),
                table: Some(id),
            });
        }

        let alias = alias.unwrap_or_else(|| table.name()).to_string();
        self.tables.push(TableMetadata { id, alias, table, base });
        id
    }

    /// Adds a synthetic column and returns its identifier.
    pub fn add_column(&mut self, label: &str, data_type: DataType) -> ColumnId {
        let id = ColumnId(self.columns.len() + 1);
        self.columns.push(ColumnMetadata {
            id,
            label: label.to_string(),
            data_type,
            nullable: true,
            table: None,
        });
        id
    }

    /// Returns metadata of the given table reference.
    ///
    /// # Panics
    ///
    /// This method panics if there is no such table reference.
    pub fn table(&self, id: TableId) -> &TableMetadata {
        self.tables
            .get(id.0 - 1)
            .unwrap_or_else(|| panic!("Unknown or unexpected table id: {}", id))
    }

    /// Returns metadata of the given column.
    ///
    /// # Panics
    ///
    /// This method panics if there is no such column.
    pub fn column(&self, id: ColumnId) -> &ColumnMetadata {
        self.columns
            .get(id.0 - 1)
            .unwrap_or_else(|| panic!("Unknown or unexpected column id: {}", id))
    }

    /// Returns the column of the given table reference with the given name.
    pub fn find_column(&self, table: TableId, name: &str) -> Option<ColumnId> {
        let table = self.tables.get(table.0.checked_sub(1)?)?;
        table.table.column_position(name).map(|p| table.column_at(p))
    }

    /// Returns an iterator over table references.
    pub fn tables(&self) -> impl Iterator<Item = &TableMetadata> {
        self.tables.iter()
    }

    /// Returns an iterator over columns.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter()
    }

    /// The number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::TableBuilder;
    use std::sync::Arc;

    fn table(name: &str) -> TableRef {
        let table = TableBuilder::new(name)
            .add_not_null_column("x", DataType::Int32)
            .add_column("y", DataType::String)
            .build()
            .expect("table");
        Arc::new(table)
    }

    #[test]
    fn test_self_join_columns_are_disjoint() {
        let mut metadata = Metadata::new();
        let a = table("a");

        let t1 = metadata.add_table(a.clone(), None);
        let t2 = metadata.add_table(a, Some("b"));

        let cols1: Vec<_> = metadata.table(t1).columns().collect();
        let cols2: Vec<_> = metadata.table(t2).columns().collect();

        assert_eq!(cols1, vec![ColumnId::new(1), ColumnId::new(2)]);
        assert_eq!(cols2, vec![ColumnId::new(3), ColumnId::new(4)]);
        assert_eq!(metadata.table(t2).alias(), "b");
        assert_eq!(metadata.find_column(t2, "x"), Some(ColumnId::new(3)));
        assert_eq!(metadata.column(ColumnId::new(3)).table(), Some(t2));
        assert!(!metadata.column(ColumnId::new(3)).nullable());
    }

    #[test]
    fn test_synthetic_columns() {
        let mut metadata = Metadata::new();
        metadata.add_table(table("a"), None);

        let id = metadata.add_column("sum", DataType::Int64);
        assert_eq!(id, ColumnId::new(3));

        let column = metadata.column(id);
        assert_eq!(column.label(), "sum");
        assert_eq!(column.table(), None);
        assert!(column.nullable());
    }
}
