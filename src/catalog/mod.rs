//! Database catalog.

use std::any::Any;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::datatypes::DataType;
use crate::error::OptimizerError;

pub mod mutable;

pub type CatalogRef = Arc<dyn Catalog>;
pub type SchemaRef = Arc<dyn Schema>;
pub type TableRef = Arc<Table>;
pub type ColumnRef = Arc<Column>;

/// Provides access to database objects used by the optimizer.
pub trait Catalog: Debug + Sync + Send {
    /// Returns this catalog as [`Any`](std::any::Any) in order it can be downcast to its implementation.
    fn as_any(&self) -> &dyn Any;

    /// Returns schemas available in the catalog.
    fn get_schemas(&self) -> Vec<SchemaRef>;

    /// Returns a schema with the given name.
    fn get_schema_by_name(&self, name: &str) -> Option<SchemaRef>;

    /// Returns a table with the given name registered in the default schema.
    fn get_table(&self, name: &str) -> Option<TableRef>;
}

/// The name of default schema.
pub const DEFAULT_SCHEMA: &str = "default";

/// Represents a database schema.
pub trait Schema: Debug + Sync + Send {
    /// Returns this schema as [`Any`](std::any::Any) in order it can be downcast to its implementation.
    fn as_any(&self) -> &dyn Any;

    /// Returns tables registered in this schema.
    fn get_tables(&self) -> Vec<TableRef>;

    /// Returns a table with the given name.
    fn get_table_by_name(&self, name: &str) -> Option<TableRef>;
}

/// Represents a database table.
///
/// Keys are stored as positions of columns in [columns](Self::columns).
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<ColumnRef>,
    primary_key: Option<Vec<usize>>,
    unique_keys: Vec<Vec<usize>>,
    foreign_keys: Vec<ForeignKey>,
    statistics: Option<TableStatistics>,
}

impl Table {
    /// The name of this table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The columns of this table.
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Returns a column with the given name.
    pub fn get_column(&self, name: &str) -> Option<ColumnRef> {
        self.columns.iter().find(|c| c.name == name).cloned()
    }

    /// Returns the position of a column with the given name.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Positions of the columns of the primary key.
    pub fn primary_key(&self) -> Option<&[usize]> {
        self.primary_key.as_deref()
    }

    /// Positions of the columns of every unique key.
    pub fn unique_keys(&self) -> &[Vec<usize>] {
        &self.unique_keys
    }

    /// Foreign keys declared for this table.
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Returns statistics available for this table.
    pub fn statistics(&self) -> Option<&TableStatistics> {
        self.statistics.as_ref()
    }
}

/// A foreign key of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    columns: Vec<usize>,
    referenced_table: String,
    referenced_columns: Vec<String>,
}

impl ForeignKey {
    /// Positions of the referencing columns.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// The name of the referenced table.
    pub fn referenced_table(&self) -> &str {
        &self.referenced_table
    }

    /// Names of the referenced columns.
    pub fn referenced_columns(&self) -> &[String] {
        &self.referenced_columns
    }
}

/// Statistics for a database table.
#[derive(Debug, Clone)]
pub struct TableStatistics {
    row_count: Option<usize>,
}

impl TableStatistics {
    /// Creates a new table statistics object.
    pub fn new(row_count: usize) -> Self {
        TableStatistics {
            row_count: Some(row_count),
        }
    }

    /// The total number of rows in a table.
    pub fn row_count(&self) -> Option<usize> {
        self.row_count
    }
}

/// A builder to create instances of a [table].
///
/// [table]: crate::catalog::Table
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<(String, DataType, bool)>,
    primary_key: Option<Vec<String>>,
    unique_keys: Vec<Vec<String>>,
    foreign_keys: Vec<(Vec<String>, String, Vec<String>)>,
    statistics: Option<TableStatistics>,
}

impl TableBuilder {
    /// Creates a builder for a table the given name.
    pub fn new(name: &str) -> Self {
        TableBuilder {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: None,
            unique_keys: Vec::new(),
            foreign_keys: Vec::new(),
            statistics: None,
        }
    }

    /// Adds a nullable column with the given name and data type to this table.
    pub fn add_column(mut self, name: &str, data_type: DataType) -> TableBuilder {
        self.columns.push((name.to_string(), data_type, true));
        self
    }

    /// Adds a `NOT NULL` column with the given name and data type to this table.
    pub fn add_not_null_column(mut self, name: &str, data_type: DataType) -> TableBuilder {
        self.columns.push((name.to_string(), data_type, false));
        self
    }

    /// Sets the primary key of this table. Columns of the primary key are not nullable.
    pub fn primary_key(mut self, columns: &[&str]) -> TableBuilder {
        self.primary_key = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Adds a unique key.
    pub fn add_unique_key(mut self, columns: &[&str]) -> TableBuilder {
        self.unique_keys.push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Adds a foreign key that references the given columns of the table `referenced_table`.
    pub fn add_foreign_key(mut self, columns: &[&str], referenced_table: &str, referenced_columns: &[&str]) -> TableBuilder {
        self.foreign_keys.push((
            columns.iter().map(|c| c.to_string()).collect(),
            referenced_table.to_string(),
            referenced_columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Sets row count statistics for this table.
    pub fn add_row_count(mut self, row_count: usize) -> TableBuilder {
        self.statistics = Some(TableStatistics::new(row_count));
        self
    }

    /// Creates an instance of a [table] with previously specified properties.
    ///
    /// [table]: crate::catalog::Table
    pub fn build(self) -> Result<Table, OptimizerError> {
        if self.columns.is_empty() {
            return Err(OptimizerError::argument("No columns has been specified"));
        }

        let mut names = HashSet::new();
        for (col_name, _, _) in self.columns.iter() {
            if !names.insert(col_name.as_str()) {
                let message = format!("Column already exists. Column: {} table: {}", col_name, self.name);
                return Err(OptimizerError::argument(message));
            }
        }

        let table_name = self.name.as_str();
        let positions = |key: &[String]| -> Result<Vec<usize>, OptimizerError> {
            if key.is_empty() {
                return Err(OptimizerError::argument(format!("Empty key. Table: {}", table_name)));
            }
            key.iter()
                .map(|name| {
                    self.columns.iter().position(|(c, _, _)| c == name).ok_or_else(|| {
                        OptimizerError::argument(format!(
                            "Column does not exist. Table: {}, column: {}",
                            table_name, name
                        ))
                    })
                })
                .collect()
        };

        let primary_key = self.primary_key.as_deref().map(positions).transpose()?;
        let unique_keys = self.unique_keys.iter().map(|k| positions(k)).collect::<Result<Vec<_>, _>>()?;
        let mut foreign_keys = Vec::with_capacity(self.foreign_keys.len());
        for (columns, referenced_table, referenced_columns) in self.foreign_keys.iter() {
            if columns.len() != referenced_columns.len() {
                return Err(OptimizerError::argument(format!(
                    "Foreign key column count mismatch. Table: {}, referenced table: {}",
                    table_name, referenced_table
                )));
            }
            foreign_keys.push(ForeignKey {
                columns: positions(columns)?,
                referenced_table: referenced_table.clone(),
                referenced_columns: referenced_columns.clone(),
            });
        }

        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, (name, data_type, nullable))| {
                let in_pk = primary_key.as_ref().map(|pk| pk.contains(&i)).unwrap_or_default();
                let column = Column::new(name.clone(), Some(self.name.clone()), *data_type, *nullable && !in_pk);
                Arc::new(column)
            })
            .collect();

        Ok(Table {
            name: self.name,
            columns,
            primary_key,
            unique_keys,
            foreign_keys,
            statistics: self.statistics,
        })
    }
}

/// A column of a database table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    table: Option<String>,
    data_type: DataType,
    nullable: bool,
}

impl Column {
    pub(crate) fn new(column_name: String, table_name: Option<String>, data_type: DataType, nullable: bool) -> Self {
        Column {
            name: column_name,
            table: table_name,
            data_type,
            nullable,
        }
    }

    /// The name of this column.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the table this column belongs to.
    pub fn table(&self) -> Option<&String> {
        self.table.as_ref()
    }

    /// The data type of this column.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Whether this column accepts `NULL` values.
    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_build_table() {
        let table = TableBuilder::new("a")
            .add_column("x", DataType::Int32)
            .add_column("y", DataType::Int32)
            .add_column("z", DataType::String)
            .primary_key(&["x"])
            .add_unique_key(&["y", "z"])
            .add_row_count(100)
            .build()
            .expect("table");

        assert_eq!(table.name(), "a");
        assert_eq!(table.primary_key(), Some(&[0usize][..]));
        assert_eq!(table.unique_keys(), &[vec![1, 2]]);
        assert!(!table.columns()[0].nullable(), "primary key columns are not nullable");
        assert!(table.columns()[1].nullable());
        assert_eq!(table.statistics().and_then(|s| s.row_count()), Some(100));
    }

    #[test]
    fn test_reject_duplicate_columns() {
        let result = TableBuilder::new("a")
            .add_column("x", DataType::Int32)
            .add_column("x", DataType::Int32)
            .build();

        let err = result.expect_err("duplicate column");
        assert_eq!(format!("{}", err), "Argument error: Column already exists. Column: x table: a");
    }

    #[test]
    fn test_reject_unknown_key_column() {
        let result = TableBuilder::new("a").add_column("x", DataType::Int32).primary_key(&["y"]).build();
        assert!(result.is_err(), "unknown key column");

        let result = TableBuilder::new("a")
            .add_column("x", DataType::Int32)
            .add_foreign_key(&["x"], "b", &["x", "y"])
            .build();
        assert!(result.is_err(), "column count mismatch");
    }

    #[test]
    fn test_reject_empty_table() {
        assert!(TableBuilder::new("a").build().is_err());
    }
}
