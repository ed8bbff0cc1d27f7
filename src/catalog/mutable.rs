//! Mutable implementation of a database catalog.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use crate::catalog::{Catalog, Schema, SchemaRef, Table, TableRef, DEFAULT_SCHEMA};
use crate::error::OptimizerError;

/// A [database catalog] that stores tables in memory.
/// Table names are case-insensitive.
///
/// # Error handling
///
/// Errors returned by methods of the `MutableCatalog` are recoverable.
///
/// [database catalog]: crate::catalog::Catalog
#[derive(Debug, Default)]
pub struct MutableCatalog {
    schemas: RwLock<HashMap<ObjectId, SchemaRef>>,
}

impl MutableCatalog {
    /// Creates a instance of [MutableCatalog].
    pub fn new() -> Self {
        MutableCatalog {
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Adds the given table to the specified schema. If such schema does not exists creates one.
    ///
    /// Returns an error if the table already exists or if one of its foreign keys references
    /// a table or a column that does not exist in that schema.
    pub fn add_table(&self, schema: &str, table: Table) -> Result<(), OptimizerError> {
        let mut schemas = self.schemas.write().unwrap();
        let schema_ref = match schemas.entry(ObjectId::from(schema)) {
            Entry::Occupied(o) => o.get().clone(),
            Entry::Vacant(v) => v.insert(Arc::new(MutableSchema::new())).clone(),
        };
        MutableSchema::from_ref(&schema_ref).add_table(table)
    }

    /// Removes a table with name `table` from the specified schema.
    /// If the schema or the table do not exist this method returns an error.
    pub fn remove_table(&self, schema: &str, table: &str) -> Result<(), OptimizerError> {
        let schemas = self.schemas.read().unwrap();
        if let Some(schema) = schemas.get(&ObjectId::from(schema)) {
            MutableSchema::from_ref(schema).remove_table(table)
        } else {
            Err(OptimizerError::argument(format!("Schema does not exist. Schema: {}", schema)))
        }
    }
}

impl Catalog for MutableCatalog {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_schemas(&self) -> Vec<SchemaRef> {
        let schemas = self.schemas.read().unwrap();
        schemas.values().cloned().collect()
    }

    fn get_schema_by_name(&self, name: &str) -> Option<SchemaRef> {
        let schemas = self.schemas.read().unwrap();
        schemas.get(&ObjectId::from(name)).cloned()
    }

    fn get_table(&self, name: &str) -> Option<TableRef> {
        let schemas = self.schemas.read().unwrap();
        schemas.get(&ObjectId::from(DEFAULT_SCHEMA)).and_then(|s| s.get_table_by_name(name))
    }
}

/// A [database schema](Schema) that stores tables in memory.
#[derive(Debug)]
pub struct MutableSchema {
    tables: RwLock<HashMap<ObjectId, TableRef>>,
}

impl MutableSchema {
    fn new() -> Self {
        MutableSchema {
            tables: RwLock::new(HashMap::new()),
        }
    }

    fn from_ref(schema: &SchemaRef) -> &MutableSchema {
        schema
            .as_any()
            .downcast_ref::<MutableSchema>()
            .unwrap_or_else(|| panic!("Unable to downcast to MutableSchema: {:?}", schema))
    }

    /// Adds the given table to this schema.
    pub fn add_table(&self, table: Table) -> Result<(), OptimizerError> {
        let mut tables = self.tables.write().unwrap();

        for fk in table.foreign_keys() {
            let referenced = if fk.referenced_table().eq_ignore_ascii_case(table.name()) {
                table.columns().iter().map(|c| c.name().to_string()).collect::<Vec<_>>()
            } else {
                match tables.get(&ObjectId::from(fk.referenced_table())) {
                    Some(t) => t.columns().iter().map(|c| c.name().to_string()).collect(),
                    None => {
                        return Err(OptimizerError::argument(format!(
                            "Add table: Referenced table does not exist. Table: {}, referenced table: {}",
                            table.name(),
                            fk.referenced_table()
                        )))
                    }
                }
            };
            if let Some(missing) = fk.referenced_columns().iter().find(|c| !referenced.contains(c)) {
                return Err(OptimizerError::argument(format!(
                    "Add table: Referenced column does not exist. Table: {}, column: {}",
                    fk.referenced_table(),
                    missing
                )));
            }
        }

        match tables.entry(ObjectId::from(table.name())) {
            Entry::Occupied(_) => {
                Err(OptimizerError::argument(format!("Add table: Table already exists. Table: {}", table.name())))
            }
            Entry::Vacant(v) => {
                v.insert(Arc::new(table));
                Ok(())
            }
        }
    }

    /// Remove a table with the give name. If the table does not exist this method returns an error.
    pub fn remove_table(&self, name: &str) -> Result<(), OptimizerError> {
        let mut tables = self.tables.write().unwrap();
        if tables.remove(&ObjectId::from(name)).is_some() {
            Ok(())
        } else {
            Err(OptimizerError::argument(format!("Remove table: Table does not exist. Table: {}", name)))
        }
    }
}

impl Schema for MutableSchema {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_tables(&self) -> Vec<TableRef> {
        let tables = self.tables.read().unwrap();
        tables.values().cloned().collect()
    }

    fn get_table_by_name(&self, name: &str) -> Option<TableRef> {
        let tables = self.tables.read().unwrap();
        tables.get(&ObjectId::from(name)).cloned()
    }
}

#[derive(Debug, Eq, PartialEq, Hash)]
struct ObjectId(CaseInsensitiveString);

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        ObjectId(CaseInsensitiveString(String::from(id)))
    }
}

#[derive(Debug)]
struct CaseInsensitiveString(String);

impl PartialEq for CaseInsensitiveString {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for CaseInsensitiveString {}

impl Hash for CaseInsensitiveString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.0.as_bytes() {
            c.to_ascii_lowercase().hash(state)
        }
    }
}
