//! Optional table metadata read from DDL.
//!
//! The analyzer has no live database access. A catalog built from
//! `CREATE TABLE` / `CREATE INDEX` statements lets rules and the rewriter
//! reason about column lists and unique keys.
//!
//! # Supported Statements
//!
//! - `CREATE TABLE` with columns, types, `NOT NULL`, `PRIMARY KEY`, `UNIQUE`
//! - Table-level `PRIMARY KEY (...)` and `UNIQUE (...)` constraints
//! - `CREATE [UNIQUE] INDEX ... ON table (...)`
//!
//! # Example
//!
//! ```
//! use sqlgenie::{ast::SqlDialect, catalog::Catalog};
//!
//! let ddl = r#"
//!     CREATE TABLE users (
//!         id INT PRIMARY KEY,
//!         email VARCHAR(255) NOT NULL
//!     );
//!     CREATE UNIQUE INDEX idx_email ON users(email);
//! "#;
//!
//! let catalog = Catalog::parse(ddl, SqlDialect::Generic).unwrap();
//! let users = catalog.table("Users").unwrap();
//!
//! assert_eq!(users.column_names().collect::<Vec<_>>(), ["id", "email"]);
//! assert!(catalog.is_unique_key("users", &["email"]));
//! assert!(!catalog.is_unique_key("users", &["name"]));
//! ```

use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use sqlparser::{
    ast::{ColumnOption, Statement},
    parser::Parser
};

use crate::{
    ast::{SourceMap, SqlDialect},
    error::ParseError
};

static KEY_CONSTRAINT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(PRIMARY\s+KEY|UNIQUE)\b[^(]*\(([^)]*)\)").ok()
});

/// Column metadata extracted from CREATE TABLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name:        String,
    /// SQL data type as written (e.g. "VARCHAR(255)")
    pub data_type:   String,
    pub is_nullable: bool,
    pub is_primary:  bool,
    pub is_unique:   bool
}

/// Index metadata from CREATE INDEX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Index name (may be empty for anonymous indexes)
    pub name:      String,
    pub columns:   Vec<String>,
    pub is_unique: bool
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// Table name as written
    pub name:        String,
    /// Columns in declaration order
    pub columns:     Vec<ColumnInfo>,
    /// Column sets declared unique, lower-cased
    pub unique_keys: Vec<Vec<String>>,
    pub indexes:     Vec<IndexInfo>
}

impl TableInfo {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether some unique key identifies every row.
    pub fn has_unique_key(&self) -> bool {
        self.row_keys().next().is_some()
    }

    /// Unique keys without nullable columns; a nullable `UNIQUE` column
    /// admits repeated NULLs.
    fn row_keys(&self) -> impl Iterator<Item = &Vec<String>> {
        self.unique_keys.iter().filter(|key| {
            key.iter()
                .all(|k| self.column(k).is_some_and(|c| !c.is_nullable))
        })
    }

    fn add_unique_key(&mut self, columns: Vec<String>) {
        let key: Vec<String> = columns.into_iter().map(|c| c.to_lowercase()).collect();
        if !key.is_empty() && !self.unique_keys.contains(&key) {
            self.unique_keys.push(key);
        }
    }
}

/// Tables keyed by lower-cased name; `BTreeMap` keeps iteration stable.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub tables: BTreeMap<String, TableInfo>
}

impl Catalog {
    /// Parse DDL statements.
    ///
    /// Statements other than `CREATE TABLE` / `CREATE INDEX` are ignored;
    /// indexes on unknown tables are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the DDL does not parse.
    pub fn parse(sql: &str, dialect: SqlDialect) -> Result<Self, ParseError> {
        let parser_dialect = dialect.into_parser_dialect();
        let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)
            .map_err(|e| ParseError::from_parser_message(e.to_string(), &SourceMap::new(sql)))?;
        let mut catalog = Self::default();
        for statement in &statements {
            catalog.process_statement(statement);
        }
        tracing::debug!(tables = catalog.tables.len(), "catalog loaded");
        Ok(catalog)
    }

    fn process_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::CreateTable(create) => {
                let name = unquote(&create.name.to_string());
                let mut table = TableInfo {
                    name:        name.clone(),
                    columns:     Vec::new(),
                    unique_keys: Vec::new(),
                    indexes:     Vec::new()
                };
                for column in &create.columns {
                    let options: Vec<String> = column
                        .options
                        .iter()
                        .map(|opt| opt.option.to_string().to_uppercase())
                        .collect();
                    let is_primary = options.iter().any(|o| o.starts_with("PRIMARY KEY"));
                    let is_unique = options.iter().any(|o| o.starts_with("UNIQUE"));
                    let column_name = unquote(&column.name.to_string());
                    table.columns.push(ColumnInfo {
                        name: column_name.clone(),
                        data_type: column.data_type.to_string(),
                        is_nullable: !is_primary
                            && !column
                                .options
                                .iter()
                                .any(|opt| matches!(opt.option, ColumnOption::NotNull)),
                        is_primary,
                        is_unique
                    });
                    if is_primary || is_unique {
                        table.add_unique_key(vec![column_name]);
                    }
                }
                for constraint in &create.constraints {
                    if let Some((is_primary, columns)) = key_columns(&constraint.to_string()) {
                        for column in &mut table.columns {
                            let in_key = columns
                                .iter()
                                .any(|c| c.eq_ignore_ascii_case(&column.name));
                            if is_primary && in_key {
                                column.is_nullable = false;
                            }
                            if columns.len() == 1 && in_key {
                                column.is_unique = true;
                            }
                        }
                        table.add_unique_key(columns);
                    }
                }
                self.tables.insert(name.to_lowercase(), table);
            }
            Statement::CreateIndex(create_index) => {
                let table_name = unquote(&create_index.table_name.to_string()).to_lowercase();
                let Some(table) = self.tables.get_mut(&table_name) else {
                    tracing::debug!(table = %table_name, "index on unknown table ignored");
                    return;
                };
                let columns: Vec<String> = create_index
                    .columns
                    .iter()
                    .filter_map(|c| c.to_string().split_whitespace().next().map(unquote))
                    .collect();
                if create_index.unique {
                    table.add_unique_key(columns.clone());
                }
                table.indexes.push(IndexInfo {
                    name: create_index
                        .name
                        .as_ref()
                        .map(|n| unquote(&n.to_string()))
                        .unwrap_or_default(),
                    columns,
                    is_unique: create_index.unique
                });
            }
            _ => {}
        }
    }

    /// Case-insensitive lookup. `schema.table` falls back to `table`.
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        let key = unquote(name).to_lowercase();
        self.tables.get(&key).or_else(|| {
            key.rsplit_once('.')
                .and_then(|(_, last)| self.tables.get(last))
        })
    }

    /// Whether `columns` contain a complete non-nullable unique key of `table`.
    pub fn is_unique_key(&self, table: &str, columns: &[&str]) -> bool {
        let Some(info) = self.table(table) else {
            return false;
        };
        let columns: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
        info.row_keys()
            .any(|key| key.iter().all(|k| columns.contains(k)))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Columns of a `PRIMARY KEY (...)` / `UNIQUE (...)` table constraint,
/// flagged when the constraint is the primary key.
fn key_columns(constraint: &str) -> Option<(bool, Vec<String>)> {
    let caps = KEY_CONSTRAINT.as_ref()?.captures(constraint)?;
    let is_primary = caps.get(1)?.as_str().to_uppercase().starts_with("PRIMARY");
    let columns: Vec<String> = caps
        .get(2)?
        .as_str()
        .split(',')
        .filter_map(|c| c.split_whitespace().next().map(unquote))
        .collect();
    (!columns.is_empty()).then_some((is_primary, columns))
}

fn unquote(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect()
}
