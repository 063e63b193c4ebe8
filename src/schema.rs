//! Bound schema objects: tables, columns and indexes resolved from live
//! catalog metadata, plus the runtime cell value used by the join executor.
//!
//! Tables are arena-allocated by the binder; column references hold
//! `(table, column)` indices instead of back-pointers.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::EngineError;
use crate::expression::{ArithOp, Expr, Truth};

/// Handle to a bound column: indices into the binder's table arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId {
    pub table: usize,
    pub column: usize,
}

/// Internal column type after mapping the source's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Bool,
    Date,
    Datetime,
}

impl ColumnType {
    /// Maps a PostgreSQL / MySQL / SQLite declared type name. `None` marks
    /// the column unsupported; using it in a query is a semantic error.
    pub fn from_declared(raw: &str) -> Option<ColumnType> {
        let base = raw
            .split('(')
            .next()
            .unwrap_or(raw)
            .trim()
            .to_ascii_lowercase();
        match base.as_str() {
            "integer" | "int" | "int2" | "int4" | "int8" | "bigint" | "smallint"
            | "mediumint" | "tinyint" | "serial" | "bigserial" => Some(ColumnType::Int),
            "real" | "float" | "float4" | "float8" | "double" | "double precision"
            | "numeric" | "decimal" => Some(ColumnType::Float),
            "text" | "varchar" | "char" | "character" | "character varying" | "tinytext"
            | "mediumtext" | "longtext" | "name" => Some(ColumnType::Text),
            "boolean" | "bool" => Some(ColumnType::Bool),
            "date" => Some(ColumnType::Date),
            "datetime" | "timestamp" | "timestamp without time zone"
            | "timestamp with time zone" => Some(ColumnType::Datetime),
            _ => None,
        }
    }

    /// Type name used for the local SQLite mirror column.
    pub fn sqlite_type(self) -> &'static str {
        match self {
            ColumnType::Int | ColumnType::Bool => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::Text | ColumnType::Date | ColumnType::Datetime => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    BTree,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumn {
    pub name: String,
    pub ascending: bool,
}

/// A catalog index; only BTREE indexes survive introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: String,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
    pub kind: IndexKind,
}

/// A physical column of a bound table with its per-query usage marks.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub nullable: bool,
    pub declared_type: String,
    pub ctype: Option<ColumnType>,
    /// indexes of `Table::indexes` this column participates in
    pub index_refs: Vec<usize>,
    /// referenced anywhere in the query
    pub used: bool,
    /// appears in the SELECT list
    pub visible: bool,
    /// appearances in filters and join conditions
    pub count_used: usize,
    /// position among the table's fetched columns, assigned by the rewriter
    pub fetch_pos: Option<usize>,
}

impl Column {
    pub fn supported(&self) -> bool {
        self.ctype.is_some()
    }

    /// Must be fetched from the source even when not selected.
    pub fn fetched(&self) -> bool {
        self.used && (self.visible || self.count_used > 0)
    }
}

/// A table bound for the duration of one query.
#[derive(Debug, Clone)]
pub struct Table {
    pub dbms: String,
    pub database: String,
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
    pub name_to_column: HashMap<String, usize>,
    pub indexes: Vec<Index>,
    /// single-table predicates pushed down to the source query
    pub filters: Vec<Expr>,
}

impl Table {
    pub fn new(
        dbms: String,
        database: String,
        schema: String,
        name: String,
        raw_columns: Vec<(String, bool, String)>,
        indexes: Vec<Index>,
    ) -> Self {
        let mut columns = Vec::with_capacity(raw_columns.len());
        let mut name_to_column = HashMap::new();
        for (col_name, nullable, declared) in raw_columns {
            let index_refs = indexes
                .iter()
                .enumerate()
                .filter(|(_, idx)| idx.columns.iter().any(|c| c.name == col_name))
                .map(|(i, _)| i)
                .collect();
            name_to_column.insert(col_name.clone(), columns.len());
            columns.push(Column {
                ctype: ColumnType::from_declared(&declared),
                name: col_name,
                nullable,
                declared_type: declared,
                index_refs,
                used: false,
                visible: false,
                count_used: 0,
                fetch_pos: None,
            });
        }
        Table {
            dbms,
            database,
            schema,
            name,
            columns,
            name_to_column,
            indexes,
            filters: Vec::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.dbms, self.database, self.schema, self.name
        )
    }

    /// Name of the local mirror table.
    pub fn mirror_name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.dbms, self.database, self.schema, self.name
        )
    }

    /// Marks a column as referenced; unsupported column types reject use.
    pub fn mark_used(&mut self, column: usize) -> Result<(), EngineError> {
        let col = &mut self.columns[column];
        if !col.supported() {
            return Err(EngineError::semantic(format!(
                "column {}.{} has unsupported type {}",
                self.name, col.name, col.declared_type
            )));
        }
        col.used = true;
        Ok(())
    }

    /// Columns fetched from the source, in table order.
    pub fn fetched_columns(&self) -> impl Iterator<Item = (usize, &Column)> {
        self.columns.iter().enumerate().filter(|(_, c)| c.fetched())
    }

    /// Ordered column names of a BTREE index whose leading columns cover
    /// `keys` in order, if any. Such an index makes merge execution
    /// applicable after an `ORDER BY` on the keys.
    pub fn index_prefix_for(&self, keys: &[String]) -> Option<&Index> {
        self.indexes.iter().find(|idx| {
            idx.columns.len() >= keys.len()
                && idx
                    .columns
                    .iter()
                    .zip(keys)
                    .all(|(ic, k)| ic.ascending && ic.name == *k)
        })
    }
}

/// Runtime cell value flowing through the join executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn truth(&self) -> Truth {
        match self {
            Value::Null => Truth::Null,
            Value::Bool(b) => Truth::from_bool(*b),
            Value::Int(v) => Truth::from_bool(*v != 0),
            Value::Float(v) => Truth::from_bool(*v != 0.0),
            _ => Truth::from_bool(true),
        }
    }

    pub fn to_numeric(self) -> Value {
        match self {
            Value::Bool(b) => Value::Int(b as i64),
            other => other,
        }
    }

    pub fn arith(op: ArithOp, left: Value, right: Value) -> Value {
        let (l, r) = match (&left, &right) {
            (Value::Null, _) | (_, Value::Null) => return Value::Null,
            (Value::Int(l), Value::Int(r)) => {
                return match op {
                    ArithOp::Add => Value::Int(l + r),
                    ArithOp::Sub => Value::Int(l - r),
                    ArithOp::Mul => Value::Int(l * r),
                    ArithOp::Div => {
                        if *r == 0 {
                            Value::Null
                        } else if l % r == 0 {
                            Value::Int(l / r)
                        } else {
                            Value::Float(*l as f64 / *r as f64)
                        }
                    }
                };
            }
            (Value::Int(l), Value::Float(r)) => (*l as f64, *r),
            (Value::Float(l), Value::Int(r)) => (*l, *r as f64),
            (Value::Float(l), Value::Float(r)) => (*l, *r),
            _ => return Value::Null,
        };
        match op {
            ArithOp::Add => Value::Float(l + r),
            ArithOp::Sub => Value::Float(l - r),
            ArithOp::Mul => Value::Float(l * r),
            ArithOp::Div => {
                if r == 0.0 {
                    Value::Null
                } else {
                    Value::Float(l / r)
                }
            }
        }
    }

    /// SQL comparison: `None` when either side is NULL or the types are
    /// incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
            (Value::Int(l), Value::Float(r)) => (*l as f64).partial_cmp(r),
            (Value::Float(l), Value::Int(r)) => l.partial_cmp(&(*r as f64)),
            (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
            (Value::Text(l), Value::Text(r)) => Some(l.cmp(r)),
            (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
            (Value::Date(l), Value::Date(r)) => Some(l.cmp(r)),
            (Value::Datetime(l), Value::Datetime(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }

    /// Total order used when sorting rows before a merge join: NULL sorts
    /// first, incomparable types by rank.
    pub fn cmp_total(&self, other: &Value) -> Ordering {
        match self.compare(other) {
            Some(ord) => ord,
            None => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Text(_) => 4,
            Value::Date(_) => 5,
            Value::Datetime(_) => 6,
        }
    }

    /// Literal form for interpolation into generated SQL.
    pub fn sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Date(d) => format!("'{d}'"),
            Value::Datetime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Date(d) => write!(f, "{d}"),
            Value::Datetime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("integer", Some(ColumnType::Int))]
    #[case("character varying(255)", Some(ColumnType::Text))]
    #[case("timestamp without time zone", Some(ColumnType::Datetime))]
    #[case("double precision", Some(ColumnType::Float))]
    #[case("bytea", None)]
    #[case("jsonb", None)]
    fn declared_type_mapping(#[case] raw: &str, #[case] expected: Option<ColumnType>) {
        assert_eq!(ColumnType::from_declared(raw), expected);
    }

    #[rstest]
    fn unsupported_column_rejects_use() {
        let mut table = Table::new(
            "pg".into(),
            "db".into(),
            "public".into(),
            "t".into(),
            vec![
                ("a".into(), false, "integer".into()),
                ("blob".into(), true, "bytea".into()),
            ],
            vec![],
        );
        assert!(table.mark_used(0).is_ok());
        assert!(table.mark_used(1).is_err());
        assert!(table.columns[0].used);
        assert!(!table.columns[1].used);
    }

    #[rstest]
    fn fetched_requires_visibility_or_filter_use() {
        let mut table = Table::new(
            "pg".into(),
            "db".into(),
            "public".into(),
            "t".into(),
            vec![
                ("a".into(), false, "integer".into()),
                ("b".into(), false, "integer".into()),
                ("c".into(), false, "integer".into()),
            ],
            vec![],
        );
        table.mark_used(0).unwrap();
        table.columns[0].visible = true;
        table.mark_used(1).unwrap();
        table.columns[1].count_used = 1;
        table.mark_used(2).unwrap(); // used but neither visible nor counted
        let fetched: Vec<_> = table.fetched_columns().map(|(i, _)| i).collect();
        assert_eq!(fetched, vec![0, 1]);
    }

    #[rstest]
    fn index_prefix_lookup() {
        let table = Table::new(
            "pg".into(),
            "db".into(),
            "public".into(),
            "t".into(),
            vec![("k".into(), false, "integer".into())],
            vec![Index {
                name: "t_k_idx".into(),
                columns: vec![IndexColumn {
                    name: "k".into(),
                    ascending: true,
                }],
                unique: false,
                kind: IndexKind::BTree,
            }],
        );
        assert!(table.index_prefix_for(&["k".to_string()]).is_some());
        assert!(table.index_prefix_for(&["x".to_string()]).is_none());
        assert_eq!(table.columns[0].index_refs, vec![0]);
    }

    #[rstest]
    fn value_comparison_and_nulls() {
        assert_eq!(
            Value::Int(1).compare(&Value::Float(1.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
        assert_eq!(Value::Int(2).truth(), Truth::True);
        assert_eq!(Value::Int(0).truth(), Truth::False);
        assert_eq!(Value::Null.truth(), Truth::Null);
    }

    #[rstest]
    fn arithmetic_with_nulls_and_division() {
        assert_eq!(
            Value::arith(ArithOp::Div, Value::Int(7), Value::Int(2)),
            Value::Float(3.5)
        );
        assert_eq!(
            Value::arith(ArithOp::Div, Value::Int(6), Value::Int(2)),
            Value::Int(3)
        );
        assert_eq!(
            Value::arith(ArithOp::Div, Value::Int(1), Value::Int(0)),
            Value::Null
        );
        assert_eq!(
            Value::arith(ArithOp::Add, Value::Null, Value::Int(1)),
            Value::Null
        );
    }

    #[rstest]
    fn sql_literal_escapes_quotes() {
        assert_eq!(Value::Text("o'clock".into()).sql_literal(), "'o''clock'");
    }
}
