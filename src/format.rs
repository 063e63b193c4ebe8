//! Result rendering for the REPL.

use prettytable::{Cell, Row, Table};

use crate::engine::QueryOutcome;
use crate::schema::Value;

/// ASCII table with the header row and at most `limit` data rows.
pub fn render_rows(header: &[String], rows: &[Vec<Value>], limit: usize) -> String {
    let mut table = Table::new();
    table.add_row(Row::new(header.iter().map(|h| Cell::new(h)).collect()));
    for row in rows.iter().take(limit) {
        table.add_row(Row::new(
            row.iter().map(|v| Cell::new(&v.to_string())).collect(),
        ));
    }
    let mut out = table.to_string();
    if rows.len() > limit {
        out.push_str(&format!("... {} more rows\n", rows.len() - limit));
    }
    out
}

/// Full result surface: the per-source selections sent, the mirror DDL, the
/// equivalent final SELECT and a row sample.
pub fn render_outcome(outcome: &QueryOutcome, limit: usize) -> String {
    let mut out = String::new();
    for (table, sql) in &outcome.source_queries {
        out.push_str(&format!("-- {table}\n{sql}\n"));
    }
    for create in &outcome.create_statements {
        out.push_str(&format!("{create}\n"));
    }
    out.push_str(&format!("{}\n", outcome.final_sql));
    out.push_str(&render_rows(&outcome.header, &outcome.rows, limit));
    out.push_str(&format!("({} rows)\n", outcome.rows.len()));
    out
}
