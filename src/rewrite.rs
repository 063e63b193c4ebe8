//! Per-source SQL emission: for each bound table, the dialect-flavored
//! selection fetching exactly the needed columns under its pushed-down
//! filters, plus the local mirror DDL and parameterized INSERT. Also renders
//! the equivalent final SELECT over the mirror tables for the result
//! surface.

use crate::binder::{BoundFilter, BoundJoin, BoundQuery, BoundTableRef};
use crate::database::DbmsKind;
use crate::expression::{ColumnRef, Expr};
use crate::parser::JoinKind;
use crate::schema::{ColumnType, Table, Value};

/// Assigns fetch positions: the ordinal of each fetched column within the
/// table's source projection and mirror table.
pub fn assign_fetch_positions(table: &mut Table) {
    let fetched: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.fetched())
        .map(|(i, _)| i)
        .collect();
    for (pos, i) in fetched.iter().enumerate() {
        table.columns[*i].fetch_pos = Some(pos);
    }
}

/// Column types of the projection, in fetch order.
pub fn fetch_types(table: &Table) -> Vec<ColumnType> {
    table
        .fetched_columns()
        .filter_map(|(_, c)| c.ctype)
        .collect()
}

/// The SELECT sent to the source DBMS.
pub fn source_select(table: &Table, kind: DbmsKind) -> String {
    let columns: Vec<String> = table
        .fetched_columns()
        .map(|(_, c)| kind.quote_ident(&c.name))
        .collect();
    let mut sql = format!(
        "SELECT {} FROM {}.{}",
        columns.join(", "),
        kind.quote_ident(&table.schema),
        kind.quote_ident(&table.name),
    );
    if !table.filters.is_empty() {
        let filters: Vec<String> = table
            .filters
            .iter()
            .map(|f| render_expr(f, kind, &|id| kind.quote_ident(&table.columns[id.column].name)))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&filters.join(" AND "));
    }
    sql
}

/// `CREATE TABLE` for the local mirror, with SQLite-mapped column types.
pub fn mirror_create(table: &Table) -> String {
    let kind = DbmsKind::Sqlite;
    let columns: Vec<String> = table
        .fetched_columns()
        .map(|(_, c)| {
            format!(
                "{} {}",
                kind.quote_ident(&c.name),
                c.ctype.map(ColumnType::sqlite_type).unwrap_or("TEXT"),
            )
        })
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        kind.quote_ident(&table.mirror_name()),
        columns.join(", "),
    )
}

/// Parameterized INSERT sized to the projection.
pub fn mirror_insert(table: &Table) -> String {
    let placeholders: Vec<&str> = table.fetched_columns().map(|_| "?").collect();
    format!(
        "INSERT INTO {} VALUES ({})",
        DbmsKind::Sqlite.quote_ident(&table.mirror_name()),
        placeholders.join(", "),
    )
}

/// SELECT pulling a table's rows back out of the mirror, optionally ordered
/// by join key columns so merge execution applies downstream.
pub fn mirror_select(table: &Table, order_by: &[String]) -> String {
    let kind = DbmsKind::Sqlite;
    let columns: Vec<String> = table
        .fetched_columns()
        .map(|(_, c)| kind.quote_ident(&c.name))
        .collect();
    let mut sql = format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        kind.quote_ident(&table.mirror_name()),
    );
    if !order_by.is_empty() {
        let keys: Vec<String> = order_by.iter().map(|c| kind.quote_ident(c)).collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }
    sql
}

/// Human-readable rendition of the whole query against the mirror tables;
/// emitted with the results, not executed.
pub fn final_select(bound: &BoundQuery) -> String {
    let kind = DbmsKind::Sqlite;
    let qualify = |id: crate::schema::ColumnId| {
        let table = &bound.tables[id.table];
        format!(
            "{}.{}",
            kind.quote_ident(&table.mirror_name()),
            kind.quote_ident(&table.columns[id.column].name),
        )
    };
    let columns: Vec<String> = bound
        .output
        .iter()
        .map(|out| render_expr(&out.expr, kind, &qualify))
        .collect();
    let mut sql = format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        render_plan(&bound.plan, bound, kind, &qualify),
    );
    if let Some(residual) = &bound.residual {
        let expr = match residual {
            BoundFilter::Pdnf(pdnf) => pdnf.expr(),
            BoundFilter::Expr(expr) => expr,
        };
        sql.push_str(" WHERE ");
        sql.push_str(&render_expr(expr, kind, &qualify));
    }
    sql
}

fn render_plan(
    plan: &BoundTableRef,
    bound: &BoundQuery,
    kind: DbmsKind,
    qualify: &dyn Fn(crate::schema::ColumnId) -> String,
) -> String {
    match plan {
        BoundTableRef::Table(idx) => {
            kind.quote_ident(&bound.tables[*idx].mirror_name())
        }
        BoundTableRef::Join(join) => {
            let BoundJoin {
                kind: join_kind,
                left,
                right,
                spec,
                ..
            } = join.as_ref();
            let join_text = match join_kind {
                JoinKind::Cross => "CROSS JOIN",
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
                JoinKind::Right => "RIGHT JOIN",
                JoinKind::Full => "FULL JOIN",
            };
            let mut sql = format!(
                "{} {join_text} {}",
                render_plan(left, bound, kind, qualify),
                render_plan(right, bound, kind, qualify),
            );
            if let Some(filter) = spec {
                let expr = match filter {
                    BoundFilter::Pdnf(pdnf) => pdnf.expr(),
                    BoundFilter::Expr(expr) => expr,
                };
                sql.push_str(" ON ");
                sql.push_str(&render_expr(expr, kind, qualify));
            }
            sql
        }
    }
}

/// Renders a bound expression as dialect SQL; `qualify` maps bound column
/// handles to their rendered names.
pub fn render_expr(
    expr: &Expr,
    kind: DbmsKind,
    qualify: &dyn Fn(crate::schema::ColumnId) -> String,
) -> String {
    match expr {
        Expr::Int(v) => v.to_string(),
        Expr::Float(v) => v.to_string(),
        Expr::Str(v) => Value::Text(v.clone()).sql_literal(),
        Expr::Date(v) => format!("'{v}'"),
        Expr::Datetime(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S")),
        Expr::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
        Expr::Null => "NULL".to_string(),
        Expr::Column(ColumnRef::Bound(id)) => qualify(*id),
        Expr::Column(ColumnRef::Unresolved(chain)) => chain.to_string(),
        Expr::Neg(inner) => format!("-{}", render_expr(inner, kind, qualify)),
        Expr::Arith { op, left, right } => format!(
            "({} {} {})",
            render_expr(left, kind, qualify),
            op.text(),
            render_expr(right, kind, qualify),
        ),
        Expr::Not(inner) => format!("NOT ({})", render_expr(inner, kind, qualify)),
        Expr::Logic { op, left, right } => format!(
            "({} {} {})",
            render_expr(left, kind, qualify),
            op.text(),
            render_expr(right, kind, qualify),
        ),
        Expr::Is { expr, truth } => {
            format!("({} IS {truth})", render_expr(expr, kind, qualify))
        }
        Expr::Cmp { op, left, right } => format!(
            "({} {} {})",
            render_expr(left, kind, qualify),
            op.text(),
            render_expr(right, kind, qualify),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::CmpOp;
    use crate::schema::ColumnId;
    use rstest::rstest;

    fn sample_table() -> Table {
        let mut table = Table::new(
            "pg".into(),
            "db1".into(),
            "s".into(),
            "t".into(),
            vec![
                ("a".into(), false, "integer".into()),
                ("b".into(), true, "text".into()),
                ("c".into(), true, "integer".into()),
            ],
            vec![],
        );
        table.mark_used(0).unwrap();
        table.columns[0].visible = true;
        table.mark_used(1).unwrap();
        table.columns[1].count_used = 1;
        assign_fetch_positions(&mut table);
        table
    }

    #[rstest]
    fn source_select_projects_needed_columns() {
        let table = sample_table();
        assert_eq!(
            source_select(&table, DbmsKind::PostgreSql),
            "SELECT \"a\", \"b\" FROM \"s\".\"t\""
        );
        assert_eq!(
            source_select(&table, DbmsKind::MySql),
            "SELECT `a`, `b` FROM `s`.`t`"
        );
    }

    #[rstest]
    fn source_select_renders_pushed_filters() {
        let mut table = sample_table();
        table.filters.push(Expr::Cmp {
            op: CmpOp::Eq,
            left: Box::new(Expr::Column(ColumnRef::Bound(ColumnId {
                table: 0,
                column: 0,
            }))),
            right: Box::new(Expr::Int(1)),
        });
        assert_eq!(
            source_select(&table, DbmsKind::PostgreSql),
            "SELECT \"a\", \"b\" FROM \"s\".\"t\" WHERE (\"a\" = 1)"
        );
    }

    #[rstest]
    fn mirror_statements() {
        let table = sample_table();
        assert_eq!(
            mirror_create(&table),
            "CREATE TABLE \"pg_db1_s_t\" (\"a\" INTEGER, \"b\" TEXT)"
        );
        assert_eq!(
            mirror_insert(&table),
            "INSERT INTO \"pg_db1_s_t\" VALUES (?, ?)"
        );
        assert_eq!(
            mirror_select(&table, &["a".to_string()]),
            "SELECT \"a\", \"b\" FROM \"pg_db1_s_t\" ORDER BY \"a\""
        );
    }

    #[rstest]
    fn fetch_positions_follow_table_order() {
        let table = sample_table();
        assert_eq!(table.columns[0].fetch_pos, Some(0));
        assert_eq!(table.columns[1].fetch_pos, Some(1));
        assert_eq!(table.columns[2].fetch_pos, None);
        assert_eq!(
            fetch_types(&table),
            vec![ColumnType::Int, ColumnType::Text]
        );
    }
}
