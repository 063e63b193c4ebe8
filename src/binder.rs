//! Semantic analysis of a parsed `SELECT`: multi-part name resolution
//! against live catalog metadata, usage marks, predicate convolution and
//! PDNF construction, single-table filter pushdown and join key extraction.

use std::collections::HashMap;

use tracing::error;

use crate::database::Dbms;
use crate::error::EngineError;
use crate::expression::{CmpOp, ColumnRef, Expr, LogicOp, Pdnf};
use crate::naming::NamingChain;
use crate::parser::{JoinKind, JoinNode, SelectItem, SelectList, SelectStmt, TableRef};
use crate::schema::{ColumnId, Table};

/// Session-scoped alias maps at four granularities. A `USE a.b… AS x`
/// command registers an alias whose level is decided by the part count:
/// one part aliases a DBMS, two a database, three a schema, four a table.
#[derive(Debug, Default)]
pub struct SessionAliases {
    pub dbms: HashMap<String, String>,
    pub db: HashMap<String, (String, String)>,
    pub schema: HashMap<String, (String, String, String)>,
    pub table: HashMap<String, (String, String, String, String)>,
}

impl SessionAliases {
    /// Registers `short` for `parts`; a later registration at the same level
    /// replaces the earlier one.
    pub fn register(&mut self, parts: &[String], short: &str) -> Result<(), EngineError> {
        let short = short.to_string();
        match parts {
            [dbms] => {
                self.dbms.insert(short, dbms.clone());
            }
            [dbms, db] => {
                self.db.insert(short, (dbms.clone(), db.clone()));
            }
            [dbms, db, schema] => {
                self.schema
                    .insert(short, (dbms.clone(), db.clone(), schema.clone()));
            }
            [dbms, db, schema, table] => {
                self.table.insert(
                    short,
                    (dbms.clone(), db.clone(), schema.clone(), table.clone()),
                );
            }
            _ => {
                return Err(EngineError::semantic(format!(
                    "wrong naming chain {}: aliases take one to four parts",
                    parts.join(".")
                )));
            }
        }
        Ok(())
    }

    /// Canonical DBMS name: resolves a dbms alias, or returns the input.
    pub fn canonical_dbms<'a>(&'a self, name: &'a str) -> &'a str {
        self.dbms.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// How an expression is being bound; decides which usage marks are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Usage {
    /// SELECT list: participating columns become visible.
    Select,
    /// WHERE / ON: participating columns count as filter uses.
    Filter,
}

/// Bound filter attached to a join or to the whole query.
#[derive(Debug, Clone)]
pub enum BoundFilter {
    /// Boolean expressions become their PDNF.
    Pdnf(Pdnf),
    /// Comparison predicates and column references are evaluated directly.
    Expr(Expr),
}

impl BoundFilter {
    pub fn accepts_row(&self, col: &dyn Fn(ColumnId) -> crate::schema::Value) -> bool {
        match self {
            BoundFilter::Pdnf(pdnf) => pdnf.accepts_row(col),
            BoundFilter::Expr(expr) => {
                expr.truth_on(col) == crate::expression::Truth::True
            }
        }
    }
}

/// A FROM-clause operand after binding.
#[derive(Debug)]
pub enum BoundTableRef {
    Table(usize),
    Join(Box<BoundJoin>),
}

#[derive(Debug)]
pub struct BoundJoin {
    pub kind: JoinKind,
    pub left: BoundTableRef,
    pub right: BoundTableRef,
    pub spec: Option<BoundFilter>,
    /// `(left column, right column)` equality pairs extracted from the ON
    /// condition; non-empty makes merge execution applicable.
    pub key_pairs: Vec<(ColumnId, ColumnId)>,
}

/// One column of the result surface.
#[derive(Debug, Clone)]
pub struct OutputColumn {
    pub label: String,
    pub expr: Expr,
}

/// Fully bound query, alive until the query finishes.
#[derive(Debug)]
pub struct BoundQuery {
    pub tables: Vec<Table>,
    pub plan: BoundTableRef,
    pub output: Vec<OutputColumn>,
    pub residual: Option<BoundFilter>,
}

/// A statement moving through the pipeline; binding is idempotent.
#[derive(Debug)]
pub struct Select {
    pub stmt: SelectStmt,
    pub bound: Option<BoundQuery>,
}

impl Select {
    pub fn new(stmt: SelectStmt) -> Self {
        Select { stmt, bound: None }
    }
}

pub struct Binder<'a> {
    sources: &'a mut HashMap<String, Dbms>,
    aliases: &'a SessionAliases,
    tables: Vec<Table>,
    name_to_table: HashMap<String, usize>,
    /// per-query table aliases, including implicit ones (bare table name,
    /// full dotted name)
    table_aliases: HashMap<String, usize>,
}

impl<'a> Binder<'a> {
    pub fn new(sources: &'a mut HashMap<String, Dbms>, aliases: &'a SessionAliases) -> Self {
        Binder {
            sources,
            aliases,
            tables: Vec::new(),
            name_to_table: HashMap::new(),
            table_aliases: HashMap::new(),
        }
    }

    /// Binds `select` in place; a second call is a no-op.
    pub async fn bind(mut self, select: &mut Select) -> Result<(), EngineError> {
        if select.bound.is_some() {
            return Ok(());
        }

        // comma-separated FROM factors are an implicit cross join
        let mut from = select.stmt.from.clone().into_iter();
        let mut root = from.next().ok_or_else(|| {
            EngineError::semantic("FROM clause is empty")
        })?;
        for factor in from {
            root = TableRef::Join(Box::new(JoinNode {
                kind: JoinKind::Cross,
                left: root,
                right: factor,
                spec: None,
            }));
        }

        let (plan, _) = self.bind_table_ref(&root).await?;
        let output = self.bind_select_list(&select.stmt.select_list)?;
        let residual = match &select.stmt.where_clause {
            Some(where_expr) => self.bind_condition(where_expr.clone(), true)?,
            None => None,
        };

        select.bound = Some(BoundQuery {
            tables: self.tables,
            plan,
            output,
            residual,
        });
        Ok(())
    }

    fn bind_table_ref<'b>(
        &'b mut self,
        table_ref: &'b TableRef,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<(BoundTableRef, Vec<usize>), EngineError>>
                + Send
                + 'b,
        >,
    > {
        Box::pin(async move {
            match table_ref {
                TableRef::Named(chain) => {
                    let table = self.open_table(chain).await?;
                    Ok((BoundTableRef::Table(table), vec![table]))
                }
                TableRef::Join(node) => {
                    let (left, left_tables) = self.bind_table_ref(&node.left).await?;
                    let (right, right_tables) = self.bind_table_ref(&node.right).await?;

                    let (spec, key_pairs) = match &node.spec {
                        Some(raw) => {
                            let bound = self.bind_condition(raw.clone(), false)?;
                            let key_pairs = match &bound {
                                Some(filter) => {
                                    extract_key_pairs(filter, &left_tables, &right_tables)
                                }
                                None => Vec::new(),
                            };
                            (bound, key_pairs)
                        }
                        None => (None, Vec::new()),
                    };

                    let mut tables = left_tables;
                    tables.extend(&right_tables);
                    Ok((
                        BoundTableRef::Join(Box::new(BoundJoin {
                            kind: node.kind,
                            left,
                            right,
                            spec,
                            key_pairs,
                        })),
                        tables,
                    ))
                }
            }
        })
    }

    /// Resolves a table naming chain to its canonical four-part form using
    /// the alias maps; the chain's length decides which map applies.
    fn canonical_parts(
        &self,
        chain: &NamingChain,
    ) -> Result<Option<(String, String, String, String)>, EngineError> {
        let parts = chain.parts();
        let resolved = match parts {
            [dbms, db, schema, table] => {
                (dbms.clone(), db.clone(), schema.clone(), table.clone())
            }
            [alias_db, schema, table] => match self.aliases.db.get(alias_db) {
                Some((dbms, db)) => {
                    (dbms.clone(), db.clone(), schema.clone(), table.clone())
                }
                None => {
                    return Err(EngineError::semantic(format!(
                        "database alias {alias_db} not found"
                    )));
                }
            },
            [alias_schema, table] => match self.aliases.schema.get(alias_schema) {
                Some((dbms, db, schema)) => {
                    (dbms.clone(), db.clone(), schema.clone(), table.clone())
                }
                None => {
                    return Err(EngineError::semantic(format!(
                        "schema alias {alias_schema} not found"
                    )));
                }
            },
            [alias_table] => {
                // query-local aliases win over the session map; both are
                // resolved without touching any DBMS
                if self.table_aliases.contains_key(alias_table) {
                    return Ok(None);
                }
                match self.aliases.table.get(alias_table) {
                    Some((dbms, db, schema, table)) => (
                        dbms.clone(),
                        db.clone(),
                        schema.clone(),
                        table.clone(),
                    ),
                    None => {
                        return Err(EngineError::semantic(format!(
                            "table alias {alias_table} not found"
                        )));
                    }
                }
            }
            _ => {
                return Err(EngineError::semantic(format!(
                    "wrong naming chain for table: {chain}"
                )));
            }
        };
        let (dbms, db, schema, table) = resolved;
        let dbms = self.aliases.canonical_dbms(&dbms).to_string();
        Ok(Some((dbms, db, schema, table)))
    }

    /// FROM binding: constructs the [`Table`] on first use of a full name.
    async fn open_table(&mut self, chain: &NamingChain) -> Result<usize, EngineError> {
        let alias = chain.alias().map(str::to_string);

        let (dbms, db, schema, table) = match self.canonical_parts(chain)? {
            Some(parts) => parts,
            None => {
                // 1-part chain naming an already bound table
                let idx = self.table_aliases[&chain.parts()[0]];
                let full = self.tables[idx].full_name();
                error!("table {full} used more than once; multi-use is not supported");
                return Err(EngineError::semantic(format!(
                    "table {full} used more than once"
                )));
            }
        };

        let full_name = format!("{dbms}.{db}.{schema}.{table}");
        if self.name_to_table.contains_key(&full_name) {
            error!("table {full_name} used more than once; multi-use is not supported");
            return Err(EngineError::semantic(format!(
                "table {full_name} used more than once"
            )));
        }

        let source = self.sources.get_mut(&dbms).ok_or_else(|| {
            EngineError::UnknownEndpoint(dbms.clone())
        })?;
        let provider = source.connect(&db).await?;

        let raw_columns = provider.columns(&schema, &table).await?;
        if raw_columns.is_empty() {
            let msg = format!("columns not found for table {full_name}");
            error!("{msg}");
            return Err(EngineError::Semantic(msg));
        }
        let indexes = provider.indexes(&schema, &table).await?;
        if let Err(err) = provider.probe(&schema, &table).await {
            let msg = format!("table {full_name} not found: {err}");
            error!("{msg}");
            return Err(EngineError::Semantic(msg));
        }

        let idx = self.tables.len();
        self.tables.push(Table::new(
            dbms, db, schema, table, raw_columns, indexes,
        ));
        self.name_to_table.insert(full_name.clone(), idx);

        if let Some(alias) = alias {
            if self.table_aliases.contains_key(&alias) {
                let msg = format!("duplicate table alias {alias}");
                error!("{msg}");
                return Err(EngineError::Semantic(msg));
            }
            self.table_aliases.insert(alias, idx);
        } else {
            // implicit aliases: the bare table name and the full dotted name
            let bare = self.tables[idx].name.clone();
            self.table_aliases.entry(bare).or_insert(idx);
        }
        self.table_aliases.entry(full_name).or_insert(idx);
        Ok(idx)
    }

    /// Column-side table lookup; never opens a connection.
    fn lookup_table(&self, chain: &NamingChain) -> Result<usize, EngineError> {
        if chain.len() == 1 {
            if let Some(&idx) = self.table_aliases.get(&chain.parts()[0]) {
                return Ok(idx);
            }
        }
        if let Some((dbms, db, schema, table)) = self.canonical_parts(chain)? {
            let full_name = format!("{dbms}.{db}.{schema}.{table}");
            if let Some(&idx) = self.name_to_table.get(&full_name) {
                return Ok(idx);
            }
        }
        Err(EngineError::semantic(format!(
            "table {chain} not found in FROM"
        )))
    }

    fn bind_select_list(
        &mut self,
        select_list: &SelectList,
    ) -> Result<Vec<OutputColumn>, EngineError> {
        let mut output = Vec::new();
        match select_list {
            SelectList::All => {
                for idx in 0..self.tables.len() {
                    self.emit_whole_table(idx, &mut output)?;
                }
            }
            SelectList::Items(items) => {
                for item in items {
                    match item {
                        SelectItem::QualifiedStar(chain) => {
                            let idx = self.lookup_table(chain)?;
                            self.emit_whole_table(idx, &mut output)?;
                        }
                        SelectItem::Expr { expr, alias } => {
                            // the label reflects the expression as written,
                            // before convolution and binding rewrite it
                            let label = alias.clone().unwrap_or_else(|| expr.to_string());
                            let bound =
                                self.bind_expression(expr.clone().convolve(), Usage::Select)?;
                            output.push(OutputColumn { label, expr: bound });
                        }
                    }
                }
            }
        }
        Ok(output)
    }

    fn emit_whole_table(
        &mut self,
        idx: usize,
        output: &mut Vec<OutputColumn>,
    ) -> Result<(), EngineError> {
        for col in 0..self.tables[idx].columns.len() {
            self.tables[idx].mark_used(col)?;
            self.tables[idx].columns[col].visible = true;
            output.push(OutputColumn {
                label: self.tables[idx].columns[col].name.clone(),
                expr: Expr::Column(ColumnRef::Bound(ColumnId {
                    table: idx,
                    column: col,
                })),
            });
        }
        Ok(())
    }

    /// Binds a WHERE or ON condition: shape check, convolution, name
    /// resolution, then PDNF for boolean expressions. `pushdown` also hangs
    /// single-table conjuncts onto their table's filter list.
    fn bind_condition(
        &mut self,
        raw: Expr,
        pushdown: bool,
    ) -> Result<Option<BoundFilter>, EngineError> {
        if !matches!(
            raw,
            Expr::Logic { .. }
                | Expr::Not(_)
                | Expr::Is { .. }
                | Expr::Cmp { .. }
                | Expr::Column(_)
        ) {
            let msg = "condition must be a boolean expression, predicate or column";
            error!("{msg}");
            return Err(EngineError::semantic(msg));
        }

        let bound = self.bind_expression(raw.convolve(), Usage::Filter)?;

        if pushdown {
            self.push_single_table_conjuncts(&bound);
        }

        Ok(match bound {
            Expr::Bool(true) => None,
            expr @ (Expr::Logic { .. } | Expr::Not(_) | Expr::Is { .. } | Expr::Bool(_)) => {
                Some(BoundFilter::Pdnf(Pdnf::new(expr)))
            }
            Expr::Null => Some(BoundFilter::Expr(Expr::Null)),
            expr => Some(BoundFilter::Expr(expr)),
        })
    }

    /// Top-level AND conjuncts referencing exactly one table become that
    /// table's pushed-down source filters.
    fn push_single_table_conjuncts(&mut self, expr: &Expr) {
        match expr {
            Expr::Logic {
                op: LogicOp::And,
                left,
                right,
            } => {
                self.push_single_table_conjuncts(left);
                self.push_single_table_conjuncts(right);
            }
            other => {
                let mut tables = Vec::new();
                collect_tables(other, &mut tables);
                if let [single] = tables.as_slice() {
                    self.tables[*single].filters.push(other.clone());
                }
            }
        }
    }

    /// Resolves column references and applies usage marks, rewriting the
    /// expression in place.
    fn bind_expression(&mut self, expr: Expr, usage: Usage) -> Result<Expr, EngineError> {
        Ok(match expr {
            Expr::Column(ColumnRef::Unresolved(chain)) => {
                let id = self.resolve_column(&chain)?;
                let table = &mut self.tables[id.table];
                table.mark_used(id.column)?;
                match usage {
                    Usage::Select => table.columns[id.column].visible = true,
                    Usage::Filter => table.columns[id.column].count_used += 1,
                }
                Expr::Column(ColumnRef::Bound(id))
            }
            Expr::Column(bound) => Expr::Column(bound),
            Expr::Neg(inner) => Expr::Neg(Box::new(self.bind_expression(*inner, usage)?)),
            Expr::Not(inner) => Expr::Not(Box::new(self.bind_expression(*inner, usage)?)),
            Expr::Arith { op, left, right } => Expr::Arith {
                op,
                left: Box::new(self.bind_expression(*left, usage)?),
                right: Box::new(self.bind_expression(*right, usage)?),
            },
            Expr::Logic { op, left, right } => Expr::Logic {
                op,
                left: Box::new(self.bind_expression(*left, usage)?),
                right: Box::new(self.bind_expression(*right, usage)?),
            },
            Expr::Is { expr, truth } => Expr::Is {
                expr: Box::new(self.bind_expression(*expr, usage)?),
                truth,
            },
            Expr::Cmp { op, left, right } => Expr::Cmp {
                op,
                left: Box::new(self.bind_expression(*left, usage)?),
                right: Box::new(self.bind_expression(*right, usage)?),
            },
            literal => literal,
        })
    }

    /// `table.column` references carry two to five parts: the last is the
    /// column, the rest name the table.
    fn resolve_column(&mut self, chain: &NamingChain) -> Result<ColumnId, EngineError> {
        if chain.len() < 2 || chain.len() > 5 {
            let msg = format!("column reference {chain} must have two to five parts");
            error!("{msg}");
            return Err(EngineError::Semantic(msg));
        }
        let (table_chain, column_name) = chain.split_last();
        let table = self.lookup_table(&table_chain)?;
        match self.tables[table].name_to_column.get(column_name) {
            Some(&column) => Ok(ColumnId { table, column }),
            None => {
                let msg = format!("column {chain} not found");
                error!("{msg}");
                Err(EngineError::Semantic(msg))
            }
        }
    }
}

/// Table ids referenced by bound column nodes of an expression.
fn collect_tables(expr: &Expr, out: &mut Vec<usize>) {
    match expr {
        Expr::Column(ColumnRef::Bound(id)) => {
            if !out.contains(&id.table) {
                out.push(id.table);
            }
        }
        Expr::Neg(inner) | Expr::Not(inner) => collect_tables(inner, out),
        Expr::Is { expr, .. } => collect_tables(expr, out),
        Expr::Arith { left, right, .. }
        | Expr::Logic { left, right, .. }
        | Expr::Cmp { left, right, .. } => {
            collect_tables(left, out);
            collect_tables(right, out);
        }
        _ => {}
    }
}

/// Extracts `(left, right)` column equality pairs that make merge execution
/// applicable: top-level AND conjuncts of the ON condition comparing one
/// column from each side with `=`.
fn extract_key_pairs(
    filter: &BoundFilter,
    left_tables: &[usize],
    right_tables: &[usize],
) -> Vec<(ColumnId, ColumnId)> {
    let expr = match filter {
        BoundFilter::Pdnf(pdnf) => pdnf.expr(),
        BoundFilter::Expr(expr) => expr,
    };
    let mut pairs = Vec::new();
    collect_equality_pairs(expr, left_tables, right_tables, &mut pairs);
    pairs
}

fn collect_equality_pairs(
    expr: &Expr,
    left_tables: &[usize],
    right_tables: &[usize],
    out: &mut Vec<(ColumnId, ColumnId)>,
) {
    match expr {
        Expr::Logic {
            op: LogicOp::And,
            left,
            right,
        } => {
            collect_equality_pairs(left, left_tables, right_tables, out);
            collect_equality_pairs(right, left_tables, right_tables, out);
        }
        Expr::Cmp {
            op: CmpOp::Eq,
            left,
            right,
        } => {
            if let (
                Expr::Column(ColumnRef::Bound(a)),
                Expr::Column(ColumnRef::Bound(b)),
            ) = (left.as_ref(), right.as_ref())
            {
                if left_tables.contains(&a.table) && right_tables.contains(&b.table) {
                    out.push((*a, *b));
                } else if left_tables.contains(&b.table) && right_tables.contains(&a.table) {
                    out.push((*b, *a));
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use crate::database::DbmsKind;
    use crate::expression::Truth;
    use crate::parser::Parser;
    use rstest::rstest;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    /// Seeds a throwaway SQLite file with two tables and an index, and
    /// registers it as the endpoint `lite`.
    async fn fixture() -> (HashMap<String, Dbms>, SessionAliases, std::path::PathBuf) {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("fedsql_bind_{stamp}.db"));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(&path)
                    .create_if_missing(true),
            )
            .await
            .expect("fixture pool");
        sqlx::query("CREATE TABLE t (a INTEGER, b INTEGER, payload BLOB)")
            .execute(&pool)
            .await
            .expect("create t");
        sqlx::query("CREATE TABLE u (a INTEGER, c TEXT)")
            .execute(&pool)
            .await
            .expect("create u");
        sqlx::query("CREATE INDEX u_a ON u (a)")
            .execute(&pool)
            .await
            .expect("index u_a");
        pool.close().await;

        let mut sources = HashMap::new();
        sources.insert(
            "lite".to_string(),
            Dbms::new(
                "lite".to_string(),
                EndpointConfig {
                    kind: DbmsKind::Sqlite,
                    server: None,
                    port: None,
                    user: None,
                    password: None,
                    driver: None,
                    path: Some(path.to_string_lossy().into_owned()),
                },
            ),
        );
        (sources, SessionAliases::default(), path)
    }

    async fn bind_sql(
        sources: &mut HashMap<String, Dbms>,
        aliases: &SessionAliases,
        sql: &str,
    ) -> Result<BoundQuery, EngineError> {
        let stmt = Parser::new(sql).parse_statement().expect("parse");
        let mut select = Select::new(stmt);
        Binder::new(sources, aliases).bind(&mut select).await?;
        Ok(select.bound.expect("bound"))
    }

    #[rstest]
    #[tokio::test]
    async fn marks_visibility_and_pushes_filters() {
        let (mut sources, aliases, _path) = fixture().await;
        let bound = bind_sql(
            &mut sources,
            &aliases,
            "SELECT t.a, t.b FROM lite.main.main.t WHERE t.a = 1 AND t.b IS NULL",
        )
        .await
        .unwrap();

        let table = &bound.tables[0];
        assert!(table.columns[0].used && table.columns[0].visible);
        assert!(table.columns[1].used && table.columns[1].visible);
        assert_eq!(table.columns[0].count_used, 1);
        assert_eq!(table.columns[1].count_used, 1);
        // both conjuncts reference only this table
        assert_eq!(table.filters.len(), 2);

        // PDNF over bases {a = 1, b IS NULL} accepts exactly (TRUE, TRUE)
        let Some(BoundFilter::Pdnf(pdnf)) = &bound.residual else {
            panic!("expected a PDNF residual");
        };
        assert_eq!(pdnf.bases().len(), 2);
        assert_eq!(pdnf.accepted().len(), 1);
        assert!(pdnf.accepts(&[Truth::True, Truth::True]));
    }

    #[rstest]
    #[tokio::test]
    async fn resolves_schema_alias() {
        let (mut sources, mut aliases, _path) = fixture().await;
        aliases
            .register(
                &["lite".to_string(), "main".to_string(), "main".to_string()],
                "m",
            )
            .unwrap();
        let bound = bind_sql(&mut sources, &aliases, "SELECT m.t.a FROM m.t")
            .await
            .unwrap();
        assert_eq!(bound.tables[0].full_name(), "lite.main.main.t");
        assert!(bound.tables[0].columns[0].visible);
    }

    #[rstest]
    #[tokio::test]
    async fn resolves_dbms_alias() {
        let (mut sources, mut aliases, _path) = fixture().await;
        aliases.register(&["lite".to_string()], "l").unwrap();
        let bound = bind_sql(&mut sources, &aliases, "SELECT t.a FROM l.main.main.t")
            .await
            .unwrap();
        assert_eq!(bound.tables[0].dbms, "lite");
    }

    #[rstest]
    #[tokio::test]
    async fn join_extracts_key_pairs_and_marks() {
        let (mut sources, aliases, _path) = fixture().await;
        let bound = bind_sql(
            &mut sources,
            &aliases,
            "SELECT x.b FROM lite.main.main.t AS x INNER JOIN lite.main.main.u AS y \
             ON x.a = y.a",
        )
        .await
        .unwrap();

        let BoundTableRef::Join(join) = &bound.plan else {
            panic!("expected join plan");
        };
        assert_eq!(join.kind, JoinKind::Inner);
        assert_eq!(join.key_pairs.len(), 1);
        let (l, r) = join.key_pairs[0];
        assert_eq!((l.table, r.table), (0, 1));
        // the ON condition is a bare comparison predicate, not a PDNF
        assert!(matches!(join.spec, Some(BoundFilter::Expr(Expr::Cmp { .. }))));

        let x_a = &bound.tables[0].columns[0];
        assert!(x_a.used && !x_a.visible);
        assert_eq!(x_a.count_used, 1);
        let y_a = &bound.tables[1].columns[0];
        assert!(y_a.used && !y_a.visible);
    }

    #[rstest]
    #[tokio::test]
    async fn select_star_marks_everything_supported() {
        let (mut sources, aliases, _path) = fixture().await;
        // `payload BLOB` is unsupported, so `SELECT *` must fail on it
        let err = bind_sql(&mut sources, &aliases, "SELECT * FROM lite.main.main.t")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Semantic(_)));

        let bound = bind_sql(&mut sources, &aliases, "SELECT u.* FROM lite.main.main.u")
            .await
            .unwrap();
        assert!(bound.tables[0].columns.iter().all(|c| c.used && c.visible));
        assert_eq!(bound.output.len(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_table_use_is_rejected() {
        let (mut sources, aliases, _path) = fixture().await;
        let err = bind_sql(
            &mut sources,
            &aliases,
            "SELECT t.a FROM lite.main.main.t CROSS JOIN lite.main.main.t",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Semantic(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_alias_is_rejected() {
        let (mut sources, aliases, _path) = fixture().await;
        let err = bind_sql(
            &mut sources,
            &aliases,
            "SELECT x.a FROM lite.main.main.t AS x CROSS JOIN lite.main.main.u AS x",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Semantic(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn missing_column_is_rejected() {
        let (mut sources, aliases, _path) = fixture().await;
        let err = bind_sql(
            &mut sources,
            &aliases,
            "SELECT t.nope FROM lite.main.main.t",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Semantic(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_aliases_are_rejected() {
        let (mut sources, aliases, _path) = fixture().await;
        for sql in [
            "SELECT t.a FROM nosuch.main.t",      // db alias
            "SELECT t.a FROM nosuch.t",           // schema alias
            "SELECT t.a FROM nosuch",             // table alias
        ] {
            let err = bind_sql(&mut sources, &aliases, sql).await.unwrap_err();
            assert!(matches!(err, EngineError::Semantic(_)), "{sql}");
        }
    }

    #[rstest]
    #[tokio::test]
    async fn binding_twice_is_a_noop() {
        let (mut sources, aliases, _path) = fixture().await;
        let stmt = Parser::new("SELECT t.a FROM lite.main.main.t")
            .parse_statement()
            .unwrap();
        let mut select = Select::new(stmt);
        Binder::new(&mut sources, &aliases)
            .bind(&mut select)
            .await
            .unwrap();
        let count_used = select.bound.as_ref().unwrap().tables[0].columns[0].count_used;
        Binder::new(&mut sources, &aliases)
            .bind(&mut select)
            .await
            .unwrap();
        assert_eq!(
            select.bound.as_ref().unwrap().tables[0].columns[0].count_used,
            count_used
        );
    }

    #[rstest]
    #[tokio::test]
    async fn comma_from_becomes_cross_join() {
        let (mut sources, aliases, _path) = fixture().await;
        let bound = bind_sql(
            &mut sources,
            &aliases,
            "SELECT t.a FROM lite.main.main.t, lite.main.main.u WHERE t.a = u.a",
        )
        .await
        .unwrap();
        let BoundTableRef::Join(join) = &bound.plan else {
            panic!("expected implicit cross join");
        };
        assert_eq!(join.kind, JoinKind::Cross);
        // equality lives in WHERE, not in a join spec
        assert!(join.spec.is_none());
        assert!(join.key_pairs.is_empty());
        assert!(bound.residual.is_some());
        // a cross-table predicate is pushed to neither side
        assert!(bound.tables[0].filters.is_empty());
        assert!(bound.tables[1].filters.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn one_part_names_resolve_without_new_connections() {
        let (mut sources, aliases, _path) = fixture().await;
        let _ = bind_sql(
            &mut sources,
            &aliases,
            "SELECT x.a FROM lite.main.main.t AS x WHERE x.b = 2",
        )
        .await
        .unwrap();
        // only the FROM bind opened a pool
        assert_eq!(sources["lite"].open_databases().count(), 1);
    }
}
