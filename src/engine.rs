//! Top-level façade: owns the configured DBMS endpoints and the session
//! alias maps, and drives one query at a time through
//! parse → bind → rewrite → remote fetch → local mirror → join → result.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::binder::{
    Binder, BoundFilter, BoundQuery, BoundTableRef, Select, SessionAliases,
};
use crate::config::Config;
use crate::database::Dbms;
use crate::database_sqlite::LocalStore;
use crate::error::EngineError;
use crate::join::{cross_join, qualified_join, RowPredicate, RowStream};
use crate::parser::{JoinKind, ParseError, Parser};
use crate::rewrite;
use crate::schema::{ColumnId, Value};

static USE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*use\s+([a-zA-Z_][a-zA-Z0-9_.]*)\s+as\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*;?\s*$")
        .unwrap()
});
static EXIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*exit\s*;?\s*$").unwrap());

/// What a REPL input line means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Use { parts: Vec<String>, short: String },
    Exit,
    /// Part of a SQL statement; accumulate until a line ends with `;`.
    Statement,
}

pub fn classify_line(line: &str) -> Command {
    if let Some(caps) = USE_RE.captures(line) {
        let parts = caps[1]
            .split('.')
            .map(|part| part.trim().to_lowercase())
            .collect();
        return Command::Use {
            parts,
            short: caps[2].to_lowercase(),
        };
    }
    if EXIT_RE.is_match(line) {
        return Command::Exit;
    }
    Command::Statement
}

/// Everything a query run surfaces: the per-source selections actually sent,
/// the mirror DDL, the equivalent final local SELECT, and the result rows.
#[derive(Debug)]
pub struct QueryOutcome {
    pub source_queries: Vec<(String, String)>,
    pub create_statements: Vec<String>,
    pub final_sql: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

pub struct Engine {
    sources: HashMap<String, Dbms>,
    aliases: SessionAliases,
}

impl Engine {
    pub fn from_config(config: Config) -> Self {
        let sources = config
            .endpoints
            .into_iter()
            .map(|(name, endpoint)| (name.clone(), Dbms::new(name, endpoint)))
            .collect();
        Engine {
            sources,
            aliases: SessionAliases::default(),
        }
    }

    pub fn register_alias(
        &mut self,
        parts: &[String],
        short: &str,
    ) -> Result<(), EngineError> {
        self.aliases.register(parts, short)
    }

    /// Runs one SELECT end to end.
    pub async fn run_query(&mut self, sql: &str) -> Result<QueryOutcome, EngineError> {
        let stmt = Parser::new(sql).parse_statement().map_err(|err| match err {
            ParseError::NotSupported(what) => EngineError::NotSupported(what),
            other => EngineError::FatalSyntax(other.to_string()),
        })?;

        let mut select = Select::new(stmt);
        Binder::new(&mut self.sources, &self.aliases)
            .bind(&mut select)
            .await?;
        let mut bound = select
            .bound
            .take()
            .ok_or(EngineError::Unreachable("select left unbound"))?;

        for table in &mut bound.tables {
            ensure_fetchable(table)?;
            rewrite::assign_fetch_positions(table);
        }

        let final_sql = rewrite::final_select(&bound);

        // mirror remote rows into a fresh local store
        let store = LocalStore::open().await?;
        let mut source_queries = Vec::new();
        let mut create_statements = Vec::new();
        for table in &bound.tables {
            let source = self
                .sources
                .get_mut(&table.dbms)
                .ok_or_else(|| EngineError::UnknownEndpoint(table.dbms.clone()))?;
            let kind = source.kind;
            let select_sql = rewrite::source_select(table, kind);
            let types = rewrite::fetch_types(table);
            info!("fetching {} with: {select_sql}", table.full_name());
            let provider = source.connect(&table.database).await?;
            let rows = provider.fetch(&select_sql, &types).await?;
            debug!("{} rows from {}", rows.len(), table.full_name());

            let create = rewrite::mirror_create(table);
            store.execute(&create).await?;
            store
                .insert_rows(&rewrite::mirror_insert(table), &rows)
                .await?;
            source_queries.push((table.full_name(), select_sql));
            create_statements.push(create);
        }

        let offsets = Rc::new(column_offsets(&bound));
        let plan = std::mem::replace(&mut bound.plan, BoundTableRef::Table(0));
        let stream =
            execute_plan(&store, &bound, Rc::clone(&offsets), plan, 0, Vec::new()).await?;

        let residual = bound.residual.take().map(|filter| {
            predicate_for(filter, Rc::clone(&offsets), 0)
        });
        let output = bound.output.clone();
        let offsets_for_rows = Rc::clone(&offsets);
        let rows: Vec<Vec<Value>> = stream
            .iter
            .filter(|row| residual.as_ref().map_or(true, |accepts| accepts(row)))
            .map(|row| {
                output
                    .iter()
                    .map(|out| {
                        out.expr
                            .eval_value(&|id: ColumnId| row[offsets_for_rows[&id]].clone())
                    })
                    .collect()
            })
            .collect();

        store.close().await;

        Ok(QueryOutcome {
            source_queries,
            create_statements,
            final_sql,
            header: bound.output.iter().map(|o| o.label.clone()).collect(),
            rows,
        })
    }
}

/// A table whose columns are all unneeded still contributes its row count;
/// fetch its first supported column to preserve multiplicity.
fn ensure_fetchable(table: &mut crate::schema::Table) -> Result<(), EngineError> {
    if table.columns.iter().any(|c| c.fetched()) {
        return Ok(());
    }
    let first_supported = table
        .columns
        .iter()
        .position(|c| c.supported())
        .ok_or_else(|| {
            EngineError::semantic(format!(
                "table {} has no usable columns",
                table.full_name()
            ))
        })?;
    table.mark_used(first_supported)?;
    table.columns[first_supported].count_used += 1;
    Ok(())
}

/// Global offset of every fetched column within the final concatenated row:
/// leaf tables in plan order, each contributing its fetched columns.
fn column_offsets(bound: &BoundQuery) -> HashMap<ColumnId, usize> {
    let mut leaves = Vec::new();
    leaf_order(&bound.plan, &mut leaves);
    let mut offsets = HashMap::new();
    let mut base = 0usize;
    for table_idx in leaves {
        let table = &bound.tables[table_idx];
        for (col_idx, column) in table.columns.iter().enumerate() {
            if let Some(pos) = column.fetch_pos {
                offsets.insert(
                    ColumnId {
                        table: table_idx,
                        column: col_idx,
                    },
                    base + pos,
                );
            }
        }
        base += table.fetched_columns().count();
    }
    offsets
}

fn leaf_order(plan: &BoundTableRef, out: &mut Vec<usize>) {
    match plan {
        BoundTableRef::Table(idx) => out.push(*idx),
        BoundTableRef::Join(join) => {
            leaf_order(&join.left, out);
            leaf_order(&join.right, out);
        }
    }
}

fn predicate_for(
    filter: BoundFilter,
    offsets: Rc<HashMap<ColumnId, usize>>,
    base: usize,
) -> RowPredicate {
    Rc::new(move |row: &[Value]| {
        filter.accepts_row(&|id: ColumnId| row[offsets[&id] - base].clone())
    })
}

/// Pulls each leaf table from the mirror (ordered by its join keys when a
/// BTREE index makes merge execution applicable) and folds the join tree.
fn execute_plan<'a>(
    store: &'a LocalStore,
    bound: &'a BoundQuery,
    offsets: Rc<HashMap<ColumnId, usize>>,
    node: BoundTableRef,
    base: usize,
    sort_hint: Vec<ColumnId>,
) -> std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<RowStream, EngineError>> + 'a>,
> {
    Box::pin(async move {
        match node {
            BoundTableRef::Table(idx) => {
                let table = &bound.tables[idx];
                let mut order_by: Vec<String> = Vec::new();
                let mut sorted_by: Vec<usize> = Vec::new();
                if !sort_hint.is_empty() {
                    let names: Vec<String> = sort_hint
                        .iter()
                        .map(|id| table.columns[id.column].name.clone())
                        .collect();
                    if table.index_prefix_for(&names).is_some() {
                        sorted_by = sort_hint
                            .iter()
                            .filter_map(|id| table.columns[id.column].fetch_pos)
                            .collect();
                        order_by = names;
                    }
                }
                let types = rewrite::fetch_types(table);
                let sql = rewrite::mirror_select(table, &order_by);
                let rows = store.fetch(&sql, &types).await?;
                Ok(RowStream::from_rows(rows, types.len(), sorted_by))
            }
            BoundTableRef::Join(join) => {
                let join = *join;
                let left_hint = match &join.left {
                    BoundTableRef::Table(_) => {
                        join.key_pairs.iter().map(|(l, _)| *l).collect()
                    }
                    _ => Vec::new(),
                };
                let right_hint = match &join.right {
                    BoundTableRef::Table(_) => {
                        join.key_pairs.iter().map(|(_, r)| *r).collect()
                    }
                    _ => Vec::new(),
                };

                let left = execute_plan(
                    store,
                    bound,
                    Rc::clone(&offsets),
                    join.left,
                    base,
                    left_hint,
                )
                .await?;
                let right_base = base + left.width;
                let right = execute_plan(
                    store,
                    bound,
                    Rc::clone(&offsets),
                    join.right,
                    right_base,
                    right_hint,
                )
                .await?;

                Ok(match join.kind {
                    JoinKind::Cross => cross_join(left, right),
                    kind => {
                        let keys: Vec<(usize, usize)> = join
                            .key_pairs
                            .iter()
                            .map(|(l, r)| (offsets[l] - base, offsets[r] - right_base))
                            .collect();
                        let spec = join
                            .spec
                            .map(|filter| predicate_for(filter, Rc::clone(&offsets), base));
                        qualified_join(kind, left, right, spec, &keys)
                    }
                })
            }
        }
    })
}
