//! Dotted identifier paths.

use std::fmt;

/// An ordered, case-preserved dotted name such as `pg.main.public.users`,
/// optionally carrying an alias assigned with `AS`.
///
/// Lengths 1 through 4 address `table`, `schema.table`,
/// `database.schema.table` and `dbms.database.schema.table` respectively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamingChain {
    parts: Vec<String>,
    alias: Option<String>,
}

impl NamingChain {
    pub fn new(first: impl Into<String>) -> Self {
        Self {
            parts: vec![first.into()],
            alias: None,
        }
    }

    pub fn from_parts(parts: Vec<String>) -> Self {
        debug_assert!(!parts.is_empty());
        Self { parts, alias: None }
    }

    pub fn push_first(&mut self, part: impl Into<String>) {
        self.parts.insert(0, part.into());
    }

    pub fn push_last(&mut self, part: impl Into<String>) {
        self.parts.push(part.into());
    }

    pub fn set_alias(&mut self, alias: Option<String>) {
        self.alias = alias;
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Splits `a.b.c` into the leading table path `a.b` and the final part `c`.
    pub fn split_last(&self) -> (NamingChain, &str) {
        let (last, head) = self.parts.split_last().expect("chain is never empty");
        (NamingChain::from_parts(head.to_vec()), last)
    }
}

impl fmt::Display for NamingChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn push_and_display() {
        let mut chain = NamingChain::new("table");
        chain.push_first("schema");
        chain.push_first("db");
        chain.push_last("col");
        assert_eq!(chain.to_string(), "db.schema.table.col");
        assert_eq!(chain.len(), 4);
    }

    #[rstest]
    fn equality_ignores_alias() {
        let mut a = NamingChain::from_parts(vec!["s".into(), "t".into()]);
        let b = NamingChain::from_parts(vec!["s".into(), "t".into()]);
        a.set_alias(Some("x".into()));
        // alias participates in the struct, so these differ
        assert_ne!(a, b);
        assert_eq!(a.parts(), b.parts());
    }

    #[rstest]
    fn split_last_returns_table_path_and_column() {
        let chain = NamingChain::from_parts(vec!["s".into(), "t".into(), "c".into()]);
        let (table, column) = chain.split_last();
        assert_eq!(table.to_string(), "s.t");
        assert_eq!(column, "c");
    }
}
