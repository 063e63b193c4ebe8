//! SQL:1999 keyword tables.
//!
//! Both lists are sorted so membership checks are binary searches over
//! static data. Reserved words may not be used as identifiers; non-reserved
//! words lex as keywords but remain usable as identifiers.

pub const SELECT: &str = "SELECT";
pub const FROM: &str = "FROM";
pub const WHERE: &str = "WHERE";
pub const GROUP: &str = "GROUP";
pub const HAVING: &str = "HAVING";
pub const AS: &str = "AS";
pub const AND: &str = "AND";
pub const OR: &str = "OR";
pub const NOT: &str = "NOT";
pub const IS: &str = "IS";
pub const TRUE: &str = "TRUE";
pub const FALSE: &str = "FALSE";
pub const NULL: &str = "NULL";
pub const CROSS: &str = "CROSS";
pub const INNER: &str = "INNER";
pub const OUTER: &str = "OUTER";
pub const LEFT: &str = "LEFT";
pub const RIGHT: &str = "RIGHT";
pub const FULL: &str = "FULL";
pub const JOIN: &str = "JOIN";
pub const ON: &str = "ON";
pub const USING: &str = "USING";
pub const INSERT: &str = "INSERT";
pub const UPDATE: &str = "UPDATE";
pub const DELETE: &str = "DELETE";
pub const CREATE: &str = "CREATE";
pub const UNIQUE: &str = "UNIQUE";
pub const INDEX: &str = "INDEX";
pub const IF: &str = "IF";
pub const EXISTS: &str = "EXISTS";
pub const ONLY: &str = "ONLY";
pub const COLLATE: &str = "COLLATE";
pub const ASC: &str = "ASC";
pub const DESC: &str = "DESC";
pub const NULLS: &str = "NULLS";
pub const FIRST: &str = "FIRST";
pub const LAST: &str = "LAST";

/// Reserved words of SQL:1999, sorted.
pub static RESERVED_WORDS: &[&str] = &[
    "ABSOLUTE",
    "ACTION",
    "ADD",
    "ADMIN",
    "AFTER",
    "AGGREGATE",
    "ALIAS",
    "ALL",
    "ALLOCATE",
    "ALTER",
    "AND",
    "ANY",
    "ARE",
    "ARRAY",
    "AS",
    "ASC",
    "ASSERTION",
    "AT",
    "AUTHORIZATION",
    "BEFORE",
    "BEGIN",
    "BINARY",
    "BIT",
    "BLOB",
    "BOOLEAN",
    "BOTH",
    "BREADTH",
    "BY",
    "CALL",
    "CASCADE",
    "CASCADED",
    "CASE",
    "CAST",
    "CATALOG",
    "CHAR",
    "CHARACTER",
    "CHECK",
    "CLASS",
    "CLOB",
    "CLOSE",
    "COLLATE",
    "COLLATION",
    "COLUMN",
    "COMMIT",
    "COMPLETION",
    "CONNECT",
    "CONNECTION",
    "CONSTRAINT",
    "CONSTRAINTS",
    "CONSTRUCTOR",
    "CONTINUE",
    "CORRESPONDING",
    "CREATE",
    "CROSS",
    "CUBE",
    "CURRENT",
    "CURRENT_DATE",
    "CURRENT_PATH",
    "CURRENT_ROLE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_USER",
    "CURSOR",
    "CYCLE",
    "DATA",
    "DATE",
    "DAY",
    "DEALLOCATE",
    "DEC",
    "DECIMAL",
    "DECLARE",
    "DEFAULT",
    "DEFERRABLE",
    "DEFERRED",
    "DELETE",
    "DEPTH",
    "DEREF",
    "DESC",
    "DESCRIBE",
    "DESCRIPTOR",
    "DESTROY",
    "DESTRUCTOR",
    "DETERMINISTIC",
    "DIAGNOSTICS",
    "DICTIONARY",
    "DISCONNECT",
    "DISTINCT",
    "DOMAIN",
    "DOUBLE",
    "DROP",
    "DYNAMIC",
    "EACH",
    "ELSE",
    "END",
    "END-EXEC",
    "EQUALS",
    "ESCAPE",
    "EVERY",
    "EXCEPT",
    "EXCEPTION",
    "EXEC",
    "EXECUTE",
    "EXTERNAL",
    "FALSE",
    "FETCH",
    "FIRST",
    "FLOAT",
    "FOR",
    "FOREIGN",
    "FOUND",
    "FREE",
    "FROM",
    "FULL",
    "FUNCTION",
    "GENERAL",
    "GET",
    "GLOBAL",
    "GO",
    "GOTO",
    "GRANT",
    "GROUP",
    "GROUPING",
    "HAVING",
    "HOST",
    "HOUR",
    "IDENTITY",
    "IGNORE",
    "IMMEDIATE",
    "IN",
    "INDICATOR",
    "INITIALIZE",
    "INITIALLY",
    "INNER",
    "INOUT",
    "INPUT",
    "INSERT",
    "INT",
    "INTEGER",
    "INTERSECT",
    "INTERVAL",
    "INTO",
    "IS",
    "ISOLATION",
    "ITERATE",
    "JOIN",
    "KEY",
    "LANGUAGE",
    "LARGE",
    "LAST",
    "LATERAL",
    "LEADING",
    "LEFT",
    "LESS",
    "LEVEL",
    "LIKE",
    "LIMIT",
    "LOCAL",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "LOCATOR",
    "MAP",
    "MATCH",
    "MINUTE",
    "MODIFIES",
    "MODIFY",
    "MODULE",
    "MONTH",
    "NAMES",
    "NATIONAL",
    "NATURAL",
    "NCHAR",
    "NCLOB",
    "NEW",
    "NEXT",
    "NO",
    "NONE",
    "NOT",
    "NULL",
    "NUMERIC",
    "OBJECT",
    "OF",
    "OFF",
    "OLD",
    "ON",
    "ONLY",
    "OPEN",
    "OPERATION",
    "OPTION",
    "OR",
    "ORDER",
    "ORDINALITY",
    "OUT",
    "OUTER",
    "OUTPUT",
    "PAD",
    "PARAMETER",
    "PARAMETERS",
    "PARTIAL",
    "PATH",
    "POSTFIX",
    "PRECISION",
    "PREFIX",
    "PREORDER",
    "PREPARE",
    "PRESERVE",
    "PRIMARY",
    "PRIOR",
    "PRIVILEGES",
    "PROCEDURE",
    "PUBLIC",
    "READ",
    "READS",
    "REAL",
    "RECURSIVE",
    "REF",
    "REFERENCES",
    "REFERENCING",
    "RELATIVE",
    "RESTRICT",
    "RESULT",
    "RETURN",
    "RETURNS",
    "REVOKE",
    "RIGHT",
    "ROLE",
    "ROLLBACK",
    "ROLLUP",
    "ROUTINE",
    "ROW",
    "ROWS",
    "SAVEPOINT",
    "SCHEMA",
    "SCOPE",
    "SCROLL",
    "SEARCH",
    "SECOND",
    "SECTION",
    "SELECT",
    "SEQUENCE",
    "SESSION",
    "SESSION_USER",
    "SET",
    "SETS",
    "SIZE",
    "SMALLINT",
    "SOME",
    "SPACE",
    "SPECIFIC",
    "SPECIFICTYPE",
    "SQL",
    "SQLEXCEPTION",
    "SQLSTATE",
    "SQLWARNING",
    "START",
    "STATE",
    "STATEMENT",
    "STATIC",
    "STRUCTURE",
    "SYSTEM_USER",
    "TABLE",
    "TEMPORARY",
    "TERMINATE",
    "THAN",
    "THEN",
    "TIME",
    "TIMESTAMP",
    "TIMEZONE_HOUR",
    "TIMEZONE_MINUTE",
    "TO",
    "TRAILING",
    "TRANSACTION",
    "TRANSLATION",
    "TREAT",
    "TRIGGER",
    "TRUE",
    "UNDER",
    "UNION",
    "UNIQUE",
    "UNKNOWN",
    "UNNEST",
    "UPDATE",
    "USAGE",
    "USER",
    "USING",
    "VALUE",
    "VALUES",
    "VARCHAR",
    "VARIABLE",
    "VARYING",
    "VIEW",
    "WHEN",
    "WHENEVER",
    "WHERE",
    "WITH",
    "WITHOUT",
    "WORK",
    "WRITE",
    "YEAR",
    "ZONE",
];

/// Non-reserved words of SQL:1999, sorted.
pub static NON_RESERVED_WORDS: &[&str] = &[
    "ABS",
    "ADA",
    "ASENSITIVE",
    "ASSIGNMENT",
    "ASYMMETRIC",
    "ATOMIC",
    "AVG",
    "BETWEEN",
    "BITVAR",
    "BIT_LENGTH",
    "C",
    "CALLED",
    "CARDINALITY",
    "CATALOG_NAME",
    "CHAIN",
    "CHARACTER_LENGTH",
    "CHARACTER_SET_CATALOG",
    "CHARACTER_SET_NAME",
    "CHARACTER_SET_SCHEMA",
    "CHAR_LENGTH",
    "CHECKED",
    "CLASS_ORIGIN",
    "COALESCE",
    "COBOL",
    "COLLATION_CATALOG",
    "COLLATION_NAME",
    "COLLATION_SCHEMA",
    "COLUMN_NAME",
    "COMMAND_FUNCTION",
    "COMMAND_FUNCTION_CODE",
    "COMMITTED",
    "CONDITION_NUMBER",
    "CONNECTION_NAME",
    "CONSTRAINT_CATALOG",
    "CONSTRAINT_NAME",
    "CONSTRAINT_SCHEMA",
    "CONTAINS",
    "CONVERT",
    "COUNT",
    "CURSOR_NAME",
    "DATETIME_INTERVAL_CODE",
    "DATETIME_INTERVAL_PRECISION",
    "DEFINED",
    "DEFINER",
    "DISPATCH",
    "DYNAMIC_FUNCTION",
    "DYNAMIC_FUNCTION_CODE",
    "EXISTING",
    "EXISTS",
    "EXTRACT",
    "FINAL",
    "FORTRAN",
    "G",
    "GENERATED",
    "GRANTED",
    "HIERARCHY",
    "HOLD",
    "IMPLEMENTATION",
    "INFIX",
    "INSENSITIVE",
    "INSTANCE",
    "INSTANTIABLE",
    "INVOKER",
    "K",
    "KEY_MEMBER",
    "KEY_TYPE",
    "LENGTH",
    "LOWER",
    "M",
    "MAX",
    "MESSAGE_LENGTH",
    "MESSAGE_OCTET_LENGTH",
    "MESSAGE_TEXT",
    "METHOD",
    "MIN",
    "MOD",
    "MORE",
    "MUMPS",
    "NAME",
    "NULLABLE",
    "NULLIF",
    "NUMBER",
    "OCTET_LENGTH",
    "OPTIONS",
    "OVERLAPS",
    "OVERLAY",
    "OVERRIDING",
    "PARAMETER_MODE",
    "PARAMETER_NAME",
    "PARAMETER_ORDINAL_POSITION",
    "PARAMETER_SPECIFIC_CATALOG",
    "PARAMETER_SPECIFIC_NAME",
    "PARAMETER_SPECIFIC_SCHEMA",
    "PASCAL",
    "PLI",
    "POSITION",
    "REPEATABLE",
    "RETURNED_LENGTH",
    "RETURNED_OCTET_LENGTH",
    "RETURNED_SQLSTATE",
    "ROUTINE_CATALOG",
    "ROUTINE_NAME",
    "ROUTINE_SCHEMA",
    "ROW_COUNT",
    "SCALE",
    "SCHEMA_NAME",
    "SECURITY",
    "SELF",
    "SENSITIVE",
    "SERIALIZABLE",
    "SERVER_NAME",
    "SIMILAR",
    "SIMPLE",
    "SOURCE",
    "SPECIFIC_NAME",
    "STYLE",
    "SUBCLASS_ORIGIN",
    "SUBLIST",
    "SUBSTRING",
    "SUM",
    "SYMMETRIC",
    "SYSTEM",
    "TABLE_NAME",
    "TRANSACTIONS_COMMITTED",
    "TRANSACTIONS_ROLLED_BACK",
    "TRANSACTION_ACTIVE",
    "TRANSFORM",
    "TRANSFORMS",
    "TRANSLATE",
    "TRIGGER_CATALOG",
    "TRIGGER_NAME",
    "TRIGGER_SCHEMA",
    "TRIM",
    "TYPE",
    "UNCOMMITTED",
    "UNNAMED",
    "UPPER",
    "USER_DEFINED_TYPE_CATALOG",
    "USER_DEFINED_TYPE_NAME",
    "USER_DEFINED_TYPE_SCHEMA",
];

pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.binary_search(&word).is_ok()
}

pub fn is_keyword(word: &str) -> bool {
    is_reserved(word) || NON_RESERVED_WORDS.binary_search(&word).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn tables_are_sorted() {
        assert!(RESERVED_WORDS.windows(2).all(|w| w[0] < w[1]));
        assert!(NON_RESERVED_WORDS.windows(2).all(|w| w[0] < w[1]));
    }

    #[rstest]
    fn tables_are_disjoint() {
        assert!(!RESERVED_WORDS.iter().any(|w| {
            NON_RESERVED_WORDS.binary_search(w).is_ok()
        }));
    }

    #[rstest]
    #[case("SELECT", true, true)]
    #[case("JOIN", true, true)]
    #[case("COUNT", false, true)]
    #[case("AVG", false, true)]
    #[case("FOOBAR", false, false)]
    fn membership(#[case] word: &str, #[case] reserved: bool, #[case] keyword: bool) {
        assert_eq!(is_reserved(word), reserved);
        assert_eq!(is_keyword(word), keyword);
    }
}
