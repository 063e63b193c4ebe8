//! Expression algebra: arithmetic, boolean and comparison trees with
//! convolution (constant folding under three-valued logic), truth-table
//! evaluation and PDNF construction.

use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::naming::NamingChain;
use crate::schema::{ColumnId, Value};
use crate::symbols::Symbol;

/// SQL three-valued truth.
///
/// The variant order (`False < Null < True`) is the enumeration order used
/// when building a PDNF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Truth {
    False,
    Null,
    True,
}

impl Truth {
    pub const ALL: [Truth; 3] = [Truth::False, Truth::Null, Truth::True];

    pub fn from_bool(b: bool) -> Truth {
        if b { Truth::True } else { Truth::False }
    }

    pub fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Null,
        }
    }

    pub fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Null,
        }
    }

    pub fn negate(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Null => Truth::Null,
        }
    }
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Truth::False => "FALSE",
            Truth::Null => "NULL",
            Truth::True => "TRUE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn from_symbol(sym: Symbol) -> Option<CmpOp> {
        match sym {
            Symbol::Equals => Some(CmpOp::Eq),
            Symbol::NotEquals => Some(CmpOp::Ne),
            Symbol::LessThan => Some(CmpOp::Lt),
            Symbol::LessThanOrEquals => Some(CmpOp::Le),
            Symbol::GreaterThan => Some(CmpOp::Gt),
            Symbol::GreaterThanOrEquals => Some(CmpOp::Ge),
            _ => None,
        }
    }

    /// `NOT (a op b)` is `a negated(op) b`.
    pub fn negated(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Le => CmpOp::Gt,
        }
    }

    /// `a op b` is `b reversed(op) a`.
    pub fn reversed(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Le,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    pub fn evaluate(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Eq => ord == Equal,
            CmpOp::Ne => ord != Equal,
            CmpOp::Lt => ord == Less,
            CmpOp::Le => ord != Greater,
            CmpOp::Gt => ord == Greater,
            CmpOp::Ge => ord != Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn text(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn text(self) -> &'static str {
        match self {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
        }
    }
}

/// A column reference: a raw dotted name until the binder resolves it into a
/// handle pointing at a physical column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRef {
    Unresolved(NamingChain),
    Bound(ColumnId),
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Bool(bool),
    Null,
    Column(ColumnRef),
    /// Unary minus. Unary plus disappears at parse time.
    Neg(Box<Expr>),
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Logic {
        op: LogicOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `expr IS TRUE | FALSE | NULL`; `IS NOT` wraps this in [`Expr::Not`].
    Is { expr: Box<Expr>, truth: Truth },
    Cmp {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn column(chain: NamingChain) -> Expr {
        Expr::Column(ColumnRef::Unresolved(chain))
    }

    fn numeric_literal(&self) -> Option<f64> {
        match self {
            Expr::Int(v) => Some(*v as f64),
            Expr::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Expr::Int(0)) || matches!(self, Expr::Float(v) if *v == 0.0)
    }

    fn is_one(&self) -> bool {
        matches!(self, Expr::Int(1)) || matches!(self, Expr::Float(v) if *v == 1.0)
    }

    /// Coercion used on arithmetic operands: booleans become integers.
    pub fn to_int(self) -> Expr {
        match self {
            Expr::Bool(b) => Expr::Int(b as i64),
            other => other,
        }
    }

    /// Coercion used on boolean operands: numerics become their truth value.
    pub fn to_bool(self) -> Expr {
        match self {
            Expr::Int(v) => Expr::Bool(v != 0),
            Expr::Float(v) => Expr::Bool(v != 0.0),
            other => other,
        }
    }

    /// Partial evaluation under three-valued logic.
    ///
    /// Idempotent: `e.convolve().convolve() == e.convolve()`, and for every
    /// truth vector the convolved expression evaluates the same as the
    /// original.
    pub fn convolve(self) -> Expr {
        match self {
            Expr::Neg(inner) => match inner.convolve() {
                Expr::Int(v) => Expr::Int(-v),
                Expr::Float(v) => Expr::Float(-v),
                Expr::Null => Expr::Null,
                Expr::Neg(twice) => *twice,
                other => Expr::Neg(Box::new(other)),
            },

            Expr::Arith { op, left, right } => {
                let left = left.convolve().to_int();
                let right = right.convolve().to_int();
                Self::convolve_arith(op, left, right)
            }

            Expr::Not(inner) => match inner.convolve().to_bool() {
                Expr::Bool(b) => Expr::Bool(!b),
                Expr::Null => Expr::Null,
                Expr::Cmp { op, left, right } => Expr::Cmp {
                    op: op.negated(),
                    left,
                    right,
                },
                other => Expr::Not(Box::new(other)),
            },

            Expr::Logic { op, left, right } => {
                let left = left.convolve().to_bool();
                let right = right.convolve().to_bool();
                match op {
                    LogicOp::Or => {
                        if left == Expr::Bool(true) || right == Expr::Bool(true) {
                            Expr::Bool(true)
                        } else if left == Expr::Bool(false) && right == Expr::Bool(false) {
                            Expr::Bool(false)
                        } else if left == Expr::Null || right == Expr::Null {
                            Expr::Null
                        } else {
                            Expr::Logic {
                                op,
                                left: Box::new(left),
                                right: Box::new(right),
                            }
                        }
                    }
                    LogicOp::And => {
                        if left == Expr::Bool(false) || right == Expr::Bool(false) {
                            Expr::Bool(false)
                        } else if left == Expr::Bool(true) && right == Expr::Bool(true) {
                            Expr::Bool(true)
                        } else if left == Expr::Null || right == Expr::Null {
                            Expr::Null
                        } else {
                            Expr::Logic {
                                op,
                                left: Box::new(left),
                                right: Box::new(right),
                            }
                        }
                    }
                }
            }

            Expr::Is { expr, truth } => match expr.convolve().to_bool() {
                Expr::Bool(b) => Expr::Bool(Truth::from_bool(b) == truth),
                Expr::Null => Expr::Bool(truth == Truth::Null),
                other => Expr::Is {
                    expr: Box::new(other),
                    truth,
                },
            },

            Expr::Cmp { op, left, right } => {
                let left = left.convolve();
                let right = right.convolve();
                if left == Expr::Null || right == Expr::Null {
                    return Expr::Null;
                }
                match (left.numeric_literal(), right.numeric_literal()) {
                    (Some(l), Some(r)) => Expr::Bool(
                        l.partial_cmp(&r).is_some_and(|ord| op.evaluate(ord)),
                    ),
                    _ => Expr::Cmp {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                }
            }

            leaf => leaf,
        }
    }

    fn convolve_arith(op: ArithOp, left: Expr, right: Expr) -> Expr {
        let both_int = matches!(left, Expr::Int(_)) && matches!(right, Expr::Int(_));
        if let (Some(l), Some(r)) = (left.numeric_literal(), right.numeric_literal()) {
            return match op {
                ArithOp::Add => Self::fold_numeric(l + r, both_int),
                ArithOp::Sub => Self::fold_numeric(l - r, both_int),
                ArithOp::Mul => Self::fold_numeric(l * r, both_int),
                ArithOp::Div => {
                    if r == 0.0 {
                        Expr::Null
                    } else {
                        let v = l / r;
                        Self::fold_numeric(v, both_int && v.fract() == 0.0)
                    }
                }
            };
        }
        if left == Expr::Null || right == Expr::Null {
            return Expr::Null;
        }
        match op {
            ArithOp::Add => {
                if left.is_zero() {
                    return right;
                }
                if right.is_zero() {
                    return left;
                }
            }
            ArithOp::Sub => {
                if left.is_zero() {
                    return Expr::Neg(Box::new(right)).convolve();
                }
                if right.is_zero() {
                    return left;
                }
            }
            ArithOp::Mul => {
                if left.is_zero() || right.is_zero() {
                    return Expr::Int(0);
                }
            }
            ArithOp::Div => {
                if right.is_zero() {
                    return Expr::Null;
                }
                if left.is_zero() {
                    return Expr::Int(0);
                }
                if right.is_one() {
                    return left;
                }
            }
        }
        Expr::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn fold_numeric(value: f64, as_int: bool) -> Expr {
        if as_int {
            Expr::Int(value as i64)
        } else {
            Expr::Float(value)
        }
    }

    /// Collects base sub-expressions: nodes below which truth values are
    /// opaque to the analyzer. Predicates, `IS` tests, numeric expressions
    /// and column references are bases; boolean structure (AND / OR / NOT)
    /// and boolean literals are not.
    fn collect_base_occurrences<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        match self {
            Expr::Logic { left, right, .. } => {
                left.collect_base_occurrences(out);
                right.collect_base_occurrences(out);
            }
            Expr::Not(inner) => inner.collect_base_occurrences(out),
            Expr::Bool(_) | Expr::Null => {}
            base => out.push(base),
        }
    }

    /// Evaluates the boolean structure, substituting each base leaf with a
    /// value popped from the right end of `stack`.
    pub fn calculate(&self, stack: &mut Vec<Truth>) -> Truth {
        match self {
            Expr::Logic { op, left, right } => {
                let l = left.calculate(stack);
                let r = right.calculate(stack);
                match op {
                    LogicOp::And => l.and(r),
                    LogicOp::Or => l.or(r),
                }
            }
            Expr::Not(inner) => inner.calculate(stack).negate(),
            Expr::Bool(b) => Truth::from_bool(*b),
            Expr::Null => Truth::Null,
            _ => stack.pop().unwrap_or(Truth::Null),
        }
    }

    /// Numeric/row evaluation; `col` supplies bound column cells.
    pub fn eval_value(&self, col: &dyn Fn(ColumnId) -> Value) -> Value {
        match self {
            Expr::Int(v) => Value::Int(*v),
            Expr::Float(v) => Value::Float(*v),
            Expr::Str(v) => Value::Text(v.clone()),
            Expr::Date(v) => Value::Date(*v),
            Expr::Datetime(v) => Value::Datetime(*v),
            Expr::Bool(v) => Value::Bool(*v),
            Expr::Null => Value::Null,
            Expr::Column(ColumnRef::Bound(id)) => col(*id),
            Expr::Column(ColumnRef::Unresolved(_)) => Value::Null,
            Expr::Neg(inner) => match inner.eval_value(col) {
                Value::Int(v) => Value::Int(-v),
                Value::Float(v) => Value::Float(-v),
                _ => Value::Null,
            },
            Expr::Arith { op, left, right } => {
                let l = left.eval_value(col).to_numeric();
                let r = right.eval_value(col).to_numeric();
                Value::arith(*op, l, r)
            }
            // boolean structure evaluated as a value
            other => match other.truth_on(col) {
                Truth::Null => Value::Null,
                t => Value::Bool(t == Truth::True),
            },
        }
    }

    /// Truth of this expression against actual row cells.
    pub fn truth_on(&self, col: &dyn Fn(ColumnId) -> Value) -> Truth {
        match self {
            Expr::Logic { op, left, right } => {
                let l = left.truth_on(col);
                let r = right.truth_on(col);
                match op {
                    LogicOp::And => l.and(r),
                    LogicOp::Or => l.or(r),
                }
            }
            Expr::Not(inner) => inner.truth_on(col).negate(),
            Expr::Bool(b) => Truth::from_bool(*b),
            Expr::Null => Truth::Null,
            Expr::Is { expr, truth } => {
                let inner = expr.truth_on(col);
                Truth::from_bool(inner == *truth)
            }
            Expr::Cmp { op, left, right } => {
                let l = left.eval_value(col);
                let r = right.eval_value(col);
                match l.compare(&r) {
                    Some(ord) => Truth::from_bool(op.evaluate(ord)),
                    None => Truth::Null,
                }
            }
            value_like => value_like.eval_value(col).truth(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(v) => write!(f, "{v}"),
            Expr::Float(v) => write!(f, "{v}"),
            Expr::Str(v) => write!(f, "'{v}'"),
            Expr::Date(v) => write!(f, "'{v}'"),
            Expr::Datetime(v) => write!(f, "'{v}'"),
            Expr::Bool(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            Expr::Null => write!(f, "NULL"),
            Expr::Column(ColumnRef::Unresolved(chain)) => write!(f, "{chain}"),
            Expr::Column(ColumnRef::Bound(id)) => write!(f, "#{}.{}", id.table, id.column),
            Expr::Neg(inner) => write!(f, "-{inner}"),
            Expr::Arith { op, left, right } => {
                write!(f, "({left} {} {right})", op.text())
            }
            Expr::Not(inner) => write!(f, "NOT {inner}"),
            Expr::Logic { op, left, right } => {
                write!(f, "({left} {} {right})", op.text())
            }
            Expr::Is { expr, truth } => write!(f, "({expr} IS {truth})"),
            Expr::Cmp { op, left, right } => {
                write!(f, "({left} {} {right})", op.text())
            }
        }
    }
}

/// Perfect disjunctive normal form of a boolean expression: the explicit set
/// of truth assignments to its distinct bases under which it is TRUE.
#[derive(Debug, Clone)]
pub struct Pdnf {
    expr: Expr,
    bases: Vec<Expr>,
    /// leaf occurrence index → distinct-base index
    occurrences: Vec<usize>,
    accepted: HashSet<Vec<Truth>>,
}

impl Pdnf {
    pub fn new(expr: Expr) -> Pdnf {
        let mut leaves = Vec::new();
        expr.collect_base_occurrences(&mut leaves);

        let mut bases: Vec<Expr> = Vec::new();
        let mut occurrences = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            match bases.iter().position(|b| b == leaf) {
                Some(i) => occurrences.push(i),
                None => {
                    occurrences.push(bases.len());
                    bases.push(leaf.clone());
                }
            }
        }

        let mut accepted = HashSet::new();
        let n = bases.len();
        let mut assignment = vec![0usize; n];
        loop {
            let vector: Vec<Truth> = assignment.iter().map(|&i| Truth::ALL[i]).collect();
            let mut stack: Vec<Truth> =
                occurrences.iter().rev().map(|&i| vector[i]).collect();
            if expr.calculate(&mut stack) == Truth::True {
                accepted.insert(vector);
            }
            // odometer over {F, N, T}^n
            let mut pos = n;
            loop {
                if pos == 0 {
                    break;
                }
                pos -= 1;
                if assignment[pos] < 2 {
                    assignment[pos] += 1;
                    break;
                }
                assignment[pos] = 0;
            }
            if assignment.iter().all(|&i| i == 0) {
                break;
            }
        }

        Pdnf {
            expr,
            bases,
            occurrences,
            accepted,
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn bases(&self) -> &[Expr] {
        &self.bases
    }

    pub fn accepted(&self) -> &HashSet<Vec<Truth>> {
        &self.accepted
    }

    /// Whether an assignment over the distinct bases satisfies the
    /// expression.
    pub fn accepts(&self, assignment: &[Truth]) -> bool {
        self.accepted.contains(assignment)
    }

    /// Evaluates every base against a row and tests membership.
    pub fn accepts_row(&self, col: &dyn Fn(ColumnId) -> Value) -> bool {
        let vector: Vec<Truth> = self.bases.iter().map(|b| b.truth_on(col)).collect();
        self.accepted.contains(&vector)
    }

    /// Re-evaluates the raw expression with each occurrence drawing its
    /// base's assigned value; used to cross-check enumeration.
    pub fn calculate(&self, assignment: &[Truth]) -> Truth {
        let mut stack: Vec<Truth> = self
            .occurrences
            .iter()
            .rev()
            .map(|&i| assignment[i])
            .collect();
        self.expr.calculate(&mut stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn col(name: &str) -> Expr {
        Expr::column(NamingChain::from_parts(vec![
            "t".to_string(),
            name.to_string(),
        ]))
    }

    fn add(l: Expr, r: Expr) -> Expr {
        Expr::Arith {
            op: ArithOp::Add,
            left: Box::new(l),
            right: Box::new(r),
        }
    }

    fn mul(l: Expr, r: Expr) -> Expr {
        Expr::Arith {
            op: ArithOp::Mul,
            left: Box::new(l),
            right: Box::new(r),
        }
    }

    fn div(l: Expr, r: Expr) -> Expr {
        Expr::Arith {
            op: ArithOp::Div,
            left: Box::new(l),
            right: Box::new(r),
        }
    }

    fn cmp(op: CmpOp, l: Expr, r: Expr) -> Expr {
        Expr::Cmp {
            op,
            left: Box::new(l),
            right: Box::new(r),
        }
    }

    #[rstest]
    fn operator_negation_and_reversal_maps() {
        assert_eq!(CmpOp::Eq.negated(), CmpOp::Ne);
        assert_eq!(CmpOp::Lt.negated(), CmpOp::Ge);
        assert_eq!(CmpOp::Gt.negated(), CmpOp::Le);
        // swapping operands mirrors the ordering, equality is symmetric
        assert_eq!(CmpOp::Lt.reversed(), CmpOp::Gt);
        assert_eq!(CmpOp::Le.reversed(), CmpOp::Ge);
        assert_eq!(CmpOp::Eq.reversed(), CmpOp::Eq);
        assert_eq!(CmpOp::Ne.reversed(), CmpOp::Ne);
    }

    #[rstest]
    fn folds_constant_arithmetic() {
        // 1 + 2 * 3 => 7
        let e = add(Expr::Int(1), mul(Expr::Int(2), Expr::Int(3)));
        assert_eq!(e.convolve(), Expr::Int(7));
    }

    #[rstest]
    fn drops_zero_terms() {
        // a + 0 * b => a
        let e = add(col("a"), mul(Expr::Int(0), col("b")));
        assert_eq!(e.convolve(), col("a"));
    }

    #[rstest]
    fn division_by_zero_is_null() {
        assert_eq!(div(Expr::Int(5), Expr::Int(0)).convolve(), Expr::Null);
        assert_eq!(div(col("a"), Expr::Int(0)).convolve(), Expr::Null);
    }

    #[rstest]
    fn division_identities() {
        assert_eq!(div(col("a"), Expr::Int(1)).convolve(), col("a"));
        assert_eq!(div(Expr::Int(0), col("a")).convolve(), Expr::Int(0));
        assert_eq!(div(Expr::Int(7), Expr::Int(2)).convolve(), Expr::Float(3.5));
        assert_eq!(div(Expr::Int(8), Expr::Int(2)).convolve(), Expr::Int(4));
    }

    #[rstest]
    fn zero_minus_x_negates() {
        let e = Expr::Arith {
            op: ArithOp::Sub,
            left: Box::new(Expr::Int(0)),
            right: Box::new(col("a")),
        };
        assert_eq!(e.convolve(), Expr::Neg(Box::new(col("a"))));
    }

    #[rstest]
    fn not_flips_comparison() {
        let e = Expr::Not(Box::new(cmp(CmpOp::Eq, col("a"), col("b"))));
        assert_eq!(e.convolve(), cmp(CmpOp::Ne, col("a"), col("b")));

        let e = Expr::Not(Box::new(cmp(CmpOp::Lt, col("a"), col("b"))));
        assert_eq!(e.convolve(), cmp(CmpOp::Ge, col("a"), col("b")));
    }

    #[rstest]
    fn null_propagates_through_arithmetic() {
        let e = add(col("a"), Expr::Null);
        assert_eq!(e.convolve(), Expr::Null);
        let e = cmp(CmpOp::Eq, Expr::Null, Expr::Int(1));
        assert_eq!(e.convolve(), Expr::Null);
    }

    #[rstest]
    fn double_negation_cancels() {
        let e = Expr::Neg(Box::new(Expr::Neg(Box::new(col("a")))));
        assert_eq!(e.convolve(), col("a"));
        assert_eq!(
            Expr::Neg(Box::new(Expr::Int(3))).convolve(),
            Expr::Int(-3)
        );
    }

    #[rstest]
    fn is_folds_literals() {
        let e = Expr::Is {
            expr: Box::new(Expr::Null),
            truth: Truth::Null,
        };
        assert_eq!(e.convolve(), Expr::Bool(true));

        let e = Expr::Is {
            expr: Box::new(Expr::Bool(true)),
            truth: Truth::False,
        };
        assert_eq!(e.convolve(), Expr::Bool(false));

        let e = Expr::Not(Box::new(Expr::Is {
            expr: Box::new(Expr::Null),
            truth: Truth::True,
        }));
        assert_eq!(e.convolve(), Expr::Bool(true));
    }

    #[rstest]
    fn logic_short_circuits() {
        let or_true = Expr::Logic {
            op: LogicOp::Or,
            left: Box::new(col("a")),
            right: Box::new(Expr::Bool(true)),
        };
        assert_eq!(or_true.convolve(), Expr::Bool(true));

        let and_false = Expr::Logic {
            op: LogicOp::And,
            left: Box::new(Expr::Bool(false)),
            right: Box::new(cmp(CmpOp::Eq, col("a"), col("b"))),
        };
        assert_eq!(and_false.convolve(), Expr::Bool(false));
    }

    #[rstest]
    fn convolution_is_idempotent() {
        let samples = vec![
            add(col("a"), mul(Expr::Int(0), col("b"))),
            Expr::Not(Box::new(cmp(CmpOp::Eq, col("a"), Expr::Int(1)))),
            Expr::Logic {
                op: LogicOp::And,
                left: Box::new(cmp(CmpOp::Gt, col("a"), Expr::Int(0))),
                right: Box::new(Expr::Is {
                    expr: Box::new(col("b")),
                    truth: Truth::Null,
                }),
            },
            div(Expr::Int(5), Expr::Int(0)),
        ];
        for e in samples {
            let once = e.convolve();
            assert_eq!(once.clone().convolve(), once);
        }
    }

    #[rstest]
    fn pdnf_of_conjunction() {
        // a = 1 AND b IS NULL  over bases {a = 1, b IS NULL}
        let e = Expr::Logic {
            op: LogicOp::And,
            left: Box::new(cmp(CmpOp::Eq, col("a"), Expr::Int(1))),
            right: Box::new(Expr::Is {
                expr: Box::new(col("b")),
                truth: Truth::Null,
            }),
        };
        let pdnf = Pdnf::new(e);
        assert_eq!(pdnf.bases().len(), 2);
        assert_eq!(pdnf.accepted().len(), 1);
        assert!(pdnf.accepts(&[Truth::True, Truth::True]));
        assert!(!pdnf.accepts(&[Truth::True, Truth::Null]));
    }

    #[rstest]
    fn pdnf_of_disjunction_covers_asymmetric_assignments() {
        let e = Expr::Logic {
            op: LogicOp::Or,
            left: Box::new(col("a")),
            right: Box::new(col("b")),
        };
        let pdnf = Pdnf::new(e);
        assert!(pdnf.accepts(&[Truth::True, Truth::False]));
        assert!(pdnf.accepts(&[Truth::False, Truth::True]));
        assert!(pdnf.accepts(&[Truth::True, Truth::Null]));
        assert!(!pdnf.accepts(&[Truth::False, Truth::Null]));
        assert_eq!(pdnf.accepted().len(), 5);
    }

    #[rstest]
    fn pdnf_complete_against_calculate() {
        let e = Expr::Logic {
            op: LogicOp::Or,
            left: Box::new(Expr::Not(Box::new(col("a")))),
            right: Box::new(Expr::Logic {
                op: LogicOp::And,
                left: Box::new(col("b")),
                right: Box::new(col("c")),
            }),
        };
        let pdnf = Pdnf::new(e);
        for fa in Truth::ALL {
            for fb in Truth::ALL {
                for fc in Truth::ALL {
                    let v = vec![fa, fb, fc];
                    assert_eq!(
                        pdnf.accepts(&v),
                        pdnf.calculate(&v) == Truth::True,
                        "vector {v:?}"
                    );
                }
            }
        }
    }

    #[rstest]
    fn pdnf_deduplicates_repeated_bases() {
        // a OR a: one distinct base
        let e = Expr::Logic {
            op: LogicOp::Or,
            left: Box::new(col("a")),
            right: Box::new(col("a")),
        };
        let pdnf = Pdnf::new(e);
        assert_eq!(pdnf.bases().len(), 1);
        assert!(pdnf.accepts(&[Truth::True]));
        assert!(!pdnf.accepts(&[Truth::False]));
        assert!(!pdnf.accepts(&[Truth::Null]));
    }

    #[rstest]
    fn convolution_preserves_truth_tables() {
        // NOT (a AND b) before and after convolution
        let raw = Expr::Not(Box::new(Expr::Logic {
            op: LogicOp::And,
            left: Box::new(col("a")),
            right: Box::new(col("b")),
        }));
        let convolved = raw.clone().convolve();
        let p1 = Pdnf::new(raw);
        let p2 = Pdnf::new(convolved);
        for fa in Truth::ALL {
            for fb in Truth::ALL {
                let v = vec![fa, fb];
                assert_eq!(p1.calculate(&v), p2.calculate(&v));
            }
        }
    }
}
