//! Filter predicate tree and its extraction from SQL text.
//!
//! SQL is parsed with [`sqlparser`]; the WHERE clause of a single SELECT is
//! lowered into a [`Predicate`]. Anything the pruner cannot reason about
//! becomes [`Predicate::Unsupported`], which never excludes a block.

use std::fmt;

use sqlparser::ast::{
    BinaryOperator, Expr, SetExpr, Statement, UnaryOperator, Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use crate::catalog::stats::ScalarValue;

#[derive(Error, Debug)]
pub enum PredicateError {
    #[error("SQL parse error: {0}")]
    Parse(#[from] sqlparser::parser::ParserError),

    #[error("Expected a single SELECT statement, found {0}")]
    NotASelect(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CmpOp {
    /// The operator with its operands swapped: `a < b` ≡ `b > a`.
    pub fn flip(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::NotEq => CmpOp::NotEq,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::LtEq => CmpOp::GtEq,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::GtEq => CmpOp::LtEq,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "=",
            CmpOp::NotEq => "<>",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
        };
        f.write_str(s)
    }
}

/// One side of a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Column(String),
    Literal(ScalarValue),
    /// Any other expression (function call, arithmetic, ...).
    Other,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    /// `column BETWEEN low AND high`, inclusive.
    Range {
        column: String,
        low: ScalarValue,
        high: ScalarValue,
    },
    /// `column IN (v1, ..., vn)`.
    InList {
        column: String,
        values: Vec<ScalarValue>,
    },
    Comparison {
        op: CmpOp,
        left: Operand,
        right: Operand,
    },
    /// A node kind the pruner does not understand.
    Unsupported,
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<ScalarValue>,
        high: impl Into<ScalarValue>,
    ) -> Self {
        Predicate::Range {
            column: column.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn in_list<V: Into<ScalarValue>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::InList {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `column <op> value`.
    pub fn cmp(column: impl Into<String>, op: CmpOp, value: impl Into<ScalarValue>) -> Self {
        Predicate::Comparison {
            op,
            left: Operand::Column(column.into()),
            right: Operand::Literal(value.into()),
        }
    }

    /// Extract the filter of a single SELECT statement.
    ///
    /// Returns `Ok(None)` when the statement has no WHERE clause.
    pub fn from_sql(sql: &str) -> Result<Option<Predicate>, PredicateError> {
        let dialect = GenericDialect {};
        let mut statements = Parser::parse_sql(&dialect, sql)?;
        if statements.len() != 1 {
            return Err(PredicateError::NotASelect(format!(
                "{} statements",
                statements.len()
            )));
        }

        let Statement::Query(query) = statements.remove(0) else {
            return Err(PredicateError::NotASelect("a non-query statement".to_string()));
        };
        let SetExpr::Select(select) = *query.body else {
            return Err(PredicateError::NotASelect("a compound query".to_string()));
        };

        Ok(select.selection.as_ref().map(lower_expr))
    }
}

fn lower_expr(expr: &Expr) -> Predicate {
    match expr {
        Expr::Nested(inner) => lower_expr(inner),
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => lower_expr(left).and(lower_expr(right)),
            BinaryOperator::Or => lower_expr(left).or(lower_expr(right)),
            _ => match cmp_op(op) {
                Some(op) => Predicate::Comparison {
                    op,
                    left: lower_operand(left),
                    right: lower_operand(right),
                },
                None => Predicate::Unsupported,
            },
        },
        Expr::Between {
            expr,
            negated: false,
            low,
            high,
        } => match (column_name(expr), literal(low), literal(high)) {
            (Some(column), Some(low), Some(high)) => Predicate::Range { column, low, high },
            _ => Predicate::Unsupported,
        },
        Expr::InList {
            expr,
            list,
            negated: false,
        } => {
            let Some(column) = column_name(expr) else {
                return Predicate::Unsupported;
            };
            // A non-literal entry could match anything.
            let values: Option<Vec<_>> = list.iter().map(literal).collect();
            match values {
                Some(values) if !values.is_empty() => Predicate::InList { column, values },
                _ => Predicate::Unsupported,
            }
        }
        _ => Predicate::Unsupported,
    }
}

fn cmp_op(op: &BinaryOperator) -> Option<CmpOp> {
    Some(match op {
        BinaryOperator::Eq => CmpOp::Eq,
        BinaryOperator::NotEq => CmpOp::NotEq,
        BinaryOperator::Lt => CmpOp::Lt,
        BinaryOperator::LtEq => CmpOp::LtEq,
        BinaryOperator::Gt => CmpOp::Gt,
        BinaryOperator::GtEq => CmpOp::GtEq,
        _ => return None,
    })
}

fn lower_operand(expr: &Expr) -> Operand {
    if let Some(column) = column_name(expr) {
        return Operand::Column(column);
    }
    match literal(expr) {
        Some(value) => Operand::Literal(value),
        None => Operand::Other,
    }
}

fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        // `t.col` refers to the column of the single scanned table.
        Expr::CompoundIdentifier(idents) => idents.last().map(|i| i.value.clone()),
        Expr::Nested(inner) => column_name(inner),
        _ => None,
    }
}

fn literal(expr: &Expr) -> Option<ScalarValue> {
    match expr {
        Expr::Value(value) => literal_value(value),
        Expr::Nested(inner) => literal(inner),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            ScalarValue::Int(v) => Some(ScalarValue::Int(v.checked_neg()?)),
            ScalarValue::Float(v) => Some(ScalarValue::Float(-v)),
            _ => None,
        },
        _ => None,
    }
}

fn literal_value(value: &Value) -> Option<ScalarValue> {
    match value {
        Value::Number(n, _) => {
            if let Ok(int) = n.parse::<i64>() {
                Some(ScalarValue::Int(int))
            } else {
                n.parse::<f64>().ok().map(ScalarValue::Float)
            }
        }
        Value::SingleQuotedString(s) => Some(ScalarValue::Utf8(s.clone())),
        Value::Boolean(b) => Some(ScalarValue::Boolean(*b)),
        _ => None,
    }
}
