//! Typed, parameterized queries against a document bucket.
//!
//! Field names come from `storage::schema` constants; every value is bound as
//! a positional parameter. `Statement` renders a query to the N1QL-style text
//! a query service would receive, which is also what gets logged.

use std::cmp::Ordering;

use serde_json::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Comparison applied to a single document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Le,
    Ge,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Le => "<=",
            Op::Ge => ">=",
        }
    }
}

/// `field <op> $n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: &'static str,
    pub op: Op,
    pub value: Value,
}

impl Predicate {
    /// Evaluate against a document. Documents missing the field never match.
    pub fn matches(&self, document: &Value) -> bool {
        let Some(actual) = document.get(self.field) else {
            return false;
        };
        match self.op {
            Op::Eq => actual == &self.value,
            Op::Le => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Op::Ge => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// Order two JSON scalars of the same kind. Mixed kinds are incomparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Start a predicate on `field`.
pub fn field(name: &'static str) -> FieldExpr {
    FieldExpr(name)
}

/// Builder half of a predicate.
#[derive(Debug, Clone, Copy)]
pub struct FieldExpr(&'static str);

impl FieldExpr {
    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        self.with(Op::Eq, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Predicate {
        self.with(Op::Le, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        self.with(Op::Ge, value)
    }

    fn with(self, op: Op, value: impl Into<Value>) -> Predicate {
        Predicate {
            field: self.0,
            op,
            value: value.into(),
        }
    }
}

/// Conjunction of predicates. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub predicates: Vec<Predicate>,
}

impl Filter {
    pub fn matches(&self, document: &Value) -> bool {
        self.predicates.iter().all(|p| p.matches(document))
    }

    fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    fn push_opt(&mut self, predicate: Option<Predicate>) {
        if let Some(p) = predicate {
            self.predicates.push(p);
        }
    }
}

/// `SELECT * FROM bucket WHERE ... ORDER BY ... LIMIT ...`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub bucket: String,
    pub filter: Filter,
    pub order_by: Option<(&'static str, Order)>,
    pub limit: Option<u32>,
}

impl SelectQuery {
    pub fn from(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            filter: Filter::default(),
            order_by: None,
            limit: None,
        }
    }

    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    /// Add the predicate only when present. Used for optional bounds.
    pub fn and_where_opt(mut self, predicate: Option<Predicate>) -> Self {
        self.filter.push_opt(predicate);
        self
    }

    pub fn order_by(mut self, field: &'static str, order: Order) -> Self {
        self.order_by = Some((field, order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_statement(&self) -> Statement {
        let mut builder = StatementBuilder::default();
        let mut text = format!("SELECT `{0}`.* FROM `{0}`", self.bucket);
        text.push_str(&builder.where_clause(&self.filter));
        if let Some((field, order)) = self.order_by {
            let dir = match order {
                Order::Asc => "ASC",
                Order::Desc => "DESC",
            };
            text.push_str(&format!(" ORDER BY {field} {dir}"));
        }
        if let Some(limit) = self.limit {
            let placeholder = builder.bind(Value::from(limit));
            text.push_str(&format!(" LIMIT {placeholder}"));
        }
        builder.finish(text)
    }
}

/// `DELETE FROM bucket WHERE ...`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub bucket: String,
    pub filter: Filter,
}

impl DeleteQuery {
    pub fn from(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            filter: Filter::default(),
        }
    }

    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    pub fn and_where_opt(mut self, predicate: Option<Predicate>) -> Self {
        self.filter.push_opt(predicate);
        self
    }

    pub fn to_statement(&self) -> Statement {
        let mut builder = StatementBuilder::default();
        let mut text = format!("DELETE FROM `{}`", self.bucket);
        text.push_str(&builder.where_clause(&self.filter));
        builder.finish(text)
    }
}

/// Rendered statement: text with `$1..$n` placeholders and their values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct StatementBuilder {
    params: Vec<Value>,
}

impl StatementBuilder {
    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn where_clause(&mut self, filter: &Filter) -> String {
        if filter.predicates.is_empty() {
            return String::new();
        }
        let terms: Vec<String> = filter
            .predicates
            .iter()
            .map(|p| {
                let placeholder = self.bind(p.value.clone());
                format!("{} {} {}", p.field, p.op.symbol(), placeholder)
            })
            .collect();
        format!(" WHERE {}", terms.join(" AND "))
    }

    fn finish(self, text: String) -> Statement {
        Statement {
            text,
            params: self.params,
        }
    }
}
