//! Store-native query expression and its composition primitives.
//!
//! A [`Query`] is a collection path plus an ordered list of clauses. It is
//! built by repeated application (`Query::collection(..).where_field(..)`),
//! mirroring how a hosted document database composes queries. Nothing here is
//! validated; a store rejects nonsensical expressions when it evaluates them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Value;

/// Comparison operator of a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==", alias = "===")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl FilterOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOp::Eq => "==",
            FilterOp::NotEq => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }
}

impl FromStr for FilterOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" | "===" => Ok(FilterOp::Eq),
            "!=" => Ok(FilterOp::NotEq),
            "<" => Ok(FilterOp::Lt),
            "<=" => Ok(FilterOp::Le),
            ">" => Ok(FilterOp::Gt),
            ">=" => Ok(FilterOp::Ge),
            other => Err(format!("unsupported filter operator: {}", other)),
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `(field, operator, value)` filter. Serializes as a three-element array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, FilterOp, Value)", into = "(String, FilterOp, Value)")]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

impl From<(String, FilterOp, Value)> for FieldFilter {
    fn from((field, op, value): (String, FilterOp, Value)) -> Self {
        Self { field, op, value }
    }
}

impl From<FieldFilter> for (String, FilterOp, Value) {
    fn from(f: FieldFilter) -> Self {
        (f.field, f.op, f.value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Single-field sort clause. Serializes as `[field, "asc"|"desc"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, Direction)", into = "(String, Direction)")]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

impl From<(String, Direction)> for OrderBy {
    fn from((field, direction): (String, Direction)) -> Self {
        Self { field, direction }
    }
}

impl From<OrderBy> for (String, Direction) {
    fn from(o: OrderBy) -> Self {
        (o.field, o.direction)
    }
}

/// Cursor-based clause restricting the result window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum PageAnchor {
    StartAfter(Value),
    EndBefore(Value),
    LimitToLast(u32),
    StartAt(Value),
    EndAt(Value),
}

impl PageAnchor {
    pub fn name(&self) -> &'static str {
        match self {
            PageAnchor::StartAfter(_) => "startAfter",
            PageAnchor::EndBefore(_) => "endBefore",
            PageAnchor::LimitToLast(_) => "limitToLast",
            PageAnchor::StartAt(_) => "startAt",
            PageAnchor::EndAt(_) => "endAt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "camelCase")]
pub enum QueryClause {
    Where(FieldFilter),
    OrderBy(OrderBy),
    Limit(u32),
    Anchor(PageAnchor),
}

/// Composed query over one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    path: String,
    clauses: Vec<QueryClause>,
}

impl Query {
    /// Base query: every document of the collection at `path`.
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            clauses: Vec::new(),
        }
    }

    pub fn with(mut self, clause: QueryClause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn filter(self, filter: FieldFilter) -> Self {
        self.with(QueryClause::Where(filter))
    }

    pub fn where_field(self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filter(FieldFilter::new(field, op, value))
    }

    pub fn order_by(self, field: impl Into<String>, direction: Direction) -> Self {
        self.with(QueryClause::OrderBy(OrderBy::new(field, direction)))
    }

    pub fn limit(self, n: u32) -> Self {
        self.with(QueryClause::Limit(n))
    }

    pub fn anchor(self, anchor: PageAnchor) -> Self {
        self.with(QueryClause::Anchor(anchor))
    }

    pub fn start_after(self, value: impl Into<Value>) -> Self {
        self.anchor(PageAnchor::StartAfter(value.into()))
    }

    pub fn end_before(self, value: impl Into<Value>) -> Self {
        self.anchor(PageAnchor::EndBefore(value.into()))
    }

    pub fn limit_to_last(self, n: u32) -> Self {
        self.anchor(PageAnchor::LimitToLast(n))
    }

    pub fn start_at(self, value: impl Into<Value>) -> Self {
        self.anchor(PageAnchor::StartAt(value.into()))
    }

    pub fn end_at(self, value: impl Into<Value>) -> Self {
        self.anchor(PageAnchor::EndAt(value.into()))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn clauses(&self) -> &[QueryClause] {
        &self.clauses
    }

    pub fn filters(&self) -> impl Iterator<Item = &FieldFilter> {
        self.clauses.iter().filter_map(|c| match c {
            QueryClause::Where(f) => Some(f),
            _ => None,
        })
    }

    /// The effective sort clause (the last one applied).
    pub fn ordering(&self) -> Option<&OrderBy> {
        self.clauses.iter().rev().find_map(|c| match c {
            QueryClause::OrderBy(o) => Some(o),
            _ => None,
        })
    }

    pub fn anchors(&self) -> impl Iterator<Item = &PageAnchor> {
        self.clauses.iter().filter_map(|c| match c {
            QueryClause::Anchor(a) => Some(a),
            _ => None,
        })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        for clause in &self.clauses {
            match clause {
                QueryClause::Where(w) => {
                    write!(f, " where {} {} {}", w.field, w.op, w.value.to_json_string())?
                }
                QueryClause::OrderBy(o) => {
                    let dir = match o.direction {
                        Direction::Asc => "asc",
                        Direction::Desc => "desc",
                    };
                    write!(f, " order by {} {}", o.field, dir)?
                }
                QueryClause::Limit(n) => write!(f, " limit {}", n)?,
                QueryClause::Anchor(a) => match a {
                    PageAnchor::LimitToLast(n) => write!(f, " limitToLast {}", n)?,
                    PageAnchor::StartAfter(v)
                    | PageAnchor::EndBefore(v)
                    | PageAnchor::StartAt(v)
                    | PageAnchor::EndAt(v) => write!(f, " {} {}", a.name(), v.to_json_string())?,
                },
            }
        }
        Ok(())
    }
}
