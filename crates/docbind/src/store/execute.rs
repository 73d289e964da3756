//! Evaluation of a composed [`Query`] against in-memory documents.
//!
//! Semantics follow a hosted document database:
//! - filters are conjunctive; a document missing the filtered field never matches
//!   (`!=` additionally excludes null)
//! - with a sort clause, documents missing the sort field are excluded and ties
//!   break by id; without one, documents are ordered by id
//! - cursors are positioned on the sort field (or the id when unsorted)
//! - cursors narrow the window first; `limit` and `limitToLast` then apply in
//!   clause order

use std::cmp::Ordering;
use std::collections::BTreeMap;

use docbind_api::{
    Direction, Document, DocumentRef, FieldFilter, FilterOp, PageAnchor, Query, QueryClause,
    Record, StoreError, Value,
};

pub fn execute_query(
    documents: Option<&BTreeMap<String, Record>>,
    query: &Query,
) -> Result<Vec<Document>, StoreError> {
    let ordering = query.ordering();
    if ordering.is_none()
        && query
            .anchors()
            .any(|a| matches!(a, PageAnchor::LimitToLast(_)))
    {
        return Err(StoreError::InvalidQuery {
            message: "limitToLast() queries require specifying at least one orderBy() clause"
                .to_string(),
        });
    }

    let filters: Vec<&FieldFilter> = query.filters().collect();
    let mut matched: Vec<Document> = documents
        .into_iter()
        .flatten()
        .filter(|(_, data)| filters.iter().all(|f| matches_filter(data, f)))
        .map(|(id, data)| Document::new(DocumentRef::new(query.path(), id), data.clone()))
        .collect();

    let direction = ordering.map(|o| o.direction).unwrap_or_default();
    if let Some(order) = ordering {
        matched.retain(|doc| lookup(&doc.data, &order.field).is_some());
        matched.sort_by(|a, b| {
            let by_field = match (lookup(&a.data, &order.field), lookup(&b.data, &order.field)) {
                (Some(x), Some(y)) => total_cmp(x, y),
                _ => Ordering::Equal,
            };
            directed(by_field.then_with(|| a.id().cmp(b.id())), direction)
        });
    }

    let sort_key = |doc: &Document| -> Value {
        match ordering {
            Some(order) => lookup(&doc.data, &order.field)
                .cloned()
                .unwrap_or(Value::Null),
            None => Value::String(doc.id().to_string()),
        }
    };

    let cursors: Vec<&PageAnchor> = query
        .anchors()
        .filter(|a| !matches!(a, PageAnchor::LimitToLast(_)))
        .collect();
    matched.retain(|doc| {
        let key = sort_key(doc);
        cursors.iter().all(|c| cursor_admits(c, &key, direction))
    });

    for clause in query.clauses() {
        match clause {
            QueryClause::Limit(n) => matched.truncate(*n as usize),
            QueryClause::Anchor(PageAnchor::LimitToLast(n)) => {
                let n = *n as usize;
                if matched.len() > n {
                    matched.drain(..matched.len() - n);
                }
            }
            _ => {}
        }
    }

    Ok(matched)
}

/// Resolve a possibly dotted field path (`requester.name`) inside a record.
pub fn lookup<'a>(data: &'a Record, field: &str) -> Option<&'a Value> {
    let mut segments = field.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

pub fn matches_filter(data: &Record, filter: &FieldFilter) -> bool {
    let Some(value) = lookup(data, &filter.field) else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => value.matches(&filter.value),
        FilterOp::NotEq => !value.is_null() && !value.matches(&filter.value),
        FilterOp::Lt => value.compare(&filter.value) == Some(Ordering::Less),
        FilterOp::Le => matches!(
            value.compare(&filter.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOp::Gt => value.compare(&filter.value) == Some(Ordering::Greater),
        FilterOp::Ge => matches!(
            value.compare(&filter.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

fn cursor_admits(anchor: &PageAnchor, key: &Value, direction: Direction) -> bool {
    let position = |cursor: &Value| directed(total_cmp(key, cursor), direction);
    match anchor {
        PageAnchor::StartAt(c) => position(c) != Ordering::Less,
        PageAnchor::StartAfter(c) => position(c) == Ordering::Greater,
        PageAnchor::EndAt(c) => position(c) != Ordering::Greater,
        PageAnchor::EndBefore(c) => position(c) == Ordering::Less,
        PageAnchor::LimitToLast(_) => true,
    }
}

fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

/// Total order over values: same-kind values by their natural order, mixed
/// kinds by kind rank (null < bool < number < datetime < string < reference <
/// array < object). NaN sorts above every other number.
fn total_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (x, y) if x.is_number() && y.is_number() => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
        _ => a
            .compare(b)
            .unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b))),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Integer(_) | Value::Float(_) => 2,
        Value::DateTime(_) => 3,
        Value::String(_) => 4,
        Value::Reference(_) => 5,
        Value::Array(_) => 6,
        Value::Object(_) => 7,
    }
}
