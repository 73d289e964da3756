use docbind_api::{
    Direction, DocumentRef, FieldFilter, FilterOp, OrderBy, PageAnchor, Query, Value,
};
use serde::{Deserialize, Serialize};

/// Declarative description of a collection query.
///
/// Field names on the wire follow the options object consumers already write:
///
/// ```json
/// {"where": [["category", "==", "Cleaning"]], "orderBy": ["budget", "desc"], "limit": 10}
/// ```
///
/// Each pagination anchor kind has one slot; setting it again replaces the
/// previous value. Combinations are not validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionOptions {
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FieldFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_after: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_before: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_to_last: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<Value>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_field(self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filter(FieldFilter::new(field, op, value))
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy::new(field, direction));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn page(mut self, anchor: PageAnchor) -> Self {
        match anchor {
            PageAnchor::StartAfter(v) => self.start_after = Some(v),
            PageAnchor::EndBefore(v) => self.end_before = Some(v),
            PageAnchor::LimitToLast(n) => self.limit_to_last = Some(n),
            PageAnchor::StartAt(v) => self.start_at = Some(v),
            PageAnchor::EndAt(v) => self.end_at = Some(v),
        }
        self
    }

    pub fn start_after(self, value: impl Into<Value>) -> Self {
        self.page(PageAnchor::StartAfter(value.into()))
    }

    pub fn end_before(self, value: impl Into<Value>) -> Self {
        self.page(PageAnchor::EndBefore(value.into()))
    }

    pub fn limit_to_last(self, n: u32) -> Self {
        self.page(PageAnchor::LimitToLast(n))
    }

    pub fn start_at(self, value: impl Into<Value>) -> Self {
        self.page(PageAnchor::StartAt(value.into()))
    }

    pub fn end_at(self, value: impl Into<Value>) -> Self {
        self.page(PageAnchor::EndAt(value.into()))
    }

    /// Anchors that take part in the query, in application order.
    fn anchors(&self) -> Vec<PageAnchor> {
        let present = |v: &Option<Value>| v.as_ref().filter(|v| !v.is_null()).cloned();
        let mut anchors = Vec::new();
        if let Some(v) = present(&self.start_after) {
            anchors.push(PageAnchor::StartAfter(v));
        }
        if let Some(v) = present(&self.end_before) {
            anchors.push(PageAnchor::EndBefore(v));
        }
        if let Some(n) = self.limit_to_last.filter(|n| *n > 0) {
            anchors.push(PageAnchor::LimitToLast(n));
        }
        if let Some(v) = present(&self.start_at) {
            anchors.push(PageAnchor::StartAt(v));
        }
        if let Some(v) = present(&self.end_at) {
            anchors.push(PageAnchor::EndAt(v));
        }
        anchors
    }
}

/// Compose the store query for `path` from `options`.
///
/// Clauses are applied as: every filter in the given order, the sort clause,
/// the limit, then the anchors (startAfter, endBefore, limitToLast, startAt,
/// endAt). A zero `limit`/`limitToLast` and a null anchor value count as absent.
pub fn build_query(path: &str, options: &CollectionOptions) -> Query {
    let mut query = Query::collection(path);

    for filter in &options.filters {
        query = query.filter(filter.clone());
    }

    if let Some(order) = &options.order_by {
        query = query.order_by(order.field.clone(), order.direction);
    }

    if let Some(n) = options.limit.filter(|n| *n > 0) {
        query = query.limit(n);
    }

    for anchor in options.anchors() {
        query = query.anchor(anchor);
    }

    query
}

/// Subscription identity of a collection binding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionQuery {
    pub path: String,
    #[serde(default)]
    pub options: CollectionOptions,
}

impl CollectionQuery {
    pub fn new(path: impl Into<String>, options: Option<CollectionOptions>) -> Self {
        Self {
            path: path.into(),
            options: options.unwrap_or_default(),
        }
    }

    pub fn query(&self) -> Query {
        build_query(&self.path, &self.options)
    }
}

/// Subscription identity of a single-document binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentQuery {
    pub path: String,
    pub id: String,
}

impl DocumentQuery {
    pub fn new(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
        }
    }

    /// The watched document, or `None` when the id is empty.
    pub fn reference(&self) -> Option<DocumentRef> {
        if self.id.is_empty() {
            None
        } else {
            Some(DocumentRef::new(&self.path, &self.id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbind_api::QueryClause;

    #[test]
    fn test_clauses_follow_application_order() {
        let options = CollectionOptions::new()
            .end_at(500)
            .limit(10)
            .order_by("budget", Direction::Desc)
            .start_after(100)
            .where_field("category", FilterOp::Eq, "Cleaning")
            .where_field("budget", FilterOp::Ge, 50);

        let query = build_query("tasks", &options);
        let kinds: Vec<&str> = query
            .clauses()
            .iter()
            .map(|c| match c {
                QueryClause::Where(_) => "where",
                QueryClause::OrderBy(_) => "orderBy",
                QueryClause::Limit(_) => "limit",
                QueryClause::Anchor(a) => a.name(),
            })
            .collect();

        assert_eq!(
            kinds,
            vec!["where", "where", "orderBy", "limit", "startAfter", "endAt"]
        );
        let fields: Vec<&str> = query.filters().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["category", "budget"]);
    }

    #[test]
    fn test_empty_options_yield_base_query() {
        let query = build_query("tasks", &CollectionOptions::default());
        assert_eq!(query.path(), "tasks");
        assert!(query.clauses().is_empty());
    }

    #[test]
    fn test_zero_limits_and_null_anchors_are_absent() {
        let options = CollectionOptions::new()
            .limit(0)
            .limit_to_last(0)
            .start_after(Value::Null);
        assert!(build_query("tasks", &options).clauses().is_empty());
    }

    #[test]
    fn test_falsy_anchor_values_are_kept() {
        let options = CollectionOptions::new()
            .order_by("budget", Direction::Asc)
            .start_after(0)
            .end_before("")
            .start_at(false);
        let anchors: Vec<_> = build_query("tasks", &options).anchors().cloned().collect();
        assert_eq!(
            anchors,
            vec![
                PageAnchor::StartAfter(Value::from(0)),
                PageAnchor::EndBefore(Value::from("")),
                PageAnchor::StartAt(Value::from(false)),
            ]
        );
    }

    #[test]
    fn test_page_replaces_same_kind() {
        let options = CollectionOptions::new()
            .page(PageAnchor::StartAt(Value::from(1)))
            .page(PageAnchor::StartAt(Value::from(2)));
        let anchors: Vec<_> = build_query("t", &options).anchors().cloned().collect();
        assert_eq!(anchors, vec![PageAnchor::StartAt(Value::from(2))]);
    }

    #[test]
    fn test_options_parse_from_source_shape() {
        let json = r#"{
            "where": [["category", "===", "Cleaning"]],
            "orderBy": ["budget", "desc"],
            "limit": 10,
            "startAfter": null
        }"#;
        let options: CollectionOptions = serde_json::from_str(json).unwrap();

        assert_eq!(
            options.filters,
            vec![FieldFilter::new("category", FilterOp::Eq, "Cleaning")]
        );
        assert_eq!(
            options.order_by,
            Some(OrderBy::new("budget", Direction::Desc))
        );
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.start_after, None);
    }

    #[test]
    fn test_tasks_scenario_query() {
        let options = CollectionOptions::new()
            .where_field("category", FilterOp::Eq, "Cleaning")
            .order_by("budget", Direction::Desc)
            .limit(10);
        let query = CollectionQuery::new("tasks", Some(options)).query();
        assert_eq!(
            query.to_string(),
            r#"tasks where category == "Cleaning" order by budget desc limit 10"#
        );
    }

    #[test]
    fn test_document_query_empty_id_has_no_reference() {
        assert!(DocumentQuery::new("tasks", "").reference().is_none());
        assert_eq!(
            DocumentQuery::new("tasks", "t1").reference().unwrap().path(),
            "tasks/t1"
        );
    }
}
