//! The task board: cleaning tasks by budget, as a page would mount them.

mod support;

use docbind::{CollectionOptions, CollectionQuery, Phase, StoreContext};
use docbind_api::{record, DocumentRef, Value};
use support::{add_cleaning_tasks, assert_no_references, field, seeded_store, settle, wait_for_data};

const BOARD_OPTIONS: &str = r#"{
    "where": [["category", "==", "Cleaning"]],
    "orderBy": ["budget", "desc"],
    "limit": 10
}"#;

fn board_options() -> CollectionOptions {
    serde_json::from_str(BOARD_OPTIONS).expect("valid options")
}

#[test]
fn test_board_options_compose_expected_query() {
    let query = CollectionQuery::new("tasks", Some(board_options())).query();
    assert_eq!(
        query.to_string(),
        r#"tasks where category == "Cleaning" order by budget desc limit 10"#
    );
}

#[tokio::test]
async fn test_board_lists_cleaning_tasks_by_budget_desc_capped_at_ten() {
    let store = seeded_store();
    add_cleaning_tasks(&store, 8);
    let ctx = StoreContext::new(store.clone());

    let board = ctx.use_collection("tasks", Some(board_options()));
    let tasks = settle(&board).await.data;

    assert_eq!(tasks.len(), 10);
    assert!(tasks
        .iter()
        .all(|t| field(t, "category") == &Value::from("Cleaning")));

    let budgets: Vec<i64> = tasks
        .iter()
        .map(|t| field(t, "budget").as_i64().unwrap())
        .collect();
    assert!(
        budgets.windows(2).all(|w| w[0] > w[1]),
        "budgets not strictly descending: {:?}",
        budgets
    );
    assert_eq!(budgets[0], 1007);

    assert_no_references(&tasks, "board");
    for task in &tasks {
        let requester = field(task, "requester").as_object().unwrap();
        assert!(requester.contains_key("name"));
        assert!(requester.contains_key("id"));
    }
}

#[tokio::test]
async fn test_board_reflects_new_high_budget_task() {
    let store = seeded_store();
    let ctx = StoreContext::new(store.clone());

    let board = ctx.use_collection("tasks", Some(board_options()));
    assert_eq!(settle(&board).await.data.len(), 4);

    store.add(
        "tasks",
        record([
            ("title", Value::from("Steam carpets")),
            ("category", Value::from("Cleaning")),
            ("budget", Value::from(999)),
            ("requester", Value::from(DocumentRef::new("users", "u2"))),
        ]),
    );

    let tasks = wait_for_data(&board, |data| data.len() == 5).await;
    assert_eq!(field(&tasks[0], "title"), &Value::from("Steam carpets"));
    assert_eq!(
        field(&tasks[0], "requester").as_object().unwrap()["name"],
        Value::from("Bruno")
    );
    assert_eq!(board.phase(), Phase::Streaming);
    assert_eq!(store.listen_count(), 1);
}

#[tokio::test]
async fn test_board_pages_with_start_after() {
    let store = seeded_store();
    let ctx = StoreContext::new(store.clone());

    let first_page = board_options().limit(2);
    let mut board = ctx.use_collection("tasks", Some(first_page.clone()));
    let page = settle(&board).await.data;
    let last_budget = field(&page[1], "budget").clone();
    assert_eq!(last_budget, Value::from(120));

    assert!(board.set_query("tasks", Some(first_page.start_after(last_budget))));
    let next = settle(&board).await.data;
    let titles: Vec<_> = next.iter().map(|t| field(t, "title").clone()).collect();
    assert_eq!(
        titles,
        vec![Value::from("Wash windows"), Value::from("Vacuum stairs")]
    );
}

#[tokio::test]
async fn test_task_detail_page_reads_one_document() {
    let store = seeded_store();
    let ctx = StoreContext::new(store.clone());

    let mut detail = ctx.use_doc("tasks", "t03");
    let task = settle(&detail).await.data.expect("t03 exists");
    assert_eq!(field(&task, "title"), &Value::from("Mow lawn"));
    assert_eq!(
        field(&task, "requester").as_object().unwrap()["role"],
        Value::from("Requester")
    );

    assert!(detail.set_doc("tasks", "t06"));
    let task = settle(&detail).await.data.expect("t06 exists");
    assert_eq!(field(&task, "title"), &Value::from("Plant roses"));

    assert!(!detail.set_doc("tasks", "t06"));
    assert_eq!(store.listen_count(), 2);
}
