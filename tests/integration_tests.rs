//! Integration tests
//!
//! End-to-end flow: seeded table → service → paginating iterator

use dynamo_pager::expression::{Attr, Key};
use dynamo_pager::pagination::{fetch_fn, FetchBuilder};
use dynamo_pager::service::SerializedModel;
use dynamo_pager::store::{MemoryTable, QueryParams, ReturnValues, TableClient, UpdateExpression};
use dynamo_pager::{
    record_from_value, ContinuationToken, Error, Next, Page, PaginatingIterator, Record,
    TableService,
};
use pretty_assertions::assert_eq;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn record(value: Value) -> Record {
    record_from_value(value).unwrap()
}

fn sort_keys(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r["SK"].as_str().unwrap().to_string())
        .collect()
}

/// Twelve orders for one customer, every third one shipped
fn customer_orders() -> Vec<Record> {
    (1..=12)
        .map(|i| {
            let status = if i % 3 == 0 { "shipped" } else { "open" };
            record(json!({
                "PK": "customer#1",
                "SK": format!("order#{i:02}"),
                "GSI1PK": format!("status#{status}"),
                "GSI1SK": format!("order#{i:02}"),
                "status": status,
                "total": i * 10,
            }))
        })
        .collect()
}

fn service() -> TableService {
    let table = MemoryTable::new()
        .with_index("GSI1", "GSI1PK", Some("GSI1SK"))
        .with_items(customer_orders())
        .unwrap();
    TableService::new(Arc::new(table))
}

// ============================================================================
// Iteration over the table
// ============================================================================

#[tokio::test]
async fn test_db_iterator_reads_every_page() {
    let service = service();
    let params = QueryParams::new()
        .key_condition(Key::new("PK").eq("customer#1"))
        .limit(5);

    let mut iter = service.db_iterator(params);
    let records = iter.drain_to_list().await.unwrap();

    assert_eq!(records.len(), 12);
    assert_eq!(iter.pages_fetched(), 3);
    assert_eq!(iter.records_yielded(), 12);
    assert!(iter.is_exhausted());

    // Each page comes out last-first
    let sks = sort_keys(&records);
    assert_eq!(&sks[..5], ["order#05", "order#04", "order#03", "order#02", "order#01"]);
    assert_eq!(&sks[10..], ["order#12", "order#11"]);
}

#[tokio::test]
async fn test_index_query_with_filter() {
    let service = service();
    let filter = TableService::combine_filters(vec![
        Attr::new("status").eq("open"),
        Attr::new("total").ge(50),
    ]);
    let params = QueryParams::new()
        .index("GSI1")
        .key_condition(
            Key::new("GSI1PK")
                .eq("status#open")
                .and(Key::new("GSI1SK").begins_with("order#")),
        )
        .maybe_filter(filter)
        .limit(3);

    let mut records = service.db_iterator(params).drain_to_list().await.unwrap();
    records.sort_by(|a, b| a["SK"].as_str().cmp(&b["SK"].as_str()));

    assert_eq!(
        sort_keys(&records),
        vec!["order#05", "order#07", "order#08", "order#10", "order#11"]
    );
}

#[tokio::test]
async fn test_first_or_default() {
    let service = service();

    let params = QueryParams::new()
        .key_condition(Key::new("PK").eq("customer#1").and(Key::new("SK").eq("order#07")));
    let first = service.db_iterator(params).first_or_default().await.unwrap();
    assert_eq!(first.unwrap()["total"], 70);

    let params = QueryParams::new().key_condition(Key::new("PK").eq("customer#404"));
    let mut iter = service.db_iterator(params);
    assert_eq!(iter.first_or_default().await.unwrap(), None);
    assert!(iter.produce_next().await.unwrap().is_end());
}

#[tokio::test]
async fn test_resume_from_encoded_token() {
    let table = Arc::new(MemoryTable::new().with_items(customer_orders()).unwrap());
    let params = QueryParams::new()
        .key_condition(Key::new("PK").eq("customer#1"))
        .limit(4);

    // One page through the binder, then stop and hand the token around as text
    let mut first = PaginatingIterator::new(
        FetchBuilder::new(table.clone()).having(params.clone()).build(),
    );
    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(first.produce_next().await.unwrap().into_record().unwrap());
    }
    let encoded = first.pending_token().unwrap().encode().unwrap();

    let mut resume = Some(ContinuationToken::decode(&encoded).unwrap());
    let mut rest = PaginatingIterator::new(fetch_fn(move |start: Option<ContinuationToken>| {
        let start = start.or_else(|| resume.take());
        let table = table.clone();
        let params = params.clone();
        async move { table.query(&params, start.as_ref()).await }
    }));

    let remaining = rest.drain_to_list().await.unwrap();
    assert_eq!(
        sort_keys(&seen),
        vec!["order#04", "order#03", "order#02", "order#01"]
    );
    assert_eq!(
        sort_keys(&remaining),
        vec![
            "order#08", "order#07", "order#06", "order#05", "order#12", "order#11", "order#10",
            "order#09"
        ]
    );
}

// ============================================================================
// Writes
// ============================================================================

#[derive(Serialize)]
struct Order {
    #[serde(rename = "PK")]
    pk: String,
    #[serde(rename = "SK")]
    sk: String,
    total: u32,
    scratch: String,
}

#[tokio::test]
async fn test_batch_add_update_delete() {
    let table = Arc::new(MemoryTable::new());
    let service = TableService::new(table.clone());

    let orders: Vec<_> = (0..30)
        .map(|i| {
            SerializedModel::new(Order {
                pk: "customer#2".to_string(),
                sk: format!("order#{:02}", i % 27),
                total: i,
                scratch: "tmp".to_string(),
            })
            .excluding(["scratch"])
        })
        .collect();

    // Three duplicate keys collapse to their last occurrence
    assert_eq!(service.add_batch_items(orders).await.unwrap(), 27);
    assert_eq!(table.len().await, 27);

    let key = record(json!({"PK": "customer#2", "SK": "order#00"}));
    let stored = table.get(&key).await.unwrap().unwrap();
    assert_eq!(stored["total"], 27);
    assert!(!stored.contains_key("scratch"));

    let updated = service
        .update_item(
            "customer#2",
            "order#00",
            UpdateExpression::new().add("total", 3).set("status", "paid"),
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["total"], 30);
    assert_eq!(updated["status"], "paid");

    let missing = service
        .update_item(
            "customer#2",
            "order#99",
            UpdateExpression::new().set("status", "paid"),
            Some(ReturnValues::None),
        )
        .await
        .unwrap_err();
    assert!(matches!(missing, Error::ConditionalCheckFailed { .. }));

    let params = QueryParams::new().key_condition(Key::new("PK").eq("customer#2"));
    let all = service.db_iterator(params.clone()).drain_to_list().await.unwrap();
    assert_eq!(service.delete_batch_items(&all).await.unwrap(), 27);
    assert!(table.is_empty().await);
    assert!(service.db_iterator(params).drain_to_list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_key_attributes_on_results() {
    let service = service();
    let params = QueryParams::new()
        .key_condition(Key::new("PK").eq("customer#1").and(Key::new("SK").eq("order#01")));
    let mut order = service.db_iterator(params).first_or_default().await.unwrap().unwrap();

    TableService::remove_key_attributes(&mut order);
    assert_eq!(Value::Object(order), json!({"status": "open", "total": 10}));
}

// ============================================================================
// Custom fetchers
// ============================================================================

#[tokio::test]
async fn test_two_page_fetch_sequence() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let log = calls.clone();
    let t1 = ContinuationToken::new(record(json!({"PK": "t1"})));

    let mut iter = PaginatingIterator::new(fetch_fn(move |start: Option<ContinuationToken>| {
        log.lock().unwrap().push(start.clone());
        let t1 = t1.clone();
        async move {
            Ok(match start {
                None => Page::new(vec![record(json!({"PK": "a"}))], Some(t1)),
                Some(_) => Page::last(vec![record(json!({"PK": "b"})), record(json!({"PK": "c"}))]),
            })
        }
    }));

    let mut order = Vec::new();
    while let Next::Record(r) = iter.produce_next().await.unwrap() {
        order.push(r["PK"].as_str().unwrap().to_string());
    }
    assert_eq!(order, vec!["a", "c", "b"]);
    assert!(iter.produce_next().await.unwrap().is_end());

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], None);
    assert_eq!(
        calls[1].as_ref().unwrap().key(),
        &record(json!({"PK": "t1"}))
    );
}
