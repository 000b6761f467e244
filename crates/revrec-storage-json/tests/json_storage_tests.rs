use std::{sync::Arc, thread};

use chrono::{NaiveDate, TimeZone, Utc};
use revrec_core::{
    collections, BillingService, CollectionPath, DocumentStore, EngineContext,
    EngineOptions, Filter, FixedClock, LedgerReplayService, Query, RecognitionEngine,
    RecognitionRequest, Repository,
};
use revrec_domain::{BillingStatus, Contract, ContractVersion, LineItem, RecognitionMethod};
use revrec_storage_json::JsonDocumentStore;
use rust_decimal_macros::dec;
use serde_json::json;
use tempfile::tempdir;

fn contracts() -> CollectionPath {
    CollectionPath::new("t1", collections::CONTRACTS)
}

#[test]
fn json_store_creates_reads_and_rejects_duplicates() {
    let dir = tempdir().expect("tempdir");
    let store = JsonDocumentStore::new(dir.path()).expect("create store");

    store
        .create_if_absent(&contracts(), "c1", json!({"status": "active"}))
        .expect("create");
    let err = store
        .create_if_absent(&contracts(), "c1", json!({"status": "draft"}))
        .expect_err("duplicate");
    assert!(err.is_already_exists());

    let path = store.document_path(&contracts().doc("c1"));
    assert!(path.exists());
    assert!(path.ends_with("tenants/t1/contracts/c1.json"));
    assert_eq!(
        store.get(&contracts().doc("c1")).unwrap(),
        Some(json!({"status": "active"}))
    );
    assert_eq!(store.get(&contracts().doc("missing")).unwrap(), None);
}

#[test]
fn json_store_queries_updates_and_deletes() {
    let dir = tempdir().expect("tempdir");
    let store = JsonDocumentStore::new(dir.path()).expect("create store");
    for (key, status, date) in [
        ("b", "active", "2025-02-01"),
        ("a", "draft", "2025-03-01"),
        ("c", "active", "2025-01-01"),
    ] {
        store
            .create_if_absent(&contracts(), key, json!({"status": status, "startDate": date}))
            .unwrap();
    }

    let active = store
        .query(
            &Query::new(contracts())
                .filter(Filter::eq("status", "active"))
                .order_by("startDate", revrec_core::storage::Direction::Asc),
        )
        .unwrap();
    let keys: Vec<_> = active.iter().map(|doc| doc.key.as_str()).collect();
    assert_eq!(keys, vec!["c", "b"]);

    store
        .update(&contracts().doc("a"), json!({"status": "active"}))
        .unwrap();
    assert_eq!(
        store.get(&contracts().doc("a")).unwrap(),
        Some(json!({"status": "active", "startDate": "2025-03-01"}))
    );
    assert!(store
        .update(&contracts().doc("ghost"), json!({}))
        .is_err());

    store
        .batch_delete(&[contracts().doc("a"), contracts().doc("ghost")])
        .unwrap();
    assert_eq!(store.query(&Query::new(contracts())).unwrap().len(), 2);
}

#[test]
fn json_store_keeps_unusual_keys_intact() {
    let dir = tempdir().expect("tempdir");
    let store = JsonDocumentStore::new(dir.path()).expect("create store");
    store
        .create_if_absent(&contracts(), "acme/2025 #1", json!({}))
        .unwrap();
    let docs = store.query(&Query::new(contracts())).unwrap();
    assert_eq!(docs[0].key, "acme/2025 #1");
}

#[test]
fn concurrent_creates_have_exactly_one_winner() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(JsonDocumentStore::new(dir.path()).expect("create store"));
    let handles: Vec<_> = (0..8)
        .map(|writer| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .create_if_absent(&contracts(), "shared", json!({ "writer": writer }))
                    .is_ok()
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(store.query(&Query::new(contracts())).unwrap().len(), 1);
}

#[test]
fn ledger_replay_survives_reopening_the_store() {
    let dir = tempdir().expect("tempdir");
    let clock = FixedClock(Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap());
    let options = EngineOptions::default();
    let up_to = Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap();

    {
        let store = JsonDocumentStore::new(dir.path()).expect("create store");
        let repo = Repository::new(&store, "t1");
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        repo.insert(
            collections::CONTRACTS,
            &Contract::new("c1", "t1", "cust", dec!(12000))
                .with_dates(start, end)
                .with_payment_terms("quarterly net 15")
                .activate("c1-v1"),
        )
        .unwrap();
        repo.insert(
            collections::CONTRACT_VERSIONS,
            &ContractVersion::new("c1-v1", "c1", 1, dec!(12000)),
        )
        .unwrap();
        repo.insert(
            collections::LINE_ITEMS,
            &LineItem::new("li-1", "c1", "c1-v1", dec!(12000), RecognitionMethod::OverTime),
        )
        .unwrap();

        let ctx = EngineContext::new(&store, "t1", &clock, &options);
        let billing = BillingService::generate(&ctx, "c1").unwrap();
        assert_eq!(billing.created.len(), 4);
        BillingService::transition(&ctx, "c1-bill-001", BillingStatus::Invoiced, up_to, None).unwrap();
        RecognitionEngine::run(&ctx, &RecognitionRequest::new("c1", up_to)).unwrap();
        let first = LedgerReplayService::replay(&ctx, "c1", up_to).unwrap();
        // Two revenue months, a split invoice, then March revenue.
        assert_eq!(first.created, 5);
    }

    let reopened = JsonDocumentStore::new(dir.path()).expect("reopen store");
    let ctx = EngineContext::new(&reopened, "t1", &clock, &options);
    let again = LedgerReplayService::replay(&ctx, "c1", up_to).unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.skipped, 5);
    assert_eq!(ctx.repo.ledger_entries("c1").unwrap().len(), 5);
}
