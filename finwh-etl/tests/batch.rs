mod helpers;

use rust_decimal_macros::dec;
use serde_json::json;

use finwh_etl::{
    batch::{BatchState, ErrorKind},
    store::FailPoint,
    *,
};

#[tokio::test]
async fn malformed_envelopes_are_rejected_before_storage() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let payloads = [
        json!([{ "id": 1 }]),
        json!({}),
        json!({ "BankAccounts": [], "Zaimy": [] }),
        json!({ "Payments": [{ "id": 1 }] }),
        json!({ "BankAccounts": { "id": 1 } }),
    ];

    for payload in payloads {
        let response = warehouse.ingest(payload, helpers::options()).await;
        assert_eq!(response.report.status, BatchStatus::Error);
        assert_eq!(response.report.state, BatchState::Invalid);
        assert_eq!(response.sink, SinkStatus::Skipped);
        let error = response.report.error.expect("error detail");
        assert_eq!(error.kind, ErrorKind::Validation);
        assert_eq!(
            error.supported_kinds,
            vec![EntityKind::BankAccounts, EntityKind::Loans]
        );
        assert!(error.expected_format.is_some());
    }

    let tables = store.tables().await;
    assert!(tables.dates.is_empty());
    assert!(tables.accounts.is_empty());
    assert_eq!(store.write_counts().await, Default::default());
    Ok(())
}

#[tokio::test]
async fn unsupported_kind_names_the_key() -> anyhow::Result<()> {
    let (warehouse, _) = helpers::init_warehouse().await?;
    let response = warehouse
        .ingest(json!({ "Payments": [] }), helpers::options())
        .await;
    let error = response.report.error.expect("error detail");
    assert!(error.message.contains("Payments"));
    Ok(())
}

#[tokio::test]
async fn storage_failure_rolls_back_the_whole_batch() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let records: Vec<_> = (1..=120)
        .map(|id| json!({ "id": id, "balance": 1 }))
        .collect();
    store.fail_at(FailPoint::FactWrite, 3).await;

    let response = warehouse
        .ingest(helpers::bank_accounts(records), helpers::options())
        .await;

    assert_eq!(response.report.status, BatchStatus::Error);
    assert_eq!(response.report.state, BatchState::RolledBack);
    assert!(!response.report.is_committed());
    assert_eq!(response.sink, SinkStatus::Skipped);
    assert_eq!(response.report.stats.processed, 101);
    assert_eq!(response.report.records.len(), 101);
    assert_eq!(
        response.report.error.expect("error detail").kind,
        ErrorKind::Storage
    );

    let tables = store.tables().await;
    assert!(tables.dates.is_empty());
    assert!(tables.accounts.is_empty());
    assert!(tables.account_balances.is_empty());
    assert!(tables.account_summaries.is_empty());
    assert_eq!(tables.writes, Default::default());
    Ok(())
}

#[tokio::test]
async fn summary_failure_discards_committed_looking_facts() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    warehouse
        .ingest(
            helpers::bank_accounts(vec![json!({ "id": 1, "balance": 10 })]),
            helpers::options(),
        )
        .await;
    let before = store.tables().await;
    store.fail_at(FailPoint::SummaryWrite, 1).await;

    let response = warehouse
        .ingest(
            helpers::bank_accounts(vec![
                json!({ "id": 1, "balance": 20 }),
                json!({ "id": 2, "balance": 5 }),
            ]),
            helpers::options(),
        )
        .await;

    assert_eq!(response.report.state, BatchState::RolledBack);
    let after = store.tables().await;
    assert_eq!(after.accounts, before.accounts);
    assert_eq!(after.account_balances, before.account_balances);
    assert_eq!(
        after.account_summaries[&helpers::date_id()].total_balance_byn,
        dec!(10)
    );
    Ok(())
}

#[tokio::test]
async fn failed_commit_leaves_no_trace() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    store.fail_at(FailPoint::Commit, 1).await;

    let response = warehouse
        .ingest(
            helpers::loans(vec![json!({ "id": "L", "debt": 1 })]),
            helpers::options(),
        )
        .await;

    assert_eq!(response.report.state, BatchState::RolledBack);
    assert!(store.tables().await.loans.is_empty());

    let retry = warehouse
        .ingest(
            helpers::loans(vec![json!({ "id": "L", "debt": 1 })]),
            helpers::options(),
        )
        .await;
    assert_eq!(retry.report.state, BatchState::Committed);
    assert_eq!(store.tables().await.loans.len(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_batch_commits_without_summary() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;

    let response = warehouse
        .ingest(helpers::bank_accounts(vec![]), helpers::options())
        .await;

    assert_eq!(response.report.status, BatchStatus::Success);
    assert_eq!(response.report.date_id, Some(helpers::date_id()));
    let summary = response.report.summary.expect("summary");
    assert!(!summary.written);
    assert_eq!(summary.count, 0);

    let tables = store.tables().await;
    assert!(tables.dates.contains_key(&helpers::date_id()));
    assert!(tables.account_summaries.is_empty());
    Ok(())
}

#[tokio::test]
async fn small_flush_stride_gives_same_result() -> anyhow::Result<()> {
    let etl = EtlConfig {
        flush_stride: 3,
        ..Default::default()
    };
    let (warehouse, store) = helpers::init_warehouse_with(etl).await?;
    let records: Vec<_> = (1..=10)
        .map(|id| json!({ "id": format!("L{id}"), "debt": id, "currency": "BYN" }))
        .collect();

    let response = warehouse
        .ingest(helpers::loans(records), helpers::options())
        .await;

    assert_eq!(response.report.status, BatchStatus::Success);
    let tables = store.tables().await;
    assert_eq!(tables.loans.len(), 10);
    assert_eq!(tables.loan_balances.len(), 10);
    assert_eq!(tables.writes.loans_inserted, 10);
    assert_eq!(tables.loan_summaries[&helpers::date_id()].total_debt_byn, dec!(55));
    Ok(())
}

#[tokio::test]
async fn response_carries_request_metadata() -> anyhow::Result<()> {
    let (warehouse, _) = helpers::init_warehouse().await?;
    let options = IngestOptions {
        description: Some("nightly".to_string()),
        data_size: Some(1234),
        ..helpers::options()
    };

    let response = warehouse
        .ingest(helpers::bank_accounts(vec![json!({ "id": 1 })]), options)
        .await;

    assert_eq!(response.description.as_deref(), Some("nightly"));
    assert_eq!(response.data_size, 1234);
    assert_eq!(response.sink, SinkStatus::NotConfigured);
    assert_eq!(response.report.processing_date, helpers::processing_date());

    let body = serde_json::to_value(&response)?;
    assert_eq!(body["status"], "success");
    assert_eq!(body["state"], "COMMITTED");
    assert_eq!(body["sink"]["status"], "not_configured");
    assert_eq!(body["stats"]["processed"], 1);
    Ok(())
}
