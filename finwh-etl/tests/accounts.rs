mod helpers;

use rust_decimal_macros::dec;
use serde_json::json;

use finwh_etl::{batch::BatchState, *};

#[tokio::test]
async fn new_account_is_reconciled_into_facts_and_summary() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;

    let payload = helpers::bank_accounts(vec![json!({
        "id": "42",
        "currency": "USD",
        "balance": 100
    })]);
    let response = warehouse.ingest(payload, helpers::options()).await;

    assert_eq!(response.report.status, BatchStatus::Success);
    assert_eq!(response.report.state, BatchState::Committed);
    assert_eq!(response.report.stats.processed, 1);
    assert_eq!(response.report.stats.created, 1);
    assert_eq!(response.report.stats.facts_created, 1);

    let tables = store.tables().await;
    let date_id = helpers::date_id();
    assert!(tables.dates.contains_key(&date_id));

    let account = &tables.accounts[&AccountId::from(42)];
    assert_eq!(account.currency, "USD");
    assert_eq!(account.account_name, "Account 42");
    assert_eq!(account.creation_date, helpers::processing_date());

    let fact = &tables.account_balances[&(AccountId::from(42), date_id)];
    assert_eq!(fact.balance, dec!(100));
    assert_eq!(fact.balance_byn, dec!(100) * dec!(3.07));

    let summary = &tables.account_summaries[&date_id];
    assert_eq!(summary.total_balance_byn, dec!(307));
    assert_eq!(summary.account_count, 1);

    let result = response.report.summary.expect("summary");
    assert_eq!(result.total, dec!(307));
    assert_eq!(result.count, 1);
    assert!(result.created);
    Ok(())
}

#[tokio::test]
async fn resubmitting_same_batch_writes_no_entities() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let payload = helpers::bank_accounts(vec![json!({
        "ID": 42,
        "account_name": "Main",
        "currency": "USD",
        "balance": "100"
    })]);

    warehouse.ingest(payload.clone(), helpers::options()).await;
    let after_first = store.write_counts().await;

    let response = warehouse.ingest(payload, helpers::options()).await;
    let after_second = store.write_counts().await;

    assert_eq!(response.report.status, BatchStatus::Success);
    assert_eq!(response.report.stats.unchanged, 1);
    assert_eq!(response.report.stats.facts_unchanged, 1);
    assert_eq!(after_second.entity_writes(), after_first.entity_writes());
    assert_eq!(
        after_second.account_facts_inserted + after_second.account_facts_updated,
        after_first.account_facts_inserted + after_first.account_facts_updated
    );
    assert_eq!(after_second.dates_inserted, 1);

    let tables = store.tables().await;
    let summary = &tables.account_summaries[&helpers::date_id()];
    assert_eq!(summary.total_balance_byn, dec!(307));
    assert_eq!(summary.account_count, 1);
    assert!(!response.report.summary.expect("summary").created);
    Ok(())
}

#[tokio::test]
async fn changed_balance_updates_fact_only() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let record = |balance: i64| {
        helpers::bank_accounts(vec![json!({
            "ID": 7,
            "account_name": "Ops",
            "currency": "EUR",
            "balance": balance
        })])
    };

    warehouse.ingest(record(10), helpers::options()).await;
    let before = store.write_counts().await;
    let response = warehouse.ingest(record(20), helpers::options()).await;
    let after = store.write_counts().await;

    assert_eq!(response.report.stats.unchanged, 1);
    assert_eq!(response.report.stats.facts_updated, 1);
    assert_eq!(after.entity_writes(), before.entity_writes());
    assert_eq!(after.account_facts_updated, before.account_facts_updated + 1);

    let tables = store.tables().await;
    let fact = &tables.account_balances[&(AccountId::from(7), helpers::date_id())];
    assert_eq!(fact.balance, dec!(20));
    assert_eq!(fact.balance_byn, dec!(70));
    assert_eq!(
        tables.account_summaries[&helpers::date_id()].total_balance_byn,
        dec!(70)
    );
    Ok(())
}

#[tokio::test]
async fn changed_attribute_updates_account() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    warehouse
        .ingest(
            helpers::bank_accounts(vec![json!({ "id": 3, "account_name": "Old", "balance": 1 })]),
            helpers::options(),
        )
        .await;
    let response = warehouse
        .ingest(
            helpers::bank_accounts(vec![json!({ "id": 3, "Название счета": "New", "balance": 1 })]),
            helpers::options(),
        )
        .await;

    assert_eq!(response.report.stats.updated, 1);
    assert_eq!(response.report.stats.facts_unchanged, 1);
    let tables = store.tables().await;
    let account = &tables.accounts[&AccountId::from(3)];
    assert_eq!(account.account_name, "New");
    assert_eq!(account.currency, "BYN");
    assert_eq!(tables.writes.accounts_updated, 1);
    Ok(())
}

#[tokio::test]
async fn invalid_record_is_skipped_not_fatal() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let payload = helpers::bank_accounts(vec![
        json!({ "id": 1, "balance": "5,5", "currency": "BYN" }),
        json!({ "balance": 10 }),
    ]);

    let response = warehouse.ingest(payload, helpers::options()).await;

    assert_eq!(response.report.status, BatchStatus::PartialSuccess);
    assert_eq!(response.report.stats.received, 2);
    assert_eq!(response.report.stats.processed, 1);
    assert_eq!(response.report.stats.skipped, 1);
    assert_eq!(response.report.stats.errored, 1);
    assert_eq!(response.report.issues.len(), 1);
    assert_eq!(response.report.issues[0].index, 1);
    assert_eq!(response.report.records.len(), 1);

    let tables = store.tables().await;
    assert_eq!(tables.accounts.len(), 1);
    let fact = &tables.account_balances[&(AccountId::from(1), helpers::date_id())];
    assert_eq!(fact.balance_byn, dec!(5.5));
    assert_eq!(tables.account_summaries[&helpers::date_id()].account_count, 1);
    Ok(())
}

#[tokio::test]
async fn oversized_balances_are_skipped_per_record() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let payload = helpers::bank_accounts(vec![
        json!({ "id": 1, "balance": "79228162514264337593543950335", "currency": "USD" }),
        json!({ "id": 2, "balance": "10", "currency": "BYN" }),
        json!({ "id": 3, "balance": "9000000000000000", "currency": "USD" }),
    ]);

    let response = tokio::spawn(async move {
        warehouse.ingest(payload, helpers::options()).await
    })
    .await?;

    assert_eq!(response.report.status, BatchStatus::PartialSuccess);
    assert_eq!(response.report.state, BatchState::Committed);
    assert_eq!(response.report.stats.processed, 1);
    assert_eq!(response.report.stats.skipped, 2);
    let skipped: Vec<_> = response.report.issues.iter().map(|i| i.index).collect();
    assert_eq!(skipped, vec![0, 2]);
    assert!(response.report.issues[0].error.contains("'balance'"));
    assert!(response.report.issues[1].error.contains("'balance_reporting'"));

    let tables = store.tables().await;
    assert_eq!(tables.accounts.len(), 1);
    assert!(tables.accounts.contains_key(&AccountId::from(2)));
    assert_eq!(tables.account_summaries[&helpers::date_id()].total_balance_byn, dec!(10));
    Ok(())
}

#[tokio::test]
async fn locale_formatted_amounts_normalise_identically() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let payload = helpers::bank_accounts(vec![
        json!({ "id": 1, "Остаток": "1 234,56", "Валюта": "USD" }),
        json!({ "id": 2, "balance": "1234.56", "currency": "USD" }),
        json!({ "id": 3, "balance": "1.234,56", "currency": "USD" }),
    ]);

    warehouse.ingest(payload, helpers::options()).await;

    let tables = store.tables().await;
    let first = &tables.account_balances[&(AccountId::from(1), helpers::date_id())];
    let second = &tables.account_balances[&(AccountId::from(2), helpers::date_id())];
    let third = &tables.account_balances[&(AccountId::from(3), helpers::date_id())];
    assert_eq!(first.balance, dec!(1234.56));
    assert_eq!(first.balance, second.balance);
    assert_eq!(first.balance, third.balance);
    assert_eq!(first.balance_byn, second.balance_byn);
    assert_eq!(first.balance_byn, dec!(3790.1));
    Ok(())
}

#[tokio::test]
async fn unknown_currency_is_not_converted() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let payload = helpers::bank_accounts(vec![json!({
        "id": 9,
        "currency": "XYZ",
        "balance": "12.34"
    })]);

    let response = warehouse.ingest(payload, helpers::options()).await;

    assert_eq!(response.report.status, BatchStatus::Success);
    let tables = store.tables().await;
    let fact = &tables.account_balances[&(AccountId::from(9), helpers::date_id())];
    assert_eq!(fact.balance_byn, dec!(12.34));
    Ok(())
}

#[tokio::test]
async fn supplied_reporting_amount_is_respected() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let payload = helpers::bank_accounts(vec![
        json!({ "id": 1, "currency": "USD", "Остаток": 10, "Остаток BLR": "31,00" }),
        json!({ "id": 2, "currency": "USD", "balance": 10, "balance_byn": 10 }),
        json!({ "id": 3, "currency": "BLR", "balance": 10 }),
    ]);

    warehouse.ingest(payload, helpers::options()).await;

    let tables = store.tables().await;
    let reporting = |id: i64| tables.account_balances[&(AccountId::from(id), helpers::date_id())].balance_byn;
    assert_eq!(reporting(1), dec!(31));
    assert_eq!(reporting(2), dec!(30.7));
    assert_eq!(reporting(3), dec!(10));
    assert_eq!(
        tables.account_summaries[&helpers::date_id()].total_balance_byn,
        dec!(71.7)
    );
    Ok(())
}

#[tokio::test]
async fn currency_falls_back_to_stored_account_currency() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    warehouse
        .ingest(
            helpers::bank_accounts(vec![json!({ "id": 5, "currency": "EUR", "balance": 1 })]),
            helpers::options(),
        )
        .await;
    warehouse
        .ingest(
            helpers::bank_accounts(vec![json!({ "id": 5, "balance": 2 })]),
            helpers::options(),
        )
        .await;

    let tables = store.tables().await;
    assert_eq!(tables.accounts[&AccountId::from(5)].currency, "EUR");
    let fact = &tables.account_balances[&(AccountId::from(5), helpers::date_id())];
    assert_eq!(fact.balance_byn, dec!(7));
    Ok(())
}

#[tokio::test]
async fn large_batches_are_flushed_in_strides() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let records = (1..=120)
        .map(|id| json!({ "id": id, "balance": 1, "currency": "BYN" }))
        .collect();

    let response = warehouse
        .ingest(helpers::bank_accounts(records), helpers::options())
        .await;

    assert_eq!(response.report.status, BatchStatus::Success);
    assert_eq!(response.report.stats.processed, 120);
    let tables = store.tables().await;
    assert_eq!(tables.accounts.len(), 120);
    assert_eq!(tables.writes.accounts_inserted, 120);
    assert_eq!(tables.writes.entity_insert_calls, 3);
    assert_eq!(tables.writes.fact_insert_calls, 3);
    let summary = &tables.account_summaries[&helpers::date_id()];
    assert_eq!(summary.total_balance_byn, dec!(120));
    assert_eq!(summary.account_count, 120);
    Ok(())
}

#[tokio::test]
async fn duplicate_ids_in_one_batch_keep_last_value() -> anyhow::Result<()> {
    let (warehouse, store) = helpers::init_warehouse().await?;
    let payload = helpers::bank_accounts(vec![
        json!({ "id": 1, "balance": 1, "account_name": "A" }),
        json!({ "id": 1, "balance": 2, "account_name": "B" }),
    ]);

    let response = warehouse.ingest(payload, helpers::options()).await;

    assert_eq!(response.report.stats.created, 1);
    assert_eq!(response.report.stats.updated, 1);
    let tables = store.tables().await;
    assert_eq!(tables.accounts[&AccountId::from(1)].account_name, "B");
    assert_eq!(tables.writes.accounts_inserted, 1);
    assert_eq!(tables.writes.accounts_updated, 0);
    let fact = &tables.account_balances[&(AccountId::from(1), helpers::date_id())];
    assert_eq!(fact.balance, dec!(2));
    Ok(())
}
