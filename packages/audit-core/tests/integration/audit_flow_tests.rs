//! End-to-end transaction scenarios against the in-memory audit store.

use anyhow::Result;
use audit_core::buffer::ChangeBuffer;
use audit_core::config::AuditConfig;
use audit_core::entity::{EntityKey, PropertySnapshot};
use audit_core::mapper::NamedPropertyMapper;
use audit_core::revision::NoopRevisionListener;
use serde_json::json;

use super::support::InMemoryAuditStore;

fn customer_mapper() -> NamedPropertyMapper {
    NamedPropertyMapper::new(vec![
        "id".to_string(),
        "name".to_string(),
        "email".to_string(),
    ])
}

fn customer(id: i64, name: &str, email: &str) -> PropertySnapshot {
    PropertySnapshot::new(vec![json!(id), json!(name), json!(email)])
}

#[test]
fn test_entity_lifecycle_across_three_transactions() -> Result<()> {
    let mapper = customer_mapper();
    let mut store = InMemoryAuditStore::new();
    let mut listener = NoopRevisionListener;
    let key = EntityKey::new("customer", 1);

    // Transaction 1: the entity is born.
    let mut tx1 = ChangeBuffer::new(AuditConfig::default());
    tx1.on_insert(key.clone(), customer(1, "ada", "ada@example.com"), &mapper)?;
    tx1.flush(&mut store, &mut listener)?;

    // Transaction 2: rename.
    let mut tx2 = ChangeBuffer::new(AuditConfig::default());
    tx2.on_update(
        key.clone(),
        customer(1, "ada", "ada@example.com"),
        customer(1, "ada lovelace", "ada@example.com"),
        &mapper,
    )?;
    tx2.flush(&mut store, &mut listener)?;

    // Transaction 3: gone.
    let mut tx3 = ChangeBuffer::new(AuditConfig::default());
    tx3.on_delete(
        key.clone(),
        customer(1, "ada lovelace", "ada@example.com"),
        &mapper,
    )?;
    tx3.flush(&mut store, &mut listener)?;

    let history = store.history_of("customer", &key.id);
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].revision, 1);
    assert_eq!(history[0].data.get("revtype"), Some(&json!("add")));
    assert_eq!(history[1].revision, 2);
    assert_eq!(history[1].data.get("revtype"), Some(&json!("mod")));
    assert_eq!(history[1].data.get("name"), Some(&json!("ada lovelace")));
    assert!(!history[1].data.contains_key("email"));
    assert_eq!(history[2].revision, 3);
    assert_eq!(history[2].data.get("revtype"), Some(&json!("del")));
    Ok(())
}

#[test]
fn test_concurrent_transactions_own_independent_buffers() -> Result<()> {
    let mapper = customer_mapper();
    let mut store = InMemoryAuditStore::new();
    let mut listener = NoopRevisionListener;

    let mut tx_a = ChangeBuffer::new(AuditConfig::default());
    let mut tx_b = ChangeBuffer::new(AuditConfig::default());

    tx_a.on_insert(
        EntityKey::new("customer", 1),
        customer(1, "ada", "a@example.com"),
        &mapper,
    )?;
    tx_b.on_insert(
        EntityKey::new("customer", 2),
        customer(2, "grace", "g@example.com"),
        &mapper,
    )?;

    // Flush order decides revision numbering; buffers never observe each other.
    tx_b.flush(&mut store, &mut listener)?;
    tx_a.flush(&mut store, &mut listener)?;

    assert_eq!(store.revisions.len(), 2);
    let history_b = store.history_of("customer", &2.into());
    assert_eq!(history_b[0].revision, 1);
    let history_a = store.history_of("customer", &1.into());
    assert_eq!(history_a[0].revision, 2);
    Ok(())
}

#[test]
fn test_flush_storm_nets_one_row_per_entity() -> Result<()> {
    let mapper = customer_mapper();
    let mut store = InMemoryAuditStore::new();
    let mut listener = NoopRevisionListener;
    let key = EntityKey::new("customer", 1);

    let mut tx = ChangeBuffer::new(AuditConfig::default());

    // Flush 1: entity updated.
    tx.on_update(
        key.clone(),
        customer(1, "ada", "a@example.com"),
        customer(1, "ada l.", "a@example.com"),
        &mapper,
    )?;
    tx.flush(&mut store, &mut listener)?;

    // Flush 2: another update on top.
    tx.on_update(
        key.clone(),
        customer(1, "ada l.", "a@example.com"),
        customer(1, "ada lovelace", "ada@example.com"),
        &mapper,
    )?;
    tx.flush(&mut store, &mut listener)?;

    // Flush 3: deleted after all.
    tx.on_delete(
        key.clone(),
        customer(1, "ada lovelace", "ada@example.com"),
        &mapper,
    )?;
    tx.flush(&mut store, &mut listener)?;

    // One transaction, one revision, one net row.
    assert_eq!(store.revisions.len(), 1);
    let history = store.history_of("customer", &key.id);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].data.get("revtype"), Some(&json!("del")));
    Ok(())
}

#[test]
fn test_reverted_transaction_leaves_no_trace() -> Result<()> {
    let mapper = customer_mapper();
    let mut store = InMemoryAuditStore::new();
    let mut listener = NoopRevisionListener;
    let key = EntityKey::new("customer", 1);

    let mut tx = ChangeBuffer::new(AuditConfig::default());
    tx.on_insert(key.clone(), customer(1, "ada", "a@example.com"), &mapper)?;
    tx.flush(&mut store, &mut listener)?;
    assert_eq!(store.rows.len(), 1);

    // The insert is taken back before commit; the engine retracts the row
    // it wrote and the revision ends up empty.
    tx.on_delete(key.clone(), customer(1, "ada", "a@example.com"), &mapper)?;
    tx.flush(&mut store, &mut listener)?;

    assert!(store.rows.is_empty());
    Ok(())
}

#[test]
fn test_rollback_issues_no_compensating_deletes() -> Result<()> {
    let mapper = customer_mapper();
    let mut store = InMemoryAuditStore::new();
    let mut listener = NoopRevisionListener;
    let key = EntityKey::new("customer", 1);

    let mut tx = ChangeBuffer::new(AuditConfig::default());
    tx.on_insert(key, customer(1, "ada", "a@example.com"), &mapper)?;
    tx.flush(&mut store, &mut listener)?;

    let rows_before = store.rows.len();
    tx.discard();

    // Written rows are left for the ambient transaction's rollback.
    assert_eq!(store.rows.len(), rows_before);
    Ok(())
}

#[test]
fn test_mixed_entities_share_one_revision() -> Result<()> {
    let mapper = customer_mapper();
    let mut store = InMemoryAuditStore::new();
    let mut listener = NoopRevisionListener;

    let mut tx = ChangeBuffer::new(AuditConfig::default());
    tx.on_insert(
        EntityKey::new("customer", 1),
        customer(1, "ada", "a@example.com"),
        &mapper,
    )?;
    tx.on_update(
        EntityKey::new("order", 40),
        customer(40, "draft", ""),
        customer(40, "placed", ""),
        &mapper,
    )?;
    tx.on_delete(
        EntityKey::new("invoice", 9),
        customer(9, "open", ""),
        &mapper,
    )?;
    tx.flush(&mut store, &mut listener)?;

    assert_eq!(store.revisions.len(), 1);
    assert_eq!(store.rows.len(), 3);
    assert!(store.rows.iter().all(|row| row.revision == 1));
    Ok(())
}
