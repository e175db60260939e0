//! Tests for HandlerRegistry
//!
//! These tests verify:
//! - Acquire/release counting per (database, scope)
//! - Entries disappear when they reach zero
//! - Release misuse is reported with the right violation
//! - The scope view is the exact transpose of the database view

use std::collections::BTreeMap;

use kvdb::{ContractViolation, HandlerRegistry, RefInfo};

fn transpose(view: &BTreeMap<String, RefInfo>) -> BTreeMap<String, RefInfo> {
    let mut out: BTreeMap<String, RefInfo> = BTreeMap::new();
    for (outer, inner) in view {
        for (key, count) in inner {
            out.entry(key.clone()).or_default().insert(outer.clone(), *count);
        }
    }
    out
}

#[test]
fn test_acquire_counts_per_scope() {
    let mut registry = HandlerRegistry::new();

    assert_eq!(registry.acquire("db", "s1"), 1);
    assert_eq!(registry.acquire("db", "s1"), 2);
    assert_eq!(registry.acquire("db", "s2"), 1);

    assert_eq!(registry.database_usage("db"), 3);
    assert_eq!(registry.database_usage("other"), 0);

    let usage = registry.usage_by_database();
    assert_eq!(usage["db"]["s1"], 2);
    assert_eq!(usage["db"]["s2"], 1);
}

#[test]
fn test_release_removes_entries_at_zero() {
    let mut registry = HandlerRegistry::new();
    registry.acquire("db", "s1");
    registry.acquire("db", "s1");
    registry.acquire("db", "s2");

    assert_eq!(registry.release("db", "s1").unwrap(), 1);
    assert_eq!(registry.release("db", "s2").unwrap(), 0);
    assert!(!registry.usage_by_database()["db"].contains_key("s2"));

    assert_eq!(registry.release("db", "s1").unwrap(), 0);
    assert!(registry.is_empty());
    assert!(registry.usage_by_database().is_empty());
    assert!(registry.usage_by_scope().is_empty());
}

#[test]
fn test_release_unknown_database() {
    let mut registry = HandlerRegistry::new();

    assert_eq!(
        registry.release("ghost", "s"),
        Err(ContractViolation::UnknownDatabase { db: "ghost".to_string() })
    );
}

#[test]
fn test_release_unknown_scope() {
    let mut registry = HandlerRegistry::new();
    registry.acquire("db", "owner");

    assert_eq!(
        registry.release("db", "stranger"),
        Err(ContractViolation::UnknownScope {
            db: "db".to_string(),
            scope: "stranger".to_string()
        })
    );
    // The failed release must not disturb the real entry
    assert_eq!(registry.database_usage("db"), 1);
}

#[test]
fn test_release_past_zero_is_reported() {
    let mut registry = HandlerRegistry::new();
    registry.acquire("db", "s");
    registry.release("db", "s").unwrap();

    assert!(registry.release("db", "s").is_err());
}

#[test]
fn test_scope_view_is_transpose() {
    let mut registry = HandlerRegistry::new();
    registry.acquire("users", "api");
    registry.acquire("users", "api");
    registry.acquire("users", "jobs");
    registry.acquire("orders", "api");

    let by_db = registry.usage_by_database();
    let by_scope = registry.usage_by_scope();

    assert_eq!(by_scope["api"]["users"], 2);
    assert_eq!(by_scope["api"]["orders"], 1);
    assert_eq!(by_scope["jobs"]["users"], 1);
    assert_eq!(by_scope, transpose(&by_db));
    assert_eq!(transpose(&by_scope), by_db);
    assert_eq!(registry.total_usage(), 4);
}

#[test]
fn test_views_stay_transposed_through_interleaving() {
    let mut registry = HandlerRegistry::new();
    let steps: [(bool, &str, &str); 10] = [
        (true, "users", "api"),
        (true, "orders", "api"),
        (true, "users", "jobs"),
        (true, "users", "api"),
        (false, "orders", "api"),
        (true, "orders", "jobs"),
        (false, "users", "api"),
        (false, "users", "jobs"),
        (false, "users", "api"),
        (false, "orders", "jobs"),
    ];

    for (acquire, db, scope) in steps {
        if acquire {
            registry.acquire(db, scope);
        } else {
            registry.release(db, scope).unwrap();
        }
        assert_eq!(transpose(&registry.usage_by_database()), registry.usage_by_scope());
    }

    assert!(registry.is_empty());
}
