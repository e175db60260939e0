//! Handler Registry
//!
//! Counts live handlers per (database, scope). The per-database map is the
//! only stored state; the per-scope view is recomputed from it on every read.
//!
//! The registry does no locking of its own. The manager keeps it under the
//! same mutex as its database set, so "is this database in use" is always
//! consistent with concurrent handler acquisition and database deletion.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::ContractViolation;

/// Scope name → live handler count, for one database
pub type RefInfo = BTreeMap<String, usize>;

/// Handler counts of one database, keyed by scope
#[derive(Debug, Default, Clone)]
struct RefCounter {
    refs: HashMap<String, usize>,
}

impl RefCounter {
    fn add_ref(&mut self, scope: &str) -> usize {
        let count = self.refs.entry(scope.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Decrement a scope's count, removing the scope at zero
    fn remove_ref(&mut self, db: &str, scope: &str) -> Result<usize, ContractViolation> {
        let count = self
            .refs
            .get_mut(scope)
            .ok_or_else(|| ContractViolation::UnknownScope {
                db: db.to_string(),
                scope: scope.to_string(),
            })?;

        if *count == 0 {
            return Err(ContractViolation::CountExhausted {
                db: db.to_string(),
                scope: scope.to_string(),
            });
        }

        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.refs.remove(scope);
        }
        Ok(remaining)
    }

    fn total(&self) -> usize {
        self.refs.values().sum()
    }

    fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    fn ref_info(&self) -> RefInfo {
        self.refs
            .iter()
            .map(|(scope, count)| (scope.clone(), *count))
            .collect()
    }
}

/// Reference counts of live handlers, per database and scope
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    databases: HashMap<String, RefCounter>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more handler for (db, scope); returns the scope's new count
    pub fn acquire(&mut self, db: &str, scope: &str) -> usize {
        let count = self
            .databases
            .entry(db.to_string())
            .or_default()
            .add_ref(scope);

        debug!(db, scope, count, "handler acquired");
        count
    }

    /// Record that a handler for (db, scope) went away
    ///
    /// Returns the scope's remaining count. Entries that reach zero are
    /// removed, and a database with no scopes left disappears from the
    /// registry.
    pub fn release(&mut self, db: &str, scope: &str) -> Result<usize, ContractViolation> {
        let counter = self
            .databases
            .get_mut(db)
            .ok_or_else(|| ContractViolation::UnknownDatabase { db: db.to_string() })?;

        let remaining = counter.remove_ref(db, scope)?;
        if counter.is_empty() {
            self.databases.remove(db);
        }

        debug!(db, scope, remaining, "handler released");
        Ok(remaining)
    }

    /// Total live handlers on `db`, over all scopes
    pub fn database_usage(&self, db: &str) -> usize {
        self.databases.get(db).map_or(0, RefCounter::total)
    }

    /// Every database in use, with the scopes using it
    pub fn usage_by_database(&self) -> BTreeMap<String, RefInfo> {
        self.databases
            .iter()
            .map(|(db, counter)| (db.clone(), counter.ref_info()))
            .collect()
    }

    /// Every scope holding handlers, with the databases it uses
    ///
    /// The transpose of `usage_by_database()`, derived on each call.
    pub fn usage_by_scope(&self) -> BTreeMap<String, RefInfo> {
        let mut by_scope: BTreeMap<String, RefInfo> = BTreeMap::new();

        for (db, scopes) in self.usage_by_database() {
            for (scope, count) in scopes {
                by_scope.entry(scope).or_default().insert(db.clone(), count);
            }
        }

        by_scope
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    /// Live handlers across every database
    pub fn total_usage(&self) -> usize {
        self.databases.values().map(RefCounter::total).sum()
    }
}
