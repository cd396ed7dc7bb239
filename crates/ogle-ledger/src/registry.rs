//! Known account identifiers.
//!
//! An account exists independently of its balances. Registration is
//! idempotent: registering an existing id reports "not created", never an
//! error.

use std::collections::HashSet;

use ogle_types::AccountId;

/// Registered accounts, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    order: Vec<AccountId>,
    known: HashSet<AccountId>,
}

impl AccountRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a list of ids (the `users` document). Duplicates collapse
    /// onto their first occurrence.
    #[must_use]
    pub fn restore(accounts: impl IntoIterator<Item = AccountId>) -> Self {
        let mut registry = Self::new();
        for account in accounts {
            registry.register(account);
        }
        registry
    }

    /// Register `id`. Returns `true` if it was newly created.
    pub fn register(&mut self, id: AccountId) -> bool {
        if self.known.contains(&id) {
            return false;
        }
        self.known.insert(id.clone());
        self.order.push(id);
        true
    }

    #[must_use]
    pub fn exists(&self, id: &AccountId) -> bool {
        self.known.contains(id)
    }

    /// Registered ids in registration order.
    #[must_use]
    pub fn accounts(&self) -> &[AccountId] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
