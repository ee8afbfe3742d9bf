//! Account and region scoped state management

use dashmap::DashMap;
use std::hash::Hash;

/// Account used for everything served locally
pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";

/// Region used when none is configured or signed into a request
pub const DEFAULT_REGION: &str = "us-east-1";

/// Key for account and region scoped state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountRegionKey {
    pub account_id: String,
    pub region: String,
}

impl AccountRegionKey {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
        }
    }
}

/// Thread-safe state store with account/region scoping
pub struct StateStore<T> {
    data: DashMap<AccountRegionKey, T>,
}

impl<T> Default for StateStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StateStore<T> {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get or create state for an account/region
    pub fn get_or_create(
        &self,
        account_id: &str,
        region: &str,
    ) -> dashmap::mapref::one::RefMut<'_, AccountRegionKey, T>
    where
        T: Default,
    {
        let key = AccountRegionKey::new(account_id, region);
        self.data.entry(key).or_default()
    }

    /// Get state for an account/region if it exists
    pub fn get(
        &self,
        account_id: &str,
        region: &str,
    ) -> Option<dashmap::mapref::one::Ref<'_, AccountRegionKey, T>> {
        let key = AccountRegionKey::new(account_id, region);
        self.data.get(&key)
    }

    /// Mutable state for an account/region if it exists
    pub fn get_mut(
        &self,
        account_id: &str,
        region: &str,
    ) -> Option<dashmap::mapref::one::RefMut<'_, AccountRegionKey, T>> {
        let key = AccountRegionKey::new(account_id, region);
        self.data.get_mut(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct TestState {
        counter: i32,
    }

    #[test]
    fn test_get_or_create() {
        let store: StateStore<TestState> = StateStore::new();

        {
            let mut state = store.get_or_create(DEFAULT_ACCOUNT_ID, DEFAULT_REGION);
            state.counter = 42;
        }

        let state = store.get(DEFAULT_ACCOUNT_ID, DEFAULT_REGION).unwrap();
        assert_eq!(state.counter, 42);
    }

    #[test]
    fn test_different_regions() {
        let store: StateStore<TestState> = StateStore::new();

        store.get_or_create(DEFAULT_ACCOUNT_ID, "us-east-1").counter = 1;
        store.get_or_create(DEFAULT_ACCOUNT_ID, "us-west-2").counter = 2;

        assert_eq!(store.get(DEFAULT_ACCOUNT_ID, "us-east-1").unwrap().counter, 1);
        assert_eq!(store.get(DEFAULT_ACCOUNT_ID, "us-west-2").unwrap().counter, 2);
        assert!(store.get(DEFAULT_ACCOUNT_ID, "eu-west-1").is_none());
    }

    #[test]
    fn test_get_mut_does_not_create() {
        let store: StateStore<TestState> = StateStore::new();

        assert!(store.get_mut(DEFAULT_ACCOUNT_ID, "eu-west-1").is_none());
        assert!(store.get(DEFAULT_ACCOUNT_ID, "eu-west-1").is_none());

        store.get_or_create(DEFAULT_ACCOUNT_ID, "eu-west-1");
        store.get_mut(DEFAULT_ACCOUNT_ID, "eu-west-1").unwrap().counter = 7;
        assert_eq!(store.get(DEFAULT_ACCOUNT_ID, "eu-west-1").unwrap().counter, 7);
    }
}
