//! Account reachability
//!
//! Credits and incoming transfers only go to accounts the host reports as
//! active (for a game server: currently connected).

use crate::types::AccountId;
use dashmap::DashSet;
use std::sync::Arc;

/// Host-provided view of which accounts are reachable
pub trait Presence: Send + Sync {
    /// True if `account` may receive funds right now
    fn is_active(&self, account: &AccountId) -> bool;
}

/// Every account is reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysActive;

impl Presence for AlwaysActive {
    fn is_active(&self, _account: &AccountId) -> bool {
        true
    }
}

/// Set of connected accounts, updated by the host on connect/disconnect
#[derive(Debug, Clone, Default)]
pub struct OnlineRoster {
    online: Arc<DashSet<AccountId>>,
}

impl OnlineRoster {
    /// Empty roster
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `account` connected
    pub fn connect(&self, account: AccountId) {
        if self.online.insert(account) {
            tracing::debug!(account = %account, "Account connected");
        }
    }

    /// Mark `account` disconnected
    pub fn disconnect(&self, account: &AccountId) {
        if self.online.remove(account).is_some() {
            tracing::debug!(account = %account, "Account disconnected");
        }
    }

    /// Number of connected accounts
    pub fn len(&self) -> usize {
        self.online.len()
    }

    /// True when nobody is connected
    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }
}

impl Presence for OnlineRoster {
    fn is_active(&self, account: &AccountId) -> bool {
        self.online.contains(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_connect_disconnect() {
        let roster = OnlineRoster::new();
        let account = AccountId::random();
        assert!(!roster.is_active(&account));

        roster.connect(account);
        roster.connect(account);
        assert!(roster.is_active(&account));
        assert_eq!(roster.len(), 1);

        roster.disconnect(&account);
        assert!(!roster.is_active(&account));
        assert!(roster.is_empty());
    }

    #[test]
    fn test_roster_clones_share_state() {
        let roster = OnlineRoster::new();
        let view = roster.clone();
        let account = AccountId::random();
        roster.connect(account);
        assert!(view.is_active(&account));
    }
}
