use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    #[default]
    Standard,
    Premium,
}

impl AccountTier {
    pub fn from_product(product: Option<&str>) -> Self {
        match product {
            Some("premium") => AccountTier::Premium,
            _ => AccountTier::Standard,
        }
    }
}

/// Tokens plus the account class they belong to. `expires_at` is an absolute
/// epoch in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub authenticated: bool,
    #[serde(default)]
    pub account_tier: AccountTier,
}

impl Session {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now_ms >= expires_at,
            None => true,
        }
    }

    /// Restored sessions must keep `authenticated` in step with the token.
    fn normalized(mut self) -> Self {
        self.authenticated = self.access_token.is_some();
        if !self.authenticated {
            self.expires_at = None;
        }
        self
    }
}

/// In-memory holder of the current [`Session`]. No I/O happens here.
#[derive(Debug, Default)]
pub struct TokenStore {
    inner: RwLock<Session>,
    /// Bumped by every [`clear`](Self::clear), under the write lock.
    generation: AtomicU64,
}

impl TokenStore {
    pub fn new(session: Session) -> Self {
        Self {
            inner: RwLock::new(session.normalized()),
            generation: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    /// The access token when it has not yet expired at `now_ms`.
    pub fn fresh_token(&self, now_ms: i64) -> Option<String> {
        let session = self.read();
        if session.is_expired(now_ms) {
            None
        } else {
            session.access_token.clone()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().authenticated
    }

    pub fn account_tier(&self) -> AccountTier {
        self.read().account_tier
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Stores new tokens. A missing refresh token keeps the previous one.
    pub fn set_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: i64,
    ) -> Session {
        let mut session = self.write();
        Self::apply_tokens(&mut session, access_token, refresh_token, expires_at)
    }

    /// Like [`set_tokens`](Self::set_tokens), but only while no `clear` has
    /// happened since `generation` was read.
    pub fn set_tokens_if_current(
        &self,
        generation: u64,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: i64,
    ) -> Option<Session> {
        let mut session = self.write();
        if self.generation() != generation {
            return None;
        }
        Some(Self::apply_tokens(
            &mut session,
            access_token,
            refresh_token,
            expires_at,
        ))
    }

    fn apply_tokens(
        session: &mut Session,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: i64,
    ) -> Session {
        session.access_token = Some(access_token);
        if refresh_token.is_some() {
            session.refresh_token = refresh_token;
        }
        session.expires_at = Some(expires_at);
        session.authenticated = true;
        session.clone()
    }

    pub fn set_account_tier(&self, tier: AccountTier) -> Session {
        let mut session = self.write();
        session.account_tier = tier;
        session.clone()
    }

    pub fn clear(&self) {
        let mut session = self.write();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *session = Session::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_fresh_only_before_expiry() {
        let store = TokenStore::default();
        store.set_tokens("access".into(), Some("refresh".into()), 1_000);

        assert_eq!(store.fresh_token(999).as_deref(), Some("access"));
        assert!(store.fresh_token(1_000).is_none());
        assert!(store.is_authenticated());
    }

    #[test]
    fn refresh_without_new_refresh_token_keeps_old_one() {
        let store = TokenStore::default();
        store.set_tokens("a1".into(), Some("r1".into()), 10);
        store.set_tokens("a2".into(), None, 20);

        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
        assert_eq!(store.access_token().as_deref(), Some("a2"));
    }

    #[test]
    fn clear_nulls_every_field() {
        let store = TokenStore::default();
        store.set_tokens("a".into(), Some("r".into()), 10);
        store.set_account_tier(AccountTier::Premium);
        store.clear();

        assert_eq!(store.snapshot(), Session::default());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn tokens_from_before_a_clear_are_dropped() {
        let store = TokenStore::default();
        store.set_tokens("a1".into(), Some("r1".into()), 10);
        let generation = store.generation();
        store.clear();

        let stored = store.set_tokens_if_current(generation, "a2".into(), None, 20);

        assert!(stored.is_none());
        assert!(!store.is_authenticated());
        assert!(store
            .set_tokens_if_current(store.generation(), "a3".into(), None, 30)
            .is_some());
        assert_eq!(store.access_token().as_deref(), Some("a3"));
    }

    #[test]
    fn restored_session_without_token_is_anonymous() {
        let store = TokenStore::new(Session {
            access_token: None,
            refresh_token: Some("r".into()),
            expires_at: Some(5),
            authenticated: true,
            account_tier: AccountTier::Standard,
        });
        assert!(!store.is_authenticated());
    }

    #[test]
    fn tier_from_product() {
        assert_eq!(AccountTier::from_product(Some("premium")), AccountTier::Premium);
        assert_eq!(AccountTier::from_product(Some("free")), AccountTier::Standard);
        assert_eq!(AccountTier::from_product(None), AccountTier::Standard);
    }
}
