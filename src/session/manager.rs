use crate::api::auth::OAuthClient;
use crate::error::{AppError, AppResult};
use crate::events::{AuthStatePayload, EventSender, PlayerEvent};
use crate::now_millis;
use crate::session::store::{AccountTier, Session, TokenStore};
use crate::storage::{Storage, SESSION_KEY};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns the session lifecycle: Anonymous -> Authenticated -> (Refreshing) ->
/// Authenticated, or back to Anonymous on logout or a failed refresh.
pub struct SessionManager {
    store: TokenStore,
    oauth: OAuthClient,
    storage: Arc<dyn Storage>,
    /// Held for the duration of a refresh exchange so concurrent callers
    /// share its result.
    refresh_lock: Mutex<()>,
    events: EventSender,
}

impl SessionManager {
    /// Restores the persisted session, if any.
    pub fn new(oauth: OAuthClient, storage: Arc<dyn Storage>, events: EventSender) -> Self {
        let session = match storage.get(SESSION_KEY) {
            Some(raw) => serde_json::from_str::<Session>(&raw).unwrap_or_else(|e| {
                log::warn!("[SessionManager::new] Discarding unreadable session: {}", e);
                Session::default()
            }),
            None => Session::default(),
        };
        let store = TokenStore::new(session);
        if store.is_authenticated() {
            log::info!(
                "[SessionManager::new] Restored {:?} session",
                store.account_tier()
            );
        }

        Self {
            store,
            oauth,
            storage,
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    pub fn snapshot(&self) -> Session {
        self.store.snapshot()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn account_tier(&self) -> AccountTier {
        self.store.account_tier()
    }

    pub fn is_premium(&self) -> bool {
        self.account_tier() == AccountTier::Premium
    }

    pub fn set_session(&self, access_token: String, refresh_token: Option<String>, expires_in: u64) {
        let was_authenticated = self.store.is_authenticated();
        let session =
            self.store
                .set_tokens(access_token, refresh_token, expires_at_from(expires_in));
        self.stored(was_authenticated, session);
    }

    fn stored(&self, was_authenticated: bool, session: Session) {
        self.persist(&session);
        if !was_authenticated {
            log::info!("[set_session] Authenticated");
            self.emit_auth_state(&session);
        }
    }

    pub fn set_account_tier(&self, tier: AccountTier) {
        if self.store.account_tier() == tier {
            return;
        }
        let session = self.store.set_account_tier(tier);
        log::info!("[set_account_tier] {:?}", tier);
        if session.authenticated {
            self.persist(&session);
        }
        self.emit_auth_state(&session);
    }

    pub fn clear_session(&self) {
        let was_authenticated = self.store.is_authenticated();
        self.store.clear();
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            log::error!("[clear_session] Failed to clear stored session: {}", e);
        }
        if was_authenticated {
            log::info!("[clear_session] Session cleared");
            self.emit_auth_state(&Session::default());
        }
    }

    /// Returns a non-expired access token, refreshing it first when needed.
    /// Concurrent callers hitting the same expiry share one refresh exchange.
    pub async fn valid_access_token(&self) -> AppResult<String> {
        if let Some(token) = self.store.fresh_token(now_millis()) {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have finished the refresh while we waited.
        if let Some(token) = self.store.fresh_token(now_millis()) {
            return Ok(token);
        }
        self.refresh_locked().await
    }

    /// Refreshes after the remote service rejected `stale`, unless the token
    /// was already rotated by someone else.
    pub async fn force_refresh(&self, stale: &str) -> AppResult<String> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.store.fresh_token(now_millis()) {
            if token != stale {
                return Ok(token);
            }
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> AppResult<String> {
        let generation = self.store.generation();
        let Some(refresh_token) = self.store.refresh_token() else {
            self.clear_session();
            return Err(AppError::SessionExpired);
        };

        log::info!("[refresh] Access token expired, refreshing");
        match self.oauth.refresh_access_token(&refresh_token).await {
            Ok(token) => {
                let access_token = token.access_token.clone();
                let was_authenticated = self.store.is_authenticated();
                match self.store.set_tokens_if_current(
                    generation,
                    token.access_token,
                    token.refresh_token,
                    expires_at_from(token.expires_in),
                ) {
                    Some(session) => {
                        self.stored(was_authenticated, session);
                        if self.store.generation() != generation {
                            // Cleared while persisting; keep storage empty too.
                            let _ = self.storage.remove(SESSION_KEY);
                            return Err(AppError::SessionExpired);
                        }
                        Ok(access_token)
                    }
                    None => {
                        log::info!("[refresh] Session cleared during refresh, tokens dropped");
                        Err(AppError::SessionExpired)
                    }
                }
            }
            Err(e) => {
                log::warn!("[refresh] Refresh failed, clearing session: {}", e);
                self.clear_session();
                Err(AppError::SessionExpired)
            }
        }
    }

    /// Completes the authorization-code flow.
    pub async fn login_with_code(&self, code: &str, code_verifier: Option<&str>) -> AppResult<()> {
        let token = self.oauth.exchange_code(code, code_verifier).await?;
        self.set_session(token.access_token, token.refresh_token, token.expires_in);
        Ok(())
    }

    fn persist(&self, session: &Session) {
        let result = serde_json::to_string(session)
            .map_err(AppError::from)
            .and_then(|raw| self.storage.set(SESSION_KEY, &raw));
        if let Err(e) = result {
            log::error!("[persist] Failed to store session: {}", e);
        }
    }

    fn emit_auth_state(&self, session: &Session) {
        let _ = self
            .events
            .send(PlayerEvent::AuthStateChanged(AuthStatePayload {
                authenticated: session.authenticated,
                account_tier: session.account_tier,
            }));
    }
}

/// Absolute expiry for a token lifetime of `expires_in` seconds.
fn expires_at_from(expires_in: u64) -> i64 {
    let lifetime_ms = i64::try_from(expires_in)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);
    now_millis().saturating_add(lifetime_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_lifetime_saturates() {
        assert_eq!(expires_at_from(u64::MAX), i64::MAX);
        let soon = expires_at_from(60);
        assert!(soon > now_millis() && soon <= now_millis() + 60_000);
    }
}
