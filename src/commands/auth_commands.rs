use crate::api::auth::PkceChallenge;
use crate::error::{AppError, AppResult};
use crate::session::AccountTier;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    pub account_tier: AccountTier,
    pub expires_at: Option<i64>,
}

pub async fn check_auth_status(state: &AppState) -> AuthStatus {
    let session = state.session.snapshot();
    AuthStatus {
        authenticated: session.authenticated,
        account_tier: session.account_tier,
        expires_at: session.expires_at,
    }
}

/// Authorize URL for the browser step. In PKCE mode the verifier is kept
/// until the callback code arrives.
pub async fn login_url(state: &AppState) -> String {
    let oauth = state.session.oauth();
    if oauth.uses_pkce() {
        let pkce = PkceChallenge::generate();
        let url = oauth.authorize_url(Some(&pkce));
        *state.pkce_verifier.lock().await = Some(pkce.verifier);
        url
    } else {
        oauth.authorize_url(None)
    }
}

pub async fn handle_auth_callback(state: &AppState, code: &str) -> AppResult<AuthStatus> {
    let verifier = state.pkce_verifier.lock().await.take();
    if state.session.oauth().uses_pkce() && verifier.is_none() {
        return Err(AppError::Config(
            "No login in progress, request a login URL first".into(),
        ));
    }

    state
        .session
        .login_with_code(code, verifier.as_deref())
        .await?;

    if let Err(e) = state.refresh_account_tier().await {
        log::warn!("[handle_auth_callback] Could not read account tier: {}", e);
    }

    Ok(check_auth_status(state).await)
}

pub async fn logout(state: &AppState) {
    state.logout();
}
