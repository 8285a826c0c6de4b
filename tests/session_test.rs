mod common;

use common::*;
use futures_util::future::join_all;
use spotiplayer::error::AppError;
use spotiplayer::session::AccountTier;
use spotiplayer::storage::{MemoryStorage, Storage, SESSION_KEY};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_body(access: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "streaming"
    })
}

// ============================================================================
// Token refresh
// ============================================================================

mod refresh {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("access-2"))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let storage = Arc::new(MemoryStorage::new());
        seed_session(storage.as_ref(), AccountTier::Premium, -1_000);
        let session = session_manager(&config, storage);

        let results = join_all((0..8).map(|_| session.valid_access_token())).await;

        for result in results {
            assert_eq!(result.unwrap(), "access-2");
        }
        // The old refresh token survives a response that omits one.
        assert_eq!(
            session.snapshot().refresh_token.as_deref(),
            Some(REFRESH_TOKEN)
        );
    }

    #[tokio::test]
    async fn test_fresh_token_needs_no_network() {
        let server = MockServer::start().await;
        let config = config_for(&server);
        let storage = Arc::new(MemoryStorage::new());
        seed_session(storage.as_ref(), AccountTier::Standard, 3_600_000);
        let session = session_manager(&config, storage);

        assert_eq!(session.valid_access_token().await.unwrap(), ACCESS_TOKEN);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_refresh_expires_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Refresh token revoked"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let storage = Arc::new(MemoryStorage::new());
        seed_session(storage.as_ref(), AccountTier::Premium, -1_000);
        let session = session_manager(&config, storage.clone());

        let err = session.valid_access_token().await.unwrap_err();

        assert!(matches!(err, AppError::SessionExpired));
        assert!(!session.is_authenticated());
        assert!(session.snapshot().access_token.is_none());
        assert!(storage.get(SESSION_KEY).is_none());
    }

    #[tokio::test]
    async fn test_logout_during_refresh_stays_logged_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("access-2"))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let storage = Arc::new(MemoryStorage::new());
        seed_session(storage.as_ref(), AccountTier::Premium, -1_000);
        let session = session_manager(&config, storage.clone());

        let refreshing = tokio::spawn({
            let session = session.clone();
            async move { session.valid_access_token().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.clear_session();

        let result = refreshing.await.unwrap();

        assert!(matches!(result, Err(AppError::SessionExpired)));
        assert!(!session.is_authenticated());
        assert!(session.snapshot().access_token.is_none());
        assert!(storage.get(SESSION_KEY).is_none());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_expires_without_request() {
        let server = MockServer::start().await;
        let config = config_for(&server);
        let storage = Arc::new(MemoryStorage::new());
        let raw = serde_json::json!({
            "accessToken": ACCESS_TOKEN,
            "refreshToken": null,
            "expiresAt": now_ms() - 1_000,
            "authenticated": true,
            "accountTier": "premium"
        });
        storage.set(SESSION_KEY, &raw.to_string()).unwrap();
        let session = session_manager(&config, storage);

        let err = session.valid_access_token().await.unwrap_err();

        assert!(matches!(err, AppError::SessionExpired));
        assert!(!session.is_authenticated());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}

// ============================================================================
// Persistence and login
// ============================================================================

mod persistence {
    use super::*;

    #[tokio::test]
    async fn test_session_survives_restart() {
        let server = MockServer::start().await;
        let config = config_for(&server);
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

        let first = session_manager(&config, storage.clone());
        assert!(!first.is_authenticated());
        first.set_session("access-9".into(), Some("refresh-9".into()), 3600);
        first.set_account_tier(AccountTier::Premium);

        let restored = session_manager(&config, storage);
        let snapshot = restored.snapshot();
        assert!(snapshot.authenticated);
        assert_eq!(snapshot.access_token.as_deref(), Some("access-9"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("refresh-9"));
        assert!(restored.is_premium());
        assert!(!snapshot.is_expired(now_ms()));
    }

    #[tokio::test]
    async fn test_pkce_login_sends_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .and(body_string_contains("code_verifier=verifier-1"))
            .and(body_string_contains("client_id=client-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-new",
                "refresh_token": "refresh-new",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let session = session_manager(&config, Arc::new(MemoryStorage::new()));

        session
            .login_with_code("auth-code", Some("verifier-1"))
            .await
            .unwrap();

        assert!(session.is_authenticated());
        assert_eq!(session.valid_access_token().await.unwrap(), "access-new");
    }

    #[tokio::test]
    async fn test_failed_code_exchange_surfaces_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid authorization code"
            })))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let session = session_manager(&config, Arc::new(MemoryStorage::new()));

        let err = session
            .login_with_code("bad-code", Some("verifier-1"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert!(!session.is_authenticated());
    }
}

// ============================================================================
// Authenticated requests
// ============================================================================

mod requests {
    use super::*;

    #[tokio::test]
    async fn test_unauthorized_request_refreshes_and_retries_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"status": 401, "message": "The access token expired"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/me"))
            .and(header("authorization", "Bearer access-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "user-1",
                "display_name": "Listener",
                "product": "premium"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let storage = Arc::new(MemoryStorage::new());
        seed_session(storage.as_ref(), AccountTier::Standard, 3_600_000);
        let session = session_manager(&config, storage);
        let client = spotify_client(&config, session.clone());

        let profile = client.get_current_user().await.unwrap();

        assert_eq!(profile.id, "user-1");
        assert_eq!(session.valid_access_token().await.unwrap(), "access-2");
    }

    #[tokio::test]
    async fn test_remote_error_message_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"status": 403, "message": "Premium required"}
            })))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let storage = Arc::new(MemoryStorage::new());
        seed_session(storage.as_ref(), AccountTier::Standard, 3_600_000);
        let session = session_manager(&config, storage);
        let client = spotify_client(&config, session);

        match client.get_current_user().await.unwrap_err() {
            AppError::RemoteApi { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Premium required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
