mod common;

use common::*;
use spotiplayer::device::{ActivationOutcome, DeviceResolver};
use spotiplayer::events::{event_bus, PlayerEvent};
use spotiplayer::session::AccountTier;
use spotiplayer::storage::{MemoryStorage, Storage, DEVICE_ACTIVATED_AT_KEY, DEVICE_ID_KEY};
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    server: MockServer,
    storage: Arc<MemoryStorage>,
    resolver: DeviceResolver,
    events: spotiplayer::events::EventReceiver,
}

async fn fixture() -> Fixture {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let storage = Arc::new(MemoryStorage::new());
    seed_session(storage.as_ref(), AccountTier::Premium, 3_600_000);

    let session = session_manager(&config, storage.clone());
    let client = spotify_client(&config, session);
    let events = event_bus();
    let receiver = events.subscribe();
    let resolver = DeviceResolver::new(client, storage.clone(), 300, events);

    Fixture {
        server,
        storage,
        resolver,
        events: receiver,
    }
}

async fn mount_transfer(server: &MockServer, status: u16, times: u64) {
    Mock::given(method("PUT"))
        .and(path("/v1/me/player"))
        .and(body_json(serde_json::json!({
            "device_ids": [DEVICE_ID],
            "play": false
        })))
        .respond_with(ResponseTemplate::new(status))
        .expect(times)
        .mount(server)
        .await;
}

// ============================================================================
// Activation cooldown
// ============================================================================

mod activation {
    use super::*;

    #[tokio::test]
    async fn test_ready_twice_within_cooldown_transfers_once() {
        let mut f = fixture().await;
        mount_transfer(&f.server, 204, 1).await;

        let first = f.resolver.on_device_ready(DEVICE_ID).await;
        let second = f.resolver.on_device_ready(DEVICE_ID).await;

        assert_eq!(first, ActivationOutcome::Activated);
        assert_eq!(second, ActivationOutcome::Skipped);
        assert!(second.is_success());
        assert_eq!(f.resolver.current_device_id().as_deref(), Some(DEVICE_ID));
        assert_eq!(
            f.storage.get(DEVICE_ID_KEY).as_deref(),
            Some(DEVICE_ID)
        );
        assert!(f.storage.get(DEVICE_ACTIVATED_AT_KEY).is_some());

        match f.events.try_recv().unwrap() {
            PlayerEvent::DeviceReady { device_id } => assert_eq!(device_id, DEVICE_ID),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_ready_events_transfer_once() {
        let f = fixture().await;
        mount_transfer(&f.server, 204, 1).await;

        let (a, b) = tokio::join!(
            f.resolver.on_device_ready(DEVICE_ID),
            f.resolver.on_device_ready(DEVICE_ID)
        );

        let mut outcomes = vec![a, b];
        outcomes.sort_by_key(|o| format!("{o:?}"));
        assert_eq!(
            outcomes,
            vec![ActivationOutcome::Activated, ActivationOutcome::Skipped]
        );
    }

    #[tokio::test]
    async fn test_rate_limit_counts_as_activation() {
        let f = fixture().await;
        mount_transfer(&f.server, 429, 1).await;

        let first = f.resolver.activate(DEVICE_ID).await;
        let second = f.resolver.activate(DEVICE_ID).await;

        assert_eq!(first, ActivationOutcome::RateLimited);
        assert!(first.is_success());
        assert_eq!(second, ActivationOutcome::Skipped);
        assert!(f.resolver.last_activated_at().is_some());
    }

    #[tokio::test]
    async fn test_hard_failure_allows_retry() {
        let f = fixture().await;
        mount_transfer(&f.server, 500, 2).await;

        let first = f.resolver.activate(DEVICE_ID).await;
        let second = f.resolver.activate(DEVICE_ID).await;

        assert_eq!(first, ActivationOutcome::Failed);
        assert!(!first.is_success());
        assert_eq!(second, ActivationOutcome::Failed);
        assert!(f.resolver.last_activated_at().is_none());
    }
}

// ============================================================================
// Persistence
// ============================================================================

mod persistence {
    use super::*;

    #[tokio::test]
    async fn test_restored_activation_time_keeps_cooldown() {
        let f = fixture().await;
        f.storage.set(DEVICE_ID_KEY, DEVICE_ID).unwrap();
        f.storage
            .set(DEVICE_ACTIVATED_AT_KEY, &now_ms().to_string())
            .unwrap();

        let config = config_for(&f.server);
        let session = session_manager(&config, f.storage.clone());
        let resolver = DeviceResolver::new(
            spotify_client(&config, session),
            f.storage.clone(),
            300,
            event_bus(),
        );

        assert_eq!(resolver.current_device_id().as_deref(), Some(DEVICE_ID));
        assert_eq!(resolver.activate(DEVICE_ID).await, ActivationOutcome::Skipped);
        assert!(f.server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forget_clears_device() {
        let f = fixture().await;
        mount_transfer(&f.server, 204, 1).await;
        f.resolver.on_device_ready(DEVICE_ID).await;

        f.resolver.forget();

        assert!(f.resolver.current_device_id().is_none());
        assert!(f.resolver.last_activated_at().is_none());
        assert!(f.storage.get(DEVICE_ID_KEY).is_none());
        assert!(f.storage.get(DEVICE_ACTIVATED_AT_KEY).is_none());
    }
}
