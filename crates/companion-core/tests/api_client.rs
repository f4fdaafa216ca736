//! Integration tests for `ApiClient` and `DataRefresher`.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no
//! real network traffic is made.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use companion_core::cache::keys;
use companion_core::geo::{Geocoder, PlaceSuggestion};
use companion_core::models::{
    ChildDetail, ChildrenInfo, Coordinate, NewLocation, Registration, SavedLocation, UserLocationsCache,
};
use companion_core::{
    ApiClient, ApiError, CacheManager, DataRefresher, KeyValueStore, MemoryStore, RefreshOutcome,
    Session, StoreError, UserInfo,
};

struct Harness {
    store: Arc<MemoryStore>,
    cache: CacheManager,
    session: Session,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheManager::new(store.clone());
        let session = Session::new(cache.clone());
        Self {
            store,
            cache,
            session,
        }
    }

    async fn logged_in(access: &str, refresh: Option<&str>) -> Self {
        let harness = Self::new();
        harness
            .session
            .save(&UserInfo {
                access_token: Some(access.to_string()),
                refresh_token: refresh.map(str::to_string),
                ..Default::default()
            })
            .await;
        harness
    }

    fn client(&self, server: &MockServer) -> ApiClient {
        ApiClient::new(&server.uri(), self.session.clone(), Duration::from_secs(5))
            .expect("failed to build test ApiClient")
    }

    fn refresher(&self, server: &MockServer, bound: Duration) -> DataRefresher {
        DataRefresher::new(self.client(server), self.cache.clone(), bound)
    }
}

fn listing_json() -> serde_json::Value {
    json!({
        "locations": [
            {"latitude": 29.65, "longitude": -82.32},
            {"latitude": 29.66, "longitude": -82.35}
        ],
        "details": [
            {"id": 1, "title": "Home", "description": "Where we live"},
            {"id": 2, "title": "Daycare"}
        ]
    })
}

struct CountingGeocoder {
    calls: AtomicUsize,
}

#[async_trait]
impl Geocoder for CountingGeocoder {
    async fn suggestions(&self, _input: &str) -> Vec<PlaceSuggestion> {
        Vec::new()
    }

    async fn address_for(&self, coords: Coordinate) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(format!("{:.2}, {:.2}", coords.latitude, coords.longitude))
    }
}

// ---------------------------------------------------------------------------
// Bearer attachment and 401 handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_locations_sends_bearer_token() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("token-1", None).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json()))
        .expect(1)
        .mount(&server)
        .await;

    let listing = harness.client(&server).list_locations().await.expect("listing");
    assert_eq!(listing.locations.len(), 2);
    assert_eq!(listing.details[1]["title"], "Daycare");
}

#[tokio::test]
async fn unauthorized_runs_logout_hook() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("stale", None).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let logouts = Arc::new(AtomicUsize::new(0));
    let counter = logouts.clone();
    let client = harness.client(&server).with_logout_hook(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let result = client.list_locations().await;
    assert!(matches!(result, Err(ApiError::Unauthorized)), "got: {result:?}");
    assert_eq!(logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_policy_retries_once_with_new_token() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("expired", Some("refresh-1")).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({"refresh_token": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json()))
        .expect(1)
        .mount(&server)
        .await;

    let client = harness.client(&server).with_token_refresh();
    let listing = client.list_locations().await.expect("retried listing");
    assert_eq!(listing.locations.len(), 2);

    let info = harness.session.user_info().await.expect("session kept");
    assert_eq!(info.access_token.as_deref(), Some("fresh"));
    assert_eq!(info.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn refresh_policy_clears_session_when_refresh_fails() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("expired", Some("revoked")).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(403).set_body_string("refresh token revoked"))
        .mount(&server)
        .await;

    let client = harness.client(&server).with_token_refresh();
    let result = client.list_locations().await;

    assert!(matches!(result, Err(ApiError::RefreshFailed(_))), "got: {result:?}");
    assert!(harness.session.user_info().await.is_none());
}

#[tokio::test]
async fn refresh_policy_without_refresh_token_fails() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("expired", None).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = harness.client(&server).with_token_refresh().list_locations().await;
    assert!(matches!(result, Err(ApiError::RefreshFailed(_))), "got: {result:?}");
    assert!(!harness.session.is_logged_in().await);
}

// ---------------------------------------------------------------------------
// Session endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_persists_user_info() {
    let server = MockServer::start().await;
    let harness = Harness::new();

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "parent@example.com", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a",
            "refresh_token": "r",
            "number_of_children": 1,
            "children": [11]
        })))
        .mount(&server)
        .await;

    let info = harness
        .client(&server)
        .login("parent@example.com", "hunter2")
        .await
        .expect("login");
    assert_eq!(info.children, Some(vec![11]));
    assert_eq!(harness.session.access_token().await.as_deref(), Some("a"));
}

#[tokio::test]
async fn login_rejected_keeps_session_empty() {
    let server = MockServer::start().await;
    let harness = Harness::new();

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = harness.client(&server).login("x@example.com", "wrong").await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert!(harness.session.user_info().await.is_none());
}

#[tokio::test]
async fn logout_clears_session_even_if_server_fails() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", None).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    harness.client(&server).logout().await;
    assert!(!harness.session.is_logged_in().await);
}

#[tokio::test]
async fn verify_returns_stored_info_when_accepted() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("good", None).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/verify"))
        .and(header("authorization", "Bearer good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .mount(&server)
        .await;

    let info = harness.client(&server).verify().await.expect("verified");
    assert_eq!(info.access_token.as_deref(), Some("good"));
}

#[tokio::test]
async fn verify_without_session_makes_no_request() {
    let server = MockServer::start().await;
    let harness = Harness::new();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(harness.client(&server).verify().await.is_none());
}

fn registration() -> Registration {
    Registration {
        name: "Sam".to_string(),
        email: "sam@example.com".to_string(),
        password: "hunter2".to_string(),
        location: Coordinate::new(29.65, -82.32),
        children: Some(ChildrenInfo {
            number_of_children: 1,
            children_details: vec![ChildDetail {
                nickname: "Bean".to_string(),
                date_of_birth: "2021-04-02".to_string(),
            }],
        }),
    }
}

#[tokio::test]
async fn register_posts_signup_body() {
    let server = MockServer::start().await;
    let harness = Harness::new();

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({
            "name": "Sam",
            "email": "sam@example.com",
            "password": "hunter2",
            "location": {"latitude": 29.65, "longitude": -82.32},
            "children": {
                "numberOfChildren": 1,
                "childrenDetails": [{"nickname": "Bean", "date_of_birth": "2021-04-02"}]
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"message": "User registered"})))
        .expect(1)
        .mount(&server)
        .await;

    let created = harness.client(&server).register(&registration()).await.expect("register");
    assert!(created);
    // Signing up does not sign in
    assert!(!harness.session.is_logged_in().await);
}

#[tokio::test]
async fn register_rejected_is_false() {
    let server = MockServer::start().await;
    let harness = Harness::new();

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Email already exists"})))
        .mount(&server)
        .await;

    let created = harness.client(&server).register(&registration()).await.expect("register");
    assert!(!created);
}

#[tokio::test]
async fn register_server_failure_is_error() {
    let server = MockServer::start().await;
    let harness = Harness::new();

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = harness.client(&server).register(&registration()).await;
    assert!(matches!(result, Err(ApiError::ServerError { status: 503, .. })), "got: {result:?}");
}

#[tokio::test]
async fn delete_account_without_session_sends_nothing() {
    let server = MockServer::start().await;
    let harness = Harness::new();

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = harness.client(&server).delete_account().await;
    assert!(matches!(result, Err(ApiError::NotAuthenticated)), "got: {result:?}");
}

#[tokio::test]
async fn delete_account_clears_session() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", Some("r")).await;

    Mock::given(method("DELETE"))
        .and(path("/api/auth/delete-account"))
        .and(header("authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Account deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    harness.client(&server).delete_account().await.expect("delete account");
    assert!(harness.session.user_info().await.is_none());
}

#[tokio::test]
async fn delete_account_failure_keeps_session() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", None).await;

    Mock::given(method("DELETE"))
        .and(path("/api/auth/delete-account"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "Failed to delete account"})))
        .mount(&server)
        .await;

    let result = harness.client(&server).delete_account().await;
    match result {
        Err(ApiError::ServerError { message, .. }) => assert_eq!(message, "Failed to delete account"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(harness.session.is_logged_in().await);
}

// ---------------------------------------------------------------------------
// Data refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_without_token_skips_network() {
    let server = MockServer::start().await;
    let harness = Harness::new();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json()))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = harness
        .refresher(&server, Duration::from_secs(10))
        .refresh_in_background()
        .await;
    assert_eq!(outcome, RefreshOutcome::Skipped);
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn refresh_persists_listing() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", None).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json()))
        .mount(&server)
        .await;

    let outcome = harness
        .refresher(&server, Duration::from_secs(10))
        .refresh_in_background()
        .await;
    assert_eq!(outcome, RefreshOutcome::Refreshed);

    let cached: UserLocationsCache = harness
        .cache
        .load(keys::USER_LOCATIONS_CACHE)
        .await
        .expect("listing cached");
    assert_eq!(cached.locations[0], Coordinate::new(29.65, -82.32));
    assert_eq!(cached.details.len(), 2);
}

#[tokio::test]
async fn refresh_server_error_counts_as_failed() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", None).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let outcome = harness
        .refresher(&server, Duration::from_secs(10))
        .refresh_in_background()
        .await;
    assert_eq!(outcome, RefreshOutcome::Failed);
    assert!(harness.store.get(keys::USER_LOCATIONS_CACHE).await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_malformed_listing_counts_as_failed() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", None).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"locations": "nope"})))
        .mount(&server)
        .await;

    let outcome = harness
        .refresher(&server, Duration::from_secs(10))
        .refresh_in_background()
        .await;
    assert_eq!(outcome, RefreshOutcome::Failed);
}

/// Memory store that refuses writes to one key.
struct ReadOnlyKey {
    inner: MemoryStore,
    key: &'static str,
}

#[async_trait]
impl KeyValueStore for ReadOnlyKey {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key == self.key {
            return Err(StoreError::Unavailable("quota exceeded".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }
}

#[tokio::test]
async fn refresh_counts_success_when_cache_write_fails() {
    let server = MockServer::start().await;
    let store = Arc::new(ReadOnlyKey {
        inner: MemoryStore::new(),
        key: keys::USER_LOCATIONS_CACHE,
    });
    let cache = CacheManager::new(store.clone());
    let session = Session::new(cache.clone());
    session
        .save(&UserInfo {
            access_token: Some("t".to_string()),
            ..Default::default()
        })
        .await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json()))
        .expect(1)
        .mount(&server)
        .await;

    let api = ApiClient::new(&server.uri(), session, Duration::from_secs(5)).unwrap();
    let outcome = DataRefresher::new(api, cache, Duration::from_secs(10))
        .refresh_in_background()
        .await;

    assert_eq!(outcome, RefreshOutcome::Refreshed);
    assert!(store.get(keys::USER_LOCATIONS_CACHE).await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_stalled_server_fails_within_bound() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", None).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(listing_json())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let outcome = harness
        .refresher(&server, Duration::from_millis(200))
        .refresh_in_background()
        .await;

    assert_eq!(outcome, RefreshOutcome::Failed);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(harness.store.get(keys::USER_LOCATIONS_CACHE).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Saved locations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_saved_locations_merges_and_replaces_cache() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", None).await;
    harness
        .store
        .set(keys::SAVED_LOCATIONS, r#"[{"id":99,"title":"Old","description":"","latitude":0,"longitude":0,"address":null}]"#)
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json()))
        .mount(&server)
        .await;

    let geocoder = CountingGeocoder {
        calls: AtomicUsize::new(0),
    };
    let merged = harness
        .refresher(&server, Duration::from_secs(10))
        .fetch_saved_locations(&geocoder)
        .await
        .expect("merged list");

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].id, 1);
    assert_eq!(merged[0].description, "Where we live");
    assert_eq!(merged[1].description, "");
    assert_eq!(merged[1].address.as_deref(), Some("29.66, -82.35"));
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);

    let cached: Vec<SavedLocation> = harness.cache.load(keys::SAVED_LOCATIONS).await.unwrap();
    assert_eq!(cached, merged);
}

#[tokio::test]
async fn fetch_saved_locations_rejects_mismatched_halves() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", None).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "locations": [{"latitude": 1.0, "longitude": 2.0}],
            "details": []
        })))
        .mount(&server)
        .await;

    let geocoder = CountingGeocoder {
        calls: AtomicUsize::new(0),
    };
    let merged = harness
        .refresher(&server, Duration::from_secs(10))
        .fetch_saved_locations(&geocoder)
        .await;
    assert!(merged.is_none());
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn add_location_triggers_refresh() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", None).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/addLocation"))
        .and(body_json(json!({
            "latitude": 29.7,
            "longitude": -82.4,
            "name": "Grandma",
            "description": "Sunday visits",
            "type": "family"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Location added successfully"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/endpoint/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json()))
        .expect(1)
        .mount(&server)
        .await;

    let added = harness
        .refresher(&server, Duration::from_secs(10))
        .add_location(&NewLocation {
            latitude: 29.7,
            longitude: -82.4,
            name: "Grandma".to_string(),
            description: "Sunday visits".to_string(),
            location_type: "family".to_string(),
        })
        .await;

    assert!(added);
    assert!(harness.store.get(keys::USER_LOCATIONS_CACHE).await.unwrap().is_some());
}

#[tokio::test]
async fn add_location_unconfirmed_is_false() {
    let server = MockServer::start().await;
    let harness = Harness::logged_in("t", None).await;

    Mock::given(method("POST"))
        .and(path("/endpoint/addLocation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Duplicate"})))
        .mount(&server)
        .await;

    let added = harness
        .refresher(&server, Duration::from_secs(10))
        .add_location(&NewLocation {
            latitude: 0.0,
            longitude: 0.0,
            name: "Dup".to_string(),
            description: String::new(),
            location_type: "other".to_string(),
        })
        .await;
    assert!(!added);
}
