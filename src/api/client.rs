//! Authenticated HTTP client for the study planner API
//!
//! Every request carries the stored access token as a bearer credential.
//! A first-time 401 triggers one coalesced `/auth/refresh` and a single
//! replay of the original request; an unrecoverable refresh tears the
//! session down and sends the user to the login boundary.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::error::{server_message, ApiError};
use super::refresh::{RefreshCoordinator, Role};
use super::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::auth::{LoginRedirect, Session, TerminalRedirect, TokenStore, LOGIN_PATH};
use crate::config::{Config, FileTokenStore, DEFAULT_REFRESH_TIMEOUT_SECS};

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Where a request is in its retry lifecycle. Moves `First -> Retried` once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retried,
}

/// The original request plus its retry marker, threaded through the
/// response handling instead of flagging the request itself.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub request: ApiRequest,
    pub attempt: Attempt,
}

impl PendingCall {
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            attempt: Attempt::First,
        }
    }

    /// Returns `true` if this call had not been retried yet.
    pub fn mark_retried(&mut self) -> bool {
        match self.attempt {
            Attempt::First => {
                self.attempt = Attempt::Retried;
                true
            }
            Attempt::Retried => false,
        }
    }
}

/// Authenticated client. Cheap to share behind an `Arc`; all state is
/// per-instance.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Mutex<Box<dyn TokenStore>>,
    /// Bearer used when storage has no access token; updated on refresh.
    default_bearer: Mutex<Option<String>>,
    refresh: RefreshCoordinator,
    redirect: Arc<dyn LoginRedirect>,
    refresh_timeout: Duration,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Box<dyn TokenStore>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Self {
        Self {
            transport,
            store: Mutex::new(store),
            default_bearer: Mutex::new(None),
            refresh: RefreshCoordinator::new(),
            redirect,
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
        }
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Build a client from the on-disk config: reqwest transport, file-backed
    /// session, terminal login redirect.
    pub fn from_config() -> Result<Self> {
        let store = FileTokenStore::open_default()?;
        let config: Config = store.config().clone();
        let transport = HttpTransport::new(&config.api_base())?;
        Ok(Self::new(
            Arc::new(transport),
            Box::new(store),
            Arc::new(TerminalRedirect),
        )
        .with_refresh_timeout(config.refresh_timeout()))
    }

    fn lock_store(&self) -> MutexGuard<'_, Box<dyn TokenStore>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_default_bearer(&self) -> MutexGuard<'_, Option<String>> {
        self.default_bearer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock_store().get_access_token()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.lock_store().get_refresh_token()
    }

    #[cfg(test)]
    pub fn refresh_in_progress(&self) -> bool {
        self.refresh.is_refreshing()
    }

    /// Replace the stored session and the default bearer.
    pub fn store_session(&self, session: &Session) {
        {
            let mut store = self.lock_store();
            store.set_session(session);
            if let Err(e) = store.persist() {
                tracing::warn!("Failed to persist session: {:#}", e);
            }
        }
        *self.lock_default_bearer() = Some(session.access_token.clone());
    }

    /// Forget both tokens and the default bearer.
    pub fn clear_session(&self) {
        {
            let mut store = self.lock_store();
            store.clear_tokens();
            if let Err(e) = store.persist() {
                tracing::warn!("Failed to persist session removal: {:#}", e);
            }
        }
        *self.lock_default_bearer() = None;
    }

    pub fn redirect_to_login(&self) {
        self.redirect.redirect_to_login(LOGIN_PATH);
    }

    /// Request interceptor: stored access token first, default bearer second.
    fn current_bearer(&self) -> Option<String> {
        self.access_token()
            .or_else(|| self.lock_default_bearer().clone())
    }

    async fn dispatch(
        &self,
        call: &PendingCall,
        bearer: Option<String>,
    ) -> Result<ApiResponse, ApiError> {
        let request = call.request.clone().with_bearer(bearer);
        self.transport.send(&request).await
    }

    /// Issue a request, recovering from one expired access token.
    ///
    /// Non-2xx statuses come back as `Err`; only a first-time 401 is handled
    /// here, everything else is surfaced unchanged.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut call = PendingCall::new(request);

        let response = self.dispatch(&call, self.current_bearer()).await?;
        if response.status != StatusCode::UNAUTHORIZED || !call.mark_retried() {
            return classify(&call.request.path, response);
        }

        tracing::debug!("401 on {}, recovering session", call.request.path);
        let token = self.recover_session().await?;

        // A second 401 here is final: the call is already marked retried.
        let response = self.dispatch(&call, Some(token)).await?;
        classify(&call.request.path, response)
    }

    /// Single attempt with the current bearer; a 401 is returned as-is.
    pub async fn execute_once(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let call = PendingCall::new(request);
        let response = self.dispatch(&call, self.current_bearer()).await?;
        classify(&call.request.path, response)
    }

    /// Single attempt with no credential, for `/auth/login` and `/auth/register`.
    /// Bad credentials must not be mistaken for an expired session.
    pub async fn send_unauthenticated(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let call = PendingCall::new(request);
        let response = self.dispatch(&call, None).await?;
        classify(&call.request.path, response)
    }

    /// `execute` and deserialize the JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        self.execute(request).await?.json(&path)
    }

    /// Obtain a fresh access token, either by leading the refresh or by
    /// waiting on the one already in flight.
    async fn recover_session(&self) -> Result<String, ApiError> {
        let guard = match self.refresh.begin() {
            Role::Waiter(ticket) => return ticket.wait().await,
            Role::Leader(guard) => guard,
        };

        let refresh = tokio::time::timeout(self.refresh_timeout, self.refresh_tokens());
        let outcome = match refresh.await {
            Ok(result) => result,
            Err(_) => Err(ApiError::RefreshTimeout(self.refresh_timeout)),
        };

        match outcome {
            Ok(session) => {
                self.store_session(&session);
                let resumed = guard.settle(Ok(session.access_token.clone()));
                tracing::info!("Session refreshed ({} queued request(s) resumed)", resumed);
                Ok(session.access_token)
            }
            Err(e) => {
                tracing::warn!("Session refresh failed: {}", e);
                self.clear_session();
                let rejected = guard.settle(Err(e.clone()));
                if rejected > 0 {
                    tracing::debug!("Rejected {} queued request(s)", rejected);
                }
                self.redirect_to_login();
                Err(e)
            }
        }
    }

    /// Exchange the stored refresh token. Bypasses the interceptors.
    async fn refresh_tokens(&self) -> Result<Session, ApiError> {
        let refresh_token = self
            .refresh_token()
            .ok_or(ApiError::Unauthenticated)?;

        tracing::info!("Refreshing access token...");
        let request = ApiRequest::post(REFRESH_PATH)
            .json(serde_json::json!({ "refresh_token": refresh_token }));

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;

        if !response.status.is_success() {
            return Err(ApiError::RefreshFailed(format!(
                "HTTP {}: {}",
                response.status.as_u16(),
                server_message(&response.body)
            )));
        }

        response
            .json::<Session>(REFRESH_PATH)
            .map_err(|e| ApiError::RefreshFailed(e.to_string()))
    }
}

/// Turn a raw response into the caller-facing result.
fn classify(path: &str, response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.status.is_success() {
        return Ok(response);
    }
    let message = server_message(&response.body);
    if response.status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized {
            path: path.to_string(),
            message,
        });
    }
    Err(ApiError::Status {
        status: response.status.as_u16(),
        path: path.to_string(),
        message,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use async_trait::async_trait;
    use futures::future::join_all;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    /// How the scripted backend answers `/auth/refresh`.
    #[derive(Clone)]
    pub(crate) enum RefreshBehavior {
        Issue(Session),
        Reject,
        NetworkError,
        Hang,
    }

    /// Backend stand-in: accepts exactly one bearer token, records every
    /// request it sees, and answers refreshes per `RefreshBehavior`.
    pub(crate) struct ScriptedTransport {
        pub log: Mutex<Vec<ApiRequest>>,
        pub valid_token: Mutex<String>,
        pub refresh: Mutex<RefreshBehavior>,
        pub refresh_delay: Duration,
        pub responses: Mutex<Vec<(String, StatusCode, String)>>,
        pub public_responses: Mutex<Vec<(String, StatusCode, String)>>,
    }

    impl ScriptedTransport {
        pub fn new(valid_token: &str, refresh: RefreshBehavior) -> Self {
            Self {
                log: Mutex::new(Vec::new()),
                valid_token: Mutex::new(valid_token.to_string()),
                refresh: Mutex::new(refresh),
                refresh_delay: Duration::from_millis(200),
                responses: Mutex::new(Vec::new()),
                public_responses: Mutex::new(Vec::new()),
            }
        }

        /// Canned body for `path`, served without checking the bearer.
        pub fn respond_public(&self, path: &str, status: StatusCode, body: &str) {
            self.public_responses
                .lock()
                .unwrap()
                .push((path.to_string(), status, body.to_string()));
        }

        /// Canned body for an authorized request to `path`.
        pub fn respond(&self, path: &str, status: StatusCode, body: &str) {
            self.responses
                .lock()
                .unwrap()
                .push((path.to_string(), status, body.to_string()));
        }

        pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.path == path)
                .cloned()
                .collect()
        }

        pub fn refresh_calls(&self) -> usize {
            self.requests_to(REFRESH_PATH).len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
            self.log.lock().unwrap().push(request.clone());

            if request.path == REFRESH_PATH {
                tokio::time::sleep(self.refresh_delay).await;
                let behavior = self.refresh.lock().unwrap().clone();
                return match behavior {
                    RefreshBehavior::Issue(session) => {
                        *self.valid_token.lock().unwrap() = session.access_token.clone();
                        Ok(ApiResponse::new(
                            StatusCode::OK,
                            serde_json::to_string(&session).unwrap(),
                        ))
                    }
                    RefreshBehavior::Reject => Ok(ApiResponse::new(
                        StatusCode::UNAUTHORIZED,
                        r#"{"msg":"Invalid refresh token"}"#,
                    )),
                    RefreshBehavior::NetworkError => {
                        Err(ApiError::Network("connection reset by peer".into()))
                    }
                    RefreshBehavior::Hang => futures::future::pending().await,
                };
            }

            let public = self
                .public_responses
                .lock()
                .unwrap()
                .iter()
                .find(|(path, _, _)| *path == request.path)
                .cloned();
            if let Some((_, status, body)) = public {
                return Ok(ApiResponse::new(status, body));
            }

            if request.path == "/always-401" {
                return Ok(ApiResponse::new(
                    StatusCode::UNAUTHORIZED,
                    r#"{"msg":"Forbidden resource"}"#,
                ));
            }

            let valid = self.valid_token.lock().unwrap().clone();
            if request.bearer.as_deref() != Some(valid.as_str()) {
                return Ok(ApiResponse::new(
                    StatusCode::UNAUTHORIZED,
                    r#"{"msg":"Token has expired"}"#,
                ));
            }

            let canned = self
                .responses
                .lock()
                .unwrap()
                .iter()
                .find(|(path, _, _)| *path == request.path)
                .cloned();
            if let Some((_, status, body)) = canned {
                return Ok(ApiResponse::new(status, body));
            }

            let body = serde_json::json!({ "path": request.path, "bearer": valid });
            Ok(ApiResponse::new(StatusCode::OK, body.to_string()))
        }
    }

    #[derive(Default)]
    pub(crate) struct CountingRedirect {
        pub count: AtomicUsize,
    }

    impl LoginRedirect for CountingRedirect {
        fn redirect_to_login(&self, path: &str) {
            assert_eq!(path, LOGIN_PATH);
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn session(access: &str, refresh: &str) -> Session {
        Session {
            access_token: access.into(),
            refresh_token: refresh.into(),
        }
    }

    pub(crate) fn client_with(
        transport: &Arc<ScriptedTransport>,
        store: MemoryTokenStore,
        redirect: &Arc<CountingRedirect>,
    ) -> ApiClient {
        ApiClient::new(transport.clone(), Box::new(store), redirect.clone())
    }

    fn expired_session_fixture(
        refresh: RefreshBehavior,
    ) -> (Arc<ScriptedTransport>, Arc<CountingRedirect>, ApiClient) {
        let transport = Arc::new(ScriptedTransport::new("T0-unused", refresh));
        let redirect = Arc::new(CountingRedirect::default());
        let store = MemoryTokenStore::with_session(&session("T1", "R1"));
        let client = client_with(&transport, store, &redirect);
        (transport, redirect, client)
    }

    fn bearer_of(body: &ApiResponse) -> String {
        let value: serde_json::Value = serde_json::from_str(&body.body).unwrap();
        value["bearer"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_pending_call_marks_retried_once() {
        let mut call = PendingCall::new(ApiRequest::get("/tasks"));
        assert_eq!(call.attempt, Attempt::First);
        assert!(call.mark_retried());
        assert!(!call.mark_retried());
        assert_eq!(call.attempt, Attempt::Retried);
    }

    #[tokio::test]
    async fn test_bearer_attached_from_storage() {
        let transport = Arc::new(ScriptedTransport::new("T1", RefreshBehavior::Reject));
        let redirect = Arc::new(CountingRedirect::default());
        let client = client_with(
            &transport,
            MemoryTokenStore::with_session(&session("T1", "R1")),
            &redirect,
        );

        let resp = client.execute(ApiRequest::get("/tasks")).await.unwrap();
        assert_eq!(bearer_of(&resp), "T1");
        assert_eq!(transport.requests_to("/tasks")[0].bearer.as_deref(), Some("T1"));
        assert_eq!(transport.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_token_sends_unauthenticated() {
        let transport = Arc::new(ScriptedTransport::new("T1", RefreshBehavior::Reject));
        let redirect = Arc::new(CountingRedirect::default());
        let client = client_with(&transport, MemoryTokenStore::new(), &redirect);

        let err = client.execute(ApiRequest::get("/tasks")).await.unwrap_err();
        assert!(transport.requests_to("/tasks")[0].bearer.is_none());
        // No refresh token either: fails without a refresh call.
        assert_eq!(err, ApiError::Unauthenticated);
        assert_eq!(transport.refresh_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_401s_share_one_refresh() {
        let (transport, redirect, client) =
            expired_session_fixture(RefreshBehavior::Issue(session("T2", "R2")));

        let paths: Vec<String> = (0..5).map(|i| format!("/tasks/{}", i)).collect();
        let results = join_all(
            paths
                .iter()
                .map(|p| client.execute(ApiRequest::get(p.clone()))),
        )
        .await;

        assert_eq!(transport.refresh_calls(), 1);
        for resp in results {
            assert_eq!(bearer_of(&resp.unwrap()), "T2");
        }
        assert_eq!(client.access_token().as_deref(), Some("T2"));
        assert_eq!(client.refresh_token().as_deref(), Some("R2"));
        assert!(!client.refresh_in_progress());
        assert_eq!(redirect.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retried_request_401_is_final() {
        let (transport, redirect, client) =
            expired_session_fixture(RefreshBehavior::Issue(session("T2", "R2")));

        let err = client
            .execute(ApiRequest::get("/always-401"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ApiError::Unauthorized {
                path: "/always-401".into(),
                message: "Forbidden resource".into()
            }
        );
        assert_eq!(transport.requests_to("/always-401").len(), 2);
        assert_eq!(transport.refresh_calls(), 1);
        // The refresh itself worked, so the session survives.
        assert_eq!(client.access_token().as_deref(), Some("T2"));
        assert_eq!(redirect.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_rejection_fails_every_waiter() {
        let (transport, redirect, client) = expired_session_fixture(RefreshBehavior::Reject);

        let results = join_all(
            (0..4).map(|i| client.execute(ApiRequest::get(format!("/plans/{}", i)))),
        )
        .await;

        let expected = ApiError::RefreshFailed("HTTP 401: Invalid refresh token".into());
        for result in results {
            assert_eq!(result.unwrap_err(), expected);
        }
        assert_eq!(transport.refresh_calls(), 1);
        assert!(client.access_token().is_none());
        assert!(client.refresh_token().is_none());
        assert_eq!(redirect.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_refresh_token_skips_network() {
        let transport = Arc::new(ScriptedTransport::new(
            "T0-unused",
            RefreshBehavior::Issue(session("T2", "R2")),
        ));
        let redirect = Arc::new(CountingRedirect::default());
        let client = client_with(
            &transport,
            MemoryTokenStore::with_tokens(Some("T1"), None),
            &redirect,
        );

        let err = client.execute(ApiRequest::get("/groups")).await.unwrap_err();

        assert_eq!(err, ApiError::Unauthenticated);
        assert_eq!(transport.refresh_calls(), 0);
        assert_eq!(transport.requests_to("/groups").len(), 1);
        assert!(client.access_token().is_none());
        assert_eq!(redirect.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_caller_queues_behind_pending_refresh() {
        let (transport, _redirect, client) =
            expired_session_fixture(RefreshBehavior::Issue(session("T2", "R2")));

        let a = client.execute(ApiRequest::get("/a"));
        let b = async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert!(client.refresh_in_progress());
            client.execute(ApiRequest::get("/b")).await
        };
        let (a, b) = tokio::join!(a, b);

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(transport.refresh_calls(), 1);
        for path in ["/a", "/b"] {
            let sent = transport.requests_to(path);
            assert_eq!(sent.len(), 2, "{} should be sent once and re-sent once", path);
            assert_eq!(sent[0].bearer.as_deref(), Some("T1"));
            assert_eq!(sent[1].bearer.as_deref(), Some("T2"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_request_401_after_refresh_is_final() {
        let (transport, redirect, client) =
            expired_session_fixture(RefreshBehavior::Issue(session("T2", "R2")));

        let a = client.execute(ApiRequest::get("/a"));
        let b = async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert!(client.refresh_in_progress());
            client.execute(ApiRequest::get("/always-401")).await
        };
        let (a, b) = tokio::join!(a, b);

        assert_ok!(a);
        let err = assert_err!(b);
        assert_eq!(
            err,
            ApiError::Unauthorized {
                path: "/always-401".into(),
                message: "Forbidden resource".into()
            }
        );
        let sent = transport.requests_to("/always-401");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].bearer.as_deref(), Some("T2"));
        assert_eq!(transport.refresh_calls(), 1);
        assert!(!client.refresh_in_progress());
        assert_eq!(client.access_token().as_deref(), Some("T2"));
        assert_eq!(redirect.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_network_error_tears_down_session() {
        let (transport, redirect, client) = expired_session_fixture(RefreshBehavior::NetworkError);

        let (a, b, c) = tokio::join!(
            client.execute(ApiRequest::get("/tasks")),
            client.execute(ApiRequest::get("/plans")),
            client.execute(ApiRequest::get("/notifications")),
        );

        let expected =
            ApiError::RefreshFailed("network error: connection reset by peer".into());
        assert_eq!(a.unwrap_err(), expected);
        assert_eq!(b.unwrap_err(), expected);
        assert_eq!(c.unwrap_err(), expected);
        assert!(client.access_token().is_none());
        assert!(client.refresh_token().is_none());
        assert_eq!(redirect.count.load(Ordering::SeqCst), 1);
        assert_eq!(transport.refresh_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_request_uses_refreshed_token() {
        let (transport, _redirect, client) =
            expired_session_fixture(RefreshBehavior::Issue(session("T2", "R2")));

        client.execute(ApiRequest::get("/tasks")).await.unwrap();
        let resp = client.execute(ApiRequest::get("/groups")).await.unwrap();

        assert_eq!(bearer_of(&resp), "T2");
        assert_eq!(transport.requests_to("/groups").len(), 1);
        assert_eq!(transport.refresh_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_bearer_used_when_storage_empty() {
        let (transport, _redirect, client) =
            expired_session_fixture(RefreshBehavior::Issue(session("T2", "R2")));
        client.execute(ApiRequest::get("/tasks")).await.unwrap();

        // Storage wiped behind the client's back; default credential remains.
        client.lock_store().clear_tokens();
        client.execute(ApiRequest::get("/groups")).await.unwrap();
        assert_eq!(
            transport.requests_to("/groups")[0].bearer.as_deref(),
            Some("T2")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_refresh_times_out_and_unblocks() {
        let (transport, redirect, client) = expired_session_fixture(RefreshBehavior::Hang);
        let client = client.with_refresh_timeout(Duration::from_secs(5));

        let (a, b) = tokio::join!(
            client.execute(ApiRequest::get("/a")),
            client.execute(ApiRequest::get("/b")),
        );
        let expected = ApiError::RefreshTimeout(Duration::from_secs(5));
        assert_eq!(a.unwrap_err(), expected);
        assert_eq!(b.unwrap_err(), expected);
        assert!(!client.refresh_in_progress());
        assert_eq!(redirect.count.load(Ordering::SeqCst), 1);

        // After logging in again, a later expiry can refresh normally.
        client.store_session(&session("T1", "R1"));
        *transport.refresh.lock().unwrap() = RefreshBehavior::Issue(session("T3", "R3"));
        let resp = client.execute(ApiRequest::get("/c")).await.unwrap();
        assert_eq!(bearer_of(&resp), "T3");
        assert_eq!(transport.refresh_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_leader_releases_waiters() {
        let transport = Arc::new(ScriptedTransport::new("T0-unused", RefreshBehavior::Hang));
        let redirect = Arc::new(CountingRedirect::default());
        let client = Arc::new(
            client_with(
                &transport,
                MemoryTokenStore::with_session(&session("T1", "R1")),
                &redirect,
            )
            .with_refresh_timeout(Duration::from_secs(3600)),
        );

        let leader = {
            let client = client.clone();
            tokio::spawn(async move { client.execute(ApiRequest::get("/a")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(client.refresh_in_progress());

        let waiter = {
            let client = client.clone();
            tokio::spawn(async move { client.execute(ApiRequest::get("/b")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        let result = waiter.await.unwrap();
        assert_eq!(result.unwrap_err(), ApiError::RefreshCancelled);
        assert!(!client.refresh_in_progress());
        assert_eq!(transport.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_non_401_errors_pass_through() {
        let transport = Arc::new(ScriptedTransport::new("T1", RefreshBehavior::Reject));
        transport.respond("/tasks/99", StatusCode::NOT_FOUND, r#"{"msg":"Not found"}"#);
        let redirect = Arc::new(CountingRedirect::default());
        let client = client_with(
            &transport,
            MemoryTokenStore::with_session(&session("T1", "R1")),
            &redirect,
        );

        let err = client.execute(ApiRequest::get("/tasks/99")).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 404,
                path: "/tasks/99".into(),
                message: "Not found".into()
            }
        );
        assert_eq!(transport.requests_to("/tasks/99").len(), 1);
        assert_eq!(transport.refresh_calls(), 0);
    }
}
