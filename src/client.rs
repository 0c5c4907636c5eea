use std::fmt;

use reqwest::header::{HeaderName, HeaderValue};
use serde_json::Value as JsonValue;

use crate::{
    executor::{parse_json, parse_text, ApiRequest},
    retry::{Sleeper, TokioSleeper},
    transport::{header_value, ReqwestTransport, Transport},
    wire::{MarkDone, Track, TrackAction},
    Category, ClientOptions, Goal, Habit, HabitUpdate, Kudos, Label, MarvinError, NewProject,
    NewTask, Profile, Reminder, RequestExecutor, Result, Task, TimeBlock, TrackResult,
    TrackedItem,
};

/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://serv.amazingmarvin.com/api";

/// Header required by endpoints that touch raw documents.
pub const FULL_ACCESS_TOKEN_HEADER: &str = "x-full-access-token";

/// Appends a form-encoded query string to an endpoint path.
pub fn endpoint_with_query(path: &str, pairs: &[(&str, &str)]) -> String {
    if pairs.is_empty() {
        return path.to_owned();
    }
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{path}?{query}")
}

#[derive(Clone)]
/// Typed client for the Amazing Marvin HTTP API.
pub struct MarvinClient<T = ReqwestTransport, S = TokioSleeper> {
    executor: RequestExecutor<T, S>,
    full_access_token: Option<HeaderValue>,
}

impl<T, S> fmt::Debug for MarvinClient<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarvinClient")
            .field("executor", &self.executor)
            .field(
                "full_access_token",
                &self.full_access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl MarvinClient {
    /// Creates a client for the public API with default options.
    pub fn new(api_token: impl AsRef<str>) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, api_token)
    }

    /// Creates a client for a custom API root (proxies, test servers).
    pub fn with_base_url(base_url: impl Into<String>, api_token: impl AsRef<str>) -> Result<Self> {
        let executor = RequestExecutor::new(base_url, api_token, ClientOptions::default())?;
        Ok(Self::from_executor(executor))
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `MARVIN_API_TOKEN` — API token (required)
    /// - `MARVIN_FULL_ACCESS_TOKEN` — full-access token (optional)
    /// - `MARVIN_BASE_URL` — API root (optional, defaults to [`DEFAULT_BASE_URL`])
    ///
    /// # Example
    ///
    /// ```no_run
    /// use marvin_http::MarvinClient;
    ///
    /// let marvin = MarvinClient::from_env().expect("missing MARVIN_API_TOKEN");
    /// ```
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("MARVIN_API_TOKEN").map_err(|_| {
            MarvinError::Config("missing MARVIN_API_TOKEN environment variable".to_owned())
        })?;
        if token.trim().is_empty() {
            return Err(MarvinError::Config(
                "MARVIN_API_TOKEN is set but empty".to_owned(),
            ));
        }

        let base_url = match std::env::var("MARVIN_BASE_URL") {
            Ok(url) if url.trim().is_empty() => {
                return Err(MarvinError::Config(
                    "MARVIN_BASE_URL is set but empty".to_owned(),
                ))
            }
            Ok(url) => url,
            Err(_) => DEFAULT_BASE_URL.to_owned(),
        };

        let client = Self::with_base_url(base_url, token)?;
        match std::env::var("MARVIN_FULL_ACCESS_TOKEN") {
            Ok(full) if !full.trim().is_empty() => client.with_full_access_token(full),
            _ => Ok(client),
        }
    }
}

impl<T, S> MarvinClient<T, S> {
    /// Wraps an already configured executor.
    pub fn from_executor(executor: RequestExecutor<T, S>) -> Self {
        Self {
            executor,
            full_access_token: None,
        }
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(self, opts: ClientOptions) -> Result<Self> {
        Ok(Self {
            executor: self.executor.with_options(opts)?,
            full_access_token: self.full_access_token,
        })
    }

    /// Enables endpoints that need the full-access token.
    pub fn with_full_access_token(mut self, token: impl AsRef<str>) -> Result<Self> {
        let mut value = header_value("full access token", token.as_ref())?;
        value.set_sensitive(true);
        self.full_access_token = Some(value);
        Ok(self)
    }

    /// Swaps the transport, e.g. for a scripted fake in tests.
    pub fn with_transport<T2>(self, transport: T2) -> MarvinClient<T2, S> {
        MarvinClient {
            executor: self.executor.with_transport(transport),
            full_access_token: self.full_access_token,
        }
    }

    pub fn with_sleeper<S2>(self, sleeper: S2) -> MarvinClient<T, S2> {
        MarvinClient {
            executor: self.executor.with_sleeper(sleeper),
            full_access_token: self.full_access_token,
        }
    }

    /// Generic entry points for endpoints without a dedicated method.
    pub fn executor(&self) -> &RequestExecutor<T, S> {
        &self.executor
    }
}

impl<T: Transport, S: Sleeper> MarvinClient<T, S> {
    /// Checks that the API token is accepted.
    pub async fn test_credentials(&self) -> Result<bool> {
        let body = self
            .executor
            .request(ApiRequest::post("/test"), parse_text)
            .await?;
        Ok(body.trim() == "OK")
    }

    pub async fn me(&self) -> Result<Profile> {
        self.executor.get("/me").await
    }

    /// Tasks and projects scheduled for `date` (`YYYY-MM-DD`), today if `None`.
    pub async fn today_items(&self, date: Option<&str>) -> Result<Vec<Task>> {
        let pairs: Vec<(&str, &str)> = date.map(|d| ("date", d)).into_iter().collect();
        self.executor
            .get(&endpoint_with_query("/todayItems", &pairs))
            .await
    }

    /// Open items due on or before `by` (`YYYY-MM-DD`), today if `None`.
    pub async fn due_items(&self, by: Option<&str>) -> Result<Vec<Task>> {
        let pairs: Vec<(&str, &str)> = by.map(|d| ("by", d)).into_iter().collect();
        self.executor
            .get(&endpoint_with_query("/dueItems", &pairs))
            .await
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.executor.get("/categories").await
    }

    pub async fn labels(&self) -> Result<Vec<Label>> {
        self.executor.get("/labels").await
    }

    pub async fn children(&self, parent_id: &str) -> Result<Vec<Task>> {
        self.executor
            .get(&endpoint_with_query("/children", &[("parentId", parent_id)]))
            .await
    }

    pub async fn add_task(&self, task: &NewTask) -> Result<Task> {
        self.executor.post("/addTask", task).await
    }

    pub async fn add_project(&self, project: &NewProject) -> Result<Category> {
        self.executor.post("/addProject", project).await
    }

    /// Marks an item done. `time_zone_offset` is minutes west of UTC.
    pub async fn mark_done(&self, item_id: &str, time_zone_offset: i32) -> Result<Task> {
        let body = MarkDone {
            item_id,
            time_zone_offset,
        };
        self.executor.post("/markDone", &body).await
    }

    /// The task currently being time-tracked, if any.
    pub async fn tracked_item(&self) -> Result<Option<TrackedItem>> {
        self.executor.get("/trackedItem").await
    }

    pub async fn start_tracking(&self, task_id: &str) -> Result<TrackResult> {
        self.track(task_id, TrackAction::Start).await
    }

    pub async fn stop_tracking(&self, task_id: &str) -> Result<TrackResult> {
        self.track(task_id, TrackAction::Stop).await
    }

    async fn track(&self, task_id: &str, action: TrackAction) -> Result<TrackResult> {
        let body = Track { task_id, action };
        self.executor.post("/track", &body).await
    }

    pub async fn habits(&self) -> Result<Vec<Habit>> {
        self.executor.get("/habits").await
    }

    pub async fn habit(&self, habit_id: &str) -> Result<Habit> {
        self.executor
            .get(&endpoint_with_query("/habit", &[("id", habit_id)]))
            .await
    }

    pub async fn record_habit(&self, update: &HabitUpdate) -> Result<JsonValue> {
        self.executor.post("/updateHabit", update).await
    }

    pub async fn goals(&self) -> Result<Vec<Goal>> {
        self.executor.get("/goals").await
    }

    pub async fn reminders(&self) -> Result<Vec<Reminder>> {
        self.executor.get("/reminders").await
    }

    pub async fn time_blocks(&self, date: &str) -> Result<Vec<TimeBlock>> {
        self.executor
            .get(&endpoint_with_query("/timeBlocks", &[("date", date)]))
            .await
    }

    pub async fn kudos(&self) -> Result<Kudos> {
        self.executor.get("/kudos").await
    }

    /// Reads a raw document by id. Requires a full-access token.
    pub async fn doc(&self, id: &str) -> Result<JsonValue> {
        let token = self.full_access_token.clone().ok_or_else(|| {
            MarvinError::Config("doc() requires a full access token".to_owned())
        })?;
        let request = ApiRequest::get(endpoint_with_query("/doc", &[("id", id)]))
            .header(HeaderName::from_static(FULL_ACCESS_TOKEN_HEADER), token);
        self.executor.request(request, parse_json).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use reqwest::{header::HeaderMap, Method, StatusCode};
    use serde_json::{json, Value as JsonValue};

    use super::{endpoint_with_query, MarvinClient, DEFAULT_BASE_URL};
    use crate::{
        retry::Sleeper,
        transport::{HttpRequest, HttpResponse, Transport},
        ClientOptions, MarvinError, NewTask, TransportError,
    };

    /// Answers every request with the same 200 body and records it.
    struct EchoTransport {
        body: Vec<u8>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl EchoTransport {
        fn new(body: JsonValue) -> Arc<Self> {
            Self::raw(body.to_string().into_bytes())
        }

        fn raw(body: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                body,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> HttpRequest {
            self.seen.lock().unwrap().last().cloned().expect("a request was sent")
        }

        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl Transport for EchoTransport {
        fn send(
            &self,
            request: HttpRequest,
        ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
            self.seen.lock().unwrap().push(request);
            let body = self.body.clone();
            async move { Ok(HttpResponse::new(StatusCode::OK, HeaderMap::new(), body)) }
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn client(
        transport: &Arc<EchoTransport>,
    ) -> MarvinClient<Arc<EchoTransport>, NoSleep> {
        MarvinClient::with_base_url("https://marvin.test/api", "token")
            .unwrap()
            .with_transport(Arc::clone(transport))
            .with_sleeper(NoSleep)
    }

    #[test]
    fn query_values_are_form_encoded() {
        assert_eq!(endpoint_with_query("/labels", &[]), "/labels");
        assert_eq!(
            endpoint_with_query("/doc", &[("id", "a b&c")]),
            "/doc?id=a+b%26c"
        );
    }

    #[test]
    fn debug_redacts_tokens() {
        let client = MarvinClient::new("secret-token")
            .unwrap()
            .with_full_access_token("full-secret")
            .unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains(DEFAULT_BASE_URL));
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("full-secret"));
    }

    #[test]
    fn invalid_options_are_rejected() {
        let result = MarvinClient::new("token").unwrap().with_options(ClientOptions {
            retry_backoff_ms: 0,
            ..ClientOptions::default()
        });
        assert!(matches!(result, Err(MarvinError::Config(_))));
    }

    #[tokio::test]
    async fn today_items_sends_date_query() {
        let transport = EchoTransport::new(json!([{"_id": "t1", "title": "Write docs"}]));
        let marvin = client(&transport);

        let items = marvin.today_items(Some("2026-10-16")).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Write docs");
        let sent = transport.last();
        assert_eq!(sent.method, Method::GET);
        assert_eq!(sent.url, "https://marvin.test/api/todayItems?date=2026-10-16");
    }

    #[tokio::test]
    async fn add_task_posts_json_body() {
        let transport = EchoTransport::new(json!({"_id": "t9", "title": "Ship it"}));
        let marvin = client(&transport);

        let task = marvin
            .add_task(&NewTask::new("Ship it").in_project("p1"))
            .await
            .unwrap();

        assert_eq!(task.id, "t9");
        let sent = transport.last();
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.url, "https://marvin.test/api/addTask");
        let body: JsonValue = serde_json::from_slice(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"title": "Ship it", "parentId": "p1"}));
    }

    #[tokio::test]
    async fn tracking_sends_action() {
        let transport = EchoTransport::new(json!({"startId": "t1", "startTimes": [1]}));
        let marvin = client(&transport);

        let result = marvin.start_tracking("t1").await.unwrap();

        assert_eq!(result.start_id.as_deref(), Some("t1"));
        let body: JsonValue =
            serde_json::from_slice(transport.last().body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"taskId": "t1", "action": "START"}));
    }

    #[tokio::test]
    async fn tracked_item_may_be_null() {
        let transport = EchoTransport::new(JsonValue::Null);
        let marvin = client(&transport);

        assert_eq!(marvin.tracked_item().await.unwrap(), None);
    }

    #[tokio::test]
    async fn doc_requires_full_access_token() {
        let transport = EchoTransport::new(json!({}));
        let marvin = client(&transport);

        let err = marvin.doc("abc").await.expect_err("no full access token");

        assert!(matches!(err, MarvinError::Config(_)));
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn doc_sends_full_access_header() {
        let transport = EchoTransport::new(json!({"_id": "abc", "db": "Tasks"}));
        let marvin = client(&transport).with_full_access_token("full").unwrap();

        let doc = marvin.doc("abc").await.unwrap();

        assert_eq!(doc["db"], "Tasks");
        let sent = transport.last();
        assert_eq!(sent.url, "https://marvin.test/api/doc?id=abc");
        assert_eq!(sent.headers.get("x-full-access-token").unwrap(), "full");
        assert_eq!(sent.headers.get("x-api-token").unwrap(), "token");
    }

    #[tokio::test]
    async fn test_credentials_reads_text_body() {
        let transport = EchoTransport::raw(b"OK\n".to_vec());
        let marvin = client(&transport);

        assert!(marvin.test_credentials().await.unwrap());
        let sent = transport.last();
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.url, "https://marvin.test/api/test");
        assert!(sent.body.is_none());
    }
}
