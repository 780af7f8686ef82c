//! HTTP client for the orchestration control plane.

use std::time::Duration;

use deck_protocol::{
    decode_list, Agent, CreateAgentRequest, CreateTaskRequest, DashboardStats, MemoryEntry,
    MemoryWriteRequest, MutationAck, NodeDetail, Task, AUTH_HEADER, REQUEST_ID_HEADER,
};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::SharedCache;
use crate::config::ServerConfig;
use crate::error::ClientError;
use crate::token::AdminToken;

pub const AGENTS_PATH: &str = "/api/agents";
pub const TASKS_PATH: &str = "/api/tasks";
pub const MEMORIES_PATH: &str = "/api/memories";
pub const GRAPH_PATH: &str = "/api/graph-data";
pub const NODE_DETAILS_PATH: &str = "/api/node-details";

/// Error bodies longer than this are cut before they reach the UI.
const MAX_ERROR_BODY: usize = 200;

/// Client bound to one configured server. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    server_id: String,
    base_url: Url,
    token: Option<AdminToken>,
    cache: SharedCache,
}

impl ApiClient {
    pub fn new(
        server: &ServerConfig,
        timeout: Duration,
        cache: SharedCache,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(&server.url).map_err(|e| {
            ClientError::Config(format!("invalid url '{}' for server '{}': {e}", server.url, server.id))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "url '{}' for server '{}' cannot be used as a base",
                server.url, server.id
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("agentdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            server_id: server.id.clone(),
            base_url,
            token: server.admin_token.clone(),
            cache,
        })
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    // ── reads ──

    pub async fn list_agents(&self, force: bool) -> Result<Vec<Agent>, ClientError> {
        self.get_list(AGENTS_PATH, "agents", force).await
    }

    pub async fn list_tasks(&self, force: bool) -> Result<Vec<Task>, ClientError> {
        self.get_list(TASKS_PATH, "tasks", force).await
    }

    pub async fn list_memories(&self, force: bool) -> Result<Vec<MemoryEntry>, ClientError> {
        self.get_list(MEMORIES_PATH, "memories", force).await
    }

    /// Raw graph payload. Validation happens in the graph view so a bad
    /// snapshot can be skipped without failing the fetch.
    pub async fn graph_data(&self, force: bool) -> Result<Value, ClientError> {
        let url = self.url(GRAPH_PATH, &[])?;
        self.get_json(url, force).await
    }

    pub async fn node_details(&self, node_id: &str) -> Result<NodeDetail, ClientError> {
        let mut url = self.url(NODE_DETAILS_PATH, &[])?;
        url.query_pairs_mut().append_pair("node_id", node_id);
        let path = request_path(&url);
        let payload = self.get_json(url, false).await?;
        decode_value(&path, payload)
    }

    /// Counts derived from the three list endpoints, fetched concurrently.
    pub async fn stats(&self, force: bool) -> Result<DashboardStats, ClientError> {
        let (agents, tasks, memories) = futures_util::future::try_join3(
            self.list_agents(force),
            self.list_tasks(force),
            self.list_memories(force),
        )
        .await?;
        Ok(DashboardStats::from_lists(&agents, &tasks, &memories))
    }

    // ── mutations ──

    pub async fn create_agent(&self, req: &CreateAgentRequest) -> Result<MutationAck, ClientError> {
        let url = self.url(AGENTS_PATH, &[])?;
        self.mutate(Method::POST, url, Some(req), &[AGENTS_PATH, GRAPH_PATH])
            .await
    }

    pub async fn terminate_agent(&self, agent_id: &str) -> Result<MutationAck, ClientError> {
        let url = self.url(AGENTS_PATH, &[agent_id])?;
        self.mutate::<()>(Method::DELETE, url, None, &[AGENTS_PATH, TASKS_PATH, GRAPH_PATH])
            .await
    }

    pub async fn create_task(&self, req: &CreateTaskRequest) -> Result<MutationAck, ClientError> {
        let url = self.url(TASKS_PATH, &[])?;
        self.mutate(Method::POST, url, Some(req), &[TASKS_PATH, GRAPH_PATH])
            .await
    }

    pub async fn create_memory(&self, req: &MemoryWriteRequest) -> Result<MutationAck, ClientError> {
        let url = self.url(MEMORIES_PATH, &[])?;
        self.mutate(Method::POST, url, Some(req), &[MEMORIES_PATH, GRAPH_PATH])
            .await
    }

    pub async fn update_memory(&self, req: &MemoryWriteRequest) -> Result<MutationAck, ClientError> {
        let url = self.url(MEMORIES_PATH, &[req.context_key.as_str()])?;
        self.mutate(Method::PUT, url, Some(req), &[MEMORIES_PATH, GRAPH_PATH])
            .await
    }

    pub async fn delete_memory(&self, key: &str) -> Result<MutationAck, ClientError> {
        let url = self.url(MEMORIES_PATH, &[key])?;
        self.mutate::<()>(Method::DELETE, url, None, &[MEMORIES_PATH, GRAPH_PATH])
            .await
    }

    /// Forget cached responses for this server.
    pub fn invalidate_all(&self) -> usize {
        let server = self.server_id.clone();
        self.lock_cache()
            .invalidate_where(|(sid, _)| *sid == server)
    }

    // ── plumbing ──

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &'static str,
        key: &'static str,
        force: bool,
    ) -> Result<Vec<T>, ClientError> {
        let url = self.url(path, &[])?;
        let payload = self.get_json(url, force).await?;
        decode_list(&payload, key).map_err(|e| ClientError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// GET with the shared cache in front. `force` skips the lookup but
    /// still stores the fresh response.
    async fn get_json(&self, url: Url, force: bool) -> Result<Value, ClientError> {
        let key = (self.server_id.clone(), request_path(&url));
        let cached = if force { None } else { self.lock_cache().get(&key) };
        if let Some(hit) = cached {
            tracing::trace!(server = %self.server_id, path = %key.1, "Cache hit");
            return Ok(hit);
        }

        let request = self.http.get(url.clone());
        let (_, body) = self.send(Method::GET, &url, request).await?;
        let payload: Value = serde_json::from_slice(&body).map_err(|e| ClientError::Decode {
            path: key.1.clone(),
            reason: e.to_string(),
        })?;
        self.lock_cache().insert(key, payload.clone());
        Ok(payload)
    }

    async fn mutate<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        invalidates: &[&str],
    ) -> Result<MutationAck, ClientError> {
        let token = self.token.as_ref().ok_or_else(|| ClientError::MissingToken {
            server: self.server_id.clone(),
        })?;
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(AUTH_HEADER, token.bearer());
        if let Some(body) = body {
            request = request.json(body);
        }
        let result = self.send(method.clone(), &url, request).await;

        // The backend may have applied the change even if the response
        // was lost, so drop cached views either way.
        self.invalidate_paths(invalidates);

        let (status, body) = result?;
        let ack = parse_ack(&body);
        if !ack.succeeded() {
            return Err(ClientError::Status {
                method: method.to_string(),
                path: request_path(&url),
                status,
                body: ack.message.unwrap_or_else(|| "request was not accepted".into()),
            });
        }
        tracing::info!(
            server = %self.server_id,
            method = %method,
            path = %request_path(&url),
            "Mutation accepted"
        );
        Ok(ack)
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<(u16, Vec<u8>), ClientError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = std::time::Instant::now();
        let response = request
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await
            .map_err(|source| ClientError::Network {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Network {
                url: url.to_string(),
                source,
            })?;
        tracing::debug!(
            server = %self.server_id,
            %method,
            path = %request_path(url),
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            request_id = %request_id,
            "Request finished"
        );
        if !status.is_success() {
            return Err(ClientError::Status {
                method: method.to_string(),
                path: request_path(url),
                status: status.as_u16(),
                body: truncate(String::from_utf8_lossy(&body).trim(), MAX_ERROR_BODY),
            });
        }
        Ok((status.as_u16(), body.to_vec()))
    }

    /// `base + path`, with each extra segment percent-encoded.
    fn url(&self, path: &str, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        {
            let mut parts = url.path_segments_mut().map_err(|_| {
                ClientError::Config(format!("url '{}' cannot be a base", self.base_url))
            })?;
            parts.pop_if_empty();
            parts.extend(path.split('/').filter(|s| !s.is_empty()));
            parts.extend(segments);
        }
        Ok(url)
    }

    fn invalidate_paths(&self, paths: &[&str]) {
        let mut cache = self.lock_cache();
        let removed = cache.invalidate_where(|(sid, path)| {
            *sid == self.server_id
                && (path.contains(NODE_DETAILS_PATH)
                    || paths.iter().any(|p| path.ends_with(p)))
        });
        if removed > 0 {
            tracing::debug!(server = %self.server_id, removed, "Invalidated cached responses");
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, crate::cache::TtlCache<crate::cache::CacheKey, Value>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Path plus query, used as the cache key and in logs.
fn request_path(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

fn decode_value<T: DeserializeOwned>(path: &str, payload: Value) -> Result<T, ClientError> {
    serde_json::from_value(payload).map_err(|e| ClientError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Mutation bodies vary: empty, a JSON object, or plain text.
fn parse_ack(body: &[u8]) -> MutationAck {
    if body.iter().all(u8::is_ascii_whitespace) {
        return MutationAck::default();
    }
    match serde_json::from_slice::<MutationAck>(body) {
        Ok(ack) => ack,
        Err(_) => MutationAck {
            message: Some(truncate(String::from_utf8_lossy(body).trim(), MAX_ERROR_BODY)),
            ..MutationAck::default()
        },
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}
