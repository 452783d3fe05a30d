//! Backend REST collaborator
//!
//! [`Backend`] is the seam every HTTP call goes through; [`HttpBackend`] is the reqwest
//! implementation. The App never awaits a call itself. It queues an [`ApiRequest`] and
//! [`run_api_worker`] reports the outcome back as an [`AppEvent`].

use crate::new_txn::NewTransaction;
use crate::types::{Action, AppEvent, OtpVerdict, Stats, Transaction, Trigger};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Operator-facing reason. Backend `{"error": ...}` bodies are unwrapped.
    pub fn reason(&self) -> String {
        match self {
            ApiError::Status { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .or_else(|| v.get("detail"))
                        .and_then(|e| e.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| self.to_string()),
            other => other.to_string(),
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn stats(&self) -> Result<Stats, ApiError>;
    async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, ApiError>;
    /// Returns the new streaming flag
    async fn stream_control(&self, start: bool, interval_secs: f64) -> Result<bool, ApiError>;
    /// Demo helpers; resulting events arrive through the stream
    async fn trigger(&self, trigger: Trigger) -> Result<(), ApiError>;
    async fn submit_transaction(&self, body: &NewTransaction) -> Result<(), ApiError>;
    /// Manual override; returns the backend's message
    async fn set_action(&self, transaction_id: &str, action: Action) -> Result<String, ApiError>;
    async fn verify_otp(&self, transaction_id: &str, otp: &str) -> Result<OtpVerdict, ApiError>;

    /// Resolve one transaction by id from the recent listing
    async fn lookup(&self, id: &str, limit: usize) -> Result<Option<Transaction>, ApiError> {
        Ok(self
            .recent_transactions(limit)
            .await?
            .into_iter()
            .find(|t| t.id == id))
    }
}

/// Work queued by the App
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    Lookup { id: String, limit: usize },
    VerifyOtp { id: String, seq: u64, code: String },
    SetAction { id: String, action: Action },
    StreamControl { start: bool, interval_secs: f64 },
    Trigger(Trigger),
    Submit(NewTransaction),
}

impl ApiRequest {
    fn label(&self) -> &'static str {
        match self {
            ApiRequest::Lookup { .. } => "lookup",
            ApiRequest::VerifyOtp { .. } => "verify",
            ApiRequest::SetAction { .. } => "action",
            ApiRequest::StreamControl { .. } => "stream",
            ApiRequest::Trigger(_) => "trigger",
            ApiRequest::Submit(_) => "submit",
        }
    }
}

/// Execute one request and map it to the event the App expects
pub async fn execute(backend: &dyn Backend, req: ApiRequest) -> AppEvent {
    match req {
        ApiRequest::Lookup { id, limit } => {
            let found = match backend.lookup(&id, limit).await {
                Ok(found) => found,
                Err(e) => {
                    log::debug!("[api] lookup {id} failed: {e}");
                    None
                }
            };
            AppEvent::LookupResolved {
                id,
                found: found.map(Box::new),
            }
        }
        ApiRequest::VerifyOtp { id, seq, code } => {
            let outcome = backend.verify_otp(&id, &code).await.map_err(|e| e.to_string());
            AppEvent::OtpResult { id, seq, outcome }
        }
        ApiRequest::SetAction { id, action } => {
            let outcome = backend.set_action(&id, action).await.map_err(|e| e.reason());
            AppEvent::OverrideResult { id, outcome }
        }
        ApiRequest::StreamControl {
            start,
            interval_secs,
        } => AppEvent::StreamToggled(
            backend
                .stream_control(start, interval_secs)
                .await
                .map_err(|e| e.reason()),
        ),
        ApiRequest::Trigger(trigger) => AppEvent::Triggered {
            trigger,
            outcome: backend.trigger(trigger).await.map_err(|e| e.reason()),
        },
        ApiRequest::Submit(body) => AppEvent::Triggered {
            trigger: Trigger::UserInitiated,
            outcome: backend.submit_transaction(&body).await.map_err(|e| e.reason()),
        },
    }
}

/// Background task draining the App's request queue. Each request runs on its own task
/// so a slow verification never holds up a navigation lookup.
pub async fn run_api_worker(
    backend: Arc<dyn Backend>,
    mut req_rx: UnboundedReceiver<ApiRequest>,
    event_tx: UnboundedSender<AppEvent>,
) {
    log::info!("[api] worker started");
    while let Some(req) = req_rx.recv().await {
        log::debug!("[api] {} queued", req.label());
        let backend = backend.clone();
        let tx = event_tx.clone();
        tokio::spawn(async move {
            let ev = execute(backend.as_ref(), req).await;
            let _ = tx.send(ev);
        });
    }
    log::info!("[api] worker shutting down");
}

#[cfg(feature = "native")]
pub use http::HttpBackend;

#[cfg(feature = "native")]
mod http {
    use super::*;
    use crate::net::send_with_backoff;
    use serde::de::DeserializeOwned;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::time::Duration;

    #[derive(Deserialize)]
    struct StatsEnvelope {
        stats: Stats,
    }

    #[derive(Deserialize)]
    struct ListingEnvelope {
        #[serde(default)]
        transactions: Vec<Value>,
    }

    pub struct HttpBackend {
        base: String,
        client: reqwest::Client,
        timeout: Duration,
        retries: u32,
    }

    impl HttpBackend {
        pub fn new(base: &str, timeout_ms: u64, retries: u32) -> anyhow::Result<Self> {
            let client = reqwest::Client::builder()
                .pool_max_idle_per_host(8)
                .tcp_nodelay(true)
                .build()?;
            Ok(Self {
                base: base.trim_end_matches('/').to_string(),
                client,
                timeout: Duration::from_millis(timeout_ms),
                retries,
            })
        }

        fn url(&self, path: &str) -> String {
            format!("{}{}", self.base, path)
        }

        async fn read<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            if !status.is_success() {
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
        }

        async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
            let rb = self.client.get(self.url(path)).timeout(self.timeout);
            let resp = send_with_backoff(rb, path, self.retries)
                .await
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            Self::read(resp).await
        }

        /// Mutations are sent exactly once
        async fn post<T: DeserializeOwned>(&self, path: &str, body: Option<&Value>) -> Result<T, ApiError> {
            let mut rb = self.client.post(self.url(path)).timeout(self.timeout);
            if let Some(b) = body {
                rb = rb.json(b);
            }
            log::info!("[api] POST {path}");
            let resp = rb
                .send()
                .await
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            Self::read(resp).await
        }
    }

    #[async_trait]
    impl Backend for HttpBackend {
        async fn stats(&self) -> Result<Stats, ApiError> {
            let env: StatsEnvelope = self.get("/api/stats").await?;
            Ok(env.stats)
        }

        async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, ApiError> {
            let env: ListingEnvelope = self.get(&format!("/api/transactions?limit={limit}")).await?;
            // one bad row should not hide the rest
            Ok(env
                .transactions
                .into_iter()
                .filter_map(|row| match serde_json::from_value::<Transaction>(row) {
                    Ok(t) => Some(t),
                    Err(e) => {
                        log::debug!("[api] skipping listing row: {e}");
                        None
                    }
                })
                .collect())
        }

        async fn stream_control(&self, start: bool, interval_secs: f64) -> Result<bool, ApiError> {
            let action = if start { "start" } else { "stop" };
            let body = json!({ "action": action, "interval": interval_secs });
            let _: Value = self.post("/api/stream/control", Some(&body)).await?;
            Ok(start)
        }

        async fn trigger(&self, trigger: Trigger) -> Result<(), ApiError> {
            let path = match trigger {
                Trigger::Simulate => "/api/transaction/simulate",
                Trigger::InjectFraud => "/api/transaction/fraud",
                Trigger::UserInitiated => {
                    return Err(ApiError::Decode("user-initiated needs a form body".into()))
                }
            };
            let _: Value = self.post(path, None).await?;
            Ok(())
        }

        async fn submit_transaction(&self, body: &NewTransaction) -> Result<(), ApiError> {
            let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
            let _: Value = self
                .post("/api/transaction/user-initiated", Some(&body))
                .await?;
            Ok(())
        }

        async fn set_action(&self, transaction_id: &str, action: Action) -> Result<String, ApiError> {
            let body = json!({ "transaction_id": transaction_id, "action": action });
            let resp: Value = self.post("/api/transaction/action", Some(&body)).await?;
            Ok(resp
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Action set to {action}")))
        }

        async fn verify_otp(&self, transaction_id: &str, otp: &str) -> Result<OtpVerdict, ApiError> {
            let body = json!({ "transaction_id": transaction_id, "otp": otp });
            self.post("/api/otp/verify", Some(&body)).await
        }
    }
}
