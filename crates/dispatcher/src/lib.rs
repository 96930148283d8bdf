use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{InteractionRecord, RequestId},
    error::BackendFailure,
    protocol::{AskIntent, AskRequest, AskResponse},
};
use storage::InteractionStore;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Seam for the outbound `/ask` call. Implementations only fail for
/// transport-level problems; a reachable backend that produces no answer is
/// still an `Ok` response.
#[async_trait]
pub trait AskBackend: Send + Sync {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse>;
}

pub struct HttpAskBackend {
    http: Client,
    base_url: String,
}

impl HttpAskBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AskBackend for HttpAskBackend {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        let response = self
            .http
            .post(format!("{}/ask", self.base_url))
            .json(request)
            .send()
            .await
            .with_context(|| format!("failed to reach ask backend at {}", self.base_url))?;

        // Semantic failures arrive as JSON bodies carrying `detail`; any
        // unparseable body counts as a response without an answer.
        Ok(response.json::<AskResponse>().await.unwrap_or_default())
    }
}

pub struct MissingAskBackend;

#[async_trait]
impl AskBackend for MissingAskBackend {
    async fn ask(&self, _request: &AskRequest) -> Result<AskResponse> {
        Err(anyhow!("ask backend is unavailable"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// A request is already in flight; overlapping submissions are rejected
    /// rather than interleaved.
    #[error("a request is already in flight")]
    Busy,
    /// The dispatcher worker is gone, so the intent was not accepted.
    #[error("dispatcher is no longer running")]
    Closed,
}

/// Long-lived component that proxies one intent at a time to the backend.
///
/// Every dispatch performs exactly two store writes in order: the loading
/// record before the HTTP call, the outcome record after it. No failure
/// escapes past this boundary; transport and semantic errors both end in an
/// error-status store write.
pub struct Dispatcher {
    backend: Arc<dyn AskBackend>,
    store: InteractionStore,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn AskBackend>, store: InteractionStore) -> Self {
        Self { backend, store }
    }

    /// Spawns the worker task and returns the handle the popup submits
    /// intents through.
    pub fn spawn(backend: Arc<dyn AskBackend>, store: InteractionStore) -> DispatcherHandle {
        let (tx, mut rx) = mpsc::channel::<(RequestId, AskIntent)>(1);
        let in_flight = Arc::new(AtomicBool::new(false));
        let dispatcher = Self::new(backend, store);

        let worker_flag = Arc::clone(&in_flight);
        tokio::spawn(async move {
            while let Some((request_id, intent)) = rx.recv().await {
                dispatcher.dispatch_with_id(request_id, intent).await;
                // The in-flight guard stays set until the outcome write has
                // landed, so two dispatches can never interleave store writes.
                worker_flag.store(false, Ordering::SeqCst);
            }
        });

        DispatcherHandle { tx, in_flight }
    }

    /// Runs one full dispatch: loading write, backend call, outcome write.
    pub async fn dispatch(&self, intent: AskIntent) -> RequestId {
        let request_id = RequestId::new();
        self.dispatch_with_id(request_id, intent).await;
        request_id
    }

    async fn dispatch_with_id(&self, request_id: RequestId, intent: AskIntent) {
        info!(%request_id, url = %intent.url, "dispatch: forwarding query to backend");

        self.put_record(InteractionRecord::loading(request_id, intent.query.clone()))
            .await;

        let outcome = match self.backend.ask(&AskRequest::from(&intent)).await {
            Ok(response) => match response.answer.filter(|answer| !answer.is_empty()) {
                Some(answer) => {
                    info!(%request_id, "dispatch: backend answered");
                    InteractionRecord::complete(request_id, intent.query, answer)
                }
                None => {
                    warn!(%request_id, "dispatch: backend replied without an answer");
                    InteractionRecord::error(
                        request_id,
                        intent.query,
                        BackendFailure::rejected(response.detail).to_string(),
                    )
                }
            },
            Err(err) => {
                warn!(%request_id, "dispatch: backend unreachable: {err:#}");
                InteractionRecord::error(
                    request_id,
                    intent.query,
                    BackendFailure::Unreachable.to_string(),
                )
            }
        };

        self.put_record(outcome).await;
    }

    async fn put_record(&self, record: InteractionRecord) {
        // Store writes are the dispatcher's only side effect; a failed write
        // is logged rather than propagated to the submitting side.
        if let Err(err) = self.store.put(record).await {
            warn!("dispatch: failed to write interaction record: {err:#}");
        }
    }
}

/// Acknowledged submission handle: the caller learns whether the intent was
/// accepted instead of firing into the void.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<(RequestId, AskIntent)>,
    in_flight: Arc<AtomicBool>,
}

impl DispatcherHandle {
    pub fn submit(&self, intent: AskIntent) -> Result<RequestId, SubmitError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(SubmitError::Busy);
        }

        let request_id = RequestId::new();
        if self.tx.try_send((request_id, intent)).is_err() {
            self.in_flight.store(false, Ordering::SeqCst);
            return Err(SubmitError::Closed);
        }
        Ok(request_id)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
