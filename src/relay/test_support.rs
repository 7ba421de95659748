//! In-process doubles for the relay's collaborators
//!
//! Shared by unit tests, the scenario tests under `tests/` and the benches.

use crate::cache::{ConfigStore, ConfigStoreError};
use crate::domain::{ConnectionId, EngineConfig, EngineId};
use crate::providers::{
    CompletionProvider, CompletionRequest, CompletionStream, ProviderError, ProviderEvent,
    ProviderId,
};
use crate::relay::connection::{ConnectionSink, DeliveryError};
use crate::relay::messages::OutboundMessage;
use crate::relay::usage_tracker::{UsageRecord, UsageTracker, UsageTrackerError};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Configuration store that counts every fetch attempt
#[derive(Debug, Default)]
pub struct CountingConfigStore {
    engines: HashMap<EngineId, EngineConfig>,
    fetches: AtomicUsize,
    fail_next: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl CountingConfigStore {
    pub fn new(engines: impl IntoIterator<Item = EngineConfig>) -> Self {
        Self {
            engines: engines
                .into_iter()
                .map(|config| (config.engine_id.clone(), config))
                .collect(),
            ..Self::default()
        }
    }

    /// Store with one generated configuration per id
    pub fn with_engines<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(ids.into_iter().map(|id| {
            let engine_id = EngineId::try_new(id.to_string()).expect("test engine ids are valid");
            EngineConfig::new(engine_id, format!("You are the {id} engine."))
        }))
    }

    /// Number of fetch attempts, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make the next fetch fail with [`ConfigStoreError::Unavailable`]
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    /// Sleep this long inside every subsequent fetch
    pub fn delay_fetches(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

#[async_trait]
impl ConfigStore for CountingConfigStore {
    async fn fetch_engine_config(
        &self,
        engine_id: &EngineId,
    ) -> Result<EngineConfig, ConfigStoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.fail_next.lock().take();
        if let Some(message) = failure {
            return Err(ConfigStoreError::Unavailable(message));
        }

        self.engines
            .get(engine_id)
            .cloned()
            .ok_or_else(|| ConfigStoreError::NotFound(engine_id.clone()))
    }
}

/// Provider that replays a fixed event script on every call
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Vec<Result<ProviderEvent, ProviderError>>,
    start_error: Option<ProviderError>,
    start_delay: Option<Duration>,
    stall_after_script: bool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderEvent, ProviderError>>) -> Self {
        Self {
            script,
            start_error: None,
            start_delay: None,
            stall_after_script: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider whose stream call itself fails
    pub fn failing_to_start(error: ProviderError) -> Self {
        Self {
            start_error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    /// Sleep before returning the stream
    pub fn delay_start(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    /// Never end the stream once the script is exhausted
    pub fn stall_after_script(mut self) -> Self {
        self.stall_after_script = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        ProviderId::scripted()
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream, ProviderError> {
        self.requests.lock().push(request);

        if let Some(delay) = self.start_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = &self.start_error {
            return Err(error.clone());
        }

        let scripted = stream::iter(self.script.clone());
        if self.stall_after_script {
            Ok(CompletionStream::new(scripted.chain(stream::pending())))
        } else {
            Ok(CompletionStream::new(scripted))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InjectedFailure {
    Gone,
    Transient,
}

/// Connection sink that records every delivered message
///
/// Failures can be injected on the n-th send (1-based). A `Gone` failure
/// sticks: every later send is also `Gone`.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(ConnectionId, OutboundMessage)>>,
    attempts: AtomicUsize,
    failure: Option<(usize, InjectedFailure)>,
    gone: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gone_on_send(mut self, attempt: usize) -> Self {
        self.failure = Some((attempt, InjectedFailure::Gone));
        self
    }

    pub fn transient_on_send(mut self, attempt: usize) -> Self {
        self.failure = Some((attempt, InjectedFailure::Transient));
        self
    }

    /// Messages that were delivered, in order
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.delivered
            .lock()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.delivered
            .lock()
            .iter()
            .map(|(_, message)| message.kind())
            .collect()
    }

    /// Every send attempt, delivered or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionSink for RecordingSink {
    async fn send(
        &self,
        connection_id: &ConnectionId,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if *self.gone.lock() {
            return Err(DeliveryError::Gone);
        }

        match self.failure {
            Some((n, InjectedFailure::Gone)) if n == attempt => {
                *self.gone.lock() = true;
                return Err(DeliveryError::Gone);
            }
            Some((n, InjectedFailure::Transient)) if n == attempt => {
                return Err(DeliveryError::Transient("injected".to_string()));
            }
            _ => {}
        }

        self.delivered
            .lock()
            .push((connection_id.clone(), message.clone()));
        Ok(())
    }
}

/// Usage tracker that keeps records in memory
#[derive(Debug, Default)]
pub struct RecordingUsageTracker {
    records: Mutex<Vec<UsageRecord>>,
    failing: bool,
}

impl RecordingUsageTracker {
    /// Tracker that rejects every record
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl UsageTracker for RecordingUsageTracker {
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageTrackerError> {
        if self.failing {
            return Err(UsageTrackerError::Store("injected".to_string()));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}
