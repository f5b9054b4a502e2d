//! Shared fixtures for integration tests: scripted providers and validators.

#![allow(dead_code)]

use async_trait::async_trait;
use config_secrets::secrets::{
    Backoff, FileProviderConfig, InlineProviderConfig, Provider, ProviderConfig, ProviderKind,
    ProviderRegistry, Result, SecretValidator, SecretsError, ValidatorSettings,
};
use config_secrets::ManagerSettings;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Registry name of the scripted provider.
pub const SCRIPT: &str = "script";

/// Outcomes a [`Script`] hands out, one per fetch. The last success repeats
/// once the queue is empty.
#[derive(Default)]
pub struct Script {
    queue: Mutex<VecDeque<std::result::Result<String, String>>>,
    last: Mutex<Option<String>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_ok(&self, value: &str) {
        self.queue.lock().unwrap().push_back(Ok(value.to_string()));
    }

    pub fn push_err(&self, message: &str) {
        self.queue.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn next(&self) -> std::result::Result<String, String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = match self.queue.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => self.last.lock().unwrap().clone().ok_or_else(|| "script exhausted".to_string()),
        };
        if let Ok(value) = &outcome {
            *self.last.lock().unwrap() = Some(value.clone());
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// `script: <name>` fields; every name shares one [`Script`].
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    name: String,
    script: ScriptHandle,
}

#[derive(Clone)]
struct ScriptHandle(Arc<Script>);

impl std::fmt::Debug for ScriptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Script")
    }
}

impl ProviderConfig for ScriptConfig {
    fn new_provider(&self) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(ScriptProvider(self.script.clone())))
    }

    fn id(&self) -> String {
        format!("script:{}", self.name)
    }

    fn clone_box(&self) -> Box<dyn ProviderConfig> {
        Box::new(self.clone())
    }

    fn to_value(&self) -> Result<serde_yaml::Value> {
        Ok(serde_yaml::Value::String(self.name.clone()))
    }
}

#[derive(Debug)]
struct ScriptProvider(ScriptHandle);

#[async_trait]
impl Provider for ScriptProvider {
    async fn fetch_secret(&self) -> Result<String> {
        (self.0).0.next().await.map_err(SecretsError::fetch_failed)
    }
}

struct ScriptKind(Arc<Script>);

impl ProviderKind for ScriptKind {
    fn parse(&self, raw: serde_yaml::Value) -> Result<Box<dyn ProviderConfig>> {
        let name = raw
            .as_str()
            .ok_or_else(|| SecretsError::invalid_provider_config(SCRIPT, "", "expected a name"))?;
        Ok(Box::new(ScriptConfig { name: name.to_string(), script: ScriptHandle(Arc::clone(&self.0)) }))
    }
}

/// Private registry with the built-ins plus `script` backed by `script`.
pub fn registry_with(script: &Arc<Script>) -> Arc<ProviderRegistry> {
    let registry = ProviderRegistry::new();
    registry.register::<InlineProviderConfig>("inline");
    registry.register::<FileProviderConfig>("file");
    registry.register_kind(SCRIPT, Arc::new(ScriptKind(Arc::clone(script))));
    Arc::new(registry)
}

/// Settings with millisecond backoffs so retries happen quickly.
pub fn fast_settings() -> ManagerSettings {
    ManagerSettings {
        initial_fetch_timeout: Duration::from_secs(1),
        fetch_timeout: Duration::from_secs(1),
        fetch_initial_backoff: Duration::from_millis(10),
        fetch_max_backoff: Duration::from_millis(40),
        max_wait: Duration::from_millis(50),
        ..ManagerSettings::default()
    }
}

/// Rejects the first `rejections` candidates, then accepts.
pub struct CountingValidator {
    rejections: AtomicUsize,
    calls: AtomicUsize,
    max_retries: u32,
}

impl CountingValidator {
    pub fn rejecting(rejections: usize, max_retries: u32) -> Arc<Self> {
        Arc::new(Self { rejections: AtomicUsize::new(rejections), calls: AtomicUsize::new(0), max_retries })
    }

    pub fn never(max_retries: u32) -> Arc<Self> {
        Self::rejecting(usize::MAX, max_retries)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretValidator for CountingValidator {
    async fn validate(&self, _candidate: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_err()
    }

    fn settings(&self) -> ValidatorSettings {
        ValidatorSettings {
            timeout: Duration::from_millis(200),
            backoff: Backoff::new(Duration::from_millis(5), Duration::from_millis(20)),
            max_retries: self.max_retries,
        }
    }
}

/// Poll `condition` every 10ms until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
