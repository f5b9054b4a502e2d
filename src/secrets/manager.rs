//! Secret manager
//!
//! Discovers every [`Field`] in a configuration graph, resolves it against a
//! [`ProviderRegistry`], deduplicates identical provider configurations and keeps
//! each unique secret fresh from a background loop.
//!
//! ```rust,ignore
//! let manager = Manager::new(&config, ManagerOptions::default()).await?;
//! let shutdown = CancellationToken::new();
//! tokio::spawn({
//!     let manager = manager.clone();
//!     let shutdown = shutdown.clone();
//!     async move { manager.run(shutdown).await }
//! });
//! ```
//!
//! Construction performs one bounded fetch per unique secret so early reads are
//! usually warm; a failed initial fetch is not an error. [`Manager::run`] owns all
//! later fetching: due secrets are fetched as independent tasks with exponential
//! backoff, at most one fetch per secret at a time. Cancelling the token passed to
//! `run` stops the loop and every in-flight fetch and validation.

use super::error::{Result, SecretsError};
use super::field::{Field, FieldBinding};
use super::managed::{ManagedSecret, Poll, Stored};
use super::parse::{parse_field, ParsedField};
use super::provider::ProviderConfig;
use super::registry::{default_registry, ProviderRegistry};
use super::retry::Backoff;
use super::types::{SecretStatus, SecretString};
use super::validate::SecretValidator;
use super::walk::{find_all, Walk};
use crate::config::ManagerSettings;
use crate::observability::{log_settings_info, SecretMetrics, SeriesLabels};
use crate::secret_span;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Construction options for a [`Manager`].
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Provider types available to fields
    pub registry: Arc<ProviderRegistry>,
    /// Registry the metric vectors are registered with; unregistered if `None`
    pub metrics_registry: Option<prometheus::Registry>,
    pub settings: ManagerSettings,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self { registry: default_registry(), metrics_registry: None, settings: ManagerSettings::default() }
    }
}

impl ManagerOptions {
    pub fn with_registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_metrics_registry(mut self, registry: prometheus::Registry) -> Self {
        self.metrics_registry = Some(registry);
        self
    }

    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Owns the managed secrets of one configuration. Cheap to clone.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    settings: ManagerSettings,
    registry: Arc<ProviderRegistry>,
    /// Identity -> managed secret
    secrets: RwLock<HashMap<String, Arc<ManagedSecret>>>,
    /// Field path -> managed secret
    fields: RwLock<BTreeMap<String, Arc<ManagedSecret>>>,
    metrics: SecretMetrics,
    wake: Arc<Notify>,
    root: CancellationToken,
    running: AtomicBool,
}

/// A discovered field after parsing, before it is bound.
struct Resolved<'a> {
    path: String,
    field: &'a Field,
    parsed: ParsedField,
    config: Box<dyn ProviderConfig>,
    id: String,
}

impl Manager {
    /// Discover and resolve every field reachable from `config`, then fetch each
    /// unique secret once, bounded by `initial_fetch_timeout`.
    ///
    /// Fails only on configuration defects; fetch failures are left to
    /// [`run`](Self::run).
    pub async fn new<C: Walk>(config: &C, options: ManagerOptions) -> Result<Self> {
        options
            .settings
            .validate()
            .map_err(|e| SecretsError::invalid_settings("ManagerSettings", e.to_string()))?;

        let metrics = SecretMetrics::new()?;
        if let Some(registry) = &options.metrics_registry {
            metrics.register(registry)?;
        }
        log_settings_info(&options.settings);

        let manager = Self {
            inner: Arc::new(ManagerInner {
                settings: options.settings,
                registry: options.registry,
                secrets: RwLock::new(HashMap::new()),
                fields: RwLock::new(BTreeMap::new()),
                metrics,
                wake: Arc::new(Notify::new()),
                root: CancellationToken::new(),
                running: AtomicBool::new(false),
            }),
        };

        manager.populate_config(config).await?;
        Ok(manager)
    }

    /// Re-run discovery against `config`, typically a fresh decode after a reload.
    ///
    /// New secrets are registered and fetched once; secrets no longer referenced by
    /// any field are retired (in-flight fetch cancelled, metric series deleted).
    /// On error nothing is changed.
    pub async fn populate_config<C: Walk>(&self, config: &C) -> Result<()> {
        let added = self.resolve(config)?;

        let initial: Vec<_> = added.into_iter().map(|secret| self.initial_fetch(secret)).collect();
        futures::future::join_all(initial).await;

        self.inner.wake.notify_one();
        Ok(())
    }

    /// Drive background refreshes until `cancel` fires. May be started once.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let inner = &self.inner;
        if inner.running.swap(true, Ordering::SeqCst) {
            return Err(SecretsError::AlreadyRunning);
        }

        info!(secrets = self.secret_count(), "Secret manager started");

        loop {
            let wait = inner.dispatch_due();
            debug!(wait_ms = wait.as_millis() as u64, "Secret refresh loop waiting");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
                _ = inner.wake.notified() => {}
            }
        }

        inner.root.cancel();
        info!("Secret manager stopped");
        Ok(())
    }

    /// Number of unique managed secrets.
    pub fn secret_count(&self) -> usize {
        self.inner.secrets.read().len()
    }

    /// Resolved field paths and the provider type behind each.
    pub fn paths(&self) -> BTreeMap<String, String> {
        self.inner
            .fields
            .read()
            .iter()
            .map(|(path, secret)| (path.clone(), secret.labels.provider.clone()))
            .collect()
    }

    /// Status of the secret behind the field at `path`.
    pub fn status(&self, path: &str) -> Option<SecretStatus> {
        self.inner.fields.read().get(path).map(|secret| secret.status())
    }

    /// Time of the last successful fetch of the secret behind `path`.
    pub fn last_successful_fetch(&self, path: &str) -> Option<chrono::DateTime<Utc>> {
        self.inner.fields.read().get(path).and_then(|secret| secret.last_success())
    }

    /// Effective refresh interval of the secret behind `path`.
    pub fn refresh_interval(&self, path: &str) -> Option<Duration> {
        self.inner.fields.read().get(path).map(|secret| secret.refresh_interval())
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.inner.settings
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst) && !self.inner.root.is_cancelled()
    }

    /// Parse, deduplicate and bind. Returns the secrets added by this call.
    fn resolve<C: Walk>(&self, config: &C) -> Result<Vec<Arc<ManagedSecret>>> {
        let inner = &self.inner;
        let discovered = find_all::<Field, C>(config, inner.settings.max_depth)?;

        let mut resolved = Vec::with_capacity(discovered.len());
        for found in discovered.iter() {
            let raw = found.value.raw().cloned().unwrap_or(serde_yaml::Value::Null);
            let parsed = parse_field(&raw, &inner.registry, &found.path)?;
            let config = parsed.provider_config();
            let id = config.id();
            resolved.push(Resolved { path: found.path.clone(), field: found.value, parsed, config, id });
        }

        // Shortest explicit interval per identity wins; the last field with a
        // validator sets the secret's validator.
        let mut intervals: HashMap<String, Option<Duration>> = HashMap::new();
        let mut validators: HashMap<String, Option<Arc<dyn SecretValidator>>> = HashMap::new();
        for r in &resolved {
            let entry = intervals.entry(r.id.clone()).or_insert(None);
            if let Some(interval) = r.parsed.settings.refresh_interval {
                *entry = Some(entry.map_or(interval, |current| current.min(interval)));
            }
            let validator = validators.entry(r.id.clone()).or_insert(None);
            if let Some(v) = r.field.validator() {
                *validator = Some(v);
            }
        }

        let mut candidates: HashMap<String, Arc<ManagedSecret>> = HashMap::new();
        {
            let secrets = inner.secrets.read();
            for r in &resolved {
                if secrets.contains_key(&r.id) || candidates.contains_key(&r.id) {
                    continue;
                }
                let provider = r.config.new_provider().map_err(|e| e.at_path(&r.path))?;
                let labels = SeriesLabels::new(r.parsed.provider_name(), r.path.clone());
                let secret = ManagedSecret::new(
                    labels,
                    provider,
                    inner.settings.default_refresh_interval,
                    &inner.root,
                );
                candidates.insert(r.id.clone(), Arc::new(secret));
            }
        }

        let mut added = Vec::new();
        let mut retired = Vec::new();
        let mut fields = BTreeMap::new();
        {
            let mut secrets = inner.secrets.write();

            for (id, secret) in candidates {
                if !secrets.contains_key(&id) {
                    inner.metrics.init_series(&secret.labels, SecretStatus::Initializing);
                    secrets.insert(id, Arc::clone(&secret));
                    added.push(secret);
                }
            }

            let stale: Vec<String> =
                secrets.keys().filter(|id| !intervals.contains_key(*id)).cloned().collect();
            for id in stale {
                if let Some(secret) = secrets.remove(&id) {
                    retired.push(secret);
                }
            }

            for (id, interval) in &intervals {
                if let Some(secret) = secrets.get(id) {
                    secret.set_refresh_interval(interval.unwrap_or(inner.settings.default_refresh_interval));
                    secret.set_validator(validators.remove(id).flatten());
                }
            }

            for r in resolved {
                let Some(secret) = secrets.get(&r.id).cloned() else {
                    continue;
                };
                r.field.bind(Arc::new(FieldBinding {
                    path: r.path.clone(),
                    parsed: r.parsed,
                    secret: Arc::clone(&secret),
                    wake: Arc::clone(&inner.wake),
                    marshal_policy: inner.settings.marshal_policy,
                }));
                fields.insert(r.path, secret);
            }
        }

        let field_count = fields.len();
        *inner.fields.write() = fields;

        for secret in retired {
            secret.cancel();
            inner.metrics.remove(&secret.labels);
            info!(
                provider = %secret.labels.provider,
                path = %secret.labels.path,
                "Retired secret no longer referenced by configuration"
            );
        }

        info!(fields = field_count, secrets = self.secret_count(), added = added.len(), "Resolved secret fields");
        Ok(added)
    }

    /// One bounded attempt for a newly added secret.
    async fn initial_fetch(&self, secret: Arc<ManagedSecret>) {
        let inner = &self.inner;
        let Some(token) = secret.try_claim() else {
            return;
        };
        let timeout = inner.settings.initial_fetch_timeout;
        let span = secret_span!("initial_fetch", secret.labels.provider, secret.labels.path);

        async {
            let started = Instant::now();
            let result = tokio::select! {
                _ = token.cancelled() => {
                    secret.abandon_fetch();
                    return;
                }
                result = tokio::time::timeout(timeout, secret.provider.fetch_secret()) => result
                    .unwrap_or_else(|_| Err(SecretsError::timeout("initial fetch", timeout))),
            };

            match result {
                Ok(value) => inner.on_fetched(&secret, value, started.elapsed()),
                Err(e) => {
                    let status = secret.record_failure();
                    secret.record_metrics(|labels| {
                        inner.metrics.record_fetch_failure(labels, started.elapsed(), status)
                    });
                    secret.abandon_fetch();
                    warn!(error = %e, "Initial secret fetch failed, retrying in background");
                }
            }
        }
        .instrument(span)
        .await
    }
}

impl ManagerInner {
    /// Start fetches for every due secret; returns how long to sleep.
    fn dispatch_due(self: &Arc<Self>) -> Duration {
        let snapshot: Vec<Arc<ManagedSecret>> = self.secrets.read().values().cloned().collect();
        let now = Instant::now();
        let mut wait = self.settings.max_wait;

        for secret in snapshot {
            match secret.poll(now) {
                Poll::Dispatch(token) => {
                    tokio::spawn(Arc::clone(self).fetch_with_retry(secret, token));
                }
                Poll::Wait(until_due) => wait = wait.min(until_due),
                Poll::InFlight => {}
            }
        }

        wait
    }

    /// Fetch until success or cancellation. Holds the secret's in-flight slot.
    async fn fetch_with_retry(self: Arc<Self>, secret: Arc<ManagedSecret>, token: CancellationToken) {
        let span = secret_span!("fetch", secret.labels.provider, secret.labels.path);
        let backoff = Backoff::new(self.settings.fetch_initial_backoff, self.settings.fetch_max_backoff);
        let timeout = self.settings.fetch_timeout;

        async {
            let mut failures: u32 = 0;
            loop {
                let started = Instant::now();
                let result = tokio::select! {
                    _ = token.cancelled() => {
                        secret.abandon_fetch();
                        debug!("Secret fetch cancelled");
                        return;
                    }
                    result = tokio::time::timeout(timeout, secret.provider.fetch_secret()) => result
                        .unwrap_or_else(|_| Err(SecretsError::timeout("fetch", timeout))),
                };
                let elapsed = started.elapsed();

                if token.is_cancelled() {
                    secret.abandon_fetch();
                    return;
                }

                match result {
                    Ok(value) => {
                        self.on_fetched(&secret, value, elapsed);
                        self.wake.notify_one();
                        return;
                    }
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        let status = secret.record_failure();
                        secret.record_metrics(|labels| self.metrics.record_fetch_failure(labels, elapsed, status));

                        let delay = backoff.delay_for_attempt(failures);
                        warn!(
                            error = %e,
                            attempt = failures,
                            backoff_ms = delay.as_millis() as u64,
                            "Secret fetch failed"
                        );

                        tokio::select! {
                            _ = token.cancelled() => {
                                secret.abandon_fetch();
                                return;
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    fn on_fetched(self: &Arc<Self>, secret: &Arc<ManagedSecret>, value: String, elapsed: Duration) {
        if secret.is_retired() {
            secret.abandon_fetch();
            return;
        }
        secret.record_metrics(|labels| self.metrics.record_fetch_success(labels, elapsed, Utc::now()));

        match secret.store_fetched(value, Instant::now()) {
            Stored::Promoted => debug!("Promoted fetched secret"),
            Stored::Unchanged => debug!("Fetched secret unchanged"),
            Stored::Validate(validator, candidate) => {
                debug!("Holding fetched secret for validation");
                let token = secret.validation_token();
                tokio::spawn(Arc::clone(self).validate_candidate(
                    Arc::clone(secret),
                    validator,
                    candidate,
                    token,
                ));
            }
        }
    }

    /// Promote `candidate` once `validator` accepts it, unless superseded.
    async fn validate_candidate(
        self: Arc<Self>,
        secret: Arc<ManagedSecret>,
        validator: Arc<dyn SecretValidator>,
        candidate: SecretString,
        token: CancellationToken,
    ) {
        let span = secret_span!("validate", secret.labels.provider, secret.labels.path);
        let settings = validator.settings();
        let attempts = settings.max_retries.max(1);

        async {
            for attempt in 1..=attempts {
                if token.is_cancelled() {
                    secret.finish_validation(&candidate);
                    return;
                }
                if !secret.is_pending(&candidate) {
                    debug!("Validation superseded by a newer value");
                    return;
                }

                let accepted = tokio::select! {
                    _ = token.cancelled() => {
                        secret.finish_validation(&candidate);
                        return;
                    }
                    result = tokio::time::timeout(settings.timeout, validator.validate(candidate.expose_secret())) => {
                        result.unwrap_or(false)
                    }
                };

                if accepted {
                    if secret.promote_validated(&candidate) {
                        info!(attempt, "Rotated to validated secret");
                    } else {
                        debug!("Validation superseded by a newer value");
                    }
                    return;
                }

                secret.record_metrics(|labels| self.metrics.record_validation_failure(labels));
                if attempt == attempts {
                    break;
                }

                let delay = settings.backoff.delay_for_attempt(attempt);
                warn!(attempt, backoff_ms = delay.as_millis() as u64, "Secret validation failed");
                tokio::select! {
                    _ = token.cancelled() => {
                        secret.finish_validation(&candidate);
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            secret.finish_validation(&candidate);
            warn!(attempts, "Secret validation retries exhausted, keeping current value");
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("secrets", &self.secret_count())
            .field("paths", &self.paths())
            .field("running", &self.is_running())
            .finish()
    }
}
