//! State of one deduplicated secret.
//!
//! Every field whose provider configuration yields the same identity shares one
//! [`ManagedSecret`]. Its mutex guards the value and scheduling state; it is
//! never held across I/O. Fetch and validation tokens are children of the
//! secret's own token, which is cancelled when the secret is retired.

use super::provider::Provider;
use super::types::{SecretStatus, SecretString};
use super::validate::SecretValidator;
use crate::observability::SeriesLabels;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub(crate) struct ManagedSecret {
    pub(crate) labels: SeriesLabels,
    pub(crate) provider: Arc<dyn Provider>,
    token: CancellationToken,
    state: Mutex<SecretState>,
}

struct SecretState {
    current: Option<SecretString>,
    pending: Option<SecretString>,
    /// Current value was accepted by the validator since the last trigger
    verified: bool,
    /// A validation task is working on `pending`
    validating: bool,
    last_fetched: Option<Instant>,
    last_success: Option<DateTime<Utc>>,
    refresh_interval: Duration,
    in_flight: Option<CancellationToken>,
    refresh_requested: bool,
    status: SecretStatus,
    validator: Option<Arc<dyn SecretValidator>>,
}

/// Scheduling decision for one secret.
pub(crate) enum Poll {
    /// A fetch was claimed; the caller must run it under this token.
    Dispatch(CancellationToken),
    /// Not due for this long.
    Wait(Duration),
    /// A fetch is already running, or the secret was retired.
    InFlight,
}

/// What to do with a freshly fetched value.
pub(crate) enum Stored {
    /// Became the current value.
    Promoted,
    /// Identical to what is already current or being validated.
    Unchanged,
    /// Held as pending; run this validator against it.
    Validate(Arc<dyn SecretValidator>, SecretString),
}

impl ManagedSecret {
    pub(crate) fn new(
        labels: SeriesLabels,
        provider: Arc<dyn Provider>,
        refresh_interval: Duration,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            labels,
            provider,
            token: parent.child_token(),
            state: Mutex::new(SecretState {
                current: None,
                pending: None,
                verified: false,
                validating: false,
                last_fetched: None,
                last_success: None,
                refresh_interval,
                in_flight: None,
                refresh_requested: false,
                status: SecretStatus::Initializing,
                validator: None,
            }),
        }
    }

    pub(crate) fn current(&self) -> Option<SecretString> {
        self.state.lock().current.clone()
    }

    pub(crate) fn status(&self) -> SecretStatus {
        self.state.lock().status
    }

    pub(crate) fn last_success(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_success
    }

    pub(crate) fn refresh_interval(&self) -> Duration {
        self.state.lock().refresh_interval
    }

    pub(crate) fn set_refresh_interval(&self, interval: Duration) {
        self.state.lock().refresh_interval = interval;
    }

    pub(crate) fn set_validator(&self, validator: Option<Arc<dyn SecretValidator>>) {
        self.state.lock().validator = validator;
    }

    /// Mark for immediate refresh and force re-validation of the next value.
    pub(crate) fn request_refresh(&self) {
        let mut state = self.state.lock();
        state.refresh_requested = true;
        state.verified = false;
    }

    /// Decide whether to fetch now, claiming the in-flight slot if so.
    pub(crate) fn poll(&self, now: Instant) -> Poll {
        let mut state = self.state.lock();
        if state.in_flight.is_some() || self.token.is_cancelled() {
            return Poll::InFlight;
        }

        let due_at = state.last_fetched.map(|at| at + state.refresh_interval);
        let due = state.refresh_requested || due_at.map_or(true, |at| now >= at);
        if !due {
            return Poll::Wait(due_at.map_or(Duration::ZERO, |at| at - now));
        }

        let token = self.token.child_token();
        state.in_flight = Some(token.clone());
        state.refresh_requested = false;
        Poll::Dispatch(token)
    }

    /// Claim the in-flight slot for the construction-time fetch.
    pub(crate) fn try_claim(&self) -> Option<CancellationToken> {
        let mut state = self.state.lock();
        if state.in_flight.is_some() || self.token.is_cancelled() {
            return None;
        }
        let token = self.token.child_token();
        state.in_flight = Some(token.clone());
        Some(token)
    }

    /// Token for a validation round; cancelled on retirement.
    pub(crate) fn validation_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run `record` against this secret's series unless it has been retired.
    ///
    /// Holds the state lock, so a concurrent [`cancel`](Self::cancel) waits for
    /// it; series deleted after `cancel` returns are never recreated.
    pub(crate) fn record_metrics(&self, record: impl FnOnce(&SeriesLabels)) {
        let _state = self.state.lock();
        if !self.token.is_cancelled() {
            record(&self.labels);
        }
    }

    /// Record a successful fetch and release the in-flight slot.
    pub(crate) fn store_fetched(&self, value: String, now: Instant) -> Stored {
        let mut state = self.state.lock();
        state.in_flight = None;
        state.last_fetched = Some(now);
        state.last_success = Some(Utc::now());
        state.status = SecretStatus::Success;

        let candidate = SecretString::new(value);
        let gate = match (&state.validator, state.current.is_some()) {
            (Some(validator), true) => Some(Arc::clone(validator)),
            _ => None,
        };
        // First value, or nothing to gate on: promote immediately.
        let Some(validator) = gate else {
            let changed = state.current.as_ref() != Some(&candidate);
            state.current = Some(candidate);
            state.pending = None;
            state.validating = false;
            return if changed { Stored::Promoted } else { Stored::Unchanged };
        };

        if state.verified && state.current.as_ref() == Some(&candidate) {
            state.pending = None;
            return Stored::Unchanged;
        }
        if state.validating && state.pending.as_ref() == Some(&candidate) {
            return Stored::Unchanged;
        }

        state.pending = Some(candidate.clone());
        state.validating = true;
        Stored::Validate(validator, candidate)
    }

    /// Record a failed attempt. Returns the new status.
    pub(crate) fn record_failure(&self) -> SecretStatus {
        let mut state = self.state.lock();
        state.status = SecretStatus::after_failure(state.last_success.is_some());
        state.status
    }

    /// Release the in-flight slot without touching the value.
    pub(crate) fn abandon_fetch(&self) {
        self.state.lock().in_flight = None;
    }

    /// Whether `candidate` is still the value awaiting validation.
    pub(crate) fn is_pending(&self, candidate: &SecretString) -> bool {
        self.state.lock().pending.as_ref() == Some(candidate)
    }

    /// Promote a validated candidate unless a newer fetch replaced it.
    pub(crate) fn promote_validated(&self, candidate: &SecretString) -> bool {
        let mut state = self.state.lock();
        if state.pending.as_ref() != Some(candidate) {
            return false;
        }
        state.current = state.pending.take();
        state.verified = true;
        state.validating = false;
        true
    }

    /// A validation task for `candidate` stopped without promoting it.
    pub(crate) fn finish_validation(&self, candidate: &SecretString) {
        let mut state = self.state.lock();
        if state.pending.as_ref() == Some(candidate) {
            state.validating = false;
        }
    }

    /// Retire the secret: cancels its fetch and any validation round.
    pub(crate) fn cancel(&self) {
        let mut state = self.state.lock();
        self.token.cancel();
        state.in_flight = None;
        state.validating = false;
    }
}

impl std::fmt::Debug for ManagedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedSecret")
            .field("provider", &self.labels.provider)
            .field("path", &self.labels.path)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
