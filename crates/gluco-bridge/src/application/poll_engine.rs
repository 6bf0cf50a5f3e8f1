//! PollingEngine: the fetch → classify → deliver control loop.
//!
//! The engine is the heart of the bridge.  Each cycle it asks the
//! [`ShareSource`] for the latest reading, decides what to do with the
//! tagged [`FetchOutcome`], and, for fresh readings, resolves the headset
//! address and hands the formatted text to the [`MessageSink`].
//!
//! # State machine
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!   Idle ──► Polling ──► Delivering ──► (sleep interval) ───┤
//!              │                                            │
//!              ├────────► Backoff ────► (sleep backoff) ────┘
//!              │
//!              └────────► Stopped   (auth failure after re-login, or
//!                                    the running flag cleared)
//! ```
//!
//! # Cadence
//!
//! The delay is measured from the end of one cycle to the start of the next,
//! so a slow upstream stretches the period instead of overlapping cycles.
//! Sleeps are taken in short slices and the shared `running` flag is checked
//! between slices, which bounds shutdown latency by the slice length.
//!
//! # Delivery bookkeeping
//!
//! A fresh reading only becomes the "last accepted" reading once it has been
//! handed to the network.  If no endpoint could be resolved, or the send
//! failed, the next cycle sees the same reading as fresh and tries again.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use gluco_core::{format_reading, ChatboxFormat, GlucoseValue, Reading, ReadingFreshness};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backoff::BackoffPolicy;
use super::ports::{EndpointResolver, FetchOutcome, MessageSink, ShareError, ShareSource};

/// Shortest permitted poll interval.  The Share service only produces a new
/// value every five minutes; polling faster than this wastes its rate limit.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Longest single sleep between checks of the running flag.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Terminal failures that stop the engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The Share service rejected the stored credentials even after a fresh
    /// login.
    #[error(
        "Share service rejected the stored credentials ({0}); \
         re-run `dexcom-osc-bridge setup` and check that sharing is enabled"
    )]
    AuthRejected(String),
}

/// Engine state, observable for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Polling,
    Delivering,
    Backoff,
    Stopped,
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A fresh reading was sent; carries the chatbox text.
    Sent(String),
    /// The reading was already shown.
    Duplicate,
    /// The reading was newer but changed by less than `min_delta`.
    Suppressed,
    /// The account has no current reading.
    NoReading,
    /// A fresh reading was available but no endpoint could be resolved.
    NoEndpoint,
    /// A fresh reading was available but the send failed.
    SendFailed,
    /// The upstream failed transiently; the next attempt waits `delay`.
    Transient { failures: u32, delay: Duration },
    /// The session was renewed after an auth failure.
    Reauthenticated,
}

/// Tunables for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between the end of one cycle and the start of the next.
    pub interval: Duration,
    pub backoff: BackoffPolicy,
    /// Minimum mg/dL change worth sending.  `0` sends every fresh reading.
    pub min_delta: u16,
    pub format: ChatboxFormat,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
            min_delta: 0,
            format: ChatboxFormat::default(),
        }
    }
}

impl PollSettings {
    /// The configured interval, raised to [`MIN_POLL_INTERVAL`] if shorter.
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }
}

/// Per-run state owned by the engine.  Nothing else mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeSession {
    /// Last reading handed to the network (or suppressed by `min_delta`).
    pub last_accepted: Option<Reading>,
    /// Value of the last reading actually sent.
    pub last_sent_value: Option<GlucoseValue>,
    /// Consecutive transient failures.
    pub failures: u32,
    /// When the resolver last produced an address.
    pub last_discovery: Option<Instant>,
    /// Whether the one re-login allowed per auth failure has been used.
    pub reauth_spent: bool,
}

/// The polling engine.
///
/// All collaborators are injected at construction time, which makes the
/// engine fully unit-testable with recording fakes.
pub struct PollingEngine<S, R, K> {
    source: S,
    resolver: R,
    sink: K,
    settings: PollSettings,
    session: BridgeSession,
    state: EngineState,
    running: Arc<AtomicBool>,
}

impl<S, R, K> PollingEngine<S, R, K>
where
    S: ShareSource,
    R: EndpointResolver,
    K: MessageSink,
{
    pub fn new(
        source: S,
        resolver: R,
        sink: K,
        settings: PollSettings,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            resolver,
            sink,
            settings,
            session: BridgeSession::default(),
            state: EngineState::Idle,
            running,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn session(&self) -> &BridgeSession {
        &self.session
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Runs cycles until the running flag is cleared or a terminal error
    /// occurs.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AuthRejected`] when the credentials are refused
    /// after a re-login attempt.
    pub async fn run(&mut self) -> Result<(), BridgeError> {
        info!(
            "polling engine started (interval {:?}, backoff {:?}..{:?})",
            self.settings.effective_interval(),
            self.settings.backoff.base,
            self.settings.backoff.cap
        );

        while self.running.load(Ordering::Relaxed) {
            let outcome = match self.run_cycle().await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.state = EngineState::Stopped;
                    return Err(e);
                }
            };
            let delay = self.next_delay(&outcome);
            self.sleep_while_running(delay).await;
            if self.state != EngineState::Stopped {
                self.state = EngineState::Idle;
            }
        }

        self.state = EngineState::Stopped;
        info!("polling engine stopped");
        Ok(())
    }

    /// Executes exactly one fetch/classify/deliver cycle without sleeping.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] only for terminal failures.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, BridgeError> {
        self.state = EngineState::Polling;

        let outcome = match self.source.fetch_latest().await {
            FetchOutcome::Reading(reading) => {
                self.record_fetch_success();
                self.handle_reading(reading).await
            }
            FetchOutcome::NoReading => {
                self.record_fetch_success();
                debug!("Share account has no current reading");
                CycleOutcome::NoReading
            }
            FetchOutcome::Transient(reason) => {
                // An outage between two auth failures earns a fresh re-login.
                self.session.reauth_spent = false;
                self.record_transient(&reason)
            }
            FetchOutcome::Auth(reason) => return self.handle_auth_failure(reason).await,
        };

        if !matches!(outcome, CycleOutcome::Transient { .. }) {
            self.state = EngineState::Idle;
        }
        Ok(outcome)
    }

    /// Delay to wait after `outcome` before the next cycle.
    pub fn next_delay(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Transient { delay, .. } => *delay,
            CycleOutcome::Reauthenticated => Duration::ZERO,
            _ => self.settings.effective_interval(),
        }
    }

    fn record_fetch_success(&mut self) {
        if self.session.failures > 0 {
            info!(
                "Share service recovered after {} failed attempt(s)",
                self.session.failures
            );
        }
        self.session.failures = 0;
        self.session.reauth_spent = false;
    }

    fn record_transient(&mut self, reason: &str) -> CycleOutcome {
        self.session.failures = self.session.failures.saturating_add(1);
        let delay = self.settings.backoff.delay_for(self.session.failures);
        warn!(
            "transient Share failure #{}: {reason}; retrying in {delay:?}",
            self.session.failures
        );
        self.state = EngineState::Backoff;
        CycleOutcome::Transient {
            failures: self.session.failures,
            delay,
        }
    }

    async fn handle_auth_failure(&mut self, reason: String) -> Result<CycleOutcome, BridgeError> {
        if self.session.reauth_spent {
            self.state = EngineState::Stopped;
            return Err(BridgeError::AuthRejected(reason));
        }

        self.session.reauth_spent = true;
        warn!("Share session rejected ({reason}); logging in again");

        match self.source.reauthenticate().await {
            Ok(()) => {
                info!("Share login renewed");
                self.state = EngineState::Idle;
                Ok(CycleOutcome::Reauthenticated)
            }
            Err(ShareError::Auth(reason)) => {
                self.state = EngineState::Stopped;
                Err(BridgeError::AuthRejected(reason))
            }
            Err(ShareError::Transient(reason)) => Ok(self.record_transient(&reason)),
        }
    }

    async fn handle_reading(&mut self, reading: Reading) -> CycleOutcome {
        if reading.freshness_against(self.session.last_accepted.as_ref())
            == ReadingFreshness::Duplicate
        {
            debug!("reading at {} already shown", reading.timestamp);
            return CycleOutcome::Duplicate;
        }

        if self.below_min_delta(&reading) {
            debug!(
                "reading {} within min_delta {} of last sent value; not sending",
                reading.value, self.settings.min_delta
            );
            self.session.last_accepted = Some(reading);
            return CycleOutcome::Suppressed;
        }

        self.state = EngineState::Delivering;

        let addr = match self.resolver.resolve().await {
            Ok(addr) => addr,
            Err(e) => {
                warn!("{e}; will retry next cycle");
                return CycleOutcome::NoEndpoint;
            }
        };
        self.session.last_discovery = Some(Instant::now());

        let text = format_reading(&reading, &self.settings.format);
        match self.sink.send(&text, &addr).await {
            Ok(()) => {
                info!("sent \"{text}\" to {addr}");
                self.session.last_sent_value = Some(reading.value);
                self.session.last_accepted = Some(reading);
                CycleOutcome::Sent(text)
            }
            Err(e) => {
                warn!("{e}");
                self.resolver.invalidate();
                CycleOutcome::SendFailed
            }
        }
    }

    fn below_min_delta(&self, reading: &Reading) -> bool {
        if self.settings.min_delta == 0 {
            return false;
        }
        let Some(last) = self.session.last_sent_value else {
            return false;
        };
        match (last.as_mg_dl(), reading.value.as_mg_dl()) {
            (Some(prev), Some(next)) => prev.abs_diff(next) < self.settings.min_delta,
            // Crossing into or out of LOW/HIGH always counts as a change.
            _ => last == reading.value,
        }
    }

    async fn sleep_while_running(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while self.running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep((deadline - now).min(SLEEP_SLICE)).await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
