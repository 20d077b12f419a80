//! `buildQuery` round-trip orchestration
//!
//! Pure state: callers pass the current instant and act on the returned
//! decisions, so the session's timers and the tests drive the same code.
//!
//! - at most one round-trip is outstanding
//! - sends are throttled on the leading edge
//! - requests refused while busy or throttled collapse into one re-trigger
//! - an unanswered round-trip stops blocking after the build timeout

use crate::config::{StalePolicy, TimingConfig};
use std::time::Duration;
use tokio::time::Instant;

/// Orchestrator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Minimum spacing between sends, measured from the previous send
    pub throttle: Duration,
    /// Time after which an unanswered send is abandoned
    pub build_timeout: Duration,
    /// Treatment of answers to superseded requests
    pub stale_policy: StalePolicy,
}

impl OrchestratorConfig {
    /// Settings from timing configuration
    #[must_use]
    pub fn from_timing(timing: &TimingConfig, stale_policy: StalePolicy) -> Self {
        Self {
            throttle: timing.throttle(),
            build_timeout: timing.build_timeout(),
            stale_policy,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_timing(&TimingConfig::default(), StalePolicy::default())
    }
}

/// Outcome of a build request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildDecision {
    /// Send `buildQuery` with this request id now
    Issue {
        /// Sequence number to send
        request_id: u64,
    },
    /// A round-trip is outstanding; a re-trigger was recorded
    InFlight,
    /// Inside the throttle window; a re-trigger was recorded
    Throttled {
        /// Earliest instant a send is allowed
        retry_at: Instant,
    },
}

#[derive(Debug, Clone, Copy)]
struct Outstanding {
    request_id: u64,
    deadline: Instant,
}

/// Round-trip state for one sandbox
#[derive(Debug)]
pub struct QueryOrchestrator {
    config: OrchestratorConfig,
    last_request_id: u64,
    outstanding: Option<Outstanding>,
    last_sent: Option<Instant>,
    retrigger: bool,
}

impl QueryOrchestrator {
    /// Idle orchestrator
    #[must_use]
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            last_request_id: 0,
            outstanding: None,
            last_sent: None,
            retrigger: false,
        }
    }

    /// Whether a round-trip is outstanding
    #[must_use]
    pub fn query_in_progress(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Most recently issued request id, 0 before the first send
    #[must_use]
    pub fn latest_request_id(&self) -> u64 {
        self.last_request_id
    }

    /// Whether a re-trigger is pending
    #[must_use]
    pub fn has_retrigger(&self) -> bool {
        self.retrigger
    }

    /// Ask to send a `buildQuery`
    pub fn try_begin_build(&mut self, now: Instant) -> BuildDecision {
        if self.outstanding.is_some() {
            self.retrigger = true;
            tracing::debug!(request_id = self.last_request_id, "build request dropped, round-trip in flight");
            return BuildDecision::InFlight;
        }
        if let Some(retry_at) = self.throttled_until(now) {
            self.retrigger = true;
            tracing::debug!("build request dropped, throttled");
            return BuildDecision::Throttled { retry_at };
        }

        self.last_request_id += 1;
        self.outstanding = Some(Outstanding {
            request_id: self.last_request_id,
            deadline: now + self.config.build_timeout,
        });
        self.last_sent = Some(now);
        self.retrigger = false;
        BuildDecision::Issue {
            request_id: self.last_request_id,
        }
    }

    /// Decide whether a `queryLoaded` answer is used
    ///
    /// Answers without an id are accepted. An accepted answer settles the
    /// outstanding round-trip.
    pub fn accept_response(&mut self, request_id: Option<u64>) -> bool {
        let accepted = match (self.config.stale_policy, request_id) {
            (StalePolicy::LastWriteWins, _) | (_, None) => true,
            (StalePolicy::DiscardSuperseded, Some(id)) => id == self.last_request_id,
        };

        if accepted {
            self.outstanding = None;
        } else {
            tracing::debug!(
                request_id = ?request_id,
                latest = self.last_request_id,
                "superseded queryLoaded ignored"
            );
        }
        accepted
    }

    /// Abandon the outstanding round-trip if its deadline has passed
    ///
    /// Returns the abandoned request id.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<u64> {
        let outstanding = self.outstanding?;
        if now < outstanding.deadline {
            return None;
        }
        self.outstanding = None;
        tracing::warn!(request_id = outstanding.request_id, "buildQuery timed out");
        Some(outstanding.request_id)
    }

    /// Consume the re-trigger once a send would be allowed
    pub fn take_retrigger(&mut self, now: Instant) -> bool {
        if !self.retrigger || self.outstanding.is_some() || self.throttled_until(now).is_some() {
            return false;
        }
        self.retrigger = false;
        true
    }

    /// Next instant at which [`Self::poll_timeout`] or
    /// [`Self::take_retrigger`] may change state
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.outstanding {
            Some(outstanding) => Some(outstanding.deadline),
            None if self.retrigger => Some(
                self.last_sent
                    .map_or_else(Instant::now, |sent| sent + self.config.throttle),
            ),
            None => None,
        }
    }

    /// Forget the outstanding round-trip and any re-trigger
    ///
    /// Used when the sandbox is replaced; request ids keep increasing.
    pub fn reset(&mut self) {
        self.outstanding = None;
        self.retrigger = false;
    }

    fn throttled_until(&self, now: Instant) -> Option<Instant> {
        let retry_at = self.last_sent? + self.config.throttle;
        (now < retry_at).then_some(retry_at)
    }
}

impl Default for QueryOrchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}
