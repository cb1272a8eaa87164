//! Supervision policy
//!
//! A [`Supervisor`] is a pure decision function: given a failure and the
//! failing cell's strategy, produce a [`Directive`]. Restart intensity is
//! accounted separately by [`RestartHistory`], a sliding window of failure
//! timestamps; when the window overflows, the directive is upgraded to
//! escalate regardless of what the supervisor chose.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::constants::{SUPERVISION_RESTARTS_COUNT_DEFAULT, SUPERVISION_WINDOW_MS_DEFAULT};
use crate::error::Error;

/// The chosen response to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Leave state intact and keep processing
    Resume,

    /// Discard state, re-instantiate, keep processing
    Restart,

    /// Run the stop sequence and leave the mailbox closed
    Stop,

    /// Forward the failure to the parent cell's supervisor
    Escalate,
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Directive::Resume => write!(f, "resume"),
            Directive::Restart => write!(f, "restart"),
            Directive::Stop => write!(f, "stop"),
            Directive::Escalate => write!(f, "escalate"),
        }
    }
}

/// Which cells a directive applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SupervisionScope {
    /// Only the failing cell
    #[default]
    OneForOne,

    /// The failing cell and every sibling under the same parent
    OneForAll,
}

/// Restart-intensity configuration
///
/// `None` for `max_restarts` or `window` means unlimited. The windowed
/// restart count resets naturally as timestamps age out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisionStrategy {
    /// Maximum failures tolerated within the window before escalating
    pub max_restarts: Option<u32>,

    /// Width of the sliding failure window
    pub window: Option<Duration>,

    /// Directive scope
    pub scope: SupervisionScope,
}

impl Default for SupervisionStrategy {
    fn default() -> Self {
        Self {
            max_restarts: Some(SUPERVISION_RESTARTS_COUNT_DEFAULT),
            window: Some(Duration::from_millis(SUPERVISION_WINDOW_MS_DEFAULT)),
            scope: SupervisionScope::OneForOne,
        }
    }
}

impl SupervisionStrategy {
    /// Create a strategy with the given intensity limits
    pub fn new(max_restarts: u32, window: Duration) -> Self {
        Self {
            max_restarts: Some(max_restarts),
            window: Some(window),
            scope: SupervisionScope::OneForOne,
        }
    }

    /// Create a strategy that never escalates on intensity
    ///
    /// Used by the root guardians.
    pub fn unlimited() -> Self {
        Self {
            max_restarts: None,
            window: None,
            scope: SupervisionScope::OneForOne,
        }
    }

    /// Set the directive scope
    pub fn with_scope(mut self, scope: SupervisionScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Identity of the failing cell, as seen by a supervisor
#[derive(Debug, Clone)]
pub struct SupervisedRef {
    /// The failing cell's address
    pub address: Address,

    /// The failing cell's type label, for diagnostics
    pub type_name: &'static str,
}

/// Failure decision policy
///
/// Implementations must be pure: no side effects, the same inputs produce
/// the same directive.
pub trait Supervisor: Send + Sync + 'static {
    /// Decide how to respond to a failure of `supervised`
    fn decide(
        &self,
        error: &Error,
        supervised: &SupervisedRef,
        strategy: &SupervisionStrategy,
    ) -> Directive;
}

/// Default supervisor: restart for any error
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSupervisor;

impl Supervisor for DefaultSupervisor {
    fn decide(
        &self,
        _error: &Error,
        _supervised: &SupervisedRef,
        _strategy: &SupervisionStrategy,
    ) -> Directive {
        Directive::Restart
    }
}

/// Sliding window of failure timestamps for one cell
///
/// Timestamps older than the strategy window are evicted on each record.
#[derive(Debug, Default)]
pub struct RestartHistory {
    timestamps_ms: VecDeque<u64>,
}

impl RestartHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure and report whether intensity is now exceeded
    ///
    /// Returns true when the number of failures inside the window, this one
    /// included, is strictly greater than `max_restarts`.
    pub fn record_and_check(&mut self, now_ms: u64, strategy: &SupervisionStrategy) -> bool {
        self.timestamps_ms.push_back(now_ms);

        if let Some(window) = strategy.window {
            let horizon = now_ms.saturating_sub(window.as_millis() as u64);
            while self
                .timestamps_ms
                .front()
                .is_some_and(|&t| t < horizon)
            {
                self.timestamps_ms.pop_front();
            }
        }

        match strategy.max_restarts {
            Some(max) => self.timestamps_ms.len() > max as usize,
            None => false,
        }
    }

    /// Number of failures currently inside the window
    pub fn len(&self) -> usize {
        self.timestamps_ms.len()
    }

    /// True when no failures are recorded
    pub fn is_empty(&self) -> bool {
        self.timestamps_ms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(max: u32, window_ms: u64) -> SupervisionStrategy {
        SupervisionStrategy::new(max, Duration::from_millis(window_ms))
    }

    #[test]
    fn test_default_supervisor_restarts() {
        let supervised = SupervisedRef {
            address: Address::named("a").unwrap(),
            type_name: "Test",
        };
        let directive = DefaultSupervisor.decide(
            &Error::failure_msg("boom"),
            &supervised,
            &SupervisionStrategy::default(),
        );
        assert_eq!(directive, Directive::Restart);
    }

    #[test]
    fn test_history_escalates_past_max() {
        let strategy = strategy(2, 1_000);
        let mut history = RestartHistory::new();

        assert!(!history.record_and_check(100, &strategy));
        assert!(!history.record_and_check(200, &strategy));
        // Third failure inside the window exceeds max = 2.
        assert!(history.record_and_check(300, &strategy));
    }

    #[test]
    fn test_history_window_eviction_resets_count() {
        let strategy = strategy(2, 1_000);
        let mut history = RestartHistory::new();

        assert!(!history.record_and_check(0, &strategy));
        assert!(!history.record_and_check(100, &strategy));
        // Both prior failures have aged out of the 1s window.
        assert!(!history.record_and_check(2_000, &strategy));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_unlimited_strategy_never_escalates() {
        let strategy = SupervisionStrategy::unlimited();
        let mut history = RestartHistory::new();
        for i in 0..1_000 {
            assert!(!history.record_and_check(i, &strategy));
        }
    }

    #[test]
    fn test_zero_max_escalates_immediately() {
        let strategy = strategy(0, 1_000);
        let mut history = RestartHistory::new();
        assert!(history.record_and_check(0, &strategy));
    }
}
