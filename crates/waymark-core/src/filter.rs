//! Signal filter state machine for the position stream.
//!
//! Converts a continuous, noisy sample stream into a sparse sequence of
//! qualifying events while keeping the sensor radio as quiet as possible:
//!
//! - **Accuracy filtering**: samples whose `horizontal_accuracy` exceeds the
//!   configured bound are dropped before they reach the coordinator.
//! - **Deferred updates**: while in background execution, ask the sensor to
//!   suppress wake-ups until the distance threshold or a 60 s timeout
//!   elapses. A finished or failed deferral simply clears the flag; the next
//!   sample re-attempts.
//! - **Pause recovery**: when the sensor pauses itself (device judged
//!   stationary), stop and schedule a single 120 s restart.
//!
//! Pure and deterministic: every transition returns `SensorDirective`s that
//! the runtime layer applies to the real sensor. No clock or IO access.

use std::time::Duration;

use crate::error::SensorError;
use crate::types::{AuthorizationStatus, PositionSample, QualifyingEvent, SensorFault};

/// Time budget handed to the sensor with a deferred-updates request.
pub const DEFERRAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay before restarting after the sensor pauses updates.
pub const RESTART_DELAY: Duration = Duration::from_secs(120);

/// Configuration for the signal filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    /// Minimum displacement in meters between reported samples. Applied
    /// upstream by the sensor, and reused as the deferral distance budget.
    pub distance_threshold_m: f64,
    /// Maximum acceptable `horizontal_accuracy` in meters.
    pub desired_accuracy_m: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            distance_threshold_m: 100.0,
            desired_accuracy_m: 100.0,
        }
    }
}

/// Instruction for the runtime layer to apply to the sensor (or its timers).
#[derive(Debug, Clone, PartialEq)]
pub enum SensorDirective {
    Start,
    Stop,
    /// Ask the sensor to suppress wake-ups until `until_traveled_m` further
    /// displacement or `timeout`, whichever comes first.
    DeferUpdates {
        until_traveled_m: f64,
        timeout: Duration,
    },
    /// Arm the one-shot restart timer. Cancel-and-replace: a new directive
    /// supersedes any timer already pending.
    ScheduleRestart { delay: Duration },
    /// Reconfigure auto-pause/background flags for foreground vs background
    /// execution.
    ConfigureBackground { background: bool },
}

/// Result of feeding a sample batch through the filter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SampleOutcome {
    pub directives: Vec<SensorDirective>,
    /// Accepted samples, in arrival order.
    pub events: Vec<QualifyingEvent>,
}

/// Result of an authorization or failure transition.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub directives: Vec<SensorDirective>,
    /// Error to surface to the caller, if any.
    pub error: Option<SensorError>,
}

/// The deferral/pause state machine over the raw position stream.
#[derive(Debug, Clone)]
pub struct SignalFilter {
    config: FilterConfig,
    /// Whether updates are currently on.
    started: bool,
    /// Whether a deferred-updates request is outstanding.
    deferring: bool,
    /// Whether the app is in background execution.
    in_background: bool,
}

impl SignalFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            started: false,
            deferring: false,
            in_background: false,
        }
    }

    pub fn config(&self) -> FilterConfig {
        self.config
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_deferring(&self) -> bool {
        self.deferring
    }

    /// Begin receiving samples. Idempotent aside from re-issuing the start
    /// request to the sensor.
    pub fn start(&mut self) -> Vec<SensorDirective> {
        self.started = true;
        vec![SensorDirective::Start]
    }

    /// Cease receiving samples.
    pub fn stop(&mut self) -> Vec<SensorDirective> {
        self.started = false;
        vec![SensorDirective::Stop]
    }

    /// Process a sample batch in arrival order.
    ///
    /// Attempts to enter deferred mode first (the sensor stacks updates when
    /// deferring, so batches are the norm), then applies the accuracy bound
    /// to each sample.
    pub fn on_samples(&mut self, samples: &[PositionSample]) -> SampleOutcome {
        let mut outcome = SampleOutcome::default();

        // Defer whenever possible: only in background, and only one
        // outstanding request at a time.
        if !self.deferring && self.in_background {
            self.deferring = true;
            outcome.directives.push(SensorDirective::DeferUpdates {
                until_traveled_m: self.config.distance_threshold_m,
                timeout: DEFERRAL_TIMEOUT,
            });
        }

        for sample in samples {
            if sample.horizontal_accuracy > self.config.desired_accuracy_m {
                continue;
            }
            outcome.events.push(QualifyingEvent {
                latitude: sample.latitude,
                longitude: sample.longitude,
            });
        }

        outcome
    }

    /// The sensor finished (or failed) a deferred-updates request. Either
    /// way the flag clears; the next sample re-attempts deferral.
    pub fn on_deferral_finished(&mut self, _error: Option<&str>) {
        self.deferring = false;
    }

    /// The sensor paused updates because the platform judged the device
    /// stationary. Stop, and arm the one-shot restart timer.
    pub fn on_paused(&mut self) -> Vec<SensorDirective> {
        self.started = false;
        vec![
            SensorDirective::Stop,
            SensorDirective::ScheduleRestart {
                delay: RESTART_DELAY,
            },
        ]
    }

    /// Authorization transition reported by the sensor.
    pub fn on_authorization_changed(&mut self, status: AuthorizationStatus) -> TransitionOutcome {
        match status {
            AuthorizationStatus::Always => TransitionOutcome::default(),
            AuthorizationStatus::ForegroundOnly => TransitionOutcome {
                directives: Vec::new(),
                // Keep tracking; the caller warns the user that background
                // operation will not work.
                error: Some(SensorError::ForegroundOnly),
            },
            AuthorizationStatus::Denied
            | AuthorizationStatus::Restricted
            | AuthorizationStatus::NotDetermined => TransitionOutcome {
                directives: self.stop(),
                error: Some(SensorError::ServiceDisabled),
            },
        }
    }

    /// Sensor-level failure. Denial stops tracking; deferral faults clear
    /// the deferring flag; anything else is swallowed (the caller logs it).
    pub fn on_failure(&mut self, fault: &SensorFault) -> TransitionOutcome {
        match fault {
            SensorFault::Denied => TransitionOutcome {
                directives: self.stop(),
                error: Some(SensorError::ServiceDisabled),
            },
            SensorFault::Deferral => {
                self.deferring = false;
                TransitionOutcome::default()
            }
            SensorFault::Other(_) => TransitionOutcome::default(),
        }
    }

    /// The app moved to background execution. Does not change `started`.
    pub fn enter_background(&mut self) -> Vec<SensorDirective> {
        self.in_background = true;
        vec![SensorDirective::ConfigureBackground { background: true }]
    }

    /// The app returned to the foreground. Does not change `started`.
    pub fn enter_foreground(&mut self) -> Vec<SensorDirective> {
        self.in_background = false;
        vec![SensorDirective::ConfigureBackground { background: false }]
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(accuracy: f64) -> PositionSample {
        PositionSample {
            latitude: 51.5,
            longitude: -0.1,
            horizontal_accuracy: accuracy,
            timestamp: Utc::now(),
        }
    }

    fn filter() -> SignalFilter {
        SignalFilter::new(FilterConfig::default())
    }

    #[test]
    fn accurate_samples_become_events() {
        let mut f = filter();
        f.start();

        let out = f.on_samples(&[sample(10.0), sample(99.9), sample(100.0)]);
        assert_eq!(out.events.len(), 3);
    }

    #[test]
    fn inaccurate_samples_are_dropped() {
        let mut f = filter();
        f.start();

        let out = f.on_samples(&[sample(100.1), sample(500.0)]);
        assert!(out.events.is_empty());
    }

    #[test]
    fn mixed_batch_preserves_arrival_order() {
        let mut f = filter();
        f.start();

        let samples = vec![
            PositionSample {
                latitude: 1.0,
                longitude: 1.0,
                horizontal_accuracy: 5.0,
                timestamp: Utc::now(),
            },
            PositionSample {
                latitude: 2.0,
                longitude: 2.0,
                horizontal_accuracy: 999.0,
                timestamp: Utc::now(),
            },
            PositionSample {
                latitude: 3.0,
                longitude: 3.0,
                horizontal_accuracy: 5.0,
                timestamp: Utc::now(),
            },
        ];
        let out = f.on_samples(&samples);
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.events[0].latitude, 1.0);
        assert_eq!(out.events[1].latitude, 3.0);
    }

    #[test]
    fn start_is_idempotent() {
        let mut f = filter();
        assert_eq!(f.start(), vec![SensorDirective::Start]);
        assert!(f.is_started());
        // Second call is a no-op other than re-issuing the start request.
        assert_eq!(f.start(), vec![SensorDirective::Start]);
        assert!(f.is_started());
    }

    #[test]
    fn stop_clears_started() {
        let mut f = filter();
        f.start();
        assert_eq!(f.stop(), vec![SensorDirective::Stop]);
        assert!(!f.is_started());
    }

    #[test]
    fn no_deferral_in_foreground() {
        let mut f = filter();
        f.start();

        let out = f.on_samples(&[sample(10.0)]);
        assert!(out.directives.is_empty());
        assert!(!f.is_deferring());
    }

    #[test]
    fn deferral_requested_once_in_background() {
        let mut f = filter();
        f.start();
        f.enter_background();

        let out = f.on_samples(&[sample(10.0)]);
        assert_eq!(
            out.directives,
            vec![SensorDirective::DeferUpdates {
                until_traveled_m: 100.0,
                timeout: DEFERRAL_TIMEOUT,
            }]
        );
        assert!(f.is_deferring());

        // Already deferring — no second request.
        let out = f.on_samples(&[sample(10.0)]);
        assert!(out.directives.is_empty());
    }

    #[test]
    fn deferral_finished_reattempts_on_next_sample() {
        let mut f = filter();
        f.start();
        f.enter_background();
        f.on_samples(&[sample(10.0)]);
        assert!(f.is_deferring());

        f.on_deferral_finished(None);
        assert!(!f.is_deferring());

        let out = f.on_samples(&[sample(10.0)]);
        assert_eq!(out.directives.len(), 1);
    }

    #[test]
    fn deferral_failure_self_heals() {
        let mut f = filter();
        f.start();
        f.enter_background();
        f.on_samples(&[sample(10.0)]);

        let out = f.on_failure(&SensorFault::Deferral);
        assert!(out.error.is_none());
        assert!(out.directives.is_empty());
        assert!(!f.is_deferring());
    }

    #[test]
    fn foreground_return_disables_deferral_attempts() {
        let mut f = filter();
        f.start();
        f.enter_background();
        f.on_deferral_finished(None);
        f.enter_foreground();

        let out = f.on_samples(&[sample(10.0)]);
        assert!(out.directives.is_empty());
    }

    #[test]
    fn paused_stops_and_schedules_restart() {
        let mut f = filter();
        f.start();

        let directives = f.on_paused();
        assert_eq!(
            directives,
            vec![
                SensorDirective::Stop,
                SensorDirective::ScheduleRestart {
                    delay: RESTART_DELAY
                },
            ]
        );
        assert!(!f.is_started());
    }

    #[test]
    fn denied_authorization_stops_and_surfaces() {
        let mut f = filter();
        f.start();

        let out = f.on_authorization_changed(AuthorizationStatus::Denied);
        assert_eq!(out.directives, vec![SensorDirective::Stop]);
        assert_eq!(out.error, Some(SensorError::ServiceDisabled));
        assert!(!f.is_started());
    }

    #[test]
    fn foreground_only_grant_keeps_tracking() {
        let mut f = filter();
        f.start();

        let out = f.on_authorization_changed(AuthorizationStatus::ForegroundOnly);
        assert!(out.directives.is_empty());
        assert_eq!(out.error, Some(SensorError::ForegroundOnly));
        assert!(f.is_started());
    }

    #[test]
    fn full_grant_is_a_noop() {
        let mut f = filter();
        f.start();

        let out = f.on_authorization_changed(AuthorizationStatus::Always);
        assert!(out.directives.is_empty());
        assert!(out.error.is_none());
        assert!(f.is_started());
    }

    #[test]
    fn unknown_sensor_failures_are_swallowed() {
        let mut f = filter();
        f.start();

        let out = f.on_failure(&SensorFault::Other("network lost".into()));
        assert!(out.directives.is_empty());
        assert!(out.error.is_none());
        assert!(f.is_started());
    }

    #[test]
    fn denied_failure_stops_tracking() {
        let mut f = filter();
        f.start();

        let out = f.on_failure(&SensorFault::Denied);
        assert_eq!(out.directives, vec![SensorDirective::Stop]);
        assert_eq!(out.error, Some(SensorError::ServiceDisabled));
    }

    #[test]
    fn background_toggle_does_not_change_started() {
        let mut f = filter();
        f.start();
        assert_eq!(
            f.enter_background(),
            vec![SensorDirective::ConfigureBackground { background: true }]
        );
        assert!(f.is_started());
        assert_eq!(
            f.enter_foreground(),
            vec![SensorDirective::ConfigureBackground { background: false }]
        );
        assert!(f.is_started());
    }
}
