//! Alarm evaluation against valueAlarm thresholds
//!
//! A pure mapping from (value, valueAlarm config, previous alarm) to the
//! next alarm state. Threshold test order follows the Normative Types
//! document: highAlarm, lowAlarm, highWarning, lowWarning. Hysteresis keeps
//! the previous severity until the value has retreated far enough past the
//! triggering threshold to stop the alarm chattering at the boundary.

use ntflow_core::{Alarm, AlarmSeverity, ValueAlarm};

const MSG_HIGH_ALARM: &str = "highAlarm";
const MSG_LOW_ALARM: &str = "lowAlarm";
const MSG_HIGH_WARNING: &str = "highWarning";
const MSG_LOW_WARNING: &str = "lowWarning";

/// Evaluate a value against valueAlarm thresholds. Stateless.
pub struct AlarmEvaluator;

impl AlarmEvaluator {
    /// Evaluate one numeric value.
    ///
    /// Returns the alarm the PV should carry after committing `value`.
    /// When the config is inactive the previous alarm is returned
    /// untouched. An incoming `Invalid` severity is sticky: this evaluator
    /// never lowers it.
    pub fn evaluate(value: f64, config: &ValueAlarm, previous: &Alarm) -> Alarm {
        if !config.active {
            return previous.clone();
        }
        if previous.severity == AlarmSeverity::Invalid {
            return previous.clone();
        }

        // First fired band in document order; alarms are tested before
        // warnings so the more severe band wins overlapping limits.
        let candidate = Self::enabled_thresholds(config)
            .find(|(_, limit, _, high)| if *high { value >= *limit } else { value <= *limit });

        let candidate_severity = candidate
            .map(|(_, _, severity, _)| severity)
            .unwrap_or(AlarmSeverity::NoAlarm);

        // Dropping severity is subject to hysteresis: hold the previous
        // state until the value has retreated at least `hysteresis` past
        // the threshold that fired it.
        if candidate_severity < previous.severity {
            if let Some((message, limit, _, high)) =
                Self::enabled_thresholds(config).find(|(message, _, _, _)| *message == previous.message)
            {
                let holding = if high {
                    value > limit - config.hysteresis
                } else {
                    value < limit + config.hysteresis
                };
                if holding {
                    return Alarm::new(previous.severity, previous.status, message);
                }
            }
        }

        match candidate {
            Some((message, _, severity, _)) => Alarm::new(severity, previous.status, message),
            None if previous.severity.is_alarming() || !previous.message.is_empty() => {
                Alarm::new(AlarmSeverity::NoAlarm, previous.status, "")
            }
            None => previous.clone(),
        }
    }

    /// Evaluate every element of an array payload and gather the worst
    /// severity across elements.
    pub fn evaluate_elements(values: &[f64], config: &ValueAlarm, previous: &Alarm) -> Alarm {
        if !config.active || previous.severity == AlarmSeverity::Invalid {
            return previous.clone();
        }

        let mut gathered = Alarm::new(AlarmSeverity::NoAlarm, previous.status, "");
        for &value in values {
            let element = Self::evaluate(value, config, previous);
            if element.severity > gathered.severity {
                gathered = element;
            }
        }
        gathered
    }

    /// Enabled thresholds in Normative Types evaluation order:
    /// (message, limit, severity, is-high-side). A threshold with no
    /// configured limit, or with severity `NoAlarm`, does not participate.
    fn enabled_thresholds(
        config: &ValueAlarm,
    ) -> impl Iterator<Item = (&'static str, f64, AlarmSeverity, bool)> {
        [
            (
                MSG_HIGH_ALARM,
                config.high_alarm_limit,
                config.high_alarm_severity,
                true,
            ),
            (
                MSG_LOW_ALARM,
                config.low_alarm_limit,
                config.low_alarm_severity,
                false,
            ),
            (
                MSG_HIGH_WARNING,
                config.high_warning_limit,
                config.high_warning_severity,
                true,
            ),
            (
                MSG_LOW_WARNING,
                config.low_warning_limit,
                config.low_warning_severity,
                false,
            ),
        ]
        .into_iter()
        .filter(|(_, _, severity, _)| *severity != AlarmSeverity::NoAlarm)
        .filter_map(|(message, limit, severity, high)| {
            limit.map(|limit| (message, limit, severity, high))
        })
    }
}
