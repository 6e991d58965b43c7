//! Standard Normative Type sub-structures
//!
//! Alarm, timeStamp, display, control and valueAlarm. The data here is
//! descriptive; the behavior their presence implies lives in ntflow-rules.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{NtError, NtResult};

/// Alarm severity, a total order. `NoAlarm` is the resting state.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
#[serde(rename_all = "lowercase")]
pub enum AlarmSeverity {
    #[default]
    NoAlarm = 0,
    Minor = 1,
    Major = 2,
    Invalid = 3,
}

impl AlarmSeverity {
    #[inline]
    pub fn is_alarming(self) -> bool {
        self != AlarmSeverity::NoAlarm
    }
}

/// Alarm status code
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
#[serde(rename_all = "lowercase")]
pub enum AlarmStatus {
    #[default]
    NoStatus = 0,
    Device = 1,
    Driver = 2,
    Record = 3,
    Db = 4,
    Conf = 5,
    Undefined = 6,
    Client = 7,
}

/// Alarm state of a PV
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub severity: AlarmSeverity,
    pub status: AlarmStatus,
    pub message: String,
}

impl Alarm {
    pub fn none() -> Self {
        Alarm::default()
    }

    pub fn new(severity: AlarmSeverity, status: AlarmStatus, message: impl Into<String>) -> Self {
        Alarm {
            severity,
            status,
            message: message.into(),
        }
    }
}

/// Structured timestamp: seconds plus nanoseconds past the epoch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStamp {
    pub seconds_past_epoch: i64,
    pub nanoseconds: i32,
    pub user_tag: i32,
}

impl TimeStamp {
    pub const ZERO: TimeStamp = TimeStamp {
        seconds_past_epoch: 0,
        nanoseconds: 0,
        user_tag: 0,
    };

    pub fn new(seconds_past_epoch: i64, nanoseconds: i32) -> Self {
        TimeStamp {
            seconds_past_epoch,
            nanoseconds,
            user_tag: 0,
        }
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        TimeStamp {
            seconds_past_epoch: elapsed.as_secs() as i64,
            nanoseconds: elapsed.subsec_nanos() as i32,
            user_tag: 0,
        }
    }

    pub fn is_set(&self) -> bool {
        self.seconds_past_epoch != 0 || self.nanoseconds != 0
    }
}

/// Display metadata. Carried through unchanged, never enforced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Display {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub limit_low: f64,
    #[serde(default)]
    pub limit_high: f64,
    #[serde(default)]
    pub precision: i32,
}

/// Control limits: the committed value must stay in
/// `[limit_low, limit_high]`, quantized to `min_step` when nonzero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub limit_low: f64,
    pub limit_high: f64,
    #[serde(default)]
    pub min_step: f64,
}

impl Control {
    pub fn new(limit_low: f64, limit_high: f64) -> Self {
        Control {
            limit_low,
            limit_high,
            min_step: 0.0,
        }
    }

    pub fn with_min_step(mut self, min_step: f64) -> Self {
        self.min_step = min_step;
        self
    }

    /// A control block left at all zeros is treated as unconfigured and
    /// ignored by enforcement. Locking a PV to 0 needs an explicit rule.
    pub fn is_configured(&self) -> bool {
        self.limit_low != 0.0 || self.limit_high != 0.0
    }

    pub fn validate(&self) -> NtResult<()> {
        if self.limit_low > self.limit_high {
            return Err(NtError::InvalidConfiguration(format!(
                "control.limitLow {} > control.limitHigh {}",
                self.limit_low, self.limit_high
            )));
        }
        if self.min_step < 0.0 {
            return Err(NtError::InvalidConfiguration(format!(
                "control.minStep {} is negative",
                self.min_step
            )));
        }
        Ok(())
    }
}

/// Value-triggered alarm thresholds with hysteresis.
///
/// A threshold participates only when its limit is supplied; it can also
/// be disabled explicitly by configuring its severity as `NoAlarm`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueAlarm {
    pub active: bool,
    #[serde(default)]
    pub low_alarm_limit: Option<f64>,
    #[serde(default)]
    pub low_warning_limit: Option<f64>,
    #[serde(default)]
    pub high_warning_limit: Option<f64>,
    #[serde(default)]
    pub high_alarm_limit: Option<f64>,
    #[serde(default = "default_major")]
    pub low_alarm_severity: AlarmSeverity,
    #[serde(default = "default_minor")]
    pub low_warning_severity: AlarmSeverity,
    #[serde(default = "default_minor")]
    pub high_warning_severity: AlarmSeverity,
    #[serde(default = "default_major")]
    pub high_alarm_severity: AlarmSeverity,
    #[serde(default)]
    pub hysteresis: f64,
}

fn default_major() -> AlarmSeverity {
    AlarmSeverity::Major
}

fn default_minor() -> AlarmSeverity {
    AlarmSeverity::Minor
}

impl Default for ValueAlarm {
    fn default() -> Self {
        ValueAlarm {
            active: false,
            low_alarm_limit: None,
            low_warning_limit: None,
            high_warning_limit: None,
            high_alarm_limit: None,
            low_alarm_severity: AlarmSeverity::Major,
            low_warning_severity: AlarmSeverity::Minor,
            high_warning_severity: AlarmSeverity::Minor,
            high_alarm_severity: AlarmSeverity::Major,
            hysteresis: 0.0,
        }
    }
}

impl ValueAlarm {
    pub fn validate(&self) -> NtResult<()> {
        if self.hysteresis < 0.0 {
            return Err(NtError::InvalidConfiguration(format!(
                "valueAlarm.hysteresis {} is negative",
                self.hysteresis
            )));
        }

        // Enabled thresholds must be ordered:
        // lowAlarm <= lowWarning <= highWarning <= highAlarm
        let enabled = [
            ("lowAlarm", self.low_alarm_limit, self.low_alarm_severity),
            (
                "lowWarning",
                self.low_warning_limit,
                self.low_warning_severity,
            ),
            (
                "highWarning",
                self.high_warning_limit,
                self.high_warning_severity,
            ),
            (
                "highAlarm",
                self.high_alarm_limit,
                self.high_alarm_severity,
            ),
        ];

        let mut prev: Option<(&str, f64)> = None;
        for (name, limit, severity) in enabled {
            let Some(limit) = limit else {
                continue;
            };
            if severity == AlarmSeverity::NoAlarm {
                continue;
            }
            if let Some((prev_name, prev_limit)) = prev {
                if prev_limit > limit {
                    return Err(NtError::InvalidConfiguration(format!(
                        "valueAlarm.{prev_name}Limit {prev_limit} > valueAlarm.{name}Limit {limit}"
                    )));
                }
            }
            prev = Some((name, limit));
        }

        Ok(())
    }
}
