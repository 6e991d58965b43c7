//! Built-in rules for the standard Normative Type sub-structures

use ntflow_core::{Control, Field, Kind, NtValue, ScalarValue, TimeStamp};
use tracing::debug;

use crate::{AlarmEvaluator, LimitEnforcer, Rule, RuleFlow, WriteOp};

/// Makes the alarm field read-only for writes. The alarm state belongs to
/// the rules that compute it, not to the writer.
pub struct AlarmFieldsRule;

impl Rule for AlarmFieldsRule {
    fn name(&self) -> &str {
        "alarm"
    }

    fn fields(&self) -> Option<&[Field]> {
        Some(&[Field::Alarm])
    }

    fn read_only(&self) -> bool {
        true
    }

    fn opened(&mut self, _prospective: &mut NtValue) -> RuleFlow {
        RuleFlow::Continue
    }
}

/// Rejects every write. Open still succeeds; the PV is server-updated only.
pub struct ReadOnlyRule;

impl Rule for ReadOnlyRule {
    fn name(&self) -> &str {
        "read_only"
    }

    fn fields(&self) -> Option<&[Field]> {
        None
    }

    fn authorize(&mut self, _op: &WriteOp) -> RuleFlow {
        RuleFlow::abort("read-only")
    }

    fn opened(&mut self, _prospective: &mut NtValue) -> RuleFlow {
        RuleFlow::Continue
    }

    fn compare(&mut self, _current: &NtValue, _prospective: &mut NtValue) -> RuleFlow {
        RuleFlow::abort("read-only")
    }
}

/// Applies the behavior implied by the control sub-structure: clamping to
/// `[limitLow, limitHigh]`, min-step quantization, and suppression of
/// changes smaller than `minStep`.
pub struct ControlRule;

impl ControlRule {
    fn numeric(kind: Kind, x: f64) -> ScalarValue {
        match kind {
            Kind::Int => ScalarValue::Int(x.round() as i64),
            _ => ScalarValue::Float(x),
        }
    }

    /// One element of a write against its committed counterpart. A change
    /// smaller than `minStep` reverts to the committed element untouched;
    /// a large enough change moves in whole steps from the committed
    /// element, then clamps.
    fn step_element(old: f64, new: f64, control: &Control) -> f64 {
        if control.min_step > 0.0 {
            if old != new && (new - old).abs() < control.min_step {
                debug!(old, new, "change below minStep, reverting");
                return old;
            }
            let stepped = old + ((new - old) / control.min_step).round() * control.min_step;
            if control.is_configured() {
                return stepped.clamp(control.limit_low, control.limit_high);
            }
            return stepped;
        }
        LimitEnforcer::enforce(new, control)
    }
}

impl Rule for ControlRule {
    fn name(&self) -> &str {
        "control"
    }

    fn fields(&self) -> Option<&[Field]> {
        Some(&[Field::Control])
    }

    fn opened(&mut self, prospective: &mut NtValue) -> RuleFlow {
        let Some(control) = prospective.control else {
            return RuleFlow::Continue;
        };

        let enforced = LimitEnforcer::enforce_value(&prospective.value, Some(&control));
        if enforced != prospective.value {
            debug!(value = ?enforced, "control limit exceeded, changing value");
            prospective.set_value(enforced);
        }

        RuleFlow::Continue
    }

    fn compare(&mut self, current: &NtValue, prospective: &mut NtValue) -> RuleFlow {
        let Some(control) = prospective.control else {
            return RuleFlow::Continue;
        };
        let (Some(old), Some(new)) = (
            current.value.numeric_elements(),
            prospective.value.numeric_elements(),
        ) else {
            return RuleFlow::Continue;
        };

        // On a length change there is no committed element to step from,
        // so those writes go through open-style enforcement.
        if old.len() != new.len() {
            return self.opened(prospective);
        }

        let kind = prospective.value.kind();
        let mut result = prospective.value.clone();
        for (i, (&o, &n)) in old.iter().zip(new.iter()).enumerate() {
            let x = Self::step_element(o, n, &control);
            result.set_element(i, Self::numeric(kind, x));
        }

        if result != prospective.value {
            debug!(value = ?result, "control limits applied, changing value");
            prospective.set_value(result);
        }
        RuleFlow::Continue
    }
}

/// Computes the alarm state from the valueAlarm sub-structure.
pub struct ValueAlarmRule;

impl ValueAlarmRule {
    fn apply(prospective: &mut NtValue, previous: &ntflow_core::Alarm) -> RuleFlow {
        let Some(config) = prospective.value_alarm else {
            return RuleFlow::Continue;
        };
        if !config.active {
            debug!("valueAlarm not active");
            return RuleFlow::Continue;
        }
        let Some(elements) = prospective.value.numeric_elements() else {
            return RuleFlow::Continue;
        };

        let alarm = if prospective.value.is_array() {
            AlarmEvaluator::evaluate_elements(&elements, &config, previous)
        } else {
            AlarmEvaluator::evaluate(elements[0], &config, previous)
        };

        if alarm != prospective.alarm {
            debug!(severity = ?alarm.severity, message = %alarm.message, "setting alarm");
            prospective.set_alarm(alarm);
        }

        RuleFlow::Continue
    }
}

impl Rule for ValueAlarmRule {
    fn name(&self) -> &str {
        "valueAlarm"
    }

    fn fields(&self) -> Option<&[Field]> {
        Some(&[Field::Alarm, Field::ValueAlarm])
    }

    fn opened(&mut self, prospective: &mut NtValue) -> RuleFlow {
        let previous = prospective.alarm.clone();
        Self::apply(prospective, &previous)
    }

    fn compare(&mut self, current: &NtValue, prospective: &mut NtValue) -> RuleFlow {
        Self::apply(prospective, &current.alarm)
    }
}

/// Stamps the prospective state with the commit time unless the writer
/// supplied a timestamp of their own. Registered last so every mutation
/// earlier rules make is covered by the stamp.
pub struct TimestampRule {
    clock: fn() -> TimeStamp,
}

impl TimestampRule {
    pub fn new() -> Self {
        TimestampRule {
            clock: TimeStamp::now,
        }
    }

    /// Substitute the wall clock, for deterministic tests.
    pub fn with_clock(clock: fn() -> TimeStamp) -> Self {
        TimestampRule { clock }
    }
}

impl Default for TimestampRule {
    fn default() -> Self {
        TimestampRule::new()
    }
}

impl Rule for TimestampRule {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn fields(&self) -> Option<&[Field]> {
        Some(&[Field::TimeStamp])
    }

    // The stamp applies to every transition, not only writes that touch
    // the timeStamp field.
    fn is_applicable(&self, _prospective: &NtValue) -> bool {
        true
    }

    fn opened(&mut self, prospective: &mut NtValue) -> RuleFlow {
        if prospective.changed(Field::TimeStamp) && prospective.time_stamp.is_set() {
            debug!("using caller-supplied timeStamp");
        } else {
            prospective.set_time_stamp((self.clock)());
        }
        RuleFlow::Continue
    }
}
