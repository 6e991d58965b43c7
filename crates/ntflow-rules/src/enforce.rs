//! Control limit enforcement
//!
//! Pure value quantization and range limiting. Clamping is silent; whether
//! a clamp outcome is reflected in the alarm is a later rule's decision.

use ntflow_core::{Control, ScalarValue};

/// Clamp values to declared control limits and quantize to the minimum
/// step. Stateless.
pub struct LimitEnforcer;

impl LimitEnforcer {
    /// Enforce control limits on a single numeric value.
    ///
    /// A control block at all zeros is treated as unconfigured and passed
    /// through. Otherwise the value is clamped to
    /// `[limit_low, limit_high]`; when `min_step` is nonzero the result is
    /// additionally the nearest multiple of `min_step` measured from
    /// `limit_low` that stays inside the range. Idempotent.
    pub fn enforce(x: f64, control: &Control) -> f64 {
        if !control.is_configured() {
            return x;
        }

        let clamped = x.clamp(control.limit_low, control.limit_high);
        if control.min_step <= 0.0 {
            return clamped;
        }

        let mut steps = ((clamped - control.limit_low) / control.min_step).round();
        let mut quantized = control.limit_low + steps * control.min_step;
        while quantized > control.limit_high && steps > 0.0 {
            steps -= 1.0;
            quantized = control.limit_low + steps * control.min_step;
        }
        quantized.max(control.limit_low)
    }

    /// Enforce control limits element-wise, preserving kind and shape.
    /// Non-numeric payloads and absent control pass through unchanged.
    pub fn enforce_value(value: &ScalarValue, control: Option<&Control>) -> ScalarValue {
        match control {
            Some(control) if value.kind().is_numeric() => {
                value.map_numeric(|x| Self::enforce(x, control))
            }
            _ => value.clone(),
        }
    }
}
