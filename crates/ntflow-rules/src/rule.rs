//! The three-phase rule interface
//!
//! A `Rule` packages the PV logic implied by one sub-structure (or one
//! user policy) as three lifecycle callbacks:
//!
//! 1. `authorize` - identification/authorization for a proposed write. It
//!    must not compare against current or prospective state. The default
//!    neither accepts nor rejects; it defers to later rules.
//! 2. `compare` - given the current and prospective states, logic that
//!    depends on the delta. May mutate the prospective value (clamp, set
//!    alarm) or abort.
//! 3. `opened` - given only the opened value, seed derived fields at
//!    creation time. No prior state exists.
//!
//! Phases 1 then 2 run inside a write dispatch; phase 3 runs only on open.
//! Nothing runs after commit - post-commit reactions belong to the
//! subscriber mechanism, outside the rule contract.

use ntflow_core::{Field, NtValue};

use crate::RuleFlow;

/// Identification attached to a proposed write, for the authorize phase.
/// Policy decisions belong to rule implementations; the core only carries
/// the information.
#[derive(Clone, Debug)]
pub struct WriteOp {
    /// Name of the PV being written.
    pub pv_name: String,
    /// Network peer the write arrived from, when known.
    pub peer: Option<String>,
    /// Authenticated account of the writer, when known.
    pub account: Option<String>,
    /// The partial value the writer supplied, marked fields only.
    pub delta: NtValue,
}

impl WriteOp {
    pub fn new(pv_name: impl Into<String>, delta: NtValue) -> Self {
        WriteOp {
            pv_name: pv_name.into(),
            peer: None,
            account: None,
            delta,
        }
    }
}

/// A rule applied to a PV through the handler chain.
pub trait Rule: Send {
    /// Human-readable name, used in error and debug messages and as the
    /// default registration name.
    fn name(&self) -> &str;

    /// The fields this rule manages. `None` means the rule always applies;
    /// otherwise the rule runs only when all its fields are present and
    /// one of them (or the value) changed.
    fn fields(&self) -> Option<&[Field]>;

    /// Read-only rules strip caller changes to their managed fields before
    /// the compare phase runs.
    fn read_only(&self) -> bool {
        false
    }

    /// Whether the rule should run against this prospective state.
    fn is_applicable(&self, prospective: &NtValue) -> bool {
        let Some(fields) = self.fields() else {
            return true;
        };

        if !fields.iter().all(|&f| prospective.has_field(f)) {
            return false;
        }

        // If neither the managed fields nor the value changed, the rule
        // has nothing to do.
        fields
            .iter()
            .any(|&f| prospective.changed(f))
            || prospective.changed(Field::Value)
    }

    /// Phase 1: authorize a proposed write.
    fn authorize(&mut self, _op: &WriteOp) -> RuleFlow {
        RuleFlow::Continue
    }

    /// Phase 3: react to an opened value.
    fn opened(&mut self, prospective: &mut NtValue) -> RuleFlow;

    /// Phase 2: compare current against prospective. Rules whose logic
    /// only needs the future state fall back to the open-time logic.
    fn compare(&mut self, _current: &NtValue, prospective: &mut NtValue) -> RuleFlow {
        self.opened(prospective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntflow_core::Control;

    struct FieldBound;

    impl Rule for FieldBound {
        fn name(&self) -> &str {
            "field_bound"
        }

        fn fields(&self) -> Option<&[Field]> {
            Some(&[Field::Control])
        }

        fn opened(&mut self, _prospective: &mut NtValue) -> RuleFlow {
            RuleFlow::Continue
        }
    }

    struct Unbound;

    impl Rule for Unbound {
        fn name(&self) -> &str {
            "unbound"
        }

        fn fields(&self) -> Option<&[Field]> {
            None
        }

        fn opened(&mut self, _prospective: &mut NtValue) -> RuleFlow {
            RuleFlow::Continue
        }
    }

    #[test]
    fn test_applicability_requires_field_presence() {
        let rule = FieldBound;

        let without = NtValue::new(1.0);
        assert!(!rule.is_applicable(&without));

        let with = NtValue::new(1.0).with_control(Control::new(-1.0, 1.0));
        assert!(rule.is_applicable(&with));
    }

    #[test]
    fn test_applicability_requires_a_change() {
        let rule = FieldBound;

        let mut nt = NtValue::new(1.0).with_control(Control::new(-1.0, 1.0));
        nt.clear_marks();
        assert!(!rule.is_applicable(&nt));

        nt.set_value(2.0);
        assert!(rule.is_applicable(&nt));

        let mut nt = NtValue::new(1.0).with_control(Control::new(-1.0, 1.0));
        nt.clear_marks();
        nt.mark(Field::Control);
        assert!(rule.is_applicable(&nt));
    }

    #[test]
    fn test_unbound_rule_always_applies() {
        let rule = Unbound;
        let mut nt = NtValue::new(1.0);
        nt.clear_marks();
        assert!(rule.is_applicable(&nt));
    }
}
