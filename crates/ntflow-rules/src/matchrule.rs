//! Exact-match alarm rule
//!
//! The minimal viable rule, used as a conformance fixture: when active and
//! the prospective value equals the configured match value, raise a MAJOR
//! alarm; otherwise clear it. The configuration can live in two places
//! with different trade-offs, both over the same `Rule` surface:
//!
//! - **hidden**: private state on the rule instance. Invisible to clients,
//!   simplest consistency.
//! - **public**: the PV's own extra fields (`match.active`,
//!   `match.match`). Externally visible and settable through the normal
//!   write path, so configuration changes re-trigger evaluation like any
//!   other field change.

use ntflow_core::{Alarm, AlarmSeverity, Field, NtValue, ScalarValue};
use tracing::debug;

use crate::{Rule, RuleFlow};

pub const MATCH_ACTIVE_FIELD: &str = "match.active";
pub const MATCH_VALUE_FIELD: &str = "match.match";
const MATCH_MESSAGE: &str = "match";

enum MatchConfig {
    Hidden { active: bool, target: ScalarValue },
    Public,
}

pub struct MatchRule {
    config: MatchConfig,
}

impl MatchRule {
    /// Match configuration held privately on the rule instance.
    pub fn hidden(target: ScalarValue) -> Self {
        MatchRule {
            config: MatchConfig::Hidden {
                active: true,
                target,
            },
        }
    }

    /// Hidden-strategy rule that is present but not armed.
    pub fn hidden_inactive(target: ScalarValue) -> Self {
        MatchRule {
            config: MatchConfig::Hidden {
                active: false,
                target,
            },
        }
    }

    /// Match configuration read from the PV's `match.*` extra fields.
    pub fn public() -> Self {
        MatchRule {
            config: MatchConfig::Public,
        }
    }

    /// Resolve (active, target) for this evaluation.
    fn resolve(&self, state: &NtValue) -> Option<(bool, ScalarValue)> {
        match &self.config {
            MatchConfig::Hidden { active, target } => Some((*active, target.clone())),
            MatchConfig::Public => {
                let active = matches!(
                    state.extra.get(MATCH_ACTIVE_FIELD),
                    Some(ScalarValue::Bool(true))
                );
                state
                    .extra
                    .get(MATCH_VALUE_FIELD)
                    .map(|t| (active, t.clone()))
            }
        }
    }
}

impl Rule for MatchRule {
    fn name(&self) -> &str {
        "match"
    }

    fn fields(&self) -> Option<&[Field]> {
        match self.config {
            MatchConfig::Hidden { .. } => Some(&[Field::Alarm]),
            MatchConfig::Public => Some(&[Field::Alarm, Field::Extra]),
        }
    }

    fn opened(&mut self, prospective: &mut NtValue) -> RuleFlow {
        let Some((active, target)) = self.resolve(prospective) else {
            return RuleFlow::Continue;
        };
        if !active {
            debug!("match rule not active");
            return RuleFlow::Continue;
        }

        let alarm = if prospective.value == target {
            Alarm::new(AlarmSeverity::Major, prospective.alarm.status, MATCH_MESSAGE)
        } else {
            Alarm::new(AlarmSeverity::NoAlarm, prospective.alarm.status, "")
        };

        if alarm != prospective.alarm {
            prospective.set_alarm(alarm);
        }
        RuleFlow::Continue
    }
}
