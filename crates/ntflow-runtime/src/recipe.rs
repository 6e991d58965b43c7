//! Declarative PV construction
//!
//! A `PvRecipe` is the serde-friendly description an external
//! configuration layer hands us: initial value, display metadata, and the
//! optional sub-structures. Building a recipe validates the configuration
//! eagerly, assembles the standard rule set in canonical order, and opens
//! the PV. An invalid recipe never opens.

use ntflow_chain::{Handler, HandlerChain, Position, RuleHandler};
use ntflow_core::{Control, Display, NtResult, NtValue, ScalarValue, ValueAlarm};
use ntflow_rules::{AlarmFieldsRule, ControlRule, ReadOnlyRule, TimestampRule, ValueAlarmRule};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::SharedPv;

/// Handler name the recipe registers the timestamp rule under. User
/// handlers are inserted before it so the stamp covers their mutations.
pub const TIMESTAMP_HANDLER: &str = "timestamp";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PvRecipe {
    pub name: String,
    pub initial: ScalarValue,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub control: Option<Control>,
    #[serde(default)]
    pub value_alarm: Option<ValueAlarm>,
    #[serde(default)]
    pub read_only: bool,
}

impl PvRecipe {
    pub fn new(name: impl Into<String>, initial: impl Into<ScalarValue>) -> Self {
        PvRecipe {
            name: name.into(),
            initial: initial.into(),
            description: None,
            units: None,
            control: None,
            value_alarm: None,
            read_only: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_control(mut self, control: Control) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_value_alarm(mut self, value_alarm: ValueAlarm) -> Self {
        self.value_alarm = Some(value_alarm);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    fn initial_value(&self) -> NtValue {
        let mut nt = NtValue::new(self.initial.clone());
        if self.description.is_some() || self.units.is_some() {
            nt = nt.with_display(Display {
                description: self.description.clone().unwrap_or_default(),
                units: self.units.clone().unwrap_or_default(),
                ..Display::default()
            });
        }
        if let Some(control) = self.control {
            nt = nt.with_control(control);
        }
        if let Some(value_alarm) = self.value_alarm {
            nt = nt.with_value_alarm(value_alarm);
        }
        nt
    }

    /// The standard chain implied by the declared sub-structures. The
    /// order is fixed: alarm stripping first, then control, then
    /// valueAlarm, timestamp always last.
    fn standard_chain(&self) -> NtResult<HandlerChain> {
        let mut chain = HandlerChain::new();
        if self.read_only {
            chain.register("read_only", RuleHandler::boxed(ReadOnlyRule), Position::Append)?;
        }
        chain.register("alarm", RuleHandler::boxed(AlarmFieldsRule), Position::Append)?;
        chain.register("control", RuleHandler::boxed(ControlRule), Position::Append)?;
        chain.register("valueAlarm", RuleHandler::boxed(ValueAlarmRule), Position::Append)?;
        chain.register(
            TIMESTAMP_HANDLER,
            RuleHandler::boxed(TimestampRule::new()),
            Position::Append,
        )?;
        Ok(chain)
    }

    /// Validate, assemble the standard chain and open the PV.
    pub async fn build(&self) -> NtResult<SharedPv> {
        self.build_with(Vec::new()).await
    }

    /// As `build`, inserting the given user handlers between the standard
    /// rules and the timestamp.
    pub async fn build_with(
        &self,
        user_handlers: Vec<(String, Box<dyn Handler>)>,
    ) -> NtResult<SharedPv> {
        let initial = self.initial_value();
        initial.validate()?;

        let mut chain = self.standard_chain()?;
        for (name, handler) in user_handlers {
            chain.register(name, handler, Position::Before(TIMESTAMP_HANDLER.into()))?;
        }

        let pv = SharedPv::new(self.name.clone(), chain);
        pv.open(initial).await?;
        info!(pv = %self.name, shape = %self.initial.shape(), "built");
        Ok(pv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteRequest;
    use ntflow_core::{AlarmSeverity, NtError};
    use ntflow_rules::MatchRule;

    #[tokio::test]
    async fn test_build_applies_standard_rules() {
        let pv = PvRecipe::new("dev:temp", 0.0)
            .with_units("degC")
            .with_control(Control::new(-10.0, 10.0))
            .build()
            .await
            .unwrap();

        let committed = pv.write(WriteRequest::value(12.7)).await.unwrap();
        assert_eq!(committed.value, ScalarValue::Float(10.0));
        assert!(committed.time_stamp.is_set());
    }

    #[tokio::test]
    async fn test_invalid_configuration_never_opens() {
        let err = PvRecipe::new("dev:bad", 0.0)
            .with_control(Control::new(5.0, -5.0))
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, NtError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_read_only_recipe_rejects_writes() {
        let pv = PvRecipe::new("dev:ro", 1i64).read_only().build().await.unwrap();

        let err = pv.write(WriteRequest::value(2i64)).await.unwrap_err();
        assert!(matches!(err, NtError::Rejected { handler, .. } if handler == "read_only"));
    }

    #[tokio::test]
    async fn test_user_handlers_run_before_timestamp() {
        let pv = PvRecipe::new("dev:m", 0i64)
            .build_with(vec![(
                "match".to_string(),
                RuleHandler::boxed(MatchRule::hidden(ScalarValue::Int(5))),
            )])
            .await
            .unwrap();

        let committed = pv.write(WriteRequest::value(5i64)).await.unwrap();
        assert_eq!(committed.alarm.severity, AlarmSeverity::Major);
        assert_eq!(committed.alarm.message, "match");
        assert!(committed.time_stamp.is_set());
    }

    #[test]
    fn test_recipe_deserializes_from_json() {
        let recipe: PvRecipe = serde_json::from_str(
            r#"{
                "name": "dev:pressure",
                "initial": 0.0,
                "units": "bar",
                "control": { "limit_low": -10.0, "limit_high": 10.0 },
                "value_alarm": {
                    "active": true,
                    "high_warning_limit": 5.0,
                    "high_alarm_limit": 8.0
                }
            }"#,
        )
        .unwrap_or_else(|e| panic!("deserialize: {e}"));

        assert_eq!(recipe.name, "dev:pressure");
        assert_eq!(recipe.control, Some(Control::new(-10.0, 10.0)));
        let va = recipe.value_alarm.unwrap();
        assert!(va.active);
        assert_eq!(va.high_alarm_severity, AlarmSeverity::Major);
    }
}
