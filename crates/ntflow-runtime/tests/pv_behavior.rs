//! End-to-end PV behavior
//!
//! Full-stack scenarios: a recipe-built PV with its standard chain,
//! written through the public surface, observed through `current()` and
//! subscriptions.

use ntflow_chain::{HandlerChain, Position, RuleHandler};
use ntflow_core::{AlarmSeverity, Control, NtError, NtValue, ScalarValue, ValueAlarm};
use ntflow_rules::{MatchRule, RuleFlow};
use ntflow_runtime::{PvRecipe, PvRegistry, SharedPv, WriteRequest};
use tokio::sync::broadcast::error::TryRecvError;

fn bounded_alarmed_recipe(name: &str) -> PvRecipe {
    PvRecipe::new(name, 0.0)
        .with_control(Control::new(-10.0, 10.0))
        .with_value_alarm(ValueAlarm {
            active: true,
            high_warning_limit: Some(5.0),
            high_alarm_limit: Some(8.0),
            ..ValueAlarm::default()
        })
}

#[tokio::test]
async fn test_write_beyond_limit_commits_clamped_value() {
    let pv = PvRecipe::new("dev:bounded", 0.0)
        .with_control(Control::new(-10.0, 10.0))
        .build()
        .await
        .unwrap();

    let committed = pv.write(WriteRequest::value(12.7)).await.unwrap();
    assert_eq!(committed.value, ScalarValue::Float(10.0));
    assert_eq!(pv.current().unwrap().value, ScalarValue::Float(10.0));
}

#[tokio::test]
async fn test_warning_then_alarm_on_clamped_value() {
    let pv = bounded_alarmed_recipe("dev:alarmed").build().await.unwrap();

    // 6.6 is in range and above the warning threshold
    let committed = pv.write(WriteRequest::value(6.6)).await.unwrap();
    assert_eq!(committed.value, ScalarValue::Float(6.6));
    assert_eq!(committed.alarm.severity, AlarmSeverity::Minor);
    assert_eq!(committed.alarm.message, "highWarning");

    // 12.7 clamps to 10.0, and the alarm is computed from the clamped
    // value, so it crosses the alarm threshold
    let committed = pv.write(WriteRequest::value(12.7)).await.unwrap();
    assert_eq!(committed.value, ScalarValue::Float(10.0));
    assert_eq!(committed.alarm.severity, AlarmSeverity::Major);
    assert_eq!(committed.alarm.message, "highAlarm");

    // Back in range clears the alarm
    let committed = pv.write(WriteRequest::value(0.0)).await.unwrap();
    assert_eq!(committed.alarm.severity, AlarmSeverity::NoAlarm);
    assert_eq!(committed.alarm.message, "");
}

#[tokio::test]
async fn test_match_rule_raises_and_clears() {
    let pv = PvRecipe::new("dev:imatch", 0i64)
        .build_with(vec![(
            "match".to_string(),
            RuleHandler::boxed(MatchRule::hidden(ScalarValue::Int(5))),
        )])
        .await
        .unwrap();

    let committed = pv.write(WriteRequest::value(5i64)).await.unwrap();
    assert_eq!(committed.alarm.severity, AlarmSeverity::Major);
    assert_eq!(committed.alarm.message, "match");

    let committed = pv.write(WriteRequest::value(6i64)).await.unwrap();
    assert_eq!(committed.alarm.severity, AlarmSeverity::NoAlarm);
    assert_eq!(committed.alarm.message, "");
}

#[tokio::test]
async fn test_public_match_config_is_writable() {
    let pv = SharedPv::new("dev:imatch-pub", {
        let mut chain = HandlerChain::new();
        chain
            .register("match", RuleHandler::boxed(MatchRule::public()), Position::Append)
            .unwrap();
        chain
    });
    pv.open(
        NtValue::new(0i64)
            .with_extra("match.active", true)
            .with_extra("match.match", 5i64),
    )
    .await
    .unwrap();

    let committed = pv.write(WriteRequest::value(5i64)).await.unwrap();
    assert_eq!(committed.alarm.severity, AlarmSeverity::Major);

    // Retargeting through the write path re-evaluates like any other write
    let mut delta = NtValue::new(6i64);
    delta.clear_marks();
    delta.set_value(6i64);
    delta.set_extra("match.match", 6i64);
    let committed = pv.write(WriteRequest::delta(delta)).await.unwrap();
    assert_eq!(committed.alarm.severity, AlarmSeverity::Major);
}

#[tokio::test]
async fn test_plain_pv_has_no_behavior() {
    let pv = PvRecipe::new("dev:plain", 0.0).build().await.unwrap();

    let committed = pv.write(WriteRequest::value(1_000_000.0)).await.unwrap();
    assert_eq!(committed.value, ScalarValue::Float(1_000_000.0));
    assert_eq!(committed.alarm.severity, AlarmSeverity::NoAlarm);
}

#[tokio::test]
async fn test_rejected_write_rolls_nothing_back() {
    struct Gate;

    #[async_trait::async_trait]
    impl ntflow_chain::Handler for Gate {
        async fn write(&mut self, _current: &NtValue, prospective: &mut NtValue) -> RuleFlow {
            // Mutates the staged state, then rejects: the mutation must
            // never become visible.
            prospective.set_value(999.0);
            RuleFlow::abort("quota exceeded")
        }
    }

    let mut chain = HandlerChain::new();
    chain
        .register("gate", Box::new(Gate) as Box<dyn ntflow_chain::Handler>, Position::Append)
        .unwrap();

    let pv = SharedPv::new("dev:gated", chain);
    pv.open(NtValue::new(1.0)).await.unwrap();
    let mut sub = pv.subscribe();

    let err = pv.write(WriteRequest::value(2.0)).await.unwrap_err();
    assert_eq!(
        err,
        NtError::Rejected {
            handler: "gate".into(),
            reason: "quota exceeded".into(),
        }
    );
    assert_eq!(pv.current().unwrap().value, ScalarValue::Float(1.0));
    assert!(sub.try_recv().is_err());
}

#[tokio::test]
async fn test_concurrent_writers_commit_whole_states() {
    let pv = bounded_alarmed_recipe("dev:contended").build().await.unwrap();
    let mut sub = pv.subscribe();

    let mut writers = Vec::new();
    for i in 0..8 {
        let pv = pv.clone();
        writers.push(tokio::spawn(async move {
            for j in 0..10 {
                let value = ((i * 10 + j) % 15) as f64;
                // Clamped or not, never rejected
                pv.write(WriteRequest::value(value)).await
                    .unwrap_or_else(|e| panic!("writer {i}: {e}"));
            }
        }));
    }
    for writer in writers {
        writer.await.unwrap();
    }

    // Every observed snapshot is internally consistent: the alarm always
    // corresponds to the committed value, never to a torn intermediate.
    let mut observed = 0usize;
    loop {
        let snapshot = match sub.try_recv() {
            Ok(snapshot) => snapshot,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        };
        observed += 1;
        let Some(x) = snapshot.value.as_f64() else {
            panic!("non-numeric snapshot");
        };
        assert!((-10.0..=10.0).contains(&x));
        let expected = if x >= 8.0 {
            AlarmSeverity::Major
        } else if x >= 5.0 {
            AlarmSeverity::Minor
        } else {
            AlarmSeverity::NoAlarm
        };
        assert_eq!(snapshot.alarm.severity, expected, "value {x}");
    }
    assert!(observed > 0);
}

#[tokio::test]
async fn test_array_pv_clamps_and_gathers() {
    let pv = bounded_alarmed_recipe("dev:wave");
    let pv = PvRecipe {
        initial: ScalarValue::FloatArray(vec![0.0, 0.0, 0.0]),
        ..pv
    }
    .build()
    .await
    .unwrap();

    let committed = pv
        .write(WriteRequest::value(ScalarValue::FloatArray(vec![1.0, 6.0, 42.0])))
        .await
        .unwrap();
    assert_eq!(
        committed.value,
        ScalarValue::FloatArray(vec![1.0, 6.0, 10.0])
    );
    // Worst element severity wins: 10.0 crosses highAlarm
    assert_eq!(committed.alarm.severity, AlarmSeverity::Major);
}

#[tokio::test]
async fn test_registry_serves_independent_pvs() {
    let registry = PvRegistry::new();
    registry
        .register(PvRecipe::new("dev:a", 0.0).build().await.unwrap())
        .unwrap();
    registry
        .register(bounded_alarmed_recipe("dev:b").build().await.unwrap())
        .unwrap();

    let a = registry.lookup("dev:a").unwrap();
    let b = registry.lookup("dev:b").unwrap();

    a.write(WriteRequest::value(50.0)).await.unwrap();
    b.write(WriteRequest::value(50.0)).await.unwrap();

    assert_eq!(a.current().unwrap().value, ScalarValue::Float(50.0));
    assert_eq!(b.current().unwrap().value, ScalarValue::Float(10.0));
}
