//! Ordered, named handler chain
//!
//! The chain owns its handlers and dispatches lifecycle events through
//! them in registration order. A handler returning `Terminate` stops the
//! chain but keeps the staged state; `Abort` stops the chain and fails
//! the whole operation, identifying the handler that rejected it.

use ntflow_core::{NtError, NtResult, NtValue};
use ntflow_rules::{RuleFlow, WriteOp};
use tracing::{debug, trace};

use crate::Handler;

/// Where to insert a handler relative to the existing chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Position {
    /// After all existing handlers.
    #[default]
    Append,
    /// Before all existing handlers.
    First,
    /// Immediately before the named handler.
    Before(String),
    /// Immediately after the named handler.
    After(String),
}

/// An ordered collection of uniquely named handlers.
#[derive(Default)]
pub struct HandlerChain {
    handlers: Vec<(String, Box<dyn Handler>)>,
}

impl HandlerChain {
    pub fn new() -> Self {
        HandlerChain::default()
    }

    /// Register a handler under a unique name at the given position.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Box<dyn Handler>,
        position: Position,
    ) -> NtResult<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(NtError::DuplicateHandler(name));
        }

        let index = match position {
            Position::Append => self.handlers.len(),
            Position::First => 0,
            Position::Before(anchor) => self.index_of(&anchor)?,
            Position::After(anchor) => self.index_of(&anchor)? + 1,
        };
        self.handlers.insert(index, (name, handler));
        Ok(())
    }

    /// Remove and return the named handler.
    pub fn remove(&mut self, name: &str) -> NtResult<Box<dyn Handler>> {
        let index = self.index_of(name)?;
        Ok(self.handlers.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn index_of(&self, name: &str) -> NtResult<usize> {
        self.handlers
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| NtError::UnknownHandler(name.to_string()))
    }

    /// Run the open phase over an initial value, returning the value the
    /// chain settled on. An abort fails the open.
    pub async fn dispatch_open(&mut self, mut prospective: NtValue) -> NtResult<NtValue> {
        for (name, handler) in &mut self.handlers {
            trace!(handler = %name, "open");
            match handler.open(&mut prospective).await {
                RuleFlow::Continue => {}
                RuleFlow::Terminate => {
                    debug!(handler = %name, "open terminated chain");
                    break;
                }
                RuleFlow::Abort(reason) => {
                    return Err(NtError::Rejected {
                        handler: name.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(prospective)
    }

    /// Run the authorize phase for a proposed write. Terminate here means
    /// the handler has nothing further to say, not that the write skips
    /// the remaining handlers' own authorization.
    pub async fn dispatch_authorize(&mut self, op: &WriteOp) -> NtResult<()> {
        for (name, handler) in &mut self.handlers {
            trace!(handler = %name, pv = %op.pv_name, "authorize");
            if let RuleFlow::Abort(reason) = handler.authorize(op).await {
                return Err(NtError::Rejected {
                    handler: name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Run the write phase, threading the staged prospective state through
    /// every handler. On success the returned value is what the container
    /// commits; on abort nothing is.
    pub async fn dispatch_write(
        &mut self,
        current: &NtValue,
        mut prospective: NtValue,
    ) -> NtResult<NtValue> {
        for (name, handler) in &mut self.handlers {
            trace!(handler = %name, "write");
            match handler.write(current, &mut prospective).await {
                RuleFlow::Continue => {}
                RuleFlow::Terminate => {
                    debug!(handler = %name, "write terminated chain");
                    break;
                }
                RuleFlow::Abort(reason) => {
                    debug!(handler = %name, reason = %reason, "write aborted");
                    return Err(NtError::Rejected {
                        handler: name.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(prospective)
    }

    pub async fn dispatch_first_connect(&mut self) {
        for (_, handler) in &mut self.handlers {
            handler.on_first_connect().await;
        }
    }

    pub async fn dispatch_last_disconnect(&mut self) {
        for (_, handler) in &mut self.handlers {
            handler.on_last_disconnect().await;
        }
    }

    pub async fn dispatch_close(&mut self) {
        for (_, handler) in &mut self.handlers {
            handler.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ntflow_core::ScalarValue;

    /// Appends its tag to the value's message field so tests can observe
    /// dispatch order.
    struct Tagger {
        tag: &'static str,
        flow: RuleFlow,
    }

    impl Tagger {
        fn passing(tag: &'static str) -> Box<dyn Handler> {
            Box::new(Tagger {
                tag,
                flow: RuleFlow::Continue,
            })
        }

        fn terminating(tag: &'static str) -> Box<dyn Handler> {
            Box::new(Tagger {
                tag,
                flow: RuleFlow::Terminate,
            })
        }

        fn aborting(tag: &'static str) -> Box<dyn Handler> {
            Box::new(Tagger {
                tag,
                flow: RuleFlow::abort("no"),
            })
        }

        fn stamp(&self, nt: &mut NtValue) {
            let mut alarm = nt.alarm.clone();
            alarm.message.push_str(self.tag);
            nt.set_alarm(alarm);
        }
    }

    #[async_trait]
    impl Handler for Tagger {
        async fn open(&mut self, prospective: &mut NtValue) -> RuleFlow {
            self.stamp(prospective);
            self.flow.clone()
        }

        async fn write(&mut self, _current: &NtValue, prospective: &mut NtValue) -> RuleFlow {
            self.stamp(prospective);
            self.flow.clone()
        }

        async fn authorize(&mut self, _op: &WriteOp) -> RuleFlow {
            self.flow.clone()
        }
    }

    fn chain_of(handlers: Vec<(&str, Box<dyn Handler>)>) -> HandlerChain {
        let mut chain = HandlerChain::new();
        for (name, handler) in handlers {
            chain
                .register(name, handler, Position::Append)
                .unwrap_or_else(|e| panic!("register {name}: {e}"));
        }
        chain
    }

    #[tokio::test]
    async fn test_dispatch_runs_in_registration_order() {
        let mut chain = chain_of(vec![
            ("a", Tagger::passing("a")),
            ("b", Tagger::passing("b")),
            ("c", Tagger::passing("c")),
        ]);

        let out = chain.dispatch_open(NtValue::new(1i64)).await.unwrap();
        assert_eq!(out.alarm.message, "abc");
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let mut chain = chain_of(vec![("a", Tagger::passing("a"))]);
        let err = chain
            .register("a", Tagger::passing("a"), Position::Append)
            .unwrap_err();
        assert_eq!(err, NtError::DuplicateHandler("a".into()));
    }

    #[tokio::test]
    async fn test_positional_insertion() {
        let mut chain = chain_of(vec![
            ("a", Tagger::passing("a")),
            ("c", Tagger::passing("c")),
        ]);
        chain
            .register("b", Tagger::passing("b"), Position::Before("c".into()))
            .unwrap();
        chain
            .register("z", Tagger::passing("z"), Position::First)
            .unwrap();
        chain
            .register("d", Tagger::passing("d"), Position::After("c".into()))
            .unwrap();

        let names: Vec<_> = chain.names().collect();
        assert_eq!(names, vec!["z", "a", "b", "c", "d"]);

        let err = chain
            .register("x", Tagger::passing("x"), Position::After("nope".into()))
            .unwrap_err();
        assert_eq!(err, NtError::UnknownHandler("nope".into()));
    }

    #[tokio::test]
    async fn test_terminate_short_circuits_but_keeps_state() {
        let mut chain = chain_of(vec![
            ("a", Tagger::passing("a")),
            ("stop", Tagger::terminating("s")),
            ("c", Tagger::passing("c")),
        ]);

        let current = NtValue::new(1i64);
        let out = chain
            .dispatch_write(&current, current.clone())
            .await
            .unwrap();
        assert_eq!(out.alarm.message, "as");
    }

    #[tokio::test]
    async fn test_abort_names_the_rejecting_handler() {
        let mut chain = chain_of(vec![
            ("a", Tagger::passing("a")),
            ("gate", Tagger::aborting("g")),
            ("c", Tagger::passing("c")),
        ]);

        let current = NtValue::new(1i64);
        let err = chain
            .dispatch_write(&current, current.clone())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            NtError::Rejected {
                handler: "gate".into(),
                reason: "no".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_authorize_abort_rejects_write() {
        let mut chain = chain_of(vec![("gate", Tagger::aborting("g"))]);

        let op = WriteOp::new("dev:x", NtValue::new(ScalarValue::Int(2)));
        let err = chain.dispatch_authorize(&op).await.unwrap_err();
        assert!(matches!(err, NtError::Rejected { handler, .. } if handler == "gate"));
    }

    #[tokio::test]
    async fn test_remove_handler() {
        let mut chain = chain_of(vec![
            ("a", Tagger::passing("a")),
            ("b", Tagger::passing("b")),
        ]);

        assert!(chain.remove("a").is_ok());
        assert_eq!(chain.len(), 1);
        assert!(!chain.contains("a"));

        assert!(matches!(
            chain.remove("a"),
            Err(NtError::UnknownHandler(name)) if name == "a"
        ));
    }
}
