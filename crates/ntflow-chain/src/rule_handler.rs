//! Rule-to-handler adapter
//!
//! Bridges the synchronous three-phase `Rule` interface into the async
//! handler chain. The adapter owns the applicability check and the
//! read-only stripping so individual rules stay free of chain mechanics.

use async_trait::async_trait;
use ntflow_core::NtValue;
use ntflow_rules::{Rule, RuleFlow, WriteOp};
use tracing::trace;

use crate::Handler;

pub struct RuleHandler<R: Rule> {
    rule: R,
}

impl<R: Rule> RuleHandler<R> {
    pub fn new(rule: R) -> Self {
        RuleHandler { rule }
    }

    pub fn boxed(rule: R) -> Box<dyn Handler>
    where
        R: 'static,
    {
        Box::new(RuleHandler { rule })
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }
}

#[async_trait]
impl<R: Rule> Handler for RuleHandler<R> {
    async fn open(&mut self, prospective: &mut NtValue) -> RuleFlow {
        if !self.rule.is_applicable(prospective) {
            trace!(rule = %self.rule.name(), "not applicable at open");
            return RuleFlow::Continue;
        }
        self.rule.opened(prospective)
    }

    async fn authorize(&mut self, op: &WriteOp) -> RuleFlow {
        self.rule.authorize(op)
    }

    async fn write(&mut self, current: &NtValue, prospective: &mut NtValue) -> RuleFlow {
        // Read-only rules own their fields: caller-supplied changes to
        // them are reverted to the committed state before comparing.
        if self.rule.read_only() {
            if let Some(fields) = self.rule.fields() {
                for &field in fields {
                    if prospective.changed(field) {
                        trace!(rule = %self.rule.name(), ?field, "stripping read-only field");
                        prospective.restore_field(current, field);
                    }
                }
            }
        }

        if !self.rule.is_applicable(prospective) {
            trace!(rule = %self.rule.name(), "not applicable at write");
            return RuleFlow::Continue;
        }
        self.rule.compare(current, prospective)
    }
}
