//! Element-wise rule adapter for array PVs
//!
//! Wraps a rule written against scalar payloads so it can be applied to
//! array PVs: the inner rule runs once per element against a scalarized
//! view of the state, value mutations are written back element by element,
//! and the worst alarm severity across elements is gathered into the
//! array's alarm field.

use ntflow_core::{AlarmSeverity, Field, NtValue};

use crate::{Rule, RuleFlow, WriteOp};

pub struct ElementWiseRule<R: Rule> {
    inner: R,
}

impl<R: Rule> ElementWiseRule<R> {
    pub fn new(inner: R) -> Self {
        ElementWiseRule { inner }
    }

    /// Scalarized view of one element: same metadata and change mask, the
    /// payload replaced with the element.
    fn scalarize(state: &NtValue, index: usize) -> Option<NtValue> {
        let element = state.value.element(index)?;
        let mut view = state.clone();
        view.value = element;
        Some(view)
    }

    fn run_elements<F>(&mut self, prospective: &mut NtValue, mut run: F) -> RuleFlow
    where
        F: FnMut(&mut R, usize, &mut NtValue) -> RuleFlow,
    {
        // Gather starts from rest unless the incoming alarm is invalid,
        // which element evaluation must not override.
        let mut gathered = prospective.alarm.clone();
        if gathered.severity != AlarmSeverity::Invalid {
            gathered.severity = AlarmSeverity::NoAlarm;
            gathered.message.clear();
        }

        let mut net = RuleFlow::Continue;
        for index in 0..prospective.value.len() {
            let Some(mut view) = Self::scalarize(prospective, index) else {
                continue;
            };

            let flow = run(&mut self.inner, index, &mut view);
            if flow.is_abort() {
                return flow;
            }
            net = net.worst(flow);

            prospective.value.set_element(index, view.value.clone());
            if view.changed(Field::Value) {
                prospective.mark(Field::Value);
            }
            if view.alarm.severity > gathered.severity {
                gathered = view.alarm;
            }
        }

        if gathered != prospective.alarm {
            prospective.set_alarm(gathered);
        }
        net
    }
}

impl<R: Rule> Rule for ElementWiseRule<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fields(&self) -> Option<&[Field]> {
        self.inner.fields()
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }

    fn authorize(&mut self, op: &WriteOp) -> RuleFlow {
        self.inner.authorize(op)
    }

    fn opened(&mut self, prospective: &mut NtValue) -> RuleFlow {
        if !prospective.value.is_array() {
            return self.inner.opened(prospective);
        }
        self.run_elements(prospective, |inner, _, view| inner.opened(view))
    }

    fn compare(&mut self, current: &NtValue, prospective: &mut NtValue) -> RuleFlow {
        if !prospective.value.is_array() {
            return self.inner.compare(current, prospective);
        }

        let current = current.clone();
        self.run_elements(prospective, |inner, index, view| {
            match Self::scalarize(&current, index) {
                // No current element at this index (array grew): only the
                // future state exists for it.
                None => inner.opened(view),
                Some(current_view) => inner.compare(&current_view, view),
            }
        })
    }
}
