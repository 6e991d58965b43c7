//! Rule flow control

/// What to do after a rule (or handler) has been evaluated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleFlow {
    /// Continue with the next rule in the sequence.
    Continue,
    /// Stop evaluating further rules but commit the operation.
    Terminate,
    /// Stop evaluating and reject the whole operation, with a reason.
    Abort(String),
}

impl RuleFlow {
    pub fn abort(reason: impl Into<String>) -> Self {
        RuleFlow::Abort(reason.into())
    }

    #[inline]
    pub fn is_abort(&self) -> bool {
        matches!(self, RuleFlow::Abort(_))
    }

    /// Rank for combining element-wise results: the worst outcome wins.
    fn rank(&self) -> u8 {
        match self {
            RuleFlow::Continue => 0,
            RuleFlow::Terminate => 1,
            RuleFlow::Abort(_) => 2,
        }
    }

    /// Combine two flows, keeping the worse of the two.
    pub fn worst(self, other: RuleFlow) -> RuleFlow {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst() {
        assert_eq!(
            RuleFlow::Continue.worst(RuleFlow::Terminate),
            RuleFlow::Terminate
        );
        assert_eq!(
            RuleFlow::Terminate.worst(RuleFlow::Continue),
            RuleFlow::Terminate
        );
        assert!(RuleFlow::Terminate
            .worst(RuleFlow::abort("x"))
            .is_abort());
    }
}
