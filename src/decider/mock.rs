//! Mock 决策器（用于演示与测试，无需模型）
//!
//! 按顺序返回预置决策，用完后返回 Finish。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::core::ActionLogEntry;
use crate::decider::{AiDecider, AiDecision};
use crate::perception::PerceptionSnapshot;

#[derive(Debug, Default)]
pub struct MockDecider {
    script: Mutex<VecDeque<Result<AiDecision, String>>>,
    calls: AtomicUsize,
}

impl MockDecider {
    pub fn new(script: Vec<Result<AiDecision, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiDecider for MockDecider {
    async fn decide(
        &self,
        task: &str,
        _snapshot: &PerceptionSnapshot,
        history: &[ActionLogEntry],
    ) -> Result<AiDecision, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| {
            Ok(AiDecision::Finish {
                summary: format!("{task}: finished after {} actions", history.len()),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotpath::Action;

    #[tokio::test]
    async fn test_script_then_finish() {
        let decider = MockDecider::new(vec![
            Ok(AiDecision::Act {
                action: Action::Back,
                reasoning: "leave dialog".into(),
            }),
            Err("model timeout".into()),
        ]);
        let snap = PerceptionSnapshot::from_elements(&[], 1, 1);
        assert!(matches!(
            decider.decide("t", &snap, &[]).await,
            Ok(AiDecision::Act { .. })
        ));
        assert!(decider.decide("t", &snap, &[]).await.is_err());
        assert!(matches!(
            decider.decide("t", &snap, &[]).await,
            Ok(AiDecision::Finish { .. })
        ));
        assert_eq!(decider.calls(), 3);
    }
}
