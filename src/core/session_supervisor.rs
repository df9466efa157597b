//! 会话监管：自动化会话的取消
//!
//! 持有会话级 CancellationToken；协调器的退避等待、主循环的每一步都持有其子 token，
//! 编排方 cancel 后退避立即中止，主循环以 Cancelled 结束。

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct SessionSupervisor {
    cancel_token: CancellationToken,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
        }
    }

    /// 由外部令牌派生（例如进程级关闭令牌），外部取消时会话一并取消
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            cancel_token: parent.child_token(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn cancel(&self) {
        tracing::info!("Automation session cancelled");
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 子 token：取消会话会级联取消，反之不会
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_propagates_to_children() {
        let supervisor = SessionSupervisor::new();
        let child = supervisor.child_token();
        assert!(!child.is_cancelled());
        supervisor.cancel();
        assert!(child.is_cancelled());
        assert!(supervisor.is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_cancel_session() {
        let supervisor = SessionSupervisor::new();
        supervisor.child_token().cancel();
        assert!(!supervisor.is_cancelled());
    }

    #[test]
    fn test_parent_cancel_cascades() {
        let parent = CancellationToken::new();
        let supervisor = SessionSupervisor::with_parent(&parent);
        parent.cancel();
        assert!(supervisor.is_cancelled());
    }
}
