//! 守护进程层：协作方抽象、协调器（可用性 + 崩溃恢复）、Mock 实现

pub mod coordinator;
pub mod mock;
pub mod traits;

pub use coordinator::{DaemonCoordinationResult, DaemonCoordinator, RecoveryOutcome};
pub use mock::MockDaemon;
pub use traits::{ActionDispatch, ConnectionState, DaemonLifecycle, DaemonSession};
