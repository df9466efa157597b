//! AI 决策层（慢路径）：抽象与 Mock 实现

pub mod mock;
pub mod traits;

pub use mock::MockDecider;
pub use traits::{AiDecider, AiDecision};
