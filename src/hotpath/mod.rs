//! 热路径：缓存动作回放（UI 哈希 → 规则库 → 直接执行），避免每帧都调用 AI

pub mod executor;
pub mod hasher;
pub mod registry;
pub mod trace;
pub mod traits;
pub mod types;

pub use executor::{HotPathExecutor, DEFAULT_AI_FALLBACK_THRESHOLD};
pub use hasher::ElementHasher;
pub use registry::{InMemoryRuleRegistry, Rule, HIGH_CONFIDENCE_THRESHOLD};
pub use trace::{JsonlTraceLog, NoopTraceLog};
pub use traits::{RuleRegistry, TraceLog, UiHasher};
pub use types::{Action, CachedAction, HotPathResult};
