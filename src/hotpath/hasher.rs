//! 元素集合 → UI 哈希
//!
//! 规范化：每个元素取 (kind, label, 中心点所在网格)，网格为图像宽高各 10 等分；排序后拼接再取 md5。
//! 因此元素顺序无关，且对几个像素的检测抖动不敏感。

use crate::hotpath::UiHasher;
use crate::perception::PerceptionSnapshot;

const GRID_CELLS: i64 = 10;

/// 默认 UI 哈希实现
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementHasher;

impl ElementHasher {
    pub fn new() -> Self {
        Self
    }

    fn canonical_form(snapshot: &PerceptionSnapshot) -> String {
        let width = i64::from(snapshot.image_width.max(1));
        let height = i64::from(snapshot.image_height.max(1));

        let mut keys: Vec<String> = snapshot
            .elements
            .iter()
            .map(|el| {
                let (cx, cy) = el.bounds.center();
                let gx = (cx.saturating_mul(GRID_CELLS) / width).clamp(0, GRID_CELLS - 1);
                let gy = (cy.saturating_mul(GRID_CELLS) / height).clamp(0, GRID_CELLS - 1);
                format!("{}|{}|{gx}:{gy}", el.kind, el.label.trim().to_lowercase())
            })
            .collect();
        keys.sort();
        keys.join(";")
    }
}

impl UiHasher for ElementHasher {
    fn compute_hash(&self, snapshot: &PerceptionSnapshot) -> String {
        let canonical = Self::canonical_form(snapshot);
        format!("{:x}", md5::compute(canonical.as_bytes()))
    }
}
