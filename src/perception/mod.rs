//! 感知层输入：检测到的 UI 元素、感知快照、帧来源
//!
//! 视觉 / OCR 流水线在外部；这里只定义其输出形态，以及一个按序回放的帧来源（演示与测试用）。

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 元素包围盒（像素）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 中心点；在 i64 上计算，检测器给出越界坐标时也不会溢出
    pub fn center(&self) -> (i64, i64) {
        (
            i64::from(self.x) + i64::from(self.width) / 2,
            i64::from(self.y) + i64::from(self.height) / 2,
        )
    }
}

/// 单个检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedElement {
    /// 元素类别（button / text / icon ...）
    pub kind: String,
    /// OCR 文本或图标标签
    pub label: String,
    pub bounds: Bounds,
    pub confidence: f32,
}

impl DetectedElement {
    pub fn new(kind: impl Into<String>, label: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
            bounds,
            confidence: 1.0,
        }
    }
}

/// 一帧的感知结果，作为 UI 哈希的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionSnapshot {
    pub elements: Vec<DetectedElement>,
    pub image_width: u32,
    pub image_height: u32,
    pub detection_latency_ms: u64,
    pub ocr_latency_ms: u64,
}

impl PerceptionSnapshot {
    /// 热路径构建快照时不负责计时，延迟字段置零
    pub fn from_elements(elements: &[DetectedElement], image_width: u32, image_height: u32) -> Self {
        Self {
            elements: elements.to_vec(),
            image_width,
            image_height,
            detection_latency_ms: 0,
            ocr_latency_ms: 0,
        }
    }
}

/// 外部感知流水线产出的一帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub elements: Vec<DetectedElement>,
    pub image_width: u32,
    pub image_height: u32,
}

impl Frame {
    pub fn snapshot(&self) -> PerceptionSnapshot {
        PerceptionSnapshot::from_elements(&self.elements, self.image_width, self.image_height)
    }
}

/// 帧来源：截屏 + 检测，每次返回最新一帧
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn next_frame(&self) -> Result<Frame, String>;
}

/// 按序回放预先录制的帧，末帧之后保持最后一帧
#[derive(Debug)]
pub struct ReplayFrameSource {
    frames: Vec<Frame>,
    cursor: AtomicUsize,
}

impl ReplayFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            cursor: AtomicUsize::new(0),
        }
    }

    /// 已消费的帧数
    pub fn consumed(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FrameSource for ReplayFrameSource {
    async fn next_frame(&self) -> Result<Frame, String> {
        if self.frames.is_empty() {
            return Err("no frames recorded".to_string());
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        let frame = self
            .frames
            .get(index)
            .or_else(|| self.frames.last())
            .cloned()
            .ok_or_else(|| "no frames recorded".to_string())?;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(label: &str) -> Frame {
        Frame {
            elements: vec![DetectedElement::new("button", label, Bounds::new(0, 0, 10, 10))],
            image_width: 100,
            image_height: 200,
        }
    }

    #[test]
    fn test_snapshot_zeroes_latency() {
        let snap = frame("OK").snapshot();
        assert_eq!(snap.detection_latency_ms, 0);
        assert_eq!(snap.ocr_latency_ms, 0);
        assert_eq!(snap.image_height, 200);
        assert_eq!(snap.elements.len(), 1);
    }

    #[test]
    fn test_bounds_center() {
        assert_eq!(Bounds::new(10, 20, 30, 40).center(), (25, 40));
    }

    #[test]
    fn test_bounds_center_extreme_values() {
        let (cx, cy) = Bounds::new(i32::MAX - 10, i32::MIN, 100, -10).center();
        assert_eq!(cx, i64::from(i32::MAX) - 10 + 50);
        assert_eq!(cy, i64::from(i32::MIN) - 5);
    }

    #[tokio::test]
    async fn test_replay_holds_last_frame() {
        let source = ReplayFrameSource::new(vec![frame("a"), frame("b")]);
        assert_eq!(source.next_frame().await.unwrap().elements[0].label, "a");
        assert_eq!(source.next_frame().await.unwrap().elements[0].label, "b");
        assert_eq!(source.next_frame().await.unwrap().elements[0].label, "b");
        assert_eq!(source.consumed(), 3);
    }

    #[tokio::test]
    async fn test_replay_empty_is_error() {
        let source = ReplayFrameSource::new(vec![]);
        assert!(source.next_frame().await.is_err());
    }
}
