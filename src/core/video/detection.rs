use crate::core::video::frame::Frame;
use serde::{Deserialize, Serialize};

/// 场记板状态，数值与模型输出的类别索引一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlateState {
    Closed = 0,
    Open = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub state: SlateState,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(state: SlateState, confidence: f32) -> Self {
        Self {
            state,
            confidence,
            bbox: BoundingBox::default(),
        }
    }

    /// 一帧的判定结果：置信度最高的检测
    pub fn primary(detections: &[Detection]) -> Option<&Detection> {
        detections
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

/// 场记板检测器（黑盒）
///
/// 模型、后端和设备由实现自行管理，调用方把 `classify` 视为纯函数
pub trait SlateClassifier: Send + Sync {
    fn classify(&self, frame: &Frame) -> Vec<Detection>;
}

pub struct MockClassifier {
    // 按帧号模拟模型输出
    pattern: Box<dyn Fn(u64) -> Vec<Detection> + Send + Sync>,
}

impl MockClassifier {
    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Vec<Detection> + Send + Sync + 'static,
    {
        Self {
            pattern: Box::new(pattern),
        }
    }

    /// `closes_at` 之前为打开，之后为合上，置信度固定
    pub fn with_transition(closes_at: u64, confidence: f32) -> Self {
        Self::with_pattern(move |frame_number| {
            let state = if frame_number < closes_at {
                SlateState::Open
            } else {
                SlateState::Closed
            };
            vec![Detection::new(state, confidence)]
        })
    }

    /// 场记板只出现在 `[start, end)` 内，`closes_at` 之前为打开
    pub fn with_slate_window(start: u64, end: u64, closes_at: u64, confidence: f32) -> Self {
        Self::with_pattern(move |frame_number| {
            if frame_number < start || frame_number >= end {
                return Vec::new();
            }
            let state = if frame_number < closes_at {
                SlateState::Open
            } else {
                SlateState::Closed
            };
            vec![Detection::new(state, confidence)]
        })
    }

    pub fn empty() -> Self {
        Self::with_pattern(|_| Vec::new())
    }
}

impl SlateClassifier for MockClassifier {
    fn classify(&self, frame: &Frame) -> Vec<Detection> {
        (self.pattern)(frame.frame_number)
    }
}
