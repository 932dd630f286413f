/// 一段连续的候选帧（相邻帧间隔不超过采样步长）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    frames: Vec<u64>,
}

impl Region {
    /// 空帧列表不构成区域，返回 `None`
    pub fn new(frames: Vec<u64>) -> Option<Self> {
        if frames.is_empty() {
            None
        } else {
            Some(Self { frames })
        }
    }

    pub fn first(&self) -> u64 {
        self.frames[0]
    }

    pub fn last(&self) -> u64 {
        self.frames[self.frames.len() - 1]
    }

    pub fn frames(&self) -> &[u64] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// 按采样步长切分已排序的候选帧：相邻两帧间隔大于 `stride` 时另起一个区域
///
/// ```text
/// input  = [2, 3, 5, 11, 14, 15, 17, 29, 31], stride = 4
/// output = [[2, 3, 5], [11, 14, 15, 17], [29, 31]]
/// ```
pub fn group_candidate_frames(frames: &[u64], stride: u64) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut current: Vec<u64> = Vec::new();

    for &frame in frames {
        if let Some(&prev) = current.last() {
            debug_assert!(frame > prev, "candidate frames must be sorted and unique");
            if frame - prev > stride {
                regions.extend(Region::new(std::mem::take(&mut current)));
            }
        }
        current.push(frame);
    }

    regions.extend(Region::new(current));
    regions
}
