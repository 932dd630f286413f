//! 同步点精搜：在一个候选区域内找到场记板合上的那一帧
//!
//! 每次探测相邻三帧。三帧一致时步长减半并向切换点移动（打开向后，合上向前）。
//! 三帧不一致说明切换点就在附近，此时重新分类探测点两侧若干帧，取第一个
//! 打开→合上的位置，窗口平均置信度达到阈值即接受。
//! 未通过的候选从随机帧重新开始，重试次数用完后返回尽力结果。

use super::detection::{Detection, SlateClassifier, SlateState};
use super::frame::FrameSource;
use super::grouper::Region;
use crate::core::config::{AnalyzerConfig, UpperBound};
use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;

/// 邻域帧没有检测结果时使用的置信度
const MISSING_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub stride: u64,
    pub confidence_threshold: f32,
    pub confidence_margin: u64,
    pub max_steps: u32,
    pub max_retries: u32,
    pub upper_bound: UpperBound,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from(&AnalyzerConfig::default())
    }
}

impl From<&AnalyzerConfig> for SearchConfig {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            stride: config.sample_stride,
            confidence_threshold: config.confidence_threshold,
            confidence_margin: config.confidence_margin,
            max_steps: config.max_steps,
            max_retries: config.max_retries,
            upper_bound: config.upper_bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "frame", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// 通过邻域置信度校验的切换点
    Confident(u64),
    /// 重试用完，取最后一组不一致三帧推算的帧
    BestEffort(u64),
    /// 步数用完仍未出现候选
    NotFound,
}

impl SearchOutcome {
    pub fn frame(&self) -> Option<u64> {
        match self {
            SearchOutcome::Confident(frame) | SearchOutcome::BestEffort(frame) => Some(*frame),
            SearchOutcome::NotFound => None,
        }
    }

    pub fn is_confident(&self) -> bool {
        matches!(self, SearchOutcome::Confident(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub outcome: SearchOutcome,
    pub first_frame: u64,
    pub last_frame: u64,
    /// 搜索结束时的探测位置
    pub last_probe: u64,
    pub classifier_calls: u32,
    pub steps_used: u32,
    pub retries_used: u32,
}

/// 单个区域搜索的循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchState {
    pub first_frame: i64,
    pub last_frame: i64,
    pub frame_number: i64,
    pub step_size: i64,
    pub original_step_size: i64,
    pub steps_remaining: u32,
    pub retries_remaining: u32,
}

impl SearchState {
    pub fn bootstrap(first_frame: u64, last_frame: u64, max_steps: u32, max_retries: u32) -> Self {
        let first_frame = first_frame as i64;
        let last_frame = last_frame as i64;
        let step_size = (last_frame - first_frame) / 2;

        Self {
            first_frame,
            last_frame,
            frame_number: last_frame - step_size,
            step_size,
            original_step_size: step_size,
            steps_remaining: max_steps,
            retries_remaining: max_retries,
        }
    }

    fn step(&mut self, direction: i64) {
        self.step_size = (self.step_size + 1) / 2;
        self.frame_number += direction * self.step_size;
        self.frame_number = self.frame_number.clamp(self.first_frame, self.last_frame);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Forward,
    Backward,
    Refine,
}

/// 全部打开则向后，全部合上则向前，否则切换点就在三帧之内
pub fn majority_move(states: &[SlateState; 3]) -> Move {
    if states.iter().all(|s| *s == SlateState::Open) {
        Move::Forward
    } else if states.iter().all(|s| *s == SlateState::Closed) {
        Move::Backward
    } else {
        Move::Refine
    }
}

/// 探测帧没有检测结果时的替代判定：位于窗口后半段为合上，否则为打开
pub fn directional_verdict(first_frame: i64, last_frame: i64, probe: i64) -> SlateState {
    if (last_frame - probe).abs() < (first_frame - probe).abs() {
        SlateState::Closed
    } else {
        SlateState::Open
    }
}

/// 区域两侧各扩展一个步长，限制在视频范围内
pub fn search_bounds(region: &Region, stride: u64, frame_count: u64, policy: UpperBound) -> (u64, u64) {
    let last_video_frame = frame_count.saturating_sub(1);
    let first = region.first().saturating_sub(stride);
    let last = match policy {
        UpperBound::Widened => region.last().saturating_add(stride).min(last_video_frame),
        UpperBound::VideoEnd => last_video_frame,
    };
    (first.min(last), last)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddedSample {
    pub frame_number: i64,
    pub state: SlateState,
    pub confidence: Option<f32>,
}

/// 紧接着合上帧的最后一个打开帧的下标
pub fn first_transition(samples: &[PaddedSample]) -> Option<usize> {
    samples
        .windows(2)
        .position(|pair| pair[0].state == SlateState::Open && pair[1].state == SlateState::Closed)
}

pub fn mean_confidence(samples: &[PaddedSample]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f32 = samples
        .iter()
        .map(|s| s.confidence.unwrap_or(MISSING_CONFIDENCE))
        .sum();
    total / samples.len() as f32
}

/// 兜底结果：第一个合上状态的下标为 `index` 时返回 `frame_number - (index - 1)`
pub fn fallback_frame(frame_number: i64, states: &[SlateState]) -> Option<i64> {
    states
        .iter()
        .position(|s| *s == SlateState::Closed)
        .map(|index| frame_number - (index as i64 - 1))
}

pub struct SyncpointSearch<'a> {
    source: &'a dyn FrameSource,
    classifier: &'a dyn SlateClassifier,
    config: SearchConfig,
    frame_count: u64,
}

impl<'a> SyncpointSearch<'a> {
    pub fn new(
        source: &'a dyn FrameSource,
        classifier: &'a dyn SlateClassifier,
        config: SearchConfig,
    ) -> Self {
        Self {
            frame_count: source.frame_count(),
            source,
            classifier,
            config,
        }
    }

    /// 每个区域一份报告，顺序与区域一致
    pub fn find_syncpoints<R: Rng + ?Sized>(&self, regions: &[Region], rng: &mut R) -> Vec<SearchReport> {
        let mut reports = Vec::with_capacity(regions.len());
        for region in regions {
            let report = self.search_region(region, &mut *rng);
            info!("📍 Syncpoint = {:?}", report.outcome);
            reports.push(report);
        }
        reports
    }

    pub fn search_region<R: Rng + ?Sized>(&self, region: &Region, rng: &mut R) -> SearchReport {
        let (first, last) = search_bounds(
            region,
            self.config.stride,
            self.frame_count,
            self.config.upper_bound,
        );
        info!("🎯 Searching frames {} - {}", first, last);

        let mut state = SearchState::bootstrap(first, last, self.config.max_steps, self.config.max_retries);
        let mut calls = 0u32;

        let outcome = loop {
            if state.steps_remaining == 0 {
                info!("⏹️ Step budget spent without a candidate");
                break SearchOutcome::NotFound;
            }
            // 只有单帧步长才消耗步数
            if state.step_size <= 1 {
                state.steps_remaining -= 1;
            }

            debug!("Frame = {}, step size = {}", state.frame_number, state.step_size);
            let triple = self.probe_triple(&state, &mut calls);
            debug!("Classes detected = {:?}", triple);

            match majority_move(&triple) {
                Move::Forward => state.step(1),
                Move::Backward => state.step(-1),
                Move::Refine => {
                    let padded = self.pad_candidate(&state, &mut calls);
                    if let Some(frame) = self.accept_candidate(&padded) {
                        break SearchOutcome::Confident(frame);
                    }

                    if state.retries_remaining == 0 {
                        warn!("⚠️ Max retries reached, returning most likely syncpoint");
                        break match fallback_frame(state.frame_number, &triple) {
                            Some(frame) => SearchOutcome::BestEffort(self.clamp_to_video(frame)),
                            None => SearchOutcome::NotFound,
                        };
                    }

                    info!("🔁 Candidate unlikely to be correct, restarting from a random frame");
                    state.frame_number = rng.gen_range(state.first_frame..=state.last_frame);
                    state.step_size = state.original_step_size;
                    state.retries_remaining -= 1;
                }
            }
        };

        SearchReport {
            outcome,
            first_frame: first,
            last_frame: last,
            last_probe: state.frame_number.max(0) as u64,
            classifier_calls: calls,
            steps_used: self.config.max_steps - state.steps_remaining,
            retries_used: self.config.max_retries - state.retries_remaining,
        }
    }

    fn probe_triple(&self, state: &SearchState, calls: &mut u32) -> [SlateState; 3] {
        [-1, 0, 1].map(|offset| {
            let probe = state.frame_number + offset;
            self.classify_at(probe, calls)
                .map(|d| d.state)
                .unwrap_or_else(|| directional_verdict(state.first_frame, state.last_frame, probe))
        })
    }

    fn pad_candidate(&self, state: &SearchState, calls: &mut u32) -> Vec<PaddedSample> {
        let margin = self.config.confidence_margin as i64;
        (state.frame_number - margin..=state.frame_number + margin)
            .map(|frame_number| match self.classify_at(frame_number, calls) {
                Some(detection) => PaddedSample {
                    frame_number,
                    state: detection.state,
                    confidence: Some(detection.confidence),
                },
                None => PaddedSample {
                    frame_number,
                    state: directional_verdict(state.first_frame, state.last_frame, frame_number),
                    confidence: None,
                },
            })
            .collect()
    }

    fn accept_candidate(&self, padded: &[PaddedSample]) -> Option<u64> {
        let index = first_transition(padded)?;
        let avg_confidence = mean_confidence(padded);
        info!(
            "Syncpoint candidate at frame {}, average confidence = {:.3}",
            padded[index].frame_number, avg_confidence
        );

        if avg_confidence >= self.config.confidence_threshold {
            Some(self.clamp_to_video(padded[index].frame_number))
        } else {
            None
        }
    }

    /// 读取并分类一帧，视频范围外的帧不读取
    fn classify_at(&self, frame_number: i64, calls: &mut u32) -> Option<Detection> {
        if frame_number < 0 || frame_number as u64 >= self.frame_count {
            return None;
        }
        let frame = match self.source.read_frame(frame_number as u64) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Frame {} unreadable during refinement: {}", frame_number, e);
                return None;
            }
        };
        *calls += 1;
        Detection::primary(&self.classifier.classify(&frame)).copied()
    }

    fn clamp_to_video(&self, frame_number: i64) -> u64 {
        frame_number.clamp(0, self.frame_count.saturating_sub(1) as i64) as u64
    }
}
