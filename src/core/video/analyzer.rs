use super::detection::SlateClassifier;
use super::error::VideoError;
use super::frame::FrameSource;
use super::grouper::group_candidate_frames;
use super::scanner::{CoarseScanner, ScanStats};
use super::search::{SearchConfig, SearchOutcome, SearchReport, SyncpointSearch};
use crate::core::config::AnalyzerConfig;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct RegionReport {
    pub candidate_frames: usize,
    pub region_first: u64,
    pub region_last: u64,
    pub search: SearchReport,
    pub seconds: Option<f64>,
}

/// 单个视频的分析结果
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub source_name: String,
    pub regions: Vec<RegionReport>,
    pub frame_rate: f64,
    pub sample_stride: u64,
    pub resolution: (u32, u32),
    pub duration_secs: f64,
    pub scan: ScanStats,
    pub inference_duration: Duration,
}

impl AnalysisReport {
    /// 按区域顺序返回同步点（秒），没有结果的区域跳过
    pub fn syncpoints_seconds(&self, include_best_effort: bool) -> Vec<f64> {
        self.regions
            .iter()
            .filter(|r| include_best_effort || r.search.outcome.is_confident())
            .filter_map(|r| r.seconds)
            .collect()
    }

    pub fn syncpoint_frames(&self) -> Vec<Option<u64>> {
        self.regions.iter().map(|r| r.search.outcome.frame()).collect()
    }
}

pub struct VideoAnalyzer {
    config: AnalyzerConfig,
}

impl VideoAnalyzer {
    pub fn new() -> Self {
        Self {
            config: AnalyzerConfig::default(),
        }
    }

    pub fn with_config(config: AnalyzerConfig) -> Result<Self, VideoError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// 重启随机数取自 `config.seed`，未设置时使用系统熵
    pub fn analyze(
        &self,
        source: &dyn FrameSource,
        classifier: &dyn SlateClassifier,
    ) -> Result<AnalysisReport, VideoError> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.analyze_with_rng(source, classifier, &mut rng)
    }

    pub fn analyze_with_rng<R: Rng + ?Sized>(
        &self,
        source: &dyn FrameSource,
        classifier: &dyn SlateClassifier,
        rng: &mut R,
    ) -> Result<AnalysisReport, VideoError> {
        let start = Instant::now();
        let frame_rate = source.frame_rate();
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(VideoError::InvalidFrameRate(frame_rate));
        }

        let scanner = CoarseScanner::new(
            self.config.sample_stride,
            self.config.workers,
            self.config.confidence_threshold,
        );
        let scan = scanner.scan(source, classifier)?;

        let candidates: Vec<u64> = scan.verdicts.keys().copied().collect();
        let regions = group_candidate_frames(&candidates, self.config.sample_stride);
        info!("🧩 {} candidate frames in {} regions", candidates.len(), regions.len());

        let reports = if regions.is_empty() {
            info!("No slate found in {}", source.name());
            Vec::new()
        } else {
            SyncpointSearch::new(source, classifier, SearchConfig::from(&self.config))
                .find_syncpoints(&regions, rng)
        };

        let regions = regions
            .iter()
            .zip(reports)
            .map(|(region, search)| RegionReport {
                candidate_frames: region.len(),
                region_first: region.first(),
                region_last: region.last(),
                seconds: frame_to_seconds(search.outcome, frame_rate),
                search,
            })
            .collect();

        Ok(AnalysisReport {
            source_name: source.name(),
            regions,
            frame_rate,
            sample_stride: self.config.sample_stride,
            resolution: source.resolution(),
            duration_secs: source.duration_secs(),
            scan: scan.stats,
            inference_duration: start.elapsed(),
        })
    }
}

impl Default for VideoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn frame_to_seconds(outcome: SearchOutcome, frame_rate: f64) -> Option<f64> {
    outcome.frame().map(|frame| frame as f64 / frame_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::detection::{Detection, MockClassifier, SlateState};
    use crate::core::video::frame::SyntheticSource;

    fn seeded(config: AnalyzerConfig) -> VideoAnalyzer {
        VideoAnalyzer::with_config(AnalyzerConfig {
            seed: Some(9),
            ..config
        })
        .unwrap()
    }

    #[test]
    fn test_end_to_end_hundred_frames() {
        let source = SyntheticSource::new(100, 25.0);
        let classifier = MockClassifier::with_transition(40, 0.9);
        let analyzer = seeded(AnalyzerConfig {
            sample_stride: 10,
            workers: 2,
            ..Default::default()
        });

        let report = analyzer.analyze(&source, &classifier).unwrap();

        assert!(report.scan.candidates > 0);
        assert_eq!(report.regions.len(), 1);
        let frame = report.syncpoint_frames()[0].unwrap();
        assert!((39..=41).contains(&frame), "got {}", frame);
        let seconds = report.syncpoints_seconds(true);
        assert_eq!(seconds.len(), 1);
        assert!((seconds[0] - frame as f64 / 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_slates_in_order() {
        let source = SyntheticSource::new(3_000, 30.0);
        let classifier = MockClassifier::with_pattern(|n| {
            let (start, closes, end) = match n {
                300..=599 => (300, 451, 600),
                2_000..=2_299 => (2_000, 2_120, 2_300),
                _ => return Vec::new(),
            };
            debug_assert!(n >= start && n < end);
            let state = if n < closes {
                SlateState::Open
            } else {
                SlateState::Closed
            };
            vec![Detection::new(state, 0.95)]
        });
        let analyzer = seeded(AnalyzerConfig::default());

        let report = analyzer.analyze(&source, &classifier).unwrap();

        let frames = report.syncpoint_frames();
        assert_eq!(frames.len(), 2);
        let first = frames[0].unwrap();
        let second = frames[1].unwrap();
        assert!((449..=452).contains(&first), "got {}", first);
        assert!((2_118..=2_121).contains(&second), "got {}", second);
    }

    #[test]
    fn test_no_candidates_is_empty_result() {
        let source = SyntheticSource::new(600, 25.0);
        let classifier = MockClassifier::empty();

        let report = VideoAnalyzer::new().analyze(&source, &classifier).unwrap();

        assert!(report.regions.is_empty());
        assert!(report.syncpoints_seconds(true).is_empty());
        assert_eq!(report.scan.sampled_frames, 20);
    }

    #[test]
    fn test_best_effort_filtered_on_request() {
        let source = SyntheticSource::new(1_000, 25.0);
        // 粗扫描能通过，邻域置信度校验通不过
        let classifier = MockClassifier::with_pattern(|n| {
            if !(300..600).contains(&n) {
                return Vec::new();
            }
            let state = if n % 2 == 0 {
                SlateState::Closed
            } else {
                SlateState::Open
            };
            let confidence = if n % 10 == 0 { 0.9 } else { 0.2 };
            vec![Detection::new(state, confidence)]
        });
        let analyzer = seeded(AnalyzerConfig::default());

        let report = analyzer.analyze(&source, &classifier).unwrap();

        assert_eq!(report.regions.len(), 1);
        assert!(matches!(
            report.regions[0].search.outcome,
            SearchOutcome::BestEffort(_)
        ));
        assert_eq!(report.syncpoints_seconds(true).len(), 1);
        assert!(report.syncpoints_seconds(false).is_empty());
    }

    #[test]
    fn test_unusable_frame_rate_rejected() {
        let classifier = MockClassifier::with_transition(40, 0.9);
        let analyzer = seeded(AnalyzerConfig {
            sample_stride: 10,
            ..Default::default()
        });

        for fps in [0.0, -25.0, f64::NAN] {
            let source = SyntheticSource::new(100, fps);
            let result = analyzer.analyze(&source, &classifier);
            assert!(matches!(result, Err(VideoError::InvalidFrameRate(_))), "fps {}", fps);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = VideoAnalyzer::with_config(AnalyzerConfig {
            workers: 0,
            ..Default::default()
        });
        assert!(matches!(result, Err(VideoError::Config(_))));
    }
}
