//! 场记板同步点分析入口

use crate::core::config::AnalyzerConfig;
use crate::core::video::{
    AnalysisReport, FrameSource, ImageSequenceSource, SlateClassifier, VideoAnalyzer, VideoError,
};
use log::{info, warn};
use serde::Serialize;
use std::path::Path;

/// 单个视频的分析摘要：同步点（秒）及计算时使用的视频信息
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub syncpoints: Vec<f64>,
    pub frame_rate: f64,
    pub sample_stride: u64,
    pub resolution: (u32, u32),
    pub duration_secs: f64,
}

/// 每次分析后写入日志的单文件记录
#[derive(Debug, Serialize)]
struct AnalysisLogRecord<'a> {
    file_name: &'a str,
    file_duration: f64,
    fps: f64,
    average_frametime: f64,
    resolution: (u32, u32),
    sample_rate: u64,
    workers: usize,
    inference_duration: f64,
    unresolved_regions: usize,
    results: &'a [f64],
}

/// 场记板分析器
///
/// ```no_run
/// use slate_sync::api::video::SlateAnalyzer;
/// use slate_sync::core::config::AnalyzerConfig;
/// use slate_sync::core::video::MockClassifier;
///
/// let analyzer = SlateAnalyzer::create(AnalyzerConfig::default()).unwrap();
/// let classifier = MockClassifier::with_transition(40, 0.9);
/// let summary = analyzer
///     .analyze_image_sequence("/path/to/frames", 25.0, &classifier)
///     .unwrap();
/// println!("syncpoints: {:?}", summary.syncpoints);
/// ```
pub struct SlateAnalyzer {
    analyzer: VideoAnalyzer,
}

impl SlateAnalyzer {
    pub fn create(config: AnalyzerConfig) -> Result<Self, VideoError> {
        crate::init_logging();
        let analyzer = VideoAnalyzer::with_config(config)?;
        info!("🎬 SlateAnalyzer: created");
        Ok(Self { analyzer })
    }

    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, VideoError> {
        let config = AnalyzerConfig::load(path)?;
        Self::create(config)
    }

    pub fn analyze(
        &self,
        source: &dyn FrameSource,
        classifier: &dyn SlateClassifier,
    ) -> Result<AnalysisSummary, VideoError> {
        info!("🎞️ Analyzing {}", source.name());
        let report = self.analyzer.analyze(source, classifier)?;
        let summary = self.summarize(&report);
        self.log_analysis(&report, &summary);
        Ok(summary)
    }

    /// 把导出的逐帧图片目录按 `frame_rate` 当作视频分析
    pub fn analyze_image_sequence(
        &self,
        dir: impl AsRef<Path>,
        frame_rate: f64,
        classifier: &dyn SlateClassifier,
    ) -> Result<AnalysisSummary, VideoError> {
        let source = ImageSequenceSource::from_dir(dir, frame_rate)?;
        self.analyze(&source, classifier)
    }

    /// 返回每个区域的完整结果，不写摘要日志
    pub fn analyze_detailed(
        &self,
        source: &dyn FrameSource,
        classifier: &dyn SlateClassifier,
    ) -> Result<AnalysisReport, VideoError> {
        self.analyzer.analyze(source, classifier)
    }

    fn summarize(&self, report: &AnalysisReport) -> AnalysisSummary {
        AnalysisSummary {
            syncpoints: report.syncpoints_seconds(self.analyzer.config().include_best_effort),
            frame_rate: report.frame_rate,
            sample_stride: report.sample_stride,
            resolution: report.resolution,
            duration_secs: report.duration_secs,
        }
    }

    fn log_analysis(&self, report: &AnalysisReport, summary: &AnalysisSummary) {
        let unresolved = report
            .regions
            .iter()
            .filter(|r| r.search.outcome.frame().is_none())
            .count();
        let average_frametime = if report.frame_rate > 0.0 {
            1.0 / report.frame_rate
        } else {
            0.0
        };

        let record = AnalysisLogRecord {
            file_name: &report.source_name,
            file_duration: report.duration_secs,
            fps: report.frame_rate,
            average_frametime,
            resolution: report.resolution,
            sample_rate: report.sample_stride,
            workers: self.analyzer.config().workers,
            inference_duration: report.inference_duration.as_secs_f64(),
            unresolved_regions: unresolved,
            results: &summary.syncpoints,
        };

        match serde_json::to_string(&record) {
            Ok(json) => info!("📝 File Video {}", json),
            Err(e) => warn!("⚠️ Failed to serialize analysis record: {}", e),
        }
    }
}

impl Drop for SlateAnalyzer {
    fn drop(&mut self) {
        info!("🗑️ SlateAnalyzer: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::{MockClassifier, SyntheticSource};

    #[test]
    fn test_summary_carries_metadata() {
        let analyzer = SlateAnalyzer::create(AnalyzerConfig {
            sample_stride: 10,
            workers: 2,
            seed: Some(1),
            ..Default::default()
        })
        .unwrap();
        let source = SyntheticSource::new(100, 25.0).with_resolution(64, 36);
        let classifier = MockClassifier::with_transition(40, 0.9);

        let summary = analyzer.analyze(&source, &classifier).unwrap();

        assert_eq!(summary.syncpoints.len(), 1);
        assert!((summary.syncpoints[0] - 39.0 / 25.0).abs() < 0.05);
        assert_eq!(summary.frame_rate, 25.0);
        assert_eq!(summary.sample_stride, 10);
        assert_eq!(summary.resolution, (64, 36));
        assert!((summary.duration_secs - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_config_file_loading() {
        let path = std::env::temp_dir().join(format!("slate_sync_config_{}.json5", std::process::id()));
        std::fs::write(&path, "{ sample_stride: 12, workers: 3 }").unwrap();

        let analyzer = SlateAnalyzer::from_config_file(&path).unwrap();
        assert_eq!(analyzer.analyzer.config().sample_stride, 12);
        assert_eq!(analyzer.analyzer.config().workers, 3);

        let _ = std::fs::remove_file(&path);
        assert!(SlateAnalyzer::from_config_file(&path).is_err());
    }
}
