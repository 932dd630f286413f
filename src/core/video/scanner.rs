//! 粗扫描：把视频切成若干块，每块一个 worker 按步长抽帧分类

use super::detection::{Detection, SlateClassifier};
use super::error::VideoError;
use super::frame::FrameSource;
use crate::core::config::ConfigError;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;

/// 单个视频的候选帧，按帧号索引
pub type FrameVerdicts = BTreeMap<u64, Detection>;

const PROGRESS_EVERY: u64 = 100;

/// 扫描统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub sampled_frames: u64,
    pub failed_reads: u64,
    pub candidates: u64,
}

impl ScanStats {
    fn absorb(&mut self, other: ScanStats) {
        self.sampled_frames += other.sampled_frames;
        self.failed_reads += other.failed_reads;
        self.candidates += other.candidates;
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub verdicts: FrameVerdicts,
    pub stats: ScanStats,
}

/// 单个 worker 的私有结果，所有 worker 结束后才合并
struct ChunkOutcome {
    verdicts: Vec<(u64, Detection)>,
    stats: ScanStats,
}

/// 把 `[0, frame_count)` 切成 `workers` 个连续分块，余数归最后一块
pub fn partition_chunks(frame_count: u64, workers: usize) -> Vec<Range<u64>> {
    let workers = workers.max(1) as u64;
    let chunk_len = frame_count / workers;

    (0..workers)
        .map(|i| {
            let lower = chunk_len * i;
            let upper = if i == workers - 1 {
                frame_count
            } else {
                chunk_len * (i + 1)
            };
            lower..upper
        })
        .collect()
}

pub struct CoarseScanner {
    stride: u64,
    workers: usize,
    confidence_threshold: f32,
}

impl CoarseScanner {
    pub fn new(stride: u64, workers: usize, confidence_threshold: f32) -> Self {
        Self {
            stride,
            workers,
            confidence_threshold,
        }
    }

    pub fn scan(
        &self,
        source: &dyn FrameSource,
        classifier: &dyn SlateClassifier,
    ) -> Result<ScanOutcome, VideoError> {
        if self.stride == 0 {
            return Err(ConfigError::Invalid {
                field: "sample_stride",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "workers",
                reason: "must be at least 1".into(),
            }
            .into());
        }

        let frame_count = source.frame_count();
        let chunks = partition_chunks(frame_count, self.workers);
        info!(
            "🔍 Coarse scan: {} frames, stride {}, {} workers (~{} samples)",
            frame_count,
            self.stride,
            self.workers,
            frame_count / self.stride
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("slate-scan-{}", i))
            .build()?;

        let outcomes: Vec<ChunkOutcome> = pool.install(|| {
            chunks
                .par_iter()
                .enumerate()
                .map(|(worker_id, chunk)| self.scan_chunk(worker_id, chunk.clone(), source, classifier))
                .collect()
        });

        let mut verdicts = FrameVerdicts::new();
        let mut stats = ScanStats::default();
        for outcome in outcomes {
            for (frame_number, detection) in outcome.verdicts {
                let previous = verdicts.insert(frame_number, detection);
                debug_assert!(previous.is_none(), "frame {} scanned twice", frame_number);
            }
            stats.absorb(outcome.stats);
        }

        info!(
            "✅ Coarse scan done: {} sampled, {} candidates, {} unreadable",
            stats.sampled_frames, stats.candidates, stats.failed_reads
        );
        Ok(ScanOutcome { verdicts, stats })
    }

    fn scan_chunk(
        &self,
        worker_id: usize,
        chunk: Range<u64>,
        source: &dyn FrameSource,
        classifier: &dyn SlateClassifier,
    ) -> ChunkOutcome {
        let mut verdicts = Vec::new();
        let mut stats = ScanStats::default();
        let chunk_end = chunk.end;

        for frame_number in chunk.step_by(self.stride as usize) {
            if stats.sampled_frames % PROGRESS_EVERY == 0 {
                debug!("Worker {} - frame {}/{}", worker_id, frame_number, chunk_end);
            }
            stats.sampled_frames += 1;

            let frame = match source.read_frame(frame_number) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("⚠️ Worker {} skipped frame {}: {}", worker_id, frame_number, e);
                    stats.failed_reads += 1;
                    continue;
                }
            };

            let detections = classifier.classify(&frame);
            if let Some(detection) = Detection::primary(&detections)
                .filter(|d| d.confidence >= self.confidence_threshold)
            {
                verdicts.push((frame_number, *detection));
                stats.candidates += 1;
            }
        }

        ChunkOutcome { verdicts, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::detection::{MockClassifier, SlateState};
    use crate::core::video::frame::SyntheticSource;

    #[test]
    fn test_partition_covers_range_exactly_once() {
        for frame_count in [0u64, 1, 3, 7, 24, 100, 101, 997] {
            for workers in 1..=9usize {
                let chunks = partition_chunks(frame_count, workers);
                assert_eq!(chunks.len(), workers);

                let mut next = 0;
                for chunk in &chunks {
                    assert_eq!(chunk.start, next, "gap or overlap at {}", next);
                    assert!(chunk.start <= chunk.end);
                    next = chunk.end;
                }
                assert_eq!(next, frame_count);
            }
        }
    }

    #[test]
    fn test_partition_last_chunk_takes_remainder() {
        let chunks = partition_chunks(10, 4);
        assert_eq!(chunks, vec![0..2, 2..4, 4..6, 6..10]);
    }

    #[test]
    fn test_scan_samples_each_chunk_by_stride() {
        let source = SyntheticSource::new(100, 25.0);
        let classifier = MockClassifier::with_pattern(|_| vec![Detection::new(SlateState::Open, 0.9)]);

        let outcome = CoarseScanner::new(10, 2, 0.85).scan(&source, &classifier).unwrap();

        let frames: Vec<u64> = outcome.verdicts.keys().copied().collect();
        assert_eq!(frames, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
        assert_eq!(outcome.stats.sampled_frames, 10);
        assert_eq!(outcome.stats.candidates, 10);
    }

    #[test]
    fn test_scan_restarts_sampling_at_chunk_border() {
        let source = SyntheticSource::new(30, 25.0);
        let classifier = MockClassifier::with_pattern(|_| vec![Detection::new(SlateState::Closed, 0.9)]);

        let outcome = CoarseScanner::new(4, 3, 0.5).scan(&source, &classifier).unwrap();

        let frames: Vec<u64> = outcome.verdicts.keys().copied().collect();
        assert_eq!(frames, vec![0, 4, 8, 10, 14, 18, 20, 24, 28]);
    }

    #[test]
    fn test_scan_filters_low_confidence() {
        let source = SyntheticSource::new(50, 25.0);
        let classifier = MockClassifier::with_pattern(|n| {
            if n == 20 || n == 22 {
                vec![
                    Detection::new(SlateState::Open, 0.3),
                    Detection::new(SlateState::Closed, 0.95),
                ]
            } else {
                vec![Detection::new(SlateState::Open, 0.4)]
            }
        });

        // 分块 0..12, 12..24, 24..36, 36..50，每块从自己的起点重新按步长抽帧
        let everything = CoarseScanner::new(5, 4, 0.0).scan(&source, &classifier).unwrap();
        let sampled: Vec<u64> = everything.verdicts.keys().copied().collect();
        assert_eq!(sampled, vec![0, 5, 10, 12, 17, 22, 24, 29, 34, 36, 41, 46]);
        assert_eq!(everything.stats.sampled_frames, 12);

        let outcome = CoarseScanner::new(5, 4, 0.85).scan(&source, &classifier).unwrap();

        assert_eq!(outcome.verdicts.len(), 1);
        assert_eq!(outcome.verdicts[&22].state, SlateState::Closed);
        assert!(!outcome.verdicts.contains_key(&20));
    }

    #[test]
    fn test_scan_skips_unreadable_frames() {
        let source = SyntheticSource::new(40, 25.0).with_unreadable(vec![10, 30]);
        let classifier = MockClassifier::with_pattern(|_| vec![Detection::new(SlateState::Open, 0.9)]);

        let outcome = CoarseScanner::new(10, 2, 0.85).scan(&source, &classifier).unwrap();

        let frames: Vec<u64> = outcome.verdicts.keys().copied().collect();
        assert_eq!(frames, vec![0, 20]);
        assert_eq!(outcome.stats.failed_reads, 2);
        assert_eq!(outcome.stats.sampled_frames, 4);
    }

    #[test]
    fn test_scan_more_workers_than_frames() {
        let source = SyntheticSource::new(3, 25.0);
        let classifier = MockClassifier::with_pattern(|_| vec![Detection::new(SlateState::Open, 0.9)]);

        let outcome = CoarseScanner::new(1, 8, 0.5).scan(&source, &classifier).unwrap();
        assert_eq!(outcome.verdicts.len(), 3);
    }

    #[test]
    fn test_scan_rejects_zero_stride() {
        let source = SyntheticSource::new(10, 25.0);
        let classifier = MockClassifier::empty();

        let result = CoarseScanner::new(0, 2, 0.5).scan(&source, &classifier);
        assert!(matches!(result, Err(VideoError::Config(_))));
    }
}
