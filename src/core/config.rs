//! 分析器配置：默认值、预设、校验与 JSON5 加载

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] json5::Error),
    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// 区域搜索上界的取法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpperBound {
    /// 最后一个候选帧加一个步长，不超过视频最后一帧
    #[default]
    Widened,
    /// 始终取视频最后一帧（旧版本行为，会搜索区域之后的整段视频）
    VideoEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// 粗扫描时每隔 `sample_stride` 帧分类一次
    pub sample_stride: u64,
    pub confidence_threshold: f32,
    pub workers: usize,
    /// 每个区域允许的单帧步数
    pub max_steps: u32,
    /// 每个区域随机重启的次数，用完后退回尽力结果
    pub max_retries: u32,
    /// 候选切换点两侧重新分类的帧数
    pub confidence_margin: u64,
    pub upper_bound: UpperBound,
    /// 重启位置的随机种子，`None` 时使用系统熵
    pub seed: Option<u64>,
    pub include_best_effort: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_stride: 30,
            confidence_threshold: 0.85,
            workers: 4,
            max_steps: 15,
            max_retries: 2,
            confidence_margin: 4,
            upper_bound: UpperBound::Widened,
            seed: None,
            include_best_effort: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn for_fast_scan() -> Self {
        Self {
            sample_stride: 60,
            max_steps: 10,
            max_retries: 1,
            ..Default::default()
        }
    }

    pub fn for_precise_scan() -> Self {
        Self {
            sample_stride: 15,
            max_steps: 20,
            max_retries: 3,
            ..Default::default()
        }
    }

    pub fn with_available_cores(self) -> Self {
        Self {
            workers: num_cpus::get().max(1),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_stride == 0 {
            return Err(ConfigError::Invalid {
                field: "sample_stride",
                reason: "must be at least 1".into(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "workers",
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid {
                field: "confidence_threshold",
                reason: format!("{} is outside [0, 1]", self.confidence_threshold),
            });
        }
        Ok(())
    }

    /// 解析 JSON5（兼容普通 JSON），缺省字段保持默认值
    pub fn from_json5_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json5_str(&text)
    }
}
