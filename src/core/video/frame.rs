use super::error::VideoError;
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    pub fn from_rgba_image(img: image::RgbaImage, frame_number: u64, frame_rate: f64) -> Self {
        let (width, height) = img.dimensions();
        Self::new(
            width,
            height,
            img.into_raw(),
            frame_timestamp_ms(frame_number, frame_rate),
            frame_number,
        )
    }
}

pub fn frame_timestamp_ms(frame_number: u64, frame_rate: f64) -> u64 {
    if frame_rate > 0.0 {
        (frame_number as f64 * 1000.0 / frame_rate) as u64
    } else {
        0
    }
}

/// 视频帧随机读取接口
///
/// 粗扫描的各个 worker 共享同一个帧源，读取走 `&self`，带游标的解码器需自行加锁
pub trait FrameSource: Send + Sync {
    fn frame_count(&self) -> u64;

    fn frame_rate(&self) -> f64;

    /// (宽, 高)
    fn resolution(&self) -> (u32, u32);

    fn read_frame(&self, index: u64) -> Result<Frame, VideoError>;

    fn name(&self) -> String {
        String::from("<unnamed>")
    }

    fn duration_secs(&self) -> f64 {
        let fps = self.frame_rate();
        if fps > 0.0 {
            self.frame_count() as f64 / fps
        } else {
            0.0
        }
    }
}

/// 图片序列帧源：把导出的逐帧图片当作视频读取
pub struct ImageSequenceSource {
    name: String,
    paths: Vec<PathBuf>,
    frame_rate: f64,
    resolution: (u32, u32),
}

impl ImageSequenceSource {
    /// 收集 `dir` 下的所有图片文件，按文件名排序
    pub fn from_dir(dir: impl AsRef<Path>, frame_rate: f64) -> Result<Self, VideoError> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        Self::with_name(name, paths, frame_rate)
    }

    pub fn new(paths: Vec<PathBuf>, frame_rate: f64) -> Result<Self, VideoError> {
        Self::with_name(String::from("image-sequence"), paths, frame_rate)
    }

    fn with_name(name: String, paths: Vec<PathBuf>, frame_rate: f64) -> Result<Self, VideoError> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(VideoError::InvalidFrameRate(frame_rate));
        }
        let first = paths
            .first()
            .ok_or_else(|| VideoError::EmptySource(name.clone()))?;
        let resolution = image::image_dimensions(first)?;

        debug!(
            "🎞️ Image sequence {}: {} frames, {}x{} @ {:.3} fps",
            name,
            paths.len(),
            resolution.0,
            resolution.1,
            frame_rate
        );

        Ok(Self {
            name,
            paths,
            frame_rate,
            resolution,
        })
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn frame_count(&self) -> u64 {
        self.paths.len() as u64
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn read_frame(&self, index: u64) -> Result<Frame, VideoError> {
        let path = self
            .paths
            .get(index as usize)
            .ok_or(VideoError::FrameOutOfRange {
                index,
                frame_count: self.frame_count(),
            })?;
        let img = image::open(path)?.to_rgba8();
        Ok(Frame::from_rgba_image(img, index, self.frame_rate))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// 空白合成帧源，帧内只有帧号，配合按帧号判定的分类器使用（试运行、测试）
pub struct SyntheticSource {
    frame_count: u64,
    frame_rate: f64,
    width: u32,
    height: u32,
    unreadable: Vec<u64>,
}

impl SyntheticSource {
    pub fn new(frame_count: u64, frame_rate: f64) -> Self {
        Self {
            frame_count,
            frame_rate,
            width: 8,
            height: 8,
            unreadable: Vec::new(),
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// 读取失败的帧，模拟解码错误
    pub fn with_unreadable(mut self, frames: Vec<u64>) -> Self {
        self.unreadable = frames;
        self
    }
}

impl FrameSource for SyntheticSource {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_frame(&self, index: u64) -> Result<Frame, VideoError> {
        if index >= self.frame_count || self.unreadable.contains(&index) {
            return Err(VideoError::FrameOutOfRange {
                index,
                frame_count: self.frame_count,
            });
        }
        let data = vec![0u8; (self.width * self.height * 4) as usize];
        Ok(Frame::new(
            self.width,
            self.height,
            data,
            frame_timestamp_ms(index, self.frame_rate),
            index,
        ))
    }

    fn name(&self) -> String {
        String::from("synthetic")
    }
}
