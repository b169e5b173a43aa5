//! 原始音频帧 (AudioFrame).
//!
//! 对标 FFmpeg 的 `AVFrame` (仅音频部分).
//! 平面格式: data 中每个 Vec 对应一个声道.
//! 交错格式: data 中只有一个 Vec, 所有声道交替排列.

use yin_core::timestamp::NOPTS_VALUE;
use yin_core::{ChannelLayout, Rational, SampleFormat};

use crate::error::{EngineError, EngineResult};

/// 音频帧
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// 音频采样数据
    pub data: Vec<Vec<u8>>,
    /// 本帧包含的采样数 (每声道)
    pub nb_samples: u32,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 采样格式
    pub sample_format: SampleFormat,
    /// 声道布局
    pub channel_layout: ChannelLayout,
    /// 显示时间戳 (PTS), `NOPTS_VALUE` 表示未知
    pub pts: i64,
    /// 时间基
    pub time_base: Rational,
    /// 帧时长 (以 time_base 为单位)
    pub duration: i64,
}

impl AudioFrame {
    /// 创建不带数据缓冲的音频帧
    pub fn new(
        nb_samples: u32,
        sample_rate: u32,
        sample_format: SampleFormat,
        channel_layout: ChannelLayout,
    ) -> Self {
        Self {
            data: Vec::new(),
            nb_samples,
            sample_rate,
            sample_format,
            channel_layout,
            pts: NOPTS_VALUE,
            time_base: Rational::UNDEFINED,
            duration: 0,
        }
    }

    /// 平面数量
    pub fn plane_count(&self) -> usize {
        if self.sample_format.is_planar() {
            self.channel_layout.channels as usize
        } else {
            1
        }
    }

    /// 单个平面的字节数
    pub fn plane_size(&self) -> usize {
        let per_plane_channels = if self.sample_format.is_planar() {
            1
        } else {
            self.channel_layout.channels as usize
        };
        self.nb_samples as usize
            * self.sample_format.bytes_per_sample() as usize
            * per_plane_channels
    }

    /// 按当前参数分配 (清零的) 数据缓冲
    ///
    /// 对标 `av_frame_get_buffer`.
    pub fn alloc_buffers(&mut self) -> EngineResult<()> {
        if self.nb_samples == 0
            || self.channel_layout.channels == 0
            || self.sample_format == SampleFormat::None
        {
            return Err(EngineError::InvalidArgument(format!(
                "无法分配音频帧: nb_samples={}, channels={}, format={}",
                self.nb_samples, self.channel_layout.channels, self.sample_format,
            )));
        }

        let plane_size = self.plane_size();
        let mut planes = Vec::new();
        planes
            .try_reserve_exact(self.plane_count())
            .map_err(|e| EngineError::OutOfMemory(e.to_string()))?;
        for _ in 0..self.plane_count() {
            let mut plane = Vec::new();
            plane
                .try_reserve_exact(plane_size)
                .map_err(|e| EngineError::OutOfMemory(e.to_string()))?;
            plane.resize(plane_size, 0);
            planes.push(plane);
        }
        self.data = planes;
        Ok(())
    }

    /// 确认帧缓冲可写
    ///
    /// 对标 `av_frame_make_writable`. 缓冲尺寸与当前参数不一致时重新分配.
    pub fn make_writable(&mut self) -> EngineResult<()> {
        if self.data.is_empty() {
            return Err(EngineError::InvalidArgument("音频帧尚未分配缓冲".into()));
        }
        let plane_size = self.plane_size();
        if self.data.len() != self.plane_count()
            || self.data.iter().any(|plane| plane.len() != plane_size)
        {
            return self.alloc_buffers();
        }
        Ok(())
    }
}
