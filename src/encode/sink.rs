use std::path::PathBuf;

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{PipelineError, PipelineResult};
use crate::render::frame::FrameRGBA;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Optional raw PCM audio file to mux with the frames.
    pub audio: Option<AudioInputConfig>,
}

/// Raw PCM audio input for sinks that encode audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInputConfig {
    /// Path to interleaved `f32le` PCM data.
    pub path: PathBuf,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

/// What a sink produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    /// Output file, for sinks that write one.
    pub path: Option<PathBuf>,
    /// Number of frames written.
    pub frames: u64,
}

/// Consumer of rendered frames in timeline order.
///
/// `push_frame` is called with strictly increasing [`FrameIndex`] values. After a failure the
/// caller invokes [`FrameSink::discard`] instead of [`FrameSink::end`]; a discarded sink must not
/// leave a partial artifact behind.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> PipelineResult<()>;
    /// Push one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PipelineResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> PipelineResult<Artifact>;
    /// Abandon the output. Safe to call in any state.
    fn discard(&mut self) {}
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    began: bool,
    finished: bool,
    discarded: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    /// Frames in timeline order.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    pub fn began(&self) -> bool {
        self.began
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn discarded(&self) -> bool {
        self.discarded
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> PipelineResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.began = true;
        self.finished = false;
        self.discarded = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PipelineResult<()> {
        if let Some((last, _)) = self.frames.last()
            && idx <= *last
        {
            return Err(PipelineError::render("in-memory sink received out-of-order frame"));
        }
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> PipelineResult<Artifact> {
        if !self.began {
            return Err(PipelineError::render("in-memory sink not started"));
        }
        self.finished = true;
        Ok(Artifact {
            path: None,
            frames: self.frames.len() as u64,
        })
    }

    fn discard(&mut self) {
        self.frames.clear();
        self.discarded = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
