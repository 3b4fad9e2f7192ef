use std::fmt;

use crate::{
    assets::media,
    assets::store::{AssetStore, AudioAsset},
    composition::compositor::ComposedVisual,
    effects::post::{PostEffects, TimeMap, apply_frame_effects},
    encode::sink::{Artifact, AudioInputConfig, FrameSink, SinkConfig},
    foundation::core::{Fps, FrameIndex},
    foundation::error::{FailureReason, PipelineError, PipelineResult},
    pipeline::state::PipelineState,
};

/// Terminal status of a render request.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderStatus {
    Success,
    Failed {
        reason: FailureReason,
        message: String,
    },
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failed { reason, message } => write!(f, "failed ({reason}): {message}"),
        }
    }
}

/// Outcome of one render request.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderResult {
    /// What the sink produced. Empty on failure.
    pub artifact: Artifact,
    /// Final duration in seconds. Zero on failure.
    pub duration_sec: f64,
    pub status: RenderStatus,
    /// Every state the run passed through, in order.
    pub states: Vec<PipelineState>,
    /// How many times the audio bed was reconciled against a visual duration.
    pub mix_passes: u32,
}

impl RenderResult {
    pub fn success(artifact: Artifact, duration_sec: f64) -> Self {
        Self {
            artifact,
            duration_sec,
            status: RenderStatus::Success,
            states: Vec::new(),
            mix_passes: 0,
        }
    }

    pub fn failed(err: &PipelineError) -> Self {
        Self {
            artifact: Artifact::default(),
            duration_sec: 0.0,
            status: RenderStatus::Failed {
                reason: err.reason(),
                message: err.to_string(),
            },
            states: Vec::new(),
            mix_passes: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RenderStatus::Success
    }
}

/// Stream the final visual and audio into `sink`.
///
/// Output time `t` shows the composite at `time_map.out_to_src(t)`; `audio` must already match
/// `time_map.output_duration()`. On error the sink is discarded before returning.
#[tracing::instrument(level = "info", skip_all, fields(duration = time_map.output_duration()))]
pub fn export(
    store: &AssetStore,
    visual: &ComposedVisual,
    time_map: &TimeMap,
    audio: &AudioAsset,
    effects: &PostEffects,
    fps: Fps,
    sink: &mut dyn FrameSink,
) -> PipelineResult<RenderResult> {
    match export_inner(store, visual, time_map, audio, effects, fps, sink) {
        Ok(out) => Ok(out),
        Err(e) => {
            sink.discard();
            Err(e)
        }
    }
}

fn export_inner(
    store: &AssetStore,
    visual: &ComposedVisual,
    time_map: &TimeMap,
    audio: &AudioAsset,
    effects: &PostEffects,
    fps: Fps,
    sink: &mut dyn FrameSink,
) -> PipelineResult<RenderResult> {
    let duration = time_map.output_duration();
    let pcm = store.audio(audio.handle).ok_or_else(|| {
        PipelineError::composition(format!("audio bed {} is not live", audio.handle))
    })?;
    if (pcm.duration_sec() - duration).abs() > 1.0 / f64::from(pcm.sample_rate.max(1)) {
        return Err(PipelineError::render(format!(
            "audio bed is {}s but the video is {duration}s",
            pcm.duration_sec()
        )));
    }

    let (_, audio_path) = store.acquire_scratch_file("audio_bed_pcm", "f32le")?;
    std::fs::write(&audio_path, media::f32le_to_bytes(&pcm.interleaved_f32)).map_err(|e| {
        PipelineError::storage(format!(
            "failed to write audio bed '{}': {e}",
            audio_path.display()
        ))
    })?;

    let canvas = visual.canvas();
    sink.begin(SinkConfig {
        width: canvas.width,
        height: canvas.height,
        fps,
        audio: Some(AudioInputConfig {
            path: audio_path,
            sample_rate: pcm.sample_rate,
            channels: pcm.channels,
        }),
    })?;

    let frames = fps.secs_to_frames_round(duration).max(1);
    let last_src = time_map.source_duration();
    for i in 0..frames {
        let t_out = fps.frames_to_secs(i);
        let t_src = time_map.out_to_src(t_out).min(last_src);
        let mut frame = visual.frame_at(store, t_src)?;
        if effects.has_frame_effects() {
            apply_frame_effects(&mut frame, effects, FrameIndex(i));
        }
        sink.push_frame(FrameIndex(i), &frame)?;
    }
    let artifact = sink.end()?;
    tracing::info!(frames, duration_sec = duration, "render complete");
    Ok(RenderResult::success(artifact, duration))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/export.rs"]
mod tests;
