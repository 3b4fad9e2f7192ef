use std::path::Path;

use crate::{
    composition::compositor::ComposeOpts,
    composition::layers::WatermarkPosition,
    effects::post::{PostEffects, SpeedSegment},
    effects::transitions::Transition,
    extract::text::DEFAULT_MAX_CHARS,
    foundation::core::{Canvas, Fps, Rgba8, ensure_finite_positive},
    foundation::error::{PipelineError, PipelineResult},
    timeline::builder::{DEFAULT_SLOT_SECS, TimelineOpts},
    timeline::preprocess::{ImageFilter, PreprocessOpts},
};

const MAX_VOLUME: f32 = 4.0;

/// Every option of a render request. Immutable once handed to the pipeline.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Character budget of the narration script.
    pub max_chars: usize,
    /// Seconds per slot without an override.
    pub slot_duration: f64,
    pub slot_durations: Vec<f64>,
    #[serde(alias = "transitions")]
    pub transition: Transition,
    pub slot_transitions: Vec<Transition>,
    /// Length of each transition in seconds.
    pub transition_secs: f64,
    #[serde(alias = "filters")]
    pub filter: ImageFilter,
    pub shape_overlay: bool,
    pub persistent_background: bool,
    /// Narration language code.
    pub language: String,
    pub global_speed: f64,
    pub segment_speeds: Vec<SpeedSegment>,
    pub apply_glitch: bool,
    pub apply_noise: bool,
    pub watermark_opacity: f32,
    pub watermark_position: WatermarkPosition,
    pub music_volume: f32,
    pub effects_volume: f32,
    /// Hold the last frame when the images run out before the narration does.
    pub freeze_last_frame: bool,
    pub canvas: Canvas,
    pub fps: Fps,
    /// Straight-alpha fill beneath all layers.
    pub background_color: Rgba8,
    /// Seed of shape overlays, glitch and noise.
    pub seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            slot_duration: DEFAULT_SLOT_SECS,
            slot_durations: Vec::new(),
            transition: Transition::None,
            slot_transitions: Vec::new(),
            transition_secs: 0.5,
            filter: ImageFilter::None,
            shape_overlay: false,
            persistent_background: false,
            language: "en".to_string(),
            global_speed: 1.0,
            segment_speeds: Vec::new(),
            apply_glitch: false,
            apply_noise: false,
            watermark_opacity: 0.5,
            watermark_position: WatermarkPosition::BottomRight,
            music_volume: 0.3,
            effects_volume: 1.0,
            freeze_last_frame: false,
            canvas: Canvas::default(),
            fps: Fps::default(),
            background_color: Rgba8::BLACK,
            seed: 0,
        }
    }
}

impl RenderConfig {
    /// Load a JSON configuration file. The result is not yet validated.
    pub fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> PipelineResult<Self> {
        serde_json::from_str(text).map_err(|e| PipelineError::config(format!("invalid config: {e}")))
    }

    /// Check every option that needs no runtime input. Segment ranges are checked later
    /// against the composed duration.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_chars == 0 {
            return Err(PipelineError::config("max_chars must be > 0"));
        }
        ensure_finite_positive("slot_duration", self.slot_duration)?;
        for (i, d) in self.slot_durations.iter().enumerate() {
            ensure_finite_positive(&format!("slot_durations[{i}]"), *d)?;
        }
        if !self.transition_secs.is_finite() || self.transition_secs < 0.0 {
            return Err(PipelineError::config(format!(
                "transition_secs must be finite and >= 0 (got {})",
                self.transition_secs
            )));
        }
        if self.language.trim().is_empty() {
            return Err(PipelineError::config("language must not be empty"));
        }
        unit_range("watermark_opacity", self.watermark_opacity, 1.0)?;
        unit_range("music_volume", self.music_volume, MAX_VOLUME)?;
        unit_range("effects_volume", self.effects_volume, MAX_VOLUME)?;
        let Canvas { width, height } = self.canvas;
        if width == 0 || height == 0 || !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            return Err(PipelineError::config(format!(
                "canvas must have even, non-zero dimensions (got {width}x{height})"
            )));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        self.post_effects().validate_structure()
    }

    pub fn timeline_opts(&self, overlay_texts: Vec<String>) -> TimelineOpts {
        TimelineOpts {
            slot_duration: self.slot_duration,
            slot_durations: self.slot_durations.clone(),
            transition: self.transition,
            slot_transitions: self.slot_transitions.clone(),
            overlay_texts,
            preprocess: PreprocessOpts {
                filter: self.filter,
                shape_overlay: self.shape_overlay,
                seed: self.seed,
            },
            persistent_background: self.persistent_background,
            canvas: self.canvas,
        }
    }

    pub fn compose_opts(&self) -> ComposeOpts {
        ComposeOpts {
            canvas: self.canvas,
            transition_secs: self.transition_secs,
            freeze_last_frame: self.freeze_last_frame,
        }
    }

    pub fn post_effects(&self) -> PostEffects {
        PostEffects {
            global_speed: self.global_speed,
            segments: self.segment_speeds.clone(),
            glitch: self.apply_glitch,
            noise: self.apply_noise,
            seed: self.seed,
        }
    }
}

fn unit_range(name: &str, v: f32, max: f32) -> PipelineResult<()> {
    if !v.is_finite() || !(0.0..=max).contains(&v) {
        return Err(PipelineError::config(format!(
            "{name} must be within [0, {max}] (got {v})"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/config.rs"]
mod tests;
