//! Storyreel turns a document, a set of images and optional audio into a narrated MP4.
//!
//! # Pipeline overview
//!
//! 1. **Extract**: `Document -> ExtractedText` (bounded, with a caller fallback)
//! 2. **Narrate**: `ExtractedText -> AudioAsset` through a [`SpeechSynthesizer`]
//! 3. **Build timeline**: images + narration length -> [`VisualTimeline`]
//! 4. **Compose**: [`LayerStack`] -> [`ComposedVisual`] (background, primary, captions, watermark)
//! 5. **Mix**: [`AudioBed`] -> one stereo track of the final duration
//! 6. **Post-effects**: speed changes re-time audio and video through one [`TimeMap`]
//! 7. **Export**: frames + mixed audio streamed into a [`FrameSink`] (ffmpeg for MP4)
//!
//! [`Pipeline`] drives the stages in order through a [`StateMachine`]; every
//! intermediate lives in an [`AssetStore`] and is released when the run ends,
//! whether it succeeds, fails or is cancelled.
//!
//! The key constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Audio/visual sync**: the exported audio and video durations are equal.
//! - **Premultiplied RGBA8** end-to-end: frames handed to sinks are premultiplied.
#![forbid(unsafe_code)]

mod assets;
mod audio;
mod composition;
mod effects;
mod encode;
mod extract;
mod foundation;
mod narration;
mod pipeline;
mod render;
mod timeline;

pub use assets::decode::{contain_rect, decode_image, fit_to_canvas, resize_premul};
pub use assets::media::{
    MIX_CHANNELS, MIX_SAMPLE_RATE, PreparedAudio, decode_audio_f32_stereo, f32le_from_bytes,
    f32le_to_bytes, secs_to_sample_frames,
};
pub use assets::store::{
    AssetHandle, AssetKind, AssetPayload, AssetStore, AudioAsset, ImageAsset, PreparedImage,
    ScratchSpace, StoreStats, TeardownGuard,
};
pub use audio::mix::{
    AudioBed, EffectCue, MUSIC_FADE_OUT_SECS, MusicTrack, TrackKind, mix_bed, reconcile_duration,
};
pub use composition::compositor::{
    ComposeOpts, ComposedVisual, Compositor, WATERMARK_MARGIN_FRACTION,
    WATERMARK_MAX_WIDTH_FRACTION, final_duration,
};
pub use composition::layers::{
    Background, Layer, LayerKind, LayerStack, Project, Watermark, WatermarkPosition,
};
pub use effects::post::{
    PostEffects, SpeedSegment, TimeMap, TimePiece, apply_frame_effects, retime_audio,
};
pub use effects::transitions::{
    Transition, TransitionFrame, ZOOM_START_SCALE, parse_transition, progress, transition_frame,
};
pub use encode::export::{RenderResult, RenderStatus, export};
pub use encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, ensure_parent_dir, is_ffmpeg_on_path};
pub use encode::sink::{Artifact, AudioInputConfig, FrameSink, InMemorySink, SinkConfig};
pub use extract::text::{
    DEFAULT_MAX_CHARS, Document, ExtractedText, MediaType, PdfToTextSource, PlainTextSource,
    TextSource, extract_text,
};
pub use foundation::core::{
    Canvas, DURATION_EPSILON, Fps, FrameIndex, Rgba8, ensure_finite_positive,
};
pub use foundation::error::{FailureReason, PipelineError, PipelineResult};
pub use foundation::math::Rng64;
pub use narration::synth::{CommandSynthesizer, SpeechSynthesizer, synthesize_narration};
pub use pipeline::config::RenderConfig;
pub use pipeline::orchestrator::{
    AudioInput, CancelHandle, EffectInput, ImageInput, Pipeline, RenderRequest,
};
pub use pipeline::state::{PipelineState, StateMachine};
pub use render::composite::{PremulRgba8, Target, blit_over, over};
pub use render::frame::FrameRGBA;
pub use timeline::builder::{DEFAULT_SLOT_SECS, TimelineOpts, build_timeline};
pub use timeline::caption::{band_height, render_caption};
pub use timeline::model::{PersistentBackground, TimelineSlot, VisualTimeline};
pub use timeline::preprocess::{ImageFilter, PreprocessOpts, preprocess_image};
