use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::{
    assets::decode::decode_image,
    assets::media::{self, PreparedAudio},
    assets::store::{
        AssetPayload, AssetStore, AudioAsset, ImageAsset, PreparedImage, TeardownGuard,
    },
    audio::mix::{AudioBed, EffectCue, MusicTrack, mix_bed, reconcile_duration},
    composition::compositor::Compositor,
    composition::layers::{Background, LayerStack, Project, Watermark},
    effects::post::retime_audio,
    encode::export::{RenderResult, export},
    encode::sink::FrameSink,
    extract::text::{Document, ExtractedText, PdfToTextSource, PlainTextSource, TextSource},
    foundation::error::{PipelineError, PipelineResult},
    narration::synth::{SpeechSynthesizer, synthesize_narration},
    pipeline::config::RenderConfig,
    pipeline::state::{PipelineState, StateMachine},
    timeline::builder::build_timeline,
    timeline::model::VisualTimeline,
};

/// An uploaded image.
#[derive(Clone, Debug)]
pub enum ImageInput {
    /// Encoded bytes in any format the `image` crate reads.
    Encoded(Vec<u8>),
    /// Already decoded premultiplied pixels.
    Decoded(PreparedImage),
}

/// An uploaded audio clip.
#[derive(Clone, Debug)]
pub enum AudioInput {
    /// Encoded bytes decoded through ffmpeg. `extension` hints the container.
    Encoded { bytes: Vec<u8>, extension: String },
    /// Already decoded PCM.
    Decoded(PreparedAudio),
}

/// A sound effect placed on the audio bed.
#[derive(Clone, Debug)]
pub struct EffectInput {
    /// The clip, played once.
    pub audio: AudioInput,
    /// Start time in seconds; must be finite and >= 0.
    pub offset: f64,
}

/// Everything one render needs. Optional inputs that are absent are simply skipped.
#[derive(Clone, Debug, Default)]
pub struct RenderRequest {
    /// Source document for the narration script.
    pub document: Option<Document>,
    /// Used when the document is missing or yields no text.
    pub fallback_text: Option<String>,
    /// Slideshow images in display order; at least one is required.
    pub images: Vec<ImageInput>,
    /// Caption per image, by index.
    pub overlay_texts: Vec<String>,
    /// Background music, looped under the narration.
    pub music: Option<AudioInput>,
    /// Static image behind the slideshow; the configured color is used otherwise.
    pub background: Option<ImageInput>,
    /// Image drawn over every frame.
    pub watermark: Option<ImageInput>,
    /// Sound effects at fixed offsets.
    pub effects: Vec<EffectInput>,
    /// Render settings, validated before any stage runs.
    pub config: RenderConfig,
}

/// Handle for cancelling a running pipeline at the next stage boundary.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Request cancellation; the run stops when it next enters a stage.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether [`CancelHandle::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Runs render requests stage by stage.
///
/// The asset store is torn down when a run ends, whatever the outcome.
pub struct Pipeline {
    store: Arc<AssetStore>,
    text_sources: Vec<Box<dyn TextSource>>,
    tts: Arc<dyn SpeechSynthesizer>,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    /// Pipeline reading plain text, markdown and PDF documents.
    pub fn new(store: Arc<AssetStore>, tts: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            store,
            text_sources: vec![
                Box::new(PlainTextSource),
                Box::new(PdfToTextSource::default()),
            ],
            tts,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add a text source, consulted before the built-in ones.
    pub fn with_text_source(mut self, source: impl TextSource + 'static) -> Self {
        self.text_sources.insert(0, Box::new(source));
        self
    }

    /// The asset store backing every run of this pipeline.
    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Handle that cancels this pipeline from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run `request` into `sink`.
    ///
    /// On failure the sink is discarded and the error returned; either way every asset acquired
    /// during the run is released before this returns.
    pub fn run(
        &self,
        request: &RenderRequest,
        sink: &mut dyn FrameSink,
    ) -> PipelineResult<RenderResult> {
        let mut sm = StateMachine::new();
        self.run_with(request, sink, &mut sm)
    }

    /// Like [`Pipeline::run`], but failures are folded into [`RenderResult::status`].
    pub fn render(&self, request: &RenderRequest, sink: &mut dyn FrameSink) -> RenderResult {
        let mut sm = StateMachine::new();
        match self.run_with(request, sink, &mut sm) {
            Ok(result) => result,
            Err(e) => {
                let mut result = RenderResult::failed(&e);
                result.states = sm.into_history();
                result
            }
        }
    }

    fn run_with(
        &self,
        request: &RenderRequest,
        sink: &mut dyn FrameSink,
        sm: &mut StateMachine,
    ) -> PipelineResult<RenderResult> {
        let started = Instant::now();
        let _teardown = TeardownGuard::new(&self.store);
        match self.execute(request, sink, sm) {
            Ok(mut result) => {
                sm.advance(PipelineState::Done)?;
                result.states = sm.history().to_vec();
                tracing::info!(
                    duration_sec = result.duration_sec,
                    frames = result.artifact.frames,
                    mix_passes = result.mix_passes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "render finished"
                );
                Ok(result)
            }
            Err(e) => {
                let at = sm.current();
                sm.fail();
                sink.discard();
                tracing::error!(stage = %at, reason = %e.reason(), error = %e, "render failed");
                Err(e)
            }
        }
    }

    /// Cancellation check plus state transition at a stage boundary.
    fn enter(&self, sm: &mut StateMachine, stage: PipelineState) -> PipelineResult<()> {
        if self.is_cancelled() {
            tracing::warn!(stage = %stage, "pipeline cancelled");
            return Err(PipelineError::Cancelled(stage.to_string()));
        }
        sm.advance(stage)?;
        tracing::info!(stage = %stage, "stage started");
        Ok(())
    }

    fn execute(
        &self,
        req: &RenderRequest,
        sink: &mut dyn FrameSink,
        sm: &mut StateMachine,
    ) -> PipelineResult<RenderResult> {
        let cfg = &req.config;
        cfg.validate()?;
        validate_inputs(req)?;
        let store = self.store.as_ref();

        self.enter(sm, PipelineState::Extracting)?;
        let text = self.extract(req)?;

        self.enter(sm, PipelineState::Synthesizing)?;
        let narration = synthesize_narration(store, self.tts.as_ref(), &text, &cfg.language)?;

        self.enter(sm, PipelineState::BuildingTimeline)?;
        let images = req
            .images
            .par_iter()
            .enumerate()
            .map(|(i, input)| acquire_image(store, &format!("image_{i}"), input))
            .collect::<PipelineResult<Vec<_>>>()?;
        let timeline = build_timeline(
            store,
            &images,
            &cfg.timeline_opts(req.overlay_texts.clone()),
            narration.duration_sec,
        )?;

        self.enter(sm, PipelineState::Compositing)?;
        let project = self.assemble_project(req, timeline, narration)?;
        let visual = Compositor::new(store, cfg.compose_opts())
            .compose(&project.layers, narration.duration_sec)?;
        let d_final = visual.final_duration();
        project.effects.validate_range(d_final)?;

        self.enter(sm, PipelineState::Mixing)?;
        let mut bed = mix_bed(store, &project.audio, d_final)?;
        let mut mix_passes = 1u32;

        self.enter(sm, PipelineState::ApplyingEffects)?;
        let time_map = project.effects.time_map(d_final)?;
        if !time_map.is_identity() {
            let retimed = retime_audio(store, &bed, &time_map)?;
            // Second mixing pass: the bed is held to the post-speed duration before export.
            // When retiming already landed on the exact sample count the bed passes through.
            self.enter(sm, PipelineState::Mixing)?;
            bed = reconcile_duration(store, &retimed, time_map.output_duration())?;
            mix_passes += 1;
            tracing::info!(
                from = d_final,
                to = time_map.output_duration(),
                adjusted = bed.handle != retimed.handle,
                "audio bed reconciled after speed change"
            );
        }

        self.enter(sm, PipelineState::Rendering)?;
        let mut result = export(
            store,
            &visual,
            &time_map,
            &bed,
            &project.effects,
            project.fps,
            sink,
        )?;
        result.mix_passes = mix_passes;
        Ok(result)
    }

    fn extract(&self, req: &RenderRequest) -> PipelineResult<ExtractedText> {
        let max_chars = req.config.max_chars;
        let from_document = match &req.document {
            Some(doc) => self.extract_document(doc, max_chars),
            None => Err(PipelineError::extraction("no document supplied")),
        };
        let err = match from_document {
            Ok(text) if !text.is_blank() => return Ok(text),
            Ok(_) => PipelineError::extraction("document contains no text"),
            Err(e @ PipelineError::Extraction(_)) => e,
            Err(e) => return Err(e),
        };
        match req.fallback_text.as_deref() {
            Some(fallback) if !fallback.trim().is_empty() => {
                tracing::warn!(error = %err, "extraction failed, using fallback text");
                Ok(ExtractedText::from_fallback(fallback, max_chars))
            }
            _ => Err(PipelineError::extraction(format!("no usable input text: {err}"))),
        }
    }

    fn extract_document(&self, doc: &Document, max_chars: usize) -> PipelineResult<ExtractedText> {
        let source = self
            .text_sources
            .iter()
            .find(|s| s.supports(&doc.media_type))
            .ok_or_else(|| {
                PipelineError::extraction(format!(
                    "no text source for media type {:?}",
                    doc.media_type
                ))
            })?;
        crate::extract::text::extract_text(doc, source.as_ref(), max_chars)
    }

    fn assemble_project(
        &self,
        req: &RenderRequest,
        timeline: VisualTimeline,
        narration: AudioAsset,
    ) -> PipelineResult<Project> {
        let cfg = &req.config;
        let store = self.store.as_ref();

        let background = match &req.background {
            Some(input) => Background::Image(acquire_image(store, "background", input)?),
            None => Background::Color(cfg.background_color),
        };
        let watermark = match &req.watermark {
            Some(input) => Some(Watermark {
                image: acquire_image(store, "watermark", input)?,
                position: cfg.watermark_position,
                opacity: cfg.watermark_opacity,
            }),
            None => None,
        };
        let layers = LayerStack::new(timeline)
            .with_background(background)
            .with_watermark(watermark);

        let music = match &req.music {
            Some(input) => Some(MusicTrack {
                asset: acquire_audio(store, "music", input)?,
                volume: cfg.music_volume,
            }),
            None => None,
        };
        let mut audio = AudioBed::new(narration).with_music(music);
        for (i, fx) in req.effects.iter().enumerate() {
            audio = audio.with_effect(EffectCue {
                asset: acquire_audio(store, &format!("effect_{i}"), &fx.audio)?,
                offset: fx.offset,
                volume: cfg.effects_volume,
            });
        }

        Ok(Project {
            layers,
            audio,
            effects: cfg.post_effects(),
            canvas: cfg.canvas,
            fps: cfg.fps,
            transition_secs: cfg.transition_secs,
            freeze_last_frame: cfg.freeze_last_frame,
        })
    }
}

/// Request checks that need no stage output, run before any collaborator is called.
fn validate_inputs(req: &RenderRequest) -> PipelineResult<()> {
    if req.images.is_empty() {
        return Err(PipelineError::config("at least one image is required"));
    }
    for (i, fx) in req.effects.iter().enumerate() {
        if !fx.offset.is_finite() || fx.offset < 0.0 {
            return Err(PipelineError::config(format!(
                "effect {i} offset must be finite and >= 0 (got {})",
                fx.offset
            )));
        }
    }
    Ok(())
}

fn acquire_image(
    store: &AssetStore,
    label: &str,
    input: &ImageInput,
) -> PipelineResult<ImageAsset> {
    let img = match input {
        ImageInput::Encoded(bytes) => decode_image(bytes)?,
        ImageInput::Decoded(img) => img.clone(),
    };
    ImageAsset::acquire(store, label, img)
}

fn acquire_audio(
    store: &AssetStore,
    label: &str,
    input: &AudioInput,
) -> PipelineResult<AudioAsset> {
    let pcm = match input {
        AudioInput::Decoded(pcm) => pcm.clone(),
        AudioInput::Encoded { bytes, extension } => {
            let file = store.acquire(
                label,
                AssetPayload::Bytes {
                    bytes: bytes.clone(),
                    extension: extension.clone(),
                },
            )?;
            let path = store
                .path(file)
                .ok_or_else(|| PipelineError::storage(format!("{label} upload has no file")))?;
            media::decode_audio_f32_stereo(&path, media::MIX_SAMPLE_RATE).map_err(|e| {
                PipelineError::config(format!("undecodable {label} upload: {e:#}"))
            })?
        }
    };
    if pcm.channels == 0 || pcm.sample_rate == 0 || pcm.frames() == 0 {
        return Err(PipelineError::config(format!("{label} audio is empty")));
    }
    AudioAsset::acquire(store, label, pcm)
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/orchestrator.rs"]
mod tests;
