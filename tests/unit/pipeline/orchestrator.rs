use super::*;
use crate::assets::store::ScratchSpace;
use crate::encode::sink::InMemorySink;
use crate::extract::text::MediaType;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::FailureReason;

struct FixedTts(f64);

impl SpeechSynthesizer for FixedTts {
    fn synthesize(
        &self,
        _text: &str,
        _language: &str,
        _scratch: &ScratchSpace<'_>,
    ) -> anyhow::Result<PreparedAudio> {
        Ok(PreparedAudio::silence(48_000, 1, self.0))
    }
}

#[derive(Default)]
struct CountingTts {
    calls: std::sync::atomic::AtomicUsize,
}

impl SpeechSynthesizer for CountingTts {
    fn synthesize(
        &self,
        _text: &str,
        _language: &str,
        _scratch: &ScratchSpace<'_>,
    ) -> anyhow::Result<PreparedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PreparedAudio::silence(48_000, 1, 1.0))
    }
}

struct BrokenPdf;

impl TextSource for BrokenPdf {
    fn supports(&self, media_type: &MediaType) -> bool {
        *media_type == MediaType::Pdf
    }

    fn extract_units(&self, _bytes: &[u8]) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("corrupt xref table")
    }
}

fn pipeline(secs: f64) -> Pipeline {
    let store = Arc::new(AssetStore::in_temp_dir().unwrap());
    Pipeline::new(store, Arc::new(FixedTts(secs))).with_text_source(BrokenPdf)
}

fn small_config() -> RenderConfig {
    RenderConfig {
        canvas: Canvas {
            width: 8,
            height: 8,
        },
        fps: Fps::new(2, 1).unwrap(),
        ..RenderConfig::default()
    }
}

fn request() -> RenderRequest {
    RenderRequest {
        document: Some(Document::new("hello there", MediaType::PlainText)),
        images: vec![ImageInput::Decoded(
            PreparedImage::solid(8, 8, [50, 60, 70, 255]).unwrap(),
        )],
        config: small_config(),
        ..RenderRequest::default()
    }
}

#[test]
fn unparseable_document_falls_back_to_supplied_text() {
    let p = pipeline(1.0);
    let req = RenderRequest {
        document: Some(Document::new(vec![0u8, 1, 2], MediaType::Pdf)),
        fallback_text: Some("fallback narration".to_string()),
        ..request()
    };
    let text = p.extract(&req).unwrap();
    assert_eq!(text.as_str(), "fallback narration");
}

#[test]
fn no_document_and_no_fallback_is_no_usable_text() {
    let p = pipeline(1.0);
    let req = RenderRequest {
        document: None,
        ..request()
    };
    let err = p.extract(&req).unwrap_err();
    assert_eq!(err.reason(), FailureReason::NoUsableText);
}

#[test]
fn blank_document_uses_fallback() {
    let p = pipeline(1.0);
    let req = RenderRequest {
        document: Some(Document::new("   \n", MediaType::Markdown)),
        fallback_text: Some("x".repeat(5000)),
        ..request()
    };
    assert_eq!(p.extract(&req).unwrap().char_len(), 3000);
}

#[test]
fn cancelled_pipeline_stops_before_the_first_stage() {
    let p = pipeline(1.0);
    let handle = p.cancel_handle();
    handle.cancel();
    assert!(p.is_cancelled());
    let mut sink = InMemorySink::new();
    let result = p.render(&request(), &mut sink);
    match &result.status {
        crate::encode::export::RenderStatus::Failed { reason, .. } => {
            assert_eq!(*reason, FailureReason::Cancelled)
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(result.states, vec![PipelineState::Idle, PipelineState::Failed]);
    assert!(!sink.began());
    assert_eq!(p.store().live_count(), 0);
}

#[test]
fn run_reports_states_and_single_mix_pass() {
    let p = pipeline(2.0);
    let mut sink = InMemorySink::new();
    let result = p.run(&request(), &mut sink).unwrap();
    assert_eq!(result.duration_sec, 2.0);
    assert_eq!(result.mix_passes, 1);
    assert_eq!(result.artifact.frames, 4);
    assert_eq!(result.states.first(), Some(&PipelineState::Idle));
    assert_eq!(result.states.last(), Some(&PipelineState::Done));
    assert_eq!(p.store().live_count(), 0);
}

#[test]
fn empty_audio_upload_is_rejected() {
    let store = AssetStore::in_temp_dir().unwrap();
    let err = acquire_audio(
        &store,
        "music",
        &AudioInput::Decoded(PreparedAudio::from_interleaved(48_000, 2, vec![])),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn missing_images_fail_before_narration_is_synthesized() {
    let tts = Arc::new(CountingTts::default());
    let p = Pipeline::new(Arc::new(AssetStore::in_temp_dir().unwrap()), tts.clone());
    let req = RenderRequest {
        images: Vec::new(),
        ..request()
    };
    let result = p.render(&req, &mut InMemorySink::new());
    match &result.status {
        crate::encode::export::RenderStatus::Failed { reason, .. } => {
            assert_eq!(*reason, FailureReason::InvalidConfig)
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(result.states, vec![PipelineState::Idle, PipelineState::Failed]);
    assert_eq!(tts.calls.load(Ordering::SeqCst), 0);
    assert_eq!(p.store().stats().acquired, 0);
}

#[test]
fn negative_effect_offset_fails_before_narration_is_synthesized() {
    let tts = Arc::new(CountingTts::default());
    let p = Pipeline::new(Arc::new(AssetStore::in_temp_dir().unwrap()), tts.clone());
    let req = RenderRequest {
        effects: vec![EffectInput {
            audio: AudioInput::Decoded(PreparedAudio::silence(48_000, 2, 0.2)),
            offset: -1.0,
        }],
        ..request()
    };
    let err = p.run(&req, &mut InMemorySink::new()).unwrap_err();
    assert!(matches!(err, PipelineError::Config(ref m) if m.contains("offset")));
    assert_eq!(tts.calls.load(Ordering::SeqCst), 0);
}
