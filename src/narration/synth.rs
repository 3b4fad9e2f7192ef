use std::path::Path;
use std::process::Command;

use anyhow::Context as _;

use crate::{
    assets::media::{self, MIX_SAMPLE_RATE, PreparedAudio},
    assets::store::{AssetStore, AudioAsset, ScratchSpace},
    extract::text::ExtractedText,
    foundation::core::DURATION_EPSILON,
    foundation::error::{PipelineError, PipelineResult},
};

/// Pluggable text-to-speech collaborator.
///
/// Any retry policy belongs to the implementation; the pipeline calls it exactly once.
/// Intermediate files must come from `scratch`, which is released when the call returns.
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` in `language` (BCP-47-ish code such as `"en"`).
    fn synthesize(
        &self,
        text: &str,
        language: &str,
        scratch: &ScratchSpace<'_>,
    ) -> anyhow::Result<PreparedAudio>;
}

/// Turn the narration script into a store-owned audio asset.
///
/// Empty text and zero-length audio are both [`PipelineError::Synthesis`].
#[tracing::instrument(skip(store, tts, text), fields(chars = text.char_len()))]
pub fn synthesize_narration(
    store: &AssetStore,
    tts: &dyn SpeechSynthesizer,
    text: &ExtractedText,
    language: &str,
) -> PipelineResult<AudioAsset> {
    if text.is_blank() {
        return Err(PipelineError::synthesis("narration text is empty"));
    }
    let pcm = {
        let scratch = ScratchSpace::new(store, "tts");
        tts.synthesize(text.as_str(), language, &scratch)
            .map_err(|e| PipelineError::synthesis(format!("text-to-speech failed: {e:#}")))?
    };
    if pcm.channels == 0 || pcm.sample_rate == 0 {
        return Err(PipelineError::synthesis(
            "text-to-speech returned audio without channels or sample rate",
        ));
    }
    let duration = pcm.duration_sec();
    if duration <= DURATION_EPSILON {
        return Err(PipelineError::synthesis(
            "text-to-speech returned zero-duration narration",
        ));
    }
    let asset = AudioAsset::acquire(store, "narration", pcm)?;
    tracing::info!(duration_sec = asset.duration_sec, "narration synthesized");
    Ok(asset)
}

/// Runs an external TTS program described by a command template.
///
/// The template is split on whitespace; the placeholders `{text_file}`, `{out}` and `{lang}` are
/// substituted in every argument. The program must write an ffmpeg-readable audio file to
/// `{out}`. Both files are store-owned scratch files.
#[derive(Clone, Debug)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
}

impl CommandSynthesizer {
    pub fn from_template(template: &str) -> PipelineResult<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| PipelineError::config("tts command template is empty"))?;
        let args: Vec<String> = parts.collect();
        if !args.iter().any(|a| a.contains("{out}")) {
            return Err(PipelineError::config(
                "tts command template must contain an {out} placeholder",
            ));
        }
        Ok(Self { program, args })
    }

    fn render_args(&self, text_file: &Path, out: &Path, language: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                a.replace("{text_file}", &text_file.to_string_lossy())
                    .replace("{out}", &out.to_string_lossy())
                    .replace("{lang}", language)
            })
            .collect()
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn synthesize(
        &self,
        text: &str,
        language: &str,
        scratch: &ScratchSpace<'_>,
    ) -> anyhow::Result<PreparedAudio> {
        let text_file = scratch.file("txt")?;
        let out_file = scratch.file("wav")?;
        std::fs::write(&text_file, text)
            .with_context(|| format!("write narration text to '{}'", text_file.display()))?;

        let args = self.render_args(&text_file, &out_file, language);
        tracing::debug!(program = %self.program, ?args, "running tts command");
        let out = Command::new(&self.program)
            .args(&args)
            .output()
            .with_context(|| format!("failed to spawn tts program '{}'", self.program))?;
        if !out.status.success() {
            anyhow::bail!(
                "tts program exited with status {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        media::decode_audio_f32_stereo(&out_file, MIX_SAMPLE_RATE)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/narration/synth.rs"]
mod tests;
