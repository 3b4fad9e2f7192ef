use crate::{
    assets::media::{self, PreparedAudio},
    assets::store::{AssetHandle, AssetStore, AudioAsset},
    foundation::error::{PipelineError, PipelineResult},
};

/// Length of the fade applied to looped music at the end of the bed.
pub const MUSIC_FADE_OUT_SECS: f64 = 0.05;

/// Fit policy of a track against the bed duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    /// Padded with silence, truncated when longer.
    Narration,
    /// Looped from the start, truncated when longer.
    Music,
    /// Played once at its offset, truncated at the bed end.
    Effect,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MusicTrack {
    pub asset: AudioAsset,
    pub volume: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectCue {
    pub asset: AudioAsset,
    /// Start time in seconds on the bed.
    pub offset: f64,
    pub volume: f32,
}

/// Tracks mixed into the final audio.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBed {
    pub narration: AudioAsset,
    pub music: Option<MusicTrack>,
    pub effects: Vec<EffectCue>,
}

impl AudioBed {
    pub fn new(narration: AudioAsset) -> Self {
        Self {
            narration,
            music: None,
            effects: Vec::new(),
        }
    }

    pub fn with_music(mut self, music: Option<MusicTrack>) -> Self {
        self.music = music;
        self
    }

    pub fn with_effect(mut self, cue: EffectCue) -> Self {
        self.effects.push(cue);
        self
    }

    pub fn handles(&self) -> Vec<AssetHandle> {
        let mut out = vec![self.narration.handle];
        out.extend(self.music.iter().map(|m| m.asset.handle));
        out.extend(self.effects.iter().map(|e| e.asset.handle));
        out
    }
}

/// One track placed on the bed.
#[derive(Clone, Debug)]
struct TrackSegment {
    kind: TrackKind,
    start_sec: f64,
    volume: f32,
    source: PreparedAudio,
}

/// Mix `bed` into one stereo track of exactly `d_final` seconds at [`media::MIX_SAMPLE_RATE`].
///
/// A negative effect offset is a [`PipelineError::Config`]; cues starting at or after `d_final`
/// are dropped with a warning.
#[tracing::instrument(level = "info", skip(store, bed), fields(effects = bed.effects.len()))]
pub fn mix_bed(store: &AssetStore, bed: &AudioBed, d_final: f64) -> PipelineResult<AudioAsset> {
    if !d_final.is_finite() || d_final <= 0.0 {
        return Err(PipelineError::composition(format!(
            "audio bed duration must be finite and > 0 (got {d_final})"
        )));
    }

    let mut segments = vec![TrackSegment {
        kind: TrackKind::Narration,
        start_sec: 0.0,
        volume: 1.0,
        source: load(store, &bed.narration, "narration")?,
    }];
    if let Some(music) = &bed.music {
        segments.push(TrackSegment {
            kind: TrackKind::Music,
            start_sec: 0.0,
            volume: music.volume,
            source: load(store, &music.asset, "music")?,
        });
    }
    for (i, cue) in bed.effects.iter().enumerate() {
        if !cue.offset.is_finite() || cue.offset < 0.0 {
            return Err(PipelineError::config(format!(
                "effect cue {i} offset must be finite and >= 0 (got {})",
                cue.offset
            )));
        }
        if cue.offset >= d_final {
            tracing::warn!(
                cue = i,
                offset = cue.offset,
                d_final,
                "effect cue starts after the end, dropped"
            );
            continue;
        }
        segments.push(TrackSegment {
            kind: TrackKind::Effect,
            start_sec: cue.offset,
            volume: cue.volume,
            source: load(store, &cue.asset, "effect")?,
        });
    }

    let samples = mix_segments(&segments, d_final);
    let pcm = PreparedAudio::from_interleaved(media::MIX_SAMPLE_RATE, media::MIX_CHANNELS, samples);
    let out = AudioAsset::acquire(store, "audio_bed", pcm)?;
    tracing::info!(
        duration_sec = out.duration_sec,
        tracks = segments.len(),
        "audio bed mixed"
    );
    Ok(out)
}

/// Pad with silence or truncate an already-mixed track to `duration` seconds.
///
/// A track that already holds exactly the sample frames of `duration` is returned as is.
/// Otherwise a new asset is acquired and `asset` stays live.
#[tracing::instrument(level = "info", skip(store, asset))]
pub fn reconcile_duration(
    store: &AssetStore,
    asset: &AudioAsset,
    duration: f64,
) -> PipelineResult<AudioAsset> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(PipelineError::composition(format!(
            "reconciled duration must be finite and > 0 (got {duration})"
        )));
    }
    let src = load(store, asset, "bed")?;
    let ch = usize::from(src.channels.max(1));
    let frames = media::secs_to_sample_frames(duration, src.sample_rate) as usize;
    let have_frames = src.interleaved_f32.len() / ch;
    if have_frames == frames {
        tracing::debug!(frames, "bed already matches the target duration");
        return Ok(*asset);
    }
    tracing::debug!(from = have_frames, to = frames, "bed length adjusted");
    let mut samples = Vec::with_capacity(frames * ch);
    let have = src.interleaved_f32.len().min(frames * ch);
    samples.extend_from_slice(&src.interleaved_f32[..have]);
    samples.resize(frames * ch, 0.0);
    let pcm = PreparedAudio::from_interleaved(src.sample_rate, src.channels, samples);
    AudioAsset::acquire(store, "audio_bed_reconciled", pcm)
}

fn load(store: &AssetStore, asset: &AudioAsset, what: &str) -> PipelineResult<PreparedAudio> {
    let pcm = store.audio(asset.handle).ok_or_else(|| {
        PipelineError::composition(format!("{what} track {} is not live", asset.handle))
    })?;
    if pcm.channels == 0 || pcm.sample_rate == 0 {
        return Err(PipelineError::composition(format!(
            "{what} track {} has no channels or sample rate",
            asset.handle
        )));
    }
    Ok(pcm)
}

fn mix_segments(segments: &[TrackSegment], d_final: f64) -> Vec<f32> {
    let sample_rate = media::MIX_SAMPLE_RATE;
    let channels = usize::from(media::MIX_CHANNELS);
    let frames = media::secs_to_sample_frames(d_final, sample_rate) as usize;
    let mut out = vec![0.0f32; frames * channels];
    let sr = f64::from(sample_rate);

    for seg in segments {
        let src_dur = seg.source.duration_sec();
        if src_dur <= 0.0 {
            continue;
        }
        let first = media::secs_to_sample_frames(seg.start_sec, sample_rate) as usize;
        for dst in first..frames {
            let t = dst as f64 / sr;
            let rel = t - seg.start_sec;
            let src_t = match seg.kind {
                TrackKind::Music => rel.rem_euclid(src_dur),
                TrackKind::Narration | TrackKind::Effect => rel,
            };
            let Some((l, r)) = seg.source.stereo_at(src_t) else {
                if seg.kind == TrackKind::Music {
                    continue;
                }
                break;
            };
            let mut gain = seg.volume;
            if seg.kind == TrackKind::Music {
                let rem = d_final - t;
                gain *= (rem / MUSIC_FADE_OUT_SECS).clamp(0.0, 1.0) as f32;
            }
            let i = dst * channels;
            out[i] += l * gain;
            out[i + 1] += r * gain;
        }
    }

    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;
