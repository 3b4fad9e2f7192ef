use std::{path::Path, sync::Arc};

use anyhow::Context as _;

/// Sample rate every track is mixed at.
pub const MIX_SAMPLE_RATE: u32 = 48_000;
/// Channel count of the mixed audio bed.
pub const MIX_CHANNELS: u16 = 2;

#[derive(Clone, Debug)]
/// Decoded audio clip stored as interleaved `f32` PCM.
pub struct PreparedAudio {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Interleaved PCM samples.
    pub interleaved_f32: Arc<Vec<f32>>,
}

impl PreparedAudio {
    pub fn from_interleaved(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            interleaved_f32: Arc::new(samples),
        }
    }

    pub fn silence(sample_rate: u32, channels: u16, duration_sec: f64) -> Self {
        let frames = secs_to_sample_frames(duration_sec, sample_rate);
        Self::from_interleaved(
            sample_rate,
            channels,
            vec![0.0; frames as usize * usize::from(channels)],
        )
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> u64 {
        if self.channels == 0 {
            return 0;
        }
        (self.interleaved_f32.len() / usize::from(self.channels)) as u64
    }

    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Linearly interpolated stereo sample at source time `t` (seconds), or `None` past the end.
    ///
    /// Mono sources are duplicated to both channels; extra channels beyond two are ignored.
    pub fn stereo_at(&self, t: f64) -> Option<(f32, f32)> {
        let frames = self.frames() as usize;
        if frames == 0 || self.sample_rate == 0 {
            return None;
        }
        let pos = t * f64::from(self.sample_rate);
        if !pos.is_finite() || pos < 0.0 {
            return None;
        }
        let f0 = pos.floor() as usize;
        if f0 >= frames {
            return None;
        }
        let f1 = (f0 + 1).min(frames - 1);
        let frac = (pos - f0 as f64) as f32;
        let ch = usize::from(self.channels);
        let src = self.interleaved_f32.as_slice();
        let lerp = |a: f32, b: f32| a + (b - a) * frac;
        if ch == 1 {
            let v = lerp(src[f0], src[f1]);
            Some((v, v))
        } else {
            let (i0, i1) = (f0 * ch, f1 * ch);
            Some((lerp(src[i0], src[i1]), lerp(src[i0 + 1], src[i1 + 1])))
        }
    }
}

/// Sample frames covering `secs` at `sample_rate`, rounded to the nearest frame.
pub fn secs_to_sample_frames(secs: f64, sample_rate: u32) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * f64::from(sample_rate)).round() as u64
}

/// Decode any ffmpeg-readable audio file to interleaved stereo `f32` PCM at `sample_rate`.
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> anyhow::Result<PreparedAudio> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .context("failed to run ffmpeg for audio decode")?;

    if !out.status.success() {
        anyhow::bail!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }

    Ok(PreparedAudio::from_interleaved(
        sample_rate,
        MIX_CHANNELS,
        f32le_from_bytes(&out.stdout)?,
    ))
}

pub fn f32le_from_bytes(bytes: &[u8]) -> anyhow::Result<Vec<f32>> {
    if !bytes.len().is_multiple_of(4) {
        anyhow::bail!("decoded audio byte length is not aligned to f32 samples");
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

pub fn f32le_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::<u8>::with_capacity(samples.len() * 4);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
#[path = "../../tests/unit/assets/media.rs"]
mod tests;
