use crate::{
    assets::media::{self, PreparedAudio},
    assets::store::{AssetStore, AudioAsset},
    foundation::core::{DURATION_EPSILON, FrameIndex},
    foundation::error::{PipelineError, PipelineResult},
    foundation::math::{Rng64, derive_seed},
    render::frame::FrameRGBA,
};

/// Share of frames hit by the glitch effect.
const GLITCH_FRAME_RATE: f64 = 0.25;
/// Maximum per-pixel luminance jitter of the noise effect.
const NOISE_AMPLITUDE: i32 = 12;

/// Playback speed override for `[start, end)` of the composed timeline.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpeedSegment {
    pub start: f64,
    pub end: f64,
    pub speed: f64,
}

/// Global post-effect directives.
#[derive(Clone, Debug, PartialEq)]
pub struct PostEffects {
    /// Multiplies every segment speed; 1 plays at natural speed.
    pub global_speed: f64,
    pub segments: Vec<SpeedSegment>,
    pub glitch: bool,
    pub noise: bool,
    pub seed: u64,
}

impl Default for PostEffects {
    fn default() -> Self {
        Self {
            global_speed: 1.0,
            segments: Vec::new(),
            glitch: false,
            noise: false,
            seed: 0,
        }
    }
}

impl PostEffects {
    /// Checks that need no duration: positive speeds and well-formed, disjoint segments.
    pub fn validate_structure(&self) -> PipelineResult<()> {
        if !self.global_speed.is_finite() || self.global_speed <= 0.0 {
            return Err(PipelineError::config(format!(
                "global_speed must be finite and > 0 (got {})",
                self.global_speed
            )));
        }
        for (i, s) in self.segments.iter().enumerate() {
            if !s.start.is_finite() || !s.end.is_finite() || s.start < 0.0 {
                return Err(PipelineError::speed_segments(format!(
                    "speed segment {i} has an invalid start {} or end {}",
                    s.start, s.end
                )));
            }
            if s.start >= s.end {
                return Err(PipelineError::speed_segments(format!(
                    "speed segment {i} is empty: start {} >= end {}",
                    s.start, s.end
                )));
            }
            if !s.speed.is_finite() || s.speed <= 0.0 {
                return Err(PipelineError::speed_segments(format!(
                    "speed segment {i} speed must be finite and > 0 (got {})",
                    s.speed
                )));
            }
        }
        let sorted = self.sorted_segments();
        for pair in sorted.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(PipelineError::speed_segments(format!(
                    "speed segments [{}, {}) and [{}, {}) overlap",
                    pair[0].start, pair[0].end, pair[1].start, pair[1].end
                )));
            }
        }
        Ok(())
    }

    /// Every segment must end within `duration`.
    pub fn validate_range(&self, duration: f64) -> PipelineResult<()> {
        for (i, s) in self.segments.iter().enumerate() {
            if s.end > duration + DURATION_EPSILON {
                return Err(PipelineError::speed_segments(format!(
                    "speed segment {i} [{}, {}) extends past the composed duration {duration}",
                    s.start, s.end
                )));
            }
        }
        Ok(())
    }

    pub fn changes_duration(&self) -> bool {
        (self.global_speed - 1.0).abs() > f64::EPSILON
            || self
                .segments
                .iter()
                .any(|s| (s.speed - 1.0).abs() > f64::EPSILON)
    }

    pub fn has_frame_effects(&self) -> bool {
        self.glitch || self.noise
    }

    /// Validated output-to-source time mapping over a composed stream of `duration` seconds.
    pub fn time_map(&self, duration: f64) -> PipelineResult<TimeMap> {
        self.validate_structure()?;
        self.validate_range(duration)?;

        let mut pieces = Vec::with_capacity(self.segments.len() * 2 + 1);
        let mut cursor = 0.0f64;
        for s in self.sorted_segments() {
            if s.start > cursor {
                pieces.push(TimePiece::new(cursor, s.start, self.global_speed));
            }
            pieces.push(TimePiece::new(s.start, s.end.min(duration), s.speed * self.global_speed));
            cursor = s.end;
        }
        if cursor < duration {
            pieces.push(TimePiece::new(cursor, duration, self.global_speed));
        }
        pieces.retain(|p| p.src_end - p.src_start > 0.0);
        Ok(TimeMap::from_pieces(pieces))
    }

    fn sorted_segments(&self) -> Vec<SpeedSegment> {
        let mut sorted = self.segments.clone();
        sorted.sort_by(|a, b| a.start.total_cmp(&b.start));
        sorted
    }
}

/// A span of the source timeline played at `rate`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimePiece {
    pub src_start: f64,
    pub src_end: f64,
    pub rate: f64,
}

impl TimePiece {
    fn new(src_start: f64, src_end: f64, rate: f64) -> Self {
        Self {
            src_start,
            src_end,
            rate,
        }
    }

    pub fn output_len(&self) -> f64 {
        (self.src_end - self.src_start) / self.rate
    }
}

/// Piecewise-linear map from output time to composed (source) time.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeMap {
    pieces: Vec<TimePiece>,
    out_starts: Vec<f64>,
    output_duration: f64,
}

impl TimeMap {
    pub fn identity(duration: f64) -> Self {
        Self::from_pieces(vec![TimePiece::new(0.0, duration, 1.0)])
    }

    fn from_pieces(pieces: Vec<TimePiece>) -> Self {
        let mut out_starts = Vec::with_capacity(pieces.len());
        let mut acc = 0.0;
        for p in &pieces {
            out_starts.push(acc);
            acc += p.output_len();
        }
        Self {
            pieces,
            out_starts,
            output_duration: acc,
        }
    }

    pub fn pieces(&self) -> &[TimePiece] {
        &self.pieces
    }

    pub fn output_duration(&self) -> f64 {
        self.output_duration
    }

    pub fn source_duration(&self) -> f64 {
        self.pieces.last().map(|p| p.src_end).unwrap_or(0.0)
    }

    pub fn is_identity(&self) -> bool {
        self.pieces
            .iter()
            .all(|p| (p.rate - 1.0).abs() <= f64::EPSILON)
    }

    /// Source time shown at output time `t`. Clamped to the source range.
    pub fn out_to_src(&self, t: f64) -> f64 {
        if self.pieces.is_empty() {
            return 0.0;
        }
        let idx = self
            .out_starts
            .partition_point(|&s| s <= t)
            .saturating_sub(1);
        let p = &self.pieces[idx];
        let src = p.src_start + (t - self.out_starts[idx]).max(0.0) * p.rate;
        src.min(p.src_end)
    }
}

/// Resample `asset` through `map`. Pitch follows speed.
#[tracing::instrument(level = "info", skip(store, asset, map), fields(out = map.output_duration()))]
pub fn retime_audio(
    store: &AssetStore,
    asset: &AudioAsset,
    map: &TimeMap,
) -> PipelineResult<AudioAsset> {
    let src = store.audio(asset.handle).ok_or_else(|| {
        PipelineError::composition(format!("audio {} is not live", asset.handle))
    })?;
    let sr = src.sample_rate;
    if sr == 0 {
        return Err(PipelineError::composition("audio has no sample rate"));
    }
    let frames = media::secs_to_sample_frames(map.output_duration(), sr) as usize;
    let mut out = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f64 / f64::from(sr);
        let (l, r) = src.stereo_at(map.out_to_src(t)).unwrap_or((0.0, 0.0));
        out.push(l);
        out.push(r);
    }
    AudioAsset::acquire(
        store,
        "audio_retimed",
        PreparedAudio::from_interleaved(sr, 2, out),
    )
}

/// Apply the enabled per-frame effects in place. Output depends only on `(seed, index)`.
pub fn apply_frame_effects(frame: &mut FrameRGBA, effects: &PostEffects, index: FrameIndex) {
    if effects.glitch {
        let mut rng = Rng64::new(derive_seed(effects.seed, "glitch", index.0));
        if rng.next_f64_01() < GLITCH_FRAME_RATE {
            glitch_in_place(frame, &mut rng);
        }
    }
    if effects.noise {
        let mut rng = Rng64::new(derive_seed(effects.seed, "noise", index.0));
        noise_in_place(frame, &mut rng);
    }
}

fn glitch_in_place(frame: &mut FrameRGBA, rng: &mut Rng64) {
    let w = frame.width as usize;
    let h = frame.height as usize;
    if w < 2 || h == 0 {
        return;
    }
    let row_bytes = w * 4;

    let bands = rng.range_u32(1, 5);
    for _ in 0..bands {
        let band_h = rng.range_u32(1, (h as u32 / 8).max(2)) as usize;
        let y0 = rng.range_u32(0, h as u32) as usize;
        let shift = rng.range_u32(1, (w as u32 / 10).max(2)) as usize;
        for y in y0..(y0 + band_h).min(h) {
            let row = &mut frame.data[y * row_bytes..(y + 1) * row_bytes];
            row.rotate_right(shift * 4);
        }
    }

    // Red left, blue right.
    let split = rng.range_u32(1, (w as u32 / 50).max(2)) as usize;
    for y in 0..h {
        let row = &mut frame.data[y * row_bytes..(y + 1) * row_bytes];
        for x in 0..w - split {
            row[x * 4] = row[(x + split) * 4];
        }
        for x in (split..w).rev() {
            row[x * 4 + 2] = row[(x - split) * 4 + 2];
        }
        for px in row.chunks_exact_mut(4) {
            let a = px[3];
            px[0] = px[0].min(a);
            px[2] = px[2].min(a);
        }
    }
}

fn noise_in_place(frame: &mut FrameRGBA, rng: &mut Rng64) {
    for px in frame.data.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 {
            continue;
        }
        let j = rng.range_u32(0, (2 * NOISE_AMPLITUDE + 1) as u32) as i32 - NOISE_AMPLITUDE;
        for c in &mut px[..3] {
            *c = (i32::from(*c) + j).clamp(0, i32::from(a)) as u8;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/post.rs"]
mod tests;
