use crate::{
    assets::store::{AssetHandle, ImageAsset},
    effects::transitions::Transition,
    foundation::core::DURATION_EPSILON,
    foundation::error::{PipelineError, PipelineResult},
};

/// One timed placement of an image in the primary sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineSlot {
    pub source: ImageAsset,
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds, always > 0.
    pub duration: f64,
    pub transition: Transition,
    pub overlay_text: Option<String>,
    /// Rendered caption band for `overlay_text`, stacked as its own layer.
    pub overlay: Option<ImageAsset>,
}

impl TimelineSlot {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end()
    }
}

/// Always-visible image under the sequential slots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PersistentBackground {
    pub source: ImageAsset,
    pub duration: f64,
}

/// Ordered, validated sequence of slots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisualTimeline {
    slots: Vec<TimelineSlot>,
    persistent: Option<PersistentBackground>,
}

impl VisualTimeline {
    /// Validate and wrap `slots`. Slots must have positive durations, be ordered by `start` and
    /// not overlap.
    pub fn new(
        slots: Vec<TimelineSlot>,
        persistent: Option<PersistentBackground>,
    ) -> PipelineResult<Self> {
        let mut prev_end = 0.0f64;
        for (i, slot) in slots.iter().enumerate() {
            if !slot.duration.is_finite() || slot.duration <= 0.0 {
                return Err(PipelineError::config(format!(
                    "slot {i} duration must be finite and > 0"
                )));
            }
            if !slot.start.is_finite() || slot.start + DURATION_EPSILON < prev_end {
                return Err(PipelineError::config(format!(
                    "slot {i} starts at {} before the previous slot ends at {prev_end}",
                    slot.start
                )));
            }
            prev_end = slot.end();
        }
        if let Some(bg) = &persistent
            && (!bg.duration.is_finite() || bg.duration <= 0.0)
        {
            return Err(PipelineError::config(
                "persistent background duration must be finite and > 0",
            ));
        }
        Ok(Self { slots, persistent })
    }

    pub fn slots(&self) -> &[TimelineSlot] {
        &self.slots
    }

    pub fn persistent(&self) -> Option<&PersistentBackground> {
        self.persistent.as_ref()
    }

    /// Sum of slot durations.
    pub fn sequential_duration(&self) -> f64 {
        self.slots.iter().map(|s| s.duration).sum()
    }

    /// Extent of the timeline: the sequential run or the persistent background, whichever is
    /// longer.
    pub fn duration(&self) -> f64 {
        let seq = self.slots.last().map(TimelineSlot::end).unwrap_or(0.0);
        let bg = self.persistent.map(|b| b.duration).unwrap_or(0.0);
        seq.max(bg)
    }

    /// Index of the slot visible at `t`.
    pub fn slot_index_at(&self, t: f64) -> Option<usize> {
        let idx = self.slots.partition_point(|s| s.end() <= t);
        self.slots.get(idx).filter(|s| s.contains(t)).map(|_| idx)
    }

    /// Every asset handle the timeline references.
    pub fn handles(&self) -> Vec<AssetHandle> {
        let mut out = Vec::with_capacity(self.slots.len() * 2 + 1);
        if let Some(bg) = &self.persistent {
            out.push(bg.source.handle);
        }
        for slot in &self.slots {
            out.push(slot.source.handle);
            if let Some(o) = &slot.overlay {
                out.push(o.handle);
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/model.rs"]
mod tests;
