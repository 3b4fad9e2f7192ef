use rayon::prelude::*;

use crate::{
    assets::store::{AssetStore, ImageAsset},
    effects::transitions::Transition,
    foundation::core::{Canvas, DURATION_EPSILON, ensure_finite_positive},
    foundation::error::{PipelineError, PipelineResult},
    timeline::caption::render_caption,
    timeline::model::{PersistentBackground, TimelineSlot, VisualTimeline},
    timeline::preprocess::{PreprocessOpts, preprocess_image},
};

pub const DEFAULT_SLOT_SECS: f64 = 5.0;

/// Slot layout directives for [`build_timeline`].
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineOpts {
    /// Duration of slots without an explicit override.
    pub slot_duration: f64,
    /// Per-slot duration overrides, by image index.
    pub slot_durations: Vec<f64>,
    /// Transition of slots without an explicit selection.
    pub transition: Transition,
    /// Per-slot transition selections, by image index.
    pub slot_transitions: Vec<Transition>,
    /// Caption text, by image index. Slots past the end carry no caption.
    pub overlay_texts: Vec<String>,
    pub preprocess: PreprocessOpts,
    /// Also show the first image beneath the whole narration.
    pub persistent_background: bool,
    pub canvas: Canvas,
}

impl Default for TimelineOpts {
    fn default() -> Self {
        Self {
            slot_duration: DEFAULT_SLOT_SECS,
            slot_durations: Vec::new(),
            transition: Transition::None,
            slot_transitions: Vec::new(),
            overlay_texts: Vec::new(),
            preprocess: PreprocessOpts::default(),
            persistent_background: false,
            canvas: Canvas::default(),
        }
    }
}

impl TimelineOpts {
    fn duration_for(&self, index: usize) -> f64 {
        self.slot_durations
            .get(index)
            .copied()
            .unwrap_or(self.slot_duration)
    }

    fn transition_for(&self, index: usize) -> Transition {
        self.slot_transitions
            .get(index)
            .copied()
            .unwrap_or(self.transition)
    }
}

struct PreparedSlot {
    source: ImageAsset,
    overlay: Option<ImageAsset>,
}

/// Lay `images` out as back-to-back slots.
///
/// Preprocessing and caption rendering run in parallel per image; every derived image is a new
/// store asset and the inputs are left untouched. `narration_duration` sizes the persistent
/// background when that mode is on.
#[tracing::instrument(level = "info", skip_all, fields(images = images.len()))]
pub fn build_timeline(
    store: &AssetStore,
    images: &[ImageAsset],
    opts: &TimelineOpts,
    narration_duration: f64,
) -> PipelineResult<VisualTimeline> {
    if images.is_empty() {
        return Err(PipelineError::config("at least one image is required"));
    }
    ensure_finite_positive("slot_duration", opts.slot_duration)?;
    for (i, d) in opts.slot_durations.iter().enumerate() {
        ensure_finite_positive(&format!("slot_durations[{i}]"), *d)?;
    }

    let prepared = images
        .par_iter()
        .enumerate()
        .map(|(i, img)| prepare_slot(store, i, img, opts))
        .collect::<PipelineResult<Vec<_>>>()?;

    let mut slots = Vec::with_capacity(prepared.len());
    let mut cursor = 0.0f64;
    for (i, p) in prepared.into_iter().enumerate() {
        let duration = opts.duration_for(i);
        slots.push(TimelineSlot {
            source: p.source,
            start: cursor,
            duration,
            transition: opts.transition_for(i),
            overlay_text: opts.overlay_texts.get(i).cloned(),
            overlay: p.overlay,
        });
        cursor += duration;
    }

    let persistent = if opts.persistent_background {
        if narration_duration <= DURATION_EPSILON || !narration_duration.is_finite() {
            return Err(PipelineError::config(
                "persistent background needs a positive narration duration",
            ));
        }
        Some(PersistentBackground {
            source: slots[0].source,
            duration: narration_duration,
        })
    } else {
        None
    };

    let timeline = VisualTimeline::new(slots, persistent)?;
    tracing::info!(
        slots = timeline.slots().len(),
        duration = timeline.duration(),
        "timeline built"
    );
    Ok(timeline)
}

fn prepare_slot(
    store: &AssetStore,
    index: usize,
    input: &ImageAsset,
    opts: &TimelineOpts,
) -> PipelineResult<PreparedSlot> {
    let source = if opts.preprocess.is_identity() {
        *input
    } else {
        let img = store.image(input.handle).ok_or_else(|| {
            PipelineError::composition(format!("image {} is not live", input.handle))
        })?;
        match preprocess_image(&img, index, &opts.preprocess)? {
            Some(processed) => {
                ImageAsset::acquire(store, &format!("slot_{index}_processed"), processed)?
            }
            None => *input,
        }
    };

    let overlay = match opts.overlay_texts.get(index) {
        Some(text) if !text.trim().is_empty() => {
            let band = render_caption(text, opts.canvas)?;
            Some(ImageAsset::acquire(
                store,
                &format!("slot_{index}_caption"),
                band,
            )?)
        }
        _ => None,
    };

    Ok(PreparedSlot { source, overlay })
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/builder.rs"]
mod tests;
