use std::collections::HashMap;

use rayon::prelude::*;

use crate::{
    assets::decode::{fit_to_canvas, resize_premul},
    assets::store::{AssetHandle, AssetStore, ImageAsset, PreparedImage},
    composition::layers::{Background, Layer, LayerStack, Watermark, WatermarkPosition},
    effects::transitions::{Transition, TransitionFrame, progress, transition_frame},
    foundation::core::{Canvas, DURATION_EPSILON},
    foundation::error::{PipelineError, PipelineResult},
    render::composite::{Target, blit_over, draw_frame_over},
    render::frame::FrameRGBA,
};

/// Largest watermark width as a share of the canvas width.
pub const WATERMARK_MAX_WIDTH_FRACTION: f64 = 0.2;
/// Watermark distance from the canvas edges as a share of the smaller canvas side.
pub const WATERMARK_MARGIN_FRACTION: f64 = 0.03;

/// Visual duration after the sync rule.
///
/// The composite is cut to the narration when it is longer and never stretched. When it is
/// shorter it ends early, unless `freeze_last_frame` holds the last frame until the narration
/// ends.
pub fn final_duration(visual: f64, audio: f64, freeze_last_frame: bool) -> f64 {
    if freeze_last_frame {
        audio
    } else {
        visual.min(audio)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComposeOpts {
    pub canvas: Canvas,
    /// Transition window in seconds, clamped per slot to half its duration.
    pub transition_secs: f64,
    pub freeze_last_frame: bool,
}

impl Default for ComposeOpts {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            transition_secs: 0.5,
            freeze_last_frame: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Placed {
    handle: AssetHandle,
    width: u32,
    height: u32,
    x: i64,
    y: i64,
}

#[derive(Clone, Copy, Debug)]
struct PrimarySlot {
    image: AssetHandle,
    start: f64,
    duration: f64,
    transition: Transition,
}

/// One paint step, in layer order.
#[derive(Clone, Debug)]
enum Paint {
    Fill([u8; 4]),
    Still {
        image: Placed,
        opacity: f32,
        until: Option<f64>,
    },
    Primary,
    Caption {
        slot: usize,
        image: Placed,
    },
}

/// A layer stack resolved against the canvas, ready to produce frames.
#[derive(Clone, Debug)]
pub struct ComposedVisual {
    canvas: Canvas,
    paints: Vec<Paint>,
    slots: Vec<PrimarySlot>,
    transition_secs: f64,
    freeze_last_frame: bool,
    visual_duration: f64,
    final_duration: f64,
}

impl ComposedVisual {
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Duration of the untrimmed composite.
    pub fn visual_duration(&self) -> f64 {
        self.visual_duration
    }

    /// Duration after the sync rule.
    pub fn final_duration(&self) -> f64 {
        self.final_duration
    }

    /// Render the composite at time `t` seconds.
    pub fn frame_at(&self, store: &AssetStore, t: f64) -> PipelineResult<FrameRGBA> {
        let target = Target {
            width: self.canvas.width,
            height: self.canvas.height,
        };
        let mut frame = FrameRGBA::filled(self.canvas, [0, 0, 0, 0]);
        let current = self.slot_at(t);

        for paint in &self.paints {
            match paint {
                Paint::Fill(premul) => {
                    for px in frame.data.chunks_exact_mut(4) {
                        px.copy_from_slice(premul);
                    }
                }
                Paint::Still {
                    image,
                    opacity,
                    until,
                } => {
                    if until.is_some_and(|end| t >= end) {
                        continue;
                    }
                    let img = lookup(store, image.handle)?;
                    blit_over(
                        &mut frame.data,
                        target,
                        &img.rgba8_premul,
                        image.width,
                        image.height,
                        image.x,
                        image.y,
                        *opacity,
                    )?;
                }
                Paint::Primary => {
                    let Some((idx, local)) = current else {
                        continue;
                    };
                    let slot = &self.slots[idx];
                    let p = progress(local, self.transition_secs, slot.duration);
                    let tf = transition_frame(slot.transition, p, self.canvas.width);
                    if tf.show_previous && idx > 0 {
                        let prev = lookup(store, self.slots[idx - 1].image)?;
                        draw_settled(&mut frame, target, &prev)?;
                    }
                    let img = lookup(store, slot.image)?;
                    draw_frame_over(
                        &mut frame.data,
                        target,
                        &img.rgba8_premul,
                        tf.scale,
                        tf.offset_x,
                        tf.opacity,
                    )?;
                }
                Paint::Caption { slot, image } => {
                    if current.map(|(i, _)| i) != Some(*slot) {
                        continue;
                    }
                    let img = lookup(store, image.handle)?;
                    blit_over(
                        &mut frame.data,
                        target,
                        &img.rgba8_premul,
                        image.width,
                        image.height,
                        image.x,
                        image.y,
                        1.0,
                    )?;
                }
            }
        }
        Ok(frame)
    }

    /// Visible slot and local time at `t`.
    fn slot_at(&self, t: f64) -> Option<(usize, f64)> {
        let idx = self.slots.partition_point(|s| s.start + s.duration <= t);
        if let Some(s) = self.slots.get(idx)
            && s.start <= t
        {
            return Some((idx, t - s.start));
        }
        if self.freeze_last_frame
            && let Some(last) = self.slots.last()
            && t >= last.start + last.duration
        {
            return Some((self.slots.len() - 1, last.duration));
        }
        None
    }
}

fn draw_settled(frame: &mut FrameRGBA, target: Target, img: &PreparedImage) -> PipelineResult<()> {
    let s = TransitionFrame::SETTLED;
    draw_frame_over(
        &mut frame.data,
        target,
        &img.rgba8_premul,
        s.scale,
        s.offset_x,
        s.opacity,
    )
}

fn lookup(store: &AssetStore, handle: AssetHandle) -> PipelineResult<PreparedImage> {
    store.image(handle).ok_or_else(|| {
        PipelineError::composition(format!("image {handle} was released before rendering"))
    })
}

/// Resolves a [`LayerStack`] against a canvas.
pub struct Compositor<'a> {
    store: &'a AssetStore,
    opts: ComposeOpts,
}

impl<'a> Compositor<'a> {
    pub fn new(store: &'a AssetStore, opts: ComposeOpts) -> Self {
        Self { store, opts }
    }

    /// Fit every referenced image to the canvas, fix the paint order and apply the sync rule
    /// against `audio_duration`.
    #[tracing::instrument(level = "info", skip(self, stack))]
    pub fn compose(
        &self,
        stack: &LayerStack,
        audio_duration: f64,
    ) -> PipelineResult<ComposedVisual> {
        let canvas = self.opts.canvas;
        if canvas.width == 0 || canvas.height == 0 {
            return Err(PipelineError::composition("canvas must be non-empty"));
        }
        for h in stack.handles() {
            if !self.store.contains(h) {
                return Err(PipelineError::composition(format!(
                    "layer references asset {h} which is not live"
                )));
            }
        }

        let layers = stack.layers();
        if !layers.windows(2).all(|w| w[0].kind() <= w[1].kind()) {
            return Err(PipelineError::composition("layers out of paint order"));
        }

        let fitted = self.fit_all(stack)?;
        let full = |h: AssetHandle| -> PipelineResult<Placed> {
            let img = fitted.get(&h).ok_or_else(|| {
                PipelineError::composition(format!("image {h} was not prepared"))
            })?;
            Ok(Placed {
                handle: img.handle,
                width: img.width,
                height: img.height,
                x: 0,
                y: 0,
            })
        };

        let mut paints = Vec::with_capacity(layers.len() + 1);
        for layer in &layers {
            match layer {
                Layer::Background(Background::Color(c)) => {
                    paints.push(Paint::Fill(c.to_premul()));
                }
                Layer::Background(Background::Image(img)) => {
                    paints.push(Paint::Fill([0, 0, 0, 255]));
                    paints.push(Paint::Still {
                        image: full(img.handle)?,
                        opacity: 1.0,
                        until: None,
                    });
                }
                Layer::PersistentBackground(p) => paints.push(Paint::Still {
                    image: full(p.source.handle)?,
                    opacity: 1.0,
                    until: Some(p.duration),
                }),
                Layer::Primary(_) => paints.push(Paint::Primary),
                Layer::TextOverlay(slot) => {
                    let Some(band) = slot.overlay else {
                        continue;
                    };
                    let slot_idx = stack
                        .primary
                        .slots()
                        .iter()
                        .position(|s| std::ptr::eq(s, *slot))
                        .ok_or_else(|| {
                            PipelineError::composition("caption bound to an unknown slot")
                        })?;
                    paints.push(Paint::Caption {
                        slot: slot_idx,
                        image: Placed {
                            handle: band.handle,
                            width: band.width,
                            height: band.height,
                            x: (i64::from(canvas.width) - i64::from(band.width)) / 2,
                            y: i64::from(canvas.height) - i64::from(band.height),
                        },
                    });
                }
                Layer::Watermark(w) => {
                    let (image, opacity) = self.place_watermark(w)?;
                    paints.push(Paint::Still {
                        image,
                        opacity,
                        until: None,
                    });
                }
            }
        }

        let slots = stack
            .primary
            .slots()
            .iter()
            .map(|s| -> PipelineResult<PrimarySlot> {
                Ok(PrimarySlot {
                    image: full(s.source.handle)?.handle,
                    start: s.start,
                    duration: s.duration,
                    transition: s.transition,
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        let visual_duration = stack.primary.duration();
        if visual_duration <= DURATION_EPSILON {
            return Err(PipelineError::composition("composite has zero duration"));
        }
        let final_duration =
            final_duration(visual_duration, audio_duration, self.opts.freeze_last_frame);
        tracing::info!(
            visual_duration,
            final_duration,
            layers = layers.len(),
            "composite resolved"
        );

        Ok(ComposedVisual {
            canvas,
            paints,
            slots,
            transition_secs: self.opts.transition_secs.max(0.0),
            freeze_last_frame: self.opts.freeze_last_frame,
            visual_duration,
            final_duration,
        })
    }

    /// Canvas-sized copies of every full-frame image, keyed by the original handle.
    fn fit_all(&self, stack: &LayerStack) -> PipelineResult<HashMap<AssetHandle, ImageAsset>> {
        let mut sources: Vec<ImageAsset> = Vec::new();
        let mut push = |img: ImageAsset| {
            if !sources.iter().any(|s| s.handle == img.handle) {
                sources.push(img);
            }
        };
        if let Background::Image(img) = stack.background {
            push(img);
        }
        if let Some(p) = stack.primary.persistent() {
            push(p.source);
        }
        for s in stack.primary.slots() {
            push(s.source);
        }

        let canvas = self.opts.canvas;
        let fitted = sources
            .par_iter()
            .map(|src| -> PipelineResult<(AssetHandle, ImageAsset)> {
                if src.width == canvas.width && src.height == canvas.height {
                    return Ok((src.handle, *src));
                }
                let img = lookup(self.store, src.handle)?;
                let fit = fit_to_canvas(&img, canvas)?;
                tracing::debug!(
                    from = %src.handle,
                    width = src.width,
                    height = src.height,
                    "image fitted to canvas"
                );
                Ok((src.handle, ImageAsset::acquire(self.store, "fitted", fit)?))
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(fitted.into_iter().collect())
    }

    fn place_watermark(&self, w: &Watermark) -> PipelineResult<(Placed, f32)> {
        let canvas = self.opts.canvas;
        let max_w =
            ((f64::from(canvas.width) * WATERMARK_MAX_WIDTH_FRACTION).floor() as u32).max(1);
        let mut asset = w.image;
        if asset.width > max_w || asset.height > canvas.height {
            let scale = (f64::from(max_w) / f64::from(asset.width.max(1)))
                .min(f64::from(canvas.height) / f64::from(asset.height.max(1)));
            let tw = ((f64::from(asset.width) * scale).round() as u32).max(1);
            let th = ((f64::from(asset.height) * scale).round() as u32).max(1);
            let img = lookup(self.store, asset.handle)?;
            let scaled = resize_premul(&img, tw, th)?;
            asset = ImageAsset::acquire(self.store, "watermark_scaled", scaled)?;
        }

        let margin = (f64::from(canvas.width.min(canvas.height)) * WATERMARK_MARGIN_FRACTION)
            .round() as i64;
        let (cw, ch) = (i64::from(canvas.width), i64::from(canvas.height));
        let (ww, wh) = (i64::from(asset.width), i64::from(asset.height));
        let (x, y) = match w.position {
            WatermarkPosition::TopLeft => (margin, margin),
            WatermarkPosition::TopRight => (cw - ww - margin, margin),
            WatermarkPosition::BottomLeft => (margin, ch - wh - margin),
            WatermarkPosition::BottomRight => (cw - ww - margin, ch - wh - margin),
            WatermarkPosition::Center => ((cw - ww) / 2, (ch - wh) / 2),
        };
        Ok((
            Placed {
                handle: asset.handle,
                width: asset.width,
                height: asset.height,
                x,
                y,
            },
            w.opacity.clamp(0.0, 1.0),
        ))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composition/compositor.rs"]
mod tests;
