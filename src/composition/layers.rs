use crate::{
    assets::store::{AssetHandle, ImageAsset},
    audio::mix::AudioBed,
    effects::post::PostEffects,
    foundation::core::{Canvas, Fps, Rgba8},
    timeline::model::{PersistentBackground, TimelineSlot, VisualTimeline},
};

/// Compositing tier. Lower tiers are painted first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    Background,
    Primary,
    TextOverlay,
    Watermark,
}

/// Fill beneath everything else.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Background {
    Color(Rgba8),
    Image(ImageAsset),
}

impl Default for Background {
    fn default() -> Self {
        Self::Color(Rgba8::BLACK)
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Watermark {
    pub image: ImageAsset,
    pub position: WatermarkPosition,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
}

/// One entry of a [`LayerStack`], borrowed from it.
#[derive(Clone, Copy, Debug)]
pub enum Layer<'a> {
    Background(&'a Background),
    /// The first image held beneath the slots for the whole narration.
    PersistentBackground(&'a PersistentBackground),
    Primary(&'a VisualTimeline),
    /// Caption band bound to one slot.
    TextOverlay(&'a TimelineSlot),
    Watermark(&'a Watermark),
}

impl Layer<'_> {
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Background(_) | Self::PersistentBackground(_) => LayerKind::Background,
            Self::Primary(_) => LayerKind::Primary,
            Self::TextOverlay(_) => LayerKind::TextOverlay,
            Self::Watermark(_) => LayerKind::Watermark,
        }
    }
}

/// Every visual layer of a project. Iteration order is the paint order.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerStack {
    pub background: Background,
    pub primary: VisualTimeline,
    pub watermark: Option<Watermark>,
}

impl LayerStack {
    pub fn new(primary: VisualTimeline) -> Self {
        Self {
            background: Background::default(),
            primary,
            watermark: None,
        }
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_watermark(mut self, watermark: Option<Watermark>) -> Self {
        self.watermark = watermark;
        self
    }

    /// Layers in paint order: background, primary, text overlays, watermark.
    pub fn layers(&self) -> Vec<Layer<'_>> {
        let mut out = Vec::with_capacity(4 + self.primary.slots().len());
        out.push(Layer::Background(&self.background));
        if let Some(p) = self.primary.persistent() {
            out.push(Layer::PersistentBackground(p));
        }
        out.push(Layer::Primary(&self.primary));
        out.extend(
            self.primary
                .slots()
                .iter()
                .filter(|s| s.overlay.is_some())
                .map(Layer::TextOverlay),
        );
        if let Some(w) = &self.watermark {
            out.push(Layer::Watermark(w));
        }
        out
    }

    /// Every image handle the stack references.
    pub fn handles(&self) -> Vec<AssetHandle> {
        let mut out = self.primary.handles();
        if let Background::Image(img) = &self.background {
            out.push(img.handle);
        }
        if let Some(w) = &self.watermark {
            out.push(w.image.handle);
        }
        out
    }
}

/// Everything one render request produces before export. Not modified once rendering starts.
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    pub layers: LayerStack,
    pub audio: AudioBed,
    pub effects: PostEffects,
    pub canvas: Canvas,
    pub fps: Fps,
    pub transition_secs: f64,
    pub freeze_last_frame: bool,
}

#[cfg(test)]
#[path = "../../tests/unit/composition/layers.rs"]
mod tests;
