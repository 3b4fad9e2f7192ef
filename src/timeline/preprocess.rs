use crate::{
    assets::store::PreparedImage,
    foundation::error::PipelineResult,
    foundation::math::{Rng64, derive_seed},
    render::composite::over,
};

/// Per-image color filter. Filters always produce a new image.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ImageFilter {
    #[default]
    None,
    Grayscale,
    Sepia,
    Invert,
    Brighten,
    Contrast,
}

/// Preprocessing applied to every input image before it enters the timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreprocessOpts {
    pub filter: ImageFilter,
    pub shape_overlay: bool,
    pub seed: u64,
}

impl PreprocessOpts {
    pub fn is_identity(&self) -> bool {
        self.filter == ImageFilter::None && !self.shape_overlay
    }
}

/// Produce the processed copy of image `index`, or `None` when no transform is configured.
///
/// The source image is never modified; shape placement depends only on `(seed, index)`.
pub fn preprocess_image(
    img: &PreparedImage,
    index: usize,
    opts: &PreprocessOpts,
) -> PipelineResult<Option<PreparedImage>> {
    if opts.is_identity() {
        return Ok(None);
    }
    let mut data = img.rgba8_premul.to_vec();
    apply_filter_in_place(&mut data, opts.filter);
    if opts.shape_overlay {
        paint_random_shapes(
            &mut data,
            img.width,
            img.height,
            derive_seed(opts.seed, "shapes", index as u64),
        );
    }
    PreparedImage::from_premul(img.width, img.height, data).map(Some)
}

pub fn apply_filter_in_place(data: &mut [u8], filter: ImageFilter) {
    if filter == ImageFilter::None {
        return;
    }
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 {
            continue;
        }
        let [r, g, b] = unpremul([px[0], px[1], px[2]], a);
        let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
        let out = match filter {
            ImageFilter::None => [r, g, b],
            ImageFilter::Grayscale => {
                let y = 0.299 * r + 0.587 * g + 0.114 * b;
                [y, y, y]
            }
            ImageFilter::Sepia => [
                0.393 * r + 0.769 * g + 0.189 * b,
                0.349 * r + 0.686 * g + 0.168 * b,
                0.272 * r + 0.534 * g + 0.131 * b,
            ],
            ImageFilter::Invert => [255.0 - r, 255.0 - g, 255.0 - b],
            ImageFilter::Brighten => [r * 1.25, g * 1.25, b * 1.25],
            ImageFilter::Contrast => {
                let c = |v: f32| (v - 128.0) * 1.4 + 128.0;
                [c(r), c(g), c(b)]
            }
        };
        let straight = out.map(|v| v.round().clamp(0.0, 255.0) as u8);
        let pm = premul(straight, a);
        px[0] = pm[0];
        px[1] = pm[1];
        px[2] = pm[2];
    }
}

/// Paint a few translucent rectangles and circles, positioned by `seed`.
pub fn paint_random_shapes(data: &mut [u8], width: u32, height: u32, seed: u64) {
    let mut rng = Rng64::new(seed);
    let min_dim = width.min(height).max(1);
    let count = rng.range_u32(3, 7);
    for _ in 0..count {
        let size = rng.range_u32(min_dim / 10 + 1, min_dim * 35 / 100 + 2);
        let cx = rng.range_u32(0, width) as i64;
        let cy = rng.range_u32(0, height) as i64;
        let straight = [
            rng.range_u32(0, 256) as u8,
            rng.range_u32(0, 256) as u8,
            rng.range_u32(0, 256) as u8,
        ];
        let alpha = (64.0 + rng.next_f64_01() * 90.0) as u8;
        let color = premul(straight, alpha);
        let color = [color[0], color[1], color[2], alpha];
        let circle = rng.next_u64() & 1 == 1;
        let half = i64::from(size / 2);
        for y in (cy - half).max(0)..(cy + half).min(i64::from(height)) {
            for x in (cx - half).max(0)..(cx + half).min(i64::from(width)) {
                if circle {
                    let (dx, dy) = (x - cx, y - cy);
                    if dx * dx + dy * dy > half * half {
                        continue;
                    }
                }
                let i = (y as usize * width as usize + x as usize) * 4;
                let d = [data[i], data[i + 1], data[i + 2], data[i + 3]];
                data[i..i + 4].copy_from_slice(&over(d, color, 1.0));
            }
        }
    }
}

fn unpremul(c: [u8; 3], a: u8) -> [u8; 3] {
    if a == 255 {
        return c;
    }
    let a = u32::from(a);
    c.map(|v| ((u32::from(v) * 255 + a / 2) / a).min(255) as u8)
}

fn premul(c: [u8; 3], a: u8) -> [u8; 3] {
    let a = u16::from(a);
    c.map(|v| crate::foundation::math::mul_div255_u8(u16::from(v), a))
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/preprocess.rs"]
mod tests;
