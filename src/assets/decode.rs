use crate::{
    assets::store::PreparedImage,
    foundation::core::{Canvas, Rect, Size},
    foundation::error::{PipelineError, PipelineResult},
};

/// Decode encoded image bytes and convert to premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> PipelineResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::config(format!("undecodable image upload: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    PreparedImage::from_premul(width, height, rgba8_premul)
}

/// Scale `img` uniformly so it fits inside `canvas`, centred on a transparent frame.
pub fn fit_to_canvas(img: &PreparedImage, canvas: Canvas) -> PipelineResult<PreparedImage> {
    let placed = contain_rect(Size::new(f64::from(img.width), f64::from(img.height)), canvas);
    let w = (placed.width().round() as u32).clamp(1, canvas.width);
    let h = (placed.height().round() as u32).clamp(1, canvas.height);
    let scaled = resize_premul(img, w, h)?;

    let mut out = vec![0u8; canvas.byte_len()];
    let x0 = placed.x0.round().max(0.0) as usize;
    let y0 = placed.y0.round().max(0.0) as usize;
    let row_bytes = w as usize * 4;
    for row in 0..h as usize {
        let dst_y = y0 + row;
        if dst_y >= canvas.height as usize {
            break;
        }
        let dst_off = (dst_y * canvas.width as usize + x0) * 4;
        let copy = row_bytes.min((canvas.width as usize - x0) * 4);
        let src_off = row * row_bytes;
        out[dst_off..dst_off + copy].copy_from_slice(&scaled.rgba8_premul[src_off..src_off + copy]);
    }
    PreparedImage::from_premul(canvas.width, canvas.height, out)
}

/// Resize a premultiplied image to exactly `width` x `height`.
pub fn resize_premul(img: &PreparedImage, width: u32, height: u32) -> PipelineResult<PreparedImage> {
    if img.width == width && img.height == height {
        return Ok(img.clone());
    }
    let src = image::RgbaImage::from_raw(img.width, img.height, img.rgba8_premul.to_vec())
        .ok_or_else(|| PipelineError::composition("image buffer does not match its dimensions"))?;
    let out = image::imageops::resize(&src, width, height, image::imageops::FilterType::Triangle);
    PreparedImage::from_premul(width, height, out.into_raw())
}

/// Largest rectangle with the aspect ratio of `content` that fits centred inside `canvas`.
pub fn contain_rect(content: Size, canvas: Canvas) -> Rect {
    let cw = f64::from(canvas.width);
    let ch = f64::from(canvas.height);
    if content.width <= 0.0 || content.height <= 0.0 {
        return Rect::new(0.0, 0.0, cw, ch);
    }
    let scale = (cw / content.width).min(ch / content.height);
    let size = Size::new(content.width * scale, content.height * scale);
    Rect::from_origin_size(((cw - size.width) / 2.0, (ch - size.height) / 2.0), size)
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
