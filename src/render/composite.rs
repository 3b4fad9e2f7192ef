use crate::foundation::error::{PipelineError, PipelineResult};

pub type PremulRgba8 = [u8; 4];

pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// Destination frame geometry for the blit helpers.
#[derive(Clone, Copy, Debug)]
pub struct Target {
    pub width: u32,
    pub height: u32,
}

/// Paint `src` (`src_w` x `src_h`) over `dst` with its top-left corner at `(x, y)`.
///
/// Parts falling outside the destination are clipped.
#[allow(clippy::too_many_arguments)]
pub fn blit_over(
    dst: &mut [u8],
    target: Target,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    x: i64,
    y: i64,
    opacity: f32,
) -> PipelineResult<()> {
    check_len(dst, target.width, target.height, "blit_over dst")?;
    check_len(src, src_w, src_h, "blit_over src")?;
    if opacity <= 0.0 {
        return Ok(());
    }

    let tw = i64::from(target.width);
    let th = i64::from(target.height);
    let x_start = x.max(0);
    let x_end = (x + i64::from(src_w)).min(tw);
    let y_start = y.max(0);
    let y_end = (y + i64::from(src_h)).min(th);
    if x_start >= x_end || y_start >= y_end {
        return Ok(());
    }

    for dy in y_start..y_end {
        let sy = (dy - y) as usize;
        for dx in x_start..x_end {
            let sx = (dx - x) as usize;
            let si = (sy * src_w as usize + sx) * 4;
            let di = (dy as usize * target.width as usize + dx as usize) * 4;
            let s = [src[si], src[si + 1], src[si + 2], src[si + 3]];
            let d = [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]];
            dst[di..di + 4].copy_from_slice(&over(d, s, opacity));
        }
    }
    Ok(())
}

/// Paint a full-frame `src` over `dst`, scaled by `scale` about the frame centre and shifted by
/// `offset_x` pixels. Uses nearest-neighbour sampling.
pub fn draw_frame_over(
    dst: &mut [u8],
    target: Target,
    src: &[u8],
    scale: f64,
    offset_x: i64,
    opacity: f32,
) -> PipelineResult<()> {
    if (scale - 1.0).abs() < 1e-9 {
        return blit_over(
            dst,
            target,
            src,
            target.width,
            target.height,
            offset_x,
            0,
            opacity,
        );
    }
    check_len(dst, target.width, target.height, "draw_frame_over dst")?;
    check_len(src, target.width, target.height, "draw_frame_over src")?;
    if opacity <= 0.0 || !scale.is_finite() || scale <= 0.0 {
        return Ok(());
    }

    let w = target.width as usize;
    let h = target.height as usize;
    let cx = w as f64 / 2.0;
    let cy = h as f64 / 2.0;
    for dy in 0..h {
        let sy = ((dy as f64 + 0.5 - cy) / scale + cy).floor();
        if sy < 0.0 || sy >= h as f64 {
            continue;
        }
        for dx in 0..w {
            let sx = ((dx as f64 + 0.5 - cx - offset_x as f64) / scale + cx).floor();
            if sx < 0.0 || sx >= w as f64 {
                continue;
            }
            let si = (sy as usize * w + sx as usize) * 4;
            let di = (dy * w + dx) * 4;
            let s = [src[si], src[si + 1], src[si + 2], src[si + 3]];
            let d = [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]];
            dst[di..di + 4].copy_from_slice(&over(d, s, opacity));
        }
    }
    Ok(())
}

fn check_len(buf: &[u8], w: u32, h: u32, what: &str) -> PipelineResult<()> {
    if buf.len() != w as usize * h as usize * 4 {
        return Err(PipelineError::composition(format!(
            "{what} expects a {w}x{h} rgba8 buffer, got {} bytes",
            buf.len()
        )));
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    crate::foundation::math::mul_div255_u8(x, y)
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
