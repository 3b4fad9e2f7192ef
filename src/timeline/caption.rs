use std::sync::{Arc, OnceLock};

use crate::{
    assets::store::PreparedImage,
    foundation::core::Canvas,
    foundation::error::{PipelineError, PipelineResult},
};

const BAND_OPACITY: f32 = 0.55;

/// Height of the caption band for `canvas`.
pub fn band_height(canvas: Canvas) -> u32 {
    (canvas.height / 6).max(16).min(canvas.height.max(1))
}

/// Rasterize `text` as a bottom caption band sized for `canvas`.
///
/// The band is `canvas.width` x [`band_height`] pixels, premultiplied RGBA8: a translucent dark
/// strip with white, centred, word-wrapped text.
#[tracing::instrument(level = "debug", skip(text), fields(chars = text.chars().count()))]
pub fn render_caption(text: &str, canvas: Canvas) -> PipelineResult<PreparedImage> {
    let w = canvas.width.max(1);
    let h = band_height(canvas);
    let svg = caption_svg(text, w, h);

    let opts = usvg::Options {
        fontdb: caption_fontdb(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(&svg, &opts)
        .map_err(|e| PipelineError::composition(format!("caption svg rejected: {e}")))?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(w, h)
        .ok_or_else(|| PipelineError::composition("caption band has zero area"))?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::default(),
        &mut pixmap.as_mut(),
    );
    PreparedImage::from_premul(w, h, pixmap.take())
}

/// SVG document for the caption band.
pub fn caption_svg(text: &str, width: u32, height: u32) -> String {
    let font_px = (f64::from(height) * 0.3).clamp(8.0, 64.0);
    let max_chars = ((f64::from(width) * 0.9) / (font_px * 0.55)).floor().max(1.0) as usize;
    let max_lines = ((f64::from(height) / (font_px * 1.2)).floor() as usize).max(1);

    let mut lines = wrap_words(text, max_chars);
    lines.truncate(max_lines);
    let line_h = font_px * 1.2;
    let block_h = line_h * lines.len() as f64;
    let first_baseline = (f64::from(height) - block_h) / 2.0 + font_px;

    let mut out = String::with_capacity(256 + text.len());
    out.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    ));
    out.push_str(&format!(
        r#"<rect x="0" y="0" width="{width}" height="{height}" fill="black" fill-opacity="{BAND_OPACITY}"/>"#
    ));
    for (i, line) in lines.iter().enumerate() {
        let y = first_baseline + line_h * i as f64;
        out.push_str(&format!(
            r#"<text x="{}" y="{y:.2}" font-family="sans-serif" font-size="{font_px:.2}" fill="white" text-anchor="middle">{}</text>"#,
            f64::from(width) / 2.0,
            xml_escape(line)
        ));
    }
    out.push_str("</svg>");
    out
}

/// Greedy word wrap on character counts. Words longer than `max_chars` are split.
pub fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if cur_len > 0 {
                lines.push(std::mem::take(&mut cur));
                cur_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let wlen = word.len();
        if wlen == 0 {
            continue;
        }
        if cur_len > 0 && cur_len + 1 + wlen > max_chars {
            lines.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        if cur_len > 0 {
            cur.push(' ');
            cur_len += 1;
        }
        cur.extend(word);
        cur_len += wlen;
    }
    if cur_len > 0 {
        lines.push(cur);
    }
    lines
}

pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn caption_fontdb() -> Arc<usvg::fontdb::Database> {
    static DB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        let faces = db.faces().count();
        if faces == 0 {
            tracing::warn!("no system fonts found, captions render as bands without text");
        } else {
            tracing::debug!(faces, "caption font database loaded");
        }
        Arc::new(db)
    })
    .clone()
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/caption.rs"]
mod tests;
