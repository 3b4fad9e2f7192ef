use std::io::Cursor;

use super::*;

fn png_bytes(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn decode_image_png_dimensions_and_premul() {
    let prepared = decode_image(&png_bytes(1, 1, [100, 50, 200, 128])).unwrap();
    assert_eq!(prepared.width, 1);
    assert_eq!(prepared.height, 1);
    assert_eq!(
        prepared.rgba8_premul.as_slice(),
        &[
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8
        ]
    );
}

#[test]
fn decode_image_rejects_garbage() {
    assert!(decode_image(b"definitely not an image").is_err());
}

#[test]
fn contain_rect_letterboxes_wide_content() {
    let r = contain_rect(
        Size::new(200.0, 50.0),
        Canvas {
            width: 100,
            height: 100,
        },
    );
    assert!((r.width() - 100.0).abs() < 1e-9);
    assert!((r.height() - 25.0).abs() < 1e-9);
    assert!((r.y0 - 37.5).abs() < 1e-9);
}

#[test]
fn fit_to_canvas_centres_and_keeps_borders_transparent() {
    let src = PreparedImage::solid(4, 2, [255, 0, 0, 255]).unwrap();
    let canvas = Canvas {
        width: 8,
        height: 8,
    };
    let fitted = fit_to_canvas(&src, canvas).unwrap();
    assert_eq!((fitted.width, fitted.height), (8, 8));
    let px = |x: usize, y: usize| {
        let i = (y * 8 + x) * 4;
        [
            fitted.rgba8_premul[i],
            fitted.rgba8_premul[i + 1],
            fitted.rgba8_premul[i + 2],
            fitted.rgba8_premul[i + 3],
        ]
    };
    assert_eq!(px(4, 0), [0, 0, 0, 0]);
    assert_eq!(px(4, 4), [255, 0, 0, 255]);
}
