use super::*;

#[test]
fn over_opacity_0_is_noop() {
    let dst = [1, 2, 3, 4];
    let src = [200, 200, 200, 200];
    assert_eq!(over(dst, src, 0.0), dst);
}

#[test]
fn over_src_alpha_0_is_noop() {
    let dst = [10, 20, 30, 40];
    let src = [255, 255, 255, 0];
    assert_eq!(over(dst, src, 1.0), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    let dst = [0, 0, 0, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn blit_clips_at_frame_edges() {
    let target = Target {
        width: 3,
        height: 2,
    };
    let mut dst = [0u8, 0, 0, 255].repeat(6);
    let src = [255u8, 255, 255, 255].repeat(4);
    blit_over(&mut dst, target, &src, 2, 2, 2, 1, 1.0).unwrap();
    // only (2,1) is covered
    let white: Vec<usize> = dst
        .chunks_exact(4)
        .enumerate()
        .filter(|(_, px)| px[0] == 255)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(white, vec![5]);

    let mut untouched = [0u8, 0, 0, 255].repeat(6);
    blit_over(&mut untouched, target, &src, 2, 2, -5, 0, 1.0).unwrap();
    assert!(untouched.chunks_exact(4).all(|px| px[0] == 0));
}

#[test]
fn blit_rejects_mismatched_buffers() {
    let target = Target {
        width: 2,
        height: 2,
    };
    let mut dst = vec![0u8; 15];
    assert!(blit_over(&mut dst, target, &[0u8; 4], 1, 1, 0, 0, 1.0).is_err());
}

#[test]
fn draw_frame_over_scale_one_with_offset_shifts() {
    let target = Target {
        width: 4,
        height: 1,
    };
    let mut dst = [0u8, 0, 0, 255].repeat(4);
    let src = [255u8, 0, 0, 255].repeat(4);
    draw_frame_over(&mut dst, target, &src, 1.0, 2, 1.0).unwrap();
    assert_eq!(&dst[0..4], &[0, 0, 0, 255]);
    assert_eq!(&dst[8..12], &[255, 0, 0, 255]);
}

#[test]
fn draw_frame_over_zoomed_covers_whole_frame() {
    let target = Target {
        width: 4,
        height: 4,
    };
    let mut dst = [0u8, 0, 0, 255].repeat(16);
    let src = [0u8, 255, 0, 255].repeat(16);
    draw_frame_over(&mut dst, target, &src, 1.25, 0, 1.0).unwrap();
    assert!(dst.chunks_exact(4).all(|px| px == [0, 255, 0, 255]));
}
