use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
}

#[test]
fn fps_secs_to_frames_rounds_to_nearest() {
    let fps = Fps::new(24, 1).unwrap();
    assert_eq!(fps.secs_to_frames_round(12.0), 288);
    assert_eq!(fps.secs_to_frames_round(0.02), 0);
    assert_eq!(fps.secs_to_frames_round(0.03), 1);
    assert!((fps.frames_to_secs(48) - 2.0).abs() < 1e-12);
}

#[test]
fn rgba8_premul_scales_color_by_alpha() {
    assert_eq!(Rgba8([255, 0, 0, 128]).to_premul(), [128, 0, 0, 128]);
    assert_eq!(Rgba8::BLACK.to_premul(), [0, 0, 0, 255]);
}

#[test]
fn finite_positive_guard() {
    assert!(ensure_finite_positive("slot_duration", 5.0).is_ok());
    assert!(ensure_finite_positive("slot_duration", 0.0).is_err());
    assert!(ensure_finite_positive("slot_duration", f64::NAN).is_err());
}
