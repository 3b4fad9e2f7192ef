use super::*;

#[test]
fn parse_known_kinds_case_insensitively() {
    assert_eq!(parse_transition("Fade").unwrap(), Transition::Fade);
    assert_eq!(parse_transition(" slide ").unwrap(), Transition::Slide);
    assert_eq!(parse_transition("ZOOM").unwrap(), Transition::Zoom);
    assert_eq!(parse_transition("").unwrap(), Transition::None);
    assert!(parse_transition("wipe").is_err());
}

#[test]
fn serde_uses_snake_case_names() {
    let t: Transition = serde_json::from_str("\"fade\"").unwrap();
    assert_eq!(t, Transition::Fade);
    assert_eq!(serde_json::to_string(&Transition::Zoom).unwrap(), "\"zoom\"");
}

#[test]
fn progress_window_is_clamped_to_half_slot() {
    assert_eq!(progress(0.0, 0.5, 5.0), 0.0);
    assert!((progress(0.25, 0.5, 5.0) - 0.5).abs() < 1e-12);
    assert_eq!(progress(3.0, 0.5, 5.0), 1.0);
    assert!((progress(0.25, 2.0, 1.0) - 0.5).abs() < 1e-12);
    assert_eq!(progress(0.0, 0.0, 5.0), 1.0);
}

#[test]
fn frames_start_at_entry_state_and_settle() {
    let fade = transition_frame(Transition::Fade, 0.0, 100);
    assert_eq!(fade.opacity, 0.0);
    assert!(fade.show_previous);

    let slide = transition_frame(Transition::Slide, 0.0, 100);
    assert_eq!(slide.offset_x, 100);

    let zoom = transition_frame(Transition::Zoom, 0.0, 100);
    assert!((zoom.scale - ZOOM_START_SCALE).abs() < 1e-12);

    for kind in [
        Transition::None,
        Transition::Fade,
        Transition::Slide,
        Transition::Zoom,
    ] {
        assert_eq!(transition_frame(kind, 1.0, 100), TransitionFrame::SETTLED);
    }
}
