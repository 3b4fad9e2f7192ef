use super::*;
use crate::foundation::core::Rgba8;
use crate::timeline::model::{PersistentBackground, TimelineSlot, VisualTimeline};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

fn canvas() -> Canvas {
    Canvas {
        width: 20,
        height: 20,
    }
}

fn solid(store: &AssetStore, w: u32, h: u32, px: [u8; 4]) -> ImageAsset {
    ImageAsset::acquire(store, "solid", PreparedImage::solid(w, h, px).unwrap()).unwrap()
}

fn slot(source: ImageAsset, start: f64, duration: f64, transition: Transition) -> TimelineSlot {
    TimelineSlot {
        source,
        start,
        duration,
        transition,
        overlay_text: None,
        overlay: None,
    }
}

fn opts(freeze: bool) -> ComposeOpts {
    ComposeOpts {
        canvas: canvas(),
        transition_secs: 1.0,
        freeze_last_frame: freeze,
    }
}

fn three_slots(store: &AssetStore) -> VisualTimeline {
    let colors = [RED, GREEN, BLUE];
    let slots = colors
        .iter()
        .enumerate()
        .map(|(i, c)| slot(solid(store, 20, 20, *c), i as f64 * 5.0, 5.0, Transition::None))
        .collect();
    VisualTimeline::new(slots, None).unwrap()
}

#[test]
fn sync_rule_trims_but_never_stretches() {
    assert_eq!(final_duration(15.0, 12.0, false), 12.0);
    assert_eq!(final_duration(10.0, 12.0, false), 10.0);
    assert_eq!(final_duration(10.0, 12.0, true), 12.0);
    assert_eq!(final_duration(15.0, 12.0, true), 12.0);
}

#[test]
fn composite_is_trimmed_to_narration() {
    let store = AssetStore::in_temp_dir().unwrap();
    let stack = LayerStack::new(three_slots(&store));
    let composed = Compositor::new(&store, opts(false))
        .compose(&stack, 12.0)
        .unwrap();
    assert_eq!(composed.visual_duration(), 15.0);
    assert_eq!(composed.final_duration(), 12.0);
}

#[test]
fn frames_follow_the_slots() {
    let store = AssetStore::in_temp_dir().unwrap();
    let stack = LayerStack::new(three_slots(&store));
    let composed = Compositor::new(&store, opts(false))
        .compose(&stack, 15.0)
        .unwrap();
    assert_eq!(composed.frame_at(&store, 0.0).unwrap().pixel(3, 3), RED);
    assert_eq!(composed.frame_at(&store, 6.0).unwrap().pixel(3, 3), GREEN);
    assert_eq!(composed.frame_at(&store, 14.9).unwrap().pixel(3, 3), BLUE);
}

#[test]
fn short_composite_holds_last_frame_only_when_asked() {
    let store = AssetStore::in_temp_dir().unwrap();
    let tl = VisualTimeline::new(
        vec![slot(solid(&store, 20, 20, RED), 0.0, 2.0, Transition::None)],
        None,
    )
    .unwrap();
    let stack = LayerStack::new(tl).with_background(Background::Color(Rgba8([0, 0, 0, 255])));

    let plain = Compositor::new(&store, opts(false))
        .compose(&stack, 5.0)
        .unwrap();
    assert_eq!(plain.final_duration(), 2.0);
    assert_eq!(plain.frame_at(&store, 3.0).unwrap().pixel(1, 1), [0, 0, 0, 255]);

    let frozen = Compositor::new(&store, opts(true))
        .compose(&stack, 5.0)
        .unwrap();
    assert_eq!(frozen.final_duration(), 5.0);
    assert_eq!(frozen.frame_at(&store, 4.5).unwrap().pixel(1, 1), RED);
}

#[test]
fn fade_blends_previous_slot() {
    let store = AssetStore::in_temp_dir().unwrap();
    let tl = VisualTimeline::new(
        vec![
            slot(solid(&store, 20, 20, RED), 0.0, 4.0, Transition::None),
            slot(solid(&store, 20, 20, GREEN), 4.0, 4.0, Transition::Fade),
        ],
        None,
    )
    .unwrap();
    let composed = Compositor::new(&store, opts(false))
        .compose(&LayerStack::new(tl), 8.0)
        .unwrap();
    let mid = composed.frame_at(&store, 4.5).unwrap().pixel(5, 5);
    assert!(mid[0] > 100 && mid[0] < 160, "{mid:?}");
    assert!(mid[1] > 100 && mid[1] < 160, "{mid:?}");
    assert_eq!(composed.frame_at(&store, 5.5).unwrap().pixel(5, 5), GREEN);
}

#[test]
fn layers_paint_in_fixed_order() {
    let store = AssetStore::in_temp_dir().unwrap();
    let mut s0 = slot(solid(&store, 20, 20, RED), 0.0, 5.0, Transition::None);
    s0.overlay_text = Some("hi".to_string());
    s0.overlay = Some(solid(&store, 20, 4, BLUE));
    let s1 = slot(solid(&store, 20, 20, GREEN), 5.0, 5.0, Transition::None);
    let tl = VisualTimeline::new(vec![s0, s1], None).unwrap();
    let stack = LayerStack::new(tl).with_watermark(Some(Watermark {
        image: solid(&store, 8, 8, WHITE),
        position: WatermarkPosition::BottomRight,
        opacity: 1.0,
    }));

    let composed = Compositor::new(&store, opts(false))
        .compose(&stack, 10.0)
        .unwrap();
    let f = composed.frame_at(&store, 1.0).unwrap();
    assert_eq!(f.pixel(2, 2), RED);
    // Caption over primary, watermark over caption.
    assert_eq!(f.pixel(2, 18), BLUE);
    let wm = f.pixel(17, 17);
    assert!(wm[0] > 250 && wm[1] > 250 && wm[2] > 250, "{wm:?}");
    // Watermark is capped at a fifth of the width.
    assert_eq!(f.pixel(14, 17), BLUE);

    // The caption belongs to slot 0 only.
    let f = composed.frame_at(&store, 6.0).unwrap();
    assert_eq!(f.pixel(2, 18), GREEN);
}

#[test]
fn persistent_background_shows_after_slots() {
    let store = AssetStore::in_temp_dir().unwrap();
    let first = solid(&store, 20, 20, RED);
    let tl = VisualTimeline::new(
        vec![
            slot(first, 0.0, 2.0, Transition::None),
            slot(solid(&store, 20, 20, GREEN), 2.0, 2.0, Transition::None),
        ],
        Some(PersistentBackground {
            source: first,
            duration: 10.0,
        }),
    )
    .unwrap();
    let composed = Compositor::new(&store, opts(false))
        .compose(&LayerStack::new(tl), 10.0)
        .unwrap();
    assert_eq!(composed.final_duration(), 10.0);
    assert_eq!(composed.frame_at(&store, 3.0).unwrap().pixel(4, 4), GREEN);
    assert_eq!(composed.frame_at(&store, 7.0).unwrap().pixel(4, 4), RED);
}

#[test]
fn smaller_images_are_fitted_to_the_canvas() {
    let store = AssetStore::in_temp_dir().unwrap();
    let tl = VisualTimeline::new(
        vec![slot(solid(&store, 10, 5, RED), 0.0, 1.0, Transition::None)],
        None,
    )
    .unwrap();
    let composed = Compositor::new(&store, opts(false))
        .compose(&LayerStack::new(tl), 1.0)
        .unwrap();
    let f = composed.frame_at(&store, 0.5).unwrap();
    let inside = f.pixel(10, 10);
    assert!(inside[0] > 250 && inside[1] < 5, "{inside:?}");
    assert_eq!(f.pixel(10, 1), [0, 0, 0, 255]);
}

#[test]
fn released_handle_is_a_composition_error() {
    let store = AssetStore::in_temp_dir().unwrap();
    let tl = three_slots(&store);
    store.release(tl.slots()[1].source.handle).unwrap();
    let err = Compositor::new(&store, opts(false))
        .compose(&LayerStack::new(tl), 12.0)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Composition(_)));
}
