use super::*;
use crate::assets::store::PreparedImage;
use crate::timeline::preprocess::ImageFilter;

fn images(store: &AssetStore, n: usize) -> Vec<ImageAsset> {
    (0..n)
        .map(|i| {
            let img = PreparedImage::solid(8, 8, [10 * i as u8, 0, 0, 255]).unwrap();
            ImageAsset::acquire(store, "img", img).unwrap()
        })
        .collect()
}

fn small_canvas() -> Canvas {
    Canvas {
        width: 32,
        height: 32,
    }
}

#[test]
fn slots_are_sequential_with_default_duration() {
    let store = AssetStore::in_temp_dir().unwrap();
    let imgs = images(&store, 3);
    let tl = build_timeline(&store, &imgs, &TimelineOpts::default(), 12.0).unwrap();
    let starts: Vec<f64> = tl.slots().iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![0.0, 5.0, 10.0]);
    assert_eq!(tl.duration(), 15.0);
    assert!(tl.persistent().is_none());
    assert_eq!(tl.slots()[1].source, imgs[1]);
}

#[test]
fn overrides_apply_by_index() {
    let store = AssetStore::in_temp_dir().unwrap();
    let imgs = images(&store, 3);
    let opts = TimelineOpts {
        slot_durations: vec![2.0],
        slot_transitions: vec![Transition::None, Transition::Fade],
        transition: Transition::Zoom,
        ..TimelineOpts::default()
    };
    let tl = build_timeline(&store, &imgs, &opts, 1.0).unwrap();
    let durs: Vec<f64> = tl.slots().iter().map(|s| s.duration).collect();
    assert_eq!(durs, vec![2.0, 5.0, 5.0]);
    let kinds: Vec<Transition> = tl.slots().iter().map(|s| s.transition).collect();
    assert_eq!(
        kinds,
        vec![Transition::None, Transition::Fade, Transition::Zoom]
    );
}

#[test]
fn fewer_captions_than_slots_is_fine() {
    let store = AssetStore::in_temp_dir().unwrap();
    let imgs = images(&store, 3);
    let opts = TimelineOpts {
        overlay_texts: vec!["first".to_string()],
        canvas: small_canvas(),
        ..TimelineOpts::default()
    };
    let tl = build_timeline(&store, &imgs, &opts, 1.0).unwrap();
    assert!(tl.slots()[0].overlay.is_some());
    assert_eq!(tl.slots()[0].overlay_text.as_deref(), Some("first"));
    assert!(tl.slots()[1].overlay.is_none());
    assert!(tl.slots()[2].overlay_text.is_none());
    // Captions are separate assets; slot images are unchanged.
    assert_eq!(tl.slots()[0].source, imgs[0]);
}

#[test]
fn persistent_background_spans_narration() {
    let store = AssetStore::in_temp_dir().unwrap();
    let imgs = images(&store, 2);
    let opts = TimelineOpts {
        persistent_background: true,
        ..TimelineOpts::default()
    };
    let tl = build_timeline(&store, &imgs, &opts, 30.0).unwrap();
    let bg = tl.persistent().unwrap();
    assert_eq!(bg.source, imgs[0]);
    assert_eq!(bg.duration, 30.0);
    assert_eq!(tl.duration(), 30.0);
    assert_eq!(tl.sequential_duration(), 10.0);
}

#[test]
fn preprocessing_creates_new_assets() {
    let store = AssetStore::in_temp_dir().unwrap();
    let imgs = images(&store, 2);
    let before = store.image(imgs[0].handle).unwrap().rgba8_premul;
    let opts = TimelineOpts {
        preprocess: PreprocessOpts {
            filter: ImageFilter::Invert,
            ..PreprocessOpts::default()
        },
        ..TimelineOpts::default()
    };
    let tl = build_timeline(&store, &imgs, &opts, 1.0).unwrap();
    assert_ne!(tl.slots()[0].source.handle, imgs[0].handle);
    assert_eq!(store.image(imgs[0].handle).unwrap().rgba8_premul, before);
    assert_eq!(store.live_count(), 4);
}

#[test]
fn rebuilding_gives_the_same_layout() {
    let store = AssetStore::in_temp_dir().unwrap();
    let imgs = images(&store, 4);
    let opts = TimelineOpts {
        slot_durations: vec![1.5, 3.0],
        preprocess: PreprocessOpts {
            shape_overlay: true,
            seed: 3,
            ..PreprocessOpts::default()
        },
        ..TimelineOpts::default()
    };
    let a = build_timeline(&store, &imgs, &opts, 9.0).unwrap();
    let b = build_timeline(&store, &imgs, &opts, 9.0).unwrap();
    assert_eq!(a.slots().len(), b.slots().len());
    for (x, y) in a.slots().iter().zip(b.slots()) {
        assert_eq!(x.start, y.start);
        assert_eq!(x.duration, y.duration);
        assert_eq!(
            store.image(x.source.handle).unwrap().rgba8_premul,
            store.image(y.source.handle).unwrap().rgba8_premul
        );
    }
}

#[test]
fn rejects_empty_and_bad_durations() {
    let store = AssetStore::in_temp_dir().unwrap();
    let err = build_timeline(&store, &[], &TimelineOpts::default(), 1.0).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));

    let imgs = images(&store, 1);
    let opts = TimelineOpts {
        slot_durations: vec![0.0],
        ..TimelineOpts::default()
    };
    let err = build_timeline(&store, &imgs, &opts, 1.0).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}
