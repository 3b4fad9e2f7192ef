use super::*;
use crate::assets::store::{AssetStore, PreparedImage};

fn image(store: &AssetStore) -> ImageAsset {
    ImageAsset::acquire(
        store,
        "img",
        PreparedImage::solid(2, 2, [0, 0, 0, 255]).unwrap(),
    )
    .unwrap()
}

fn slot(source: ImageAsset, start: f64, duration: f64) -> TimelineSlot {
    TimelineSlot {
        source,
        start,
        duration,
        transition: Transition::None,
        overlay_text: None,
        overlay: None,
    }
}

#[test]
fn durations_and_lookup() {
    let store = AssetStore::in_temp_dir().unwrap();
    let img = image(&store);
    let tl = VisualTimeline::new(
        vec![slot(img, 0.0, 5.0), slot(img, 5.0, 5.0), slot(img, 10.0, 2.5)],
        None,
    )
    .unwrap();
    assert_eq!(tl.sequential_duration(), 12.5);
    assert_eq!(tl.duration(), 12.5);
    assert_eq!(tl.slot_index_at(0.0), Some(0));
    assert_eq!(tl.slot_index_at(4.999), Some(0));
    assert_eq!(tl.slot_index_at(5.0), Some(1));
    assert_eq!(tl.slot_index_at(12.4), Some(2));
    assert_eq!(tl.slot_index_at(12.5), None);
}

#[test]
fn persistent_background_extends_duration() {
    let store = AssetStore::in_temp_dir().unwrap();
    let img = image(&store);
    let tl = VisualTimeline::new(
        vec![slot(img, 0.0, 5.0)],
        Some(PersistentBackground {
            source: img,
            duration: 12.0,
        }),
    )
    .unwrap();
    assert_eq!(tl.sequential_duration(), 5.0);
    assert_eq!(tl.duration(), 12.0);
    assert_eq!(tl.handles().len(), 2);
}

#[test]
fn rejects_overlapping_or_empty_slots() {
    let store = AssetStore::in_temp_dir().unwrap();
    let img = image(&store);
    assert!(VisualTimeline::new(vec![slot(img, 0.0, 0.0)], None).is_err());
    assert!(VisualTimeline::new(vec![slot(img, 0.0, 5.0), slot(img, 4.0, 5.0)], None).is_err());
}
