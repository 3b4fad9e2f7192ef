use super::*;

fn constant(store: &AssetStore, secs: f64, value: f32) -> AudioAsset {
    let frames = media::secs_to_sample_frames(secs, 48_000) as usize;
    let pcm = PreparedAudio::from_interleaved(48_000, 1, vec![value; frames]);
    AudioAsset::acquire(store, "track", pcm).unwrap()
}

fn left_at(store: &AssetStore, asset: &AudioAsset, t: f64) -> f32 {
    let pcm = store.audio(asset.handle).unwrap();
    let i = (t * 48_000.0) as usize * 2;
    pcm.interleaved_f32[i]
}

#[test]
fn narration_only_round_trips_duration() {
    let store = AssetStore::in_temp_dir().unwrap();
    let narration = constant(&store, 2.0, 0.25);
    let out = mix_bed(&store, &AudioBed::new(narration), narration.duration_sec).unwrap();
    assert!((out.duration_sec - 2.0).abs() < 1e-9);
    assert_eq!(out.sample_rate, media::MIX_SAMPLE_RATE);
    assert_eq!(out.channels, 2);
    assert!((left_at(&store, &out, 1.0) - 0.25).abs() < 1e-6);
}

#[test]
fn short_narration_is_padded_with_silence() {
    let store = AssetStore::in_temp_dir().unwrap();
    let narration = constant(&store, 0.5, 0.5);
    let out = mix_bed(&store, &AudioBed::new(narration), 1.0).unwrap();
    assert!((out.duration_sec - 1.0).abs() < 1e-9);
    assert!((left_at(&store, &out, 0.25) - 0.5).abs() < 1e-6);
    assert_eq!(left_at(&store, &out, 0.75), 0.0);
}

#[test]
fn long_narration_is_truncated() {
    let store = AssetStore::in_temp_dir().unwrap();
    let narration = constant(&store, 3.0, 0.5);
    let out = mix_bed(&store, &AudioBed::new(narration), 1.5).unwrap();
    assert!((out.duration_sec - 1.5).abs() < 1e-9);
}

#[test]
fn music_loops_and_fades_at_the_end() {
    let store = AssetStore::in_temp_dir().unwrap();
    let narration = constant(&store, 1.0, 0.0);
    let music = constant(&store, 0.1, 0.4);
    let bed = AudioBed::new(narration).with_music(Some(MusicTrack {
        asset: music,
        volume: 0.5,
    }));
    let out = mix_bed(&store, &bed, 1.0).unwrap();
    assert!((left_at(&store, &out, 0.55) - 0.2).abs() < 1e-6);
    assert!((left_at(&store, &out, 0.9) - 0.2).abs() < 1e-6);
    assert!(left_at(&store, &out, 0.999) < 0.05);
}

#[test]
fn effects_play_once_at_offset() {
    let store = AssetStore::in_temp_dir().unwrap();
    let narration = constant(&store, 2.0, 0.0);
    let sfx = constant(&store, 0.2, 0.3);
    let late = constant(&store, 0.2, 0.9);
    let bed = AudioBed::new(narration)
        .with_effect(EffectCue {
            asset: sfx,
            offset: 1.0,
            volume: 1.0,
        })
        .with_effect(EffectCue {
            asset: late,
            offset: 5.0,
            volume: 1.0,
        });
    let out = mix_bed(&store, &bed, 2.0).unwrap();
    assert_eq!(left_at(&store, &out, 0.5), 0.0);
    assert!((left_at(&store, &out, 1.1) - 0.3).abs() < 1e-6);
    assert_eq!(left_at(&store, &out, 1.5), 0.0);
}

#[test]
fn summing_clamps_instead_of_failing() {
    let store = AssetStore::in_temp_dir().unwrap();
    let narration = constant(&store, 1.0, 0.8);
    let music = constant(&store, 1.0, 0.8);
    let bed = AudioBed::new(narration).with_music(Some(MusicTrack {
        asset: music,
        volume: 1.0,
    }));
    let out = mix_bed(&store, &bed, 1.0).unwrap();
    assert_eq!(left_at(&store, &out, 0.5), 1.0);
}

#[test]
fn reconcile_pads_and_truncates() {
    let store = AssetStore::in_temp_dir().unwrap();
    let narration = constant(&store, 1.0, 0.5);
    let bed = mix_bed(&store, &AudioBed::new(narration), 1.0).unwrap();
    let longer = reconcile_duration(&store, &bed, 1.5).unwrap();
    assert!((longer.duration_sec - 1.5).abs() < 1e-9);
    assert_eq!(left_at(&store, &longer, 1.25), 0.0);
    let shorter = reconcile_duration(&store, &bed, 0.25).unwrap();
    assert!((shorter.duration_sec - 0.25).abs() < 1e-9);
    assert!((left_at(&store, &shorter, 0.2) - 0.5).abs() < 1e-6);
    assert!(store.contains(bed.handle));
}

#[test]
fn reconcile_keeps_a_bed_that_already_fits() {
    let store = AssetStore::in_temp_dir().unwrap();
    let narration = constant(&store, 1.0, 0.5);
    let bed = mix_bed(&store, &AudioBed::new(narration), 1.0).unwrap();
    let before = store.stats().acquired;
    let same = reconcile_duration(&store, &bed, 1.0).unwrap();
    assert_eq!(same.handle, bed.handle);
    assert_eq!(store.stats().acquired, before);
}

#[test]
fn released_track_is_a_composition_error() {
    let store = AssetStore::in_temp_dir().unwrap();
    let narration = constant(&store, 1.0, 0.5);
    store.release(narration.handle).unwrap();
    let err = mix_bed(&store, &AudioBed::new(narration), 1.0).unwrap_err();
    assert!(matches!(err, PipelineError::Composition(_)));
}

#[test]
fn negative_effect_offset_is_rejected() {
    let store = AssetStore::in_temp_dir().unwrap();
    let narration = constant(&store, 1.0, 0.0);
    let sfx = constant(&store, 0.2, 0.3);
    let bed = AudioBed::new(narration).with_effect(EffectCue {
        asset: sfx,
        offset: -0.5,
        volume: 1.0,
    });
    let err = mix_bed(&store, &bed, 1.0).unwrap_err();
    assert!(matches!(err, PipelineError::Config(ref m) if m.contains("offset")));
}
