use super::*;
use crate::foundation::core::{Canvas, Fps};

#[test]
fn flatten_alpha_0_returns_bg() {
    let src = vec![0u8, 0, 0, 0];
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg(&mut dst, &src, Rgba8([10, 20, 30, 255])).unwrap();
    assert_eq!(dst, vec![10, 20, 30, 255]);
}

#[test]
fn flatten_alpha_255_is_identity() {
    let src = vec![1u8, 2, 3, 255];
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg(&mut dst, &src, Rgba8([10, 20, 30, 255])).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn encoder_args_mux_the_audio_bed_when_present() {
    let opts = FfmpegSinkOpts::new("/out/story.mp4");
    let mut cfg = SinkConfig {
        width: 8,
        height: 4,
        fps: Fps::new(30_000, 1001).unwrap(),
        audio: None,
    };
    let silent: Vec<String> = encoder_args(&opts, &cfg)
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert_eq!(silent.first().map(String::as_str), Some("-y"));
    assert!(silent.windows(2).any(|w| w == ["-s", "8x4"]));
    assert!(silent.windows(2).any(|w| w == ["-r", "30000/1001"]));
    assert!(silent.contains(&"-an".to_string()));
    assert_eq!(silent.last().map(String::as_str), Some("/out/story.mp4"));

    cfg.audio = Some(crate::encode::sink::AudioInputConfig {
        path: "/scratch/bed.f32".into(),
        sample_rate: 48_000,
        channels: 2,
    });
    let muxed: Vec<String> = encoder_args(&opts, &cfg)
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert!(!muxed.contains(&"-an".to_string()));
    assert!(muxed.windows(2).any(|w| w == ["-i", "/scratch/bed.f32"]));
    assert!(muxed.windows(2).any(|w| w == ["-c:a", "aac"]));
    assert!(muxed.windows(2).any(|w| w == ["-ar", "48000"]));
}

#[test]
fn silent_audio_layout_is_rejected() {
    let cfg = SinkConfig {
        width: 8,
        height: 8,
        fps: Fps::default(),
        audio: Some(crate::encode::sink::AudioInputConfig {
            path: "/scratch/bed.f32".into(),
            sample_rate: 0,
            channels: 2,
        }),
    };
    assert!(matches!(
        check_encodable(&cfg),
        Err(PipelineError::Render(_))
    ));
}

#[test]
fn odd_dimensions_are_rejected_before_spawning() {
    let dir = std::env::temp_dir().join(format!("storyreel_ffmpeg_{}", std::process::id()));
    let out = dir.join("odd.mp4");
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out));
    let err = sink
        .begin(SinkConfig {
            width: 3,
            height: 2,
            fps: Fps::default(),
            audio: None,
        })
        .unwrap_err();
    assert!(matches!(err, PipelineError::Render(_)));
    sink.discard();
    assert!(!out.exists());
}

#[test]
fn encodes_a_short_clip_when_ffmpeg_is_available() {
    if !is_ffmpeg_on_path() {
        return;
    }
    let dir = std::env::temp_dir().join(format!(
        "storyreel_ffmpeg_ok_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let out = dir.join("clip.mp4");
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out));
    sink.begin(SinkConfig {
        width: 16,
        height: 16,
        fps: Fps::new(4, 1).unwrap(),
        audio: None,
    })
    .unwrap();
    let frame = FrameRGBA::filled(
        Canvas {
            width: 16,
            height: 16,
        },
        [200, 0, 0, 255],
    );
    for i in 0..4 {
        sink.push_frame(FrameIndex(i), &frame).unwrap();
    }
    let artifact = sink.end().unwrap();
    assert_eq!(artifact.frames, 4);
    assert!(out.exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn discard_removes_partial_output() {
    if !is_ffmpeg_on_path() {
        return;
    }
    let dir = std::env::temp_dir().join(format!("storyreel_ffmpeg_discard_{}", std::process::id()));
    let out = dir.join("partial.mp4");
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out));
    sink.begin(SinkConfig {
        width: 16,
        height: 16,
        fps: Fps::default(),
        audio: None,
    })
    .unwrap();
    let frame = FrameRGBA::filled(
        Canvas {
            width: 16,
            height: 16,
        },
        [0, 0, 200, 255],
    );
    sink.push_frame(FrameIndex(0), &frame).unwrap();
    sink.discard();
    assert!(!out.exists());
    let _ = std::fs::remove_dir_all(&dir);
}
