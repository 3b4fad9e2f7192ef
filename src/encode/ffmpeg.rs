use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::sink::{Artifact, FrameSink, SinkConfig};
use crate::foundation::core::{FrameIndex, Rgba8};
use crate::foundation::error::{PipelineError, PipelineResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::frame::FrameRGBA;

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    pub out_path: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
    /// Color used to flatten alpha.
    pub bg: Rgba8,
}

impl FfmpegSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg: Rgba8::BLACK,
        }
    }
}

/// Sink that spawns the system `ffmpeg` and streams raw frames to its stdin.
///
/// Audio is optional and provided through `SinkConfig.audio`; the output is cut to the shorter of
/// the two streams.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    frames: u64,
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
            frames: 0,
        }
    }

    pub fn out_path(&self) -> &Path {
        &self.opts.out_path
    }
}

impl FrameSink for FfmpegSink {
    #[tracing::instrument(level = "debug", skip(self, cfg), fields(out = %self.opts.out_path.display()))]
    fn begin(&mut self, cfg: SinkConfig) -> PipelineResult<()> {
        check_encodable(&cfg)?;
        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(PipelineError::render(format!(
                "refusing to overwrite '{}'",
                self.opts.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(PipelineError::render("ffmpeg not found on PATH"));
        }

        let args = encoder_args(&self.opts, &cfg);
        tracing::debug!(?args, "spawning ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::render(format!("ffmpeg spawn failed: {e}")))?;
        let (Some(stdin), Some(mut stderr)) = (child.stdin.take(), child.stderr.take()) else {
            if let Err(e) = child.kill() {
                tracing::warn!(error = %e, "failed to stop ffmpeg");
            }
            return Err(PipelineError::render("ffmpeg pipes unavailable"));
        };
        self.stderr_drain = Some(std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf)?;
            Ok(buf)
        }));

        self.scratch = vec![0u8; cfg.width as usize * cfg.height as usize * 4];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.frames = 0;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PipelineResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| PipelineError::render("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(PipelineError::render(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(PipelineError::render(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }

        flatten_premul_over_bg(&mut self.scratch, &frame.data, self.opts.bg)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(PipelineError::render("ffmpeg sink is already finalized"));
        };
        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            PipelineError::render(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames += 1;
        Ok(())
    }

    fn end(&mut self) -> PipelineResult<Artifact> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| PipelineError::render("ffmpeg sink not started"))?;

        let status = child.wait().map_err(|e| {
            PipelineError::render(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PipelineError::render("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| PipelineError::render(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let _ = std::fs::remove_file(&self.opts.out_path);
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(PipelineError::render(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        self.cfg = None;
        tracing::info!(
            frames = self.frames,
            out = %self.opts.out_path.display(),
            "mp4 written"
        );
        Ok(Artifact {
            path: Some(self.opts.out_path.clone()),
            frames: self.frames,
        })
    }

    fn discard(&mut self) {
        drop(self.stdin.take());
        let started = self.child.is_some();
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
        self.cfg = None;
        if started && self.opts.out_path.exists() {
            match std::fs::remove_file(&self.opts.out_path) {
                Ok(()) => tracing::debug!(
                    out = %self.opts.out_path.display(),
                    "partial output removed"
                ),
                Err(e) => tracing::warn!(
                    out = %self.opts.out_path.display(),
                    error = %e,
                    "failed to remove partial output"
                ),
            }
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.discard();
        }
    }
}

/// Frame geometry and audio layout libx264/yuv420p plus AAC can take.
fn check_encodable(cfg: &SinkConfig) -> PipelineResult<()> {
    if cfg.fps.num == 0 || cfg.fps.den == 0 {
        return Err(PipelineError::render("frame rate must be non-zero"));
    }
    let even = |v: u32| v > 0 && v.is_multiple_of(2);
    if !even(cfg.width) || !even(cfg.height) {
        return Err(PipelineError::render(format!(
            "mp4 frames must have even, non-zero dimensions (got {}x{})",
            cfg.width, cfg.height
        )));
    }
    if let Some(audio) = &cfg.audio
        && (audio.sample_rate == 0 || audio.channels == 0)
    {
        return Err(PipelineError::render("audio bed has no sample rate or channels"));
    }
    Ok(())
}

/// ffmpeg arguments: flattened RGBA frames on stdin, the f32le audio bed from its scratch file,
/// H.264 video and AAC audio in a faststart MP4.
fn encoder_args(opts: &FfmpegSinkOpts, cfg: &SinkConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    push_args(&mut args, &[if opts.overwrite { "-y" } else { "-n" }, "-loglevel", "error"]);
    let size = format!("{}x{}", cfg.width, cfg.height);
    // `-r` before `-i` sets the rawvideo input rate.
    let rate = format!("{}/{}", cfg.fps.num, cfg.fps.den);
    push_args(
        &mut args,
        &["-f", "rawvideo", "-pix_fmt", "rgba", "-s", &size, "-r", &rate, "-i", "pipe:0"],
    );

    match &cfg.audio {
        Some(audio) => {
            let ar = audio.sample_rate.to_string();
            let ac = audio.channels.to_string();
            push_args(&mut args, &["-f", "f32le", "-ar", &ar, "-ac", &ac, "-i"]);
            args.push(audio.path.clone().into_os_string());
            push_args(&mut args, &["-c:a", "aac", "-shortest"]);
        }
        None => push_args(&mut args, &["-an"]),
    }
    push_args(
        &mut args,
        &["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"],
    );
    args.push(opts.out_path.clone().into_os_string());
    args
}

fn push_args(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(|s| OsString::from(*s)));
}

fn flatten_premul_over_bg(dst: &mut [u8], src_premul: &[u8], bg: Rgba8) -> PipelineResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(PipelineError::render(
            "flatten_premul_over_bg expects equal-length rgba8 buffers",
        ));
    }

    let [bg_r, bg_g, bg_b, _] = bg.0.map(u16::from);
    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255u16 - a;
        d[0] = (u16::from(s[0]) + mul_div255_u16(bg_r, inv)).min(255) as u8;
        d[1] = (u16::from(s[1]) + mul_div255_u16(bg_g, inv)).min(255) as u8;
        d[2] = (u16::from(s[2]) + mul_div255_u16(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }
    Ok(())
}

pub fn ensure_parent_dir(path: &Path) -> PipelineResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
