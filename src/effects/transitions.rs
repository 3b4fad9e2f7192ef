use crate::foundation::error::{PipelineError, PipelineResult};

/// How a slot enters the frame.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Hard cut.
    #[default]
    None,
    /// Crossfade from the previous slot.
    Fade,
    /// Slide in from the right over the previous slot.
    Slide,
    /// Scale down from 1.25x to 1x.
    Zoom,
}

/// Starting scale of [`Transition::Zoom`].
pub const ZOOM_START_SCALE: f64 = 1.25;

pub fn parse_transition(kind: &str) -> PipelineResult<Transition> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "" | "none" | "cut" => Ok(Transition::None),
        "fade" | "crossfade" => Ok(Transition::Fade),
        "slide" => Ok(Transition::Slide),
        "zoom" => Ok(Transition::Zoom),
        other => Err(PipelineError::config(format!(
            "unknown transition kind '{other}'"
        ))),
    }
}

/// How to draw the entering slot (and whether the outgoing one stays underneath).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionFrame {
    /// Opacity of the entering slot.
    pub opacity: f32,
    /// Horizontal offset in pixels of the entering slot.
    pub offset_x: i64,
    /// Scale about the frame centre of the entering slot.
    pub scale: f64,
    /// Whether the previous slot is painted first.
    pub show_previous: bool,
}

impl TransitionFrame {
    pub const SETTLED: Self = Self {
        opacity: 1.0,
        offset_x: 0,
        scale: 1.0,
        show_previous: false,
    };
}

/// Transition progress in `[0, 1]` for local slot time `t`, with the window clamped to half the
/// slot so back-to-back transitions never overlap.
pub fn progress(t_in_slot: f64, transition_secs: f64, slot_duration: f64) -> f64 {
    let window = transition_secs.min(slot_duration / 2.0);
    if window <= 0.0 {
        return 1.0;
    }
    (t_in_slot / window).clamp(0.0, 1.0)
}

pub fn transition_frame(kind: Transition, p: f64, frame_width: u32) -> TransitionFrame {
    let p = p.clamp(0.0, 1.0);
    if p >= 1.0 {
        return TransitionFrame::SETTLED;
    }
    match kind {
        Transition::None => TransitionFrame::SETTLED,
        Transition::Fade => TransitionFrame {
            opacity: p as f32,
            show_previous: true,
            ..TransitionFrame::SETTLED
        },
        Transition::Slide => TransitionFrame {
            offset_x: ((1.0 - p) * f64::from(frame_width)).round() as i64,
            show_previous: true,
            ..TransitionFrame::SETTLED
        },
        Transition::Zoom => TransitionFrame {
            scale: ZOOM_START_SCALE + (1.0 - ZOOM_START_SCALE) * smoothstep(p),
            ..TransitionFrame::SETTLED
        },
    }
}

fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/transitions.rs"]
mod tests;
