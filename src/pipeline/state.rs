use std::fmt;

use crate::foundation::error::{PipelineError, PipelineResult};

/// Stage of a render request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PipelineState {
    Idle,
    Extracting,
    Synthesizing,
    BuildingTimeline,
    Compositing,
    Mixing,
    ApplyingEffects,
    Rendering,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Synthesizing => "synthesizing",
            Self::BuildingTimeline => "building_timeline",
            Self::Compositing => "compositing",
            Self::Mixing => "mixing",
            Self::ApplyingEffects => "applying_effects",
            Self::Rendering => "rendering",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Enforces the stage order of one run and records every state visited.
///
/// Stages advance strictly in sequence. The one re-entrant edge is
/// `ApplyingEffects -> Mixing`, taken when post-effects changed the duration and the audio bed
/// has to be reconciled again; rendering may then follow that second mixing pass.
#[derive(Clone, Debug)]
pub struct StateMachine {
    current: PipelineState,
    history: Vec<PipelineState>,
    effects_applied: bool,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: PipelineState::Idle,
            history: vec![PipelineState::Idle],
            effects_applied: false,
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn into_history(self) -> Vec<PipelineState> {
        self.history
    }

    pub fn can_advance(&self, to: PipelineState) -> bool {
        use PipelineState::*;
        if self.current.is_terminal() {
            return false;
        }
        if to == Failed {
            return true;
        }
        match (self.current, to) {
            (Idle, Extracting)
            | (Extracting, Synthesizing)
            | (Synthesizing, BuildingTimeline)
            | (BuildingTimeline, Compositing)
            | (Compositing, Mixing)
            | (Mixing, ApplyingEffects)
            | (ApplyingEffects, Rendering)
            | (Rendering, Done) => true,
            (ApplyingEffects, Mixing) => true,
            (Mixing, Rendering) => self.effects_applied,
            _ => false,
        }
    }

    /// Move to `to`, or fail with a composition error for an illegal edge.
    pub fn advance(&mut self, to: PipelineState) -> PipelineResult<()> {
        if !self.can_advance(to) {
            return Err(PipelineError::composition(format!(
                "illegal pipeline transition {} -> {to}",
                self.current
            )));
        }
        if to == PipelineState::ApplyingEffects {
            self.effects_applied = true;
        }
        tracing::debug!(from = %self.current, to = %to, "pipeline state");
        self.current = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `Failed` from any non-terminal state.
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            self.current = PipelineState::Failed;
            self.history.push(PipelineState::Failed);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/state.rs"]
mod tests;
