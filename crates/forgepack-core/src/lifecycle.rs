use crate::engine::BuildEngine;
use crate::CoreError;
use serde::Serialize;
use std::fmt;

/// One-shot construction phases, in firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Environment,
    AfterEnvironment,
    /// The build driver wires the normalized options into the engine.
    ProcessOptions,
    Initialize,
}

impl Phase {
    pub const ORDER: [Phase; 4] = [
        Phase::Environment,
        Phase::AfterEnvironment,
        Phase::ProcessOptions,
        Phase::Initialize,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Environment => "environment",
            Self::AfterEnvironment => "afterEnvironment",
            Self::ProcessOptions => "processOptions",
            Self::Initialize => "initialize",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Fired(Phase),
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructed => f.write_str("constructed"),
            Self::Fired(phase) => write!(f, "{phase}"),
        }
    }
}

pub fn validate_transition(from: LifecycleState, to: Phase) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (LifecycleState::Constructed, Phase::Environment)
            | (LifecycleState::Fired(Phase::Environment), Phase::AfterEnvironment)
            | (LifecycleState::Fired(Phase::AfterEnvironment), Phase::ProcessOptions)
            | (LifecycleState::Fired(Phase::ProcessOptions), Phase::Initialize)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidPhase {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

pub type HookFn = Box<dyn FnOnce(&mut BuildEngine) -> Result<(), CoreError>>;

struct Tap {
    phase: Phase,
    name: String,
    hook: HookFn,
}

/// Per-engine dispatcher for the one-shot lifecycle phases.
///
/// Hooks are `FnOnce`: each phase fires at most once, so a hook runs at most once.
pub struct LifecycleHooks {
    state: LifecycleState,
    fired: Vec<Phase>,
    taps: Vec<Tap>,
}

impl Default for LifecycleHooks {
    fn default() -> Self {
        Self {
            state: LifecycleState::Constructed,
            fired: Vec::new(),
            taps: Vec::new(),
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("state", &self.state)
            .field("fired", &self.fired)
            .field("pending_taps", &self.taps.len())
            .finish()
    }
}

impl LifecycleHooks {
    /// Register `hook` to run when `phase` fires. Taps run in registration order.
    pub fn tap(
        &mut self,
        phase: Phase,
        name: impl Into<String>,
        hook: impl FnOnce(&mut BuildEngine) -> Result<(), CoreError> + 'static,
    ) -> Result<(), CoreError> {
        let name = name.into();
        if self.has_fired(phase) {
            return Err(CoreError::PhaseAlreadyFired {
                phase: phase.to_string(),
                hook: name,
            });
        }
        self.taps.push(Tap {
            phase,
            name,
            hook: Box::new(hook),
        });
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn has_fired(&self, phase: Phase) -> bool {
        self.fired.contains(&phase)
    }

    pub fn fired(&self) -> &[Phase] {
        &self.fired
    }

    pub fn pending(&self, phase: Phase) -> usize {
        self.taps.iter().filter(|t| t.phase == phase).count()
    }

    /// Mark `phase` as fired and hand back its hooks. The phase counts as fired
    /// before any hook runs, so hooks cannot re-tap it.
    pub(crate) fn begin(&mut self, phase: Phase) -> Result<Vec<(String, HookFn)>, CoreError> {
        validate_transition(self.state, phase)?;
        self.state = LifecycleState::Fired(phase);
        self.fired.push(phase);

        let (due, rest): (Vec<Tap>, Vec<Tap>) =
            std::mem::take(&mut self.taps).into_iter().partition(|t| t.phase == phase);
        self.taps = rest;
        Ok(due.into_iter().map(|t| (t.name, t.hook)).collect())
    }
}
