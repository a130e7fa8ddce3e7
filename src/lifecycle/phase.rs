use crate::config::{self, TransitionSpec};
use crate::error::{KernelError, Result};
use std::collections::HashMap;

/// One rung of the ladder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: String,
    pub enter: Option<String>,
    pub leave: Option<String>,
}

/// Direction of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the highest phase, calling `enter` methods in execution order
    Up,
    /// Towards the rest phase, calling `leave` methods in reverse execution order
    Down,
}

/// A single boundary crossed during a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseStep {
    pub from: usize,
    pub to: usize,
    pub method: String,
    pub direction: Direction,
}

/// The fixed, ordered list of phases.
#[derive(Debug, Clone)]
pub struct PhaseLadder {
    phases: Vec<Phase>,
    index: HashMap<String, usize>,
}

impl Default for PhaseLadder {
    fn default() -> Self {
        Self::build(config::default_transitions())
    }
}

impl PhaseLadder {
    pub fn new(transitions: Vec<TransitionSpec>) -> Result<Self> {
        config::validate_transitions(&transitions)?;
        Ok(Self::build(transitions))
    }

    fn build(transitions: Vec<TransitionSpec>) -> Self {
        let phases: Vec<Phase> = transitions
            .into_iter()
            .map(|spec| Phase {
                name: spec.phase,
                enter: spec.enter,
                leave: spec.leave,
            })
            .collect();
        let index = phases
            .iter()
            .enumerate()
            .map(|(i, phase)| (phase.name.clone(), i))
            .collect();
        Self { phases, index }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.phases[index].name
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Index of the rest phase
    pub fn lowest(&self) -> usize {
        0
    }

    pub fn highest(&self) -> usize {
        self.phases.len() - 1
    }

    /// Every boundary between `from` and `to`, in walking order.
    pub fn steps(&self, from: usize, to: usize) -> Result<Vec<PhaseStep>> {
        let mut steps = Vec::new();
        if from < to {
            for k in from..to {
                steps.push(PhaseStep {
                    from: k,
                    to: k + 1,
                    method: self.method(k + 1, Direction::Up)?,
                    direction: Direction::Up,
                });
            }
        } else {
            for k in ((to + 1)..=from).rev() {
                steps.push(PhaseStep {
                    from: k,
                    to: k - 1,
                    method: self.method(k, Direction::Down)?,
                    direction: Direction::Down,
                });
            }
        }
        Ok(steps)
    }

    fn method(&self, index: usize, direction: Direction) -> Result<String> {
        let phase = &self.phases[index];
        let method = match direction {
            Direction::Up => &phase.enter,
            Direction::Down => &phase.leave,
        };
        method.clone().ok_or_else(|| {
            KernelError::configuration(format!("phase {} has no {:?} method", phase.name, direction))
        })
    }
}
