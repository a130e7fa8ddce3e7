//! Kernel configuration: the phase ladder and the group sequence as data.

use crate::error::{KernelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;

/// Environment variable holding a comma separated group sequence.
pub const GROUPS_VAR: &str = "MICROKERNEL_GROUPS";

/// Environment variable holding the phase ladder as a JSON array.
pub const TRANSITIONS_VAR: &str = "MICROKERNEL_TRANSITIONS";

/// One rung of the phase ladder.
///
/// The first rung is the rest phase and carries neither method; every other
/// rung names the method called when entering it and when leaving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSpec {
    #[serde(alias = "state")]
    pub phase: String,
    #[serde(default)]
    pub enter: Option<String>,
    #[serde(default)]
    pub leave: Option<String>,
}

impl TransitionSpec {
    /// The rest phase at the bottom of the ladder
    pub fn rest(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            enter: None,
            leave: None,
        }
    }

    pub fn new(phase: impl Into<String>, enter: impl Into<String>, leave: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            enter: Some(enter.into()),
            leave: Some(leave.into()),
        }
    }
}

/// Configuration of a [`Kernel`](crate::Kernel)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default = "default_transitions")]
    pub transitions: Vec<TransitionSpec>,
    #[serde(default = "default_groups")]
    pub groups: Vec<String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            transitions: default_transitions(),
            groups: default_groups(),
        }
    }
}

pub fn default_transitions() -> Vec<TransitionSpec> {
    vec![
        TransitionSpec::rest("dead"),
        TransitionSpec::new("booted", "boot", "shutdown"),
        TransitionSpec::new("latched", "latch", "unlatch"),
        TransitionSpec::new("configured", "configure", "reset"),
        TransitionSpec::new("prepared", "prepare", "release"),
        TransitionSpec::new("started", "start", "stop"),
    ]
}

pub fn default_groups() -> Vec<String> {
    ["BOOT", "BASE", "RESOURCE", "SERVICE", "IDENT", "USECASE"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl KernelConfig {
    /// Parse a configuration document; missing fields fall back to the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| KernelError::configuration(format!("invalid kernel config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `MICROKERNEL_GROUPS` and `MICROKERNEL_TRANSITIONS`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                GROUPS_VAR => {
                    config.groups = value
                        .split(',')
                        .map(str::trim)
                        .filter(|g| !g.is_empty())
                        .map(String::from)
                        .collect();
                }
                TRANSITIONS_VAR => {
                    config.transitions = serde_json::from_str(value).map_err(|e| {
                        KernelError::configuration(format!("invalid {}: {}", TRANSITIONS_VAR, e))
                    })?;
                }
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_transitions(&self.transitions)?;
        validate_groups(&self.groups)
    }
}

pub(crate) fn validate_transitions(transitions: &[TransitionSpec]) -> Result<()> {
    let Some(rest) = transitions.first() else {
        return Err(KernelError::configuration("phase ladder must not be empty"));
    };
    if rest.enter.is_some() || rest.leave.is_some() {
        return Err(KernelError::configuration(format!(
            "rest phase {} must not carry enter/leave methods",
            rest.phase
        )));
    }

    let mut seen = HashSet::new();
    for (index, spec) in transitions.iter().enumerate() {
        if spec.phase.is_empty() {
            return Err(KernelError::configuration("phase name must not be empty"));
        }
        if !seen.insert(spec.phase.as_str()) {
            return Err(KernelError::configuration(format!(
                "duplicate phase: {}",
                spec.phase
            )));
        }
        if index > 0 {
            let complete = matches!(
                (&spec.enter, &spec.leave),
                (Some(enter), Some(leave)) if !enter.is_empty() && !leave.is_empty()
            );
            if !complete {
                return Err(KernelError::configuration(format!(
                    "phase {} needs both an enter and a leave method",
                    spec.phase
                )));
            }
        }
    }
    Ok(())
}

pub(crate) fn validate_groups(groups: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for group in groups {
        if group.is_empty() {
            return Err(KernelError::configuration("group name must not be empty"));
        }
        if !seen.insert(group.as_str()) {
            return Err(KernelError::configuration(format!("duplicate group: {}", group)));
        }
    }
    Ok(())
}
