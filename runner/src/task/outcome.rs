use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Run,
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub phase: Phase,
    pub component: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ledger of (component, outcome) pairs of a task, reduced with AND on demand
///
/// Nothing short-circuits: every thread and hook gets its entry, so a failed run still shows
/// which components were responsible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcomes(Vec<Outcome>);

impl Outcomes {
    pub fn record(&mut self, phase: Phase, component: impl Into<String>, ok: bool) -> bool {
        self.0.push(Outcome {
            phase,
            component: component.into(),
            ok,
            error: None,
        });

        ok
    }

    pub fn record_error(&mut self, phase: Phase, component: impl Into<String>, error: impl Display) {
        self.0.push(Outcome {
            phase,
            component: component.into(),
            ok: false,
            error: Some(error.to_string()),
        });
    }

    pub fn phase_ok(&self, phase: Phase) -> bool {
        self.0
            .iter()
            .filter(|outcome| outcome.phase == phase)
            .all(|outcome| outcome.ok)
    }

    pub fn all_ok(&self) -> bool {
        self.0.iter().all(|outcome| outcome.ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.0.iter().filter(|outcome| !outcome.ok)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
