//! Error taxonomy shared by every layer of the crate.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage names used to tag runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ScaleDown,
    ModUp,
    RingSwitch,
    DomainSwitch,
    Pack,
    Unpack,
    CoeffsToSlots,
    Mod1,
    SlotsToCoeffs,
    Refinement,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::ScaleDown => "ScaleDown",
            Stage::ModUp => "ModUp",
            Stage::RingSwitch => "RingSwitch",
            Stage::DomainSwitch => "DomainSwitch",
            Stage::Pack => "Pack",
            Stage::Unpack => "Unpack",
            Stage::CoeffsToSlots => "CoeffsToSlots",
            Stage::Mod1 => "Mod1",
            Stage::SlotsToCoeffs => "SlotsToCoeffs",
            Stage::Refinement => "Refinement",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Inconsistent parameters, detected when parameters are built.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A required evaluation key is absent.
    #[error("missing key: {0}")]
    KeyMismatch(String),

    /// A ciphertext does not carry enough level or the expected scale.
    #[error("{stage}: {message}")]
    RuntimeLevel { stage: Stage, message: String },

    /// Operand mismatch reported by the generic evaluator.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// A pipeline stage failed; wraps the underlying error.
    #[error("bootstrapping failed during {stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn arithmetic(msg: impl Into<String>) -> Self {
        Error::Arithmetic(msg.into())
    }

    pub(crate) fn level(stage: Stage, msg: impl Into<String>) -> Self {
        Error::RuntimeLevel {
            stage,
            message: msg.into(),
        }
    }

    pub(crate) fn missing_key(msg: impl Into<String>) -> Self {
        Error::KeyMismatch(msg.into())
    }

    /// Stage a runtime failure was reported at, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::RuntimeLevel { stage, .. } | Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Tag an error with the stage it escaped from. Errors that already
    /// name a stage are left untouched so the innermost stage is reported.
    pub(crate) fn at(self, stage: Stage) -> Self {
        match self {
            Error::Stage { .. } | Error::RuntimeLevel { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }
}

/// Extension used by the bootstrapping pipeline to tag failing stages.
pub(crate) trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.at(stage))
    }
}
