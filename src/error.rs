use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Everything that can abort a sweep.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("benchmark produced no output after {attempts} attempts")]
    TransientEmptyOutput { attempts: u32 },

    #[error("malformed benchmark output: {0}")]
    MalformedOutput(String),

    #[error("cannot reduce an empty set of samples")]
    EmptyReduction,

    #[error("`{command}` failed with {status}: {stderr}")]
    ExternalProcessFailure {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid parameter axis: {0}")]
    InvalidAxis(String),

    #[error("invalid sweep plan: {0}")]
    InvalidPlan(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn malformed<T: std::fmt::Display>(msg: T) -> Self {
        HarnessError::MalformedOutput(msg.to_string())
    }

    pub fn invalid_plan<T: std::fmt::Display>(msg: T) -> Self {
        HarnessError::InvalidPlan(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
