use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::info;

use crate::error::{HarnessError, Result};
use crate::runner::stderr_tail;

/// The command that brings the benchmark executables up to date.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Directory to run in, the current one if unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for BuildStep {
    fn default() -> Self {
        BuildStep { program: "make".to_string(), args: Vec::new(), dir: None }
    }
}

impl BuildStep {
    /// Runs the build once. Must succeed before any measurement starts.
    pub fn ensure_built(&self) -> Result<()> {
        let command = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        info!("Building with `{}`", command);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null()).stdout(Stdio::inherit()).stderr(Stdio::piped());
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| HarnessError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(HarnessError::ExternalProcessFailure {
                command,
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn successful_build_is_ok() {
        let step = BuildStep { program: "true".to_string(), args: Vec::new(), dir: None };
        step.ensure_built().unwrap();
    }

    #[test]
    fn failing_build_is_fatal() {
        let step = BuildStep {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo broken >&2; exit 2".to_string()],
            dir: None,
        };
        match step.ensure_built() {
            Err(HarnessError::ExternalProcessFailure { status, stderr, .. }) => {
                assert_eq!(status.code(), Some(2));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_build_tool_is_a_spawn_error() {
        let step = BuildStep { program: "/nonexistent/make".to_string(), args: Vec::new(), dir: None };
        assert!(matches!(step.ensure_built(), Err(HarnessError::Spawn { .. })));
    }
}
