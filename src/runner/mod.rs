pub mod affinity;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{HarnessError, Result};
use crate::samples::parse_flat;

/// Longest stderr excerpt kept in a process failure.
const STDERR_TAIL: usize = 512;

/// One point to measure: which variant, at which parameter value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub variant: String,
    pub parameter: u64,
    pub seed: Option<u64>,
}

impl Invocation {
    pub fn new(variant: impl Into<String>, parameter: u64) -> Self {
        Invocation { variant: variant.into(), parameter, seed: None }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Something that runs a benchmark once and returns what it printed.
pub trait TrialProcess {
    /// Runs the benchmark for `invocation` and returns its standard output.
    fn invoke(&mut self, invocation: &Invocation) -> Result<String>;

    /// Returns a short human-readable name for logs.
    fn name(&self) -> &str;
}

/// Runs an external executable, optionally pinned to one CPU core.
pub struct CommandProcess {
    program: PathBuf,
    display_name: String,
    template: Option<Vec<String>>,
    cpu_core: Option<usize>,
}

impl CommandProcess {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let display_name = program.display().to_string();
        CommandProcess { program, display_name, template: None, cpu_core: None }
    }

    /// Replaces the default `<variant> <parameter> [<seed>]` argument list.
    ///
    /// Tokens may contain `{variant}`, `{parameter}` and `{seed}`.
    pub fn with_template(mut self, template: Option<Vec<String>>) -> Self {
        self.template = template;
        self
    }

    /// Pins every child to `core`, if that core exists.
    pub fn with_cpu_core(mut self, core: Option<usize>) -> Self {
        self.cpu_core = affinity::usable_core(core);
        self
    }

    pub fn arguments(&self, invocation: &Invocation) -> Vec<String> {
        match &self.template {
            Some(template) => render_template(template, invocation),
            None => {
                let mut args = vec![invocation.variant.clone(), invocation.parameter.to_string()];
                if let Some(seed) = invocation.seed {
                    args.push(seed.to_string());
                }
                args
            }
        }
    }
}

impl TrialProcess for CommandProcess {
    fn invoke(&mut self, invocation: &Invocation) -> Result<String> {
        let args = self.arguments(invocation);
        let mut cmd = Command::new(&self.program);
        cmd.args(&args).stdin(Stdio::null());
        if let Some(core) = self.cpu_core {
            affinity::pin_command(&mut cmd, core);
        }

        let output = cmd.output().map_err(|source| HarnessError::Spawn {
            program: self.display_name.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(HarnessError::ExternalProcessFailure {
                command: format!("{} {}", self.display_name, args.join(" ")),
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &str {
        &self.display_name
    }
}

fn render_template(template: &[String], invocation: &Invocation) -> Vec<String> {
    let seed = invocation.seed.map(|s| s.to_string()).unwrap_or_default();
    template
        .iter()
        // Without a seed, tokens mentioning it are left out rather than passed empty
        .filter(|token| invocation.seed.is_some() || !token.contains("{seed}"))
        .map(|token| {
            token
                .replace("{variant}", &invocation.variant)
                .replace("{parameter}", &invocation.parameter.to_string())
                .replace("{seed}", &seed)
        })
        .collect()
}

pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    text[start..].to_string()
}

/// Bounds the retries on empty output.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total invocations allowed for one trial, including the first.
    pub max_attempts: u32,
    /// Pause between two attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_attempts: 1000, delay_ms: 5 }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// The parsed output of one successful trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    pub values: Vec<u64>,
    /// Invocations it took to get output, 1 if the first one worked.
    pub attempts: u32,
}

/// Invokes a benchmark and parses what it prints, retrying on empty output.
pub struct TrialRunner<P: TrialProcess> {
    process: P,
    retry: RetryPolicy,
}

impl<P: TrialProcess> TrialRunner<P> {
    pub fn new(process: P, retry: RetryPolicy) -> Self {
        TrialRunner { process, retry }
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    /// Runs one trial.
    ///
    /// Empty output is a known transient failure of the benchmarked programs
    /// and is retried up to the policy's bound. Output that is present but
    /// unparsable is returned as an error right away.
    pub fn run(&mut self, invocation: &Invocation) -> Result<Trial> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let output = self.process.invoke(invocation)?;

            if !output.trim().is_empty() {
                let values = parse_flat(&output)?;
                if values.is_empty() {
                    return Err(HarnessError::malformed(format!("no values in {:?}", output.trim())));
                }
                debug!("{} {} {}: {} values", self.process.name(), invocation.variant, invocation.parameter, values.len());
                return Ok(Trial { values, attempts });
            }

            if attempts >= max_attempts {
                return Err(HarnessError::TransientEmptyOutput { attempts });
            }

            warn!(
                "{} {} {} printed nothing, retrying ({}/{})",
                self.process.name(),
                invocation.variant,
                invocation.parameter,
                attempts,
                max_attempts
            );
            let delay = self.retry.delay();
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays canned outputs, repeating the last one forever.
    struct Scripted {
        outputs: VecDeque<String>,
        calls: u32,
    }

    impl Scripted {
        fn new(outputs: &[&str]) -> Self {
            Scripted { outputs: outputs.iter().map(|s| s.to_string()).collect(), calls: 0 }
        }
    }

    impl TrialProcess for Scripted {
        fn invoke(&mut self, _invocation: &Invocation) -> Result<String> {
            self.calls += 1;
            if self.outputs.len() > 1 {
                Ok(self.outputs.pop_front().unwrap_or_default())
            } else {
                Ok(self.outputs.front().cloned().unwrap_or_default())
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn no_delay(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, delay_ms: 0 }
    }

    #[test]
    fn retries_empty_output_once() {
        let mut runner = TrialRunner::new(Scripted::new(&["", "42"]), no_delay(10));
        let trial = runner.run(&Invocation::new("algoX", 16)).unwrap();
        assert_eq!(trial.values, vec![42]);
        assert_eq!(trial.attempts, 2);
        assert_eq!(runner.process().calls, 2);
    }

    #[test]
    fn gives_up_after_bounded_attempts() {
        let mut runner = TrialRunner::new(Scripted::new(&[""]), no_delay(3));
        let err = runner.run(&Invocation::new("algoX", 16)).unwrap_err();
        assert!(matches!(err, HarnessError::TransientEmptyOutput { attempts: 3 }));
        assert_eq!(runner.process().calls, 3);
    }

    #[test]
    fn malformed_output_is_not_retried() {
        let mut runner = TrialRunner::new(Scripted::new(&["1,x,3", "1,2,3"]), no_delay(10));
        let err = runner.run(&Invocation::new("algoX", 16)).unwrap_err();
        assert!(matches!(err, HarnessError::MalformedOutput(_)));
        assert_eq!(runner.process().calls, 1);

        let mut runner = TrialRunner::new(Scripted::new(&[","]), no_delay(10));
        assert!(matches!(runner.run(&Invocation::new("a", 1)), Err(HarnessError::MalformedOutput(_))));
    }

    #[test]
    fn default_arguments_are_positional() {
        let process = CommandProcess::new("build/treeint");
        let invocation = Invocation::new("rbtree", 1024);
        assert_eq!(process.arguments(&invocation), vec!["rbtree", "1024"]);
        assert_eq!(
            process.arguments(&invocation.with_seed(Some(1024))),
            vec!["rbtree", "1024", "1024"]
        );
    }

    #[test]
    fn template_fills_placeholders() {
        let template = ["-h", "{parameter}", "-t", "--name={variant}"].map(String::from).to_vec();
        let process = CommandProcess::new("build/qsort-mt").with_template(Some(template));
        assert_eq!(
            process.arguments(&Invocation::new("qsort-mt", 8)),
            vec!["-h", "8", "-t", "--name=qsort-mt"]
        );
    }

    #[test]
    fn template_omits_missing_seed() {
        let template = ["{variant}", "{parameter}", "{seed}"].map(String::from).to_vec();
        let process = CommandProcess::new("build/treeint").with_template(Some(template));
        assert_eq!(process.arguments(&Invocation::new("s-tree", 32)), vec!["s-tree", "32"]);
        assert_eq!(
            process.arguments(&Invocation::new("s-tree", 32).with_seed(Some(7))),
            vec!["s-tree", "32", "7"]
        );

        let flagged = ["-n", "{parameter}", "--seed={seed}"].map(String::from).to_vec();
        let process = CommandProcess::new("bench").with_template(Some(flagged));
        assert_eq!(process.arguments(&Invocation::new("a", 5)), vec!["-n", "5"]);
    }

    #[test]
    fn stderr_is_trimmed_to_its_tail() {
        assert_eq!(stderr_tail(b"  oops\n"), "oops");
        let long = "x".repeat(STDERR_TAIL * 2);
        assert_eq!(stderr_tail(long.as_bytes()).len(), STDERR_TAIL);
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let mut process = CommandProcess::new("/nonexistent/benchmark-binary");
        let err = process.invoke(&Invocation::new("a", 1)).unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }
}
