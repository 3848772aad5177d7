use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::axis::AxisSpec;
use crate::build::BuildStep;
use crate::error::{HarnessError, Result};
use crate::runner::{CommandProcess, RetryPolicy, TrialRunner};
use crate::samples::SampleLayout;
use crate::sweep::{SeedPolicy, SweepDefinition, DEFAULT_REPEATS};

pub const PRESETS: [&str; 3] = ["tree", "s-tree", "qsort-mt"];

/// A complete description of one benchmark campaign.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SweepPlan {
    pub name: String,
    /// Benchmark executable, relative to the working directory.
    pub executable: PathBuf,
    /// Argument template, `<variant> <parameter> [<seed>]` if unset.
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
    pub variants: Vec<String>,
    pub axis: AxisSpec,
    /// Label of the axis in reports, e.g. "Tree size".
    #[serde(default = "default_parameter_label")]
    pub parameter_label: String,
    #[serde(default = "default_repeats")]
    pub repeats: usize,
    #[serde(default = "default_operations")]
    pub operations: Vec<String>,
    #[serde(default)]
    pub layout: SampleLayout,
    #[serde(default)]
    pub seed: SeedPolicy,
    #[serde(default)]
    pub cpu_core: Option<usize>,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Run before measuring; no build when unset.
    #[serde(default)]
    pub build: Option<BuildStep>,
}

fn default_parameter_label() -> String {
    "Parameter".to_string()
}

fn default_repeats() -> usize {
    DEFAULT_REPEATS
}

fn default_operations() -> Vec<String> {
    vec!["latency".to_string()]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SweepPlan {
    /// Loads a plan from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let plan: SweepPlan = serde_json::from_str(&content)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Returns one of the built-in plans listed in [`PRESETS`].
    pub fn preset(name: &str) -> Option<Self> {
        let tree_operations = strings(&["insert", "find", "remove"]);
        let plan = match name {
            // Insert/find/remove latency of both trees over sizes 2^5..2^19
            "tree" => SweepPlan {
                name: name.to_string(),
                executable: PathBuf::from("build/treeint"),
                arguments: None,
                variants: strings(&["s-tree", "rbtree"]),
                axis: AxisSpec::powers_of_two(5, 19),
                parameter_label: "Tree size".to_string(),
                repeats: DEFAULT_REPEATS,
                operations: tree_operations,
                layout: SampleLayout::Blocked,
                seed: SeedPolicy::Parameter,
                cpu_core: Some(15),
                retry: RetryPolicy::default(),
                build: Some(BuildStep::default()),
            },
            // Quick single-shot profile of the s-tree alone
            "s-tree" => SweepPlan {
                name: name.to_string(),
                executable: PathBuf::from("build/treeint"),
                arguments: None,
                variants: strings(&["s-tree"]),
                axis: AxisSpec::powers_of_two(7, 19),
                parameter_label: "Tree size".to_string(),
                repeats: 1,
                operations: tree_operations,
                layout: SampleLayout::Blocked,
                seed: SeedPolicy::Parameter,
                cpu_core: Some(1),
                retry: RetryPolicy::default(),
                build: Some(BuildStep::default()),
            },
            // Sort latency against the number of worker threads
            "qsort-mt" => SweepPlan {
                name: name.to_string(),
                executable: PathBuf::from("build/qsort-mt"),
                arguments: Some(strings(&["-h", "{parameter}", "-t"])),
                variants: strings(&["qsort-mt"]),
                axis: AxisSpec::range(1, 31),
                parameter_label: "Thread number".to_string(),
                repeats: DEFAULT_REPEATS,
                operations: default_operations(),
                layout: SampleLayout::Flat,
                seed: SeedPolicy::Omitted,
                cpu_core: None,
                retry: RetryPolicy::default(),
                build: Some(BuildStep::default()),
            },
            _ => return None,
        };
        Some(plan)
    }

    pub fn validate(&self) -> Result<()> {
        if self.executable.as_os_str().is_empty() {
            return Err(HarnessError::invalid_plan("executable path is empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(HarnessError::invalid_plan("retry.max_attempts must be at least 1"));
        }
        self.definition()?.validate()
    }

    /// Builds the orchestrator's view of this plan, generating the axis.
    pub fn definition(&self) -> Result<SweepDefinition> {
        Ok(SweepDefinition {
            variants: self.variants.clone(),
            axis: self.axis.build()?,
            repeats: self.repeats,
            operations: self.operations.clone(),
            layout: self.layout,
            seed: self.seed,
        })
    }

    /// Builds the trial runner that drives this plan's executable.
    pub fn runner(&self) -> TrialRunner<CommandProcess> {
        let process = CommandProcess::new(&self.executable)
            .with_template(self.arguments.clone())
            .with_cpu_core(self.cpu_core);
        TrialRunner::new(process, self.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for name in PRESETS {
            let plan = SweepPlan::preset(name).unwrap();
            plan.validate().unwrap();
            assert_eq!(plan.name, name);
        }
        assert!(SweepPlan::preset("btree").is_none());
    }

    #[test]
    fn tree_preset_covers_the_usual_sizes() {
        let definition = SweepPlan::preset("tree").unwrap().definition().unwrap();
        assert_eq!(definition.axis.values().first(), Some(&32));
        assert_eq!(definition.axis.values().last(), Some(&(1 << 19)));
        assert_eq!(definition.operations, vec!["insert", "find", "remove"]);
        assert_eq!(definition.repeats, 100);
    }

    #[test]
    fn thread_preset_uses_flag_arguments() {
        let plan = SweepPlan::preset("qsort-mt").unwrap();
        let runner = plan.runner();
        let args = runner.process().arguments(&crate::runner::Invocation::new("qsort-mt", 4));
        assert_eq!(args, vec!["-h", "4", "-t"]);
        assert_eq!(plan.definition().unwrap().axis.len(), 31);
    }

    #[test]
    fn minimal_json_plan_gets_defaults() {
        let json = r#"{
            "name": "custom",
            "executable": "./bench",
            "variants": ["a", "b"],
            "axis": { "kind": "explicit", "values": [1, 10, 100] }
        }"#;
        let plan: SweepPlan = serde_json::from_str(json).unwrap();
        plan.validate().unwrap();
        assert_eq!(plan.repeats, DEFAULT_REPEATS);
        assert_eq!(plan.operations, vec!["latency"]);
        assert_eq!(plan.layout, SampleLayout::Flat);
        assert_eq!(plan.seed, SeedPolicy::Omitted);
        assert_eq!(plan.retry, RetryPolicy::default());
        assert!(plan.build.is_none());
    }

    #[test]
    fn inconsistent_plans_are_rejected() {
        let mut plan = SweepPlan::preset("tree").unwrap();
        plan.layout = SampleLayout::Flat;
        assert!(matches!(plan.validate(), Err(HarnessError::InvalidPlan(_))));

        let mut plan = SweepPlan::preset("tree").unwrap();
        plan.axis = AxisSpec::Explicit { values: vec![8, 4] };
        assert!(matches!(plan.validate(), Err(HarnessError::InvalidAxis(_))));

        let mut plan = SweepPlan::preset("qsort-mt").unwrap();
        plan.retry.max_attempts = 0;
        assert!(plan.validate().is_err());
    }
}
