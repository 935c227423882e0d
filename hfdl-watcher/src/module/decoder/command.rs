///! Decoder command line
use hfdl_common::hz_to_khz;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::DecoderConfig;
use crate::model::FrequencySet;
use crate::module::selection::Selection;

/// Lowest sample rate handed to the decoder (its per-channel rate); a single
/// frequency has zero span and would otherwise ask for nothing.
pub const MIN_SAMPLE_RATE: u64 = 12_000;

/// Decoder output the squitter listener reads
const STDOUT_OUTPUT: &str = "decoded:json:file:path=/dev/stdout";

/// What the decoder should be running: a frequency set and the sample rate
/// covering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderPlan {
    pub frequencies: FrequencySet,
    pub sample_rate: u64,
}

impl DecoderPlan {
    pub fn new(frequencies: FrequencySet, sample_rate: u64) -> Self {
        Self {
            frequencies,
            sample_rate: sample_rate.max(MIN_SAMPLE_RATE),
        }
    }

    pub fn from_selection(selection: &Selection) -> Self {
        Self::new(selection.working_set.clone(), selection.sample_rate)
    }

    /// Same frequencies, regardless of the order they were chosen in
    pub fn same_set(&self, other: &DecoderPlan) -> bool {
        self.frequencies == other.frequencies
    }

    pub fn khz(&self) -> Vec<u64> {
        self.frequencies.iter().map(|f| hz_to_khz(*f)).collect()
    }
}

/// Arguments after the program name
pub fn build_args(plan: &DecoderPlan, config: &DecoderConfig) -> Vec<String> {
    let mut args = vec!["--sample-rate".to_string(), plan.sample_rate.to_string()];

    for (name, value) in &config.passthrough {
        args.push(format!("--{}", name.trim_start_matches('-')));
        args.push(value.clone());
    }

    args.push("--output".to_string());
    args.push(STDOUT_OUTPUT.to_string());

    if let Some(dir) = &config.packet_log_dir {
        args.push("--output".to_string());
        args.push(format!(
            "decoded:json:file:path={}/hfdl.json.log,rotate=daily",
            dir.display()
        ));
    }

    for output in &config.outputs {
        args.push("--output".to_string());
        args.push(output.clone());
    }

    args.extend(plan.khz().into_iter().map(|k| k.to_string()));
    args
}

/// Ready-to-spawn decoder process with stdout and stderr piped
pub fn build_command(plan: &DecoderPlan, config: &DecoderConfig) -> Command {
    let mut command = Command::new(&config.program);
    command
        .args(build_args(plan, config))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Shell-style rendering for logs
pub fn describe(plan: &DecoderPlan, config: &DecoderConfig) -> String {
    let mut parts = vec![config.program.clone()];
    parts.extend(build_args(plan, config));
    parts.join(" ")
}
