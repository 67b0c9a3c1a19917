use crate::utils::{format_size_mb, parse_size_mb};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use strum::{Display, EnumString};

/// Execution universe understood by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Universe {
    Vanilla,
    Local,
    Scheduler,
    Docker,
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum WhenToTransfer {
    OnExit,
    OnExitOrEvict,
}

/// A typed submit description for an HTCondor-style scheduler.
///
/// Requirement clauses are kept as a list and rendered AND-merged, so a
/// later clause narrows eligibility instead of silently replacing an
/// earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Identifying label for the batch of jobs
    #[serde(default = "default_batch_name")]
    pub batch_name: String,
    #[serde(default = "default_universe")]
    pub universe: Universe,
    /// Eligibility clauses over the execution target's advertised capabilities
    #[serde(default = "default_requirements")]
    pub requirements: Vec<String>,
    #[serde(default = "default_executable")]
    pub executable: String,
    #[serde(default = "default_arguments")]
    pub arguments: Option<String>,
    /// Input files staged into the execution sandbox before running
    #[serde(default = "default_transfer_input_files")]
    pub transfer_input_files: Vec<PathBuf>,
    #[serde(default = "default_true")]
    pub should_transfer_files: bool,
    #[serde(default = "default_when_to_transfer")]
    pub when_to_transfer_output: WhenToTransfer,
    /// Stream stdout/stderr instead of buffering until exit
    #[serde(default = "default_true")]
    pub stream_output: bool,
    #[serde(default = "default_true")]
    pub stream_error: bool,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_error")]
    pub error: String,
    #[serde(default = "default_log")]
    pub log: String,
    #[serde(default = "default_cpus")]
    pub request_cpus: u32,
    #[serde(default = "default_memory_mb")]
    pub request_memory_mb: u64,
    #[serde(default = "default_disk_mb")]
    pub request_disk_mb: u64,
    #[serde(default = "default_gpus")]
    pub request_gpus: u32,
    /// Scheduler hint: expected job length classification
    #[serde(default = "default_duration_category")]
    pub duration_category: Option<String>,
    /// Opt-in to overflow capacity pools
    #[serde(default = "default_true")]
    pub want_flocking: bool,
    #[serde(default = "default_true")]
    pub want_glidein: bool,
    /// Scheduler-internal `+Attr` lines we do not interpret, kept verbatim
    #[serde(default)]
    pub custom_attrs: BTreeMap<String, String>,
    /// How many instances of this job to schedule
    #[serde(default = "default_queue")]
    pub queue: u32,
}

fn default_batch_name() -> String {
    "block-distill".to_string()
}

fn default_universe() -> Universe {
    Universe::Vanilla
}

fn default_requirements() -> Vec<String> {
    vec![
        "(HasCHTCStaging == true)".to_string(),
        "(CUDADriverVersion >= 11.0)".to_string(),
    ]
}

fn default_executable() -> String {
    "gridrun".to_string()
}

fn default_arguments() -> Option<String> {
    Some("run".to_string())
}

fn default_transfer_input_files() -> Vec<PathBuf> {
    [
        "main.py",
        "train.py",
        "models.py",
        "loss.py",
        "datasets.py",
        "environment.yml",
        "dataset.tar.gz",
        "gridrun.toml",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

fn default_true() -> bool {
    true
}

fn default_when_to_transfer() -> WhenToTransfer {
    WhenToTransfer::OnExit
}

fn default_output() -> String {
    "job_$(Cluster)_$(Process).out".to_string()
}

fn default_error() -> String {
    "job_$(Cluster)_$(Process).err".to_string()
}

fn default_log() -> String {
    "job_$(Cluster).log".to_string()
}

fn default_cpus() -> u32 {
    4
}

fn default_memory_mb() -> u64 {
    16 * 1024
}

fn default_disk_mb() -> u64 {
    40 * 1024
}

fn default_gpus() -> u32 {
    1
}

fn default_duration_category() -> Option<String> {
    Some("Long".to_string())
}

fn default_queue() -> u32 {
    1
}

/// Defaults reproduce the shipped submit description.
impl Default for Descriptor {
    fn default() -> Self {
        Self {
            batch_name: default_batch_name(),
            universe: default_universe(),
            requirements: default_requirements(),
            executable: default_executable(),
            arguments: default_arguments(),
            transfer_input_files: default_transfer_input_files(),
            should_transfer_files: true,
            when_to_transfer_output: default_when_to_transfer(),
            stream_output: true,
            stream_error: true,
            output: default_output(),
            error: default_error(),
            log: default_log(),
            request_cpus: default_cpus(),
            request_memory_mb: default_memory_mb(),
            request_disk_mb: default_disk_mb(),
            request_gpus: default_gpus(),
            duration_category: default_duration_category(),
            want_flocking: true,
            want_glidein: true,
            custom_attrs: BTreeMap::new(),
            queue: default_queue(),
        }
    }
}

#[derive(Default)]
pub struct DescriptorBuilder {
    inner: Descriptor,
}

impl DescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_name(mut self, batch_name: impl Into<String>) -> Self {
        self.inner.batch_name = batch_name.into();
        self
    }

    pub fn universe(mut self, universe: Universe) -> Self {
        self.inner.universe = universe;
        self
    }

    /// Replace all requirement clauses.
    pub fn requirements(mut self, requirements: Vec<String>) -> Self {
        self.inner.requirements = requirements;
        self
    }

    /// Append one requirement clause; it narrows eligibility (AND).
    pub fn requirement(mut self, clause: impl Into<String>) -> Self {
        self.inner.requirements.push(clause.into());
        self
    }

    pub fn executable(mut self, executable: impl Into<String>) -> Self {
        self.inner.executable = executable.into();
        self
    }

    pub fn arguments(mut self, arguments: impl Into<String>) -> Self {
        self.inner.arguments = Some(arguments.into());
        self
    }

    pub fn transfer_input_files(mut self, files: Vec<PathBuf>) -> Self {
        self.inner.transfer_input_files = files;
        self
    }

    pub fn request_cpus(mut self, cpus: u32) -> Self {
        self.inner.request_cpus = cpus;
        self
    }

    pub fn request_memory_mb(mut self, memory_mb: u64) -> Self {
        self.inner.request_memory_mb = memory_mb;
        self
    }

    pub fn request_disk_mb(mut self, disk_mb: u64) -> Self {
        self.inner.request_disk_mb = disk_mb;
        self
    }

    pub fn request_gpus(mut self, gpus: u32) -> Self {
        self.inner.request_gpus = gpus;
        self
    }

    pub fn duration_category(mut self, category: impl Into<String>) -> Self {
        self.inner.duration_category = Some(category.into());
        self
    }

    pub fn queue(mut self, queue: u32) -> Self {
        self.inner.queue = queue;
        self
    }

    pub fn build(self) -> Descriptor {
        self.inner
    }
}

impl Descriptor {
    pub fn builder() -> DescriptorBuilder {
        DescriptorBuilder::new()
    }

    /// Baseline for parsing: nothing requested, nothing transferred.
    fn empty() -> Self {
        Self {
            batch_name: String::new(),
            universe: Universe::Vanilla,
            requirements: Vec::new(),
            executable: String::new(),
            arguments: None,
            transfer_input_files: Vec::new(),
            should_transfer_files: true,
            when_to_transfer_output: WhenToTransfer::OnExit,
            stream_output: false,
            stream_error: false,
            output: String::new(),
            error: String::new(),
            log: String::new(),
            request_cpus: 1,
            request_memory_mb: 0,
            request_disk_mb: 0,
            request_gpus: 0,
            duration_category: None,
            want_flocking: false,
            want_glidein: false,
            custom_attrs: BTreeMap::new(),
            queue: 1,
        }
    }

    /// All requirement clauses joined with logical AND, or `None` when no
    /// clause is declared.
    pub fn merged_requirements(&self) -> Option<String> {
        if self.requirements.is_empty() {
            return None;
        }
        Some(
            self.requirements
                .iter()
                .map(|clause| parenthesize(clause))
                .collect::<Vec<_>>()
                .join(" && "),
        )
    }

    /// Render the `key = value` submit format, `queue` last.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut line = |text: String| {
            out.push_str(&text);
            out.push('\n');
        };

        if !self.batch_name.is_empty() {
            line(format!("batch_name = {}", self.batch_name));
        }
        line(format!("universe = {}", self.universe));
        if let Some(requirements) = self.merged_requirements() {
            line(format!("requirements = {requirements}"));
        }
        line(format!("executable = {}", self.executable));
        if let Some(arguments) = &self.arguments {
            line(format!("arguments = {arguments}"));
        }
        if !self.transfer_input_files.is_empty() {
            let files: Vec<_> = self
                .transfer_input_files
                .iter()
                .map(|f| f.to_string_lossy().into_owned())
                .collect();
            line(format!("transfer_input_files = {}", files.join(", ")));
        }
        line(format!(
            "should_transfer_files = {}",
            if self.should_transfer_files { "YES" } else { "NO" }
        ));
        line(format!(
            "when_to_transfer_output = {}",
            self.when_to_transfer_output
        ));
        line(format!("stream_output = {}", self.stream_output));
        line(format!("stream_error = {}", self.stream_error));
        if !self.output.is_empty() {
            line(format!("output = {}", self.output));
        }
        if !self.error.is_empty() {
            line(format!("error = {}", self.error));
        }
        if !self.log.is_empty() {
            line(format!("log = {}", self.log));
        }
        line(format!("request_cpus = {}", self.request_cpus));
        if self.request_memory_mb > 0 {
            line(format!(
                "request_memory = {}",
                format_size_mb(self.request_memory_mb)
            ));
        }
        if self.request_disk_mb > 0 {
            line(format!(
                "request_disk = {}",
                format_size_mb(self.request_disk_mb)
            ));
        }
        if self.request_gpus > 0 {
            line(format!("request_gpus = {}", self.request_gpus));
        }
        if let Some(category) = &self.duration_category {
            line(format!("+JobDurationCategory = \"{category}\""));
        }
        line(format!("+WantFlocking = {}", self.want_flocking));
        line(format!("+WantGlideIn = {}", self.want_glidein));
        for (attr, value) in &self.custom_attrs {
            line(format!("+{attr} = {value}"));
        }
        line(String::new());
        line(format!("queue {}", self.queue));
        out
    }

    /// Parse a submit description. Tolerant of comments, blank lines and
    /// key case; duplicate `requirements` keys accumulate (AND) instead of
    /// overwriting each other.
    pub fn parse(input: &str) -> Result<Self> {
        let mut descriptor = Self::empty();
        let mut saw_queue = false;

        for (index, raw) in input.lines().enumerate() {
            let lineno = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let lowered = trimmed.to_ascii_lowercase();
            if lowered == "queue" {
                descriptor.queue = 1;
                saw_queue = true;
                continue;
            }
            if let Some(count) = lowered.strip_prefix("queue ") {
                descriptor.queue = count
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid queue count on line {lineno}"))?;
                saw_queue = true;
                continue;
            }

            let (key, value) = trimmed
                .split_once('=')
                .with_context(|| format!("Line {lineno} is not a `key = value` assignment"))?;
            let key = key.trim();
            let value = value.trim();

            if let Some(attr) = key.strip_prefix('+') {
                match attr.to_ascii_lowercase().as_str() {
                    "jobdurationcategory" => {
                        descriptor.duration_category = Some(unquote(value).to_string());
                    }
                    "wantflocking" => descriptor.want_flocking = parse_bool(value)?,
                    "wantglidein" => descriptor.want_glidein = parse_bool(value)?,
                    _ => {
                        descriptor
                            .custom_attrs
                            .insert(attr.to_string(), value.to_string());
                    }
                }
                continue;
            }

            match key.to_ascii_lowercase().as_str() {
                "batch_name" => descriptor.batch_name = value.to_string(),
                "universe" => {
                    descriptor.universe = value
                        .parse()
                        .map_err(|_| anyhow!("Unknown universe `{value}` on line {lineno}"))?;
                }
                "requirements" => descriptor.requirements.push(value.to_string()),
                "executable" => descriptor.executable = value.to_string(),
                "arguments" => descriptor.arguments = Some(value.to_string()),
                "transfer_input_files" => {
                    descriptor.transfer_input_files = value
                        .split(',')
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .map(PathBuf::from)
                        .collect();
                }
                "should_transfer_files" => descriptor.should_transfer_files = parse_bool(value)?,
                "when_to_transfer_output" => {
                    descriptor.when_to_transfer_output = value.parse().map_err(|_| {
                        anyhow!("Unknown transfer policy `{value}` on line {lineno}")
                    })?;
                }
                "stream_output" => descriptor.stream_output = parse_bool(value)?,
                "stream_error" => descriptor.stream_error = parse_bool(value)?,
                "output" => descriptor.output = value.to_string(),
                "error" => descriptor.error = value.to_string(),
                "log" => descriptor.log = value.to_string(),
                "request_cpus" => {
                    descriptor.request_cpus = value
                        .parse()
                        .with_context(|| format!("Invalid request_cpus on line {lineno}"))?;
                }
                "request_memory" => {
                    descriptor.request_memory_mb = parse_size_mb(value)
                        .with_context(|| format!("Invalid request_memory on line {lineno}"))?;
                }
                "request_disk" => {
                    descriptor.request_disk_mb = parse_size_mb(value)
                        .with_context(|| format!("Invalid request_disk on line {lineno}"))?;
                }
                "request_gpus" => {
                    descriptor.request_gpus = value
                        .parse()
                        .with_context(|| format!("Invalid request_gpus on line {lineno}"))?;
                }
                other => {
                    tracing::warn!(key = other, line = lineno, "ignoring unknown submit command");
                }
            }
        }

        if descriptor.executable.is_empty() {
            bail!("Submit description has no executable");
        }
        if !saw_queue {
            tracing::warn!("no queue statement found; assuming a single instance");
        }
        Ok(descriptor)
    }
}

fn parenthesize(clause: &str) -> String {
    let clause = clause.trim();
    if clause.starts_with('(') && clause.ends_with(')') {
        clause.to_string()
    } else {
        format!("({clause})")
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => bail!("Expected a boolean, got `{other}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_render_merges_requirements_with_and() {
        let rendered = Descriptor::default().render();
        assert!(rendered
            .contains("requirements = (HasCHTCStaging == true) && (CUDADriverVersion >= 11.0)"));
        // one requirements line, both clauses present
        assert_eq!(rendered.matches("requirements =").count(), 1);
    }

    #[test]
    fn render_puts_queue_last() {
        let rendered = Descriptor::default().render();
        assert!(rendered.trim_end().ends_with("queue 1"));
    }

    #[test]
    fn duplicate_requirements_accumulate_on_parse() {
        let submit = "\
executable = gridrun
requirements = (HasCHTCStaging == true)
requirements = (CUDADriverVersion >= 11.0)
queue 1
";
        let descriptor = Descriptor::parse(submit).unwrap();
        assert_eq!(descriptor.requirements.len(), 2);
        assert_eq!(
            descriptor.merged_requirements().unwrap(),
            "(HasCHTCStaging == true) && (CUDADriverVersion >= 11.0)"
        );
    }

    #[test]
    fn render_parse_round_trip() {
        let original = Descriptor::default();
        let parsed = Descriptor::parse(&original.render()).unwrap();

        assert_eq!(parsed.batch_name, original.batch_name);
        assert_eq!(parsed.universe, original.universe);
        assert_eq!(parsed.merged_requirements(), original.merged_requirements());
        assert_eq!(parsed.executable, original.executable);
        assert_eq!(parsed.arguments, original.arguments);
        assert_eq!(parsed.transfer_input_files, original.transfer_input_files);
        assert_eq!(parsed.request_cpus, original.request_cpus);
        assert_eq!(parsed.request_memory_mb, original.request_memory_mb);
        assert_eq!(parsed.request_disk_mb, original.request_disk_mb);
        assert_eq!(parsed.request_gpus, original.request_gpus);
        assert_eq!(parsed.duration_category, original.duration_category);
        assert_eq!(parsed.queue, original.queue);
    }

    #[test]
    fn unknown_plus_attrs_survive_a_round_trip() {
        let submit = "\
executable = gridrun
+ProjectName = \"mixer\"
queue
";
        let descriptor = Descriptor::parse(submit).unwrap();
        assert_eq!(
            descriptor.custom_attrs.get("ProjectName"),
            Some(&"\"mixer\"".to_string())
        );
        assert!(descriptor.render().contains("+ProjectName = \"mixer\""));
    }

    #[test]
    fn parse_tolerates_comments_case_and_bare_queue() {
        let submit = "\
# submit description
Executable = run.sh
UNIVERSE = Vanilla
Should_Transfer_Files = YES
request_memory = 4GB

queue
";
        let descriptor = Descriptor::parse(submit).unwrap();
        assert_eq!(descriptor.executable, "run.sh");
        assert_eq!(descriptor.universe, Universe::Vanilla);
        assert!(descriptor.should_transfer_files);
        assert_eq!(descriptor.request_memory_mb, 4096);
        assert_eq!(descriptor.queue, 1);
    }

    #[test]
    fn parse_requires_an_executable() {
        let err = Descriptor::parse("universe = vanilla\nqueue 1\n").unwrap_err();
        assert!(err.to_string().contains("no executable"));
    }

    #[test]
    fn builder_appends_requirement_clauses() {
        let descriptor = Descriptor::builder()
            .batch_name("smoke")
            .requirements(vec!["(HasCHTCStaging == true)".to_string()])
            .requirement("CUDACapability >= 7.5")
            .request_gpus(2)
            .queue(3)
            .build();

        assert_eq!(
            descriptor.merged_requirements().unwrap(),
            "(HasCHTCStaging == true) && (CUDACapability >= 7.5)"
        );
        assert_eq!(descriptor.request_gpus, 2);
        assert_eq!(descriptor.queue, 3);
    }
}
