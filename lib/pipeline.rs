//! Named-step pipeline executor.
//!
//! Steps run strictly in registration order over one shared [`BuildContext`].
//! The first failing step stops the run; its error comes back wrapped in
//! [`BuildError::StepFailed`] carrying the registered step name.

use crate::assemble::StagedBundle;
use crate::catalog::BuildCatalog;
use crate::config::{BuildSettings, BundleConfiguration, Extension};
use crate::error::{BuildError, BuildResult};
use crate::http::HttpClient;
use crate::pack::ArchiveResult;
use crate::runner::CommandRunner;
use std::sync::Arc;
use std::time::{Duration, Instant};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Everything a step can read or produce.
pub struct BuildContext {
    /// Directory layout and environment switches.
    pub settings: BuildSettings,

    /// Bundle identity and policy.
    pub bundle: BundleConfiguration,

    /// Build matrix for this host.
    pub catalog: BuildCatalog,

    /// External process seam.
    pub runner: Box<dyn CommandRunner>,

    /// HTTP seam.
    pub http: Box<dyn HttpClient>,

    /// Extension list with every version pinned. Filled by `generate-projects`.
    pub resolved_extensions: Vec<Extension>,

    /// Bundles staged so far.
    pub staged_bundles: Vec<StagedBundle>,

    /// Archives written so far, in creation order.
    pub archives: Vec<ArchiveResult>,
}

/// Step body.
pub type StepFn = Box<dyn Fn(&mut BuildContext) -> BuildResult<()>>;

/// A registered step.
pub struct Step {
    name: String,
    run: StepFn,
}

/// Progress event emitted while a pipeline runs.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A step is about to run.
    StepStarted {
        name: String,
        index: usize,
        total: usize,
    },
    /// A step returned successfully.
    StepFinished { name: String, elapsed: Duration },
    /// A step failed; no further steps run.
    StepFailed { name: String, elapsed: Duration },
}

/// Callback type for pipeline events.
pub type EventCallback = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Ordered steps for one target.
pub struct Pipeline {
    target: String,
    steps: Vec<Step>,
    on_event: Option<EventCallback>,
}

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Target that ran.
    pub target: String,

    /// Step names with their durations, in order.
    pub steps: Vec<(String, Duration)>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BuildContext {
    pub fn new(
        settings: BuildSettings,
        bundle: BundleConfiguration,
        catalog: BuildCatalog,
        runner: Box<dyn CommandRunner>,
        http: Box<dyn HttpClient>,
    ) -> Self {
        Self {
            settings,
            bundle,
            catalog,
            runner,
            http,
            resolved_extensions: Vec::new(),
            staged_bundles: Vec::new(),
            archives: Vec::new(),
        }
    }
}

impl Step {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Pipeline {
    /// Empty pipeline for `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            steps: Vec::new(),
            on_event: None,
        }
    }

    /// Append a step.
    pub fn then(
        mut self,
        name: impl Into<String>,
        run: impl Fn(&mut BuildContext) -> BuildResult<()> + 'static,
    ) -> Self {
        self.steps.push(Step {
            name: name.into(),
            run: Box::new(run),
        });
        self
    }

    /// Receive step events.
    pub fn with_events(mut self, on_event: EventCallback) -> Self {
        self.on_event = Some(on_event);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Registered step names, in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// Work done by earlier steps is left in place when a later one fails.
    pub fn run(&self, ctx: &mut BuildContext) -> BuildResult<PipelineReport> {
        let total = self.steps.len();
        let mut report = PipelineReport {
            target: self.target.clone(),
            steps: Vec::with_capacity(total),
        };

        for (index, step) in self.steps.iter().enumerate() {
            self.emit(PipelineEvent::StepStarted {
                name: step.name.clone(),
                index,
                total,
            });
            tracing::info!(target = %self.target, "step {}/{}: {}", index + 1, total, step.name);

            let start = Instant::now();
            let result = (step.run)(ctx);
            let elapsed = start.elapsed();

            if let Err(e) = result {
                self.emit(PipelineEvent::StepFailed {
                    name: step.name.clone(),
                    elapsed,
                });
                tracing::debug!("step {} failed after {:?}", step.name, elapsed);
                return Err(e.in_step(step.name.clone()));
            }

            self.emit(PipelineEvent::StepFinished {
                name: step.name.clone(),
                elapsed,
            });
            report.steps.push((step.name.clone(), elapsed));
        }

        Ok(report)
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref cb) = self.on_event {
            cb(event);
        }
    }
}

impl PipelineReport {
    pub fn total_elapsed(&self) -> Duration {
        self.steps.iter().map(|(_, d)| *d).sum()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("target", &self.target)
            .field("steps", &self.step_names())
            .field("on_event", &self.on_event.is_some())
            .finish()
    }
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("settings", &self.settings)
            .field("bundle", &self.bundle)
            .field("catalog", &self.catalog)
            .field("resolved_extensions", &self.resolved_extensions)
            .field("staged_bundles", &self.staged_bundles)
            .field("archives", &self.archives)
            .finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
