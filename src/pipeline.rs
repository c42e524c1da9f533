// gRPC Gen - Generation Pipeline
// Staging → syntax pre-check → concurrent generation → cleanup

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::adapter::registry::AdapterRegistry;
use crate::adapter::{InvocationContext, OutputAdapter, relative_output_path};
use crate::compiler::{Compiler, CompilerLocator, slash_path};
use crate::config::GenerationConfig;
use crate::error::{GenError, GenResult};
use crate::log;
use crate::precheck;
use crate::staging::Stage;
use crate::which::ToolResolver;

/// Steps of a single run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Staging,
    PreCheck,
    Generating,
    Cleanup,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Staging => write!(f, "staging"),
            PipelineStage::PreCheck => write!(f, "pre-check"),
            PipelineStage::Generating => write!(f, "generating"),
            PipelineStage::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Outputs generated (zero for a check-only run)
    pub outputs: usize,
    /// Compiler invocations, including the syntax pass
    pub invocations: usize,
    pub elapsed: Duration,
}

/// Owns one config snapshot and everything needed to run it
pub struct PipelineRunner {
    config: GenerationConfig,
    locator: Arc<dyn CompilerLocator>,
    registry: AdapterRegistry,
    resolver: ToolResolver,
    /// Where scratch directories are created
    scratch_parent: PathBuf,
}

impl PipelineRunner {
    pub fn new(config: GenerationConfig, locator: Arc<dyn CompilerLocator>, resolver: ToolResolver) -> Self {
        Self {
            config,
            locator,
            registry: AdapterRegistry::with_defaults(),
            resolver,
            scratch_parent: std::env::temp_dir(),
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Stage, pre-check and generate every configured output
    pub async fn run_once(&self) -> GenResult<RunSummary> {
        self.execute(true).await
    }

    /// Stage and pre-check only
    pub async fn check_only(&self) -> GenResult<RunSummary> {
        self.execute(false).await
    }

    async fn execute(&self, generate: bool) -> GenResult<RunSummary> {
        let started = Instant::now();
        let compiler = self.locator.locate(&self.config.protoc_version).await?;
        log::verbose(format!(
            "using {} (protoc {})",
            compiler.path.display(),
            compiler.version
        ));

        log::verbose(PipelineStage::Staging);
        let stage = Stage::prepare(&self.config, &compiler, &self.scratch_parent).await?;
        let invocations = Arc::new(AtomicUsize::new(0));

        let result = self
            .run_staged(&stage, &compiler, &invocations, generate)
            .await;

        log::verbose(PipelineStage::Cleanup);
        stage.cleanup();

        let outputs = result?;
        Ok(RunSummary {
            outputs,
            invocations: invocations.load(Ordering::Relaxed),
            elapsed: started.elapsed(),
        })
    }

    async fn run_staged(
        &self,
        stage: &Stage,
        compiler: &Compiler,
        invocations: &Arc<AtomicUsize>,
        generate: bool,
    ) -> GenResult<usize> {
        let root = stage.root();
        let base = InvocationContext {
            compiler: compiler.path.clone(),
            compiler_version: compiler.version.clone(),
            output_name: String::new(),
            output_path: String::new(),
            srcs: self.config.srcs.clone(),
            srcs_dir: root.clone(),
            plugin_name: String::new(),
            custom: false,
            resolver: self.resolver.clone(),
            invocations: invocations.clone(),
        };

        // Syntax errors stop the run before any real output is touched
        log::verbose(PipelineStage::PreCheck);
        let mut dummy = base.clone();
        dummy.output_path = slash_path(&stage.dummy_out());
        let plugin = stage.write_dummy_plugin()?;
        precheck::check(dummy, plugin, &self.config.srcs_dir, &self.config.config_dir).await?;

        if !generate {
            return Ok(0);
        }

        log::verbose(PipelineStage::Generating);
        let mut adapters: Vec<Box<dyn OutputAdapter>> = Vec::new();
        let mut errors = Vec::new();

        for output in &self.config.outputs {
            ensure_output_dirs(&output.dir, &self.config.srcs).await?;
            // Both sides canonical: protoc resolves `..` physically
            let dir = tokio::fs::canonicalize(&output.dir).await?;

            let mut context = base.clone();
            context.output_name = output.name.clone();
            context.output_path = relative_output_path(&dir, &root);
            context.plugin_name = output.plugin.clone();
            context.custom = output.custom;

            match self.registry.resolve(context, Some(&output.options)) {
                Ok(adapter) => {
                    log::verbose(format!("{} uses the {} adapter", output.name, adapter.name()));
                    adapters.push(adapter);
                }
                Err(e) => errors.push(e),
            }
        }

        // Bad options are reported before any compiler runs
        GenError::collect(errors)?;

        let results = join_all(adapters.iter().map(|adapter| adapter.run())).await;
        let errors: Vec<GenError> = results.into_iter().filter_map(Result::err).collect();
        GenError::collect(errors)?;

        Ok(adapters.len())
    }
}

/// Create the output directory plus one subdirectory per nested source
async fn ensure_output_dirs(dir: &Path, srcs: &[String]) -> GenResult<()> {
    let nested: BTreeSet<PathBuf> = srcs
        .iter()
        .filter_map(|src| Path::new(src).parent())
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(|parent| dir.join(parent))
        .collect();

    tokio::fs::create_dir_all(dir).await?;
    for sub in nested {
        tokio::fs::create_dir_all(sub).await?;
    }
    Ok(())
}
