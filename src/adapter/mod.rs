// gRPC Gen - Output Adapters
// Trait-based translation of configured outputs into protoc invocations

pub mod dummy;
pub mod grpc_web;
pub mod js;
pub mod passthrough;
pub mod registry;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::compiler::slash_path;
use crate::config::OutputOptions;
use crate::error::{GenResult, Warning};
use crate::log;
use crate::process::{self, RunOptions};
use crate::which::ToolResolver;

/// Output kinds protoc generates without an external plugin
pub const BUILT_IN_OUTPUTS: &[&str] = &[
    "cpp", "csharp", "java", "javanano", "objc", "php", "python", "ruby", "js",
    // grpcgen's own syntax pass
    "dummy",
];

pub fn is_built_in(kind: &str) -> bool {
    BUILT_IN_OUTPUTS.contains(&kind)
}

/// Plugin executable protoc looks for when given `--<kind>_out`
pub fn default_plugin_name(kind: &str) -> String {
    format!("protoc-gen-{}", kind)
}

/// Everything an adapter needs to call the compiler
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub compiler: PathBuf,
    pub compiler_version: String,
    /// Output kind, used in `--<kind>_out`
    pub output_name: String,
    /// Output directory relative to `srcs_dir`, forward slashes
    pub output_path: String,
    pub srcs: Vec<String>,
    /// Working directory for every invocation
    pub srcs_dir: PathBuf,
    pub plugin_name: String,
    pub custom: bool,
    pub resolver: ToolResolver,
    /// Shared count of compiler invocations for the current run
    pub invocations: Arc<AtomicUsize>,
}

/// Express `dir` relative to the invocation working directory.
///
/// Falls back to the absolute path when no relative form exists (different
/// drive on Windows).
pub fn relative_output_path(dir: &Path, cwd: &Path) -> String {
    match pathdiff::diff_paths(dir, cwd) {
        Some(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Some(rel) => slash_path(&rel),
        None => slash_path(dir),
    }
}

/// Extra `--<name>_out=<value>` directive sent with the same invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionRequest {
    pub name: String,
    pub value: String,
}

/// Builds compiler argument lists and runs the compiler.
///
/// Every adapter owns one; the plugin path is resolved at most once.
#[derive(Debug)]
pub struct CompilerInvoker {
    context: InvocationContext,
    additions: Vec<AdditionRequest>,
    plugin_path: OnceCell<PathBuf>,
}

impl CompilerInvoker {
    pub fn new(context: InvocationContext) -> Self {
        Self {
            context,
            additions: Vec::new(),
            plugin_path: OnceCell::new(),
        }
    }

    /// Use `path` as the plugin for this output instead of resolving one
    pub fn with_plugin_path(context: InvocationContext, path: PathBuf) -> Self {
        Self {
            context,
            additions: Vec::new(),
            plugin_path: OnceCell::new_with(Some(path)),
        }
    }

    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    /// Queue another output directive for the same compiler run
    pub fn add_output(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.additions.push(AdditionRequest {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Full argument list for one invocation over `srcs`
    pub async fn build_args(&self, options: &str, srcs: &[String]) -> GenResult<Vec<String>> {
        let ctx = &self.context;
        let kind = &ctx.output_name;
        let mut args = vec![format!("--{}_out={}", kind, options)];

        if let Some(path) = self.plugin_path.get() {
            args.push(plugin_flag(kind, path));
        } else if !is_built_in(kind) {
            // protoc would look the plugin up itself; resolving here gives a
            // clearer error when it is missing
            let path = self
                .plugin_path
                .get_or_try_init(|| ctx.resolver.resolve_async(&ctx.plugin_name))
                .await?;
            args.push(plugin_flag(kind, path));
        } else if ctx.plugin_name != default_plugin_name(kind) {
            log::warning(&Warning::new(format!(
                "ignoring plugin value '{}' for built in output '{}'",
                ctx.plugin_name, kind
            )));
        }

        for addition in &self.additions {
            args.push(format!("--{}_out={}", addition.name, addition.value));
        }

        args.extend(srcs.iter().cloned());
        Ok(args)
    }

    /// Run the compiler once over `srcs` inside the staged sources directory
    pub async fn invoke(&self, options: &str, srcs: &[String]) -> GenResult<String> {
        let args = self.build_args(options, srcs).await?;
        log::verbose(format!(
            "{} via protoc {}",
            self.context.output_name, self.context.compiler_version
        ));
        self.context.invocations.fetch_add(1, Ordering::Relaxed);
        process::run(
            &self.context.compiler,
            &args,
            RunOptions::in_dir(&self.context.srcs_dir),
        )
        .await
    }

    /// Invoke over every configured source
    pub async fn invoke_all(&self, options: &str) -> GenResult<String> {
        self.invoke(options, &self.context.srcs).await
    }
}

fn plugin_flag(kind: &str, path: &Path) -> String {
    format!("--plugin={}={}", default_plugin_name(kind), slash_path(path))
}

/// Render options as `key=value` fragments, in config order
pub fn render_options(options: &OutputOptions) -> Vec<String> {
    options
        .iter()
        .filter_map(|(key, value)| value.render(key))
        .collect()
}

/// Join option fragments and the output directory into protoc's
/// `opt,opt:dir` grammar
pub fn option_string(parts: &[String], dir: &str) -> String {
    if parts.is_empty() {
        dir.to_string()
    } else {
        format!("{}:{}", parts.join(","), dir)
    }
}

/// Capability shared by every output kind
#[async_trait]
pub trait OutputAdapter: Send + Sync {
    /// Validate and store kind-specific options
    fn parse_options(&mut self, options: &OutputOptions) -> GenResult<()>;

    /// Run the compiler for this output
    async fn run(&self) -> GenResult<()>;

    /// Output kind this adapter serves
    fn name(&self) -> &str;
}

/// Constructor registered for an output kind
pub type AdapterFactory = fn(CompilerInvoker) -> Box<dyn OutputAdapter>;

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Context pointing at a compiler path that is never spawned
    pub fn context(kind: &str) -> InvocationContext {
        InvocationContext {
            compiler: PathBuf::from("protoc"),
            compiler_version: "3.6.1".to_string(),
            output_name: kind.to_string(),
            output_path: "out/".to_string(),
            srcs: vec!["a.proto".to_string(), "b.proto".to_string()],
            srcs_dir: PathBuf::from("."),
            plugin_name: default_plugin_name(kind),
            custom: false,
            resolver: ToolResolver::new(None, "/"),
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A fake `protoc` that appends its arguments to `log` and exits 0
    #[cfg(unix)]
    pub fn logging_compiler(dir: &Path, log: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-protoc");
        let body = format!("#!/bin/sh\necho \"$@\" >> '{}'\n", log.display());
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}
