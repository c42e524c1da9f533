// gRPC Gen - Compiler Location
// Finds the protoc executable used for a pipeline run

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{GenError, GenResult, Warning};
use crate::log;
use crate::process::{self, RunOptions};
use crate::which::ToolResolver;

/// Environment variable that pins the compiler executable
pub const PROTOC_ENV: &str = "GRPCGEN_PROTOC";

/// A located protocol-buffer compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiler {
    pub path: PathBuf,
    /// The version the config asked for
    pub version: String,
}

impl Compiler {
    pub fn new(path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
        }
    }

    /// Well-known `.proto` includes shipped next to the compiler
    /// (`<release>/bin/protoc` → `<release>/include`)
    pub fn include_dir(&self) -> Option<PathBuf> {
        let dir = self.path.parent()?.parent()?.join("include");
        dir.is_dir().then_some(dir)
    }
}

/// Supplies a working compiler for a requested version
#[async_trait]
pub trait CompilerLocator: Send + Sync {
    async fn locate(&self, version: &str) -> GenResult<Compiler>;
}

/// Always hands out the same executable
#[derive(Debug, Clone)]
pub struct StaticLocator {
    path: PathBuf,
}

impl StaticLocator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CompilerLocator for StaticLocator {
    async fn locate(&self, version: &str) -> GenResult<Compiler> {
        if !self.path.is_file() {
            return Err(GenError::config(format!(
                "Compiler '{}' does not exist",
                self.path.display()
            )));
        }
        Ok(Compiler::new(&self.path, version))
    }
}

/// Uses `$GRPCGEN_PROTOC` when set, otherwise resolves `protoc` as a tool
#[derive(Debug, Clone)]
pub struct ToolLocator {
    resolver: ToolResolver,
}

impl ToolLocator {
    pub fn new(resolver: ToolResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl CompilerLocator for ToolLocator {
    async fn locate(&self, version: &str) -> GenResult<Compiler> {
        let compiler = match std::env::var_os(PROTOC_ENV) {
            Some(path) => StaticLocator::new(path).locate(version).await?,
            None => Compiler::new(self.resolver.resolve_async("protoc").await?, version),
        };

        check_version(&compiler).await;
        Ok(compiler)
    }
}

/// Warn when the installed compiler does not report the configured version
async fn check_version(compiler: &Compiler) {
    let reported = process::run(&compiler.path, &["--version".to_string()], RunOptions::default()).await;

    match reported {
        Ok(text) if !reports_version(&text, &compiler.version) => {
            log::warning(&Warning::with_hint(
                format!(
                    "'{}' reports '{}', config asks for {}",
                    compiler.path.display(),
                    text.trim(),
                    compiler.version
                ),
                format!("set {} to pick a specific compiler", PROTOC_ENV),
            ));
        }
        Ok(_) => {}
        Err(e) => log::verbose(format!("could not query compiler version: {}", e)),
    }
}

fn reports_version(output: &str, version: &str) -> bool {
    output
        .split_whitespace()
        .any(|word| word.trim_start_matches('v') == version)
}

/// Render a path for compiler arguments: forward slashes on every host
pub fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
