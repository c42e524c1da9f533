// gRPC Gen - Staging
// Copies sources and includes into a scratch directory for the compiler

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::compiler::Compiler;
use crate::config::GenerationConfig;
use crate::error::{GenError, GenResult, Warning};
use crate::log;

#[cfg(windows)]
const DUMMY_PLUGIN: (&str, &str) = ("protoc-gen-dummy.cmd", "@echo off\r\nmore > nul\r\n");
#[cfg(not(windows))]
const DUMMY_PLUGIN: (&str, &str) = ("protoc-gen-dummy.sh", "#!/bin/sh\ncat > /dev/null\n");

/// Scratch area for one pipeline run.
///
/// Layout: `srcs/` holds the staged tree the compiler runs in, `bin/` the
/// no-op plugin, `dummy-out/` the sink for the syntax pass. All paths handed
/// out are canonical, so relative paths computed against them hold after the
/// OS resolves symlinks in the temp directory.
#[derive(Debug)]
pub struct Stage {
    dir: TempDir,
    base: PathBuf,
}

impl Stage {
    /// Create a fresh scratch directory under `parent` and copy every input
    /// into it
    pub async fn prepare(config: &GenerationConfig, compiler: &Compiler, parent: &Path) -> GenResult<Self> {
        let config = config.clone();
        let include_dir = compiler.include_dir();
        let parent = parent.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let dir = tempfile::Builder::new().prefix("grpcgen-").tempdir_in(&parent)?;
            let base = dir.path().canonicalize()?;
            let stage = Self { dir, base };

            let root = stage.root();
            fs::create_dir_all(&root)?;
            fs::create_dir_all(stage.dummy_out())?;

            // Includes first so configured sources win on name clashes
            for include in include_dir.iter().chain(config.includes.iter()) {
                copy_tree(include, &root)?;
            }

            for src in &config.srcs {
                let from = config.srcs_dir.join(src);
                let to = root.join(src);
                if !from.is_file() {
                    return Err(GenError::config(format!(
                        "Source '{}' not found in '{}'",
                        src,
                        config.srcs_dir.display()
                    )));
                }
                if let Some(parent) = to.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&from, &to)?;
            }

            log::verbose(format!("staged sources in {}", root.display()));
            Ok(stage)
        })
        .await
        .map_err(|e| GenError::Io(std::io::Error::other(e)))?
    }

    /// Working directory for every compiler invocation
    pub fn root(&self) -> PathBuf {
        self.base.join("srcs")
    }

    /// Output directory for the syntax pass
    pub fn dummy_out(&self) -> PathBuf {
        self.base.join("dummy-out")
    }

    /// Write the no-op plugin used by the syntax pass and return its path
    pub fn write_dummy_plugin(&self) -> GenResult<PathBuf> {
        let (name, body) = DUMMY_PLUGIN;
        let bin = self.base.join("bin");
        fs::create_dir_all(&bin)?;

        let path = bin.join(name);
        fs::write(&path, body)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        }

        Ok(path)
    }

    /// Best-effort removal; failures are reported, never returned
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            log::warning(&Warning::new(format!(
                "could not remove scratch directory '{}': {}",
                path.display(),
                e
            )));
        }
    }
}

/// Copy the contents of `from` into `to`, keeping relative paths
fn copy_tree(from: &Path, to: &Path) -> GenResult<()> {
    if !from.is_dir() {
        return Err(GenError::config(format!(
            "Include directory '{}' does not exist",
            from.display()
        )));
    }

    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| GenError::Io(std::io::Error::other(e)))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| GenError::Io(std::io::Error::other(e)))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
