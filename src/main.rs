// gRPC Gen - Main Entry Point
// Orchestrates config loading, staging, syntax checks and generation

mod adapter;
mod cli;
mod compiler;
mod config;
mod error;
mod log;
mod pipeline;
mod precheck;
mod process;
mod staging;
mod watch;
mod which;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;

use cli::{Cli, Commands, GenerateOptions};
use compiler::{CompilerLocator, StaticLocator, ToolLocator};
use error::{GenError, GenResult};
use pipeline::PipelineRunner;
use watch::WatchController;
use which::ToolResolver;

const STARTER_CONFIG: &str = r#"# grpcgen configuration
# Paths are relative to this file.

srcs_dir: protos
srcs:
  - service.proto

# Extra directories copied next to the sources (imports)
includes: []

output:
  js:
    dir: gen/js
    options:
      import_style: commonjs
      binary: true
  grpc-web:
    dir: gen/js
    options:
      import_style: commonjs
      mode: grpcwebtext

protoc: 3.6.1
"#;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    log::set_verbose(cli.verbose);

    let result = match &cli.command {
        None | Some(Commands::Generate) => {
            generate(cli.generate_options(), cli.protoc.as_deref()).await
        }
        Some(Commands::Check) => check(cli.config.as_deref(), cli.protoc.as_deref()).await,
        Some(Commands::Init { dir, force }) => init_config(dir, *force),
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error(&e);
            ExitCode::FAILURE
        }
    }
}

/// The explicit `--protoc` binary, or a lookup on PATH and local tool dirs
fn compiler_locator(protoc: Option<&Path>, resolver: &ToolResolver) -> Arc<dyn CompilerLocator> {
    match protoc {
        Some(path) => Arc::new(StaticLocator::new(path)),
        None => Arc::new(ToolLocator::new(resolver.clone())),
    }
}

fn load_runner(config: Option<&Path>, protoc: Option<&Path>) -> GenResult<PipelineRunner> {
    let cwd = std::env::current_dir()?;
    let resolver = ToolResolver::from_env()?;
    let path = config::discover(config, &cwd)?;

    log::verbose(format!("loading {}", path.display()));
    let config = config::load(&path)?;

    let locator = compiler_locator(protoc, &resolver);
    Ok(PipelineRunner::new(config, locator, resolver))
}

/// Generate every output once, or keep generating in watch mode
async fn generate(options: GenerateOptions, protoc: Option<&Path>) -> GenResult<()> {
    if options.watch {
        let resolver = ToolResolver::from_env()?;
        let mut controller = WatchController::new(
            options.config,
            std::env::current_dir()?,
            compiler_locator(protoc, &resolver),
            resolver,
        );
        if let Some(interval) = options.poll_interval {
            controller = controller.with_poll_interval(interval);
        }

        let stop = controller.stop_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.stop();
            }
        });
        return controller.run().await;
    }

    let runner = load_runner(options.config.as_deref(), protoc)?;
    let config = runner.config();
    log::status(
        "Generating",
        format!(
            "{}: {} source(s) → {} output(s)",
            config.config_path.display(),
            config.srcs.len(),
            config.outputs.len()
        ),
    );
    for output in &config.outputs {
        log::step(format!("{} → {}", output.name, output.dir.display()));
    }

    let summary = runner.run_once().await?;

    println!("{} Generation complete!", "✓".green().bold());
    println!("  Compiler runs: {}", summary.invocations);
    println!("  Build time: {}ms", summary.elapsed.as_millis());

    Ok(())
}

/// Stage and syntax-check the sources without generating
async fn check(config: Option<&Path>, protoc: Option<&Path>) -> GenResult<()> {
    let runner = load_runner(config, protoc)?;
    log::status(
        "Checking",
        format!("{} source(s)", runner.config().srcs.len()),
    );

    runner.check_only().await?;

    println!("{} No syntax errors found!", "✓".green().bold());
    Ok(())
}

/// Write a starter `.grpc-gen.yaml` into `dir`
fn init_config(dir: &Path, force: bool) -> GenResult<()> {
    let existing: Vec<PathBuf> = config::CONFIG_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect();

    if let Some(path) = existing.first() {
        if !force {
            return Err(GenError::config(format!(
                "'{}' already exists (use --force to overwrite)",
                path.display()
            )));
        }
    }

    fs::create_dir_all(dir)?;
    let path = dir.join(config::CONFIG_CANDIDATES[1]);
    fs::write(&path, STARTER_CONFIG)?;

    println!("{} Config initialized!", "✓".green().bold());
    println!("  Created: {}", path.display());
    println!("  ");
    println!("  Next steps:");
    println!("    # List your .proto files under 'srcs' and pick outputs");
    println!("    grpcgen --watch");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starter_config_is_valid() {
        let config = config::parse(
            STARTER_CONFIG,
            config::ConfigFormat::Yaml,
            Path::new("/project/.grpc-gen.yaml"),
        )
        .unwrap();

        assert_eq!(config.srcs, vec!["service.proto"]);
        assert_eq!(config.srcs_dir, PathBuf::from("/project/protos"));
        assert_eq!(config.outputs.len(), 2);
        assert_eq!(config.protoc_version, "3.6.1");
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();
        assert!(dir.path().join(".grpc-gen.yaml").is_file());

        assert!(matches!(init_config(dir.path(), false), Err(GenError::Config { .. })));
        init_config(dir.path(), true).unwrap();
    }
}
