// gRPC Gen - Process Runner
// Spawns external tools and collects their output

use std::path::Path;
use std::process::Stdio;

use colored::Colorize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::error::{GenError, GenResult};
use crate::log;

/// How a child process should be run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions<'a> {
    /// Working directory for the child, the caller's when unset
    pub cwd: Option<&'a Path>,
}

impl<'a> RunOptions<'a> {
    pub fn in_dir(cwd: &'a Path) -> Self {
        Self { cwd: Some(cwd) }
    }
}

/// Run `program` with `args`, resolving with its stdout on exit code 0.
///
/// Stdout and stderr are always piped. Any other outcome becomes a
/// `GenError::Process` carrying the captured stderr. In verbose mode the
/// command line is echoed and stdout is forwarded live while still being
/// captured.
pub async fn run(program: &Path, args: &[String], options: RunOptions<'_>) -> GenResult<String> {
    let program_name = program.display().to_string();

    if log::is_verbose() {
        println!("{} {} {}", "[SPAWN]".blue(), program_name, args.join(" "));
    }

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = options.cwd {
        command.current_dir(cwd);
    }

    let mut child = command
        .spawn()
        .map_err(|e| GenError::process(&program_name, None, format!("failed to spawn: {}", e)))?;

    // Both pipes are drained together so a chatty stderr cannot block stdout
    let forward = log::is_verbose();
    let (stdout, stderr) = tokio::join!(
        drain(child.stdout.take(), forward),
        drain(child.stderr.take(), false)
    );
    let stdout = stdout?;
    let stderr = stderr?;

    let status = child.wait().await?;

    if status.code() == Some(0) {
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    } else {
        Err(GenError::process(
            program_name,
            status.code(),
            String::from_utf8_lossy(&stderr).into_owned(),
        ))
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>, forward: bool) -> GenResult<Vec<u8>> {
    let mut collected = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(collected);
    };

    let mut chunk = [0u8; 8192];
    let mut out = tokio::io::stdout();
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&chunk[..n]);
        if forward {
            out.write_all(&chunk[..n]).await?;
            out.flush().await?;
        }
    }

    Ok(collected)
}
