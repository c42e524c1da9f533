// gRPC Gen - Error Types
// Structured errors for configuration, tool lookup, process and syntax failures

use colored::Colorize;
use thiserror::Error;

use crate::precheck::SyntaxReport;

/// Main error type for every orchestration step
#[derive(Error, Debug)]
pub enum GenError {
    #[error("Config error: {message}")]
    Config { message: String },

    #[error("Could not find '{tool}' in your PATH or local tool directories")]
    NotFound { tool: String },

    #[error("'{program}' failed ({}): {stderr}", describe_exit(.code))]
    Process {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{0}")]
    Syntax(SyntaxReport),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multiple errors occurred")]
    Multiple(Vec<GenError>),
}

impl GenError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        GenError::Config {
            message: message.into(),
        }
    }

    /// Create a tool lookup error
    pub fn not_found(tool: impl Into<String>) -> Self {
        GenError::NotFound { tool: tool.into() }
    }

    /// Create a process failure carrying the child's stderr
    pub fn process(program: impl Into<String>, code: Option<i32>, stderr: impl Into<String>) -> Self {
        GenError::Process {
            program: program.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Fold a batch of errors into a single result.
    ///
    /// No errors is success, one error is returned as-is, more become `Multiple`.
    pub fn collect(mut errors: Vec<GenError>) -> GenResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(GenError::Multiple(errors)),
        }
    }

    /// Format error for terminal output with colors
    pub fn format_colored(&self) -> String {
        match self {
            GenError::Config { message } => {
                format!(
                    "{}: {}\n",
                    "config error".red().bold(),
                    message.white().bold()
                )
            }
            GenError::NotFound { tool } => {
                let mut output = format!(
                    "{}: could not find '{}'\n",
                    "error".red().bold(),
                    tool.white().bold()
                );
                output.push_str(&format!(
                    "  {} install it on your PATH or under node_modules/.bin\n",
                    "hint:".cyan().bold()
                ));
                output
            }
            GenError::Process {
                program,
                code,
                stderr,
            } => {
                let mut output = format!(
                    "{}: {} ({})\n",
                    "error".red().bold(),
                    program.white().bold(),
                    describe_exit(code)
                );
                for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                    output.push_str(&format!("  {} {}\n", "|".blue(), line));
                }
                output
            }
            GenError::Syntax(report) => report.format_colored(),
            GenError::Watch(e) => {
                format!(
                    "{}: {}\n",
                    "watch error".red().bold(),
                    e.to_string().white()
                )
            }
            GenError::Io(e) => {
                format!(
                    "{}: {}\n",
                    "io error".red().bold(),
                    e.to_string().white()
                )
            }
            GenError::Multiple(errors) => {
                let mut output = String::new();
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        output.push('\n');
                    }
                    output.push_str(&err.format_colored());
                }
                output.push_str(&format!(
                    "\n{}: {} errors generated\n",
                    "error".red().bold(),
                    errors.len()
                ));
                output
            }
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Result type for orchestration operations
pub type GenResult<T> = Result<T, GenError>;

/// Non-fatal diagnostic
#[derive(Debug, Clone)]
pub struct Warning {
    pub message: String,
    pub hint: Option<String>,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn format_colored(&self) -> String {
        let mut output = format!(
            "{}: {}\n",
            "warning".yellow().bold(),
            self.message.white()
        );

        if let Some(h) = &self.hint {
            output.push_str(&format!(
                "  {} {}\n",
                "hint:".cyan().bold(),
                h
            ));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_empty_is_ok() {
        assert!(GenError::collect(Vec::new()).is_ok());
    }

    #[test]
    fn test_collect_single_error_is_unwrapped() {
        let result = GenError::collect(vec![GenError::not_found("protoc-gen-ts")]);
        match result {
            Err(GenError::NotFound { tool }) => assert_eq!(tool, "protoc-gen-ts"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_collect_many_errors() {
        let result = GenError::collect(vec![
            GenError::config("bad"),
            GenError::process("protoc", Some(1), "boom"),
        ]);
        match result {
            Err(GenError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("Expected Multiple, got {:?}", other),
        }
    }

    #[test]
    fn test_process_error_message() {
        let err = GenError::process("protoc", Some(2), "no such file");
        assert_eq!(err.to_string(), "'protoc' failed (exit code 2): no such file");

        let err = GenError::process("protoc", None, "");
        assert!(err.to_string().contains("terminated by signal"));
    }
}
