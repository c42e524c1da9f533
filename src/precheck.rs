// gRPC Gen - Syntax Pre-check
// Runs a no-op generation pass and attributes compiler errors to sources

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;

use crate::adapter::dummy::DummyOutputAdapter;
use crate::adapter::{InvocationContext, OutputAdapter};
use crate::compiler::slash_path;
use crate::error::{GenError, GenResult};

static LOCATED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>.+?):(?P<line>\d+):(?P<column>\d+):\s*(?P<message>.*)$")
        .expect("valid diagnostic pattern")
});

/// One line of compiler diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxIssue {
    Located {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },
    /// Line that did not match `file:line:column: message`
    Raw(String),
}

/// Structured view of a failed syntax pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxReport {
    pub issues: Vec<SyntaxIssue>,
    /// Offending sources, relative to the config directory
    pub files: Vec<String>,
}

impl SyntaxReport {
    /// Parse raw compiler stderr.
    ///
    /// Lines are deduplicated by trimmed text, first occurrence wins. Located
    /// issues are attributed to the configured source whose path prefixes
    /// the reported file.
    pub fn parse(stderr: &str, srcs: &[String], srcs_dir: &Path, config_dir: &Path) -> Self {
        let mut report = SyntaxReport::default();
        let mut seen_lines = HashSet::new();
        let mut seen_files = HashSet::new();

        for raw in stderr.lines() {
            // trimmed text is only the dedup key; unmatched lines keep their layout
            let line = raw.trim();
            if line.is_empty() || !seen_lines.insert(line) {
                continue;
            }

            let Some(caps) = LOCATED_LINE.captures(line) else {
                report.issues.push(SyntaxIssue::Raw(raw.to_string()));
                continue;
            };

            let file = caps["file"].to_string();
            if let Some(src) = srcs.iter().find(|src| file.starts_with(src.as_str())) {
                let shown = display_path(&srcs_dir.join(src), config_dir);
                if seen_files.insert(shown.clone()) {
                    report.files.push(shown);
                }
            }

            report.issues.push(SyntaxIssue::Located {
                file,
                line: caps["line"].parse().unwrap_or(0),
                column: caps["column"].parse().unwrap_or(0),
                message: caps["message"].trim().to_string(),
            });
        }

        report
    }

    pub fn format_colored(&self) -> String {
        let mut output = format!(
            "{}: {}\n",
            "error".red().bold(),
            self.headline().white().bold()
        );

        for issue in &self.issues {
            match issue {
                SyntaxIssue::Located {
                    file,
                    line,
                    column,
                    message,
                } => {
                    output.push_str(&format!(
                        "  {} {}:{}:{}\n",
                        "-->".blue().bold(),
                        file,
                        line,
                        column
                    ));
                    output.push_str(&format!("  {} {}\n", "|".blue(), message));
                }
                SyntaxIssue::Raw(text) => {
                    output.push_str(&format!("  {}\n", text));
                }
            }
        }

        output
    }

    fn headline(&self) -> String {
        if self.files.is_empty() {
            "syntax check failed".to_string()
        } else {
            format!("syntax errors in {}", self.files.join(", "))
        }
    }
}

impl fmt::Display for SyntaxReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.headline())?;
        for issue in &self.issues {
            match issue {
                SyntaxIssue::Located {
                    file,
                    line,
                    column,
                    message,
                } => write!(f, "\n{}:{}:{}: {}", file, line, column, message)?,
                SyntaxIssue::Raw(text) => write!(f, "\n{}", text)?,
            }
        }
        Ok(())
    }
}

fn display_path(path: &Path, base: &Path) -> String {
    let relative: PathBuf = pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf());
    slash_path(&relative)
}

/// Run the syntax pass over every source.
///
/// `srcs_dir` is the project's source directory (not the staged copy) and
/// is only used to name offending files. Compiler failures become
/// `GenError::Syntax`; anything else passes through untouched.
pub async fn check(
    context: InvocationContext,
    plugin: PathBuf,
    srcs_dir: &Path,
    config_dir: &Path,
) -> GenResult<()> {
    let srcs = context.srcs.clone();
    let adapter = DummyOutputAdapter::new(context, plugin);

    match adapter.run().await {
        Err(GenError::Process { stderr, .. }) => Err(GenError::Syntax(SyntaxReport::parse(
            &stderr, &srcs, srcs_dir, config_dir,
        ))),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn srcs() -> Vec<String> {
        vec!["foo.proto".to_string(), "api/bar.proto".to_string()]
    }

    #[test]
    fn test_located_line_is_attributed() {
        let stderr = "foo.proto:3:5: message Bar has no fields\nfoo.proto:3:5: message Bar has no fields\n";
        let report = SyntaxReport::parse(stderr, &srcs(), Path::new("/p/protos"), Path::new("/p"));

        assert_eq!(
            report.issues,
            vec![SyntaxIssue::Located {
                file: "foo.proto".to_string(),
                line: 3,
                column: 5,
                message: "message Bar has no fields".to_string(),
            }]
        );
        assert_eq!(report.files, vec!["protos/foo.proto"]);
    }

    #[test]
    fn test_unmatched_lines_pass_through() {
        let stderr = "api/bar.proto:10:1: Expected \";\".\napi/bar.proto: warning: Import unused.\n\n";
        let report = SyntaxReport::parse(stderr, &srcs(), Path::new("/p"), Path::new("/p"));

        assert_eq!(report.issues.len(), 2);
        assert_eq!(
            report.issues[1],
            SyntaxIssue::Raw("api/bar.proto: warning: Import unused.".to_string())
        );
        assert_eq!(report.files, vec!["api/bar.proto"]);
    }

    #[test]
    fn test_first_occurrence_order_is_kept() {
        let stderr = "api/bar.proto:1:1: b\nfoo.proto:2:2: a\napi/bar.proto:1:1: b\n";
        let report = SyntaxReport::parse(stderr, &srcs(), Path::new("/p"), Path::new("/p"));

        assert_eq!(report.files, vec!["api/bar.proto", "foo.proto"]);
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn test_raw_lines_keep_indentation() {
        let stderr = "foo.proto: In message Bar:\n    field 'id' already defined\n  field 'id' already defined\n";
        let report = SyntaxReport::parse(stderr, &srcs(), Path::new("/p"), Path::new("/p"));

        // the second indented copy differs only in whitespace and is dropped
        assert_eq!(
            report.issues,
            vec![
                SyntaxIssue::Raw("foo.proto: In message Bar:".to_string()),
                SyntaxIssue::Raw("    field 'id' already defined".to_string()),
            ]
        );
    }

    #[test]
    fn test_display_lists_issues() {
        let report = SyntaxReport::parse("foo.proto:3:5: bad\n", &srcs(), Path::new("/p"), Path::new("/p"));
        assert_eq!(report.to_string(), "syntax errors in foo.proto\nfoo.proto:3:5: bad");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_turns_process_failure_into_report() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let compiler = dir.path().join("fake-protoc");
        std::fs::write(
            &compiler,
            "#!/bin/sh\necho 'foo.proto:3:5: message Bar has no fields' >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&compiler, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut ctx = crate::adapter::testing::context("dummy");
        ctx.compiler = compiler;
        ctx.srcs = srcs();
        ctx.srcs_dir = dir.path().to_path_buf();

        let result = check(ctx, dir.path().join("plugin"), dir.path(), dir.path()).await;
        match result {
            Err(GenError::Syntax(report)) => assert_eq!(report.files, vec!["foo.proto"]),
            other => panic!("Expected syntax report, got {:?}", other),
        }
    }
}
