// gRPC Gen - Tool Resolver
// Finds executables on PATH, then in local node_modules/.bin directories

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GenError, GenResult};

/// Conventional per-project tool directory, checked at every ancestor level
pub const LOCAL_BIN_DIR: &str = "node_modules/.bin";

#[cfg(windows)]
const BIN_EXTS: &[&str] = &["exe", "cmd"];
#[cfg(not(windows))]
const BIN_EXTS: &[&str] = &["", "sh"];

/// Resolves logical tool names to absolute executable paths
#[derive(Debug, Clone)]
pub struct ToolResolver {
    search_path: Option<OsString>,
    start_dir: PathBuf,
}

impl ToolResolver {
    pub fn new(search_path: Option<OsString>, start_dir: impl Into<PathBuf>) -> Self {
        Self {
            search_path,
            start_dir: start_dir.into(),
        }
    }

    /// Resolver over the process PATH, walking up from the current directory
    pub fn from_env() -> GenResult<Self> {
        Ok(Self::new(std::env::var_os("PATH"), std::env::current_dir()?))
    }

    /// Look the tool up on PATH first, then in local tool directories
    pub fn resolve(&self, tool: &str) -> GenResult<PathBuf> {
        if let Some(search_path) = &self.search_path {
            if let Ok(found) = which::which_in(tool, Some(search_path), &self.start_dir) {
                return Ok(found);
            }
        }

        find_local(tool, &self.start_dir).ok_or_else(|| GenError::not_found(tool))
    }

    /// `resolve` on the blocking pool
    pub async fn resolve_async(&self, tool: &str) -> GenResult<PathBuf> {
        let resolver = self.clone();
        let tool = tool.to_string();
        tokio::task::spawn_blocking(move || resolver.resolve(&tool))
            .await
            .map_err(|e| GenError::Io(std::io::Error::other(e)))?
    }
}

/// Walk from `start` to the filesystem root looking in each `LOCAL_BIN_DIR`
fn find_local(tool: &str, start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let bin_dir = dir.join(LOCAL_BIN_DIR);
        let Ok(entries) = fs::read_dir(&bin_dir) else {
            continue;
        };

        let mut matches: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| matches_tool(name, tool))
            .collect();

        // Shortest name wins: prefer `protoc` over `protoc.sh`
        matches.sort_by_key(|name| name.len());
        if let Some(name) = matches.first() {
            return Some(bin_dir.join(name));
        }
    }

    None
}

fn matches_tool(file_name: &str, tool: &str) -> bool {
    let path = Path::new(file_name);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let stem = if ext.is_empty() {
        file_name
    } else {
        path.file_stem().and_then(|s| s.to_str()).unwrap_or(file_name)
    };

    BIN_EXTS.contains(&ext) && stem == tool
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn touch_executable(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_path_wins_over_local_bin() {
        let root = tempfile::tempdir().unwrap();
        let path_dir = root.path().join("usr-bin");
        let project = root.path().join("project");
        touch_executable(&path_dir.join("protoc"));
        touch_executable(&project.join(LOCAL_BIN_DIR).join("protoc"));

        let resolver = ToolResolver::new(Some(path_dir.clone().into_os_string()), &project);
        assert_eq!(resolver.resolve("protoc").unwrap(), path_dir.join("protoc"));
    }

    #[test]
    fn test_local_bin_found_from_nested_directory() {
        let root = tempfile::tempdir().unwrap();
        let project = root.path().join("project");
        let nested = project.join("packages/web/src");
        fs::create_dir_all(&nested).unwrap();
        touch_executable(&project.join(LOCAL_BIN_DIR).join("protoc-gen-grpc-web"));

        let resolver = ToolResolver::new(Some(OsString::new()), &nested);
        assert_eq!(
            resolver.resolve("protoc-gen-grpc-web").unwrap(),
            project.join(LOCAL_BIN_DIR).join("protoc-gen-grpc-web")
        );
    }

    #[test]
    fn test_shortest_name_breaks_ties() {
        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join(LOCAL_BIN_DIR);
        touch_executable(&bin.join("protoc-gen-ts.sh"));
        touch_executable(&bin.join("protoc-gen-ts"));
        touch_executable(&bin.join("protoc-gen-ts.txt"));

        let resolver = ToolResolver::new(None, root.path());
        assert_eq!(resolver.resolve("protoc-gen-ts").unwrap(), bin.join("protoc-gen-ts"));
    }

    #[test]
    fn test_unknown_extension_is_ignored() {
        assert!(matches_tool("protoc.sh", "protoc"));
        assert!(matches_tool("protoc", "protoc"));
        assert!(!matches_tool("protoc.txt", "protoc"));
        assert!(!matches_tool("protoc-gen-js", "protoc"));
    }

    #[test]
    fn test_missing_tool_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let resolver = ToolResolver::new(Some(OsString::new()), root.path());
        match resolver.resolve("grpcgen-missing-tool-xyz") {
            Err(GenError::NotFound { tool }) => assert_eq!(tool, "grpcgen-missing-tool-xyz"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }
}
