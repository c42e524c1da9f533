// gRPC Gen - Configuration
// Loads and validates the declarative generation config (JSON or YAML)

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{GenError, GenResult};

/// Compiler version used when the config does not pin one
pub const DEFAULT_PROTOC_VERSION: &str = "3.6.1";

/// File names tried, in order, when no explicit config path is given
pub const CONFIG_CANDIDATES: [&str; 6] = [
    ".grpc-gen.json",
    ".grpc-gen.yaml",
    ".grpc-gen.yml",
    "grpc-gen.json",
    "grpc-gen.yaml",
    "grpc-gen.yml",
];

/// Ordered per-output options, as written in the config
pub type OutputOptions = IndexMap<String, OptionValue>;

/// A single option value attached to an output
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    /// Render as a compiler option fragment: `key=value`, a bare `key` for
    /// `true`, nothing for `false`.
    pub fn render(&self, key: &str) -> Option<String> {
        match self {
            OptionValue::Flag(true) => Some(key.to_string()),
            OptionValue::Flag(false) => None,
            other => Some(format!("{}={}", key, other)),
        }
    }

    /// Interpret as a switch; accepts booleans and the strings "true"/"false"
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            OptionValue::Flag(b) => Some(*b),
            OptionValue::Text(s) if s == "true" => Some(true),
            OptionValue::Text(s) if s == "false" => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Flag(b) => write!(f, "{}", b),
            OptionValue::Integer(n) => write!(f, "{}", n),
            OptionValue::Float(n) => write!(f, "{}", n),
            OptionValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One configured output after normalization
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEntry {
    /// Output kind, e.g. `js` or `grpc-web`
    pub name: String,
    /// Absolute output directory
    pub dir: PathBuf,
    /// Plugin executable name, `protoc-gen-<name>` unless overridden
    pub plugin: String,
    /// Marks a user-provided kind; silences the fallback warning
    pub custom: bool,
    pub options: OutputOptions,
}

/// Validated configuration snapshot for one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub config_path: PathBuf,
    pub config_dir: PathBuf,
    pub srcs: Vec<String>,
    pub srcs_dir: PathBuf,
    pub includes: Vec<PathBuf>,
    pub outputs: Vec<OutputEntry>,
    pub protoc_version: String,
}

impl GenerationConfig {
    /// Absolute paths of every configured source file
    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.srcs.iter().map(|src| self.srcs_dir.join(src)).collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    srcs: Option<Vec<String>>,
    #[serde(alias = "srcsDir")]
    srcs_dir: Option<String>,
    #[serde(default)]
    includes: Vec<String>,
    output: Option<RawOutputs>,
    protoc: Option<RawProtoc>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOutputs {
    Map(IndexMap<String, RawOutput>),
    List(Vec<IndexMap<String, RawOutput>>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOutput {
    Dir(String),
    Detailed {
        dir: String,
        plugin: Option<String>,
        #[serde(default)]
        custom: bool,
        #[serde(default)]
        options: OutputOptions,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawProtoc {
    Version(String),
    Detailed { version: String },
}

/// On-disk config format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.json` files are JSON, everything else is YAML (a superset of JSON)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Find the config file: the explicit path if given, else the first candidate
/// present in `cwd`
pub fn discover(explicit: Option<&Path>, cwd: &Path) -> GenResult<PathBuf> {
    if let Some(path) = explicit {
        let path = cwd.join(path);
        if !path.is_file() {
            return Err(GenError::config(format!(
                "Config file '{}' does not exist",
                path.display()
            )));
        }
        return Ok(path);
    }

    CONFIG_CANDIDATES
        .iter()
        .map(|name| cwd.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            GenError::config(format!(
                "No config found in '{}'. Expected one of: {}",
                cwd.display(),
                CONFIG_CANDIDATES.join(", ")
            ))
        })
}

/// Paths worth watching for config changes
pub fn watch_candidates(explicit: Option<&Path>, cwd: &Path) -> Vec<PathBuf> {
    match explicit {
        Some(path) => vec![cwd.join(path)],
        None => CONFIG_CANDIDATES.iter().map(|name| cwd.join(name)).collect(),
    }
}

/// Read and validate a config file
pub fn load(path: &Path) -> GenResult<GenerationConfig> {
    let path = std::path::absolute(path)?;
    let text = fs::read_to_string(&path).map_err(|e| {
        GenError::config(format!("Unable to load '{}': {}", path.display(), e))
    })?;
    parse(&text, ConfigFormat::from_path(&path), &path)
}

/// Parse config text as if it were read from `path`
pub fn parse(text: &str, format: ConfigFormat, path: &Path) -> GenResult<GenerationConfig> {
    let raw: RawConfig = match format {
        ConfigFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
    }
    .map_err(|e| GenError::config(format!("Unable to parse '{}': {}", path.display(), e)))?;

    normalize(raw, path)
}

fn normalize(raw: RawConfig, config_path: &Path) -> GenResult<GenerationConfig> {
    let config_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut errors: Vec<GenError> = Vec::new();

    // Sources
    let srcs = match raw.srcs {
        None => {
            errors.push(GenError::config("Missing 'srcs' in config"));
            Vec::new()
        }
        Some(srcs) if srcs.is_empty() => {
            errors.push(GenError::config("Expected at least one entry in 'srcs'"));
            Vec::new()
        }
        Some(srcs) => srcs,
    };

    for src in &srcs {
        if src.trim().is_empty() {
            errors.push(GenError::config("Empty path in 'srcs'"));
        } else if Path::new(src).is_absolute() {
            errors.push(GenError::config(format!(
                "Source '{}' must be relative to 'srcs_dir'",
                src
            )));
        }
    }

    let srcs_dir = match raw.srcs_dir {
        Some(dir) => config_dir.join(dir),
        None => config_dir.clone(),
    };

    let includes = raw
        .includes
        .iter()
        .map(|dir| config_dir.join(dir))
        .collect();

    // Outputs
    let mut outputs: Vec<OutputEntry> = Vec::new();
    let raw_outputs: Vec<(String, RawOutput)> = match raw.output {
        None => {
            errors.push(GenError::config("Missing 'output' in config"));
            Vec::new()
        }
        Some(outputs) => {
            let outputs: Vec<_> = match outputs {
                RawOutputs::Map(map) => map.into_iter().collect(),
                RawOutputs::List(list) => list.into_iter().flatten().collect(),
            };
            if outputs.is_empty() {
                errors.push(GenError::config("Expected at least one entry in 'output'"));
            }
            outputs
        }
    };

    let mut seen = HashSet::new();
    for (name, output) in raw_outputs {
        if !seen.insert(name.clone()) {
            errors.push(GenError::config(format!("Duplicate output name: {}", name)));
            continue;
        }

        let (dir, plugin, custom, options) = match output {
            RawOutput::Dir(dir) => (dir, None, false, OutputOptions::new()),
            RawOutput::Detailed {
                dir,
                plugin,
                custom,
                options,
            } => (dir, plugin, custom, options),
        };

        if dir.trim().is_empty() {
            errors.push(GenError::config(format!(
                "Output '{}' has an empty 'dir'",
                name
            )));
            continue;
        }

        outputs.push(OutputEntry {
            plugin: plugin.unwrap_or_else(|| format!("protoc-gen-{}", name)),
            dir: config_dir.join(dir),
            name,
            custom,
            options,
        });
    }

    let protoc_version = match raw.protoc {
        Some(RawProtoc::Version(v)) | Some(RawProtoc::Detailed { version: v }) => v,
        None => DEFAULT_PROTOC_VERSION.to_string(),
    };

    GenError::collect(errors)?;

    Ok(GenerationConfig {
        config_path: config_path.to_path_buf(),
        config_dir,
        srcs,
        srcs_dir,
        includes,
        outputs,
        protoc_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_yaml(text: &str) -> GenResult<GenerationConfig> {
        parse(text, ConfigFormat::Yaml, Path::new("/project/.grpc-gen.yaml"))
    }

    #[test]
    fn test_parse_mapping_outputs_keep_order() {
        let config = parse_yaml(
            r#"
srcs_dir: protos
srcs: [a.proto, nested/b.proto]
output:
  python: gen/py
  js:
    dir: gen/js
    options:
      import_style: commonjs
      binary: true
  grpc-web:
    dir: gen/web
    plugin: my-grpc-web
"#,
        )
        .unwrap();

        assert_eq!(config.srcs_dir, PathBuf::from("/project/protos"));
        assert_eq!(config.srcs, vec!["a.proto", "nested/b.proto"]);
        let names: Vec<_> = config.outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["python", "js", "grpc-web"]);
        assert_eq!(config.outputs[0].plugin, "protoc-gen-python");
        assert_eq!(config.outputs[1].dir, PathBuf::from("/project/gen/js"));
        assert_eq!(
            config.outputs[1].options.get("binary"),
            Some(&OptionValue::Flag(true))
        );
        assert_eq!(config.outputs[2].plugin, "my-grpc-web");
        assert_eq!(config.protoc_version, DEFAULT_PROTOC_VERSION);
    }

    #[test]
    fn test_parse_sequence_outputs_json() {
        let config = parse(
            r#"{
                "srcs": ["a.proto"],
                "srcsDir": "src",
                "output": [{"ts": {"dir": "out", "custom": true}}, {"cpp": "cpp_out"}],
                "protoc": {"version": "3.19.4"}
            }"#,
            ConfigFormat::Json,
            Path::new("/p/grpc-gen.json"),
        )
        .unwrap();

        assert_eq!(config.srcs_dir, PathBuf::from("/p/src"));
        assert_eq!(config.outputs.len(), 2);
        assert!(config.outputs[0].custom);
        assert_eq!(config.outputs[1].name, "cpp");
        assert_eq!(config.protoc_version, "3.19.4");
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let result = parse_yaml("includes: []\n");
        match result {
            Err(GenError::Multiple(errors)) => {
                let text: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                assert!(text.iter().any(|m| m.contains("Missing 'srcs'")));
                assert!(text.iter().any(|m| m.contains("Missing 'output'")));
            }
            other => panic!("Expected multiple config errors, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_output_mapping_is_rejected() {
        let result = parse_yaml("srcs: [a.proto]\noutput: {}\n");
        match result {
            Err(GenError::Config { message }) => {
                assert!(message.contains("at least one entry in 'output'"));
            }
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_output_in_sequence_form() {
        let result = parse_yaml("srcs: [a.proto]\noutput:\n  - js: a\n  - js: b\n");
        match result {
            Err(GenError::Config { message }) => assert!(message.contains("Duplicate output name: js")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_absolute_source_is_rejected() {
        let result = parse_yaml("srcs: [/abs/a.proto]\noutput:\n  js: out\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_option_value_rendering() {
        assert_eq!(OptionValue::Flag(true).render("binary"), Some("binary".to_string()));
        assert_eq!(OptionValue::Flag(false).render("binary"), None);
        assert_eq!(OptionValue::Integer(3).render("n"), Some("n=3".to_string()));
        assert_eq!(
            OptionValue::Text("commonjs".into()).render("import_style"),
            Some("import_style=commonjs".to_string())
        );
    }

    #[test]
    fn test_discover_prefers_first_candidate() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("grpc-gen.yaml"), "").unwrap();
        fs::write(dir.path().join(".grpc-gen.json"), "").unwrap();

        let found = discover(None, dir.path()).unwrap();
        assert_eq!(found, dir.path().join(".grpc-gen.json"));

        let missing = discover(Some(Path::new("nope.yaml")), dir.path());
        assert!(missing.is_err());
    }
}
