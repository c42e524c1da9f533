// gRPC Gen - grpc-web Adapter
// One protoc run per source file, all launched together

use std::path::Path;

use async_trait::async_trait;
use futures::future::join_all;

use crate::adapter::{CompilerInvoker, OutputAdapter, option_string};
use crate::compiler::slash_path;
use crate::config::OutputOptions;
use crate::error::{GenError, GenResult};

pub const DEFAULT_MODE: &str = "grpcweb";
const MODES: &[&str] = &["grpcweb", "grpcwebtext"];
const IMPORT_STYLES: &[&str] = &["closure", "commonjs", "commonjs+dts", "typescript"];

pub struct GrpcWebOutputAdapter {
    invoker: CompilerInvoker,
    out: Option<String>,
    mode: String,
    extra: Vec<String>,
}

impl GrpcWebOutputAdapter {
    pub fn new(invoker: CompilerInvoker) -> Self {
        Self {
            invoker,
            out: None,
            mode: DEFAULT_MODE.to_string(),
            extra: Vec::new(),
        }
    }

    /// Option string for the invocation that compiles `src`
    pub fn option_string_for(&self, src: &str) -> String {
        let out = self
            .out
            .clone()
            .unwrap_or_else(|| derived_output_name(src));

        let mut parts = vec![format!("out={}", out), format!("mode={}", self.mode)];
        parts.extend(self.extra.iter().cloned());
        option_string(&parts, &self.invoker.context().output_path)
    }
}

/// `<dir>/<stem>.grpc.pb.js` for a source path, forward slashes
pub fn derived_output_name(src: &str) -> String {
    let path = Path::new(src);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| src.to_string());
    let file = format!("{}.grpc.pb.js", stem);

    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => slash_path(&parent.join(file)),
        _ => file,
    }
}

fn check_choice(key: &str, value: &str, choices: &[&str]) -> GenResult<()> {
    if choices.contains(&value) {
        Ok(())
    } else {
        Err(GenError::config(format!(
            "[grpc-web] unknown {} '{}' may be one of the following: {}",
            key,
            value,
            choices.join(", ")
        )))
    }
}

#[async_trait]
impl OutputAdapter for GrpcWebOutputAdapter {
    fn parse_options(&mut self, options: &OutputOptions) -> GenResult<()> {
        for (key, value) in options {
            match key.as_str() {
                "out" => self.out = Some(value.to_string()),
                "mode" => {
                    let mode = value.to_string();
                    check_choice("mode", &mode, MODES)?;
                    self.mode = mode;
                }
                "import_style" => {
                    let style = value.to_string();
                    check_choice("import_style", &style, IMPORT_STYLES)?;
                    self.extra.push(format!("import_style={}", style));
                }
                _ => self.extra.extend(value.render(key)),
            }
        }

        Ok(())
    }

    async fn run(&self) -> GenResult<()> {
        let srcs = &self.invoker.context().srcs;
        let runs = srcs.iter().map(|src| {
            let options = self.option_string_for(src);
            async move {
                self.invoker
                    .invoke(&options, std::slice::from_ref(src))
                    .await
            }
        });

        let errors = join_all(runs)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        GenError::collect(errors)
    }

    fn name(&self) -> &str {
        "grpc-web"
    }
}

pub fn factory(invoker: CompilerInvoker) -> Box<dyn OutputAdapter> {
    Box::new(GrpcWebOutputAdapter::new(invoker))
}
