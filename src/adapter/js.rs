// gRPC Gen - JavaScript Adapter
// protoc's built-in js generator with validated import styles

use async_trait::async_trait;

use crate::adapter::{CompilerInvoker, OutputAdapter, option_string};
use crate::config::OutputOptions;
use crate::error::{GenError, GenResult};
use crate::log;

const IMPORT_STYLES: &[&str] = &["closure", "commonjs"];

pub struct JsOutputAdapter {
    invoker: CompilerInvoker,
    import_style: Option<String>,
    binary: bool,
    library: Option<String>,
}

impl JsOutputAdapter {
    pub fn new(invoker: CompilerInvoker) -> Self {
        Self {
            invoker,
            import_style: None,
            binary: false,
            library: None,
        }
    }

    pub fn option_string(&self) -> String {
        let mut parts = Vec::new();

        if let Some(style) = &self.import_style {
            parts.push(format!("import_style={}", style));
        }
        if self.binary {
            parts.push("binary".to_string());
        }
        if let Some(library) = &self.library {
            parts.push(format!("library={}", library));
        }

        option_string(&parts, &self.invoker.context().output_path)
    }
}

#[async_trait]
impl OutputAdapter for JsOutputAdapter {
    fn parse_options(&mut self, options: &OutputOptions) -> GenResult<()> {
        for (key, value) in options {
            match key.as_str() {
                "import_style" => {
                    let style = value.to_string();
                    if !IMPORT_STYLES.contains(&style.as_str()) {
                        return Err(GenError::config(format!(
                            "[js] unknown import_style '{}' may be one of the following: {}",
                            style,
                            IMPORT_STYLES.join(", ")
                        )));
                    }
                    self.import_style = Some(style);
                }
                "binary" => {
                    self.binary = value.as_flag().ok_or_else(|| {
                        GenError::config(format!("[js] 'binary' expects true or false, got '{}'", value))
                    })?;
                }
                "library" => self.library = Some(value.to_string()),
                other => log::verbose(format!("[js] ignoring unknown option '{}'", other)),
            }
        }

        Ok(())
    }

    async fn run(&self) -> GenResult<()> {
        self.invoker.invoke_all(&self.option_string()).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "js"
    }
}

pub fn factory(invoker: CompilerInvoker) -> Box<dyn OutputAdapter> {
    Box::new(JsOutputAdapter::new(invoker))
}
