// gRPC Gen - Passthrough Adapter
// Forwards configured options verbatim; also serves as the fallback for unknown kinds

use async_trait::async_trait;

use crate::adapter::{CompilerInvoker, OutputAdapter, option_string, render_options};
use crate::config::{OptionValue, OutputOptions};
use crate::error::{GenResult, Warning};
use crate::log;

/// Option prefix that asks for a second generator in the same compiler run,
/// e.g. `also_grpc_python: true` adds `--grpc_python_out=<dir>`
pub const ALSO_PREFIX: &str = "also_";

/// Adapter for outputs that need no special handling
pub struct PassthroughAdapter {
    invoker: CompilerInvoker,
    options: OutputOptions,
}

impl PassthroughAdapter {
    pub fn new(invoker: CompilerInvoker) -> Self {
        Self {
            invoker,
            options: OutputOptions::new(),
        }
    }

    /// Option string handed to `--<kind>_out`
    pub fn option_string(&self) -> String {
        let parts = render_options(&self.options);
        option_string(&parts, &self.invoker.context().output_path)
    }
}

#[async_trait]
impl OutputAdapter for PassthroughAdapter {
    fn parse_options(&mut self, options: &OutputOptions) -> GenResult<()> {
        let dir = self.invoker.context().output_path.clone();

        for (key, value) in options {
            let Some(kind) = key.strip_prefix(ALSO_PREFIX) else {
                self.options.insert(key.clone(), value.clone());
                continue;
            };

            match value {
                OptionValue::Flag(false) => {}
                OptionValue::Flag(true) => self.invoker.add_output(kind, dir.clone()),
                other => self
                    .invoker
                    .add_output(kind, option_string(&[other.to_string()], &dir)),
            }
        }

        Ok(())
    }

    async fn run(&self) -> GenResult<()> {
        self.invoker.invoke_all(&self.option_string()).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.invoker.context().output_name
    }
}

/// Factory for compiler built-in kinds
pub fn built_in(invoker: CompilerInvoker) -> Box<dyn OutputAdapter> {
    Box::new(PassthroughAdapter::new(invoker))
}

/// Factory used when no adapter is registered for a kind.
///
/// Warns unless the output is marked `custom`.
pub fn fallback(invoker: CompilerInvoker) -> Box<dyn OutputAdapter> {
    let ctx = invoker.context();
    if !ctx.custom {
        log::warning(&Warning::with_hint(
            format!("Using fallback output adapter for '{}'", ctx.output_name),
            "mark the output with `custom: true` to silence this warning",
        ));
    }
    Box::new(PassthroughAdapter::new(invoker))
}
