// gRPC Gen - Syntax Pass Adapter
// Drives protoc through a no-op plugin so it parses every source

use std::path::PathBuf;

use async_trait::async_trait;

use crate::adapter::{CompilerInvoker, InvocationContext, OutputAdapter, default_plugin_name};
use crate::config::OutputOptions;
use crate::error::GenResult;

pub const DUMMY_OUTPUT: &str = "dummy";

/// Runs the compiler once over all sources; writes nothing useful
pub struct DummyOutputAdapter {
    invoker: CompilerInvoker,
}

impl DummyOutputAdapter {
    /// `context.output_path` is the sink directory; `plugin` the no-op plugin
    pub fn new(mut context: InvocationContext, plugin: PathBuf) -> Self {
        context.output_name = DUMMY_OUTPUT.to_string();
        context.plugin_name = default_plugin_name(DUMMY_OUTPUT);
        Self {
            invoker: CompilerInvoker::with_plugin_path(context, plugin),
        }
    }
}

#[async_trait]
impl OutputAdapter for DummyOutputAdapter {
    fn parse_options(&mut self, _options: &OutputOptions) -> GenResult<()> {
        Ok(())
    }

    async fn run(&self) -> GenResult<()> {
        let out = self.invoker.context().output_path.clone();
        self.invoker.invoke_all(&out).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        DUMMY_OUTPUT
    }
}
