// gRPC Gen - Adapter Registry
// Maps output kinds to adapter factories, with a generic fallback

use std::collections::HashMap;

use crate::adapter::{
    AdapterFactory, BUILT_IN_OUTPUTS, CompilerInvoker, InvocationContext, OutputAdapter, grpc_web,
    js, passthrough,
};
use crate::config::OutputOptions;
use crate::error::GenResult;

/// Registered output kinds
pub struct AdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    /// Registry with no kinds; everything resolves to the fallback
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Built-in kinds plus the specialized js and grpc-web adapters
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for kind in BUILT_IN_OUTPUTS.iter().filter(|k| **k != "dummy") {
            registry.register(*kind, passthrough::built_in);
        }
        registry.register("js", js::factory);
        registry.register("grpc-web", grpc_web::factory);
        registry
    }

    /// Add or replace the factory for `kind`
    pub fn register(&mut self, kind: impl Into<String>, factory: AdapterFactory) {
        self.factories.insert(kind.into(), factory);
    }

    /// Build and configure the adapter for `context.output_name`.
    ///
    /// Unknown kinds get the fallback adapter. Only option validation can fail.
    pub fn resolve(
        &self,
        context: InvocationContext,
        options: Option<&OutputOptions>,
    ) -> GenResult<Box<dyn OutputAdapter>> {
        let factory = self
            .factories
            .get(&context.output_name)
            .copied()
            .unwrap_or(passthrough::fallback);

        let mut adapter = factory(CompilerInvoker::new(context));
        let empty = OutputOptions::new();
        adapter.parse_options(options.unwrap_or(&empty))?;
        Ok(adapter)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing;
    use crate::config::OptionValue;
    use crate::error::GenError;

    #[test]
    fn test_defaults_cover_specialized_kinds() {
        let registry = AdapterRegistry::with_defaults();
        assert!(registry.factories.contains_key("js"));
        assert!(registry.factories.contains_key("grpc-web"));
        assert!(registry.factories.contains_key("python"));
        assert!(!registry.factories.contains_key("dummy"));
        assert!(!registry.factories.contains_key("ts"));
    }

    #[test]
    fn test_unknown_kind_resolves_to_fallback() {
        let registry = AdapterRegistry::with_defaults();
        for kind in ["ts", "go", "grpc", "some-custom-thing"] {
            let adapter = registry.resolve(testing::context(kind), None).unwrap();
            assert_eq!(adapter.name(), kind);
        }
    }

    #[test]
    fn test_specialized_adapter_is_selected() {
        let registry = AdapterRegistry::with_defaults();
        let adapter = registry.resolve(testing::context("grpc-web"), None).unwrap();
        assert_eq!(adapter.name(), "grpc-web");
    }

    #[test]
    fn test_option_errors_propagate() {
        let registry = AdapterRegistry::with_defaults();
        let mut options = OutputOptions::new();
        options.insert("import_style".into(), OptionValue::Text("amd".into()));

        let result = registry.resolve(testing::context("js"), Some(&options));
        assert!(matches!(result, Err(GenError::Config { .. })));
    }

    #[test]
    fn test_registering_new_kind() {
        let mut registry = AdapterRegistry::empty();
        registry.register("ts", grpc_web::factory);
        let adapter = registry.resolve(testing::context("ts"), None).unwrap();
        assert_eq!(adapter.name(), "grpc-web");
    }
}
