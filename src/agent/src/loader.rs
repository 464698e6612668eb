//! Discovery of extension modules.
//!
//! Providers are either passed to an [`ExtensionLoader`] directly or
//! registered process-wide with [`register_extension`], typically from the
//! initialization code of the crate that ships the extension.

use std::fmt::{self, Debug};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use datafusion::error::Result;
use itertools::Itertools;
use log::{info, warn};

use crate::api::EventHandlerFactory;
use crate::dispatch::isolate;

type Constructor = Arc<dyn Fn() -> Result<Box<dyn EventHandlerFactory>> + Send + Sync>;

/// A named constructor for one extension module.
#[derive(Clone)]
pub struct ExtensionProvider {
    name: String,
    constructor: Constructor,
}

impl ExtensionProvider {
    /// A provider named `name` whose modules come from `constructor`.
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Result<Box<dyn EventHandlerFactory>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            constructor: Arc::new(constructor),
        }
    }

    /// Provider of a module that needs no setup besides `Default`.
    pub fn of<M>() -> Self
    where
        M: EventHandlerFactory + Default + 'static,
    {
        Self::new(std::any::type_name::<M>(), || Ok(Box::new(M::default())))
    }

    /// Name of the provider.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn instantiate(&self) -> Option<Box<dyn EventHandlerFactory>> {
        isolate("extension", &self.name, || (self.constructor)())
    }
}

impl Debug for ExtensionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionProvider")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

static REGISTERED: OnceLock<RwLock<Vec<ExtensionProvider>>> = OnceLock::new();

fn registered() -> &'static RwLock<Vec<ExtensionProvider>> {
    REGISTERED.get_or_init(Default::default)
}

/// Make `provider` visible to every loader that includes registered
/// providers.
pub fn register_extension(provider: ExtensionProvider) {
    registered()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(provider);
}

/// Finds and instantiates extension modules.
#[derive(Debug, Clone)]
pub struct ExtensionLoader {
    providers: Vec<ExtensionProvider>,
    include_registered: bool,
}

impl Default for ExtensionLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionLoader {
    /// A loader over the registered providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            include_registered: true,
        }
    }

    /// Ignore providers registered with [`register_extension`].
    pub fn without_registered(mut self) -> Self {
        self.include_registered = false;
        self
    }

    /// Add a provider, loaded after the registered ones.
    pub fn with_provider(mut self, provider: ExtensionProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Registered providers in registration order, then the loader's own.
    pub fn providers(&self) -> Vec<ExtensionProvider> {
        let mut providers = Vec::new();
        if self.include_registered {
            providers.extend(
                registered()
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .cloned(),
            );
        }
        providers.extend(self.providers.iter().cloned());
        providers
    }

    /// Instantiate every provider. A provider that fails or panics is
    /// skipped with a warning; discovery itself never fails.
    pub fn discover(&self) -> Vec<Box<dyn EventHandlerFactory>> {
        let providers = self.providers();
        let modules: Vec<_> = providers
            .iter()
            .filter_map(ExtensionProvider::instantiate)
            .collect();
        if modules.len() < providers.len() {
            warn!(
                "{} of {} extension providers could not be loaded",
                providers.len() - modules.len(),
                providers.len()
            );
        }
        info!(
            "loaded {} extension modules: [{}]",
            modules.len(),
            modules.iter().map(|module| module.name()).join(", ")
        );
        modules
    }
}

#[cfg(test)]
mod tests {
    use datafusion::common::internal_err;

    use super::*;

    #[derive(Default)]
    struct Noop;

    impl EventHandlerFactory for Noop {
        fn name(&self) -> &str {
            "noop"
        }
    }

    #[derive(Default)]
    struct Registered;

    impl EventHandlerFactory for Registered {
        fn name(&self) -> &str {
            "registered-for-test"
        }
    }

    #[test]
    fn broken_providers_are_skipped() {
        let loader = ExtensionLoader::new()
            .without_registered()
            .with_provider(ExtensionProvider::new("fails", || {
                internal_err!("missing configuration")
            }))
            .with_provider(ExtensionProvider::of::<Noop>())
            .with_provider(ExtensionProvider::new("panics", || panic!("bad module")));

        let modules = loader.discover();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name(), "noop");
    }

    #[test]
    fn registered_providers_come_first() {
        register_extension(ExtensionProvider::of::<Registered>());

        let loader = ExtensionLoader::new().with_provider(ExtensionProvider::of::<Noop>());
        let names: Vec<_> = loader
            .discover()
            .iter()
            .map(|module| module.name().to_string())
            .collect();
        let registered = names.iter().position(|n| n == "registered-for-test").unwrap();
        assert!(registered < names.len() - 1);
        assert_eq!(names.last().map(String::as_str), Some("noop"));

        let isolated = ExtensionLoader::new().without_registered().discover();
        assert!(isolated.is_empty());
    }
}
