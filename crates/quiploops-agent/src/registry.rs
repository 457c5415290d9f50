use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{CompletionBackend, CompletionError, OpenAiCompatibleBackend, ProviderKind};

/// Looks up the backend serving a provider.
///
/// Resolvers are shared by every session, so implementations must be
/// reentrant and hold no per-session state.
pub trait BackendResolver: Send + Sync {
    fn resolve(&self, provider: ProviderKind) -> Result<Arc<dyn CompletionBackend>, CompletionError>;
}

/// Create the default backend for a provider
pub fn create_backend(provider: ProviderKind) -> Arc<dyn CompletionBackend> {
    Arc::new(OpenAiCompatibleBackend::new(provider))
}

/// Default resolver: one lazily created HTTP backend per provider
#[derive(Default)]
pub struct ProviderRegistry {
    backends: Mutex<HashMap<ProviderKind, Arc<dyn CompletionBackend>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend` for its provider, replacing the default
    pub fn with_backend(self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(backend.provider(), backend);
        self
    }
}

impl BackendResolver for ProviderRegistry {
    fn resolve(&self, provider: ProviderKind) -> Result<Arc<dyn CompletionBackend>, CompletionError> {
        let mut backends = self.backends.lock().unwrap_or_else(PoisonError::into_inner);
        let backend = backends
            .entry(provider)
            .or_insert_with(|| create_backend(provider));
        Ok(Arc::clone(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedBackend;

    #[test]
    fn test_registered_backend_wins() {
        let scripted: Arc<dyn CompletionBackend> =
            Arc::new(ScriptedBackend::new(ProviderKind::Groq));
        let registry = ProviderRegistry::new().with_backend(Arc::clone(&scripted));

        let resolved = registry.resolve(ProviderKind::Groq).unwrap();
        assert!(Arc::ptr_eq(&resolved, &scripted));
    }

    #[test]
    fn test_default_backend_is_shared() {
        let registry = ProviderRegistry::new();
        let first = registry.resolve(ProviderKind::Together).unwrap();
        let second = registry.resolve(ProviderKind::Together).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.provider(), ProviderKind::Together);
        assert_eq!(first.name(), "Together AI");
    }
}
