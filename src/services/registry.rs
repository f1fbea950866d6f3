use {
    crate::domain::{error::CheckoutError, payment::PaymentMethod, provider::PaymentProvider},
    std::{collections::HashMap, sync::Arc},
};

/// Configured rails, by method. A rail without credentials is simply absent.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<PaymentMethod, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Replaces any provider already registered for the same method.
    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) {
        let method = provider.method();
        if self.providers.insert(method, provider).is_some() {
            tracing::warn!(method = %method, "payment provider replaced");
        }
    }

    pub fn get(&self, method: PaymentMethod) -> Result<Arc<dyn PaymentProvider>, CheckoutError> {
        self.providers
            .get(&method)
            .cloned()
            .ok_or(CheckoutError::RailDisabled(method.as_str()))
    }

    pub fn is_enabled(&self, method: PaymentMethod) -> bool {
        self.providers.contains_key(&method)
    }

    pub fn enabled(&self) -> Vec<PaymentMethod> {
        let mut methods: Vec<_> = self.providers.keys().copied().collect();
        methods.sort_by_key(|m| m.as_str());
        methods
    }
}
