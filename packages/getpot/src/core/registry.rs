use std::cmp::Reverse;

use indexmap::IndexMap;
use tracing::{debug, info};

use super::{Dispatcher, GetPotProvider, PotHandler, PotRequest};
use crate::error::{Error, ProviderErrorKind};

/// Adjusts a provider's priority for a given request. Higher runs first.
pub type Preference = fn(&dyn PotHandler, &PotRequest) -> i32;

struct ProviderEntry {
    handler: Box<dyn PotHandler>,
    preferences: Vec<Preference>,
}

/// Providers keyed by name, in registration order, with their preference functions.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: IndexMap<&'static str, ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_provider<T: GetPotProvider>(&mut self, provider: T) -> Result<(), Error> {
        if self.entries.contains_key(T::PROVIDER_NAME) {
            return Err(Error::DuplicateProvider(T::PROVIDER_NAME.to_string()));
        }
        info!(
            provider = T::PROVIDER_NAME,
            version = T::VERSION,
            "Registering provider"
        );
        self.entries.insert(
            T::PROVIDER_NAME,
            ProviderEntry {
                handler: Box::new(provider),
                preferences: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn register_preference(&mut self, name: &str, preference: Preference) -> Result<(), Error> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))?;
        entry.preferences.push(preference);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn PotHandler> {
        self.entries.get(name).map(|entry| entry.handler.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn handlers(&self) -> impl Iterator<Item = &dyn PotHandler> + '_ {
        self.entries.values().map(|entry| entry.handler.as_ref())
    }

    /// Drops every provider whose name is rejected by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|name, _| keep(name));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Providers ordered by priority for `request`, highest first.
    /// Equal priorities keep registration order.
    pub fn rank(&self, request: &PotRequest) -> Vec<(i32, &dyn PotHandler)> {
        let mut ranked: Vec<(i32, &dyn PotHandler)> = self
            .entries
            .values()
            .map(|entry| {
                let handler = entry.handler.as_ref();
                let priority = entry
                    .preferences
                    .iter()
                    .map(|preference| preference(handler, request))
                    .fold(0i32, i32::saturating_add);
                (priority, handler)
            })
            .collect();
        ranked.sort_by_key(|(priority, _)| Reverse(*priority));
        ranked
    }

    /// Asks the first provider that accepts `request` for a token.
    ///
    /// Providers that decline are skipped. Any other error, including a request error
    /// from the accepting provider, is returned unchanged.
    pub async fn fetch(
        &self,
        request: &PotRequest,
        dispatcher: &dyn Dispatcher,
    ) -> Result<String, Error> {
        let mut declined = Vec::new();

        for (priority, handler) in self.rank(request) {
            match handler.validate(request, dispatcher) {
                Ok(()) => {}
                Err(Error::Provider(err)) if err.kind() == ProviderErrorKind::Unsupported => {
                    debug!(
                        provider = handler.name(),
                        reason = err.message(),
                        "Provider declined request"
                    );
                    declined.push(*err);
                    continue;
                }
                Err(err) => return Err(err),
            }

            debug!(
                provider = handler.name(),
                version = handler.version(),
                priority,
                client = %request.client,
                "Fetching PO Token"
            );
            return handler.fetch(request, dispatcher).await;
        }

        Err(Error::NoSupportingProviders(declined))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::{DispatchRequest, DispatchResponse};
    use crate::error::{DispatchError, ProviderError};

    struct OfflineDispatcher;

    #[async_trait]
    impl Dispatcher for OfflineDispatcher {
        async fn urlopen(
            &self,
            request: DispatchRequest,
        ) -> Result<DispatchResponse, DispatchError> {
            Err(DispatchError::Status {
                status: 503,
                url: request.url.to_string(),
            })
        }
    }

    struct First;

    impl GetPotProvider for First {
        const PROVIDER_NAME: &'static str = "first";

        async fn get_pot(
            &self,
            _request: &PotRequest,
            _dispatcher: &dyn Dispatcher,
        ) -> Result<String, Error> {
            Ok("from-first".to_string())
        }
    }

    struct Second;

    impl GetPotProvider for Second {
        const PROVIDER_NAME: &'static str = "second";
        const SUPPORTED_CLIENTS: Option<&'static [&'static str]> = Some(&["web"]);

        async fn get_pot(
            &self,
            _request: &PotRequest,
            _dispatcher: &dyn Dispatcher,
        ) -> Result<String, Error> {
            Ok("from-second".to_string())
        }
    }

    struct NoAccounts;

    impl GetPotProvider for NoAccounts {
        const PROVIDER_NAME: &'static str = "no-accounts";

        fn validate_pot(
            &self,
            request: &PotRequest,
            _dispatcher: &dyn Dispatcher,
        ) -> Result<(), Error> {
            if request.is_account_bound() {
                return Err(ProviderError::unsupported::<Self>("accounts").into());
            }
            Ok(())
        }

        async fn get_pot(
            &self,
            _request: &PotRequest,
            _dispatcher: &dyn Dispatcher,
        ) -> Result<String, Error> {
            Err(ProviderError::request::<Self>("nothing to give").into())
        }
    }

    fn boost(_: &dyn PotHandler, _: &PotRequest) -> i32 {
        100
    }

    fn boost_web(_: &dyn PotHandler, request: &PotRequest) -> i32 {
        if request.client == "web" { 10 } else { 0 }
    }

    #[test]
    fn duplicate_provider_is_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(First).unwrap();
        let err = registry.register_provider(First).unwrap_err();
        assert!(matches!(err, Error::DuplicateProvider(name) if name == "first"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn preference_for_unknown_provider_is_rejected() {
        let mut registry = ProviderRegistry::new();
        let err = registry.register_preference("missing", boost).unwrap_err();
        assert!(matches!(err, Error::UnknownProvider(name) if name == "missing"));
    }

    #[test]
    fn rank_sums_preferences() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(First).unwrap();
        registry.register_provider(Second).unwrap();
        registry.register_preference("second", boost).unwrap();
        registry.register_preference("second", boost_web).unwrap();

        let ranked = registry.rank(&PotRequest::new("web"));
        let order: Vec<_> = ranked.iter().map(|(p, h)| (*p, h.name())).collect();
        assert_eq!(order, vec![(110, "second"), (0, "first")]);

        let ranked = registry.rank(&PotRequest::new("tv"));
        assert_eq!(ranked[0].0, 100);
    }

    fn max_boost(_: &dyn PotHandler, _: &PotRequest) -> i32 {
        i32::MAX
    }

    #[test]
    fn rank_saturates_large_preferences() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(First).unwrap();
        registry.register_provider(Second).unwrap();
        registry.register_preference("second", max_boost).unwrap();
        registry.register_preference("second", max_boost).unwrap();

        let ranked = registry.rank(&PotRequest::new("web"));
        assert_eq!(ranked[0].0, i32::MAX);
        assert_eq!(ranked[0].1.name(), "second");
    }

    #[test]
    fn rank_keeps_registration_order_on_ties() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(Second).unwrap();
        registry.register_provider(First).unwrap();
        let names: Vec<_> = registry
            .rank(&PotRequest::new("web"))
            .into_iter()
            .map(|(_, h)| h.name())
            .collect();
        assert_eq!(names, vec!["second", "first"]);
        assert_eq!(registry.names().collect::<Vec<_>>(), names);
    }

    #[tokio::test]
    async fn fetch_skips_declining_providers() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(Second).unwrap();
        registry.register_provider(First).unwrap();
        registry.register_preference("second", boost).unwrap();

        let token = registry
            .fetch(&PotRequest::new("android"), &OfflineDispatcher)
            .await
            .unwrap();
        assert_eq!(token, "from-first");
    }

    #[tokio::test]
    async fn fetch_returns_request_error_without_falling_through() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(NoAccounts).unwrap();
        registry.register_provider(First).unwrap();

        let err = registry
            .fetch(&PotRequest::new("web"), &OfflineDispatcher)
            .await
            .unwrap_err();
        assert!(err.is_request());
    }

    #[tokio::test]
    async fn fetch_reports_when_every_provider_declines() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(NoAccounts).unwrap();
        registry.register_provider(Second).unwrap();

        let request = PotRequest::new("android").with_data_sync_id("sync");
        let err = registry
            .fetch(&request, &OfflineDispatcher)
            .await
            .unwrap_err();
        match err {
            Error::NoSupportingProviders(declined) => {
                let providers: Vec<_> = declined.iter().map(|e| e.provider()).collect();
                assert_eq!(providers, vec!["no-accounts", "second"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_registry_has_no_supporting_providers() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        let err = registry
            .fetch(&PotRequest::new("web"), &OfflineDispatcher)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSupportingProviders(declined) if declined.is_empty()));
    }

    #[test]
    fn retain_filters_by_name() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(First).unwrap();
        registry.register_provider(Second).unwrap();
        registry.retain(|name| name == "second");
        assert!(registry.get("first").is_none());
        assert_eq!(registry.get("second").map(|h| h.name()), Some("second"));
    }
}
