mod dispatch;
mod registry;
mod request;

use async_trait::async_trait;

pub use dispatch::{DispatchConfig, DispatchRequest, DispatchResponse, Dispatcher, HttpDispatcher};
pub use registry::{Preference, ProviderRegistry};
pub use request::{PotContext, PotRequest};

use crate::error::{Error, ProviderError};

/// A source of Proof-of-Origin Tokens.
///
/// Implementors describe what they can serve through the associated constants and
/// answer two questions: whether a request can be handled ([`validate_pot`]) and
/// which token to hand back ([`get_pot`]). Requests that fall outside
/// `SUPPORTED_CLIENTS`, `SUPPORTED_CONTEXTS` or `SUPPORTED_PROXY_SCHEMES` are declined
/// before `validate_pot` is reached.
///
/// [`validate_pot`]: GetPotProvider::validate_pot
/// [`get_pot`]: GetPotProvider::get_pot
pub trait GetPotProvider: Send + Sync + 'static {
    /// Unique display name, also the registry key.
    const PROVIDER_NAME: &'static str;
    /// Shown in debug output.
    const VERSION: &'static str = "0.0.0";
    /// Innertube clients this provider serves. `None` accepts any client.
    const SUPPORTED_CLIENTS: Option<&'static [&'static str]> = None;
    const SUPPORTED_CONTEXTS: &'static [PotContext] = &[PotContext::Gvs];
    /// Proxy schemes the provider can honor when it talks to its source without the
    /// dispatcher. `None` means every request goes through the dispatcher.
    const SUPPORTED_PROXY_SCHEMES: Option<&'static [&'static str]> = None;

    /// Decline requests with [`ProviderError::unsupported`]. No side effects.
    fn validate_pot(
        &self,
        _request: &PotRequest,
        _dispatcher: &dyn Dispatcher,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn get_pot(
        &self,
        request: &PotRequest,
        dispatcher: &dyn Dispatcher,
    ) -> impl std::future::Future<Output = Result<String, Error>> + Send;
}

/// Object-safe view of a [`GetPotProvider`], as stored in the registry.
#[async_trait]
pub trait PotHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str;

    fn validate(&self, request: &PotRequest, dispatcher: &dyn Dispatcher) -> Result<(), Error>;

    async fn fetch(
        &self,
        request: &PotRequest,
        dispatcher: &dyn Dispatcher,
    ) -> Result<String, Error>;
}

#[async_trait]
impl<T: GetPotProvider> PotHandler for T {
    fn name(&self) -> &'static str {
        T::PROVIDER_NAME
    }

    fn version(&self) -> &'static str {
        T::VERSION
    }

    fn validate(&self, request: &PotRequest, dispatcher: &dyn Dispatcher) -> Result<(), Error> {
        check_supported::<T>(request, dispatcher)?;
        self.validate_pot(request, dispatcher)
    }

    async fn fetch(
        &self,
        request: &PotRequest,
        dispatcher: &dyn Dispatcher,
    ) -> Result<String, Error> {
        self.get_pot(request, dispatcher).await
    }
}

fn check_supported<T: GetPotProvider>(
    request: &PotRequest,
    dispatcher: &dyn Dispatcher,
) -> Result<(), ProviderError> {
    if let Some(clients) = T::SUPPORTED_CLIENTS {
        if !clients.iter().any(|client| *client == request.client) {
            return Err(ProviderError::unsupported::<T>(format!(
                "Client {} is not supported",
                request.client
            )));
        }
    }

    if !T::SUPPORTED_CONTEXTS.contains(&request.pot_context) {
        return Err(ProviderError::unsupported::<T>(format!(
            "PO Token context {} is not supported",
            request.pot_context
        )));
    }

    if let (Some(schemes), Some(proxy)) = (T::SUPPORTED_PROXY_SCHEMES, dispatcher.proxy()) {
        if !schemes.iter().any(|scheme| *scheme == proxy.scheme()) {
            return Err(ProviderError::unsupported::<T>(format!(
                "Proxy scheme {} is not supported",
                proxy.scheme()
            )));
        }
    }

    Ok(())
}

/// Loggable stand-in for a token. Tokens are credentials and never reach the logs.
pub fn redact(token: &str) -> String {
    format!("<redacted, {} chars>", token.chars().count())
}
