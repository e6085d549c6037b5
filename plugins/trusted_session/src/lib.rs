use getpot::{
    DispatchError, Error, ProviderError, ProviderRegistry,
    core::{DispatchRequest, Dispatcher, GetPotProvider, PotHandler, PotRequest, redact},
};
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

#[derive(Serialize, Debug)]
struct TokenRequest<'a> {
    client: &'a str,
    visitor_data: Option<&'a str>,
    context: Option<&'a Map<String, Value>>,
}

/// Asks a local trusted-session token server for PO Tokens.
///
/// Anonymous sessions only: requests carrying a `data_sync_id` are declined.
pub struct TrustedSessionProvider {
    endpoint: String,
}

impl Default for TrustedSessionProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ENDPOINT)
    }
}

impl TrustedSessionProvider {
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:8080";

    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn token_url(&self) -> Result<Url, DispatchError> {
        let url = format!("{}/token", self.endpoint.trim_end_matches('/'));
        Ok(Url::parse(&url)?)
    }
}

impl GetPotProvider for TrustedSessionProvider {
    const PROVIDER_NAME: &'static str = "youtube-trusted-session-generator";
    const VERSION: &'static str = "0.0.1";
    const SUPPORTED_CLIENTS: Option<&'static [&'static str]> =
        Some(&["web", "web_embedded", "web_music"]);

    fn validate_pot(
        &self,
        request: &PotRequest,
        _dispatcher: &dyn Dispatcher,
    ) -> Result<(), Error> {
        if request.is_account_bound() {
            return Err(ProviderError::unsupported::<Self>(
                "Fetching PO Token for accounts is not supported",
            )
            .into());
        }
        Ok(())
    }

    async fn get_pot(
        &self,
        request: &PotRequest,
        dispatcher: &dyn Dispatcher,
    ) -> Result<String, Error> {
        let body = serde_json::to_vec(&TokenRequest {
            client: &request.client,
            visitor_data: request.visitor_data.as_deref(),
            context: request.context.as_ref(),
        })?;
        let response = dispatcher
            .urlopen(DispatchRequest::post_json(self.token_url()?, body))
            .await?;

        let response: Value = serde_json::from_slice(response.read())?;
        let potoken = match response.as_object().and_then(|body| body.get("potoken")) {
            None | Some(Value::Null) => {
                return Err(ProviderError::request::<Self>(
                    "Server did not respond with a potoken",
                )
                .into());
            }
            Some(potoken) => serde_json::from_value::<String>(potoken.clone())?,
        };

        tracing::debug!(
            provider = Self::PROVIDER_NAME,
            token = %redact(&potoken),
            "Got PO Token"
        );
        Ok(potoken)
    }
}

/// Priority adjustment for [`TrustedSessionProvider`]. Leaves the default priority as is.
pub fn trusted_session_preference(_handler: &dyn PotHandler, _request: &PotRequest) -> i32 {
    0
}

/// Adds the provider and its preference to `registry`.
pub fn register(
    registry: &mut ProviderRegistry,
    provider: TrustedSessionProvider,
) -> Result<(), Error> {
    registry.register_provider(provider)?;
    registry.register_preference(
        TrustedSessionProvider::PROVIDER_NAME,
        trusted_session_preference,
    )
}
