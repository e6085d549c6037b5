use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which kind of PO Token is asked for.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PotContext {
    /// Google Video Server, used for media requests.
    #[default]
    Gvs,
    Player,
}

impl fmt::Display for PotContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PotContext::Gvs => f.write_str("gvs"),
            PotContext::Player => f.write_str("player"),
        }
    }
}

impl FromStr for PotContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gvs" => Ok(PotContext::Gvs),
            "player" => Ok(PotContext::Player),
            other => Err(format!("unknown PO Token context: {other}")),
        }
    }
}

/// A single token request as handed to providers.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct PotRequest {
    pub client: String,
    pub visitor_data: Option<String>,
    /// Set for signed-in sessions.
    pub data_sync_id: Option<String>,
    pub player_url: Option<String>,
    pub video_id: Option<String>,
    pub context: Option<Map<String, Value>>,
    #[serde(default)]
    pub pot_context: PotContext,
}

impl PotRequest {
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            ..Default::default()
        }
    }

    pub fn with_visitor_data(mut self, visitor_data: impl Into<String>) -> Self {
        self.visitor_data = Some(visitor_data.into());
        self
    }

    pub fn with_data_sync_id(mut self, data_sync_id: impl Into<String>) -> Self {
        self.data_sync_id = Some(data_sync_id.into());
        self
    }

    pub fn with_player_url(mut self, player_url: impl Into<String>) -> Self {
        self.player_url = Some(player_url.into());
        self
    }

    pub fn with_video_id(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_pot_context(mut self, pot_context: PotContext) -> Self {
        self.pot_context = pot_context;
        self
    }

    /// Whether the request is bound to a signed-in account.
    pub fn is_account_bound(&self) -> bool {
        self.data_sync_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}
