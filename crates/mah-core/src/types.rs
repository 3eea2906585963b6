use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Delivery target for report or heartbeat pushes, usually an HTTP URL.
pub type Destination = String;

/// Ordered list of delivery targets. Each entry is delivered to independently.
pub type Destinations = Vec<Destination>;

/// Categories of incoming traffic that can be reported to webhooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageCategory {
    Group,
    Friend,
    Temp,
    Event,
}

impl MessageCategory {
    pub const ALL: [MessageCategory; 4] = [Self::Group, Self::Friend, Self::Temp, Self::Event];

    /// Short name used in logs and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Friend => "friend",
            Self::Temp => "temp",
            Self::Event => "event",
        }
    }

    /// Key of the matching sub-section inside `report`:
    /// ```yaml
    /// report:
    ///   groupMessage:
    ///     report: true
    /// ```
    pub fn as_config_key(&self) -> &'static str {
        match self {
            Self::Group => "groupMessage",
            Self::Friend => "friendMessage",
            Self::Temp => "tempMessage",
            Self::Event => "eventMessage",
        }
    }
}

impl std::fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MessageCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s || c.as_config_key() == s)
            .ok_or_else(|| {
                format!("unknown message category '{s}' (expected group, friend, temp or event)")
            })
    }
}

/// Output format for CLI responses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
