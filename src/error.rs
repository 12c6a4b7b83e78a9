use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Network connection failed: {0}")]
    Connection(String),

    #[error("WebSocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed value: {0}")]
    Parse(String),

    #[error("No data to display: {0}")]
    EmptyInput(&'static str),

    #[error("Control command failed: {0}")]
    ControlCommand(String),

    #[error("Internal channel closed")]
    ChannelClosed,

    #[error("Invalid URL")]
    UrlParse(#[from] url::ParseError),
}

impl DashboardError {
    /// Transport failures mean the peer could not be reached. They surface
    /// as a connection status change and the feed session retries them.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Socket(_)
                | Self::Http(_)
                | Self::ChannelClosed
                | Self::UrlParse(_)
        )
    }
}
