//! One-shot bootstrap fetch and simulation control requests.

use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::error::DashboardError;
use crate::model::message::ControlCommand;
use crate::model::snapshot::Snapshot;
use crate::pipeline::window::ViewerZone;

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    bootstrap_url: Url,
    control_url: Url,
    zone: ViewerZone,
}

impl HttpGateway {
    pub fn new(
        bootstrap_url: &str,
        control_url: &str,
        zone: ViewerZone,
    ) -> Result<Self, DashboardError> {
        Ok(Self {
            client: reqwest::Client::new(),
            bootstrap_url: Url::parse(bootstrap_url)?,
            control_url: Url::parse(control_url)?,
            zone,
        })
    }

    /// Fetches the full snapshot served at startup. Not retried.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, DashboardError> {
        debug!("Fetching initial snapshot from {}", self.bootstrap_url);
        let body = self
            .client
            .get(self.bootstrap_url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Snapshot::parse(&body, self.zone)
    }

    /// Posts a control command. Out-of-range speeds are rejected before
    /// any request is made.
    pub async fn send_control(&self, command: &ControlCommand) -> Result<(), DashboardError> {
        command.validate()?;

        let resp = self
            .client
            .post(self.control_url.clone())
            .json(command)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(DashboardError::ControlCommand(format!(
                "{} returned {}: {}",
                self.control_url,
                status,
                body.trim()
            )));
        }

        // The simulator answers 200 with {"status":"error"} for rejected commands.
        if let Ok(json) = serde_json::from_str::<Value>(&body) {
            if json["status"].as_str() == Some("error") {
                let message = json["message"].as_str().unwrap_or("rejected").to_string();
                return Err(DashboardError::ControlCommand(message));
            }
        }

        info!("Control command accepted: {:?}", command);
        Ok(())
    }
}
