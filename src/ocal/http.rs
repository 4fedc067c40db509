use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;

use super::{OcalReply, OcalRequest, Oracle};
use crate::settings::ClientSettings;
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// Oracle reached over HTTP: one JSON `POST` per query.
pub struct HttpOracle {
    host: String,
    client: reqwest::Client,
}

impl HttpOracle {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build OcalAPI HTTP client")?;
        Ok(Self {
            host: host.into(),
            client,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        Self::new(settings.ocal_host.clone(), settings.request_timeout())
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn query(&self, request: &OcalRequest) -> OcalReply {
        log_info!(
            "Querying OcalAPI at {} ({} points, {} subspaces)",
            self.host,
            request.data.len(),
            request.subspaces.len()
        );

        let response = match self
            .client
            .post(&self.host)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                log_warn!("OcalAPI request failed: {}", err);
                return OcalReply::connection_failed();
            }
        };

        // Error statuses still carry a JSON body with `detail` or `error`.
        let status = response.status();
        match response.json::<OcalReply>().await {
            Ok(reply) => {
                if let Some(message) = reply.failure() {
                    log_warn!("OcalAPI answered {} with failure: {}", status, message);
                }
                reply
            }
            Err(err) => {
                log_warn!("Unreadable OcalAPI reply ({}): {}", status, err);
                OcalReply::connection_failed()
            }
        }
    }
}
