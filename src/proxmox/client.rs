use crate::proxmox::error::{ProxmoxError, Result as PveResult};
use anyhow::{Context, Result};
use log::debug;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Storage and network names used when building create requests.
#[derive(Debug, Clone)]
pub struct ProvisionDefaults {
    pub disk_storage: String,
    pub image_storage: String,
    pub bridge: String,
    pub nameserver: String,
    pub cloudinit_user: String,
}

impl Default for ProvisionDefaults {
    fn default() -> Self {
        Self {
            disk_storage: "local-lvm".to_string(),
            image_storage: "local".to_string(),
            bridge: "vmbr0".to_string(),
            nameserver: "8.8.8.8".to_string(),
            cloudinit_user: "root".to_string(),
        }
    }
}

/// Token-authenticated client bound to a single Proxmox node.
#[derive(Clone)]
pub struct ProxmoxClient {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
    pub(crate) node: String,
    pub(crate) defaults: ProvisionDefaults,
    pub(crate) poll_interval: Duration,
    api_token: Option<String>,
}

impl ProxmoxClient {
    pub fn new(host: &str, port: u16, node: &str, verify_ssl: bool) -> Result<Self> {
        let scheme = if host.starts_with("http://") {
            "http"
        } else {
            "https"
        };

        let host_cleaned = if let Some(stripped) = host.strip_prefix("http://") {
            stripped
        } else if let Some(stripped) = host.strip_prefix("https://") {
            stripped
        } else {
            host
        };
        let host_cleaned = host_cleaned.trim_end_matches('/');

        // An explicit port in the host wins over the configured one.
        let url_str = if host_cleaned.contains(':') {
            format!("{}://{}/api2/json/", scheme, host_cleaned)
        } else {
            format!("{}://{}:{}/api2/json/", scheme, host_cleaned, port)
        };

        let base_url = Url::parse(&url_str).context("Invalid host URL")?;

        let client = Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build reqwest client")?;

        Ok(Self {
            client,
            base_url,
            node: node.to_string(),
            defaults: ProvisionDefaults::default(),
            poll_interval: Duration::from_secs(1),
            api_token: None,
        })
    }

    /// `token_id` is the full `user@realm!name` identifier.
    pub fn set_api_token(&mut self, token_id: &str, token_secret: &str) {
        self.api_token = Some(format!("PVEAPIToken={}={}", token_id, token_secret));
    }

    pub fn with_defaults(mut self, defaults: ProvisionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Interval between guest agent polls while waiting for a VM address.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn defaults(&self) -> &ProvisionDefaults {
        &self.defaults
    }

    pub(crate) async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> PveResult<T> {
        let url = self.base_url.join(path).map_err(ProxmoxError::Url)?;
        debug!("{} {}", method, url);
        let mut req = self.client.request(method, url);

        if let Some(token) = &self.api_token {
            req = req.header("Authorization", token);
        }

        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await.map_err(ProxmoxError::Request)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            log::error!("Proxmox {} for {}: {}", status, path, text);
            return Err(ProxmoxError::Api(status, text));
        }

        let v: Value = resp.json().await.map_err(ProxmoxError::Request)?;
        if let Some(data) = v.get("data") {
            serde_json::from_value(data.clone()).map_err(ProxmoxError::Json)
        } else {
            serde_json::from_value(v).map_err(ProxmoxError::Json)
        }
    }

    pub(crate) fn guest_path(&self, kind: super::ResourceKind, vmid: i64) -> String {
        format!("nodes/{}/{}/{}", self.node, kind, vmid)
    }
}
