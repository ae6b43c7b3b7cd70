use crate::bot::Timings;
use crate::cli::RunMode;
use crate::proxmox::ProvisionDefaults;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8006;
pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_DATABASE: &str = "proxmox-cloud.db";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub node: Option<String>,
    pub token_id: Option<String>,
    pub token_secret: Option<String>,
    pub no_verify_ssl: Option<bool>,

    pub telegram_token: Option<String>,
    #[serde(default)]
    pub admin_ids: Vec<u64>,

    pub database_path: Option<String>,
    pub secret_key: Option<String>,
    pub token_ttl_hours: Option<i64>,
    pub http_host: Option<String>,
    pub http_port: Option<u16>,

    pub disk_storage: Option<String>,
    pub image_storage: Option<String>,
    pub bridge: Option<String>,
    pub nameserver: Option<String>,

    pub boot_wait_secs: Option<u64>,
    pub ip_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut s = Config::builder();

        // An explicit path must exist; the default "config.toml" is optional.
        if let Some(path) = config_path {
            s = s.add_source(File::with_name(path).required(true));
        } else {
            s = s.add_source(File::with_name("config").required(false));
        }

        // PROXMOX_CLOUD_TOKEN_ID -> token_id, PROXMOX_CLOUD_ADMIN_IDS=1,2 -> [1, 2]
        s = s.add_source(
            Environment::with_prefix("PROXMOX_CLOUD")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("admin_ids"),
        );

        s.build()?.try_deserialize()
    }

    pub fn validate(&self, mode: RunMode) -> Result<(), String> {
        fn present(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.trim().is_empty())
        }

        if !present(&self.host) {
            return Err("Host is required".to_string());
        }
        if !present(&self.node) {
            return Err("Node is required".to_string());
        }
        if !present(&self.token_id) || !present(&self.token_secret) {
            return Err("API token id and secret are required".to_string());
        }
        if let Some(path) = &self.database_path {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Database directory {:?} does not exist", parent));
                }
            }
        }
        if mode.runs_bot() {
            if !present(&self.telegram_token) {
                return Err("Telegram token is required to run the bot".to_string());
            }
            if self.admin_ids.is_empty() {
                return Err("At least one admin id is required to run the bot".to_string());
            }
        }
        if mode.runs_api() && !present(&self.secret_key) {
            return Err("Secret key is required to run the REST API".to_string());
        }
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn database_path(&self) -> &str {
        self.database_path.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    pub fn http_host(&self) -> &str {
        self.http_host.as_deref().unwrap_or("0.0.0.0")
    }

    pub fn http_port(&self) -> u16 {
        self.http_port.unwrap_or(DEFAULT_HTTP_PORT)
    }

    pub fn token_ttl_hours(&self) -> i64 {
        self.token_ttl_hours.unwrap_or(12)
    }

    pub fn provision_defaults(&self) -> ProvisionDefaults {
        let mut d = ProvisionDefaults::default();
        if let Some(v) = &self.disk_storage {
            d.disk_storage = v.clone();
        }
        if let Some(v) = &self.image_storage {
            d.image_storage = v.clone();
        }
        if let Some(v) = &self.bridge {
            d.bridge = v.clone();
        }
        if let Some(v) = &self.nameserver {
            d.nameserver = v.clone();
        }
        d
    }

    pub fn timings(&self) -> Timings {
        let defaults = Timings::default();
        Timings {
            boot_wait: self
                .boot_wait_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.boot_wait),
            ip_timeout: self
                .ip_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.ip_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn complete() -> Settings {
        Settings {
            host: Some("10.0.0.2".into()),
            node: Some("pve".into()),
            token_id: Some("root@pam!cloud".into()),
            token_secret: Some("uuid".into()),
            telegram_token: Some("123:abc".into()),
            admin_ids: vec![42],
            secret_key: Some("jwt-secret".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "host = '1.2.3.4'\nnode = 'pve'\ntoken_id = 'root@pam!bot'\ntoken_secret = 's'\nadmin_ids = [1, 2]\nno_verify_ssl = true\nboot_wait_secs = 0"
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let settings = Settings::new(Some(path)).unwrap();

        assert_eq!(settings.host, Some("1.2.3.4".to_string()));
        assert_eq!(settings.token_id, Some("root@pam!bot".to_string()));
        assert_eq!(settings.admin_ids, vec![1, 2]);
        assert_eq!(settings.no_verify_ssl, Some(true));
        assert_eq!(settings.port(), 8006);
        assert_eq!(settings.timings().boot_wait, Duration::ZERO);
        assert_eq!(settings.timings().ip_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(Settings::new(Some("/nonexistent/proxmox-cloud.toml")).is_err());
    }

    #[test]
    fn test_validation_depends_on_mode() {
        let mut s = complete();
        assert!(s.validate(RunMode::All).is_ok());

        s.telegram_token = None;
        assert!(s.validate(RunMode::Bot).is_err());
        assert!(s.validate(RunMode::Api).is_ok());

        let mut s = complete();
        s.admin_ids.clear();
        assert!(s.validate(RunMode::Bot).is_err());

        let mut s = complete();
        s.secret_key = Some("  ".into());
        assert!(s.validate(RunMode::Api).is_err());
        assert!(s.validate(RunMode::Bot).is_ok());
    }

    #[test]
    fn test_validation_requires_token() {
        let mut s = complete();
        s.token_secret = None;
        assert_eq!(
            s.validate(RunMode::Api),
            Err("API token id and secret are required".to_string())
        );
    }

    #[test]
    fn test_provision_overrides() {
        let s = Settings {
            bridge: Some("vmbr1".into()),
            ..complete()
        };
        let d = s.provision_defaults();
        assert_eq!(d.bridge, "vmbr1");
        assert_eq!(d.disk_storage, "local-lvm");
    }
}
