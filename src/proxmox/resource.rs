use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Which Proxmox subsystem owns a guest. Doubles as the API path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Qemu,
    Lxc,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Qemu => "qemu",
            ResourceKind::Lxc => "lxc",
        }
    }

    /// Short human label used in chat messages.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Qemu => "VM",
            ResourceKind::Lxc => "LXC",
        }
    }

    pub fn default_name(&self, vmid: i64) -> String {
        match self {
            ResourceKind::Qemu => format!("vm-{}", vmid),
            ResourceKind::Lxc => format!("lxc-{}", vmid),
        }
    }

    /// Config key holding the display name.
    pub(crate) fn name_key(&self) -> &'static str {
        match self {
            ResourceKind::Qemu => "name",
            ResourceKind::Lxc => "hostname",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qemu" | "vm" => Ok(ResourceKind::Qemu),
            "lxc" => Ok(ResourceKind::Lxc),
            other => Err(format!("unknown resource kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Running,
    Stopped,
    Unknown,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::Running => "running",
            PowerState::Stopped => "stopped",
            PowerState::Unknown => "unknown",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PowerState::Running)
    }
}

impl From<&str> for PowerState {
    fn from(s: &str) -> Self {
        match s {
            "running" => PowerState::Running,
            "stopped" => PowerState::Stopped,
            _ => PowerState::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for PowerStateField {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(PowerStateField(
            raw.as_deref().map(PowerState::from).unwrap_or(PowerState::Unknown),
        ))
    }
}

/// Lenient wrapper so unexpected status strings become `Unknown` instead of a parse error.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PowerStateField(pub PowerState);

/// Power transitions exposed by `status/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Stop,
    Shutdown,
    Reboot,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Stop => "stop",
            PowerAction::Shutdown => "shutdown",
            PowerAction::Reboot => "reboot",
        }
    }
}

/// One row of `GET nodes/{node}/{kind}`.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSummary {
    pub vmid: i64,
    pub kind: ResourceKind,
    pub name: String,
    pub status: PowerState,
    pub ip: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawListEntry {
    pub vmid: Value,
    pub name: Option<String>,
    #[serde(default = "unknown_state")]
    pub status: PowerStateField,
}

fn unknown_state() -> PowerStateField {
    PowerStateField(PowerState::Unknown)
}

/// Normalized config + status of a single guest.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDetails {
    pub vmid: i64,
    pub kind: ResourceKind,
    pub name: String,
    pub status: PowerState,
    pub cores: u32,
    pub memory_mb: u64,
    pub disk_gb: f64,
    pub os: String,
    pub ip: Option<String>,
    pub uptime_secs: u64,
    pub mem_used_bytes: u64,
    pub mem_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub disk_total_bytes: u64,
}

impl ResourceDetails {
    /// Builds details from the raw `config` and `status/current` payloads.
    pub fn from_parts(kind: ResourceKind, vmid: i64, config: &Value, status: &Value) -> Self {
        let name = config
            .get(kind.name_key())
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| kind.default_name(vmid));

        let os = match kind {
            ResourceKind::Qemu => config
                .get("ostype")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            ResourceKind::Lxc => config
                .get("ostype")
                .or_else(|| config.get("ostemplate"))
                .and_then(|v| v.as_str())
                .map(template_display_name)
                .unwrap_or_else(|| "unknown".to_string()),
        };

        let status_state = status
            .get("status")
            .and_then(|v| v.as_str())
            .map(PowerState::from)
            .unwrap_or(PowerState::Unknown);

        ResourceDetails {
            vmid,
            kind,
            name,
            status: status_state,
            cores: number(config.get("cores")).map(|c| c as u32).unwrap_or(1),
            memory_mb: number(config.get("memory")).map(|m| m as u64).unwrap_or(512),
            disk_gb: disk_size_gb(kind, config).unwrap_or(0.0),
            os,
            ip: None,
            uptime_secs: number(status.get("uptime")).map(|u| u as u64).unwrap_or(0),
            mem_used_bytes: number(status.get("mem")).map(|m| m as u64).unwrap_or(0),
            mem_total_bytes: number(status.get("maxmem")).map(|m| m as u64).unwrap_or(0),
            disk_used_bytes: number(status.get("disk")).map(|d| d as u64).unwrap_or(0),
            disk_total_bytes: number(status.get("maxdisk")).map(|d| d as u64).unwrap_or(0),
        }
    }
}

/// Parameters collected for a new guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSpec {
    pub name: String,
    /// ISO volid for VMs, template name or volid for containers.
    pub source: Option<String>,
    pub cores: u32,
    pub memory_mb: u32,
    pub disk_gb: u32,
}

/// Result of a successful create call.
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub vmid: i64,
    pub password: String,
}

/// An ISO image or container template available in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageItem {
    pub name: String,
    pub volid: String,
    pub size: u64,
}

/// Proxmox reports numbers sometimes as JSON numbers and sometimes as strings.
pub(crate) fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn vmid_from(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `local:vztmpl/debian-12-standard_12.2-1_amd64.tar.zst` -> `debian-12-standard_12.2-1_amd64`
pub fn template_display_name(volid: &str) -> String {
    let base = volid.rsplit('/').next().unwrap_or(volid);
    let base = base.rsplit(':').next().unwrap_or(base);
    for ext in [".tar.gz", ".tar.zst", ".tar.xz", ".tar"] {
        if let Some(stripped) = base.strip_suffix(ext) {
            return stripped.to_string();
        }
    }
    base.to_string()
}

const QEMU_DISK_KEYS: [&str; 4] = ["scsi0", "virtio0", "sata0", "ide0"];

/// Reads the primary disk size in GB from a guest config.
///
/// Accepts both `local-lvm:vm-100-disk-0,size=32G` and the create-time
/// shorthand `local-lvm:32`.
pub fn disk_size_gb(kind: ResourceKind, config: &Value) -> Option<f64> {
    let entry = match kind {
        ResourceKind::Lxc => config.get("rootfs").and_then(|v| v.as_str()),
        ResourceKind::Qemu => QEMU_DISK_KEYS
            .iter()
            .filter_map(|k| config.get(*k).and_then(|v| v.as_str()))
            .find(|v| !v.contains("media=cdrom") && !v.contains("cloudinit")),
    }?;
    parse_disk_entry(entry)
}

fn parse_disk_entry(entry: &str) -> Option<f64> {
    let mut parts = entry.split(',');
    let volume = parts.next()?;
    for opt in parts {
        if let Some(size) = opt.strip_prefix("size=") {
            return parse_size_gb(size);
        }
    }
    volume.rsplit(':').next().and_then(parse_size_gb)
}

fn parse_size_gb(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| c.is_ascii_alphabetic()) {
        Some((i, _)) => (&raw[..i], &raw[i..]),
        None => (raw, "G"),
    };
    let value: f64 = digits.parse().ok()?;
    match unit.to_ascii_uppercase().as_str() {
        "T" => Some(value * 1024.0),
        "G" => Some(value),
        "M" => Some(value / 1024.0),
        "K" => Some(value / (1024.0 * 1024.0)),
        _ => None,
    }
}
