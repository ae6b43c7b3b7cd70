use super::client::ProxmoxClient;
use super::resource::ResourceKind;
use log::debug;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Deserialize, Debug)]
struct ContainerInterface {
    name: Option<String>,
    inet: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct AgentInterfaces {
    #[serde(default)]
    result: Vec<AgentInterface>,
}

#[derive(Deserialize, Debug)]
struct AgentInterface {
    name: Option<String>,
    #[serde(rename = "ip-addresses", default)]
    ip_addresses: Vec<AgentAddress>,
}

#[derive(Deserialize, Debug)]
struct AgentAddress {
    #[serde(rename = "ip-address-type")]
    address_type: Option<String>,
    #[serde(rename = "ip-address")]
    address: Option<String>,
}

fn is_loopback(name: Option<&str>, addr: &str) -> bool {
    name == Some("lo") || addr.starts_with("127.")
}

impl ProxmoxClient {
    /// Best-effort address lookup. Never fails: an unreachable agent or
    /// missing interface just yields `None`.
    pub async fn resolve_ip(&self, kind: ResourceKind, vmid: i64, timeout: Duration) -> Option<String> {
        match kind {
            ResourceKind::Lxc => self.container_ip(vmid).await,
            ResourceKind::Qemu => self.wait_for_vm_ip(vmid, timeout).await,
        }
    }

    pub(crate) async fn container_ip(&self, vmid: i64) -> Option<String> {
        let path = format!("{}/interfaces", self.guest_path(ResourceKind::Lxc, vmid));
        let ifaces: Vec<ContainerInterface> = match self.request(Method::GET, &path, None).await {
            Ok(v) => v,
            Err(e) => {
                debug!("No interfaces for container {}: {}", vmid, e);
                return None;
            }
        };
        ifaces.into_iter().find_map(|iface| {
            let inet = iface.inet?;
            let addr = inet.split('/').next()?.to_string();
            (!addr.is_empty() && !is_loopback(iface.name.as_deref(), &addr)).then_some(addr)
        })
    }

    /// Polls the guest agent once per interval until an IPv4 shows up or `timeout` elapses.
    /// At least one query is always made, and no query outlives the deadline
    /// (a zero timeout still gets one poll-interval's worth).
    async fn wait_for_vm_ip(&self, vmid: i64, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let budget = deadline
                .saturating_duration_since(Instant::now())
                .max(self.poll_interval);
            match tokio::time::timeout(budget, self.agent_ip(vmid)).await {
                Ok(Some(ip)) => return Some(ip),
                Ok(None) => {}
                Err(_) => {
                    debug!("Guest agent of VM {} did not answer within {:?}", vmid, budget);
                    return None;
                }
            }
            if Instant::now() + self.poll_interval > deadline {
                return None;
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn agent_ip(&self, vmid: i64) -> Option<String> {
        let path = format!(
            "{}/agent/network-get-interfaces",
            self.guest_path(ResourceKind::Qemu, vmid)
        );
        let raw: Value = match self.request(Method::GET, &path, None).await {
            Ok(v) => v,
            Err(e) => {
                debug!("Guest agent of VM {} not answering: {}", vmid, e);
                return None;
            }
        };
        let ifaces: AgentInterfaces = serde_json::from_value(raw).unwrap_or_default();
        ifaces.result.into_iter().find_map(|iface| {
            let name = iface.name;
            iface.ip_addresses.into_iter().find_map(|a| {
                let addr = a.address?;
                (a.address_type.as_deref() == Some("ipv4") && !is_loopback(name.as_deref(), &addr))
                    .then_some(addr)
            })
        })
    }
}
