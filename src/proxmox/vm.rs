use super::client::ProxmoxClient;
use super::error::ProxmoxError;
use super::resource::{
    vmid_from, CreateSpec, PowerAction, Provisioned, RawListEntry, ResourceDetails, ResourceKind,
    ResourceSummary,
};
use crate::credentials::generate_password;
use anyhow::Result;
use log::{info, warn};
use reqwest::Method;
use serde_json::{json, Value};

const GENERATED_PASSWORD_LEN: usize = 16;

impl ProxmoxClient {
    /// Next free VMID. Proxmox returns it as a string.
    pub async fn next_vmid(&self) -> Result<i64> {
        let raw: Value = self.request(Method::GET, "cluster/nextid", None).await?;
        vmid_from(&raw)
            .ok_or_else(|| ProxmoxError::Unexpected(format!("nextid returned {}", raw)).into())
    }

    pub async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<ResourceSummary>> {
        let path = format!("nodes/{}/{}", self.node, kind);
        let entries: Vec<RawListEntry> = self.request(Method::GET, &path, None).await?;

        let mut all = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(vmid) = vmid_from(&entry.vmid) else {
                continue;
            };
            let ip = match kind {
                ResourceKind::Lxc => self.container_ip(vmid).await,
                ResourceKind::Qemu => None,
            };
            all.push(ResourceSummary {
                vmid,
                kind,
                name: entry.name.unwrap_or_else(|| kind.default_name(vmid)),
                status: entry.status.0,
                ip,
            });
        }
        all.sort_by_key(|r| r.vmid);
        Ok(all)
    }

    pub async fn resource_config(&self, kind: ResourceKind, vmid: i64) -> Result<Value> {
        let path = format!("{}/config", self.guest_path(kind, vmid));
        Ok(self.request(Method::GET, &path, None).await?)
    }

    pub async fn resource_status(&self, kind: ResourceKind, vmid: i64) -> Result<Value> {
        let path = format!("{}/status/current", self.guest_path(kind, vmid));
        Ok(self.request(Method::GET, &path, None).await?)
    }

    /// Config and live status without the address lookup.
    pub async fn resource_snapshot(&self, kind: ResourceKind, vmid: i64) -> Result<ResourceDetails> {
        let (config, status) = futures::try_join!(
            self.resource_config(kind, vmid),
            self.resource_status(kind, vmid)
        )?;
        Ok(ResourceDetails::from_parts(kind, vmid, &config, &status))
    }

    /// Config and live status in one record. The address is only looked up
    /// for running guests, waiting at most `ip_timeout` for the guest agent.
    pub async fn resource_details(
        &self,
        kind: ResourceKind,
        vmid: i64,
        ip_timeout: std::time::Duration,
    ) -> Result<ResourceDetails> {
        let mut details = self.resource_snapshot(kind, vmid).await?;
        if details.status.is_running() {
            details.ip = self.resolve_ip(kind, vmid, ip_timeout).await;
        }
        Ok(details)
    }

    /// Display name from the guest config, falling back to `vm-<id>` / `lxc-<id>`.
    pub async fn resource_name(&self, kind: ResourceKind, vmid: i64) -> Result<String> {
        let config = self.resource_config(kind, vmid).await?;
        Ok(config
            .get(kind.name_key())
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| kind.default_name(vmid)))
    }

    /// Creates a VM with the ISO attached as cdrom and cloud-init seeded
    /// with a generated root password.
    pub async fn create_vm(&self, spec: &CreateSpec) -> Result<Provisioned> {
        let vmid = self.next_vmid().await?;
        let password = generate_password(GENERATED_PASSWORD_LEN);
        let d = &self.defaults;

        let mut params = json!({
            "vmid": vmid,
            "name": spec.name,
            "cores": spec.cores,
            "memory": spec.memory_mb,
            "scsi0": format!("{}:{}", d.disk_storage, spec.disk_gb),
            "scsihw": "virtio-scsi-single",
            "agent": 1,
            "ostype": "l26",
            "bios": "seabios",
            "onboot": 1,
            "ide0": format!("{}:cloudinit", d.disk_storage),
            "ciuser": d.cloudinit_user,
            "cipassword": password,
            "nameserver": d.nameserver,
            "searchdomain": "local",
            "ipconfig0": "ip=dhcp",
            "net0": format!("virtio,bridge={}", d.bridge),
        });

        if let (Some(iso), Some(obj)) = (spec.source.as_deref(), params.as_object_mut()) {
            obj.insert("ide2".to_string(), json!(format!("{},media=cdrom", iso)));
            obj.insert("boot".to_string(), json!("order=ide2;scsi0"));
        }

        let path = format!("nodes/{}/qemu", self.node);
        let _: Value = self.request(Method::POST, &path, Some(&params)).await?;
        info!("Created VM {} ({})", vmid, spec.name);
        Ok(Provisioned { vmid, password })
    }

    /// Creates an unprivileged container with DHCP networking and a generated root password.
    pub async fn create_container(&self, spec: &CreateSpec) -> Result<Provisioned> {
        let vmid = self.next_vmid().await?;
        let password = generate_password(GENERATED_PASSWORD_LEN);
        let d = &self.defaults;
        let template = spec.source.as_deref().unwrap_or("ubuntu-22.04");

        let params = json!({
            "vmid": vmid,
            "hostname": spec.name,
            "ostemplate": self.template_volid(template),
            "cores": spec.cores,
            "memory": spec.memory_mb,
            "rootfs": format!("{}:{}", d.disk_storage, spec.disk_gb),
            "net0": format!("name=eth0,bridge={},ip=dhcp", d.bridge),
            "password": password,
            "onboot": 1,
            "unprivileged": 1,
        });

        let path = format!("nodes/{}/lxc", self.node);
        let _: Value = self.request(Method::POST, &path, Some(&params)).await?;
        info!("Created container {} ({})", vmid, spec.name);
        Ok(Provisioned { vmid, password })
    }

    pub async fn create(&self, kind: ResourceKind, spec: &CreateSpec) -> Result<Provisioned> {
        match kind {
            ResourceKind::Qemu => self.create_vm(spec).await,
            ResourceKind::Lxc => self.create_container(spec).await,
        }
    }

    /// Bare template names resolve against the image storage.
    pub fn template_volid(&self, template: &str) -> String {
        if template.contains('/') || template.contains(':') {
            template.to_string()
        } else {
            format!("{}:vztmpl/{}.tar.gz", self.defaults.image_storage, template)
        }
    }

    /// Returns the task UPID Proxmox hands back.
    pub async fn power(&self, kind: ResourceKind, vmid: i64, action: PowerAction) -> Result<String> {
        let path = format!("{}/status/{}", self.guest_path(kind, vmid), action.as_str());
        let res: Value = self.request(Method::POST, &path, None).await?;
        info!("{} {} {}", action.as_str(), kind, vmid);
        Ok(res.as_str().unwrap_or_default().to_string())
    }

    pub async fn delete_resource(&self, kind: ResourceKind, vmid: i64) -> Result<String> {
        let path = self.guest_path(kind, vmid);
        let res: Value = self.request(Method::DELETE, &path, None).await?;
        warn!("Deleted {} {}", kind, vmid);
        Ok(res.as_str().unwrap_or_default().to_string())
    }
}
