//! HTML message bodies. Every user-controlled string goes through `escape`.

use crate::proxmox::{ResourceDetails, ResourceKind, ResourceSummary};
use crate::workflow::{FormState, Limits, Rejection, Step};
use teloxide::utils::html::escape;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

pub const ACCESS_DENIED: &str = "⛔️ Access denied.";

pub fn greeting(first_name: &str, node: &str) -> String {
    format!(
        "👋 Hi, {}!\nI manage virtual machines and containers on Proxmox node <b>{}</b>.\n\nChoose an action:",
        escape(first_name),
        escape(node)
    )
}

pub fn error(e: &anyhow::Error) -> String {
    format!("❌ Error: {}", escape(&e.to_string()))
}

pub fn uptime(secs: u64) -> Option<String> {
    if secs == 0 {
        return None;
    }
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let mins = (secs % 3_600) / 60;
    Some(if days > 0 {
        format!("{}d {}h {}m", days, hours, mins)
    } else {
        format!("{}h {}m", hours, mins)
    })
}

pub fn resource_list(kind: ResourceKind, items: &[ResourceSummary]) -> String {
    if items.is_empty() {
        return format!("📭 No {}s yet.", kind.label());
    }
    let mut text = format!("📋 <b>{} list:</b>\n\n", kind.label());
    for r in items {
        text.push_str(&format!(
            "{} <code>{}</code> - {} ({})",
            super::keyboard::status_icon(r.status.is_running()),
            r.vmid,
            escape(&r.name),
            r.status.as_str()
        ));
        if let Some(ip) = &r.ip {
            text.push_str(&format!(" {}", escape(ip)));
        }
        text.push('\n');
    }
    text.push_str(&format!("\n<b>Tap a {} for details:</b>", kind.label()));
    text
}

/// Full status card. `password` is only shown for containers, as created.
pub fn details(d: &ResourceDetails, password: Option<&str>) -> String {
    let label = d.kind.label();
    let mem_used = d.mem_used_bytes as f64 / MIB;
    let mut mem_total = d.mem_total_bytes as f64 / MIB;
    if mem_total == 0.0 {
        mem_total = d.memory_mb as f64;
    }
    let disk_used = d.disk_used_bytes as f64 / GIB;
    let mut disk_total = d.disk_total_bytes as f64 / GIB;
    if disk_total == 0.0 {
        disk_total = d.disk_gb;
    }

    let mut text = format!(
        "📊 <b>{} details</b>\n\n\
         🆔 VMID: <code>{}</code>\n\
         📛 Name: {}\n\
         {} Status: <b>{}</b>\n\n\
         🖥️ <b>Resources:</b>\n\
         \u{20}  CPU: {} core(s)\n\
         \u{20}  RAM: {:.0} / {:.0} MB\n\
         \u{20}  Disk: {:.1} / {:.1} GB\n\n",
        label,
        d.vmid,
        escape(&d.name),
        super::keyboard::status_icon(d.status.is_running()),
        d.status.as_str().to_uppercase(),
        d.cores,
        mem_used,
        mem_total,
        disk_used,
        disk_total,
    );

    if d.kind == ResourceKind::Lxc {
        text.push_str(&format!(
            "🔑 <b>Access:</b>\n   User: <code>root</code>\n   Password: <code>{}</code>\n\n",
            escape(password.unwrap_or("not found"))
        ));
    }

    if d.status.is_running() {
        let ip = d.ip.as_deref().unwrap_or("not yet known");
        text.push_str(&format!(
            "🌐 <b>Network:</b>\n   IP: {}\n\n⏱️ <b>Uptime:</b> {}\n\n🔑 <b>SSH:</b>\n<code>ssh root@{}</code>\n",
            escape(ip),
            uptime(d.uptime_secs).unwrap_or_else(|| "just started".to_string()),
            escape(d.ip.as_deref().unwrap_or(placeholder_ip(d.kind))),
        ));
    } else {
        text.push_str(&format!(
            "⏹️ {} is stopped\n\n▶️ Start it to get an IP address and SSH access\n",
            label
        ));
    }
    text
}

fn placeholder_ip(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Qemu => "VM_IP",
        ResourceKind::Lxc => "LXC_IP",
    }
}

/// Prompt for the current step, confirming the value captured just before it.
pub fn prompt(kind: ResourceKind, state: &FormState) -> String {
    let label = kind.label();
    match state {
        FormState::AwaitingName => match kind {
            ResourceKind::Qemu => {
                "📝 Enter the <b>VM name</b>:\n(e.g. web-server, db, test-vm)".to_string()
            }
            ResourceKind::Lxc => {
                "📝 Enter the <b>container name</b>:\n(e.g. web-container, db-lxc, test)"
                    .to_string()
            }
        },
        FormState::AwaitingSource { choices, .. } => match kind {
            ResourceKind::Qemu if choices.is_empty() => {
                "💿 No ISO images found in storage.".to_string()
            }
            ResourceKind::Qemu => "💿 Choose an <b>ISO image</b> to install from:".to_string(),
            ResourceKind::Lxc => "📦 Choose an <b>OS template</b>:".to_string(),
        },
        FormState::AwaitingCpu { source, .. } => {
            let what = match kind {
                ResourceKind::Qemu => "ISO",
                ResourceKind::Lxc => "Template",
            };
            format!(
                "✅ {}: {}\n\n🖥️ Enter the number of <b>CPU cores</b>:\n(e.g. 1, 2, 4)",
                what,
                escape(&source.label)
            )
        }
        FormState::AwaitingMemory { cpu, .. } => format!(
            "✅ CPU: {} core(s)\n\n💾 Enter <b>RAM (MB)</b>:\n(e.g. {})",
            cpu,
            match kind {
                ResourceKind::Qemu => "512, 1024, 2048, 4096",
                ResourceKind::Lxc => "512, 1024, 2048",
            }
        ),
        FormState::AwaitingDisk { memory_mb, .. } => format!(
            "✅ RAM: {} MB\n\n💽 Enter the <b>{} disk size (GB)</b>:\n(e.g. {})",
            memory_mb,
            label,
            match kind {
                ResourceKind::Qemu => "10, 20, 50, 100",
                ResourceKind::Lxc => "4, 8, 16, 32",
            }
        ),
    }
}

pub fn rejection(step: Step, rejection: &Rejection, limits: &Limits) -> String {
    let range = match step {
        Step::Cpu => Some(&limits.cpu),
        Step::Memory => Some(&limits.memory_mb),
        Step::Disk => Some(&limits.disk_gb),
        Step::Name | Step::Source => None,
    };
    match (rejection, range) {
        (Rejection::OutOfRange { min, max }, _) => {
            format!("❌ Enter a number from {} to {}", min, max)
        }
        (Rejection::NotANumber, Some(r)) => {
            format!("❌ Enter a number from {} to {}", r.start(), r.end())
        }
        (Rejection::NotANumber, None) => "❌ Enter a number".to_string(),
        (Rejection::InvalidName, _) => {
            "❌ Names may contain letters, digits, '-' and '.', up to 63 characters. Try again:"
                .to_string()
        }
        (Rejection::ChooseSource, _) => "👆 Pick one of the buttons above.".to_string(),
        (Rejection::UnknownChoice, _) => {
            "❌ That option is no longer available, pick another one.".to_string()
        }
    }
}

pub const NO_ISO_HELP: &str = "❌ There are no ISO images in storage.\nUpload an ISO to the Proxmox image storage and try again.";

pub fn cancelled(kind: Option<ResourceKind>) -> String {
    match kind {
        Some(k) => format!("❌ {} creation cancelled.", k.label()),
        None => "❌ Creation cancelled.".to_string(),
    }
}

pub fn creating(kind: ResourceKind, name: &str) -> String {
    format!("⏳ Creating {} '{}'...", kind.label(), escape(name))
}

pub fn created_starting(kind: ResourceKind, vmid: i64) -> String {
    format!("✅ {} created! VMID: <code>{}</code>\n⏳ Starting...", kind.label(), vmid)
}

pub struct CreatedReport<'a> {
    pub kind: ResourceKind,
    pub vmid: i64,
    pub name: &'a str,
    pub source_label: &'a str,
    pub cores: u32,
    pub memory_mb: u32,
    pub disk_gb: u32,
    pub ip: Option<&'a str>,
    pub password: &'a str,
    pub cloudinit_user: &'a str,
}

pub fn created(r: &CreatedReport<'_>) -> String {
    let (source_kind, placeholder) = match r.kind {
        ResourceKind::Qemu => ("💿 ISO", "VM_IP"),
        ResourceKind::Lxc => ("📦 Template", "LXC_IP"),
    };
    let mut text = format!(
        "✅ <b>{} created and started!</b>\n\n\
         🆔 VMID: <code>{}</code>\n\
         📛 Name: {}\n\
         {}: {}\n\
         🖥️ CPU: {} core(s)\n\
         💾 RAM: {} MB\n\
         💽 Disk: {} GB\n\
         🌐 IP: {}\n\n",
        r.kind.label(),
        r.vmid,
        escape(r.name),
        source_kind,
        escape(r.source_label),
        r.cores,
        r.memory_mb,
        r.disk_gb,
        escape(r.ip.unwrap_or("waiting...")),
    );
    match r.kind {
        ResourceKind::Qemu => text.push_str(&format!(
            "☁️ <b>Cloud-Init:</b>\n   User: <code>{}</code>\n   🔑 Password: <code>{}</code>\n\n",
            escape(r.cloudinit_user),
            escape(r.password)
        )),
        ResourceKind::Lxc => text.push_str(&format!(
            "🔑 <b>Access:</b>\n   User: <code>root</code>\n   🔑 Password: <code>{}</code>\n\n",
            escape(r.password)
        )),
    }
    text.push_str(&format!(
        "🔑 <b>SSH:</b>\n<code>ssh root@{}</code>\n\n",
        escape(r.ip.unwrap_or(placeholder))
    ));
    match r.kind {
        ResourceKind::Qemu => text.push_str(
            "⚠️ To install the OS:\n\
             1. Open the console in Proxmox\n\
             2. Run through the installer\n\
             3. After reboot cloud-init applies the settings\n\n\
             🔐 <b>Save the password!</b> It can be looked up later from the Cloud-Init button.",
        ),
        ResourceKind::Lxc => {
            text.push_str("🔐 The password is also shown on the container card.")
        }
    }
    text
}

pub fn started(kind: ResourceKind, vmid: i64, ip: Option<&str>) -> String {
    match ip {
        Some(ip) => format!(
            "✅ {} {} started!\n\n🌐 <b>IP address:</b>\n<code>{}</code>\n\n🔑 <b>SSH:</b>\n<code>ssh root@{}</code>",
            kind.label(),
            vmid,
            escape(ip),
            escape(ip)
        ),
        None => format!(
            "✅ {} {} started!\n\n⏳ <b>Waiting for an IP address...</b>\n\n💡 Press '🌐 Refresh IP' in a few seconds",
            kind.label(),
            vmid
        ),
    }
}

pub fn stopped(kind: ResourceKind, vmid: i64) -> String {
    format!("⏹️ {} {} stopped!", kind.label(), vmid)
}

pub fn restarted(kind: ResourceKind, vmid: i64) -> String {
    format!("🔄 {} {} restarted!", kind.label(), vmid)
}

pub fn deleted(kind: ResourceKind, vmid: i64) -> String {
    format!("🗑️ {} {} deleted!", kind.label(), vmid)
}

pub fn ip_found(vmid: i64, name: &str, ip: &str) -> String {
    format!(
        "🌐 <b>IP address updated!</b>\n\n🆔 VMID: <code>{}</code>\n📛 Name: {}\n🔑 <b>SSH:</b>\n<code>ssh root@{}</code>\n\n✅ IP: {}",
        vmid,
        escape(name),
        escape(ip),
        escape(ip)
    )
}

pub fn ip_pending(kind: ResourceKind, vmid: i64) -> String {
    let hints = match kind {
        ResourceKind::Qemu => {
            "• Make sure the VM is running\n• Check that qemu-guest-agent is installed\n• Wait for DHCP to hand out an address"
        }
        ResourceKind::Lxc => "• Make sure the container is running\n• Wait for DHCP to hand out an address",
    };
    format!(
        "⏳ <b>Waiting for an IP address...</b>\n\n🆔 VMID: <code>{}</code>\n\n💡 <b>Tips:</b>\n{}\n\n🔄 Try again in a few seconds",
        vmid, hints
    )
}

pub fn password(kind: ResourceKind, vmid: i64, name: &str, password: Option<&str>) -> String {
    let head = format!(
        "🔑 <b>Access to {} {}</b>\n\n📛 Name: {}\n👤 User: <code>root</code>\n",
        kind.label(),
        vmid,
        escape(name)
    );
    match password {
        Some(pw) => format!(
            "{}🔑 Password: <code>{}</code>\n\n🔑 <b>SSH:</b>\n<code>ssh root@{}</code>",
            head,
            escape(pw),
            placeholder_ip(kind)
        ),
        None => format!(
            "{}🔑 Password: <b>not stored</b>\n\n⚠️ <b>Note:</b>\n• The password is set at creation time\n• Reset it from the Proxmox console\n• Command: <code>passwd root</code>",
            head
        ),
    }
}

pub fn cloudinit(vmid: i64, user: &str, nameserver: &str, bridge: &str, password: Option<&str>) -> String {
    let pw = match password {
        Some(pw) => format!("<code>{}</code>", escape(pw)),
        None => "<b>generated at creation</b>".to_string(),
    };
    format!(
        "☁️ <b>Cloud-Init for VM {}</b>\n\n\
         👤 User: <code>{}</code>\n\
         🔑 Password: {}\n\
         🌐 Network: DHCP ({})\n\
         📶 DNS: {}\n\n\
         ⚙️ <b>Notes:</b>\n\
         • The password is applied on first boot\n\
         • SSH keys can be added in Proxmox\n\
         • Networking is configured automatically\n\n\
         💡 Reboot the VM after installing the OS to apply cloud-init",
        vmid,
        escape(user),
        pw,
        escape(bridge),
        escape(nameserver)
    )
}

pub const USE_MENU: &str = "Use /start to open the menu.";
pub const FORM_GONE: &str = "This form is no longer active. Use /start to begin again.";
