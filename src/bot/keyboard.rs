use super::action::ButtonAction;
use crate::proxmox::{ResourceKind, ResourceSummary};
use crate::workflow::SourceChoice;

/// Most guests listed as buttons under a list message.
const MAX_LIST_BUTTONS: usize = 10;
const MAX_LABEL_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    pub fn single(button: Button) -> Self {
        Self {
            rows: vec![vec![button]],
        }
    }

    pub fn actions(&self) -> impl Iterator<Item = ButtonAction> + '_ {
        self.rows.iter().flatten().map(|b| b.action)
    }

    pub fn contains(&self, action: ButtonAction) -> bool {
        self.actions().any(|a| a == action)
    }
}

pub fn main_menu() -> Keyboard {
    Keyboard::new(vec![
        vec![
            Button::new("📋 VM list", ButtonAction::List(ResourceKind::Qemu)),
            Button::new("➕ Create VM", ButtonAction::Create(ResourceKind::Qemu)),
        ],
        vec![
            Button::new("📦 LXC list", ButtonAction::List(ResourceKind::Lxc)),
            Button::new("🐳 Create LXC", ButtonAction::Create(ResourceKind::Lxc)),
        ],
        vec![Button::new("🔄 Refresh", ButtonAction::Menu)],
    ])
}

pub fn cancel() -> Keyboard {
    Keyboard::single(Button::new("❌ Cancel", ButtonAction::Cancel))
}

fn truncate(label: &str) -> String {
    label.chars().take(MAX_LABEL_CHARS).collect()
}

/// One button per offered image or template, or a "nothing available" button.
pub fn sources(kind: ResourceKind, choices: &[SourceChoice]) -> Keyboard {
    let icon = match kind {
        ResourceKind::Qemu => "💿",
        ResourceKind::Lxc => "📦",
    };
    let mut rows: Vec<Vec<Button>> = choices
        .iter()
        .enumerate()
        .map(|(i, c)| {
            vec![Button::new(
                format!("{} {}", icon, truncate(&c.label)),
                ButtonAction::PickSource(i),
            )]
        })
        .collect();
    if rows.is_empty() {
        rows.push(vec![Button::new("❌ No ISO images", ButtonAction::NoSource)]);
    }
    rows.push(vec![Button::new("❌ Cancel", ButtonAction::Cancel)]);
    Keyboard::new(rows)
}

pub fn resource_list(kind: ResourceKind, items: &[ResourceSummary]) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = items
        .iter()
        .take(MAX_LIST_BUTTONS)
        .map(|r| {
            vec![Button::new(
                format!("{} {} | {}", status_icon(r.status.is_running()), r.vmid, r.name),
                ButtonAction::Info(kind, r.vmid),
            )]
        })
        .collect();
    rows.push(vec![Button::new("🔙 Back", ButtonAction::Menu)]);
    Keyboard::new(rows)
}

/// Actions on a single guest.
pub fn resource(kind: ResourceKind, vmid: i64) -> Keyboard {
    let extra = match kind {
        ResourceKind::Qemu => Button::new("☁️ Cloud-Init", ButtonAction::CloudInit(vmid)),
        ResourceKind::Lxc => Button::new("🔑 Password", ButtonAction::Password(kind, vmid)),
    };
    Keyboard::new(vec![
        vec![
            Button::new("▶️ Start", ButtonAction::Start(kind, vmid)),
            Button::new("⏹️ Stop", ButtonAction::Stop(kind, vmid)),
        ],
        vec![
            Button::new("🔄 Restart", ButtonAction::Restart(kind, vmid)),
            Button::new("🗑️ Delete", ButtonAction::Delete(kind, vmid)),
        ],
        vec![
            extra,
            Button::new("🌐 Refresh IP", ButtonAction::RefreshIp(kind, vmid)),
        ],
        vec![Button::new("🔙 Back to list", ButtonAction::List(kind))],
    ])
}

/// Shown while an address is still pending.
pub fn waiting_for_ip(kind: ResourceKind, vmid: i64) -> Keyboard {
    Keyboard::new(vec![
        vec![Button::new("🌐 Refresh IP", ButtonAction::RefreshIp(kind, vmid))],
        vec![Button::new(
            format!("🔙 Back to {}", kind.label()),
            ButtonAction::Info(kind, vmid),
        )],
    ])
}

pub fn back_to(kind: ResourceKind, vmid: i64) -> Keyboard {
    Keyboard::single(Button::new(
        format!("🔙 Back to {}", kind.label()),
        ButtonAction::Info(kind, vmid),
    ))
}

pub fn back_to_list(kind: ResourceKind) -> Keyboard {
    Keyboard::single(Button::new("🔙 Back to list", ButtonAction::List(kind)))
}

/// Nothing to list yet: offer to create one.
pub fn empty_list(kind: ResourceKind) -> Keyboard {
    Keyboard::new(vec![
        vec![Button::new(
            format!("➕ Create {}", kind.label()),
            ButtonAction::Create(kind),
        )],
        vec![Button::new("🔙 Back", ButtonAction::Menu)],
    ])
}

pub fn status_icon(running: bool) -> &'static str {
    if running {
        "🟢"
    } else {
        "🔴"
    }
}
