use crate::proxmox::ResourceKind;

/// Everything an inline button can ask for. Encoded as a short
/// `verb[:kind[:id]]` string to stay under Telegram's 64 byte limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Menu,
    List(ResourceKind),
    Create(ResourceKind),
    Info(ResourceKind, i64),
    Start(ResourceKind, i64),
    Stop(ResourceKind, i64),
    Restart(ResourceKind, i64),
    Delete(ResourceKind, i64),
    RefreshIp(ResourceKind, i64),
    Password(ResourceKind, i64),
    CloudInit(i64),
    PickSource(usize),
    NoSource,
    Cancel,
}

impl ButtonAction {
    pub fn encode(&self) -> String {
        match self {
            ButtonAction::Menu => "menu".to_string(),
            ButtonAction::List(k) => format!("list:{}", k),
            ButtonAction::Create(k) => format!("create:{}", k),
            ButtonAction::Info(k, id) => format!("info:{}:{}", k, id),
            ButtonAction::Start(k, id) => format!("start:{}:{}", k, id),
            ButtonAction::Stop(k, id) => format!("stop:{}:{}", k, id),
            ButtonAction::Restart(k, id) => format!("restart:{}:{}", k, id),
            ButtonAction::Delete(k, id) => format!("delete:{}:{}", k, id),
            ButtonAction::RefreshIp(k, id) => format!("ip:{}:{}", k, id),
            ButtonAction::Password(k, id) => format!("pw:{}:{}", k, id),
            ButtonAction::CloudInit(id) => format!("ci:{}", id),
            ButtonAction::PickSource(i) => format!("src:{}", i),
            ButtonAction::NoSource => "nosrc".to_string(),
            ButtonAction::Cancel => "cancel".to_string(),
        }
    }

    pub fn decode(data: &str) -> Option<Self> {
        let mut parts = data.split(':');
        let verb = parts.next()?;
        let rest: Vec<&str> = parts.collect();

        let guest = |ctor: fn(ResourceKind, i64) -> ButtonAction| match rest.as_slice() {
            [kind, id] => Some(ctor(kind.parse().ok()?, id.parse().ok()?)),
            _ => None,
        };
        let kind_only = |ctor: fn(ResourceKind) -> ButtonAction| match rest.as_slice() {
            [kind] => Some(ctor(kind.parse().ok()?)),
            _ => None,
        };

        match (verb, rest.as_slice()) {
            ("menu", []) => Some(ButtonAction::Menu),
            ("nosrc", []) => Some(ButtonAction::NoSource),
            ("cancel", []) => Some(ButtonAction::Cancel),
            ("list", _) => kind_only(ButtonAction::List),
            ("create", _) => kind_only(ButtonAction::Create),
            ("info", _) => guest(ButtonAction::Info),
            ("start", _) => guest(ButtonAction::Start),
            ("stop", _) => guest(ButtonAction::Stop),
            ("restart", _) => guest(ButtonAction::Restart),
            ("delete", _) => guest(ButtonAction::Delete),
            ("ip", _) => guest(ButtonAction::RefreshIp),
            ("pw", _) => guest(ButtonAction::Password),
            ("ci", [id]) => id.parse().ok().map(ButtonAction::CloudInit),
            ("src", [i]) => i.parse().ok().map(ButtonAction::PickSource),
            _ => None,
        }
    }
}
