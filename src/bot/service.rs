//! Transport-independent bot logic: access control, the creation form and
//! every action reachable from the inline keyboards.

use super::action::ButtonAction;
use super::keyboard::{self, Keyboard};
use super::report::{self, CreatedReport};
use crate::proxmox::{PowerAction, ProxmoxClient, ResourceKind};
use crate::store::{ResourceRecord, Store};
use crate::workflow::{
    fallback_templates, Completed, FormState, Input, Limits, PendingForms, SourceChoice, Step,
    Transition, UserKey,
};
use anyhow::Result;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Caller {
    pub id: UserKey,
    pub first_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct AdminList(HashSet<UserKey>);

impl AdminList {
    pub fn new(ids: impl IntoIterator<Item = UserKey>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn is_admin(&self, id: UserKey) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timings {
    /// Pause between a start request and the first address lookup.
    pub boot_wait: Duration,
    /// How long to poll the VM guest agent for an address.
    pub ip_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            boot_wait: Duration::from_secs(3),
            ip_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Where replies go: a Telegram chat in production, a vector in tests.
pub trait ReplySink: Send + Sync {
    fn send(&self, reply: Reply) -> impl Future<Output = Result<()>> + Send;
}

/// Immediate answer to a button press, shown before any work starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Silent,
    Toast(String),
    Alert(String),
}

pub struct BotService {
    proxmox: Arc<ProxmoxClient>,
    store: Store,
    forms: PendingForms,
    admins: AdminList,
    timings: Timings,
}

impl BotService {
    pub fn new(proxmox: Arc<ProxmoxClient>, store: Store, admins: AdminList, timings: Timings) -> Self {
        Self {
            proxmox,
            store,
            forms: PendingForms::new(),
            admins,
            timings,
        }
    }

    pub fn forms(&self) -> &PendingForms {
        &self.forms
    }

    pub fn ack(&self, user: UserKey, data: &str) -> Ack {
        if !self.admins.is_admin(user) {
            return Ack::Alert(report::ACCESS_DENIED.to_string());
        }
        match ButtonAction::decode(data) {
            Some(ButtonAction::Start(..)) => Ack::Toast("⏳ Starting...".to_string()),
            Some(ButtonAction::RefreshIp(..)) => Ack::Toast("🔄 Looking up IP...".to_string()),
            Some(ButtonAction::Delete(..)) => Ack::Toast("🗑️ Deleting...".to_string()),
            _ => Ack::Silent,
        }
    }

    pub async fn handle_text<S: ReplySink>(&self, caller: &Caller, text: &str, sink: &S) -> Result<()> {
        if !self.admins.is_admin(caller.id) {
            warn!("Rejected message from user {}", caller.id);
            return sink.send(Reply::text(report::ACCESS_DENIED)).await;
        }

        let outcome = match text.trim() {
            "/start" | "/menu" => {
                self.forms.cancel(caller.id);
                self.show_menu(caller, sink).await
            }
            "/cancel" | "❌ Cancel" => self.cancel(caller, sink).await,
            t if t.eq_ignore_ascii_case("cancel") => self.cancel(caller, sink).await,
            "/vms" => self.show_list(ResourceKind::Qemu, sink).await,
            "/lxc" => self.show_list(ResourceKind::Lxc, sink).await,
            _ if self.forms.is_active(caller.id) => {
                self.advance(caller, Input::Text(text), sink).await
            }
            _ => sink.send(Reply::text(report::USE_MENU)).await,
        };
        self.report_failure(outcome, sink).await
    }

    /// Button presses from non-admins are dropped here; the ack already told them why.
    pub async fn handle_callback<S: ReplySink>(&self, caller: &Caller, data: &str, sink: &S) -> Result<()> {
        if !self.admins.is_admin(caller.id) {
            warn!("Rejected button press from user {}", caller.id);
            return Ok(());
        }
        let Some(action) = ButtonAction::decode(data) else {
            debug!("Unknown callback data {:?}", data);
            return Ok(());
        };
        let outcome = self.dispatch(caller, action, sink).await;
        self.report_failure(outcome, sink).await
    }

    async fn report_failure<S: ReplySink>(&self, outcome: Result<()>, sink: &S) -> Result<()> {
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Bot action failed: {:#}", e);
                sink.send(Reply::with_keyboard(report::error(&e), keyboard::main_menu()))
                    .await
            }
        }
    }

    async fn dispatch<S: ReplySink>(&self, caller: &Caller, action: ButtonAction, sink: &S) -> Result<()> {
        match action {
            ButtonAction::Menu => self.show_menu(caller, sink).await,
            ButtonAction::List(kind) => self.show_list(kind, sink).await,
            ButtonAction::Create(kind) => {
                self.forms.start(caller.id, kind);
                info!("User {} started creating a {}", caller.id, kind);
                sink.send(Reply::with_keyboard(
                    report::prompt(kind, &FormState::AwaitingName),
                    keyboard::cancel(),
                ))
                .await
            }
            ButtonAction::Info(kind, vmid) => self.show_details(kind, vmid, sink).await,
            ButtonAction::Start(kind, vmid) => self.start(kind, vmid, sink).await,
            ButtonAction::Stop(kind, vmid) => {
                self.proxmox.power(kind, vmid, PowerAction::Stop).await?;
                sink.send(Reply::with_keyboard(
                    report::stopped(kind, vmid),
                    keyboard::back_to(kind, vmid),
                ))
                .await
            }
            ButtonAction::Restart(kind, vmid) => {
                self.proxmox.power(kind, vmid, PowerAction::Reboot).await?;
                sink.send(Reply::with_keyboard(
                    report::restarted(kind, vmid),
                    keyboard::back_to(kind, vmid),
                ))
                .await
            }
            ButtonAction::Delete(kind, vmid) => {
                self.proxmox.delete_resource(kind, vmid).await?;
                if let Err(e) = self.store.forget_resource(vmid) {
                    warn!("Failed to forget {} {}: {:#}", kind, vmid, e);
                }
                sink.send(Reply::with_keyboard(
                    report::deleted(kind, vmid),
                    keyboard::back_to_list(kind),
                ))
                .await
            }
            ButtonAction::RefreshIp(kind, vmid) => self.refresh_ip(kind, vmid, sink).await,
            ButtonAction::Password(kind, vmid) => {
                let name = self.proxmox.resource_name(kind, vmid).await?;
                let password = self.stored_password(vmid);
                sink.send(Reply::with_keyboard(
                    report::password(kind, vmid, &name, password.as_deref()),
                    keyboard::back_to(kind, vmid),
                ))
                .await
            }
            ButtonAction::CloudInit(vmid) => {
                let d = self.proxmox.defaults();
                let password = self.stored_password(vmid);
                sink.send(Reply::with_keyboard(
                    report::cloudinit(
                        vmid,
                        &d.cloudinit_user,
                        &d.nameserver,
                        &d.bridge,
                        password.as_deref(),
                    ),
                    keyboard::back_to(ResourceKind::Qemu, vmid),
                ))
                .await
            }
            ButtonAction::PickSource(index) => self.advance(caller, Input::Pick(index), sink).await,
            ButtonAction::NoSource => {
                self.forms.cancel(caller.id);
                sink.send(Reply::with_keyboard(report::NO_ISO_HELP, keyboard::main_menu()))
                    .await
            }
            ButtonAction::Cancel => self.cancel(caller, sink).await,
        }
    }

    async fn show_menu<S: ReplySink>(&self, caller: &Caller, sink: &S) -> Result<()> {
        sink.send(Reply::with_keyboard(
            report::greeting(&caller.first_name, self.proxmox.node()),
            keyboard::main_menu(),
        ))
        .await
    }

    async fn show_list<S: ReplySink>(&self, kind: ResourceKind, sink: &S) -> Result<()> {
        let items = self.proxmox.list_resources(kind).await?;
        let keyboard = if items.is_empty() {
            keyboard::empty_list(kind)
        } else {
            keyboard::resource_list(kind, &items)
        };
        sink.send(Reply::with_keyboard(report::resource_list(kind, &items), keyboard))
            .await
    }

    async fn show_details<S: ReplySink>(&self, kind: ResourceKind, vmid: i64, sink: &S) -> Result<()> {
        let details = self
            .proxmox
            .resource_details(kind, vmid, self.timings.ip_timeout)
            .await?;
        let password = match kind {
            ResourceKind::Lxc => self.stored_password(vmid),
            ResourceKind::Qemu => None,
        };
        sink.send(Reply::with_keyboard(
            report::details(&details, password.as_deref()),
            keyboard::resource(kind, vmid),
        ))
        .await
    }

    async fn start<S: ReplySink>(&self, kind: ResourceKind, vmid: i64, sink: &S) -> Result<()> {
        self.proxmox.power(kind, vmid, PowerAction::Start).await?;
        tokio::time::sleep(self.timings.boot_wait).await;
        let ip = self
            .proxmox
            .resolve_ip(kind, vmid, self.timings.ip_timeout)
            .await;
        let keyboard = match ip {
            Some(_) => keyboard::back_to(kind, vmid),
            None => keyboard::waiting_for_ip(kind, vmid),
        };
        sink.send(Reply::with_keyboard(
            report::started(kind, vmid, ip.as_deref()),
            keyboard,
        ))
        .await
    }

    /// A single lookup; the user can press the button again.
    async fn refresh_ip<S: ReplySink>(&self, kind: ResourceKind, vmid: i64, sink: &S) -> Result<()> {
        match self.proxmox.resolve_ip(kind, vmid, Duration::ZERO).await {
            Some(ip) => {
                let name = self
                    .proxmox
                    .resource_name(kind, vmid)
                    .await
                    .unwrap_or_else(|_| kind.default_name(vmid));
                sink.send(Reply::with_keyboard(
                    report::ip_found(vmid, &name, &ip),
                    keyboard::back_to(kind, vmid),
                ))
                .await
            }
            None => {
                sink.send(Reply::with_keyboard(
                    report::ip_pending(kind, vmid),
                    keyboard::waiting_for_ip(kind, vmid),
                ))
                .await
            }
        }
    }

    async fn cancel<S: ReplySink>(&self, caller: &Caller, sink: &S) -> Result<()> {
        let kind = self.forms.get(caller.id).map(|f| f.kind());
        self.forms.cancel(caller.id);
        sink.send(Reply::with_keyboard(report::cancelled(kind), keyboard::main_menu()))
            .await
    }

    async fn advance<S: ReplySink>(&self, caller: &Caller, input: Input<'_>, sink: &S) -> Result<()> {
        let Some((kind, transition)) = self.forms.apply(caller.id, input) else {
            return sink.send(Reply::text(report::FORM_GONE)).await;
        };

        match transition {
            Transition::Advanced(Step::Source) => {
                let choices = self.source_choices(kind).await;
                self.forms.offer_sources(caller.id, choices);
                self.prompt(caller, sink).await
            }
            Transition::Advanced(_) => self.prompt(caller, sink).await,
            Transition::Rejected(step, rejection) => {
                let keyboard = match step {
                    Step::Source => self.source_keyboard(caller),
                    _ => keyboard::cancel(),
                };
                sink.send(Reply::with_keyboard(
                    report::rejection(step, &rejection, &Limits::for_kind(kind)),
                    keyboard,
                ))
                .await
            }
            Transition::Ignored => {
                debug!("Ignoring stale input from user {}", caller.id);
                Ok(())
            }
            Transition::Completed(done) => self.provision(done, sink).await,
        }
    }

    async fn prompt<S: ReplySink>(&self, caller: &Caller, sink: &S) -> Result<()> {
        let Some(form) = self.forms.get(caller.id) else {
            return Ok(());
        };
        let keyboard = match form.step() {
            Step::Source => keyboard::sources(form.kind(), form.choices()),
            _ => keyboard::cancel(),
        };
        sink.send(Reply::with_keyboard(
            report::prompt(form.kind(), form.state()),
            keyboard,
        ))
        .await
    }

    fn source_keyboard(&self, caller: &Caller) -> Keyboard {
        match self.forms.get(caller.id) {
            Some(form) => keyboard::sources(form.kind(), form.choices()),
            None => keyboard::cancel(),
        }
    }

    /// ISOs for VMs; templates for containers, with a fixed list when storage has none.
    async fn source_choices(&self, kind: ResourceKind) -> Vec<SourceChoice> {
        match kind {
            ResourceKind::Qemu => self
                .proxmox
                .list_isos()
                .await
                .into_iter()
                .map(SourceChoice::from)
                .collect(),
            ResourceKind::Lxc => {
                let templates: Vec<SourceChoice> = self
                    .proxmox
                    .list_templates()
                    .await
                    .into_iter()
                    .map(SourceChoice::from)
                    .collect();
                if templates.is_empty() {
                    fallback_templates()
                } else {
                    templates
                }
            }
        }
    }

    /// Create, remember the password, start, wait for boot, then report.
    async fn provision<S: ReplySink>(&self, done: Completed, sink: &S) -> Result<()> {
        let Completed { kind, source, spec } = done;
        sink.send(Reply::text(report::creating(kind, &spec.name))).await?;

        let created = self.proxmox.create(kind, &spec).await?;
        let record = ResourceRecord {
            vmid: created.vmid,
            kind,
            name: spec.name.clone(),
            os: Some(source.label.clone()),
            password: Some(created.password.clone()),
        };
        if let Err(e) = self.store.register_created(&record) {
            warn!("Failed to store password for {} {}: {:#}", kind, created.vmid, e);
        }
        sink.send(Reply::text(report::created_starting(kind, created.vmid)))
            .await?;

        self.proxmox
            .power(kind, created.vmid, PowerAction::Start)
            .await?;
        tokio::time::sleep(self.timings.boot_wait).await;
        let ip = self
            .proxmox
            .resolve_ip(kind, created.vmid, self.timings.ip_timeout)
            .await;

        let text = report::created(&CreatedReport {
            kind,
            vmid: created.vmid,
            name: &spec.name,
            source_label: &source.label,
            cores: spec.cores,
            memory_mb: spec.memory_mb,
            disk_gb: spec.disk_gb,
            ip: ip.as_deref(),
            password: &created.password,
            cloudinit_user: &self.proxmox.defaults().cloudinit_user,
        });
        let keyboard = match ip {
            Some(_) => keyboard::resource(kind, created.vmid),
            None => keyboard::waiting_for_ip(kind, created.vmid),
        };
        sink.send(Reply::with_keyboard(text, keyboard)).await
    }

    fn stored_password(&self, vmid: i64) -> Option<String> {
        match self.store.resource_password(vmid) {
            Ok(pw) => pw,
            Err(e) => {
                warn!("Password lookup for {} failed: {:#}", vmid, e);
                None
            }
        }
    }
}
