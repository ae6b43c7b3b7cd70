//! Multi-step creation form.
//!
//! Each admin can have one form in flight. The form walks through
//! name -> OS source -> cpu -> memory -> disk, validating every answer
//! against per-kind limits. Invalid answers leave the form untouched so the
//! same question can be asked again.

use crate::proxmox::{CreateSpec, ResourceKind, StorageItem};
use dashmap::DashMap;
use std::ops::RangeInclusive;

pub type UserKey = u64;

const MAX_NAME_LEN: usize = 63;

/// Accepted ranges for the numeric fields of one resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub cpu: RangeInclusive<u32>,
    pub memory_mb: RangeInclusive<u32>,
    pub disk_gb: RangeInclusive<u32>,
}

impl Limits {
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Qemu => Self {
                cpu: 1..=128,
                memory_mb: 256..=262_144,
                disk_gb: 4..=10_240,
            },
            ResourceKind::Lxc => Self {
                cpu: 1..=128,
                memory_mb: 128..=65_536,
                disk_gb: 2..=1_024,
            },
        }
    }

    /// Checks a complete spec, as used by the REST facade. The error names
    /// the first offending field.
    pub fn check(&self, spec: &CreateSpec) -> Result<(), (&'static str, Rejection)> {
        validate_name(&spec.name).map_err(|r| ("name", r))?;
        in_range(spec.cores, &self.cpu).map_err(|r| ("cpu", r))?;
        in_range(spec.memory_mb, &self.memory_mb).map_err(|r| ("memory", r))?;
        in_range(spec.disk_gb, &self.disk_gb).map_err(|r| ("disk", r))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Name,
    Source,
    Cpu,
    Memory,
    Disk,
}

/// Something to choose at the source step: an ISO, a template volid, or a
/// bare template name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceChoice {
    pub label: String,
    pub value: String,
}

impl From<StorageItem> for SourceChoice {
    fn from(item: StorageItem) -> Self {
        Self {
            label: item.name,
            value: item.volid,
        }
    }
}

/// Offered when the template storage is empty; Proxmox resolves the bare names.
pub fn fallback_templates() -> Vec<SourceChoice> {
    [
        ("Ubuntu 22.04", "ubuntu-22.04"),
        ("Ubuntu 20.04", "ubuntu-20.04"),
        ("Debian 11", "debian-11"),
        ("Debian 12", "debian-12"),
        ("Alpine 3.18", "alpine-3.18"),
        ("Alpine 3.19", "alpine-3.19"),
        ("CentOS 7", "centos-7"),
        ("Rocky Linux 9", "rockylinux-9"),
    ]
    .into_iter()
    .map(|(label, value)| SourceChoice {
        label: label.to_string(),
        value: value.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    AwaitingName,
    AwaitingSource {
        name: String,
        choices: Vec<SourceChoice>,
    },
    AwaitingCpu {
        name: String,
        source: SourceChoice,
    },
    AwaitingMemory {
        name: String,
        source: SourceChoice,
        cpu: u32,
    },
    AwaitingDisk {
        name: String,
        source: SourceChoice,
        cpu: u32,
        memory_mb: u32,
    },
}

impl FormState {
    pub fn step(&self) -> Step {
        match self {
            FormState::AwaitingName => Step::Name,
            FormState::AwaitingSource { .. } => Step::Source,
            FormState::AwaitingCpu { .. } => Step::Cpu,
            FormState::AwaitingMemory { .. } => Step::Memory,
            FormState::AwaitingDisk { .. } => Step::Disk,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Text(&'a str),
    Pick(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotANumber,
    OutOfRange { min: u32, max: u32 },
    InvalidName,
    ChooseSource,
    UnknownChoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Moved on; the caller should prompt for this step.
    Advanced(Step),
    /// Input refused; the form still waits on the same step.
    Rejected(Step, Rejection),
    /// All fields collected.
    Completed(Completed),
    /// Input does not apply to the current step (e.g. a stale button).
    Ignored,
}

/// A finished form, ready to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub kind: ResourceKind,
    pub source: SourceChoice,
    pub spec: CreateSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationForm {
    kind: ResourceKind,
    state: FormState,
}

impl CreationForm {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            state: FormState::AwaitingName,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step()
    }

    pub fn limits(&self) -> Limits {
        Limits::for_kind(self.kind)
    }

    /// Choices offered at the source step; empty at any other step.
    pub fn choices(&self) -> &[SourceChoice] {
        match &self.state {
            FormState::AwaitingSource { choices, .. } => choices,
            _ => &[],
        }
    }

    /// Fills in the choices shown at the source step. No-op elsewhere.
    pub fn offer_sources(&mut self, offered: Vec<SourceChoice>) {
        if let FormState::AwaitingSource { choices, .. } = &mut self.state {
            *choices = offered;
        }
    }

    pub fn apply(&mut self, input: Input<'_>) -> Transition {
        let limits = self.limits();
        let step = self.step();

        let next = match (&self.state, input) {
            (FormState::AwaitingName, Input::Text(text)) => match validate_name(text) {
                Ok(name) => FormState::AwaitingSource {
                    name,
                    choices: Vec::new(),
                },
                Err(r) => return Transition::Rejected(step, r),
            },
            (FormState::AwaitingSource { .. }, Input::Text(_)) => {
                return Transition::Rejected(step, Rejection::ChooseSource)
            }
            (FormState::AwaitingSource { name, choices }, Input::Pick(index)) => {
                match choices.get(index) {
                    Some(choice) => FormState::AwaitingCpu {
                        name: name.clone(),
                        source: choice.clone(),
                    },
                    None => return Transition::Rejected(step, Rejection::UnknownChoice),
                }
            }
            (FormState::AwaitingCpu { name, source }, Input::Text(text)) => {
                match parse_in_range(text, &limits.cpu) {
                    Ok(cpu) => FormState::AwaitingMemory {
                        name: name.clone(),
                        source: source.clone(),
                        cpu,
                    },
                    Err(r) => return Transition::Rejected(step, r),
                }
            }
            (FormState::AwaitingMemory { name, source, cpu }, Input::Text(text)) => {
                match parse_in_range(text, &limits.memory_mb) {
                    Ok(memory_mb) => FormState::AwaitingDisk {
                        name: name.clone(),
                        source: source.clone(),
                        cpu: *cpu,
                        memory_mb,
                    },
                    Err(r) => return Transition::Rejected(step, r),
                }
            }
            (
                FormState::AwaitingDisk {
                    name,
                    source,
                    cpu,
                    memory_mb,
                },
                Input::Text(text),
            ) => {
                return match parse_in_range(text, &limits.disk_gb) {
                    Ok(disk_gb) => Transition::Completed(Completed {
                        kind: self.kind,
                        source: source.clone(),
                        spec: CreateSpec {
                            name: name.clone(),
                            source: Some(source.value.clone()),
                            cores: *cpu,
                            memory_mb: *memory_mb,
                            disk_gb,
                        },
                    }),
                    Err(r) => Transition::Rejected(step, r),
                };
            }
            (_, Input::Pick(_)) => return Transition::Ignored,
        };

        self.state = next;
        Transition::Advanced(self.step())
    }
}

fn validate_name(text: &str) -> Result<String, Rejection> {
    let name = text.trim();
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !name.starts_with('-');
    if valid {
        Ok(name.to_string())
    } else {
        Err(Rejection::InvalidName)
    }
}

fn in_range(value: u32, range: &RangeInclusive<u32>) -> Result<u32, Rejection> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(Rejection::OutOfRange {
            min: *range.start(),
            max: *range.end(),
        })
    }
}

fn parse_in_range(text: &str, range: &RangeInclusive<u32>) -> Result<u32, Rejection> {
    let trimmed = text.trim();
    match trimmed.parse::<u32>() {
        Ok(v) => in_range(v, range),
        // Negative or huge numbers are still numbers; report the range.
        Err(_) if trimmed.parse::<i128>().is_ok() => Err(Rejection::OutOfRange {
            min: *range.start(),
            max: *range.end(),
        }),
        Err(_) => Err(Rejection::NotANumber),
    }
}

/// In-flight forms keyed by user. Starting a new form replaces the old one.
#[derive(Default, Clone)]
pub struct PendingForms {
    forms: std::sync::Arc<DashMap<UserKey, CreationForm>>,
}

impl PendingForms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, user: UserKey, kind: ResourceKind) {
        self.forms.insert(user, CreationForm::new(kind));
    }

    pub fn cancel(&self, user: UserKey) -> bool {
        self.forms.remove(&user).is_some()
    }

    pub fn is_active(&self, user: UserKey) -> bool {
        self.forms.contains_key(&user)
    }

    pub fn get(&self, user: UserKey) -> Option<CreationForm> {
        self.forms.get(&user).map(|f| f.clone())
    }

    /// Feeds input to the user's form. A completed form is removed from the
    /// store before it is returned.
    pub fn apply(&self, user: UserKey, input: Input<'_>) -> Option<(ResourceKind, Transition)> {
        let (kind, transition) = {
            let mut form = self.forms.get_mut(&user)?;
            let kind = form.kind();
            (kind, form.apply(input))
        };
        if matches!(transition, Transition::Completed(_)) {
            self.forms.remove(&user);
        }
        Some((kind, transition))
    }

    pub fn offer_sources(&self, user: UserKey, choices: Vec<SourceChoice>) {
        if let Some(mut form) = self.forms.get_mut(&user) {
            form.offer_sources(choices);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(v: &str) -> SourceChoice {
        SourceChoice {
            label: v.to_string(),
            value: v.to_string(),
        }
    }

    fn form_at_cpu(kind: ResourceKind) -> CreationForm {
        let mut form = CreationForm::new(kind);
        assert_eq!(form.apply(Input::Text("web-1")), Transition::Advanced(Step::Source));
        form.offer_sources(vec![choice("debian-12")]);
        assert_eq!(form.apply(Input::Pick(0)), Transition::Advanced(Step::Cpu));
        form
    }

    #[test]
    fn test_container_cpu_range() {
        let mut form = form_at_cpu(ResourceKind::Lxc);
        let before = form.clone();

        assert_eq!(
            form.apply(Input::Text("129")),
            Transition::Rejected(Step::Cpu, Rejection::OutOfRange { min: 1, max: 128 })
        );
        assert_eq!(form, before);

        assert_eq!(form.apply(Input::Text("4")), Transition::Advanced(Step::Memory));
    }

    #[test]
    fn test_invalid_input_keeps_captured_fields() {
        let mut form = form_at_cpu(ResourceKind::Qemu);
        form.apply(Input::Text("2"));
        let before = form.clone();

        for bad in ["abc", "", "100", "300000", "-5", "1.5"] {
            assert!(matches!(
                form.apply(Input::Text(bad)),
                Transition::Rejected(Step::Memory, _)
            ));
            assert_eq!(form, before);
        }
    }

    #[test]
    fn test_non_numeric_and_negative_rejections() {
        let mut form = form_at_cpu(ResourceKind::Lxc);
        assert_eq!(
            form.apply(Input::Text("four")),
            Transition::Rejected(Step::Cpu, Rejection::NotANumber)
        );
        assert_eq!(
            form.apply(Input::Text("-1")),
            Transition::Rejected(Step::Cpu, Rejection::OutOfRange { min: 1, max: 128 })
        );
    }

    #[test]
    fn test_full_vm_form_completes() {
        let mut form = form_at_cpu(ResourceKind::Qemu);
        assert_eq!(form.apply(Input::Text("2")), Transition::Advanced(Step::Memory));
        assert_eq!(form.apply(Input::Text("2048")), Transition::Advanced(Step::Disk));
        match form.apply(Input::Text(" 20 ")) {
            Transition::Completed(done) => {
                assert_eq!(done.kind, ResourceKind::Qemu);
                assert_eq!(
                    done.spec,
                    CreateSpec {
                        name: "web-1".to_string(),
                        source: Some("debian-12".to_string()),
                        cores: 2,
                        memory_mb: 2048,
                        disk_gb: 20,
                    }
                );
            }
            other => panic!("unexpected transition {:?}", other),
        }
    }

    #[test]
    fn test_disk_limits_differ_by_kind() {
        assert_eq!(Limits::for_kind(ResourceKind::Qemu).disk_gb, 4..=10_240);
        assert_eq!(Limits::for_kind(ResourceKind::Lxc).disk_gb, 2..=1_024);
        assert_eq!(Limits::for_kind(ResourceKind::Lxc).memory_mb, 128..=65_536);
    }

    #[test]
    fn test_source_step_requires_a_pick() {
        let mut form = CreationForm::new(ResourceKind::Lxc);
        form.apply(Input::Text("db"));
        form.offer_sources(vec![choice("alpine-3.19")]);

        assert_eq!(
            form.apply(Input::Text("alpine")),
            Transition::Rejected(Step::Source, Rejection::ChooseSource)
        );
        assert_eq!(
            form.apply(Input::Pick(3)),
            Transition::Rejected(Step::Source, Rejection::UnknownChoice)
        );
        assert_eq!(form.choices().len(), 1);
    }

    #[test]
    fn test_stale_pick_is_ignored() {
        let mut form = form_at_cpu(ResourceKind::Lxc);
        let before = form.clone();
        assert_eq!(form.apply(Input::Pick(0)), Transition::Ignored);
        assert_eq!(form, before);
    }

    #[test]
    fn test_name_validation() {
        let mut form = CreationForm::new(ResourceKind::Qemu);
        let too_long = "x".repeat(64);
        for bad in ["", "   ", "has space", "-lead", too_long.as_str(), "имя"] {
            assert_eq!(
                form.apply(Input::Text(bad)),
                Transition::Rejected(Step::Name, Rejection::InvalidName)
            );
        }
        assert_eq!(form.step(), Step::Name);
    }

    #[test]
    fn test_pending_forms_cancel_and_restart() {
        let forms = PendingForms::new();
        forms.start(7, ResourceKind::Lxc);
        forms.apply(7, Input::Text("db"));
        assert_eq!(forms.get(7).unwrap().step(), Step::Source);

        assert!(forms.cancel(7));
        assert!(!forms.is_active(7));
        assert!(forms.apply(7, Input::Text("4")).is_none());

        forms.start(7, ResourceKind::Lxc);
        assert_eq!(forms.get(7).unwrap().state(), &FormState::AwaitingName);
    }

    #[test]
    fn test_start_overwrites_previous_form() {
        let forms = PendingForms::new();
        forms.start(1, ResourceKind::Qemu);
        forms.apply(1, Input::Text("old"));
        forms.start(1, ResourceKind::Lxc);
        let form = forms.get(1).unwrap();
        assert_eq!(form.kind(), ResourceKind::Lxc);
        assert_eq!(form.step(), Step::Name);
    }

    #[test]
    fn test_completed_form_leaves_store() {
        let forms = PendingForms::new();
        forms.start(9, ResourceKind::Lxc);
        forms.apply(9, Input::Text("c1"));
        forms.offer_sources(9, fallback_templates());
        forms.apply(9, Input::Pick(0));
        forms.apply(9, Input::Text("1"));
        forms.apply(9, Input::Text("512"));
        let (kind, t) = forms.apply(9, Input::Text("8")).unwrap();
        assert_eq!(kind, ResourceKind::Lxc);
        assert!(matches!(t, Transition::Completed(_)));
        assert!(!forms.is_active(9));
    }

    #[test]
    fn test_forms_are_per_user() {
        let forms = PendingForms::new();
        forms.start(1, ResourceKind::Qemu);
        forms.start(2, ResourceKind::Lxc);
        forms.apply(1, Input::Text("one"));
        assert_eq!(forms.get(1).unwrap().step(), Step::Source);
        assert_eq!(forms.get(2).unwrap().step(), Step::Name);
    }
}
