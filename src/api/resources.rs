//! VM and container endpoints. The same handlers serve `/vms` and `/lxc`;
//! the kind comes from a router-level extension.

use super::error::{ApiError, ApiResult};
use super::middleware::AuthenticatedUser;
use super::AppState;
use crate::proxmox::{CreateSpec, PowerAction, ResourceDetails, ResourceKind, ResourceSummary};
use crate::store::ResourceRecord;
use crate::workflow::{Limits, Rejection};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_OS: &str = "ubuntu-22.04";

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub name: String,
    pub os: Option<String>,
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
    pub disk: Option<u32>,
}

impl CreateRequest {
    fn into_spec(self, kind: ResourceKind) -> (String, CreateSpec) {
        let os = self.os.unwrap_or_else(|| DEFAULT_OS.to_string());
        // VMs only boot from a real ISO volid; a bare OS name is just a label.
        let source = match kind {
            ResourceKind::Qemu if !os.contains(':') => None,
            _ => Some(os.clone()),
        };
        let spec = CreateSpec {
            name: self.name.trim().to_string(),
            source,
            cores: self.cpu.unwrap_or(1),
            memory_mb: self.memory.unwrap_or(2048),
            disk_gb: self.disk.unwrap_or(10),
        };
        (os, spec)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ResourceView {
    pub vmid: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub os: String,
    pub cpu: u32,
    pub memory: u64,
    pub disk: u64,
    pub ip: Option<String>,
    pub status: String,
    pub password: Option<String>,
}

impl ResourceView {
    fn from_details(d: ResourceDetails, password: Option<String>) -> Self {
        Self {
            vmid: d.vmid,
            name: d.name,
            kind: d.kind,
            os: d.os,
            cpu: d.cores,
            memory: d.memory_mb,
            disk: d.disk_gb.round() as u64,
            ip: d.ip,
            status: d.status.as_str().to_string(),
            password,
        }
    }
}

fn check_limits(kind: ResourceKind, spec: &CreateSpec) -> ApiResult<()> {
    Limits::for_kind(kind)
        .check(spec)
        .map_err(|(field, rejection)| {
            ApiError::BadRequest(match rejection {
                Rejection::OutOfRange { min, max } => {
                    format!("{} must be between {} and {}", field, min, max)
                }
                Rejection::InvalidName => {
                    "name must be 1-63 characters of letters, digits, '-' and '.'".to_string()
                }
                other => format!("invalid {}: {:?}", field, other),
            })
        })
}

async fn view(state: &AppState, kind: ResourceKind, vmid: i64, ip_timeout: Duration) -> ApiResult<ResourceView> {
    let details = state.proxmox.resource_details(kind, vmid, ip_timeout).await?;
    let password = state.store.resource_password(vmid)?;
    Ok(ResourceView::from_details(details, password))
}

/// Reuses the address the listing already found; otherwise looks it up once
/// rather than polling.
async fn listed_view(state: &AppState, summary: ResourceSummary) -> ApiResult<ResourceView> {
    let (kind, vmid) = (summary.kind, summary.vmid);
    let mut details = state.proxmox.resource_snapshot(kind, vmid).await?;
    if details.status.is_running() {
        details.ip = match summary.ip {
            Some(ip) => Some(ip),
            None => state.proxmox.resolve_ip(kind, vmid, Duration::ZERO).await,
        };
    }
    let password = state.store.resource_password(vmid)?;
    Ok(ResourceView::from_details(details, password))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
) -> ApiResult<Json<Vec<ResourceView>>> {
    let summaries = state.proxmox.list_resources(kind).await?;
    let views = try_join_all(summaries.into_iter().map(|s| listed_view(&state, s))).await?;
    Ok(Json(views))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path(vmid): Path<i64>,
) -> ApiResult<Json<ResourceView>> {
    Ok(Json(view(&state, kind, vmid, state.ip_timeout).await?))
}

/// Creates the guest without starting it.
pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(body): Json<CreateRequest>,
) -> ApiResult<Json<ResourceView>> {
    let (os, spec) = body.into_spec(kind);
    check_limits(kind, &spec)?;

    let created = state.proxmox.create(kind, &spec).await?;
    info!("User {} created {} {} ({})", user, kind, created.vmid, spec.name);

    let record = ResourceRecord {
        vmid: created.vmid,
        kind,
        name: spec.name.clone(),
        os: Some(os.clone()),
        password: Some(created.password.clone()),
    };
    if let Err(e) = state.store.register_created(&record) {
        warn!("Failed to store password for {} {}: {:#}", kind, created.vmid, e);
    }

    Ok(Json(ResourceView {
        vmid: created.vmid,
        name: spec.name,
        kind,
        os,
        cpu: spec.cores,
        memory: spec.memory_mb as u64,
        disk: spec.disk_gb as u64,
        ip: None,
        status: "created".to_string(),
        password: Some(created.password),
    }))
}

async fn power(state: &AppState, kind: ResourceKind, vmid: i64, action: PowerAction, done: &str) -> ApiResult<Json<Value>> {
    state.proxmox.power(kind, vmid, action).await?;
    Ok(Json(json!({ "status": done, "vmid": vmid })))
}

pub async fn start(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path(vmid): Path<i64>,
) -> ApiResult<Json<Value>> {
    power(&state, kind, vmid, PowerAction::Start, "started").await
}

pub async fn stop(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path(vmid): Path<i64>,
) -> ApiResult<Json<Value>> {
    power(&state, kind, vmid, PowerAction::Stop, "stopped").await
}

pub async fn shutdown(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path(vmid): Path<i64>,
) -> ApiResult<Json<Value>> {
    power(&state, kind, vmid, PowerAction::Shutdown, "shutting_down").await
}

pub async fn restart(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path(vmid): Path<i64>,
) -> ApiResult<Json<Value>> {
    power(&state, kind, vmid, PowerAction::Reboot, "restarting").await
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    Path(vmid): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.proxmox.delete_resource(kind, vmid).await?;
    if let Err(e) = state.store.forget_resource(vmid) {
        warn!("Failed to forget {} {}: {:#}", kind, vmid, e);
    }
    Ok(Json(json!({ "status": "deleted", "vmid": vmid })))
}
