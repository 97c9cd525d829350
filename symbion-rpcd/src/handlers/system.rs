//! `system` object handlers
//!
//! Handles:
//! - System and kernel log tails
//! - Process table snapshot and signalling
//! - Init script listing and lifecycle actions
//! - Dropbear authorized keys read and atomic rewrite

use super::{command_output, command_tail, parse_params, read_source, HandlerContext};
use crate::logread::read_tail;
use crate::parsers::initscript::{parse_init_script, InitScriptRecord};
use crate::parsers::process::parse_process_table;
use crate::parsers::sshkeys::{parse_authorized_keys, render_authorized_keys};
use crate::response::Response;
use crate::settings::{system_log_source, LogSource};
use crate::status::{RpcError, RpcResult, SourceContext};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Deserialize;
use serde_json::Value;
use std::fs::Metadata;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct SignalParams {
    pid: i32,
    signal: i32,
}

/// Lifecycle actions an init script accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitAction {
    Start,
    Stop,
    Reload,
    Restart,
    Enable,
    Disable,
}

impl InitAction {
    pub fn as_str(self) -> &'static str {
        match self {
            InitAction::Start => "start",
            InitAction::Stop => "stop",
            InitAction::Reload => "reload",
            InitAction::Restart => "restart",
            InitAction::Enable => "enable",
            InitAction::Disable => "disable",
        }
    }
}

#[derive(Debug, Deserialize)]
struct InitActionParams {
    name: String,
    action: InitAction,
}

#[derive(Debug, Deserialize)]
struct SshKeysParams {
    keys: Vec<Value>,
}

fn user_executable(meta: &Metadata) -> bool {
    meta.permissions().mode() & 0o100 != 0
}

/// `syslog()` → `{log}`
pub async fn syslog(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let source = system_log_source(ctx.settings.as_ref())
        .ok_or_else(|| RpcError::NotFound("system settings package".to_string()))?;

    let blob = match source {
        LogSource::File(path) => {
            let file = fs::File::open(&path)
                .await
                .source_context(format!("opening {}", path.display()))?;
            let len = file
                .metadata()
                .await
                .source_context(format!("inspecting {}", path.display()))?
                .len();

            let requested = usize::try_from(len).unwrap_or(usize::MAX);
            read_tail(file, requested, Some(len), ctx.limits)
                .await
                .source_context(format!("reading {}", path.display()))?
        }
        LogSource::Stream { requested } => {
            command_tail(&ctx.commands.system_log, requested, ctx.limits).await?
        }
    };

    debug!("syslog: {} bytes", blob.len());
    response.with_field("log", blob)
}

/// `dmesg()` → `{log}`
pub async fn dmesg(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let blob = command_tail(&ctx.commands.kernel_log, ctx.limits.max_size, ctx.limits).await?;
    response.with_field("log", blob)
}

/// `process_list()` → `{processes}`
pub async fn process_list(
    ctx: &HandlerContext,
    _params: &Value,
    response: Response,
) -> RpcResult<Response> {
    let snapshot = command_output(&ctx.commands.process_snapshot).await?;
    response.with_array("processes", parse_process_table(&snapshot))
}

/// `process_signal(pid, signal)` → `{}`; signal 0 only probes the process
pub async fn process_signal(
    _ctx: &HandlerContext,
    params: &Value,
    response: Response,
) -> RpcResult<Response> {
    let SignalParams { pid, signal } = parse_params(params)?;

    if pid <= 0 {
        return Err(RpcError::invalid(format!("pid {} is not a single process", pid)));
    }

    // Real-time signals are not accepted; nix only names the standard set
    let signal = match signal {
        0 => None,
        number => Some(
            Signal::try_from(number)
                .map_err(|_| RpcError::invalid(format!("unknown signal {}", number)))?,
        ),
    };

    info!("Sending {:?} to pid {}", signal, pid);
    match kill(Pid::from_raw(pid), signal) {
        Ok(()) => Ok(response),
        Err(Errno::EPERM) => Err(RpcError::PermissionDenied(format!("signalling pid {}", pid))),
        Err(errno) => Err(errno).source_context(format!("signalling pid {}", pid)),
    }
}

/// Metadata for one init.d entry; `None` when it is not a managed script
async fn inspect_init_script(
    ctx: &HandlerContext,
    name: &str,
    path: &Path,
) -> Option<InitScriptRecord> {
    let meta = fs::metadata(path).await.ok()?;
    if !meta.is_file() || !user_executable(&meta) {
        return None;
    }

    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) => {
            debug!("Skipping {}: {}", path.display(), e);
            return None;
        }
    };
    let header = parse_init_script(&String::from_utf8_lossy(&content))?;

    let linked = match header.start_link(name) {
        Some(link) => fs::metadata(ctx.sources.rc_dir.join(link))
            .await
            .map(|meta| user_executable(&meta))
            .unwrap_or(false),
        None => false,
    };

    Some(InitScriptRecord::new(name, header, linked))
}

/// `init_list()` → `{initscripts}`, in directory order
pub async fn init_list(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let dir = &ctx.sources.init_dir;
    let context = || format!("listing {}", dir.display());

    let mut entries = fs::read_dir(dir).await.source_context(context())?;
    let mut scripts = Vec::new();

    while let Some(entry) = entries.next_entry().await.source_context(context())? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(record) = inspect_init_script(ctx, &name, &entry.path()).await {
            scripts.push(record);
        }
    }

    response.with_array("initscripts", scripts)
}

fn validate_script_name(name: &str) -> RpcResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(RpcError::invalid(format!("invalid init script name {:?}", name)));
    }
    Ok(())
}

/// `init_action(name, action)` → `{}`; the script runs detached
pub async fn init_action(ctx: &HandlerContext, params: &Value, response: Response) -> RpcResult<Response> {
    let InitActionParams { name, action } = parse_params(params)?;
    validate_script_name(&name)?;

    let path = ctx.sources.init_dir.join(&name);
    let meta = fs::metadata(&path)
        .await
        .source_context(format!("inspecting {}", path.display()))?;

    if !user_executable(&meta) {
        return Err(RpcError::PermissionDenied(format!("{} is not executable", path.display())));
    }

    let mut child = Command::new(&path)
        .arg(action.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .current_dir("/")
        .spawn()
        .source_context(format!("starting {}", path.display()))?;

    info!("Started init script {} {}", name, action.as_str());

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!("Init script {} {} finished: {}", name, action.as_str(), status),
            Err(e) => warn!("Failed to reap init script {}: {}", name, e),
        }
    });

    Ok(response)
}

/// `sshkeys_get()` → `{keys}`
pub async fn sshkeys_get(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let text = read_source(&ctx.sources.authorized_keys).await?;
    response.with_array("keys", parse_authorized_keys(&text))
}

/// Replace `path` by rename so readers see the old or the new file, never a mix.
///
/// A symlink is resolved first so the link itself survives, and the existing
/// file mode is carried over to the replacement.
async fn write_atomic(path: &Path, body: String) -> io::Result<()> {
    let path: PathBuf = match fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(e),
    };

    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(body.as_bytes())?;
        match std::fs::metadata(&path) {
            Ok(existing) => file.as_file().set_permissions(existing.permissions())?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// `sshkeys_set(keys)` → `{}`
pub async fn sshkeys_set(ctx: &HandlerContext, params: &Value, response: Response) -> RpcResult<Response> {
    let SshKeysParams { keys } = parse_params(params)?;
    let path = &ctx.sources.authorized_keys;

    let body = render_authorized_keys(&keys);
    write_atomic(path, body)
        .await
        .source_context(format!("writing {}", path.display()))?;

    info!("Rewrote {} ({} entries supplied)", path.display(), keys.len());
    Ok(response)
}
