//! RPC method handlers
//!
//! Handles:
//! - `system` object: logs, process table and signals, init scripts, SSH keys
//! - `network` object: conntrack, ARP, DHCP leases, routing tables
//!
//! A handler receives the call parameters and an empty [`Response`], reads
//! the live OS source, and returns the filled response. Nothing is cached
//! between calls.

pub mod network;
pub mod system;

use crate::config::{AgentConfig, CommandConfig, SourcePaths};
use crate::logread::{read_tail, LogBlob, TailLimits};
use crate::settings::{SettingsLookup, UciStore};
use crate::status::{RpcError, RpcResult, SourceContext};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

/// Everything a handler may touch on the host
#[derive(Clone)]
pub struct HandlerContext {
    pub sources: SourcePaths,
    pub commands: CommandConfig,
    pub limits: TailLimits,
    pub settings: Arc<dyn SettingsLookup>,
}

impl HandlerContext {
    pub fn new(
        sources: SourcePaths,
        commands: CommandConfig,
        limits: TailLimits,
        settings: Arc<dyn SettingsLookup>,
    ) -> Self {
        Self {
            sources,
            commands,
            limits,
            settings,
        }
    }

    /// Context backed by the UCI directory named in the config
    pub fn from_config(config: &AgentConfig) -> Self {
        let settings = Arc::new(UciStore::new(&config.sources.uci_dir));
        Self::new(
            config.sources.clone(),
            config.commands.clone(),
            config.logs.tail_limits(),
            settings,
        )
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("sources", &self.sources)
            .field("commands", &self.commands)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Decode call parameters; absent parameters count as an empty object
pub fn parse_params<T: DeserializeOwned>(params: &Value) -> RpcResult<T> {
    let params = match params {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(params).map_err(|e| RpcError::invalid(e.to_string()))
}

/// Whole source file as text; invalid UTF-8 is replaced
pub(crate) async fn read_source(path: &Path) -> RpcResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .source_context(format!("reading {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Start an external command with stdout piped back to us
fn spawn_reader(argv: &[String]) -> RpcResult<(Child, ChildStdout)> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| RpcError::invalid("empty command line"))?;

    debug!("Running {:?}", argv);
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .source_context(format!("starting {}", program))?;

    let stdout = child.stdout.take().ok_or_else(|| RpcError::Io {
        context: format!("reading {}", program),
        source: io::Error::new(io::ErrorKind::Other, "stdout not captured"),
    })?;

    Ok((child, stdout))
}

/// Stop and reap a reader once we have what we need from it
async fn finish_reader(mut child: Child, program: &str) {
    // a stream reader may still be producing output
    if let Err(e) = child.start_kill() {
        debug!("{} already gone: {}", program, e);
    }

    match child.wait().await {
        Ok(status) => debug!("{} finished: {}", program, status),
        Err(e) => warn!("Failed to reap {}: {}", program, e),
    }
}

/// Tail of a command's output, bounded the same way as log files
pub(crate) async fn command_tail(
    argv: &[String],
    requested: usize,
    limits: TailLimits,
) -> RpcResult<LogBlob> {
    let (child, stdout) = spawn_reader(argv)?;
    let program = argv.first().map(String::as_str).unwrap_or_default();

    let blob = read_tail(stdout, requested, None, limits).await;
    finish_reader(child, program).await;

    blob.source_context(format!("reading output of {}", program))
}

/// Complete output of a short-lived command
pub(crate) async fn command_output(argv: &[String]) -> RpcResult<String> {
    let (child, mut stdout) = spawn_reader(argv)?;
    let program = argv.first().map(String::as_str).unwrap_or_default();

    let mut output = Vec::new();
    let read = stdout.read_to_end(&mut output).await;
    finish_reader(child, program).await;

    read.source_context(format!("reading output of {}", program))?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use symbion_devkit::FakeHost;

    /// Handler context rooted in a fake host; commands replay fixture files
    pub fn context(host: &FakeHost) -> HandlerContext {
        let replay = |fixture: &str| {
            vec![
                "cat".to_string(),
                host.path(fixture).to_string_lossy().into_owned(),
            ]
        };

        let sources = SourcePaths::rooted_at(host.root());
        let settings = Arc::new(UciStore::new(&sources.uci_dir));
        let commands = CommandConfig {
            process_snapshot: replay("fixtures/top.txt"),
            kernel_log: replay("fixtures/dmesg.txt"),
            system_log: replay("fixtures/logread.txt"),
        };

        HandlerContext::new(sources, commands, TailLimits::default(), settings)
    }
}
