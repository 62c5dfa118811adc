// ── `adb` executable backend ──
//
// Implements both collaborator traits by shelling out to the platform
// tools binary. Every invocation is bounded by a timeout and the child
// is killed if the future is dropped.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{HostBridge, ShellGateway, parse};
use crate::error::CoreError;
use crate::model::{Transport, TransportSerial};

/// Talks to the bridge through the `adb` command-line client.
#[derive(Debug, Clone)]
pub struct AdbCli {
    program: PathBuf,
    /// Bound for host-only commands (`devices`, `disconnect`).
    host_timeout: Duration,
}

impl AdbCli {
    pub fn new(program: impl Into<PathBuf>, host_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            host_timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run `adb <args>` and return stdout followed by stderr.
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<(bool, String), CoreError> {
        let command_line = format!("adb {}", args.join(" "));
        debug!(command = %command_line, "executing");

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| CoreError::CommandTimeout {
                command: command_line.clone(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        Ok((output.status.success(), text))
    }
}

impl Default for AdbCli {
    fn default() -> Self {
        Self::new("adb", Duration::from_secs(4))
    }
}

#[async_trait]
impl ShellGateway for AdbCli {
    async fn execute(
        &self,
        serial: &TransportSerial,
        command: &str,
        timeout: Duration,
    ) -> Result<String, CoreError> {
        let (ok, output) = self
            .run(&["-s", serial.as_str(), "shell", command], timeout)
            .await?;
        if ok {
            Ok(output)
        } else {
            Err(CoreError::communication(
                serial.as_str(),
                format!("`{command}` failed: {}", output.trim()),
            ))
        }
    }
}

#[async_trait]
impl HostBridge for AdbCli {
    async fn set_listening(
        &self,
        serial: &TransportSerial,
        port: u16,
        timeout: Duration,
    ) -> Result<bool, CoreError> {
        let port = port.to_string();
        let (_, output) = self
            .run(&["-s", serial.as_str(), "tcpip", &port], timeout)
            .await?;
        Ok(parse::tcpip_accepted(&output))
    }

    async fn connect(&self, addr: SocketAddr, timeout: Duration) -> Result<bool, CoreError> {
        let target = addr.to_string();
        let (_, output) = self.run(&["connect", &target], timeout).await?;
        Ok(parse::connect_succeeded(&output, addr))
    }

    async fn disconnect(&self, serial: &TransportSerial) -> Result<bool, CoreError> {
        let (_, output) = self
            .run(&["disconnect", serial.as_str()], self.host_timeout)
            .await?;
        Ok(parse::disconnect_succeeded(&output))
    }

    async fn list_transports(&self) -> Result<Vec<Transport>, CoreError> {
        let (ok, output) = self.run(&["devices", "-l"], self.host_timeout).await?;
        if !ok {
            return Err(CoreError::communication("host", output.trim().to_owned()));
        }
        Ok(parse::transports(&output))
    }
}
