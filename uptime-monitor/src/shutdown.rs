//! Host shutdown.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::tracing::prelude::*;

/// Something that can ask the host to power down.
///
/// Called at most once per run. Implementations must not wait for the host
/// to actually go down.
#[async_trait]
pub trait ShutdownCollaborator: Send {
    async fn request_shutdown(&mut self) -> io::Result<()>;
}

/// Runs `shutdown -h` and leaves it running in the background.
#[derive(Debug, Clone)]
pub struct SystemShutdown {
    delay_minutes: u32,
}

impl SystemShutdown {
    pub fn new(delay_minutes: u32) -> Self {
        Self { delay_minutes }
    }

    /// Arguments passed to `shutdown`.
    pub fn args(&self) -> [String; 2] {
        let when = match self.delay_minutes {
            0 => "now".to_string(),
            m => format!("+{}", m),
        };
        ["-h".to_string(), when]
    }
}

#[async_trait]
impl ShutdownCollaborator for SystemShutdown {
    async fn request_shutdown(&mut self) -> io::Result<()> {
        let args = self.args();
        let child = Command::new("shutdown")
            .args(&args)
            .stdin(Stdio::null())
            .spawn()?;
        info!(
            pid = ?child.id(),
            when = %args[1],
            "Host shutdown scheduled"
        );
        // Not awaited; the exit status does not matter to us
        drop(child);
        Ok(())
    }
}

/// Logs instead of shutting down. For bench testing on a powered hat.
#[derive(Debug, Clone, Default)]
pub struct DryRunShutdown;

#[async_trait]
impl ShutdownCollaborator for DryRunShutdown {
    async fn request_shutdown(&mut self) -> io::Result<()> {
        warn!("Dry run: host shutdown NOT requested");
        Ok(())
    }
}
