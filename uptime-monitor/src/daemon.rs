//! Daemon lifecycle.
//!
//! Opens the bus, checks the ADC answers, installs signal handling and
//! runs the monitor until it asks for a host shutdown, a signal arrives, or
//! sampling fails.

use anyhow::Context;
use tokio::signal::unix::{self, SignalKind};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::config::{ConfigError, MonitorConfig, OutputKind};
use crate::hw_trait::{I2c, LinuxI2c};
use crate::monitor::{Exit, Monitor};
use crate::shutdown::{DryRunShutdown, ShutdownCollaborator, SystemShutdown};
use crate::sink::{ConsoleSink, LogSink, ObservationSink};
use crate::tracing::prelude::*;

/// The main daemon.
pub struct Daemon {
    config: MonitorConfig,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Daemon {
    /// Create a daemon for an already validated configuration.
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Token that stops the monitor when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run on the Linux I2C adapter named in the configuration.
    pub async fn run(self) -> anyhow::Result<Exit> {
        let i2c = LinuxI2c::open(&self.config.i2c_bus)
            .with_context(|| format!("Failed to open {}", self.config.i2c_bus))?;
        self.run_with_bus(i2c).await
    }

    /// Run against any bus implementation.
    pub async fn run_with_bus<I: I2c>(self, i2c: I) -> anyhow::Result<Exit> {
        let config = &self.config;
        info!(
            profile = %config.profile,
            bus = %config.i2c_bus,
            address = %format!("0x{:02X}", config.address),
            dry_run = config.dry_run,
            "Starting."
        );

        let sink: Box<dyn ObservationSink> = match config.output {
            OutputKind::Console => Box::new(ConsoleSink::stdout()),
            OutputKind::Log => Box::new(LogSink),
        };
        let collaborator: Box<dyn ShutdownCollaborator> = if config.dry_run {
            Box::new(DryRunShutdown)
        } else {
            Box::new(SystemShutdown::new(config.shutdown_delay_minutes))
        };

        let mut monitor = Monitor::new(config, i2c, sink, collaborator);
        monitor
            .probe()
            .await
            .map_err(|source| ConfigError::Unreachable {
                address: config.address,
                bus: config.i2c_bus.clone(),
                source,
            })?;

        // Install signal handlers
        let mut sigint = unix::signal(SignalKind::interrupt())?;
        let mut sigterm = unix::signal(SignalKind::terminate())?;
        self.tracker.spawn({
            let shutdown = self.shutdown.clone();
            async move {
                tokio::select! {
                    _ = sigint.recv() => {
                        info!("Received SIGINT.");
                    },
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM.");
                    },
                    _ = shutdown.cancelled() => {},
                }
                shutdown.cancel();
            }
        });
        self.tracker.close();

        let result = monitor.run(self.shutdown.clone()).await;

        // Release the signal task if the monitor stopped on its own
        self.shutdown.cancel();
        self.tracker.wait().await;

        let exit = result.context("Monitoring stopped")?;
        if exit == Exit::Interrupted {
            info!("Exiting.");
        }
        Ok(exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use crate::hw_trait::mock::MockI2c;
    use crate::profile::ProfileId;

    /// Log output collected in memory.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_adc_is_a_config_error() {
        let mut config = MonitorConfig::from_profile(ProfileId::PiUptime2);
        config.output = OutputKind::Log;
        config.dry_run = true;

        let err = Daemon::new(config)
            .run_with_bus(MockI2c::new().failing_at(0))
            .await
            .unwrap_err();

        let config_err = err.downcast_ref::<ConfigError>().expect("config error");
        assert!(matches!(
            config_err,
            ConfigError::Unreachable { address: 0x48, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_daemon_exits_interrupted() {
        let mut config = MonitorConfig::from_profile(ProfileId::PiZeroUptime2);
        config.output = OutputKind::Log;
        config.dry_run = true;

        let daemon = Daemon::new(config);
        daemon.shutdown_token().cancel();
        let exit = daemon.run_with_bus(MockI2c::new()).await.unwrap();
        assert_eq!(exit, Exit::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_logged_after_grace_period() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer({
                let captured = captured.clone();
                move || captured.clone()
            })
            .with_ansi(false)
            .with_max_level(::tracing::Level::TRACE)
            .finish();
        let _guard = ::tracing::subscriber::set_default(subscriber);

        // An idle mock reads 0 V everywhere: input failed, battery flat
        let mut config = MonitorConfig::from_profile(ProfileId::PiUptime2);
        config.output = OutputKind::Log;
        config.dry_run = true;

        let exit = Daemon::new(config).run_with_bus(MockI2c::new()).await.unwrap();
        assert_eq!(exit, Exit::ShutdownRequested);

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let last = output.lines().last().unwrap();
        assert!(last.contains("exiting after grace period"), "{}", last);
    }
}
