//! The sampling loop.
//!
//! Each cycle samples the four ADC channels in a fixed order, converts and
//! classifies the readings, and hands the resulting [`Observation`] to the
//! sink. A `CriticalShutdown` classification ends the loop: the shutdown
//! collaborator is invoked once, the grace period is waited out, and no
//! further cycles run.
//!
//! Cancellation is honoured at the start of a cycle, while sampling and
//! while sleeping between cycles. Dropping a cycle part-way through sampling
//! is safe because every sample starts by resetting the ADC. The shutdown
//! sequence itself is never cancelled.

use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::channel::ChannelConfig;
use crate::config::MonitorConfig;
use crate::converter::{celsius_to_fahrenheit, Calibration, ThermistorFit};
use crate::error::{MonitorError, Result};
use crate::evaluator::{Classification, Thresholds};
use crate::hw_trait::{self, I2c};
use crate::observation::{self, Observation};
use crate::peripheral::tla2024::{Scale, Tla2024};
use crate::shutdown::ShutdownCollaborator;
use crate::sink::ObservationSink;
use crate::tracing::prelude::*;

/// Result of one cycle.
#[derive(Debug)]
pub enum Step {
    /// Sleep and sample again
    Continue,
    /// The host must shut down because of this observation
    Shutdown(Observation),
    /// Sampling failed; the run is over
    Fatal(MonitorError),
}

/// Why [`Monitor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Shutdown was requested and the grace period has passed
    ShutdownRequested,
    /// Cancelled from outside
    Interrupted,
}

pub struct Monitor<I: I2c> {
    adc: Tla2024<I>,
    channels: [ChannelConfig; 4],
    calibration: [Calibration; 4],
    thermistor: ThermistorFit,
    thresholds: Thresholds,
    interval: Duration,
    grace: Duration,
    sink: Box<dyn ObservationSink>,
    shutdown: Box<dyn ShutdownCollaborator>,
    /// Set once a cycle classifies as critical; no cycle runs after it
    halted: Option<Observation>,
    shutdown_requested: bool,
    last_classification: Option<Classification>,
    last_brownout: bool,
}

impl<I: I2c> Monitor<I> {
    pub fn new(
        config: &MonitorConfig,
        i2c: I,
        sink: Box<dyn ObservationSink>,
        shutdown: Box<dyn ShutdownCollaborator>,
    ) -> Self {
        let scale = Scale {
            reference_voltage: config.full_scale.volts(),
            max_code: config.max_code,
        };
        Self {
            adc: Tla2024::new(i2c, config.address, scale, config.settle),
            channels: config.channels,
            calibration: config.calibration,
            thermistor: config.thermistor,
            thresholds: config.thresholds,
            interval: config.interval,
            grace: config.grace,
            sink,
            shutdown,
            halted: None,
            shutdown_requested: false,
            last_classification: None,
            last_brownout: false,
        }
    }

    /// Check the ADC answers before starting the loop.
    pub async fn probe(&mut self) -> hw_trait::Result<u16> {
        self.adc.probe().await
    }

    /// Sample all four channels once and classify the result.
    pub async fn observe(&mut self) -> Result<Observation> {
        let mut volts = [0.0f32; 4];
        for channel in &self.channels {
            let raw = self.adc.sample(channel).await?;
            let slot = channel.quantity.index();
            volts[slot] = self.calibration[slot].apply(raw);
        }
        let [vin, vout, vbattery, vtemperature] = volts;

        let temp_c = self.thermistor.celsius(vtemperature);
        let classification = self.thresholds.classify(vin, vbattery, temp_c);

        Ok(Observation {
            timestamp: observation::now(),
            vin,
            vout,
            vbattery,
            vtemperature,
            temp_c,
            temp_f: celsius_to_fahrenheit(temp_c),
            classification,
            brownout: self.thresholds.is_brownout(vin),
        })
    }

    /// Run one cycle: sample, classify, emit.
    ///
    /// Once a cycle has classified as critical, later calls return the same
    /// shutdown step without touching the bus or the sink.
    pub async fn step(&mut self) -> Step {
        if let Some(observation) = &self.halted {
            return Step::Shutdown(observation.clone());
        }
        match self.cycle().await {
            Ok(step) => step,
            Err(e) => Step::Fatal(e),
        }
    }

    async fn cycle(&mut self) -> Result<Step> {
        let observation = self.observe().await?;
        debug!(
            vin = observation.vin,
            vout = observation.vout,
            vbattery = observation.vbattery,
            vtemperature = observation.vtemperature,
            temp_c = observation.temp_c,
            status = %observation.classification,
            "Cycle complete"
        );
        self.log_transitions(&observation);

        if observation.classification.is_terminal() {
            // Shutdown proceeds even if the row cannot be written
            if let Err(e) = self.sink.observe(&observation) {
                error!("Failed to write observation: {}", e);
            }
            self.halted = Some(observation.clone());
            return Ok(Step::Shutdown(observation));
        }
        self.sink.observe(&observation).map_err(MonitorError::Sink)?;
        Ok(Step::Continue)
    }

    fn log_transitions(&mut self, o: &Observation) {
        if o.brownout != self.last_brownout {
            if o.brownout {
                warn!(vin = o.vin, "Input power lost, running on battery");
            } else {
                info!(vin = o.vin, "Input power restored");
            }
            self.last_brownout = o.brownout;
        }

        let previous = self.last_classification.replace(o.classification);
        if previous == Some(o.classification) {
            return;
        }
        match o.classification {
            Classification::TooCold | Classification::TooHot => {
                warn!(temp_c = o.temp_c, "Board temperature outside charging range ({})", o.classification);
            }
            Classification::Normal
                if matches!(previous, Some(Classification::TooCold | Classification::TooHot)) =>
            {
                info!(temp_c = o.temp_c, "Board temperature back within charging range");
            }
            Classification::CriticalShutdown => {
                error!(
                    vin = o.vin,
                    vbattery = o.vbattery,
                    "Battery below {:.2} V with input failed",
                    self.thresholds.v_batt_min
                );
            }
            Classification::Normal => {}
        }
    }

    async fn shutdown_host(&mut self, observation: &Observation) -> Result<()> {
        if self.shutdown_requested {
            return Ok(());
        }
        self.shutdown_requested = true;

        // The notice is best effort; the shutdown must happen regardless
        let notice = self
            .sink
            .shutdown_initiated(observation)
            .and_then(|()| self.sink.flush());
        if let Err(e) = notice {
            error!("Failed to write shutdown notice: {}", e);
        }

        self.shutdown
            .request_shutdown()
            .await
            .map_err(MonitorError::Shutdown)?;
        info!(grace = ?self.grace, "Shutdown requested, exiting after grace period");
        sleep(self.grace).await;
        Ok(())
    }

    fn interrupted(&mut self) -> Result<Exit> {
        info!("Interrupted, stopping.");
        self.sink.flush().map_err(MonitorError::Sink)?;
        Ok(Exit::Interrupted)
    }

    /// Sample until shutdown is required, `cancel` fires, or the bus fails.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<Exit> {
        info!(
            address = %format!("0x{:02X}", self.adc.address()),
            interval = ?self.interval,
            "Monitoring started"
        );

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                step = self.step() => Some(step),
            };
            let Some(step) = step else {
                return self.interrupted();
            };

            match step {
                Step::Continue => {}
                Step::Shutdown(observation) => {
                    self.shutdown_host(&observation).await?;
                    return Ok(Exit::ShutdownRequested);
                }
                Step::Fatal(e) => {
                    if let Err(flush_err) = self.sink.flush() {
                        warn!("Failed to flush observations: {}", flush_err);
                    }
                    return Err(e);
                }
            }

            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = sleep(self.interval) => false,
            };
            if cancelled {
                return self.interrupted();
            }
        }
    }
}
