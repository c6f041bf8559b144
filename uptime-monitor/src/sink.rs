//! Where observations go.
//!
//! The console sink prints the fixed-width table the UpTime scripts always
//! printed, so existing log scrapers keep working. The log sink turns the
//! same data into structured tracing events for journald.

use std::io::{self, Write};

use time::macros::format_description;
use time::OffsetDateTime;

use crate::evaluator::Classification;
use crate::observation::Observation;
use crate::tracing::prelude::*;

/// Receives every observation, in cycle order.
pub trait ObservationSink: Send {
    /// Record one cycle.
    fn observe(&mut self, observation: &Observation) -> io::Result<()>;

    /// Record that `observation` triggered a host shutdown.
    fn shutdown_initiated(&mut self, observation: &Observation) -> io::Result<()>;

    /// Push out anything buffered.
    fn flush(&mut self) -> io::Result<()>;
}

/// Column header printed before the first row
pub const HEADER: &str = "Date & Time               Vin   Vout  Batt-V  Board Temperature";

/// C `ctime()` layout, e.g. "Sun Oct 18 09:05:03 2026".
pub fn ctime(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(format_description!(
            "[weekday repr:short] [month repr:short] [day padding:space] [hour]:[minute]:[second] [year]"
        ))
        .unwrap_or_else(|_| timestamp.to_string())
}

/// One table row.
pub fn format_row(o: &Observation) -> String {
    format!(
        "{} {:5.2} {:5.2} {:5.2} {:8.2}C {:6.2}F",
        ctime(o.timestamp),
        o.vin,
        o.vout,
        o.vbattery,
        o.temp_c,
        o.temp_f
    )
}

/// Warning line for out-of-band temperatures, if any.
pub fn format_warning(o: &Observation) -> Option<String> {
    match o.classification {
        Classification::TooCold => Some(format!(
            "Temperature is too cold for battery charging - at {}, Temperature is  {:5.2}",
            ctime(o.timestamp),
            o.temp_c
        )),
        Classification::TooHot => Some(format!(
            "Temperature is too hot for battery charging -  at {}, Temperature is  {:5.2}",
            ctime(o.timestamp),
            o.temp_c
        )),
        Classification::Normal | Classification::CriticalShutdown => None,
    }
}

/// Lines printed when a shutdown is triggered.
pub fn format_shutdown(o: &Observation) -> [String; 2] {
    let at = ctime(o.timestamp);
    [
        format!("Shutdown initiated at {} ", at),
        format!(
            "At {}, Vin = {:4.2}, Vout = {:4.2}, Vbattery = {:4.2}, Temperature = {:5.2}C {:5.2}F",
            at, o.vin, o.vout, o.vbattery, o.temp_c, o.temp_f
        ),
    ]
}

/// Fixed-width table on a writer, normally stdout.
pub struct ConsoleSink<W: Write + Send> {
    out: W,
    header_written: bool,
}

impl ConsoleSink<io::BufWriter<io::Stdout>> {
    pub fn stdout() -> Self {
        Self::new(io::BufWriter::new(io::stdout()))
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn header(&mut self) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.out, "{}", HEADER)?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl<W: Write + Send> ObservationSink for ConsoleSink<W> {
    fn observe(&mut self, observation: &Observation) -> io::Result<()> {
        self.header()?;
        writeln!(self.out, "{}", format_row(observation))?;
        if let Some(warning) = format_warning(observation) {
            writeln!(self.out, "{}", warning)?;
        }
        self.out.flush()
    }

    fn shutdown_initiated(&mut self, observation: &Observation) -> io::Result<()> {
        for line in format_shutdown(observation) {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Structured tracing events, one per cycle.
#[derive(Debug, Default)]
pub struct LogSink;

impl ObservationSink for LogSink {
    fn observe(&mut self, o: &Observation) -> io::Result<()> {
        let vin = format!("{:.2}", o.vin);
        let vout = format!("{:.2}", o.vout);
        let vbattery = format!("{:.2}", o.vbattery);
        let temp_c = format!("{:.2}", o.temp_c);
        let temp_f = format!("{:.2}", o.temp_f);
        match o.classification {
            Classification::TooCold => {
                warn!(%vin, %temp_c, "Temperature is too cold for battery charging")
            }
            Classification::TooHot => {
                warn!(%vin, %temp_c, "Temperature is too hot for battery charging")
            }
            Classification::Normal | Classification::CriticalShutdown => {}
        }
        info!(
            %vin,
            %vout,
            %vbattery,
            %temp_c,
            %temp_f,
            brownout = o.brownout,
            status = %o.classification,
            "Reading"
        );
        Ok(())
    }

    fn shutdown_initiated(&mut self, o: &Observation) -> io::Result<()> {
        error!(
            vin = %format!("{:.2}", o.vin),
            vbattery = %format!("{:.2}", o.vbattery),
            "Input power lost and battery exhausted; shutdown initiated"
        );
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
