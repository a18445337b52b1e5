//! Training loggers for optimization diagnostics.
//!
//! Provides different logging backends for the scalar diagnostics an
//! optimization step emits.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::algorithms::a2c::OptInfo;
use crate::core::record::Field;

/// Diagnostics snapshot of one optimization step.
#[derive(Debug, Clone)]
pub struct OptSnapshot {
    /// Optimization iteration.
    pub itr: usize,
    /// Combined loss.
    pub loss: f32,
    /// Global gradient norm before clipping.
    pub grad_norm: f32,
    /// Valid-masked mean entropy.
    pub entropy: f32,
    /// Valid-masked mean perplexity.
    pub perplexity: f32,
    /// Learning rate in effect.
    pub learning_rate: f64,
}

impl OptSnapshot {
    /// Read a snapshot out of an [`OptInfo`] record. Returns `None` (with a
    /// warning) when a field is missing or not a scalar.
    pub fn from_opt_info(itr: usize, learning_rate: f64, info: &OptInfo) -> Option<Self> {
        let scalar = |name: &str| -> Option<f32> {
            let array = match info.get(name)? {
                Field::Value(a) => a,
                _ => return None,
            };
            array.to_f32_vec().first().copied()
        };
        let read = |name: &str| match scalar(name) {
            Some(v) => Some(v),
            None => {
                log::warn!("opt info record has no scalar field `{}`", name);
                None
            }
        };
        Some(Self {
            itr,
            loss: read("loss")?,
            grad_norm: read("grad_norm")?,
            entropy: read("entropy")?,
            perplexity: read("perplexity")?,
            learning_rate,
        })
    }
}

/// Logger trait for different logging backends.
pub trait MetricsLogger: Send {
    /// Log one snapshot.
    fn log(&mut self, snapshot: &OptSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Console logger with fixed-width columns.
pub struct ConsoleLogger {
    log_interval: usize,
    last_logged: Option<usize>,
    start_time: Instant,
    show_header: bool,
}

impl ConsoleLogger {
    /// Log every `log_interval` iterations.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
            last_logged: None,
            start_time: Instant::now(),
            show_header: true,
        }
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &OptSnapshot) {
        if let Some(last) = self.last_logged {
            if snapshot.itr < last + self.log_interval {
                return;
            }
        }
        self.last_logged = Some(snapshot.itr);

        if self.show_header {
            println!(
                "{:>8} | {:>10} | {:>10} | {:>10} | {:>10} | {:>8}",
                "itr", "loss", "gradNorm", "entropy", "perplexity", "elapsed"
            );
            self.show_header = false;
        }
        println!(
            "{:>8} | {:>10.4} | {:>10.4} | {:>10.4} | {:>10.4} | {:>7.1}s",
            snapshot.itr,
            snapshot.loss,
            snapshot.grad_norm,
            snapshot.entropy,
            snapshot.perplexity,
            self.start_time.elapsed().as_secs_f32(),
        );
    }

    fn flush(&mut self) {}
}

/// CSV logger writing one row per snapshot.
pub struct CsvLogger {
    writer: Option<BufWriter<File>>,
    wrote_header: bool,
}

impl CsvLogger {
    /// Create a CSV file at `path`, truncating any existing one.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            wrote_header: false,
        })
    }
}

impl MetricsLogger for CsvLogger {
    fn log(&mut self, snapshot: &OptSnapshot) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if !self.wrote_header {
            if let Err(e) = writeln!(writer, "itr,loss,grad_norm,entropy,perplexity,learning_rate")
            {
                log::warn!("csv logger failed to write header: {}", e);
                self.writer = None;
                return;
            }
            self.wrote_header = true;
        }
        if let Err(e) = writeln!(
            writer,
            "{},{},{},{},{},{}",
            snapshot.itr,
            snapshot.loss,
            snapshot.grad_norm,
            snapshot.entropy,
            snapshot.perplexity,
            snapshot.learning_rate,
        ) {
            log::warn!("csv logger failed to write row: {}", e);
            self.writer = None;
        }
    }

    fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                log::warn!("csv logger failed to flush: {}", e);
            }
        }
    }
}

/// Fan-out to several loggers.
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    pub fn new(loggers: Vec<Box<dyn MetricsLogger>>) -> Self {
        Self { loggers }
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &OptSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}
