//! Recording I2C double for driver and loop tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::{Duration, Instant};

use super::i2c::{I2c, I2cError};
use super::Result;

/// One bus transaction as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Write { addr: u8, data: Vec<u8> },
    WriteRead { addr: u8, write: Vec<u8>, read_len: usize },
}

/// Transaction plus the (simulated) time since the mock was created.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub transaction: Transaction,
    pub at: Duration,
}

/// Mock TLA2024 on an I2C bus.
///
/// Remembers the last byte written to the config register and answers data
/// register reads with the word configured for that control byte, so
/// each channel can be given its own conversion result.
#[derive(Clone)]
pub struct MockI2c {
    log: Arc<Mutex<Vec<Recorded>>>,
    words: HashMap<u8, u16>,
    last_control: Option<u8>,
    fail_at: Option<usize>,
    started: Instant,
}

impl MockI2c {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            words: HashMap::new(),
            last_control: None,
            fail_at: None,
            started: Instant::now(),
        }
    }

    /// Answer conversions triggered with `control` with the given 12-bit code.
    pub fn with_code(mut self, control: u8, code: u16) -> Self {
        self.words.insert(control, word_for_code(code));
        self
    }

    /// Fail the transaction with this zero-based index with a NACK.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Shared handle on the transaction log.
    pub fn log(&self) -> Arc<Mutex<Vec<Recorded>>> {
        self.log.clone()
    }

    fn record(&self, transaction: Transaction) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        let index = log.len();
        let addr = match &transaction {
            Transaction::Write { addr, .. } | Transaction::WriteRead { addr, .. } => *addr,
        };
        log.push(Recorded {
            transaction,
            at: self.started.elapsed(),
        });
        if self.fail_at == Some(index) {
            return Err(I2cError::NoAck(addr).into());
        }
        Ok(())
    }
}

/// SMBus word the chip would return for a left-justified 12-bit code.
pub fn word_for_code(code: u16) -> u16 {
    (code << 4).swap_bytes()
}

#[async_trait]
impl I2c for MockI2c {
    async fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.record(Transaction::Write {
            addr,
            data: data.to_vec(),
        })?;
        if data.first() == Some(&0x01) && data.len() == 3 {
            self.last_control = Some(data[1]);
        }
        Ok(())
    }

    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<()> {
        self.record(Transaction::WriteRead {
            addr,
            write: write.to_vec(),
            read_len: read.len(),
        })?;
        let word = self
            .last_control
            .and_then(|c| self.words.get(&c).copied())
            .unwrap_or(0);
        let bytes = word.to_le_bytes();
        for (dst, src) in read.iter_mut().zip(bytes.iter()) {
            *dst = *src;
        }
        Ok(())
    }
}
