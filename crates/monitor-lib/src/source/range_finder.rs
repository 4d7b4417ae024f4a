//! Serial range-finder frame reader
//!
//! The sensor streams frames of the form `R1234`: a literal `R` followed by
//! four ASCII digits giving the distance in millimetres. Anything between
//! frames (carriage returns, line noise) is skipped.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{async_trait, RawReading, ReadingSource};

const FRAME_START: u8 = b'R';
const FRAME_DIGITS: usize = 4;

/// Reads distance frames from any byte stream
pub struct RangeFinderReader<R> {
    reader: R,
    name: String,
}

impl<R: AsyncRead + Unpin + Send> RangeFinderReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            name: "range_finder".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Next frame's distance in millimetres, `Ok(None)` at end of stream
    pub async fn next_frame(&mut self) -> Result<Option<u32>> {
        loop {
            match self.reader.read_u8().await {
                Ok(FRAME_START) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e).context("Failed to read from range finder"),
            }
        }

        let mut digits = [0u8; FRAME_DIGITS];
        match self.reader.read_exact(&mut digits).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e).context("Failed to read from range finder"),
        }

        let text = String::from_utf8_lossy(&digits);
        if !digits.iter().all(u8::is_ascii_digit) {
            anyhow::bail!("Unable to convert value '{text}'");
        }
        text.parse::<u32>()
            .with_context(|| format!("Unable to convert value '{text}'"))
            .map(Some)
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ReadingSource for RangeFinderReader<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_reading(&mut self) -> Result<Option<RawReading>> {
        Ok(self.next_frame().await?.map(|mm| RawReading {
            millimetres: f64::from(mm),
        }))
    }
}
