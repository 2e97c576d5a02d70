//! [`SerialPortDriver`]: the byte-stream transport (spec.md §4.3).
//!
//! Generalizes the teacher's `uart::Uart` API shape (`init`, blocking
//! `read`/`write`, `flush`) from an MMIO register block to a real OS serial
//! device via the `serialport` crate.

use std::io::Write;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::config::BaudRate;
use crate::error::{FramerCounters, Smart3Error, TransportError};
use crate::framer::{Fed, Framer};
use crate::packet::Packet;

/// An optional sink for a textual transcript of every transmitted and
/// received frame, prefixed `>`/`<` as spec.md §4.3 describes.
pub trait Transcript: Send {
    fn log(&mut self, line: &str);
}

/// Opens an OS serial port at the given baud rate, 8-N-1, no handshake, and
/// drives a [`Framer`] from blocking timed reads.
pub struct SerialPortDriver {
    port: Box<dyn serialport::SerialPort>,
    transcript: Option<Box<dyn Transcript>>,
}

impl SerialPortDriver {
    pub fn open(path: &str, baud: BaudRate) -> Result<Self, Smart3Error> {
        let port = serialport::new(path, baud.as_u32())
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(50))
            .open()?;
        Ok(Self { port, transcript: None })
    }

    /// Builds a driver over an already-open port, bypassing OS device
    /// lookup. Exists for test harnesses that substitute an in-memory
    /// double for `serialport::SerialPort`.
    pub fn from_port(port: Box<dyn serialport::SerialPort>) -> Self {
        Self { port, transcript: None }
    }

    pub fn set_transcript(&mut self, transcript: Box<dyn Transcript>) {
        self.transcript = Some(transcript);
    }

    fn record(&mut self, prefix: &str, bytes: &[u8]) {
        if let Some(sink) = self.transcript.as_mut() {
            sink.log(&format!("{} {:02X?}", prefix, bytes));
        }
    }

    /// Sends raw frame bytes, logging the transcript line `> ...` on success.
    pub fn send(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), Smart3Error> {
        self.port.set_timeout(timeout)?;
        self.port.write_all(bytes)?;
        self.port.flush()?;
        debug!("serial: sent {} bytes", bytes.len());
        self.record(">", bytes);
        Ok(())
    }

    /// Drives `framer` from blocking reads until a packet is completed or
    /// `timeout` elapses, returning [`TransportError::Timeout`] with the
    /// framer's counters on expiry.
    pub fn receive(&mut self, framer: &mut Framer, timeout: Duration) -> Result<Packet, Smart3Error> {
        let deadline = Instant::now() + timeout;
        let mut byte = [0u8; 1];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout { counters: framer.counters() }.into());
            }
            self.port.set_timeout(remaining.min(Duration::from_millis(100)))?;
            match self.port.read(&mut byte) {
                Ok(0) => continue,
                Ok(_) => {
                    trace!("serial: read byte 0x{:02X}", byte[0]);
                    match framer.feed_byte(byte[0]) {
                        Fed::Continue => continue,
                        Fed::Packet(packet) => {
                            self.record("<", &encode_for_transcript(&packet));
                            return Ok(packet);
                        }
                        Fed::Error(err) => return Err(err.into()),
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn discard_in_buffer(&mut self) -> Result<(), Smart3Error> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }

    pub fn discard_out_buffer(&mut self) -> Result<(), Smart3Error> {
        self.port.clear(serialport::ClearBuffer::Output)?;
        Ok(())
    }

    pub fn is_in_buffer_empty(&self) -> Result<bool, Smart3Error> {
        Ok(self.port.bytes_to_read()? == 0)
    }

    pub fn is_out_buffer_empty(&self) -> Result<bool, Smart3Error> {
        Ok(self.port.bytes_to_write()? == 0)
    }
}

/// Best-effort textual rendering of a decoded packet for the transcript.
fn encode_for_transcript(packet: &Packet) -> Vec<u8> {
    match packet {
        Packet::Indicator(i) => vec![i.control],
        Packet::Message(m) => m.payload.as_bytes().to_vec(),
        Packet::Broadcast(b) => b.payload.clone(),
    }
}

/// Snapshot helper used by callers that only want the counters of a failed
/// receive, without matching on [`Smart3Error`] variants.
pub fn counters_of(error: &Smart3Error) -> Option<FramerCounters> {
    match error {
        Smart3Error::Transport(TransportError::Timeout { counters }) => Some(*counters),
        _ => None,
    }
}
