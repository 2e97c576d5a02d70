//! An in-memory double for `serialport::SerialPort`, standing in for the
//! cash register at the other end of the wire. A test pre-loads the exact
//! byte script the register would send (hello messages, ACK/NAK indicators,
//! confirmation records) and can read back whatever the driver wrote, so an
//! integration test exercises the real framer/transceiver/console stack
//! without an OS serial device.
//!
//! Every operation is implemented against `&self` (state lives behind a
//! `Mutex`), so the port can be shared via `Arc` between the driver (which
//! needs to own a `Box<dyn SerialPort>`) and the test (which wants to read
//! captured output back afterwards) without any unsafe aliasing.

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, Error, ErrorKind, FlowControl, Parity, SerialPort, StopBits};

pub struct MockRegisterPort {
    inbound: Mutex<VecDeque<u8>>,
    outbound: Mutex<Vec<u8>>,
    timeout: Mutex<Duration>,
}

impl MockRegisterPort {
    /// Builds a port pre-loaded with `scripted_inbound`, the exact bytes the
    /// register side would have sent for the scenario under test.
    pub fn new(scripted_inbound: Vec<u8>) -> Self {
        Self {
            inbound: Mutex::new(scripted_inbound.into_iter().collect()),
            outbound: Mutex::new(Vec::new()),
            timeout: Mutex::new(Duration::from_millis(50)),
        }
    }

    /// Appends more scripted bytes, for scenarios where a later register
    /// reply only needs to be queued, not computed from host state.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.inbound.lock().unwrap().extend(bytes.iter().copied());
    }

    /// Drains and returns everything written so far, for assertions.
    pub fn take_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut self.outbound.lock().unwrap())
    }

    pub fn do_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inbound = self.inbound.lock().unwrap();
        if inbound.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock register: no bytes queued"));
        }
        let mut written = 0;
        while written < buf.len() {
            match inbound.pop_front() {
                Some(b) => {
                    buf[written] = b;
                    written += 1;
                }
                None => break,
            }
        }
        Ok(written)
    }

    pub fn do_write(&self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    pub fn do_flush(&self) -> io::Result<()> {
        Ok(())
    }

    pub fn do_timeout(&self) -> Duration {
        *self.timeout.lock().unwrap()
    }

    pub fn do_set_timeout(&self, timeout: Duration) -> serialport::Result<()> {
        *self.timeout.lock().unwrap() = timeout;
        Ok(())
    }

    pub fn do_bytes_to_read(&self) -> serialport::Result<u32> {
        Ok(self.inbound.lock().unwrap().len() as u32)
    }

    pub fn do_clear(&self, buffer_to_clear: ClearBuffer) -> serialport::Result<()> {
        match buffer_to_clear {
            ClearBuffer::Input => self.inbound.lock().unwrap().clear(),
            ClearBuffer::Output => self.outbound.lock().unwrap().clear(),
            ClearBuffer::All => {
                self.inbound.lock().unwrap().clear();
                self.outbound.lock().unwrap().clear();
            }
        }
        Ok(())
    }
}

impl io::Read for MockRegisterPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.do_read(buf)
    }
}

impl io::Write for MockRegisterPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.do_write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.do_flush()
    }
}

impl std::fmt::Debug for MockRegisterPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRegisterPort").finish()
    }
}

fn unsupported(what: &str) -> Error {
    Error::new(ErrorKind::Io(io::ErrorKind::Unsupported), format!("mock register: {what} is not modeled"))
}

impl SerialPort for MockRegisterPort {
    fn name(&self) -> Option<String> {
        Some("mock-register".to_string())
    }

    fn baud_rate(&self) -> serialport::Result<u32> {
        Ok(9600)
    }

    fn data_bits(&self) -> serialport::Result<DataBits> {
        Ok(DataBits::Eight)
    }

    fn flow_control(&self) -> serialport::Result<FlowControl> {
        Ok(FlowControl::None)
    }

    fn parity(&self) -> serialport::Result<Parity> {
        Ok(Parity::None)
    }

    fn stop_bits(&self) -> serialport::Result<StopBits> {
        Ok(StopBits::One)
    }

    fn timeout(&self) -> Duration {
        self.do_timeout()
    }

    fn set_baud_rate(&mut self, _baud_rate: u32) -> serialport::Result<()> {
        Ok(())
    }

    fn set_data_bits(&mut self, _data_bits: DataBits) -> serialport::Result<()> {
        Ok(())
    }

    fn set_flow_control(&mut self, _flow_control: FlowControl) -> serialport::Result<()> {
        Ok(())
    }

    fn set_parity(&mut self, _parity: Parity) -> serialport::Result<()> {
        Ok(())
    }

    fn set_stop_bits(&mut self, _stop_bits: StopBits) -> serialport::Result<()> {
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> serialport::Result<()> {
        self.do_set_timeout(timeout)
    }

    fn write_request_to_send(&mut self, _level: bool) -> serialport::Result<()> {
        Ok(())
    }

    fn write_data_terminal_ready(&mut self, _level: bool) -> serialport::Result<()> {
        Ok(())
    }

    fn read_clear_to_send(&mut self) -> serialport::Result<bool> {
        Ok(true)
    }

    fn read_data_set_ready(&mut self) -> serialport::Result<bool> {
        Ok(true)
    }

    fn read_ring_indicator(&mut self) -> serialport::Result<bool> {
        Ok(false)
    }

    fn read_carrier_detect(&mut self) -> serialport::Result<bool> {
        Ok(true)
    }

    fn bytes_to_read(&self) -> serialport::Result<u32> {
        self.do_bytes_to_read()
    }

    fn bytes_to_write(&self) -> serialport::Result<u32> {
        Ok(0)
    }

    fn clear(&self, buffer_to_clear: ClearBuffer) -> serialport::Result<()> {
        self.do_clear(buffer_to_clear)
    }

    fn try_clone(&self) -> serialport::Result<Box<dyn SerialPort>> {
        Err(unsupported("try_clone"))
    }

    fn set_break(&self) -> serialport::Result<()> {
        Ok(())
    }

    fn clear_break(&self) -> serialport::Result<()> {
        Ok(())
    }
}
