pub mod mock_register;

use std::sync::Arc;
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use smart3::console::Console;
use smart3::message::MessageData;
use smart3::packet::encode_message;
use smart3::serial::SerialPortDriver;
use smart3::transceiver::Transceiver;
use smart3::{Configuration, PhysicalLayer};

use mock_register::MockRegisterPort;

/// Encodes one inbound message frame, as the register side would send it.
/// `seq`/`crn` only need to be valid, not to match any particular host
/// state — the framer decodes any well-formed frame.
pub fn inbound_frame(message_type_and_fields: &str, seq: u32, crn: u8) -> Vec<u8> {
    let payload = MessageData::from_bytes(message_type_and_fields.as_bytes().to_vec()).unwrap();
    encode_message(seq, crn, &payload, None).unwrap()
}

pub const ACK_BYTE: u8 = smart3::control::ACK;
pub const NAK_BYTE: u8 = smart3::control::NAK;

/// A `Console` wired to a [`MockRegisterPort`] pre-loaded with `script`, plus
/// a shared handle back to the port so a test can inspect what was written
/// after the `Console`/`SerialPortDriver` have taken ownership of it.
pub fn console_with_script(script: Vec<u8>) -> (Console, Arc<MockRegisterPort>) {
    let port = Arc::new(MockRegisterPort::new(script));
    let driver = SerialPortDriver::from_port(Box::new(SharedPort(Arc::clone(&port))));
    let config = Configuration::new("mock", PhysicalLayer::Rs232);
    let transceiver = Transceiver::new(driver, config.clone());
    (Console::new(transceiver, config.max_retries), port)
}

/// Forwards every call to a shared [`MockRegisterPort`]. Sound without any
/// unsafe aliasing because every operation the port actually performs is
/// implemented against `&self` (interior `Mutex`s); this wrapper only needs
/// to satisfy `serialport::SerialPort`'s `&mut self` signatures.
struct SharedPort(Arc<MockRegisterPort>);

impl std::io::Read for SharedPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.do_read(buf)
    }
}

impl std::io::Write for SharedPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.do_write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.do_flush()
    }
}

impl std::fmt::Debug for SharedPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&*self.0, f)
    }
}

impl SerialPort for SharedPort {
    fn name(&self) -> Option<String> {
        self.0.name()
    }
    fn baud_rate(&self) -> serialport::Result<u32> {
        self.0.baud_rate()
    }
    fn data_bits(&self) -> serialport::Result<DataBits> {
        self.0.data_bits()
    }
    fn flow_control(&self) -> serialport::Result<FlowControl> {
        self.0.flow_control()
    }
    fn parity(&self) -> serialport::Result<Parity> {
        self.0.parity()
    }
    fn stop_bits(&self) -> serialport::Result<StopBits> {
        self.0.stop_bits()
    }
    fn timeout(&self) -> Duration {
        self.0.do_timeout()
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
        self.0.do_set_timeout(timeout)
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
        self.0.do_bytes_to_read()
    }
    fn bytes_to_write(&self) -> serialport::Result<u32> {
        Ok(0)
    }
    fn clear(&self, buffer_to_clear: ClearBuffer) -> serialport::Result<()> {
        self.0.do_clear(buffer_to_clear)
    }
    fn try_clone(&self) -> serialport::Result<Box<dyn SerialPort>> {
        self.0.try_clone()
    }
    fn set_break(&self) -> serialport::Result<()> {
        self.0.set_break()
    }
    fn clear_break(&self) -> serialport::Result<()> {
        self.0.clear_break()
    }
}
