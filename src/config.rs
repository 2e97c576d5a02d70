//! Ambient configuration knobs (SPEC_FULL.md §4.9).

use std::time::Duration;

/// Supported baud rates (spec.md §1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaudRate {
    B9600,
    B19200,
    B38400,
}

impl BaudRate {
    pub fn as_u32(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
        }
    }
}

/// Which physical layer the driver speaks, and the addressing it implies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicalLayer {
    Rs232,
    Rs485 {
        /// The paired cash register's address byte, in `[0xA0, 0xAF]`.
        register_address: u8,
    },
}

impl PhysicalLayer {
    pub fn framer_layer(self) -> crate::framer::Layer {
        match self {
            PhysicalLayer::Rs232 => crate::framer::Layer::Rs232,
            PhysicalLayer::Rs485 { .. } => crate::framer::Layer::Rs485,
        }
    }

    pub fn register_address(self) -> Option<u8> {
        match self {
            PhysicalLayer::Rs232 => None,
            PhysicalLayer::Rs485 { register_address } => Some(register_address),
        }
    }
}

/// Every numeric knob named throughout spec.md, with the defaults spec.md
/// itself names, so the protocol logic never hardcodes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub port_path: String,
    pub baud_rate: BaudRate,
    pub physical_layer: PhysicalLayer,
    pub receive_timeout: Duration,
    pub write_timeout: Duration,
    pub enquiry_poll_interval: Duration,
    pub receive_override_timeout: Duration,
    pub max_retries: u32,
    pub worker_idle_timeout: Duration,
    pub keepalive_interval: Duration,
    pub broadcast_block_size: usize,
    pub broadcast_settle_delay: Duration,
}

impl Configuration {
    pub fn new(port_path: impl Into<String>, physical_layer: PhysicalLayer) -> Self {
        Self {
            port_path: port_path.into(),
            baud_rate: BaudRate::B9600,
            physical_layer,
            receive_timeout: Duration::from_millis(5000),
            write_timeout: Duration::from_millis(5000),
            enquiry_poll_interval: Duration::from_millis(20),
            receive_override_timeout: Duration::from_millis(200),
            max_retries: 3,
            worker_idle_timeout: Duration::from_millis(250),
            keepalive_interval: Duration::from_millis(1000),
            broadcast_block_size: 100,
            broadcast_settle_delay: Duration::from_millis(3000),
        }
    }
}
