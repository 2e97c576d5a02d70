//! Request/acknowledgement semantics, retransmission, and RS-485 enquiry
//! polling (spec.md §4.4).

use std::time::{Duration, Instant};

use log::debug;

use crate::config::{Configuration, PhysicalLayer};
use crate::control::{ACK, DC1, DLE, ENQ, NAK, RS485_BROADCAST_ADDRESS};
use crate::error::{ProtocolError, Smart3Error};
use crate::framer::Framer;
use crate::message::MessageData;
use crate::packet::{encode_broadcast, encode_indicator, encode_message, IndicatorPacket, MessagePacket, Packet};
use crate::serial::SerialPortDriver;

/// Holds the framer+driver and the sequence/CRN last observed from the
/// register, so replies mirror them back per spec.md §4.4.
pub struct Transceiver {
    driver: SerialPortDriver,
    framer: Framer,
    config: Configuration,
    last_sequence: u8,
    last_crn: u8,
    broadcast_announced: bool,
}

impl Transceiver {
    pub fn new(driver: SerialPortDriver, config: Configuration) -> Self {
        let framer = Framer::new(config.physical_layer.framer_layer());
        Self {
            driver,
            framer,
            config,
            last_sequence: 0,
            last_crn: 0,
            broadcast_announced: false,
        }
    }

    fn register_address(&self) -> Option<u8> {
        self.config.physical_layer.register_address()
    }

    /// Receives the next message, polling with ENQ on RS-485 while the
    /// input buffer is empty.
    pub fn receive_message(&mut self) -> Result<MessagePacket, Smart3Error> {
        match self.config.physical_layer {
            PhysicalLayer::Rs232 => self.receive_message_blocking(self.config.receive_timeout),
            PhysicalLayer::Rs485 { .. } => self.receive_message_rs485(),
        }
    }

    fn receive_message_blocking(&mut self, timeout: Duration) -> Result<MessagePacket, Smart3Error> {
        let packet = self.driver.receive(&mut self.framer, timeout)?;
        self.on_packet_received(&packet);
        match packet {
            Packet::Message(m) => Ok(m),
            other => Err(unexpected_packet("receive_message", &other)),
        }
    }

    fn receive_message_rs485(&mut self) -> Result<MessagePacket, Smart3Error> {
        let deadline = Instant::now() + self.config.receive_timeout;
        loop {
            if self.driver.is_in_buffer_empty()? {
                self.send_enquiry()?;
            }
            let spin_deadline = (Instant::now() + self.config.enquiry_poll_interval).min(deadline);
            while Instant::now() < spin_deadline {
                if !self.driver.is_in_buffer_empty()? {
                    break;
                }
            }
            if Instant::now() >= deadline {
                return Err(crate::error::TransportError::Timeout { counters: self.framer.counters() }.into());
            }
            if !self.driver.is_in_buffer_empty()? {
                return self.receive_message_blocking(self.config.receive_override_timeout);
            }
        }
    }

    /// A blocking read that must yield an [`IndicatorPacket`].
    pub fn receive_indicator(&mut self) -> Result<IndicatorPacket, Smart3Error> {
        let packet = self.driver.receive(&mut self.framer, self.config.write_timeout)?;
        match packet {
            Packet::Indicator(i) => Ok(i),
            other => Err(unexpected_packet("receive_indicator", &other)),
        }
    }

    fn on_packet_received(&mut self, packet: &Packet) {
        if let Packet::Message(m) = packet {
            self.last_sequence = m.sequence;
            self.last_crn = m.crn;
            self.broadcast_announced = false;
        }
    }

    /// Encodes `msg` with the mirrored sequence/CRN and transmits it.
    pub fn send_message(&mut self, msg: &MessageData) -> Result<(), Smart3Error> {
        let frame = encode_message(self.last_sequence as u32, self.last_crn, msg, self.register_address())?;
        debug!("transceiver: send message {:?}", msg.message_type());
        self.driver.send(&frame, self.config.write_timeout)
    }

    fn send_enquiry(&mut self) -> Result<(), Smart3Error> {
        let frame = encode_indicator(ENQ, self.register_address());
        self.driver.send(&frame, self.config.write_timeout)
    }

    pub fn send_hello_request(&mut self, immediate: bool) -> Result<(), Smart3Error> {
        let control = if immediate { DC1 } else { DLE };
        let frame = encode_indicator(control, self.register_address());
        self.driver.send(&frame, self.config.write_timeout)
    }

    pub fn send_ack(&mut self) -> Result<(), Smart3Error> {
        let frame = encode_indicator(ACK, self.register_address());
        self.driver.send(&frame, self.config.write_timeout)
    }

    pub fn send_nak(&mut self) -> Result<(), Smart3Error> {
        let frame = encode_indicator(NAK, self.register_address());
        self.driver.send(&frame, self.config.write_timeout)
    }

    /// Transmits a broadcast frame, preceded by a broadcast ENQ announcement
    /// on RS-485 if this is the first broadcast since any message arrived.
    pub fn broadcast_sequence(&mut self, bytes: &[u8]) -> Result<(), Smart3Error> {
        if let PhysicalLayer::Rs485 { .. } = self.config.physical_layer {
            if !self.broadcast_announced {
                let frame = encode_indicator(ENQ, Some(RS485_BROADCAST_ADDRESS));
                self.driver.send(&frame, self.config.write_timeout)?;
                self.broadcast_announced = true;
            }
            let address = Some(RS485_BROADCAST_ADDRESS);
            let frame = encode_broadcast(bytes, address)?;
            self.driver.send(&frame, self.config.write_timeout)
        } else {
            let frame = encode_broadcast(bytes, None)?;
            self.driver.send(&frame, self.config.write_timeout)
        }
    }

    pub fn discard_in_buffer(&mut self) -> Result<(), Smart3Error> {
        self.driver.discard_in_buffer()
    }
}

fn unexpected_packet(op: &'static str, packet: &Packet) -> Smart3Error {
    let kind = match packet {
        Packet::Indicator(_) => "indicator",
        Packet::Message(_) => "message",
        Packet::Broadcast(_) => "broadcast",
    };
    Smart3Error::Protocol(ProtocolError::Contract {
        message_type: format!("{op}: unexpected {kind} packet"),
    })
}
