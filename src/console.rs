//! The dialogue layer: handler-contract enforcement plus the
//! Listen/Answer/AnswerAny/Broadcast/Swallow/Hello primitives (spec.md §4.5).

use log::warn;

use crate::control::{ACK, BEL, CAN, NAK, SYN};
use crate::error::{CashRegisterError, ProtocolError, Smart3Error, TransportError};
use crate::message::MessageData;
use crate::transceiver::Transceiver;

/// A handler that only observes an inbound message (used with [`Console::listen`]).
pub struct Listener<'a> {
    accepted: Vec<&'static str>,
    handle: Box<dyn FnMut(&MessageData) -> Result<(), Smart3Error> + 'a>,
}

impl<'a> Listener<'a> {
    pub fn new(
        accepted: Vec<&'static str>,
        handle: impl FnMut(&MessageData) -> Result<(), Smart3Error> + 'a,
    ) -> Self {
        Self { accepted, handle: Box::new(handle) }
    }

    pub fn accepts(&self, message_type: &str) -> bool {
        self.accepted.iter().any(|t| *t == message_type)
    }
}

/// A handler that answers an inbound message with a reply (used with
/// [`Console::answer`] and [`Console::answer_any`]).
pub struct Answerer<'a> {
    accepted: Vec<&'static str>,
    handle: Box<dyn FnMut(&MessageData) -> Result<MessageData, Smart3Error> + 'a>,
}

impl<'a> Answerer<'a> {
    pub fn new(
        accepted: Vec<&'static str>,
        handle: impl FnMut(&MessageData) -> Result<MessageData, Smart3Error> + 'a,
    ) -> Self {
        Self { accepted, handle: Box::new(handle) }
    }

    pub fn accepts(&self, message_type: &str) -> bool {
        self.accepted.iter().any(|t| *t == message_type)
    }
}

/// The typed dialogue console layered over a [`Transceiver`].
pub struct Console {
    transceiver: Transceiver,
    max_retries: u32,
}

impl Console {
    pub fn new(transceiver: Transceiver, max_retries: u32) -> Self {
        Self { transceiver, max_retries }
    }

    pub fn transceiver_mut(&mut self) -> &mut Transceiver {
        &mut self.transceiver
    }

    /// Sends a hello request. No reply is consumed here.
    pub fn hello(&mut self, immediate: bool) -> Result<(), Smart3Error> {
        self.transceiver.send_hello_request(immediate)
    }

    fn receive_with_retry(&mut self, operation: &'static str) -> Result<MessageData, Smart3Error> {
        let mut retries = 0u32;
        loop {
            match self.transceiver.receive_message() {
                Ok(packet) => return Ok(packet.payload),
                Err(Smart3Error::Transport(TransportError::PacketValidation(e))) => {
                    warn!("console: {operation} received an invalid packet ({e}), sending NAK");
                    retries += 1;
                    if retries > self.max_retries {
                        return Err(ProtocolError::ReadRetryExceeded { operation }.into());
                    }
                    self.transceiver.send_nak()?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Receives a message, checks `listener`'s contract, ACKs, and invokes it.
    pub fn listen(&mut self, listener: &mut Listener) -> Result<(), Smart3Error> {
        let message = self.receive_with_retry("listen")?;
        if !listener.accepts(message.message_type()) {
            return Err(ProtocolError::Contract { message_type: message.message_type().to_string() }.into());
        }
        self.transceiver.send_ack()?;
        (listener.handle)(&message)
    }

    /// Receives a message, invokes `answerer`, then runs the send loop.
    pub fn answer(&mut self, answerer: &mut Answerer) -> Result<(), Smart3Error> {
        let message = self.receive_with_retry("answer")?;
        if !answerer.accepts(message.message_type()) {
            return Err(ProtocolError::Contract { message_type: message.message_type().to_string() }.into());
        }
        let reply = (answerer.handle)(&message)?;
        self.send_loop(&reply, "answer")
    }

    /// Receives a message, picks the first handler whose contract accepts
    /// it, and drives it through the same send loop as [`Console::answer`].
    pub fn answer_any(&mut self, answerers: &mut [Answerer]) -> Result<(), Smart3Error> {
        let message = self.receive_with_retry("answer_any")?;
        let handler = answerers.iter_mut().find(|a| a.accepts(message.message_type()));
        let answerer = match handler {
            Some(a) => a,
            None => {
                return Err(ProtocolError::Contract { message_type: message.message_type().to_string() }.into())
            }
        };
        let reply = (answerer.handle)(&message)?;
        self.send_loop(&reply, "answer_any")
    }

    fn send_loop(&mut self, reply: &MessageData, operation: &'static str) -> Result<(), Smart3Error> {
        self.transceiver.send_message(reply)?;
        let mut transmits = 1u32;
        loop {
            let indicator = self.transceiver.receive_indicator()?;
            match indicator.control {
                ACK => return Ok(()),
                NAK => {
                    if transmits > self.max_retries {
                        return Err(ProtocolError::WriteRetryExceeded { operation }.into());
                    }
                    self.transceiver.send_message(reply)?;
                    transmits += 1;
                }
                SYN | BEL => continue,
                CAN => return Err(CashRegisterError::Refused.into()),
                other => return Err(ProtocolError::InvalidControlByte(other).into()),
            }
        }
    }

    /// Transmits a broadcast frame through the transceiver.
    pub fn broadcast(&mut self, bytes: &[u8]) -> Result<(), Smart3Error> {
        self.transceiver.broadcast_sequence(bytes)
    }

    /// Receives one message, ACKing it (retrying on invalid frames like
    /// [`Console::listen`]), and drops its payload.
    pub fn swallow(&mut self) -> Result<(), Smart3Error> {
        self.receive_with_retry("swallow")?;
        self.transceiver.send_ack()
    }
}
