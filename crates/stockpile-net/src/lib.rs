//! Host-authoritative networking for shared storage.
//!
//! One peer runs a [`host::Host`] that owns the real entity state; every
//! other peer runs a [`participant::Participant`] holding a replica and
//! sending requests. Packets are the closed [`message::Message`] set over
//! a byte-level [`wire`] codec; delivery goes through the
//! [`transport::Transport`] seam so the protocol logic stays independent
//! of the carrier.

pub mod host;
pub mod message;
pub mod participant;
pub mod queue;
pub mod transport;
pub mod wire;
