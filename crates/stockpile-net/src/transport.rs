//! Transport seam between protocol logic and packet delivery.
//!
//! The host and participants hand encoded packets to a [`Transport`]; the
//! carrier underneath is expected to provide framing, ordering, and reliable
//! delivery. Tests plug in [`RecordingTransport`] to observe exactly what
//! was sent and to whom.

use stockpile_core::id::ClientId;

/// Outbound packet delivery.
pub trait Transport {
    /// Send to one client.
    fn unicast(&mut self, to: ClientId, packet: &[u8]);

    /// Send to every connected client.
    fn broadcast(&mut self, packet: &[u8]);

    /// Send to every connected client except `skip` (typically the sender
    /// of the packet being relayed).
    fn broadcast_except(&mut self, skip: ClientId, packet: &[u8]);
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// Where a recorded packet was addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportTarget {
    Unicast(ClientId),
    Broadcast,
    BroadcastExcept(ClientId),
}

/// A [`Transport`] that records every send for later inspection.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<(TransportTarget, Vec<u8>)>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets addressed to `client`, including broadcasts that reach it.
    pub fn received_by(&self, client: ClientId) -> Vec<&[u8]> {
        self.sent
            .iter()
            .filter(|(target, _)| match *target {
                TransportTarget::Unicast(to) => to == client,
                TransportTarget::Broadcast => true,
                TransportTarget::BroadcastExcept(skip) => skip != client,
            })
            .map(|(_, packet)| packet.as_slice())
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Transport for RecordingTransport {
    fn unicast(&mut self, to: ClientId, packet: &[u8]) {
        self.sent.push((TransportTarget::Unicast(to), packet.to_vec()));
    }

    fn broadcast(&mut self, packet: &[u8]) {
        self.sent.push((TransportTarget::Broadcast, packet.to_vec()));
    }

    fn broadcast_except(&mut self, skip: ClientId, packet: &[u8]) {
        self.sent
            .push((TransportTarget::BroadcastExcept(skip), packet.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_addressing() {
        let mut transport = RecordingTransport::new();
        transport.unicast(ClientId(1), &[0xaa]);
        transport.broadcast(&[0xbb]);
        transport.broadcast_except(ClientId(1), &[0xcc]);

        assert_eq!(transport.sent.len(), 3);
        assert_eq!(transport.received_by(ClientId(1)), vec![&[0xaa][..], &[0xbb][..]]);
        assert_eq!(transport.received_by(ClientId(2)), vec![&[0xbb][..], &[0xcc][..]]);
    }
}
