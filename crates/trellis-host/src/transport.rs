use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::backend::Transport;
use crate::bus::MessageSender;
use crate::message::Message;

/// Field marking a message for delivery to the remote side.
pub const REMOTE_FIELD: &str = "toRemote";

/// Transport over in-process channels carrying wire-form strings. Other
/// threads hold the [`TransportPeer`].
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: Receiver<String>,
    outbound: Sender<String>,
}

#[derive(Debug, Clone)]
pub struct TransportPeer {
    pub to_host: Sender<String>,
    pub from_host: Receiver<String>,
}

pub fn channel_transport() -> (ChannelTransport, TransportPeer) {
    let (to_host, inbound) = unbounded();
    let (outbound, from_host) = unbounded();
    (
        ChannelTransport { inbound, outbound },
        TransportPeer { to_host, from_host },
    )
}

impl Transport for ChannelTransport {
    fn drain_into(&mut self, sender: &MessageSender) -> usize {
        let mut queued = 0;
        for wire in self.inbound.try_iter() {
            match sender.send_wire(&wire) {
                Ok(count) => queued += count,
                Err(err) => warn!(%err, "dropping malformed inbound message"),
            }
        }
        queued
    }

    fn forward(&mut self, message: &mut Message) {
        if !message.has(REMOTE_FIELD) {
            return;
        }
        match self.outbound.try_send(message.to_string()) {
            Ok(()) => message.consume(),
            Err(TrySendError::Disconnected(_)) => {
                warn!(tag = message.tag(), "remote peer gone; message kept local")
            }
            Err(TrySendError::Full(_)) => warn!(tag = message.tag(), "remote queue full"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::bus::MessageBus;
    use pretty_assertions::assert_eq;

    #[test]
    fn inbound_messages_reach_the_bus() {
        let (mut transport, peer) = channel_transport();
        let mut bus: MessageBus<Vec<String>> = MessageBus::new();
        bus.set_default(|msg: &mut Message, seen: &mut Vec<String>| seen.push(msg.to_string()));

        let remote = thread::spawn(move || {
            peer.to_host.send("type=PluginChange which=orbit".into()).unwrap();
            peer.to_host.send("not a message".into()).unwrap();
            peer.to_host.send("type=A; type=B".into()).unwrap();
        });
        remote.join().unwrap();

        assert_eq!(transport.drain_into(&bus.sender()), 3);
        let mut seen = Vec::new();
        bus.dispatch(&mut seen, 0.0);
        assert_eq!(seen, vec!["type=PluginChange which=orbit", "type=A", "type=B"]);
    }

    #[test]
    fn only_remote_messages_are_forwarded() {
        let (mut transport, peer) = channel_transport();
        let mut local = Message::new("Redraw");
        transport.forward(&mut local);
        assert!(!local.is_consumed());

        let mut remote = Message::new("Status").with(REMOTE_FIELD, 1).with("fps", 60);
        transport.forward(&mut remote);
        assert!(remote.is_consumed());
        assert_eq!(
            peer.from_host.try_recv().unwrap(),
            "type=Status toRemote=1 fps=60"
        );
        assert!(peer.from_host.try_recv().is_err());
    }
}
