//! Scoped event queues.
//!
//! Events are named notifications dispatched on FIFO queues: one global
//! server queue plus one queue per registered device and per connected
//! client. Queues are unbounded tokio channels, so enqueueing never
//! blocks and a handler may enqueue further events on any queue,
//! including its own.
//!
//! Within one queue events are strictly ordered and each event's handlers
//! run to completion before the next event starts. Across queues no order
//! is guaranteed; the server queue worker additionally forwards every
//! server event to all connected entity queues, which is how state
//! transitions fan out to peers.

use supla_proto::records::{
    config::{ChannelState, DeviceCalCfgRequestB, DeviceCalCfgResult},
    ChannelValue,
};
use tokio::sync::mpsc;

/// Which handler set an event queue is dispatched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventScope {
    /// The global server queue.
    Server,
    /// A registered device's queue.
    Device,
    /// A connected client's queue.
    Client,
}

/// Event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    /// A device finished registration.
    DeviceConnected,
    /// A device connection went away.
    DeviceDisconnected,
    /// A client finished registration.
    ClientConnected,
    /// A client connection went away.
    ClientDisconnected,
    /// A device supplied a channel's initial value during registration.
    ChannelRegisterValue,
    /// A channel's value changed on the device side.
    ChannelValueChanged,
    /// The server wants a channel set to a new value.
    ChannelSetValue,
    /// A client asked for a channel's hardware state.
    GetChannelState,
    /// A client issued a calcfg request.
    DeviceConfig,
    /// Push the location listing to a client.
    SendLocations,
    /// Push one channel batch to a client.
    SendChannels,
    /// Push the channel relation listing to a client.
    SendChannelRelations,
    /// Push the scene listing to a client.
    SendScenes,
    /// Deliver a channel-state result to the requesting client.
    ChannelStateResult,
    /// Deliver a calcfg result to the requesting client.
    DeviceConfigResult,
}

/// Payload tuple of an event.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// No payload.
    None,
    /// A device or client id.
    Peer(i32),
    /// A channel id with an encoded value.
    ChannelValue {
        /// Channel id.
        channel_id: i32,
        /// Encoded value.
        value: ChannelValue,
    },
    /// Offset of the next channel batch to push.
    ChannelBatch {
        /// Index of the first channel in the batch.
        offset: usize,
    },
    /// A channel-state request on its way to a device.
    GetChannelState {
        /// Originating client id.
        sender_id: i32,
        /// Channel id in the world view.
        channel_id: i32,
    },
    /// A channel-state report on its way back to a client.
    ChannelStateResult {
        /// The device's report.
        state: Box<ChannelState>,
        /// Channel id in the world view.
        channel_id: i32,
    },
    /// A calcfg request on its way to a device.
    CalCfgRequest {
        /// The client's request.
        request: DeviceCalCfgRequestB,
        /// Originating client id.
        client_id: i32,
        /// Channel number on the device.
        channel_number: u8,
    },
    /// A calcfg result on its way back to a client.
    CalCfgResult {
        /// The device's result.
        result: DeviceCalCfgResult,
        /// Channel id in the world view.
        channel_id: i32,
    },
}

/// One queued event.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name.
    pub id: EventId,
    /// Event payload.
    pub payload: EventPayload,
}

impl Event {
    /// Build an event.
    pub fn new(id: EventId, payload: EventPayload) -> Self {
        Self { id, payload }
    }

    /// Build a payload-less event.
    pub fn bare(id: EventId) -> Self {
        Self { id, payload: EventPayload::None }
    }

    /// Build an event carrying a peer id.
    pub fn peer(id: EventId, peer_id: i32) -> Self {
        Self { id, payload: EventPayload::Peer(peer_id) }
    }

    /// Build an event carrying a channel id and value.
    pub fn channel_value(id: EventId, channel_id: i32, value: ChannelValue) -> Self {
        Self { id, payload: EventPayload::ChannelValue { channel_id, value } }
    }
}

/// Receiving end of an event queue.
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Enqueueing end of an event queue.
///
/// Cheap to clone. Sending to a queue whose worker is gone is a no-op;
/// the entity disconnected and its pending events are moot.
#[derive(Debug, Clone)]
pub struct EventSink(mpsc::UnboundedSender<Event>);

impl EventSink {
    /// Enqueue an event. Never blocks.
    pub fn send(&self, event: Event) {
        if self.0.send(event).is_err() {
            tracing::debug!("event dropped; queue worker is gone");
        }
    }
}

/// Create a fresh event queue.
pub fn queue() -> (EventSink, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_preserves_order() {
        let (sink, mut rx) = queue();
        sink.send(Event::peer(EventId::DeviceConnected, 1));
        sink.send(Event::peer(EventId::DeviceConnected, 2));
        sink.send(Event::peer(EventId::DeviceDisconnected, 1));

        let ids: Vec<i32> = [rx.recv().await, rx.recv().await, rx.recv().await]
            .into_iter()
            .map(|event| match event.map(|e| e.payload) {
                Some(EventPayload::Peer(id)) => id,
                other => panic!("unexpected payload {other:?}"),
            })
            .collect();
        assert_eq!(ids, [1, 2, 1]);
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_is_a_noop() {
        let (sink, rx) = queue();
        drop(rx);
        sink.send(Event::bare(EventId::SendLocations));
    }

    #[tokio::test]
    async fn handlers_may_enqueue_while_draining() {
        let (sink, mut rx) = queue();
        sink.send(Event::bare(EventId::SendLocations));

        let first = rx.recv().await.map(|e| e.id);
        assert_eq!(first, Some(EventId::SendLocations));
        // a handler reacting to the first event queues another
        sink.send(Event::bare(EventId::SendScenes));
        let second = rx.recv().await.map(|e| e.id);
        assert_eq!(second, Some(EventId::SendScenes));
    }
}
