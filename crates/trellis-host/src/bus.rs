use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::message::{Message, WireError};

/// Callback invoked for a message during dispatch. `C` is whatever state the
/// owner of the bus hands to its handlers.
pub type Handler<C> = Box<dyn FnMut(&mut Message, &mut C)>;

type SharedQueue = Arc<Mutex<VecDeque<Message>>>;

/// Cloneable producer handle. Safe to move to other threads; producers only
/// ever push, the main thread is the only consumer.
#[derive(Clone, Default)]
pub struct MessageSender {
    queue: SharedQueue,
}

impl fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSender")
            .field("pending", &self.queue.lock().len())
            .finish()
    }
}

impl MessageSender {
    pub fn send(&self, message: Message) {
        self.queue.lock().push_back(message);
    }

    /// Parses and queues every message in a `;`-separated wire string.
    pub fn send_wire(&self, wire: &str) -> Result<usize, WireError> {
        let batch = Message::parse_batch(wire)?;
        let count = batch.len();
        self.queue.lock().extend(batch);
        Ok(count)
    }
}

/// FIFO message queue plus tag-routed handlers.
pub struct MessageBus<C> {
    queue: SharedQueue,
    handlers: HashMap<String, Vec<Handler<C>>>,
    default_handler: Option<Handler<C>>,
    last_dispatch: f64,
}

impl<C> Default for MessageBus<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> MessageBus<C> {
    pub fn new() -> Self {
        Self {
            queue: SharedQueue::default(),
            handlers: HashMap::new(),
            default_handler: None,
            last_dispatch: 0.0,
        }
    }

    pub fn sender(&self) -> MessageSender {
        MessageSender {
            queue: Arc::clone(&self.queue),
        }
    }

    pub fn enqueue(&self, message: Message) {
        self.queue.lock().push_back(message);
    }

    pub fn enqueue_wire(&self, wire: &str) -> Result<usize, WireError> {
        self.sender().send_wire(wire)
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Adds a handler for `tag`. Handlers for the same tag run in
    /// registration order.
    pub fn register<F>(&mut self, tag: impl Into<String>, handler: F)
    where
        F: FnMut(&mut Message, &mut C) + 'static,
    {
        self.handlers
            .entry(tag.into())
            .or_default()
            .push(Box::new(handler));
    }

    /// Installs the catch-all handler tried after all tag handlers.
    pub fn set_default<F>(&mut self, handler: F)
    where
        F: FnMut(&mut Message, &mut C) + 'static,
    {
        self.default_handler = Some(Box::new(handler));
    }

    pub fn last_dispatch_time(&self) -> f64 {
        self.last_dispatch
    }

    /// Delivers the messages queued before this call. Anything enqueued by a
    /// handler while this runs waits for the next call. Returns the number of
    /// messages delivered.
    pub fn dispatch(&mut self, ctx: &mut C, now: f64) -> usize {
        self.last_dispatch = now;
        let snapshot = mem::take(&mut *self.queue.lock());
        let count = snapshot.len();
        for mut message in snapshot {
            self.route(&mut message, ctx);
            if !message.is_consumed() {
                trace!(%message, "message left unconsumed");
            }
        }
        count
    }

    fn route(&mut self, message: &mut Message, ctx: &mut C) {
        if let Some(handlers) = self.handlers.get_mut(message.tag()) {
            for handler in handlers.iter_mut() {
                handler(message, ctx);
                if message.is_consumed() {
                    return;
                }
            }
        }
        if let Some(default) = self.default_handler.as_mut() {
            default(message, ctx);
        }
    }
}
