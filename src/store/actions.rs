//! Outbound action channel.
//!
//! Actions are transient: nothing is replayed to late observers. The
//! delivery discipline comes from [`ActionChannelConfig`].

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::config::{ActionChannelConfig, ActionMode, Overflow, DEFAULT_BROADCAST_CAPACITY};
use crate::mvi::Action;

/// Sending half held by the store. Cloned into the running worker.
pub(crate) enum ActionBus<A> {
    Broadcast(broadcast::Sender<A>),
    Queue {
        sender: QueueSender<A>,
        receiver: SharedQueue<A>,
    },
}

pub(crate) enum QueueSender<A> {
    Unbounded(mpsc::UnboundedSender<A>),
    Bounded {
        sender: mpsc::Sender<A>,
        overflow: Overflow,
    },
}

enum QueueReceiver<A> {
    Unbounded(mpsc::UnboundedReceiver<A>),
    Bounded(mpsc::Receiver<A>),
}

impl<A> QueueReceiver<A> {
    async fn recv(&mut self) -> Option<A> {
        match self {
            QueueReceiver::Unbounded(rx) => rx.recv().await,
            QueueReceiver::Bounded(rx) => rx.recv().await,
        }
    }

    fn try_recv(&mut self) -> Option<A> {
        match self {
            QueueReceiver::Unbounded(rx) => rx.try_recv().ok(),
            QueueReceiver::Bounded(rx) => rx.try_recv().ok(),
        }
    }
}

/// One receiver shared by every observer: competing consumers.
type SharedQueue<A> = Arc<Mutex<QueueReceiver<A>>>;

/// Result of handing an action to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// Broadcast with nobody subscribed; the action is lost.
    NoReceivers,
    /// Bounded queue was full and configured to drop.
    Full,
    Closed,
}

impl<A: Action> ActionBus<A> {
    pub(crate) fn new(config: &ActionChannelConfig) -> Self {
        match config.mode {
            ActionMode::Broadcast => {
                let capacity = config
                    .capacity
                    .unwrap_or(DEFAULT_BROADCAST_CAPACITY)
                    .max(1);
                let (sender, _) = broadcast::channel(capacity);
                ActionBus::Broadcast(sender)
            }
            ActionMode::Queue => match config.capacity {
                None => {
                    let (sender, receiver) = mpsc::unbounded_channel();
                    ActionBus::Queue {
                        sender: QueueSender::Unbounded(sender),
                        receiver: Arc::new(Mutex::new(QueueReceiver::Unbounded(receiver))),
                    }
                }
                Some(capacity) => {
                    let (sender, receiver) = mpsc::channel(capacity.max(1));
                    ActionBus::Queue {
                        sender: QueueSender::Bounded {
                            sender,
                            overflow: config.overflow,
                        },
                        receiver: Arc::new(Mutex::new(QueueReceiver::Bounded(receiver))),
                    }
                }
            },
        }
    }

    pub(crate) fn subscribe(&self) -> ActionReceiver<A> {
        let kind = match self {
            ActionBus::Broadcast(sender) => ReceiverKind::Broadcast(sender.subscribe()),
            ActionBus::Queue { receiver, .. } => ReceiverKind::Queue(Arc::clone(receiver)),
        };
        ActionReceiver { kind }
    }

    pub(crate) async fn emit(&self, action: A) -> Delivery {
        match self {
            ActionBus::Broadcast(sender) => match sender.send(action) {
                Ok(_) => Delivery::Delivered,
                Err(_) => Delivery::NoReceivers,
            },
            ActionBus::Queue { sender, .. } => match sender {
                QueueSender::Unbounded(tx) => match tx.send(action) {
                    Ok(()) => Delivery::Delivered,
                    Err(_) => Delivery::Closed,
                },
                QueueSender::Bounded {
                    sender,
                    overflow: Overflow::Drop,
                } => match sender.try_send(action) {
                    Ok(()) => Delivery::Delivered,
                    Err(TrySendError::Full(_)) => Delivery::Full,
                    Err(TrySendError::Closed(_)) => Delivery::Closed,
                },
                QueueSender::Bounded {
                    sender,
                    overflow: Overflow::Block,
                } => match sender.send(action).await {
                    Ok(()) => Delivery::Delivered,
                    Err(_) => Delivery::Closed,
                },
            },
        }
    }
}

impl<A> Clone for ActionBus<A> {
    fn clone(&self) -> Self {
        match self {
            ActionBus::Broadcast(sender) => ActionBus::Broadcast(sender.clone()),
            ActionBus::Queue { sender, receiver } => ActionBus::Queue {
                sender: match sender {
                    QueueSender::Unbounded(tx) => QueueSender::Unbounded(tx.clone()),
                    QueueSender::Bounded { sender, overflow } => QueueSender::Bounded {
                        sender: sender.clone(),
                        overflow: *overflow,
                    },
                },
                receiver: Arc::clone(receiver),
            },
        }
    }
}

/// Observer side of the action channel, returned by `Store::observe_actions`.
///
/// Ends (`recv` returns `None`) once the store run that owned the channel has
/// stopped and every buffered action has been taken.
pub struct ActionReceiver<A> {
    kind: ReceiverKind<A>,
}

enum ReceiverKind<A> {
    Broadcast(broadcast::Receiver<A>),
    Queue(SharedQueue<A>),
    Closed,
}

impl<A: Action> ActionReceiver<A> {
    /// A receiver that yields nothing. Handed out while the store is stopped.
    pub(crate) fn closed() -> Self {
        Self {
            kind: ReceiverKind::Closed,
        }
    }

    /// Wait for the next action.
    pub async fn recv(&mut self) -> Option<A> {
        match &mut self.kind {
            ReceiverKind::Broadcast(rx) => loop {
                match rx.recv().await {
                    Ok(action) => return Some(action),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Action observer lagged, oldest actions dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
            ReceiverKind::Queue(queue) => queue.lock().await.recv().await,
            ReceiverKind::Closed => None,
        }
    }

    /// Take an already-buffered action without waiting.
    pub fn try_recv(&mut self) -> Option<A> {
        match &mut self.kind {
            ReceiverKind::Broadcast(rx) => loop {
                match rx.try_recv() {
                    Ok(action) => return Some(action),
                    Err(TryRecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Action observer lagged, oldest actions dropped");
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
                }
            },
            ReceiverKind::Queue(queue) => queue.try_lock().ok()?.try_recv(),
            ReceiverKind::Closed => None,
        }
    }

    pub fn into_stream(self) -> BoxStream<'static, A> {
        stream::unfold(self, |mut receiver| async move {
            let action = receiver.recv().await?;
            Some((action, receiver))
        })
        .boxed()
    }
}
