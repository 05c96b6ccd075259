//! Contains the Event Publisher abstractions used by the [`Dispatcher`][crate::Dispatcher]
//! to notify subscribers of new Domain Events, and the [`InMemory`] fan-out implementation.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{event, message};

/// Default capacity of the broadcast channel used by [`InMemory::watch`].
const DEFAULT_WATCH_CAPACITY: usize = 64;

/// All possible error types returned by [`Publisher::publish`].
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Error returned when one of the [Subscriber]s failed to accept the Domain Event.
    #[error("subscriber '{subscriber}' failed to handle domain event: {source}")]
    Subscriber {
        /// The name of the failing [Subscriber].
        subscriber: &'static str,
        /// The error returned by the [Subscriber].
        #[source]
        source: anyhow::Error,
    },

    /// Error returned when the [Publisher] implementation has encountered an error.
    #[error("failed to publish domain event, an error occurred: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Interface used to notify zero or more subscribers of a new Domain Event.
///
/// Implementations must not return before the Domain Event has been handed off
/// to all the subscribers known at the time of the call.
#[async_trait]
pub trait Publisher<Evt>: Send + Sync
where
    Evt: message::Message + Send + Sync,
{
    /// Publishes a materialized Domain Event.
    async fn publish(&self, event: &event::Concrete<Evt>) -> Result<(), PublishError>;
}

/// A component interested in the Domain Events published through an [`InMemory`] Publisher.
#[async_trait]
pub trait Subscriber<Evt>: Send + Sync
where
    Evt: message::Message + Send + Sync,
{
    /// The name of the Subscriber, used in error reporting.
    fn name(&self) -> &'static str;

    /// Handles a newly published Domain Event.
    async fn on_event(&self, event: &event::Concrete<Evt>) -> anyhow::Result<()>;
}

/// In-memory fan-out [Publisher].
///
/// Each published Domain Event is handed off, in registration order, to every
/// [Subscriber] registered at the time of the call, and then broadcasted to
/// all the watchers obtained through [`InMemory::watch`].
pub struct InMemory<Evt>
where
    Evt: message::Message + Send + Sync,
{
    subscribers: Arc<RwLock<Vec<Arc<dyn Subscriber<Evt>>>>>,
    tx: broadcast::Sender<event::Concrete<Evt>>,
}

impl<Evt> Clone for InMemory<Evt>
where
    Evt: message::Message + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
            tx: self.tx.clone(),
        }
    }
}

impl<Evt> Default for InMemory<Evt>
where
    Evt: message::Message + Clone + Send + Sync,
{
    fn default() -> Self {
        Self::with_watch_capacity(DEFAULT_WATCH_CAPACITY)
    }
}

impl<Evt> InMemory<Evt>
where
    Evt: message::Message + Clone + Send + Sync,
{
    /// Creates a new Publisher, where watchers can lag behind by at most `capacity` Events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, like [`tokio::sync::broadcast::channel`].
    #[must_use]
    pub fn with_watch_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);

        Self {
            subscribers: Arc::default(),
            tx,
        }
    }

    /// Registers a new [Subscriber]; it will receive the Domain Events published
    /// from now on.
    pub fn subscribe<S>(&self, subscriber: S)
    where
        S: Subscriber<Evt> + 'static,
    {
        self.subscribers.write().push(Arc::new(subscriber));
    }

    /// Returns a stream of the Domain Events published from now on.
    ///
    /// Watchers that fall behind the channel capacity observe a lag error in the stream.
    pub fn watch(&self) -> BroadcastStream<event::Concrete<Evt>>
    where
        Evt: 'static,
    {
        BroadcastStream::new(self.tx.subscribe())
    }

    /// Returns the number of registered [Subscriber]s.
    #[must_use]
    pub fn subscribers_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[async_trait]
impl<Evt> Publisher<Evt> for InMemory<Evt>
where
    Evt: message::Message + Clone + Send + Sync,
{
    async fn publish(&self, event: &event::Concrete<Evt>) -> Result<(), PublishError> {
        // Subscribers registered while publishing will only see the next events.
        let subscribers = self.subscribers.read().clone();

        for subscriber in subscribers {
            subscriber
                .on_event(event)
                .await
                .map_err(|source| PublishError::Subscriber {
                    subscriber: subscriber.name(),
                    source,
                })?;
        }

        // Having no watchers is not an error.
        let _ = self.tx.send(event.clone());

        Ok(())
    }
}
