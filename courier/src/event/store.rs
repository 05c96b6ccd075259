//! Contains the Event Store abstractions used by the [`Dispatcher`][crate::Dispatcher],
//! and the [`std::collections::HashMap`]'s based [`InMemory`] Event Store implementation.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{iter, BoxStream, StreamExt};
use parking_lot::RwLock;

use crate::aggregate::Tag;
use crate::version::Version;
use crate::{event, message};

/// An [`event::Concrete`] Domain Event that has been persisted to the Event Store.
#[derive(Debug, Clone, PartialEq)]
pub struct Persisted<Evt>
where
    Evt: message::Message,
{
    /// The Aggregate type the persisted Event belongs to.
    pub aggregate: Tag,

    /// The version of the Event Stream when this Event has been recorded.
    pub version: Version,

    /// The actual Domain Event carried by this envelope.
    pub event: event::Concrete<Evt>,
}

/// Specifies the slice of the Event Stream to select when calling [`Streamer::stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelect {
    /// Selects all Events in the Event Stream.
    All,

    /// Selects all Events in the Event Stream starting from the Event
    /// with the specified [Version].
    From(Version),
}

/// Stream is a stream of [Persisted] Domain Events.
pub type Stream<'a, Evt, Err> = BoxStream<'a, Result<Persisted<Evt>, Err>>;

/// All possible error types returned by [`Appender::append`].
#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    /// Error returned when the [Appender] implementation has encountered an error.
    #[error("failed to append domain event, an error occurred: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Interface used to append new Domain Events in an Event Store.
///
/// Every call must be atomic: either the Event is recorded or the call fails,
/// and Events must be recorded in the same order they are submitted.
#[async_trait]
pub trait Appender<Evt>: Send + Sync
where
    Evt: message::Message + Send + Sync,
{
    /// Appends a new Domain Event to the Event Stream of the specified Aggregate type.
    ///
    /// The result of this operation is the new [Version] of the Event Stream
    /// with the specified Domain Event added to it.
    async fn append(
        &self,
        aggregate: Tag,
        event: &event::Concrete<Evt>,
    ) -> Result<Version, AppendError>;
}

/// Interface used to stream [Persisted] Domain Events from an Event Store to an application.
///
/// The [`Dispatcher`][crate::Dispatcher] never reads from the Event Store:
/// this interface is meant for consumers of the Event Streams.
pub trait Streamer<Evt>: Send + Sync
where
    Evt: message::Message + Send + Sync,
{
    /// The error type returned by the Store during a [`stream`][Streamer::stream] call.
    type Error: Send + Sync;

    /// Opens the Event Stream of the specified Aggregate type.
    fn stream(&self, aggregate: &Tag, select: VersionSelect) -> Stream<'_, Evt, Self::Error>;
}

/// In-memory implementation of an Event Store, backed by a thread-safe
/// [`std::collections::HashMap`], where every Aggregate type owns a separate Event Stream.
#[derive(Debug, Clone)]
pub struct InMemory<Evt>
where
    Evt: message::Message,
{
    backend: Arc<RwLock<HashMap<Tag, Vec<Persisted<Evt>>>>>,
}

impl<Evt> Default for InMemory<Evt>
where
    Evt: message::Message,
{
    fn default() -> Self {
        Self {
            backend: Arc::default(),
        }
    }
}

impl<Evt> Streamer<Evt> for InMemory<Evt>
where
    Evt: message::Message + Clone + Send + Sync,
{
    type Error = Infallible;

    fn stream(&self, aggregate: &Tag, select: VersionSelect) -> Stream<'_, Evt, Self::Error> {
        let events = self
            .backend
            .read()
            .get(aggregate)
            .cloned()
            .unwrap_or_default() // NOTE: the new Vec is empty, so there will be no memory allocation!
            .into_iter()
            .filter(move |evt| match select {
                VersionSelect::All => true,
                VersionSelect::From(v) => evt.version >= v,
            });

        iter(events).map(Ok).boxed()
    }
}

#[async_trait]
impl<Evt> Appender<Evt> for InMemory<Evt>
where
    Evt: message::Message + Clone + Send + Sync,
{
    async fn append(
        &self,
        aggregate: Tag,
        event: &event::Concrete<Evt>,
    ) -> Result<Version, AppendError> {
        let mut backend = self.backend.write();
        let stream = backend.entry(aggregate).or_default();

        let version = stream.last().map_or(0, |evt| evt.version) + 1;

        stream.push(Persisted {
            aggregate,
            version,
            event: event.clone(),
        });

        Ok(version)
    }
}

/// Decorator type for an [`Appender`] implementation that tracks the list of
/// recorded Domain Events through it.
///
/// Useful for testing purposes, i.e. asserting that Domain Events written throguh
/// this Event Store instance are the ones expected.
#[derive(Debug, Clone)]
pub struct Tracking<T, Evt>
where
    T: Appender<Evt>,
    Evt: message::Message + Send + Sync,
{
    store: T,
    events: Arc<RwLock<Vec<Persisted<Evt>>>>,
}

impl<T, Evt> Tracking<T, Evt>
where
    T: Appender<Evt>,
    Evt: message::Message + Clone + Send + Sync,
{
    /// Returns the list of recorded Domain Events through this decorator so far.
    pub fn recorded_events(&self) -> Vec<Persisted<Evt>> {
        self.events.read().clone()
    }

    /// Resets the list of recorded Domain Events through this decorator.
    pub fn reset_recorded_events(&self) {
        self.events.write().clear();
    }
}

impl<T, Evt> Streamer<Evt> for Tracking<T, Evt>
where
    T: Appender<Evt> + Streamer<Evt>,
    Evt: message::Message + Clone + Send + Sync,
{
    type Error = <T as Streamer<Evt>>::Error;

    fn stream(&self, aggregate: &Tag, select: VersionSelect) -> Stream<'_, Evt, Self::Error> {
        self.store.stream(aggregate, select)
    }
}

#[async_trait]
impl<T, Evt> Appender<Evt> for Tracking<T, Evt>
where
    T: Appender<Evt>,
    Evt: message::Message + Clone + Send + Sync,
{
    async fn append(
        &self,
        aggregate: Tag,
        event: &event::Concrete<Evt>,
    ) -> Result<Version, AppendError> {
        let version = self.store.append(aggregate, event).await?;

        self.events.write().push(Persisted {
            aggregate,
            version,
            event: event.clone(),
        });

        Ok(version)
    }
}

/// Extension trait that can be used to pull in supertypes implemented
/// in this module.
pub trait EventStoreExt<Evt>: Appender<Evt> + Sized
where
    Evt: message::Message + Clone + Send + Sync,
{
    /// Returns a [`Tracking`] instance that decorates the original [`Appender`]
    /// instance this method has been called on.
    fn with_recorded_events_tracking(self) -> Tracking<Self, Evt> {
        Tracking {
            store: self,
            events: Arc::default(),
        }
    }
}

impl<T, Evt> EventStoreExt<Evt> for T
where
    T: Appender<Evt>,
    Evt: message::Message + Clone + Send + Sync,
{
}
