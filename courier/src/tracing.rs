//! Module containing some extension traits to support code instrumentation
//! using the `tracing` crate.

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::instrument;

use crate::aggregate::Tag;
use crate::event::publisher::{PublishError, Publisher};
use crate::event::store::{AppendError, Appender};
use crate::version::Version;
use crate::{event, message};

/// [`Appender`] type wrapper that provides instrumentation
/// features through the `tracing` crate.
#[derive(Debug, Clone)]
pub struct InstrumentedAppender<T, Evt>
where
    T: Appender<Evt>,
    Evt: message::Message + Debug + Send + Sync,
{
    store: T,
    event: PhantomData<Evt>,
}

#[async_trait]
impl<T, Evt> Appender<Evt> for InstrumentedAppender<T, Evt>
where
    T: Appender<Evt>,
    Evt: message::Message + Debug + Send + Sync,
{
    #[allow(clippy::blocks_in_conditions)] // NOTE: seems to be a false positive.
    #[instrument(
        name = "event::store::Appender.append",
        ret,
        err,
        skip(self, event),
        fields(event = event.name, causation = event.causation)
    )]
    async fn append(
        &self,
        aggregate: Tag,
        event: &event::Concrete<Evt>,
    ) -> Result<Version, AppendError> {
        self.store.append(aggregate, event).await
    }
}

/// Extension trait for any [`Appender`] type to provide
/// instrumentation features through the `tracing` crate.
pub trait AppenderExt<Evt>: Appender<Evt> + Sized
where
    Evt: message::Message + Debug + Send + Sync,
{
    /// Returns an instrumented version of the [`Appender`] instance.
    fn with_tracing(self) -> InstrumentedAppender<Self, Evt> {
        InstrumentedAppender {
            store: self,
            event: PhantomData,
        }
    }
}

impl<T, Evt> AppenderExt<Evt> for T
where
    T: Appender<Evt>,
    Evt: message::Message + Debug + Send + Sync,
{
}

/// [`Publisher`] type wrapper that provides instrumentation
/// features through the `tracing` crate.
#[derive(Debug, Clone)]
pub struct InstrumentedPublisher<T, Evt>
where
    T: Publisher<Evt>,
    Evt: message::Message + Debug + Send + Sync,
{
    publisher: T,
    event: PhantomData<Evt>,
}

#[async_trait]
impl<T, Evt> Publisher<Evt> for InstrumentedPublisher<T, Evt>
where
    T: Publisher<Evt>,
    Evt: message::Message + Debug + Send + Sync,
{
    #[allow(clippy::blocks_in_conditions)] // NOTE: seems to be a false positive.
    #[instrument(
        name = "event::publisher::Publisher.publish",
        err,
        skip(self, event),
        fields(event = event.name, causation = event.causation)
    )]
    async fn publish(&self, event: &event::Concrete<Evt>) -> Result<(), PublishError> {
        self.publisher.publish(event).await
    }
}

/// Extension trait for any [`Publisher`] type to provide
/// instrumentation features through the `tracing` crate.
pub trait PublisherExt<Evt>: Publisher<Evt> + Sized
where
    Evt: message::Message + Debug + Send + Sync,
{
    /// Returns an instrumented version of the [`Publisher`] instance.
    fn with_tracing(self) -> InstrumentedPublisher<Self, Evt> {
        InstrumentedPublisher {
            publisher: self,
            event: PhantomData,
        }
    }
}

impl<T, Evt> PublisherExt<Evt> for T
where
    T: Publisher<Evt>,
    Evt: message::Message + Debug + Send + Sync,
{
}
