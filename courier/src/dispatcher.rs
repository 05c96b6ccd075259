//! Module containing the [Dispatcher], the entry point used to send Domain
//! [Command][command::Envelope]s to their registered Handler.
//!
//! The [Dispatcher] exposes exactly four entry points, along two axes:
//!
//! | | no Event Store | Event Store |
//! |---|---|---|
//! | blocking | [`send`][Dispatcher::send] | [`send_to`][Dispatcher::send_to] |
//! | async | [`send_async`][Dispatcher::send_async] | [`send_async_to`][Dispatcher::send_async_to] |
//!
//! All of them resolve the Handler from the [`command::Registry`], invoke it once,
//! and then propagate the resulting Domain Events in the same order
//! the Handler emitted them.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::aggregate::{Aggregate, Tag};
use crate::command::{self, Capability, Events};
use crate::event::publisher::{PublishError, Publisher};
use crate::event::store::{AppendError, Appender};
use crate::{event, message};

/// Options accepted by every [Dispatcher] entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SendOptions {
    /// Whether the Domain Events produced by the Handler should be
    /// handed over to the [Publisher].
    ///
    /// Appending to the Event Store, when requested, happens regardless.
    pub publish_events: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            publish_events: true,
        }
    }
}

impl SendOptions {
    /// Returns the [`SendOptions`] that skip the [Publisher] entirely.
    #[must_use]
    pub fn without_publishing() -> Self {
        Self {
            publish_events: false,
        }
    }
}

/// All possible error types returned by the [Dispatcher] entry points.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The Command can't identify any Handler. Returned before any Handler lookup.
    #[error("invalid command: {reason}")]
    InvalidCommand {
        /// Why the Command has been rejected.
        reason: &'static str,
    },

    /// No Handler with the requested [Capability] is registered for the Command kind.
    #[error("no {capability} handler registered for command '{command}' ({command_type})")]
    HandlerNotFound {
        /// The Command kind.
        command: &'static str,
        /// The Rust type of the Command.
        command_type: &'static str,
        /// The shape of the Handler that was looked up.
        capability: Capability,
    },

    /// The Handler failed; the error is returned as the Handler produced it.
    #[error(transparent)]
    Handler(anyhow::Error),

    /// The Event Store failed to append one of the Domain Events.
    #[error(transparent)]
    Append(#[from] AppendError),

    /// The Event Publisher failed to publish one of the Domain Events.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Routes Domain [Command][command::Envelope]s to the one Handler registered for
/// their kind, and propagates the Domain Events it produces to the Event Store
/// and/or the Event Publisher.
///
/// The [Dispatcher] holds no state between calls: ordering is guaranteed within
/// a single call only, and nothing is rolled back when a call fails halfway.
#[derive(Debug)]
pub struct Dispatcher<C, E, S, P>
where
    C: message::Message,
    E: message::Message,
{
    registry: command::Registry<C, E>,
    store: S,
    publisher: P,
}

impl<C, E, S, P> Dispatcher<C, E, S, P>
where
    C: message::Message + Send + Sync + 'static,
    E: message::Message + Send + Sync + 'static,
    S: Appender<E>,
    P: Publisher<E>,
{
    /// Creates a new [Dispatcher] from an already-populated [`command::Registry`].
    pub fn new(registry: command::Registry<C, E>, store: S, publisher: P) -> Self {
        Self {
            registry,
            store,
            publisher,
        }
    }

    /// Returns the [`command::Registry`] used to resolve Handlers.
    pub fn registry(&self) -> &command::Registry<C, E> {
        &self.registry
    }

    /// Sends the Command to its [`BlockingHandler`][command::BlockingHandler]
    /// and publishes the resulting Domain Events, unless disabled through [`SendOptions`].
    ///
    /// The Event Store is never involved.
    ///
    /// # Blocking
    ///
    /// The Event Store and Event Publisher futures are driven to completion on the
    /// caller's thread with [`futures::executor::block_on`]. Calling this method from an
    /// async task blocks the runtime thread, and it never completes on a current-thread
    /// runtime if the collaborators wait on that runtime's timers or I/O: use
    /// `tokio::task::spawn_blocking` or the async entry points instead.
    ///
    /// # Errors
    ///
    /// See [Error] for the possible failures; on publishing failures, the Domain Events
    /// preceding the failing one have been published already.
    pub fn send(
        &self,
        command: impl Into<command::Envelope<C>>,
        options: SendOptions,
    ) -> Result<(), Error> {
        self.dispatch(command.into(), None, options)
    }

    /// Sends the Command to its [`BlockingHandler`][command::BlockingHandler],
    /// appends every resulting Domain Event to the Event Stream of the [Aggregate] type `A`
    /// and publishes it, unless disabled through [`SendOptions`].
    ///
    /// # Blocking
    ///
    /// Same as [`send`][Dispatcher::send].
    ///
    /// # Errors
    ///
    /// See [Error] for the possible failures; Domain Events that precede the failing
    /// one stay appended (and published, if requested).
    pub fn send_to<A>(
        &self,
        command: impl Into<command::Envelope<C>>,
        options: SendOptions,
    ) -> Result<(), Error>
    where
        A: Aggregate,
    {
        self.dispatch(command.into(), Some(Tag::of::<A>()), options)
    }

    /// Asynchronous counterpart of [`send`][Dispatcher::send], using the asynchronous
    /// [Handler][command::Handler] registered for the Command kind.
    ///
    /// # Errors
    ///
    /// Same as [`send`][Dispatcher::send].
    pub async fn send_async(
        &self,
        command: impl Into<command::Envelope<C>>,
        options: SendOptions,
    ) -> Result<(), Error> {
        self.dispatch_async(command.into(), None, options).await
    }

    /// Asynchronous counterpart of [`send_to`][Dispatcher::send_to], using the asynchronous
    /// [Handler][command::Handler] registered for the Command kind.
    ///
    /// # Errors
    ///
    /// Same as [`send_to`][Dispatcher::send_to].
    pub async fn send_async_to<A>(
        &self,
        command: impl Into<command::Envelope<C>>,
        options: SendOptions,
    ) -> Result<(), Error>
    where
        A: Aggregate,
    {
        self.dispatch_async(command.into(), Some(Tag::of::<A>()), options)
            .await
    }

    fn dispatch(
        &self,
        command: command::Envelope<C>,
        target: Option<Tag>,
        options: SendOptions,
    ) -> Result<(), Error> {
        let kind = command_kind(&command)?;

        let handler = self
            .registry
            .blocking(kind)
            .ok_or_else(|| handler_not_found::<C>(kind, Capability::Blocking))?;

        debug!(command = kind, capability = %Capability::Blocking, "handling command");

        let events = handler(command).map_err(|err| {
            warn!(command = kind, error = %err, "command handler failed");
            Error::Handler(err)
        })?;

        futures::executor::block_on(self.propagate(kind, target, events, options))
    }

    async fn dispatch_async(
        &self,
        command: command::Envelope<C>,
        target: Option<Tag>,
        options: SendOptions,
    ) -> Result<(), Error> {
        let kind = command_kind(&command)?;

        let handler = self
            .registry
            .asynchronous(kind)
            .ok_or_else(|| handler_not_found::<C>(kind, Capability::Async))?;

        debug!(command = kind, capability = %Capability::Async, "handling command");

        let events = handler(command).await.map_err(|err| {
            warn!(command = kind, error = %err, "command handler failed");
            Error::Handler(err)
        })?;

        self.propagate(kind, target, events, options).await
    }

    /// Materializes, appends (when a target Aggregate is set) and publishes
    /// (when requested) each Domain Event, one at a time.
    async fn propagate(
        &self,
        command: &'static str,
        target: Option<Tag>,
        events: Events<E>,
        options: SendOptions,
    ) -> Result<(), Error> {
        if target.is_none() && !options.publish_events {
            debug!(command, events = events.len(), "nothing to propagate");
            return Ok(());
        }

        for envelope in events {
            let event = event::Concrete::materialize(command, envelope);

            if let Some(aggregate) = target {
                let version = self.store.append(aggregate, &event).await.map_err(|err| {
                    warn!(command, event = event.name, %aggregate, error = %err, "append failed");
                    err
                })?;

                debug!(command, event = event.name, %aggregate, version, "domain event appended");
            }

            if options.publish_events {
                self.publisher.publish(&event).await.map_err(|err| {
                    warn!(command, event = event.name, error = %err, "publish failed");
                    err
                })?;

                debug!(command, event = event.name, "domain event published");
            }
        }

        Ok(())
    }
}

fn command_kind<C>(command: &command::Envelope<C>) -> Result<&'static str, Error>
where
    C: message::Message,
{
    let kind = command.name();

    if kind.is_empty() {
        return Err(Error::InvalidCommand {
            reason: "command kind is empty",
        });
    }

    Ok(kind)
}

fn handler_not_found<C>(command: &'static str, capability: Capability) -> Error {
    warn!(command, %capability, "no handler registered");

    Error::HandlerNotFound {
        command,
        command_type: std::any::type_name::<C>(),
        capability,
    }
}
