//! Module containing support for Domain [Command]s.
//!
//! Following the Domain-driven Design definition, a [Command] expresses the
//! intent of an Actor (e.g. a Customer, a User, a System, etc.) to modify
//! the state of the system in some way.
//!
//! To modify the state of the system through a [Command], you must
//! implement a Command [Handler] (or a [`BlockingHandler`]) which evaluates
//! the Command and emits the Domain [Event][crate::event::Envelope]s describing
//! what happened as a result.
//!
//! Handlers are bound to a Command kind through the [Registry], which is then
//! handed over to a [`Dispatcher`][crate::Dispatcher].
//!
//! [Command]: Envelope

pub mod registry;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::future::Future;

use async_trait::async_trait;

use crate::{event, message};

pub use self::registry::{RegisterError, Registry};

/// A Command represents an intent by an Actor (e.g. a User, or a System)
/// to mutate the state of the system.
///
/// In an event-sourced system, a Command is represented as a [Message][message::Message].
pub type Envelope<T> = message::Envelope<T>;

/// The list of Domain Events produced by a Command handler, in emission order.
pub type Events<E> = Vec<event::Envelope<E>>;

/// A software component that is able to handle [Command][Envelope]s asynchronously,
/// and to describe the resulting state mutation through a list of Domain Events,
/// or fail.
#[async_trait]
pub trait Handler<C, E>: Send + Sync
where
    C: message::Message,
    E: message::Message,
{
    /// The error type returned by the Handler while handling a [Command][Envelope].
    type Error: Into<anyhow::Error> + Send + Sync;

    /// Handles a [Command][Envelope] and returns the Domain Events it produced,
    /// in the order they happened. An empty list means nothing happened.
    async fn handle(&self, command: Envelope<C>) -> Result<Events<E>, Self::Error>;
}

#[async_trait]
impl<C, E, Err, F, Fut> Handler<C, E> for F
where
    C: message::Message + Send + Sync + 'static,
    E: message::Message + Send + Sync + 'static,
    Err: Into<anyhow::Error> + Send + Sync + 'static,
    F: Send + Sync + Fn(Envelope<C>) -> Fut,
    Fut: Send + Future<Output = Result<Events<E>, Err>> + 'static,
{
    type Error = Err;

    async fn handle(&self, command: Envelope<C>) -> Result<Events<E>, Self::Error> {
        self(command).await
    }
}

/// The synchronous counterpart of [Handler]: handles a [Command][Envelope] on the
/// caller's thread, without suspending.
pub trait BlockingHandler<C, E>: Send + Sync
where
    C: message::Message,
    E: message::Message,
{
    /// The error type returned by the Handler while handling a [Command][Envelope].
    type Error: Into<anyhow::Error> + Send + Sync;

    /// Handles a [Command][Envelope] and returns the Domain Events it produced,
    /// in the order they happened. An empty list means nothing happened.
    ///
    /// # Errors
    ///
    /// Returns the Handler-specific error when the Command could not be handled.
    fn handle(&self, command: Envelope<C>) -> Result<Events<E>, Self::Error>;
}

impl<C, E, Err, F> BlockingHandler<C, E> for F
where
    C: message::Message,
    E: message::Message,
    Err: Into<anyhow::Error> + Send + Sync,
    F: Send + Sync + Fn(Envelope<C>) -> Result<Events<E>, Err>,
{
    type Error = Err;

    fn handle(&self, command: Envelope<C>) -> Result<Events<E>, Self::Error> {
        self(command)
    }
}

/// The shape of a Command handler: whether it runs on the caller's thread
/// or it is awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// A [`BlockingHandler`].
    Blocking,
    /// An asynchronous [Handler].
    Async,
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Capability::Blocking => f.write_str("blocking"),
            Capability::Async => f.write_str("async"),
        }
    }
}
