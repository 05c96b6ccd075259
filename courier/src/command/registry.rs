//! Contains the [Registry], an explicit mapping from Command kind to the
//! one Handler responsible for it.
//!
//! The [Registry] is built once, at application startup, and handed over to
//! the [`Dispatcher`][crate::Dispatcher]: it is read-only from then on.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::command::{BlockingHandler, Capability, Envelope, Events, Handler};
use crate::message;

pub(crate) type HandlerResult<E> = Result<Events<E>, anyhow::Error>;

pub(crate) type BlockingHandlerFn<C, E> = Box<dyn Fn(Envelope<C>) -> HandlerResult<E> + Send + Sync>;

pub(crate) type AsyncHandlerFn<C, E> =
    Box<dyn Fn(Envelope<C>) -> BoxFuture<'static, HandlerResult<E>> + Send + Sync>;

/// All possible error types returned while registering a Handler in the [Registry].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    /// A Handler with the same [Capability] has already been registered for the Command kind.
    #[error("{capability} handler already registered for command '{command}'")]
    AlreadyRegistered {
        /// The Command kind.
        command: &'static str,
        /// The shape of the Handler being registered.
        capability: Capability,
    },

    /// Command kinds must not be empty, as an empty kind can't identify any Command.
    #[error("command kind must not be empty")]
    EmptyKind,
}

struct Route<C, E>
where
    C: message::Message,
    E: message::Message,
{
    blocking: Option<BlockingHandlerFn<C, E>>,
    asynchronous: Option<AsyncHandlerFn<C, E>>,
}

impl<C, E> Default for Route<C, E>
where
    C: message::Message,
    E: message::Message,
{
    fn default() -> Self {
        Self {
            blocking: None,
            asynchronous: None,
        }
    }
}

/// Maps each Command kind (i.e. [`Message::name`][message::Message::name]) to
/// at most one [`BlockingHandler`] and at most one asynchronous [Handler].
///
/// Handlers are type-erased on registration, so that all of them share
/// the same call signature regardless of their concrete error type.
pub struct Registry<C, E>
where
    C: message::Message,
    E: message::Message,
{
    routes: HashMap<&'static str, Route<C, E>>,
}

impl<C, E> Default for Registry<C, E>
where
    C: message::Message,
    E: message::Message,
{
    fn default() -> Self {
        Self {
            routes: HashMap::default(),
        }
    }
}

impl<C, E> Debug for Registry<C, E>
where
    C: message::Message,
    E: message::Message,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut kinds: Vec<_> = self.routes.keys().collect();
        kinds.sort_unstable();

        f.debug_struct("Registry").field("commands", &kinds).finish()
    }
}

impl<C, E> Registry<C, E>
where
    C: message::Message + Send + Sync + 'static,
    E: message::Message + Send + Sync + 'static,
{
    /// Creates an empty [Registry].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an asynchronous [Handler] to the specified Command kind.
    ///
    /// # Errors
    ///
    /// Fails if an asynchronous Handler is already bound to the same kind,
    /// or if the kind is empty.
    pub fn register<H>(&mut self, command: &'static str, handler: H) -> Result<(), RegisterError>
    where
        H: Handler<C, E> + 'static,
    {
        let route = self.route_for(command, Capability::Async)?;
        let handler = Arc::new(handler);

        route.asynchronous = Some(Box::new(move |cmd| {
            let handler = Arc::clone(&handler);

            async move { Handler::handle(&*handler, cmd).await.map_err(Into::into) }.boxed()
        }));

        Ok(())
    }

    /// Binds a [`BlockingHandler`] to the specified Command kind.
    ///
    /// # Errors
    ///
    /// Fails if a blocking Handler is already bound to the same kind,
    /// or if the kind is empty.
    pub fn register_blocking<H>(
        &mut self,
        command: &'static str,
        handler: H,
    ) -> Result<(), RegisterError>
    where
        H: BlockingHandler<C, E> + 'static,
    {
        let route = self.route_for(command, Capability::Blocking)?;

        route.blocking = Some(Box::new(move |cmd| {
            BlockingHandler::handle(&handler, cmd).map_err(Into::into)
        }));

        Ok(())
    }

    fn route_for(
        &mut self,
        command: &'static str,
        capability: Capability,
    ) -> Result<&mut Route<C, E>, RegisterError> {
        if command.is_empty() {
            return Err(RegisterError::EmptyKind);
        }

        let route = self.routes.entry(command).or_default();

        let taken = match capability {
            Capability::Blocking => route.blocking.is_some(),
            Capability::Async => route.asynchronous.is_some(),
        };

        if taken {
            return Err(RegisterError::AlreadyRegistered {
                command,
                capability,
            });
        }

        Ok(route)
    }
}

impl<C, E> Registry<C, E>
where
    C: message::Message,
    E: message::Message,
{
    /// Returns whether a Handler with the given [Capability] is bound to the Command kind.
    #[must_use]
    pub fn contains(&self, command: &str, capability: Capability) -> bool {
        self.routes
            .get(command)
            .is_some_and(|route| match capability {
                Capability::Blocking => route.blocking.is_some(),
                Capability::Async => route.asynchronous.is_some(),
            })
    }

    /// Returns all the Command kinds with at least one Handler bound, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.routes.keys().copied()
    }

    pub(crate) fn blocking(&self, command: &str) -> Option<&BlockingHandlerFn<C, E>> {
        self.routes
            .get(command)
            .and_then(|route| route.blocking.as_ref())
    }

    pub(crate) fn asynchronous(&self, command: &str) -> Option<&AsyncHandlerFn<C, E>> {
        self.routes
            .get(command)
            .and_then(|route| route.asynchronous.as_ref())
    }
}
