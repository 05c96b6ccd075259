//! Module `event` contains types and abstractions helpful for working
//! with Domain Events.

use serde::Serialize;

use crate::message;

pub mod publisher;
pub mod store;

/// An Event is a [Message][message::Message] carring the information about a Domain Event,
/// an occurrence in the system lifetime that is relevant for the Domain
/// that is being implemented.
///
/// Command Handlers emit Events as a tagged union, usually an `enum` of all the
/// Domain Events of an Aggregate.
pub type Envelope<T> = message::Envelope<T>;

/// The materialized form of a Domain [Event][Envelope], the one that Event Stores
/// and Event Publishers operate on.
///
/// On top of the original [Envelope], it carries the resolved Event name
/// (the tag of the Event variant) and the kind of the Command that caused it.
#[derive(Debug, Clone, Serialize)]
pub struct Concrete<T>
where
    T: message::Message,
{
    /// The name of the Domain Event, as returned by [`message::Message::name`].
    pub name: &'static str,

    /// The kind of the Command which handling produced this Domain Event.
    pub causation: &'static str,

    /// The actual Domain Event carried by this type.
    pub event: Envelope<T>,
}

impl<T> Concrete<T>
where
    T: message::Message,
{
    /// Materializes a Domain Event emitted while handling a Command of kind `causation`.
    ///
    /// Materialization is total and side-effect free: the concrete type is selected
    /// by the tag of the Event variant.
    pub fn materialize(causation: &'static str, event: Envelope<T>) -> Self {
        Self {
            name: event.message.name(),
            causation,
            event,
        }
    }

    /// Returns the Domain Event payload.
    pub fn message(&self) -> &T {
        &self.event.message
    }
}

impl<T> PartialEq for Concrete<T>
where
    T: message::Message + PartialEq,
{
    fn eq(&self, other: &Concrete<T>) -> bool {
        self.name == other.name && self.causation == other.causation && self.event == other.event
    }
}
