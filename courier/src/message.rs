//! Commands and Events share one shape: a tagged payload, the [Message],
//! wrapped in an [Envelope] that travels through the [`Dispatcher`][crate::Dispatcher]
//! together with caller-provided [Metadata].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[cfg(feature = "macros")]
pub use courier_macros::Message;

/// A tagged payload: the tag returned by [`Message::name`] is the Command kind
/// the [`command::Registry`][crate::command::Registry] routes on, or the Event name
/// recorded by [`event::Concrete`][crate::event::Concrete].
///
/// Commands and Events are usually `enum`s, tagged by variant (e.g. `OpenAccount`
/// produces `AccountOpened`). An empty tag marks a Command that can't be dispatched.
pub trait Message {
    /// Returns the tag of the [Message].
    fn name(&self) -> &'static str;
}

/// Free-form key-value pairs carried next to a [Message], e.g. correlation ids.
/// The [`Dispatcher`][crate::Dispatcher] never reads them.
pub type Metadata = HashMap<String, String>;

/// A [Message] as handed to Handlers, Event Stores and Event Publishers.
///
/// Equality only compares the payload: two Envelopes differing only in [Metadata] are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T>
where
    T: Message,
{
    /// The tagged payload.
    pub message: T,
    /// Context attached by the sender.
    pub metadata: Metadata,
}

impl<T> Envelope<T>
where
    T: Message,
{
    /// Sets a [Metadata] entry, replacing any previous value under the same key.
    #[must_use]
    pub fn with_metadata(mut self, key: String, value: String) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Returns the tag of the carried [Message].
    pub fn name(&self) -> &'static str {
        self.message.name()
    }
}

impl<T> From<T> for Envelope<T>
where
    T: Message,
{
    fn from(message: T) -> Self {
        Envelope {
            message,
            metadata: Metadata::default(),
        }
    }
}

impl<T> PartialEq for Envelope<T>
where
    T: Message + PartialEq,
{
    fn eq(&self, other: &Envelope<T>) -> bool {
        self.message == other.message
    }
}
