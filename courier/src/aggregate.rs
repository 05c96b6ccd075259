//! Module containing the Aggregate type tag used to scope Event Streams.
//!
//! `courier` never loads nor validates Aggregates: when a Command is sent
//! through [`Dispatcher::send_to`][crate::Dispatcher::send_to] (or its async counterpart),
//! the [Aggregate] type parameter is turned into a [Tag] and handed over to the
//! [Event Store][crate::event::store::Appender] together with every Domain Event produced.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// An Aggregate is the logical entity under which related Domain Events
/// are persisted together, in the same Event Stream.
pub trait Aggregate {
    /// A unique name identifier for the Aggregate type.
    fn type_name() -> &'static str;
}

/// Value form of an [Aggregate] type, used by Event Stores to select
/// the Event Stream to append to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(&'static str);

impl Tag {
    /// Creates a new [Tag] from a raw Aggregate type name.
    #[must_use]
    pub const fn new(type_name: &'static str) -> Self {
        Self(type_name)
    }

    /// Returns the [Tag] of the specified [Aggregate] type.
    #[must_use]
    pub fn of<A>() -> Self
    where
        A: Aggregate,
    {
        Self(A::type_name())
    }

    /// Returns the Aggregate type name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.0)
    }
}
