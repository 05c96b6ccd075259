//! Contains the types used to position Domain Events inside an Event Stream.

/// The position of a Domain Event inside its Event Stream.
///
/// Used by [`crate::event::store::InMemory`] to implement stream-local ordering
/// to the messages: the first Domain Event appended to a stream has version `1`.
pub type Version = u64;
