//! `courier` routes Domain [Command][command::Envelope]s to exactly one registered
//! [Handler][command::Handler], and propagates the Domain [Event][event::Envelope]s
//! it produces to an [Event Store][event::store::Appender] and/or an
//! [Event Publisher][event::publisher::Publisher], preserving the order
//! in which the Handler emitted them.
//!
//! Check out the [`Dispatcher`] type documentation for the entry points.

#![deny(unsafe_code, unused_qualifications, trivial_casts)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod command;
pub mod dispatcher;
pub mod event;
pub mod message;
pub mod tracing;
pub mod version;

pub use crate::aggregate::Aggregate;
pub use crate::dispatcher::{Dispatcher, SendOptions};
