#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
//! # mias-dispatch
//! Answers short text commands received over a mesh link.
//!
//! [`Dispatcher::handle`] takes one inbound message, matches its payload against the [`Command`]
//! vocabulary and hands at most one [`Reply`] to a [`Transport`]. The `temp` command powers the
//! 1-Wire bus up around each sensor read and reads every configured [`Sensor`] in turn.
//!
//! Handling is synchronous. A `temp` request blocks for several seconds (power settling plus one
//! conversion per sensor), during which the dispatcher holds `&mut` access to the bus and power pin.
//! A host that dispatches messages concurrently has to put the dispatcher behind a mutex and run
//! `temp` requests off its receive path.

mod command;
mod dispatcher;
mod message;
mod power;

pub use command::{Command, MAX_REQUEST_LEN};
pub use dispatcher::{DEFAULT_SENSORS, DispatchError, Dispatcher, Disposition, Sensor};
pub use message::{Inbound, MAX_PAYLOAD_LEN, REPLY_HOP_LIMIT, Reply, Transport};
pub use power::PowerGate;
