#![cfg_attr(not(any(test, feature = "sim")), no_std)]
#![deny(missing_docs)]
//! # mias-onewire
//! A no-std abstraction of the 1-Wire bus.
//!
//! The [OneWire] trait defines the primitive operations a bus master must provide: resetting the bus
//! (with presence detection), writing and reading bytes, and writing and reading single bits.
//! Device drivers are written against this trait, so the same driver runs on a bit-banged GPIO master,
//! a bridge chip, or the simulated bus used in tests.
//!
//! The crate also provides the 64-bit ROM [Address] type, the Dallas/Maxim CRC-8 in [OneWireCrc], and the
//! ROM search algorithm in [OneWireSearch].
//!
//! All operations are blocking. A bus handle is a single-owner resource: every method takes `&mut self`,
//! so a driver holds exclusive access to the bus for the duration of a transaction.

mod address;
pub mod consts;
mod error;
mod search;
#[cfg(any(test, feature = "sim"))]
mod sim;
mod traits;
mod utils;

pub use address::{Address, AddressParseError};
pub use error::OneWireError;
pub use search::OneWireSearch;
#[cfg(any(test, feature = "sim"))]
pub use sim::{SimBus, SimDevice, SimStatus};
pub use traits::{OneWire, OneWireStatus};
pub use utils::OneWireCrc;

/// Error type for 1-Wire operations.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;
