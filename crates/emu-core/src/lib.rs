//! Core traits shared by the machine and chip crates.
//!
//! Every component is driven by the machine's CPU clock. Bus accesses report
//! the wait states they cost so the CPU core can stretch its machine cycle.

mod bus;
mod clock;
mod observable;
mod tickable;

pub use bus::{Bus, ReadResult};
pub use clock::MasterClock;
pub use observable::{Observable, Value};
pub use tickable::Tickable;
