//! Daily sweep scheduler.
//!
//! Wakes once a day at a configured wall-clock time and sends digests of
//! due tasks through the notification dispatcher.

pub mod runner;
pub mod trigger;

pub use runner::{Clock, DailySweepScheduler, SweepReport, SweepState};
pub use trigger::{TriggerTime, duration_until_next_trigger};
