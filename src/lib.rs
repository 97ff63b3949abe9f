#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::similar_names
)]

pub mod cli;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod keys;
pub mod lock;
pub mod monitor;
pub mod notify;
pub mod partition;
pub mod state;
pub mod storage;

mod format;
mod logger;
mod task;

#[cfg(test)]
mod testing;
