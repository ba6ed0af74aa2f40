pub mod allocation;
pub mod calendar;
pub mod config;
pub mod demo;
pub mod display;
pub mod error;
pub mod roster;
pub mod web;
pub mod writeback;

pub use config::AllocatorConfig;
pub use error::{AllocError, Result};
pub use roster::{load_roster, Person, Roster};
