//! Common utilities and shared types for the Iftar photo competition.
//!
//! This crate provides foundational components used across all workspace crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Day windows**: UTC calendar-day boundaries via [`DayWindow`]
//!
//! # Example
//!
//! ```no_run
//! use iftar_common::{AppResult, Config, DayWindow, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id = IdGenerator::new().generate();
//!     let today = DayWindow::today();
//!     println!("{id} posted on {} to {}", today.date(), config.server.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod day;
pub mod error;
pub mod id;

pub use config::Config;
pub use day::DayWindow;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
