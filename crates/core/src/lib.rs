//! Core business logic for the Iftar photo competition.

pub mod optimistic;
pub mod services;

pub use services::*;
