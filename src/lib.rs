//! Intake Bot — multi-step registration over chat.

pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod registration;
