//! Utility functions shared by services and repositories.
//!
//! - [`codes`] - ISO code normalization and provider id lists
//! - [`db_error`] - SQLSTATE classification
//! - [`retry`] - Single retry on unique-key conflicts

pub mod codes;
pub mod db_error;
pub mod retry;
