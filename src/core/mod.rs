//! Core rate model, conversion and provider abstractions

pub mod client;
pub mod config;
pub mod converter;
pub mod error;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use client::{CurrencyApiClient, FailurePolicy, Provider};
pub use converter::{BaseRateConverter, ReciprocalConverter, convert_base};
pub use error::RateError;
pub use rates::{RateMap, RateResponse, round_rate};
