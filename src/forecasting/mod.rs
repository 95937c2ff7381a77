//! Demand forecasting for services and diseases.
//!
//! Pipeline: merger (events + imports → gap-free series) → engine
//! (trend + seasonal fit, prediction intervals) → accuracy evaluator.
//! [`ForecastService`] wraps it with access control, request validation
//! and the persisted batch cache.

pub mod accuracy;
pub mod calendar;
pub mod engine;
pub mod error;
pub mod merger;
pub mod service;
pub mod store;
pub mod types;

pub use error::ForecastError;
pub use service::ForecastService;
pub use store::{ForecastStore, SqliteForecastStore};
pub use types::*;
