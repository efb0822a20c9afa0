//! Shared types for the agromon pipeline: canonical hourly readings,
//! derived weather alerts, and the snowflake id generator.

pub mod id;
pub mod types;
