// src/services/mod.rs

pub mod analytics;
pub mod attempt;
pub mod scoring;

pub use analytics::AnalyticsService;
pub use attempt::AttemptService;
