pub mod race_metrics;

pub use race_metrics::RaceMetrics;
