pub mod renderer;

pub use renderer::{describe_stats, Renderer};
