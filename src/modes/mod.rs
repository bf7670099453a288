pub mod headless;
pub mod race;

pub use headless::HeadlessMode;
pub use race::RaceMode;
