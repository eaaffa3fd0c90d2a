/// Event system module, split into registration, emission and statistics.
mod core;
mod emitters;
mod handlers;
mod stats;
mod tests;

pub use core::EventSystem;
pub use emitters::EmitReport;
pub use stats::EventSystemStats;
