pub mod config;
pub mod results;
pub mod worker;

pub use config::SweepConfig;
pub use results::SweepResult;
pub use worker::OrphanSweeper;
