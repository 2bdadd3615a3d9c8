pub mod builder;
pub mod dto;
pub mod engine;
pub mod errors;
pub mod gc;
pub mod ports;
pub mod use_cases;
pub mod validation;
