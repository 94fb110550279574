pub mod input;
pub mod plot;
pub mod trainer;
