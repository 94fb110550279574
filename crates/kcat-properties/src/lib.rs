pub mod building_blocks;
pub mod error;
pub mod models;
pub mod utils;
