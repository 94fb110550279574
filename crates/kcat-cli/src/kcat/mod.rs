pub mod inference;
pub mod load_data;
pub mod train;
pub mod util;
