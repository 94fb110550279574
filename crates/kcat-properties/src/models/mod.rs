pub mod kcat_model;
pub mod model_interface;
pub mod trainer;
