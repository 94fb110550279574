pub mod attention;
pub mod cnn;
pub mod decoder;
pub mod gnn;
pub mod nn;
