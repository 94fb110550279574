pub mod kcat;
