pub mod analyze;
pub mod images;
