pub mod csv;
pub mod sink;
