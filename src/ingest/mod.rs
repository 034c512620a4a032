pub mod isatab;
pub mod synthetic;
pub mod table;
