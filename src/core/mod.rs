pub mod error;
pub mod heap;
pub mod ids;
pub mod memory;
pub mod oracle;
pub mod shape;
