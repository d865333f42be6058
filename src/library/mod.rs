pub mod filter;
pub mod manager;
pub mod scan;
pub mod store;
pub mod tags;

pub use manager::Library;
