pub mod editor;
pub mod engine;
pub mod metadata;
pub mod session;
