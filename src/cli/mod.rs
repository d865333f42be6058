pub mod commands;
pub mod player;
