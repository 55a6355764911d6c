pub mod command;
pub mod extract;
pub mod frames;
pub mod info;
mod loader;
mod progress;
pub mod seek;
