// ABOUTME: Library root for skiff - exposes the orchestration core and the stack.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod image;
pub mod resource;
pub mod stack;
pub mod types;
