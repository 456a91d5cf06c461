//! Terminal User Interface module.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task result handling
//! - `helpers` - Background task spawning
//! - `render` - View rendering dispatch and overlays
//! - `posts` / `sidebar` - Feed view panels
//! - `detail` - Post with its comment tree
//! - `compose` - Create-post modal
//! - `catalog` - Sweet-shop grid and forms
//! - `status` / `help` - Status bar and help overlay

mod catalog;
mod compose;
mod detail;
mod events;
mod help;
mod helpers;
mod input;
mod loop_runner;
mod posts;
mod render;
mod sidebar;
mod status;

pub use loop_runner::{run, Action};
