//! Small shared helpers: terminal-safe text handling and input debouncing.

mod debounce;
mod text;

pub use debounce::Debounce;
pub use text::{
    display_width, format_relative_time, preview, strip_control_chars, truncate_to_width,
};

/// Longest search query accepted from the search box.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
