pub mod classify;
pub mod content_type;
pub mod object;
