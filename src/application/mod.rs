pub mod diagnostics;
pub mod error;
pub mod markdown;
pub mod names;
