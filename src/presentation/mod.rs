pub mod comments;
pub mod views;
