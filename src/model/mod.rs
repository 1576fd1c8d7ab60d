pub mod config;
pub mod cursor;
pub mod focus;
pub mod text_field;
