pub mod cursor;
pub mod viewport;
