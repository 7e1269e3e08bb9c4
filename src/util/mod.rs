pub mod dates;
pub mod sanitize;
