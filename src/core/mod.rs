pub mod error;
pub mod value;

pub use error::{DateShiftError, Result};
pub use value::Value;

pub type Row = Vec<Value>;
