pub mod hours;
pub mod models;

pub use hours::*;
pub use models::*;
