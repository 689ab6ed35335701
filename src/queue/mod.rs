// Queue module
// Queue entries, position ordering, wait-time estimation and live change events

pub mod events;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod ordering;
pub mod wait_time;

pub use events::*;
pub use metrics::*;
pub use models::*;
pub use ordering::*;
pub use wait_time::*;
