pub mod clock;
pub mod errors;
pub mod events;
pub mod settings;
pub mod types;

pub use clock::*;
pub use errors::*;
pub use events::*;
pub use settings::*;
pub use types::*;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use uuid::Uuid;
