pub use std::time::Duration as StdDuration;
pub use std::time::Instant;

pub use anyhow::{anyhow, bail, Context};
pub use async_trait::async_trait;
pub use chrono::Utc;
pub use tracing::{debug, info, instrument};

pub use crate::helpers::tracing::format_elapsed;

pub type DateTime = chrono::DateTime<Utc>;
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
