pub mod confetti;
pub mod core;
pub mod editor;
pub mod effects;
mod runtime;
pub mod session;
mod view;

use std::time::{SystemTime, UNIX_EPOCH};

use time::UtcOffset;

pub use effects::Services;
pub use session::Session;

#[derive(Debug, Clone)]
pub struct BoardSettings {
    pub categories: Vec<String>,
    /// Local offset captured at startup; used for the end-of-day summary.
    pub utc_offset: UtcOffset,
    pub credential_set: bool,
}

pub async fn run(services: Services, settings: BoardSettings) -> anyhow::Result<()> {
    runtime::run(services, settings).await
}

pub(crate) fn unix_epoch_ms() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis().min(u64::MAX as u128) as u64
}
