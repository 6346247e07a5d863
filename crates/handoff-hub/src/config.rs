//! Hub configuration.

/// Configuration for the relay hub.
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    /// Maximum frames held per backlog (the host backlog and each client
    /// backlog separately).
    ///
    /// `None` (the default) keeps every frame for as long as the process
    /// lives, so a target that never connects holds its frames forever.
    /// With a limit, a full backlog drops its *oldest* frame to make room;
    /// `Some(0)` keeps nothing at all.
    pub backlog_limit: Option<usize>,
}

impl HubConfig {
    /// A config that bounds every backlog to `limit` frames.
    pub fn with_backlog_limit(limit: usize) -> Self {
        Self {
            backlog_limit: Some(limit),
        }
    }
}
