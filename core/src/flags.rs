use std::time::Duration;

use env_flags::env_flags;

env_flags! {
    pub SIFT_API_BASE: &str = "http://localhost:8000";
    pub SIFT_STREAM_PATH: &str = "/stream-search";

    /// Heartbeat window: a stream silent for this long is treated as dead.
    pub SIFT_STREAM_IDLE_TIMEOUT_MS: Duration = Duration::from_millis(60_000), |value| {
        value.parse().map(Duration::from_millis)
    };

    /// Fixture path for offline runs (see transport/fixture.rs).
    pub SIFT_SSE_FIXTURE: Option<&str> = None;

    /// Overrides `~/.sift` as the directory holding `config.toml`.
    pub SIFT_HOME: Option<&str> = None;
}
