use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - API keys are present when api_key auth is selected
/// - Playback timings are positive and the poll window fits inside the lock TTL
/// - Proxy buffer holds at least one read
/// - An enabled playback rate limit has a window
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_keys.iter().all(|k| k.trim().is_empty())
    {
        return Err(invalid("auth.api_keys must not be empty when method = \"api_key\""));
    }

    let playback = &config.playback;
    if playback.lock_ttl_secs == 0 || playback.link_ttl_secs == 0 {
        return Err(invalid("playback lock and link TTLs must be positive"));
    }
    if playback.poll_attempts == 0 || playback.poll_interval_ms == 0 {
        return Err(invalid("playback.poll_attempts and poll_interval_ms must be positive"));
    }
    if playback.provisional_ttl_secs == 0 || playback.download_flag_ttl_secs == 0 {
        return Err(invalid("playback provisional and download flag TTLs must be positive"));
    }
    // Waiters give up before the lock holder's lease expires.
    let poll_window_ms = playback.poll_interval_ms * u64::from(playback.poll_attempts);
    if poll_window_ms > playback.lock_ttl_secs * 1000 {
        return Err(invalid(&format!(
            "playback poll window ({}ms) exceeds lock_ttl_secs ({}s)",
            poll_window_ms, playback.lock_ttl_secs
        )));
    }
    if playback.provisional_ttl_secs > playback.link_ttl_secs {
        return Err(invalid("playback.provisional_ttl_secs cannot exceed link_ttl_secs"));
    }

    if playback.proxy_read_size == 0 {
        return Err(invalid("playback.proxy_read_size must be positive"));
    }
    if playback.proxy_buffer_size < playback.proxy_read_size {
        return Err(invalid(
            "playback.proxy_buffer_size must be at least proxy_read_size",
        ));
    }

    if playback.rate_limit_requests > 0 && playback.rate_limit_window_secs == 0 {
        return Err(invalid(
            "playback.rate_limit_window_secs must be positive when rate limiting is enabled",
        ));
    }

    if config.search.public_host.trim().is_empty() {
        return Err(invalid("search.public_host cannot be empty"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
