use crate::config::types::Config;

pub fn validate(config: &Config) -> Result<(), String> {
    if let Some(throttle) = &config.throttle {
        if throttle.wait_ms == 0 {
            return Err("throttle.wait_ms must be > 0".into());
        }
    }
    if let Some(debounce) = &config.debounce {
        if debounce.wait_ms == 0 {
            return Err("debounce.wait_ms must be > 0".into());
        }
        if debounce.max_wait_ms == Some(0) {
            return Err("debounce.max_wait_ms must be > 0".into());
        }
    }
    if let Some(rate_limit) = &config.rate_limit {
        if rate_limit.limit == 0 {
            return Err("rate_limit.limit must be > 0".into());
        }
        if rate_limit.window_ms == 0 {
            return Err("rate_limit.window_ms must be > 0".into());
        }
    }
    Ok(())
}
