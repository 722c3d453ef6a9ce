//! Config command implementation

use pulse_core::Config;

/// Effective configuration as display lines, without the API key
pub fn config_lines(config: &Config) -> Vec<String> {
    let t = &config.thresholds;
    let mut lines = vec![
        format!("App: {} {} ({})", config.app.name, config.app.version, config.app.environment),
        String::new(),
        format!("Target deep work: {} min", t.target_deep_work_minutes),
        format!("Target sleep: {} h", t.target_sleep_hours),
        format!("Max interruptions: {}", t.max_interruptions),
        format!("Max meetings: {} min", t.max_meeting_minutes),
        String::new(),
        format!("Generator: {} (model: {})", config.generator.base_url, config.generator.model),
        "API key: ***".to_string(),
        format!(
            "Temperature: {}, max tokens: {}, timeout: {}s",
            config.generator.temperature, config.generator.max_tokens, config.generator.timeout_secs
        ),
        format!(
            "Retries: {} attempts, backoff {}s..{}s",
            config.retry.max_attempts,
            config.retry.base_delay.as_secs(),
            config.retry.max_delay.as_secs()
        ),
        String::new(),
        format!("Cache: {:?}, TTL {}s", config.cache.backend, config.cache.ttl_secs),
    ];
    if config.cache.backend == pulse_core::CacheBackendKind::Redis {
        lines.push(format!("Redis: {}", redact_url_password(&config.cache.redis_url)));
    }
    lines.push(format!("Rate limit: {}", config.rate_limit));
    lines
}

/// Replace the password in `redis://:password@host` style URLs
fn redact_url_password(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let userinfo = &url[scheme_end + 3..at];
            match userinfo.split_once(':') {
                Some((user, _)) => format!("{}{}:***{}", &url[..scheme_end + 3], user, &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}

pub fn cmd_config(config: &Config) {
    println!();
    println!("⚙️  Pulse Configuration");
    println!("   ─────────────────────────────────────────────────────────────");
    for line in config_lines(config) {
        if line.is_empty() {
            println!();
        } else {
            println!("   {}", line);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url_password() {
        assert_eq!(
            redact_url_password("redis://:hunter2@cache:6379/0"),
            "redis://:***@cache:6379/0"
        );
        assert_eq!(
            redact_url_password("redis://localhost:6379/0"),
            "redis://localhost:6379/0"
        );
    }
}
