//! Server command implementation

use anyhow::Result;
use pulse_core::Config;

pub async fn cmd_serve(
    config: Config,
    host: &str,
    port: u16,
    allowed_origins: Vec<String>,
) -> Result<()> {
    println!("🚀 Starting Pulse web server...");
    println!("   Listening: http://{}:{}", host, port);
    println!(
        "   Generator: {} (model: {})",
        config.generator.base_url, config.generator.model
    );
    println!(
        "   Cache: {:?} (TTL {}s)",
        config.cache.backend, config.cache.ttl_secs
    );
    println!("   🚦 Rate limit: {} per client", config.rate_limit);
    if allowed_origins.is_empty() {
        println!("   🔒 CORS: same-origin only");
    } else {
        println!("   🌐 CORS origins: {}", allowed_origins.join(", "));
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let server_config = pulse_server::ServerConfig {
        allowed_origins,
        ..pulse_server::ServerConfig::from_config(&config)
    };

    pulse_server::serve_with_config(config, host, port, server_config).await
}
