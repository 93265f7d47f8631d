use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,

    /// Oldest acceptable oracle reading, in seconds.
    pub oracle_staleness_tolerance_secs: u64,
    /// Minimum holding period before a request becomes cancellable.
    pub min_request_duration_secs: u64,
    /// Bootstrap per-unit price used while no units are outstanding,
    /// 18-decimal fixed point.
    pub default_share_price: u64,

    pub management_fee_bps: u16,
    pub performance_fee_bps: u16,
    pub entrance_fee_bps: u16,
    pub exit_fee_bps: u16,

    pub state_store_path: String,
    pub rate_feed_url: String,
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let s = Config::builder()
        // Set defaults
        .set_default("log_level", "info")?
        .set_default("log_to_file", false)?
        .set_default("log_file", "log/fundcore.log")?
        .set_default("oracle_staleness_tolerance_secs", 3600u64)?
        .set_default("min_request_duration_secs", 86400u64)?
        .set_default("default_share_price", 1_000_000_000_000_000_000u64)?
        .set_default("management_fee_bps", 200u64)?
        .set_default("performance_fee_bps", 2000u64)?
        .set_default("entrance_fee_bps", 0u64)?
        .set_default("exit_fee_bps", 0u64)?
        .set_default("state_store_path", "data/fund_state")?
        .set_default("rate_feed_url", "")?
        // Add configuration from a file
        .add_source(File::with_name("config/config.yaml").required(false))
        // Add configuration from environment variables
        .add_source(config::Environment::with_prefix("FUND"))
        .build()?;

    s.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load() {
        let config = load_config().unwrap();
        assert_eq!(config.default_share_price, 1_000_000_000_000_000_000);
        assert!(config.management_fee_bps < 10_000);
        assert!(config.performance_fee_bps < 10_000);
    }
}
