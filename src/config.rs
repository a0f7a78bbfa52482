use crate::error::ConfigError;
use crate::resolver::TrustPolicy;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Bounds for `max_attempts`
pub const MIN_ATTEMPTS: u32 = 3;
pub const MAX_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Recursive resolvers queried for TXT, DNSKEY and DS records
    pub upstream_servers: Vec<SocketAddr>,

    /// Timeout for a single query attempt
    pub query_timeout: Duration,

    /// Attempts per query, including the first
    pub max_attempts: u32,

    /// First backoff delay between attempts
    pub retry_base_delay: Duration,

    /// Upper bound for a single backoff delay
    pub retry_max_delay: Duration,

    pub trust_policy: TrustPolicy,

    /// Accept provably unsigned zones under the strict policy
    pub allow_insecure: bool,

    /// Presentation-format DS/DNSKEY file replacing the built-in root anchors
    pub trust_anchor_file: Option<PathBuf>,

    /// EDNS0 UDP payload size advertised on queries
    pub edns_payload_size: u16,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            upstream_servers: vec![
                "1.1.1.1:53".parse().expect("Cloudflare DNS is valid"),
                "8.8.8.8:53".parse().expect("Google DNS is valid"),
            ],
            query_timeout: Duration::from_millis(3000),
            max_attempts: MIN_ATTEMPTS,
            retry_base_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_millis(2000),
            trust_policy: TrustPolicy::Strict,
            allow_insecure: false,
            trust_anchor_file: None,
            // DNS flag day 2020 recommendation
            edns_payload_size: 1232,
        }
    }
}

impl ResolverConfig {
    /// Create a ResolverConfig from `OPENALIAS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(upstream_servers) = lookup("OPENALIAS_UPSTREAM_SERVERS") {
            config.upstream_servers = parse_upstream_servers(&upstream_servers)?;
        }

        if let Some(timeout_ms) = lookup("OPENALIAS_QUERY_TIMEOUT_MS") {
            config.query_timeout = Duration::from_millis(
                timeout_ms
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidTimeout(timeout_ms.clone()))?,
            );
        }

        if let Some(attempts) = lookup("OPENALIAS_MAX_ATTEMPTS") {
            config.max_attempts = attempts
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidAttempts(attempts.clone()))?;
        }

        if let Some(base_delay) = lookup("OPENALIAS_RETRY_BASE_DELAY_MS") {
            config.retry_base_delay = Duration::from_millis(base_delay.parse::<u64>().map_err(
                |_| ConfigError::ParseError(format!("Invalid retry base delay: {}", base_delay)),
            )?);
        }

        if let Some(max_delay) = lookup("OPENALIAS_RETRY_MAX_DELAY_MS") {
            config.retry_max_delay = Duration::from_millis(max_delay.parse::<u64>().map_err(
                |_| ConfigError::ParseError(format!("Invalid retry max delay: {}", max_delay)),
            )?);
        }

        if let Some(policy) = lookup("OPENALIAS_TRUST_POLICY") {
            config.trust_policy = policy.parse()?;
        }

        if let Some(allow_insecure) = lookup("OPENALIAS_ALLOW_INSECURE") {
            config.allow_insecure = parse_bool(&allow_insecure, false);
        }

        if let Some(anchor_file) = lookup("OPENALIAS_TRUST_ANCHOR_FILE") {
            if !anchor_file.is_empty() {
                config.trust_anchor_file = Some(PathBuf::from(anchor_file));
            }
        }

        if let Some(payload_size) = lookup("OPENALIAS_EDNS_PAYLOAD_SIZE") {
            config.edns_payload_size = payload_size
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPayloadSize(payload_size.clone()))?;
        }

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream_servers.is_empty() {
            return Err(ConfigError::InvalidUpstreamServer(
                "No upstream servers configured".to_string(),
            ));
        }

        if self.query_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if self.query_timeout > Duration::from_secs(60) {
            return Err(ConfigError::InvalidTimeout(
                "Timeout too large (max 60 seconds)".to_string(),
            ));
        }

        if !(MIN_ATTEMPTS..=MAX_ATTEMPTS).contains(&self.max_attempts) {
            return Err(ConfigError::InvalidAttempts(format!(
                "{} (must be between {} and {})",
                self.max_attempts, MIN_ATTEMPTS, MAX_ATTEMPTS
            )));
        }

        if self.retry_base_delay > self.retry_max_delay {
            return Err(ConfigError::ParseError(
                "Retry base delay exceeds max delay".to_string(),
            ));
        }

        if self.edns_payload_size < 512 {
            return Err(ConfigError::InvalidPayloadSize(format!(
                "{} (minimum 512)",
                self.edns_payload_size
            )));
        }

        Ok(())
    }
}

/// Comma-separated `ip:port` list; a bare IP gets port 53
pub fn parse_upstream_servers(list: &str) -> Result<Vec<SocketAddr>, ConfigError> {
    let servers = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_upstream_server)
        .collect::<Result<Vec<_>, _>>()?;

    if servers.is_empty() {
        return Err(ConfigError::InvalidUpstreamServer(
            "No valid upstream servers provided".to_string(),
        ));
    }
    Ok(servers)
}

pub fn parse_upstream_server(s: &str) -> Result<SocketAddr, ConfigError> {
    s.parse::<SocketAddr>()
        .or_else(|_| {
            s.parse::<std::net::IpAddr>()
                .map(|ip| SocketAddr::new(ip, 53))
        })
        .map_err(|_| ConfigError::InvalidUpstreamServer(s.to_string()))
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<ResolverConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ResolverConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trust_policy, TrustPolicy::Strict);
        assert!(!config.allow_insecure);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_env_overrides() {
        let config = from_vars(&[
            ("OPENALIAS_UPSTREAM_SERVERS", "9.9.9.9, [2620:fe::fe]:53"),
            ("OPENALIAS_QUERY_TIMEOUT_MS", "1500"),
            ("OPENALIAS_MAX_ATTEMPTS", "5"),
            ("OPENALIAS_TRUST_POLICY", "lenient"),
            ("OPENALIAS_ALLOW_INSECURE", "yes"),
            ("OPENALIAS_TRUST_ANCHOR_FILE", "/etc/openalias/anchors"),
        ])
        .unwrap();

        assert_eq!(config.upstream_servers.len(), 2);
        assert_eq!(config.upstream_servers[0].port(), 53);
        assert_eq!(config.query_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.trust_policy, TrustPolicy::Lenient);
        assert!(config.allow_insecure);
        assert_eq!(
            config.trust_anchor_file,
            Some(PathBuf::from("/etc/openalias/anchors"))
        );
    }

    #[test]
    fn test_attempts_below_minimum_rejected() {
        assert!(matches!(
            from_vars(&[("OPENALIAS_MAX_ATTEMPTS", "2")]),
            Err(ConfigError::InvalidAttempts(_))
        ));
        assert!(matches!(
            from_vars(&[("OPENALIAS_MAX_ATTEMPTS", "many")]),
            Err(ConfigError::InvalidAttempts(_))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(from_vars(&[("OPENALIAS_UPSTREAM_SERVERS", "not-an-ip")]).is_err());
        assert!(from_vars(&[("OPENALIAS_UPSTREAM_SERVERS", " , ")]).is_err());
        assert!(from_vars(&[("OPENALIAS_QUERY_TIMEOUT_MS", "0")]).is_err());
        assert!(from_vars(&[("OPENALIAS_TRUST_POLICY", "paranoid")]).is_err());
        assert!(from_vars(&[("OPENALIAS_EDNS_PAYLOAD_SIZE", "100")]).is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true", false));
        assert!(parse_bool("TRUE", false));
        assert!(parse_bool("on", false));
        assert!(!parse_bool("off", true));
        assert!(!parse_bool("0", true));

        assert!(parse_bool("invalid", true));
        assert!(!parse_bool("invalid", false));
    }
}
