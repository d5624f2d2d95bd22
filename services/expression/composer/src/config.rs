use rocket::figment::{providers::Env, Figment};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub evaluator: String,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            evaluator: "http://evaluator".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub max_sessions: usize,
    /// Sessions untouched for this long are dropped to make room for new ones
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_sessions: 1024,
            idle_timeout_secs: 1800,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub sessions: SessionConfig,
}

/// Rocket's own configuration sources plus `APP_`-prefixed environment
/// variables, e.g. `APP_UPSTREAM_EVALUATOR` sets `upstream.evaluator`
pub fn figment() -> Figment {
    rocket::Config::figment()
        .merge(Env::prefixed("APP_").map(|s| s.as_str().replacen('_', ".", 1).into()))
}

#[cfg(test)]
mod tests {
    use rocket::figment::providers::Serialized;

    use super::*;

    #[test]
    fn test_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config: Config = Figment::new().extract()?;

        assert_eq!(config.upstream.evaluator, "http://evaluator");
        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.sessions.max_sessions, 1024);
        assert_eq!(config.sessions.idle_timeout_secs, 1800);
        Ok(())
    }

    #[test]
    fn test_overrides() -> Result<(), Box<dyn std::error::Error>> {
        let config: Config = Figment::new()
            .merge(Serialized::default("upstream.evaluator", "http://localhost:8000"))
            .merge(Serialized::default("sessions.max_sessions", 2))
            .merge(Serialized::default("sessions.idle_timeout_secs", 60))
            .extract()?;

        assert_eq!(config.upstream.evaluator, "http://localhost:8000");
        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.sessions.max_sessions, 2);
        assert_eq!(config.sessions.idle_timeout_secs, 60);
        Ok(())
    }
}
