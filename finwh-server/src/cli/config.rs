use anyhow::Context;
use finwh_etl::EtlConfig;
use finwh_tracing::TracingConfig;
use serde::{Deserialize, Serialize};

use std::path::Path;

use super::db::*;
use crate::{app::SinkConfig, server::ServerConfig};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub etl: EtlConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

pub struct EnvOverride {
    pub db_con: String,
    pub api_key: Option<String>,
}

impl Config {
    pub fn load_config(
        path: Option<impl AsRef<Path>>,
        env_override: EnvOverride,
    ) -> anyhow::Result<Self> {
        let mut config = if let Some(config_path) = path {
            let config_file =
                std::fs::read_to_string(config_path).context("Couldn't read config file")?;
            Self::from_yaml(&config_file)?
        } else {
            println!("No config file provided, using default config.");
            Config::default()
        };

        config.apply_env_override(env_override);
        Ok(config)
    }

    fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("Couldn't parse config file")
    }

    fn apply_env_override(&mut self, EnvOverride { db_con, api_key }: EnvOverride) {
        self.db.pg_con = db_con;
        if let Some(key) = api_key.filter(|key| !key.is_empty()) {
            self.server.api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn yaml_sections_fall_back_to_defaults() {
        let config = Config::from_yaml(
            r#"
server:
  port: 8080
etl:
  reporting_currency: BYN
  exchange_rates:
    USD: "3.25"
  flush_stride: 100
sink:
  local_dir: /var/lib/finwh/archive
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.etl.flush_stride, 100);
        assert_eq!(
            config.etl.exchange_rates.get("usd"),
            Some(Decimal::new(325, 2))
        );
        assert_eq!(config.etl.reporting_currency_aliases, vec!["BLR"]);
        assert!(config.sink.local_dir.is_some());
        assert_eq!(config.db.pool_size, 20);
        assert!(config.tracing.json);
    }

    #[test]
    fn env_overrides_connection_and_api_key() {
        let mut config = Config::default();
        config.server.api_key = Some("from-file".to_string());

        config.apply_env_override(EnvOverride {
            db_con: "postgres://db/finwh".to_string(),
            api_key: Some(String::new()),
        });
        assert_eq!(config.db.pg_con, "postgres://db/finwh");
        assert_eq!(config.server.api_key.as_deref(), Some("from-file"));

        config.apply_env_override(EnvOverride {
            db_con: "postgres://db/finwh".to_string(),
            api_key: Some("secret".to_string()),
        });
        assert_eq!(config.server.api_key.as_deref(), Some("secret"));
    }
}
