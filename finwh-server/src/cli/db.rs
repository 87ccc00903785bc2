use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, PgPool};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DbConfig {
    #[serde(default)]
    pub pg_con: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_exec_migrations")]
    pub exec_migrations: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            pg_con: String::new(),
            pool_size: default_pool_size(),
            exec_migrations: default_exec_migrations(),
        }
    }
}

fn default_pool_size() -> u32 {
    20
}

fn default_exec_migrations() -> bool {
    true
}

pub async fn init_pool(config: &DbConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .connect(&config.pg_con)
        .await?;
    Ok(pool)
}
