pub mod config;
mod db;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use self::config::{Config, EnvOverride};
use crate::app::FinwhApp;

#[derive(Parser)]
#[clap(long_about = None)]
struct Cli {
    #[clap(short, long, env = "FINWH_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
    #[clap(env = "PG_CON")]
    pg_con: String,
    #[clap(long, env = "FINWH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fills the date dimension, by default for this year and the next.
    SeedDates {
        #[clap(long, requires = "end")]
        start: Option<NaiveDate>,
        #[clap(long, requires = "start")]
        end: Option<NaiveDate>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load_config(
        cli.config,
        EnvOverride {
            db_con: cli.pg_con,
            api_key: cli.api_key,
        },
    )?;

    run_cmd(config, cli.command).await?;

    Ok(())
}

async fn run_cmd(config: Config, command: Option<Command>) -> anyhow::Result<()> {
    finwh_tracing::init_tracer(config.tracing)?;
    let pool = db::init_pool(&config.db).await?;
    let app = FinwhApp::run(pool, config.db.exec_migrations, config.etl, config.sink).await?;
    match command {
        Some(Command::SeedDates {
            start: Some(start),
            end: Some(end),
        }) => {
            let created = app.warehouse().seed_dates(start, end).await?;
            println!("Seeded {created} dates from {start} to {end}");
        }
        Some(Command::SeedDates { .. }) => {
            let created = app.warehouse().seed_default_dates().await?;
            println!("Seeded {created} dates");
        }
        None => crate::server::run(config.server, app).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_dates_takes_an_optional_range() {
        let cli = Cli::try_parse_from([
            "finwh-server",
            "postgres://localhost/finwh",
            "seed-dates",
            "--start",
            "2025-01-01",
            "--end",
            "2025-12-31",
        ])
        .unwrap();
        match cli.command {
            Some(Command::SeedDates { start, end }) => {
                assert_eq!(start, NaiveDate::from_ymd_opt(2025, 1, 1));
                assert_eq!(end, NaiveDate::from_ymd_opt(2025, 12, 31));
            }
            None => panic!("expected seed-dates"),
        }

        assert!(Cli::try_parse_from([
            "finwh-server",
            "postgres://localhost/finwh",
            "seed-dates",
            "--start",
            "2025-01-01",
        ])
        .is_err());
    }
}
