mod config;
mod error;

use sqlx::PgPool;

use finwh_etl::{FinWarehouse, FinWarehouseConfig};

pub use config::*;
pub use error::*;

#[derive(Clone)]
pub struct FinwhApp {
    warehouse: FinWarehouse,
}

impl FinwhApp {
    pub(crate) async fn run(
        pool: PgPool,
        exec_migrations: bool,
        etl: finwh_etl::EtlConfig,
        sink: SinkConfig,
    ) -> Result<Self, ApplicationError> {
        let mut builder = FinWarehouseConfig::builder();
        builder.pool(pool).exec_migrations(exec_migrations).etl(etl);
        if let Some(sink) = sink.build() {
            builder.sink(sink);
        }
        let warehouse = FinWarehouse::init(builder.build()?).await?;
        Ok(Self::new(warehouse))
    }

    pub fn new(warehouse: FinWarehouse) -> Self {
        Self { warehouse }
    }

    pub fn warehouse(&self) -> &FinWarehouse {
        &self.warehouse
    }
}
