//! Best-effort archive of raw batch payloads. Delivery happens after the
//! batch committed and never affects it.
pub mod error;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::instrument;

pub use error::SinkError;

pub const DEFAULT_FILE_PREFIX: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SinkReceipt {
    Stored {
        file_id: String,
        filename: String,
        link: String,
    },
    NotConfigured,
}

#[async_trait]
pub trait BatchSink: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn deliver(&self, payload: &Value, filename: &str) -> Result<SinkReceipt, SinkError>;
}

/// `<prefix>_<YYYYMMDD_HHMMSS>_<8 hex>.json`
pub fn sink_filename(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}.json", prefix, at.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

#[derive(Debug, Clone)]
pub struct LocalDirSink {
    dir: PathBuf,
}

impl LocalDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl BatchSink for LocalDirSink {
    fn is_configured(&self) -> bool {
        true
    }

    #[instrument(name = "finwh.sink.local_dir.deliver", skip(self, payload), err)]
    async fn deliver(&self, payload: &Value, filename: &str) -> Result<SinkReceipt, SinkError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(filename);
        let bytes = serde_json::to_vec_pretty(payload)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(SinkReceipt::Stored {
            file_id: filename.to_string(),
            filename: filename.to_string(),
            link: format!("file://{}", path.display()),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl BatchSink for NoopSink {
    fn is_configured(&self) -> bool {
        false
    }

    async fn deliver(&self, _payload: &Value, _filename: &str) -> Result<SinkReceipt, SinkError> {
        Ok(SinkReceipt::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn filename_layout() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let name = sink_filename("json", at);
        assert!(name.starts_with("json_20250102_030405_"));
        assert!(name.ends_with(".json"));
        let hex = &name["json_20250102_030405_".len()..name.len() - ".json".len()];
        assert_eq!(hex.len(), 8);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn noop_sink_reports_not_configured() {
        let sink = NoopSink;
        assert!(!sink.is_configured());
        assert_eq!(
            sink.deliver(&serde_json::json!({}), "x.json").await.unwrap(),
            SinkReceipt::NotConfigured
        );
    }
}
