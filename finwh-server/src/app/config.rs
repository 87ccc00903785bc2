use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};

use finwh_etl::sink::{BatchSink, LocalDirSink};

/// Where committed raw payloads are archived. Nothing is archived when no
/// destination is set.
#[derive(Clone, Default, Debug, Deserialize, Serialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub local_dir: Option<PathBuf>,
}

impl SinkConfig {
    pub fn build(&self) -> Option<Arc<dyn BatchSink>> {
        self.local_dir
            .as_ref()
            .map(|dir| Arc::new(LocalDirSink::new(dir)) as Arc<dyn BatchSink>)
    }
}
