use crate::limits::ExtractionLimits;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Called once per written asset with its path relative to the output
/// directory and the running count of written assets.
pub type ProgressSink = Arc<dyn Fn(&Path, u64) + Send + Sync>;

/// Knobs for one extraction run.
#[derive(Clone, Default)]
pub struct ExtractOptions {
    /// Sort assets into per-category folders instead of mirroring the
    /// package's own layout.
    pub organize_by_category: bool,
    /// Where to park component blobs while the package is read. Defaults to
    /// the system temporary directory.
    pub temp_dir: Option<PathBuf>,
    pub limits: ExtractionLimits,
    pub progress: Option<ProgressSink>,
    /// Polled between entries and between copy chunks.
    pub cancel: CancellationToken,
}

impl ExtractOptions {
    pub fn organize_by_category(mut self, organize: bool) -> Self {
        self.organize_by_category = organize;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn limits(mut self, limits: ExtractionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn progress(mut self, sink: impl Fn(&Path, u64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(sink));
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}
