//! Resource caps for a single extraction run.

use crate::error::{ErrorKind, Result};
use derive_more::Display;

const GIB: u64 = 1024 * 1024 * 1024;

pub const DEFAULT_MAX_ASSET_BYTES: u64 = GIB;
pub const DEFAULT_MAX_PACKAGE_BYTES: u64 = 8 * GIB;
pub const DEFAULT_MAX_ASSET_COUNT: u64 = 50_000;

pub const CEILING_MAX_ASSET_BYTES: u64 = 16 * GIB;
pub const CEILING_MAX_PACKAGE_BYTES: u64 = 64 * GIB;
pub const CEILING_MAX_ASSET_COUNT: u64 = 1_000_000;

/// Which cap was exceeded.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum LimitViolation {
    #[display("asset is {actual} bytes, the limit is {limit} bytes")]
    AssetTooLarge { limit: u64, actual: u64 },
    #[display("package contents exceed {limit} bytes")]
    PackageTooLarge { limit: u64 },
    #[display("more than {limit} assets in package")]
    TooManyAssets { limit: u64 },
}

/// Normalized resource caps.
///
/// Always satisfies: every value is positive, no value exceeds its hard
/// ceiling, and the package cap is at least the asset cap. Build one with
/// [`ExtractionLimits::new`], which accepts the signed values a settings file
/// or command line would carry and repairs them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawLimits", into = "RawLimits"))]
pub struct ExtractionLimits {
    max_asset_bytes: u64,
    max_package_bytes: u64,
    max_asset_count: u64,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
            max_package_bytes: DEFAULT_MAX_PACKAGE_BYTES,
            max_asset_count: DEFAULT_MAX_ASSET_COUNT,
        }
    }
}

impl ExtractionLimits {
    /// Normalize raw caps: non-positive values fall back to the defaults,
    /// values are clamped to the hard ceilings, and the package cap is raised
    /// to at least the asset cap.
    pub fn new(max_asset_bytes: i64, max_package_bytes: i64, max_asset_count: i64) -> Self {
        let max_asset_bytes = normalize(max_asset_bytes, DEFAULT_MAX_ASSET_BYTES, CEILING_MAX_ASSET_BYTES);
        let max_package_bytes =
            normalize(max_package_bytes, DEFAULT_MAX_PACKAGE_BYTES, CEILING_MAX_PACKAGE_BYTES).max(max_asset_bytes);
        let max_asset_count = normalize(max_asset_count, DEFAULT_MAX_ASSET_COUNT, CEILING_MAX_ASSET_COUNT);
        Self { max_asset_bytes, max_package_bytes, max_asset_count }
    }

    pub fn max_asset_bytes(&self) -> u64 {
        self.max_asset_bytes
    }

    pub fn max_package_bytes(&self) -> u64 {
        self.max_package_bytes
    }

    pub fn max_asset_count(&self) -> u64 {
        self.max_asset_count
    }
}

fn normalize(value: i64, default: u64, ceiling: u64) -> u64 {
    match u64::try_from(value) {
        Ok(0) | Err(_) => default,
        Ok(value) => value.min(ceiling),
    }
}

/// Unvalidated caps as they appear in configuration. Zero (or omitting the
/// field) means "use the default".
#[cfg(feature = "serde")]
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RawLimits {
    pub max_asset_bytes: i64,
    pub max_package_bytes: i64,
    pub max_asset_count: i64,
}

#[cfg(feature = "serde")]
impl From<RawLimits> for ExtractionLimits {
    fn from(raw: RawLimits) -> Self {
        Self::new(raw.max_asset_bytes, raw.max_package_bytes, raw.max_asset_count)
    }
}

#[cfg(feature = "serde")]
impl From<ExtractionLimits> for RawLimits {
    fn from(limits: ExtractionLimits) -> Self {
        // Every normalized value is at most its ceiling, which fits in an i64.
        let signed = |value: u64| i64::try_from(value).unwrap_or(i64::MAX);
        Self {
            max_asset_bytes: signed(limits.max_asset_bytes),
            max_package_bytes: signed(limits.max_package_bytes),
            max_asset_count: signed(limits.max_asset_count),
        }
    }
}

/// Running totals for one session, checked against its [`ExtractionLimits`].
///
/// Every check fails fast: the first violation aborts the whole run.
#[derive(Debug)]
pub(crate) struct Limiter {
    limits: ExtractionLimits,
    package_bytes: u64,
    assets: u64,
}

impl Limiter {
    pub(crate) fn new(limits: ExtractionLimits) -> Self {
        Self { limits, package_bytes: 0, assets: 0 }
    }

    /// Reject an entry by the size its header declares, before any of its
    /// body is read.
    pub(crate) fn check_declared(&self, declared: u64) -> Result<()> {
        if declared > self.limits.max_asset_bytes {
            exn::bail!(ErrorKind::ResourceLimit(LimitViolation::AssetTooLarge {
                limit: self.limits.max_asset_bytes,
                actual: declared,
            }));
        }
        Ok(())
    }

    /// Account for `chunk` more bytes of the blob currently being produced,
    /// whose running length is `blob_len`. Fails at the chunk that crosses
    /// a cap, never earlier.
    pub(crate) fn consume(&mut self, blob_len: &mut u64, chunk: u64) -> Result<()> {
        let asset = blob_len.checked_add(chunk).filter(|total| *total <= self.limits.max_asset_bytes);
        let Some(asset) = asset else {
            exn::bail!(ErrorKind::ResourceLimit(LimitViolation::AssetTooLarge {
                limit: self.limits.max_asset_bytes,
                actual: blob_len.saturating_add(chunk),
            }));
        };
        let package = self.package_bytes.checked_add(chunk).filter(|total| *total <= self.limits.max_package_bytes);
        let Some(package) = package else {
            exn::bail!(ErrorKind::ResourceLimit(LimitViolation::PackageTooLarge {
                limit: self.limits.max_package_bytes
            }));
        };
        *blob_len = asset;
        self.package_bytes = package;
        Ok(())
    }

    /// Count one more asset that is ready to be written.
    pub(crate) fn register_asset(&mut self) -> Result<()> {
        if self.assets >= self.limits.max_asset_count {
            exn::bail!(ErrorKind::ResourceLimit(LimitViolation::TooManyAssets { limit: self.limits.max_asset_count }));
        }
        self.assets += 1;
        Ok(())
    }

    pub(crate) fn package_bytes(&self) -> u64 {
        self.package_bytes
    }
}
