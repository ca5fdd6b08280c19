use super::cancel_on_interrupt;
use clap::Args;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use unipkg_config::Config;
use unipkg_extract::{ExtractOptions, ExtractionLimits, Outcome, extract_package_async};

/// Exit status for a run stopped by Ctrl-C.
const INTERRUPTED: u8 = 130;

#[derive(Args, Debug)]
pub struct ExtractCommand {
    /// Package to extract
    package: PathBuf,

    /// Output directory [default: the package name, next to the package]
    output: Option<PathBuf>,

    /// Sort assets into category folders (Textures, Scripts, ...)
    #[arg(long)]
    organize: bool,

    /// Directory for temporary files
    #[arg(long, value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// Largest single asset allowed
    #[arg(long, value_name = "BYTES", allow_negative_numbers = true)]
    max_asset_bytes: Option<i64>,

    /// Largest total package content allowed
    #[arg(long, value_name = "BYTES", allow_negative_numbers = true)]
    max_package_bytes: Option<i64>,

    /// Most assets allowed in one package
    #[arg(long, value_name = "COUNT", allow_negative_numbers = true)]
    max_asset_count: Option<i64>,
}

impl ExtractCommand {
    pub async fn execute(self, config: &Config) -> ExitCode {
        let output = self.output.clone().unwrap_or_else(|| default_output(&self.package));
        let options = self
            .options(config)
            .cancel(cancel_on_interrupt())
            .progress(|path, count| tracing::debug!(count, path = %path.display(), "Asset written"));

        match extract_package_async(self.package.clone(), output, options).await {
            Ok(Outcome::Completed(result)) => {
                if result.trailing_corruption {
                    tracing::warn!("The end of the package is damaged; extracted everything before it");
                }
                println!(
                    "Extracted {} assets to {} ({} files, {} bytes written)",
                    result.assets_extracted,
                    result.output_dir.display(),
                    result.written_files.len(),
                    result.total_bytes,
                );
                ExitCode::SUCCESS
            },
            Ok(Outcome::Cancelled(result)) => {
                println!("Cancelled after writing {} files", result.written_files.len());
                ExitCode::from(INTERRUPTED)
            },
            Err(err) => {
                tracing::error!(error = ?err, package = %self.package.display(), "Extraction failed");
                ExitCode::FAILURE
            },
        }
    }

    /// Configuration, overridden by whatever was given on the command line.
    fn options(&self, config: &Config) -> ExtractOptions {
        let mut extract = config.extract.clone();
        extract.organize_by_category |= self.organize;
        if let Some(dir) = &self.temp_dir {
            extract.temp_dir = Some(dir.clone());
        }
        let limits = extract.limits;
        extract.limits = ExtractionLimits::new(
            self.max_asset_bytes.unwrap_or_else(|| signed(limits.max_asset_bytes())),
            self.max_package_bytes.unwrap_or_else(|| signed(limits.max_package_bytes())),
            self.max_asset_count.unwrap_or_else(|| signed(limits.max_asset_count())),
        );
        extract.options()
    }
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `Props.unitypackage` extracts to `Props/` beside it.
fn default_output(package: &Path) -> PathBuf {
    let parent = package.parent().unwrap_or(Path::new("."));
    match (package.file_stem(), package.extension()) {
        (Some(stem), Some(_)) => parent.join(stem),
        _ => {
            let mut name = package.file_name().unwrap_or_default().to_os_string();
            name.push(".extracted");
            parent.join(name)
        },
    }
}
