use clap::Args;
use futures::future::join_all;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use unipkg_config::Config;
use unipkg_scan::{ScanResult, Severity};

/// Exit status when at least one package is malicious.
const MALICIOUS: u8 = 2;

#[derive(Args, Debug)]
pub struct ScanCommand {
    /// Packages to scan
    #[arg(required = true)]
    packages: Vec<PathBuf>,

    /// Bytes of each script to inspect
    #[arg(long, value_name = "BYTES")]
    max_scan_bytes: Option<u64>,
}

impl ScanCommand {
    pub async fn execute(self, config: &Config) -> ExitCode {
        let mut settings = config.scan.clone();
        if let Some(bytes) = self.max_scan_bytes {
            settings.max_scan_bytes = bytes;
        }
        let cache = settings.cache();
        let results = join_all(self.packages.iter().map(|package| cache.scan(package))).await;

        let mut failed = false;
        let mut malicious = false;
        for (package, result) in self.packages.iter().zip(results) {
            match result {
                Ok(result) => {
                    malicious |= result.is_malicious;
                    print!("{}", render(package, &result));
                },
                Err(err) => {
                    failed = true;
                    tracing::error!(error = ?err, package = %package.display(), "Scan failed");
                    println!("{}: could not be scanned ({})", package.display(), *err);
                },
            }
        }
        match (failed, malicious) {
            (_, true) => ExitCode::from(MALICIOUS),
            (true, false) => ExitCode::FAILURE,
            (false, false) => ExitCode::SUCCESS,
        }
    }
}

fn render(package: &Path, result: &ScanResult) -> String {
    let verdict = match (result.is_malicious, result.threats.is_empty()) {
        (true, _) => "MALICIOUS",
        (false, false) => "suspicious",
        (false, true) => "clean",
    };
    let mut out = format!("{}: {verdict} ({} scripts scanned)\n", package.display(), result.files_scanned);
    for threat in &result.threats {
        let severity = match threat.severity {
            Severity::High => "HIGH",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        let _ = writeln!(out, "  [{severity}] {}: {}", threat.signature, threat.description);
        for found in &threat.matches {
            let _ = writeln!(out, "      {}: {}", found.file, found.snippet);
        }
    }
    if result.trailing_corruption {
        out.push_str("  (package is damaged; only the readable part was scanned)\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use unipkg_scan::{Threat, ThreatMatch};

    fn result(threats: Vec<Threat>) -> ScanResult {
        ScanResult::new(threats, 2, false)
    }

    #[test]
    fn test_render_clean() {
        assert_eq!(render(Path::new("a.unitypackage"), &result(vec![])), "a.unitypackage: clean (2 scripts scanned)\n");
    }

    #[test]
    fn test_render_threats() {
        let threats = vec![Threat {
            signature: "discord-webhook",
            description: "Discord webhook URL",
            severity: Severity::High,
            matches: vec![ThreatMatch { file: "Assets/A.cs".to_string(), snippet: "var hook = ...".to_string() }],
        }];
        let text = render(Path::new("b.unitypackage"), &result(threats));
        assert_eq!(
            text,
            "b.unitypackage: MALICIOUS (2 scripts scanned)\n  [HIGH] discord-webhook: Discord webhook URL\n      \
             Assets/A.cs: var hook = ...\n"
        );
    }
}
