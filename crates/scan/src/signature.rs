//! Content signatures and the matcher that applies them to one file.

use derive_more::Display;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// A Discord webhook: fixed host, numeric channel id and a 68 character token.
// The trailing group stands in for a lookahead so that a longer token doesn't
// match.
const WEBHOOK_HOST: &str = r"https?://(?:(?:ptb|canary)\.)?discord(?:app)?\.com";
const WEBHOOK_TOKEN: &str = "[A-Za-z0-9_-]{68}";
const TOKEN_END: &str = "(?:[^A-Za-z0-9_-]|$)";
regex!(
    WEBHOOK_REGEX,
    format!(r"({WEBHOOK_HOST}/api/webhooks/[0-9]{{17,20}}/{WEBHOOK_TOKEN}){TOKEN_END}").as_str()
);
regex!(URL_REGEX, r#"https?://([A-Za-z0-9.-]+)(?::[0-9]+)?(?:/[^\s"'<>()\\`]*)?"#);

/// Distinct webhook URLs reported per file.
const MAX_WEBHOOK_MATCHES: usize = 5;
/// Distinct external URLs reported per file.
const MAX_URL_MATCHES: usize = 5;
/// Occurrences of one API pattern reported per file.
const MAX_API_MATCHES: usize = 3;
/// Characters of context kept either side of a match.
const CONTEXT_CHARS: usize = 40;
const MAX_SNIPPET_CHARS: usize = 160;

/// Domains that show up in legitimate scripts all the time. Subdomains are
/// covered too.
#[rustfmt::skip]
const BENIGN_DOMAINS: &[&str] = &[
    "unity3d.com", "unity.com", "github.com", "githubusercontent.com", "github.io", "gitlab.com",
    "microsoft.com", "msdn.com", "visualstudio.com", "nuget.org", "google.com", "googleapis.com",
    "android.com", "apple.com", "w3.org", "xmlsoap.org", "json-schema.org", "mozilla.org",
    "stackoverflow.com", "wikipedia.org", "youtube.com", "creativecommons.org", "opensource.org",
    "apache.org", "gnu.org", "example.com", "example.org", "localhost",
];

/// How alarming a match is.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    #[display("low")]
    Low,
    #[display("medium")]
    Medium,
    #[display("high")]
    High,
}

/// One thing the scanner looks for.
#[derive(Debug, PartialEq, Eq)]
pub struct Signature {
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
}

pub static WEBHOOK: Signature = Signature {
    name: "discord-webhook",
    description: "Discord webhook URL, commonly used to exfiltrate stolen data",
    severity: Severity::High,
};

pub static EXTERNAL_URL: Signature = Signature {
    name: "external-url",
    description: "URL pointing at a domain outside the known-benign list",
    severity: Severity::Low,
};

macro_rules! api {
    ($name:literal, $description:literal) => {
        Signature { name: $name, description: $description, severity: Severity::Medium }
    };
}

pub static SUSPICIOUS_APIS: &[Signature] = &[
    api!("Process.Start", "Starts an external process"),
    api!("ProcessStartInfo", "Configures an external process"),
    api!("File.Delete", "Deletes files"),
    api!("Directory.Delete", "Deletes directories"),
    api!("RegistryKey", "Accesses the Windows registry"),
    api!("Registry.SetValue", "Modifies the Windows registry"),
    api!("DeleteSubKey", "Deletes Windows registry keys"),
    api!("Assembly.Load", "Loads code at runtime"),
    api!("Reflection.Emit", "Generates code at runtime"),
    api!("Activator.CreateInstance", "Instantiates types chosen at runtime"),
    api!("TcpClient", "Opens a raw network connection"),
    api!("UdpClient", "Opens a raw network connection"),
    api!("new Socket(", "Opens a raw network socket"),
    api!("DllImport", "Binds to native code"),
    api!("GetDelegateForFunctionPointer", "Calls native code through a function pointer"),
    api!("LoadLibrary", "Loads a native library at runtime"),
    api!("WebClient", "Downloads or uploads data"),
    api!("HttpClient", "Downloads or uploads data"),
    api!("HttpWebRequest", "Downloads or uploads data"),
];

/// A signature match inside one file.
#[derive(Debug)]
pub(crate) struct Hit {
    pub(crate) signature: &'static Signature,
    pub(crate) snippet: String,
}

/// Run every signature over `text`.
pub(crate) fn detect(text: &str) -> Vec<Hit> {
    let mut hits = Vec::new();

    let mut webhooks = HashSet::new();
    let mut webhook_spans = Vec::new();
    for captures in WEBHOOK_REGEX.captures_iter(text) {
        let Some(url) = captures.get(1) else {
            continue;
        };
        webhook_spans.push(url.range());
        if webhooks.len() < MAX_WEBHOOK_MATCHES && webhooks.insert(url.as_str()) {
            hits.push(Hit { signature: &WEBHOOK, snippet: snippet(text, url.start(), url.end()) });
        }
    }

    let mut urls = HashSet::new();
    for captures in URL_REGEX.captures_iter(text) {
        let (Some(url), Some(host)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if urls.len() >= MAX_URL_MATCHES {
            break;
        }
        if webhook_spans.iter().any(|span| span.contains(&url.start())) || is_benign(host.as_str()) {
            continue;
        }
        if urls.insert(url.as_str()) {
            hits.push(Hit { signature: &EXTERNAL_URL, snippet: snippet(text, url.start(), url.end()) });
        }
    }

    for signature in SUSPICIOUS_APIS {
        for (start, found) in text.match_indices(signature.name).take(MAX_API_MATCHES) {
            hits.push(Hit { signature, snippet: snippet(text, start, start + found.len()) });
        }
    }
    hits
}

fn is_benign(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    BENIGN_DOMAINS.iter().any(|domain| {
        host == *domain || host.strip_suffix(domain).is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// The match plus some context, flattened onto one line.
fn snippet(text: &str, start: usize, end: usize) -> String {
    let from = text[..start].char_indices().rev().nth(CONTEXT_CHARS - 1).map_or(0, |(i, _)| i);
    let to = text[end..].char_indices().nth(CONTEXT_CHARS).map_or(text.len(), |(i, _)| end + i);
    let flat = text[from..to].split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(MAX_SNIPPET_CHARS) {
        Some((cut, _)) => flat[..cut].to_string(),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn webhook(id: &str, fill: char) -> String {
        format!("https://discord.com/api/webhooks/{id}/{}", fill.to_string().repeat(68))
    }

    fn names(hits: &[Hit]) -> Vec<&'static str> {
        hits.iter().map(|hit| hit.signature.name).collect()
    }

    #[test]
    fn test_webhook_flagged_once_per_distinct_url() {
        let url = webhook("123456789012345678", 'a');
        let other = webhook("876543210987654321", 'b');
        let text = format!("var a = \"{url}\";\nvar b = \"{url}\";\nvar c = \"{other}\";");
        let hits = detect(&text);
        assert_eq!(names(&hits), vec!["discord-webhook", "discord-webhook"]);
        assert!(hits[0].snippet.contains(&url));
        assert!(hits[1].snippet.contains(&other));
        assert!(hits.iter().all(|hit| hit.signature.severity == Severity::High));
    }

    #[test]
    fn test_webhook_per_file_cap() {
        let text: String = (0..10).map(|i| format!("{}\n", webhook(&format!("1234567890123456{i:02}"), 'x'))).collect();
        assert_eq!(detect(&text).len(), MAX_WEBHOOK_MATCHES);
    }

    #[rstest]
    #[case::short_token(format!("https://discord.com/api/webhooks/123456789012345678/{}", "a".repeat(67)))]
    #[case::long_token(format!("https://discord.com/api/webhooks/123456789012345678/{}", "a".repeat(69)))]
    #[case::short_id(format!("https://discord.com/api/webhooks/1234/{}", "a".repeat(68)))]
    #[case::other_host(format!("https://discord.org/api/webhooks/123456789012345678/{}", "a".repeat(68)))]
    fn test_malformed_webhooks_are_not_high(#[case] text: String) {
        assert!(detect(&text).iter().all(|hit| hit.signature.severity != Severity::High));
    }

    #[rstest]
    #[case("https://canary.discord.com/api/webhooks/123456789012345678/")]
    #[case("http://discordapp.com/api/webhooks/123456789012345678/")]
    fn test_webhook_host_variants(#[case] prefix: &str) {
        let text = format!("\"{prefix}{}\"", "Zz_-".repeat(17));
        assert_eq!(names(&detect(&text)), vec!["discord-webhook"]);
    }

    #[rstest]
    #[case("https://docs.unity3d.com/ScriptReference/index.html")]
    #[case("http://www.w3.org/2001/XMLSchema")]
    #[case("https://raw.githubusercontent.com/user/repo/main/README.md")]
    #[case("https://GITHUB.COM/user/repo")]
    #[case("http://localhost:8080/status")]
    fn test_benign_urls_are_ignored(#[case] url: &str) {
        assert!(detect(url).is_empty());
    }

    #[rstest]
    #[case("https://evil.example.net/payload.exe")]
    #[case("http://notgithub.com/x")]
    #[case("https://github.com.attacker.io/x")]
    fn test_external_urls_are_low(#[case] url: &str) {
        let hits = detect(url);
        assert_eq!(names(&hits), vec!["external-url"]);
        assert_eq!(hits[0].signature.severity, Severity::Low);
    }

    #[test]
    fn test_api_patterns_capped_per_pattern() {
        let text = "Process.Start(a);\n".repeat(5) + "File.Delete(path);";
        let hits = detect(&text);
        assert_eq!(names(&hits), vec!["Process.Start", "Process.Start", "Process.Start", "File.Delete"]);
        assert!(hits.iter().all(|hit| hit.signature.severity == Severity::Medium));
    }

    #[test]
    fn test_clean_script() {
        let text = "using UnityEngine;\npublic class Player : MonoBehaviour {\n    void Update() {}\n}\n";
        assert!(detect(text).is_empty());
    }

    #[test]
    fn test_snippet_is_one_bounded_line() {
        let text = format!("{}\n\n  Process.Start(\"cmd\");\r\n{}", "a".repeat(100), "ä".repeat(100));
        let hits = detect(&text);
        let snippet = &hits[0].snippet;
        assert!(!snippet.contains('\n'));
        assert!(snippet.contains("Process.Start(\"cmd\");"));
        assert!(snippet.chars().count() <= MAX_SNIPPET_CHARS);
        assert!(snippet.starts_with('a') && snippet.ends_with('ä'));
    }

    #[test]
    fn test_snippet_at_text_edges() {
        assert_eq!(snippet("WebClient", 0, 9), "WebClient");
    }
}
