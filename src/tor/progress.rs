//! Bootstrap progress reporting

use tracing::info;

/// One bootstrap milestone reported by Tor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapProgress {
    pub percent: u8,
    /// Short machine tag (`conn`, `handshake_done`, `done`). Empty for old Tor versions.
    pub tag: String,
    pub summary: String,
}

impl BootstrapProgress {
    pub fn is_done(&self) -> bool {
        self.percent >= 100
    }
}

/// Observer for bootstrap progress. Purely informational.
pub trait ProgressSink: Send + Sync {
    fn update(&self, progress: &BootstrapProgress);
}

/// Writes each milestone to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn update(&self, progress: &BootstrapProgress) {
        info!("{}%: {}", progress.percent, progress.summary);
    }
}

/// Parse a Tor log line such as
/// `[notice] Bootstrapped 45% (requesting_descriptors): Asking for relay descriptors`
/// or the older `Bootstrapped 45%: Asking for relay descriptors`.
pub fn parse_log_line(line: &str) -> Option<BootstrapProgress> {
    let (_, rest) = line.split_once("Bootstrapped ")?;
    let (percent, rest) = rest.split_once('%')?;
    let percent: u8 = percent.trim().parse().ok()?;

    let rest = rest.trim_start();
    let (tag, summary) = match rest.strip_prefix('(') {
        Some(tagged) => {
            let (tag, summary) = tagged.split_once(')')?;
            (tag.to_string(), summary)
        },
        None => (String::new(), rest),
    };

    Some(BootstrapProgress {
        percent,
        tag,
        summary: summary.trim_start_matches(':').trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_log_line() {
        let p = parse_log_line(
            "Oct 18 16:21:00.000 [notice] Bootstrapped 45% (requesting_descriptors): Asking for relay descriptors",
        )
        .unwrap();
        assert_eq!(p.percent, 45);
        assert_eq!(p.tag, "requesting_descriptors");
        assert_eq!(p.summary, "Asking for relay descriptors");
        assert!(!p.is_done());
    }

    #[test]
    fn test_parse_legacy_log_line() {
        let p = parse_log_line("[notice] Bootstrapped 100%: Done").unwrap();
        assert_eq!(p.percent, 100);
        assert_eq!(p.tag, "");
        assert_eq!(p.summary, "Done");
        assert!(p.is_done());
    }

    #[test]
    fn test_parse_unrelated_line() {
        assert!(parse_log_line("[notice] Opening Socks listener on 127.0.0.1:9050").is_none());
        assert!(parse_log_line("Bootstrapped lots%: nope").is_none());
    }
}
