//! Ad-block filter collaborator (spec.md §4.5): a boolean predicate the
//! resolver consults before doing anything else. How the blacklist was
//! built — and in particular, downloading it — is someone else's problem;
//! this module only loads an already-present file and answers queries
//! against it.

use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::RwLock;

use tracing::{debug, info};

use crate::error::Result;

/// How a blocked query is answered — grounded on heimdall's
/// `blocking::BlockingMode`, trimmed to the options spec.md §4.3 point 1
/// actually calls for (a sinkhole answer, not a full blocking-mode policy
/// engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockingMode {
    #[default]
    NxDomain,
    ZeroIp,
    CustomIp(std::net::IpAddr),
}

/// Synchronized blocked-domain set. Readers may observe an in-progress
/// reload as long as they never see a partially-parsed line — `reload`
/// parses the whole file before swapping it in (add-all after full parse,
/// spec.md §5).
#[derive(Debug, Default)]
pub struct Blocklist {
    domains: RwLock<HashSet<String>>,
}

impl Blocklist {
    pub fn new() -> Self {
        Self {
            domains: RwLock::new(HashSet::new()),
        }
    }

    pub fn from_domains(domains: impl IntoIterator<Item = String>) -> Self {
        Self {
            domains: RwLock::new(domains.into_iter().map(normalize).collect()),
        }
    }

    /// Loads (or reloads) the blacklist from `adblock_blacklist.txt`-style
    /// newline-separated domains. Blank lines and `#`-prefixed comments are
    /// skipped.
    pub fn reload(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);

        let mut parsed = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            parsed.insert(normalize(trimmed.to_string()));
        }

        let count = parsed.len();
        *self.domains.write().unwrap() = parsed;
        info!("loaded {} blocked domains from {}", count, path.display());
        Ok(())
    }

    /// O(labels): checks the full name, then each proper suffix starting at
    /// a label boundary (`a.b.c` tests `a.b.c`, `b.c`, `c`).
    pub fn is_blocked(&self, domain: &str) -> bool {
        let normalized = normalize_ref(domain);
        let domains = self.domains.read().unwrap();

        let mut rest = normalized.as_str();
        loop {
            if domains.contains(rest) {
                debug!("blocked domain matched: {}", rest);
                return true;
            }
            match rest.split_once('.') {
                Some((_, suffix)) => rest = suffix,
                None => return false,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.domains.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(domain: String) -> String {
    domain.trim().trim_end_matches('.').to_lowercase()
}

fn normalize_ref(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_lowercase()
}
