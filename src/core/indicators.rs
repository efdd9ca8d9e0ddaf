// iocsweep - core/indicators.rs
//
// Indicator port: the interface a module uses to ask whether a value matches
// a known indicator of compromise, plus `IndicatorSet`, the bundled adapter
// backed by flat JSON indicator files.
//
// Modules hold the port behind an `Arc` so a single loaded set can be shared
// by every module in a batch without any module owning it.

use crate::util::constants;
use crate::util::error::IndicatorError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// =============================================================================
// Port
// =============================================================================

/// Category of value being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Domain,
    Process,
    Email,
    FileName,
    FilePath,
    Hash,
}

impl IndicatorKind {
    pub fn label(&self) -> &'static str {
        match self {
            IndicatorKind::Domain => "domain",
            IndicatorKind::Process => "process",
            IndicatorKind::Email => "email",
            IndicatorKind::FileName => "file_name",
            IndicatorKind::FilePath => "file_path",
            IndicatorKind::Hash => "hash",
        }
    }
}

/// A positive indicator hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorMatch {
    pub kind: IndicatorKind,
    /// The indicator value that matched.
    pub indicator: String,
    /// Name of the indicator collection the value came from.
    pub collection: String,
}

/// Answers "does this value match a known indicator?".
pub trait IndicatorPort: Send + Sync {
    /// Check one value of the given kind.
    fn check(&self, kind: IndicatorKind, value: &str) -> Option<IndicatorMatch>;

    /// Total number of indicators available.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_domain(&self, url: &str) -> Option<IndicatorMatch> {
        self.check(IndicatorKind::Domain, url)
    }

    fn check_process(&self, process: &str) -> Option<IndicatorMatch> {
        self.check(IndicatorKind::Process, process)
    }

    fn check_email(&self, email: &str) -> Option<IndicatorMatch> {
        self.check(IndicatorKind::Email, email)
    }

    fn check_file_name(&self, name: &str) -> Option<IndicatorMatch> {
        self.check(IndicatorKind::FileName, name)
    }

    fn check_file_path(&self, path: &str) -> Option<IndicatorMatch> {
        self.check(IndicatorKind::FilePath, path)
    }

    fn check_hash(&self, hash: &str) -> Option<IndicatorMatch> {
        self.check(IndicatorKind::Hash, hash)
    }
}

// =============================================================================
// JSON-backed adapter
// =============================================================================

/// On-disk shape of an indicator file. Every list is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct IndicatorFile {
    name: Option<String>,
    domains: Vec<String>,
    processes: Vec<String>,
    emails: Vec<String>,
    file_names: Vec<String>,
    file_paths: Vec<String>,
    hashes: Vec<String>,
}

/// Indicators from one source file, normalised to lowercase.
#[derive(Debug, Default)]
struct Collection {
    name: String,
    domains: HashSet<String>,
    processes: HashSet<String>,
    emails: HashSet<String>,
    file_names: HashSet<String>,
    file_paths: Vec<String>,
    hashes: HashSet<String>,
}

impl Collection {
    fn len(&self) -> usize {
        self.domains.len()
            + self.processes.len()
            + self.emails.len()
            + self.file_names.len()
            + self.file_paths.len()
            + self.hashes.len()
    }
}

fn lowered(values: Vec<String>) -> HashSet<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Indicator collections loaded from one or more JSON files.
#[derive(Debug, Default)]
pub struct IndicatorSet {
    collections: Vec<Collection>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a single indicator file into a new set.
    pub fn from_file(path: &Path) -> Result<Self, IndicatorError> {
        let mut set = Self::new();
        set.load_file(path)?;
        Ok(set)
    }

    /// Load several indicator files into one set. Fails on the first bad file.
    pub fn from_files(paths: &[PathBuf]) -> Result<Self, IndicatorError> {
        let mut set = Self::new();
        for path in paths {
            set.load_file(path)?;
        }
        Ok(set)
    }

    /// Parse and append the indicators in `path`.
    pub fn load_file(&mut self, path: &Path) -> Result<(), IndicatorError> {
        let metadata = std::fs::metadata(path).map_err(|e| IndicatorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if metadata.len() > constants::MAX_INDICATOR_FILE_SIZE {
            return Err(IndicatorError::FileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                max_size: constants::MAX_INDICATOR_FILE_SIZE,
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| IndicatorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let collection = Self::parse(&content, path)?;

        tracing::info!(
            path = %path.display(),
            collection = %collection.name,
            indicators = collection.len(),
            "Loaded indicators"
        );
        self.collections.push(collection);
        Ok(())
    }

    fn parse(content: &str, path: &Path) -> Result<Collection, IndicatorError> {
        let raw: IndicatorFile =
            serde_json::from_str(content).map_err(|e| IndicatorError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;

        let name = raw.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let collection = Collection {
            name,
            domains: lowered(raw.domains),
            processes: lowered(raw.processes),
            emails: lowered(raw.emails),
            file_names: lowered(raw.file_names),
            file_paths: lowered(raw.file_paths).into_iter().collect(),
            hashes: lowered(raw.hashes),
        };

        if collection.len() == 0 {
            return Err(IndicatorError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(collection)
    }

    fn hit(kind: IndicatorKind, indicator: &str, collection: &Collection) -> IndicatorMatch {
        IndicatorMatch {
            kind,
            indicator: indicator.to_string(),
            collection: collection.name.clone(),
        }
    }
}

/// Reduce a URL (or bare host) to its lowercase host name.
fn host_of(value: &str) -> String {
    let lower = value.trim().to_lowercase();
    let without_scheme = match lower.find("://") {
        Some(idx) => &lower[idx + 3..],
        None => lower.as_str(),
    };
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    host.split(':').next().unwrap_or_default().to_string()
}

/// The host itself and each parent domain, e.g. `a.b.c` → `a.b.c`, `b.c`.
fn domain_candidates(host: &str) -> Vec<&str> {
    let mut candidates = vec![host];
    let mut rest = host;
    while let Some(idx) = rest.find('.') {
        rest = &rest[idx + 1..];
        if rest.contains('.') {
            candidates.push(rest);
        }
    }
    candidates
}

impl IndicatorPort for IndicatorSet {
    fn check(&self, kind: IndicatorKind, value: &str) -> Option<IndicatorMatch> {
        if value.trim().is_empty() {
            return None;
        }
        let lower = value.trim().to_lowercase();

        for collection in &self.collections {
            let found = match kind {
                IndicatorKind::Domain => {
                    let host = host_of(&lower);
                    domain_candidates(&host)
                        .into_iter()
                        .find(|c| collection.domains.contains(*c))
                        .map(str::to_string)
                }
                IndicatorKind::Process => {
                    let base = lower.rsplit('/').next().unwrap_or_default();
                    collection
                        .processes
                        .iter()
                        .find(|p| {
                            p.as_str() == base
                                || (base.len() == constants::PROCESS_NAME_TRUNCATION
                                    && p.starts_with(base))
                        })
                        .cloned()
                }
                IndicatorKind::Email => collection.emails.get(&lower).cloned(),
                IndicatorKind::FileName => {
                    let base = lower.rsplit(['/', '\\']).next().unwrap_or_default();
                    collection.file_names.get(base).cloned()
                }
                IndicatorKind::FilePath => collection
                    .file_paths
                    .iter()
                    .find(|p| lower.starts_with(p.as_str()))
                    .cloned(),
                IndicatorKind::Hash => collection.hashes.get(&lower).cloned(),
            };

            if let Some(indicator) = found {
                tracing::warn!(
                    kind = kind.label(),
                    value = %value,
                    indicator = %indicator,
                    collection = %collection.name,
                    "Found a known suspicious indicator"
                );
                return Some(Self::hit(kind, &indicator, collection));
            }
        }
        None
    }

    fn len(&self) -> usize {
        self.collections.iter().map(Collection::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> IndicatorSet {
        let json = r#"{
            "name": "test-campaign",
            "domains": ["evil.example.com", "bad.org"],
            "processes": ["bh", "com.apple.malwared"],
            "emails": ["Operator@Evil.example.com"],
            "file_names": ["payload.dylib"],
            "file_paths": ["/private/var/tmp/implant"],
            "hashes": ["D41D8CD98F00B204E9800998ECF8427E"]
        }"#;
        let collection = IndicatorSet::parse(json, Path::new("test.json")).unwrap();
        IndicatorSet {
            collections: vec![collection],
        }
    }

    #[test]
    fn test_domain_matches_url_host_and_subdomain() {
        let set = sample_set();
        assert!(set.check_domain("https://evil.example.com/landing?x=1").is_some());
        assert!(set.check_domain("http://cdn.bad.org:8080/a").is_some());
        assert!(set.check_domain("https://example.com/").is_none());
        assert!(set.check_domain("notbad.org").is_none());
    }

    #[test]
    fn test_process_matches_basename_and_truncated_name() {
        let set = sample_set();
        assert!(set.check_process("/usr/libexec/bh").is_some());
        // 15-character truncated form of com.apple.malwared
        assert!(set.check_process("com.apple.malwa").is_some());
        assert!(set.check_process("launchd").is_none());
    }

    #[test]
    fn test_email_and_hash_are_case_insensitive() {
        let set = sample_set();
        assert!(set.check_email("operator@evil.example.com").is_some());
        assert!(set.check_hash("d41d8cd98f00b204e9800998ecf8427e").is_some());
    }

    #[test]
    fn test_file_path_matches_by_prefix() {
        let set = sample_set();
        let hit = set
            .check_file_path("/private/var/tmp/implant/agent")
            .expect("prefix match");
        assert_eq!(hit.kind, IndicatorKind::FilePath);
        assert_eq!(hit.collection, "test-campaign");
        assert!(set.check_file_name("/Library/payload.dylib").is_some());
    }

    #[test]
    fn test_empty_value_never_matches() {
        let set = sample_set();
        assert!(set.check_domain("").is_none());
        assert!(set.check_process("   ").is_none());
    }

    #[test]
    fn test_parse_rejects_malformed_and_empty_sources() {
        let malformed = IndicatorSet::parse("{ not json", Path::new("bad.json"));
        assert!(matches!(malformed, Err(IndicatorError::Parse { .. })));

        let unknown = IndicatorSet::parse(r#"{"urls": ["x"]}"#, Path::new("bad.json"));
        assert!(matches!(unknown, Err(IndicatorError::Parse { .. })));

        let empty = IndicatorSet::parse(r#"{"name": "nothing"}"#, Path::new("empty.json"));
        assert!(matches!(empty, Err(IndicatorError::Empty { .. })));
    }

    #[test]
    fn test_len_counts_all_kinds() {
        assert_eq!(sample_set().len(), 8);
    }
}
