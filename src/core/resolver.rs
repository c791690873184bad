use crate::core::{Technique, TechniqueSource};
use crate::utils::error::{ChainError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

pub const DEFAULT_ATTACK_SOURCE: &str =
    "https://raw.githubusercontent.com/mitre/cti/master/enterprise-attack/enterprise-attack.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const ATTACK_KILL_CHAIN: &str = "mitre-attack";

/// Enterprise tactics in kill-chain order; this is what orders a group's chain.
const TACTIC_ORDER: [&str; 14] = [
    "reconnaissance",
    "resource-development",
    "initial-access",
    "execution",
    "persistence",
    "privilege-escalation",
    "defense-evasion",
    "credential-access",
    "discovery",
    "lateral-movement",
    "collection",
    "command-and-control",
    "exfiltration",
    "impact",
];

#[derive(Debug, Clone, Deserialize)]
pub struct StixBundle {
    pub objects: Vec<StixObject>,
}

/// The subset of a STIX 2.x object the resolver reads. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct StixObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
    #[serde(default)]
    pub kill_chain_phases: Vec<KillChainPhase>,
    #[serde(default)]
    pub relationship_type: Option<String>,
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub target_ref: Option<String>,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub x_mitre_deprecated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalReference {
    pub source_name: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KillChainPhase {
    pub kill_chain_name: String,
    pub phase_name: String,
}

impl StixObject {
    fn is_active(&self) -> bool {
        !self.revoked && !self.x_mitre_deprecated
    }

    /// ATT&CK id such as `G0005` or `T1059.001`.
    fn attack_id(&self) -> Option<&str> {
        self.external_references
            .iter()
            .find(|r| r.source_name == ATTACK_KILL_CHAIN)
            .and_then(|r| r.external_id.as_deref())
    }

    /// `wanted` is already trimmed and lower-cased.
    fn names_group(&self, wanted: &str) -> bool {
        let same = |candidate: &str| candidate.trim().to_lowercase() == wanted;
        self.name.as_deref().is_some_and(same)
            || self.aliases.iter().any(|alias| same(alias.as_str()))
            || self.attack_id().is_some_and(same)
    }
}

fn tactic_rank(phase: &str) -> usize {
    TACTIC_ORDER
        .iter()
        .position(|t| *t == phase)
        .unwrap_or(TACTIC_ORDER.len())
}

fn earliest_tactic(pattern: &StixObject) -> (usize, Option<String>) {
    pattern
        .kill_chain_phases
        .iter()
        .filter(|p| p.kill_chain_name == ATTACK_KILL_CHAIN)
        .map(|p| (tactic_rank(&p.phase_name), p.phase_name.clone()))
        .min_by_key(|(rank, _)| *rank)
        .map(|(rank, phase)| (rank, Some(phase)))
        .unwrap_or((TACTIC_ORDER.len(), None))
}

/// Resolve `group` (name, alias or ATT&CK id) to its ordered technique chain.
///
/// Techniques are ordered by their earliest enterprise tactic, then by id.
/// Techniques without a known tactic go last.
pub fn resolve_group(bundle: &StixBundle, group: &str) -> Result<Vec<Technique>> {
    let wanted = group.trim().to_lowercase();

    let intrusion_set = bundle
        .objects
        .iter()
        .filter(|o| o.kind == "intrusion-set" && o.is_active())
        .find(|o| o.names_group(&wanted))
        .ok_or_else(|| ChainError::UnknownGroup {
            group: group.trim().to_string(),
        })?;

    tracing::debug!(
        "Matched group '{}' to intrusion set {} ({})",
        group,
        intrusion_set.name.as_deref().unwrap_or("unnamed"),
        intrusion_set.id
    );

    let patterns: HashMap<&str, &StixObject> = bundle
        .objects
        .iter()
        .filter(|o| o.kind == "attack-pattern" && o.is_active())
        .map(|o| (o.id.as_str(), o))
        .collect();

    let mut seen = HashSet::new();
    let mut ranked = Vec::new();

    for relationship in bundle.objects.iter().filter(|o| {
        o.kind == "relationship"
            && o.is_active()
            && o.relationship_type.as_deref() == Some("uses")
            && o.source_ref.as_deref() == Some(intrusion_set.id.as_str())
    }) {
        let Some(pattern) = relationship
            .target_ref
            .as_deref()
            .and_then(|target| patterns.get(target))
        else {
            continue;
        };
        let Some(technique_id) = pattern.attack_id() else {
            continue;
        };

        let technique_id = technique_id.trim().to_uppercase();
        if !seen.insert(technique_id.clone()) {
            continue;
        }

        let (rank, tactic) = earliest_tactic(pattern);
        ranked.push((
            rank,
            Technique {
                id: technique_id,
                name: pattern.name.clone().unwrap_or_default(),
                tactic,
                position: 0,
            },
        ));
    }

    ranked.sort_by(|(rank_a, a), (rank_b, b)| {
        rank_a.cmp(rank_b).then_with(|| a.id.cmp(&b.id))
    });

    Ok(ranked
        .into_iter()
        .enumerate()
        .map(|(position, (_, technique))| Technique {
            position,
            ..technique
        })
        .collect())
}

pub fn parse_bundle(data: &[u8], source_location: &str) -> Result<StixBundle> {
    serde_json::from_slice(data).map_err(|e| ChainError::AttackDataError {
        source_location: source_location.to_string(),
        message: e.to_string(),
    })
}

/// ATT&CK STIX bundle read from an `http(s)` URL or a local file.
pub struct StixTechniqueSource {
    location: String,
    client: Client,
}

impl StixTechniqueSource {
    pub fn new(location: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("attack-chain/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            location: location.into(),
            client,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn is_remote(&self) -> bool {
        let scheme = |prefix: &str| {
            self.location
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        };
        scheme("http://") || scheme("https://")
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        tracing::debug!("Making ATT&CK request to: {}", self.location);
        let response = self
            .client
            .get(&self.location)
            .send()
            .await
            .map_err(|e| ChainError::SourceUnavailable {
                source_location: self.location.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!("ATT&CK response status: {}", response.status());

        if !response.status().is_success() {
            return Err(ChainError::SourceUnavailable {
                source_location: self.location.clone(),
                message: format!("HTTP status {}", response.status()),
            });
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }

    pub async fn load_bundle(&self) -> Result<StixBundle> {
        let data = if self.is_remote() {
            self.fetch().await?
        } else {
            tracing::debug!("Reading ATT&CK data from file: {}", self.location);
            std::fs::read(&self.location).map_err(|e| ChainError::SourceUnavailable {
                source_location: self.location.clone(),
                message: e.to_string(),
            })?
        };

        let bundle = parse_bundle(&data, &self.location)?;
        tracing::debug!("Loaded {} STIX objects", bundle.objects.len());
        Ok(bundle)
    }
}

impl TechniqueSource for StixTechniqueSource {
    async fn resolve(&self, group: &str) -> Result<Vec<Technique>> {
        let bundle = self.load_bundle().await?;
        let chain = resolve_group(&bundle, group)?;

        if chain.is_empty() {
            tracing::warn!("Group '{}' has no techniques attributed to it", group);
        } else {
            tracing::info!(
                "Resolved {} techniques for group '{}' from {}",
                chain.len(),
                group,
                self.location()
            );
        }

        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use std::io::Write;

    fn pattern(id: &str, attack_id: &str, name: &str, phases: &[&str]) -> Value {
        json!({
            "type": "attack-pattern",
            "id": id,
            "name": name,
            "external_references": [
                {"source_name": "mitre-attack", "external_id": attack_id, "url": "https://attack.mitre.org"}
            ],
            "kill_chain_phases": phases
                .iter()
                .map(|p| json!({"kill_chain_name": "mitre-attack", "phase_name": p}))
                .collect::<Vec<_>>()
        })
    }

    fn uses(id: &str, source: &str, target: &str) -> Value {
        json!({
            "type": "relationship",
            "id": id,
            "relationship_type": "uses",
            "source_ref": source,
            "target_ref": target
        })
    }

    /// Small bundle: APT4 uses T1059 (execution) and T1003 (credential access),
    /// plus noise that the resolver must ignore.
    fn sample_bundle() -> Value {
        json!({
            "type": "bundle",
            "id": "bundle--1",
            "objects": [
                {
                    "type": "intrusion-set",
                    "id": "intrusion-set--apt4",
                    "name": "APT4",
                    "aliases": ["APT4", "Maverick Panda"],
                    "external_references": [{"source_name": "mitre-attack", "external_id": "G9004"}]
                },
                {
                    "type": "intrusion-set",
                    "id": "intrusion-set--other",
                    "name": "Other Group",
                    "external_references": [{"source_name": "mitre-attack", "external_id": "G9005"}]
                },
                {
                    "type": "intrusion-set",
                    "id": "intrusion-set--old",
                    "name": "Retired",
                    "revoked": true
                },
                pattern("attack-pattern--cred", "T1003", "OS Credential Dumping", &["credential-access"]),
                pattern("attack-pattern--cmd", "T1059", "Command and Scripting Interpreter", &["execution"]),
                pattern("attack-pattern--disc", "T1082", "System Information Discovery", &["discovery"]),
                {
                    "type": "attack-pattern",
                    "id": "attack-pattern--gone",
                    "name": "Deprecated Technique",
                    "x_mitre_deprecated": true,
                    "external_references": [{"source_name": "mitre-attack", "external_id": "T1999"}],
                    "kill_chain_phases": [{"kill_chain_name": "mitre-attack", "phase_name": "execution"}]
                },
                uses("relationship--1", "intrusion-set--apt4", "attack-pattern--cred"),
                uses("relationship--2", "intrusion-set--apt4", "attack-pattern--cmd"),
                uses("relationship--3", "intrusion-set--apt4", "attack-pattern--cred"),
                uses("relationship--4", "intrusion-set--apt4", "attack-pattern--gone"),
                uses("relationship--5", "intrusion-set--other", "attack-pattern--disc"),
                {
                    "type": "relationship",
                    "id": "relationship--6",
                    "relationship_type": "mitigates",
                    "source_ref": "intrusion-set--apt4",
                    "target_ref": "attack-pattern--disc"
                }
            ]
        })
    }

    fn bundle_from(value: Value) -> StixBundle {
        serde_json::from_value(value).unwrap()
    }

    fn ids(chain: &[Technique]) -> Vec<&str> {
        chain.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_resolve_orders_by_tactic() {
        let chain = resolve_group(&bundle_from(sample_bundle()), "APT4").unwrap();

        assert_eq!(ids(&chain), vec!["T1059", "T1003"]);
        assert_eq!(chain[0].position, 0);
        assert_eq!(chain[0].tactic.as_deref(), Some("execution"));
        assert_eq!(chain[1].position, 1);
        assert_eq!(chain[1].name, "OS Credential Dumping");
    }

    #[test]
    fn test_resolve_by_alias_and_id_case_insensitive() {
        let bundle = bundle_from(sample_bundle());

        let by_alias = resolve_group(&bundle, "  maverick panda ").unwrap();
        let by_id = resolve_group(&bundle, "g9004").unwrap();

        assert_eq!(ids(&by_alias), vec!["T1059", "T1003"]);
        assert_eq!(by_alias, by_id);
    }

    #[test]
    fn test_resolve_unknown_group() {
        let err = resolve_group(&bundle_from(sample_bundle()), "APT999").unwrap_err();
        assert!(matches!(err, ChainError::UnknownGroup { ref group } if group == "APT999"));
    }

    #[test]
    fn test_resolve_ignores_revoked_group() {
        let err = resolve_group(&bundle_from(sample_bundle()), "Retired").unwrap_err();
        assert!(matches!(err, ChainError::UnknownGroup { .. }));
    }

    #[test]
    fn test_resolve_earliest_tactic_and_id_tiebreak() {
        let bundle = bundle_from(json!({
            "objects": [
                {"type": "intrusion-set", "id": "intrusion-set--g", "name": "G"},
                pattern("attack-pattern--a", "T1547", "Boot Autostart", &["privilege-escalation", "persistence"]),
                pattern("attack-pattern--b", "T1053", "Scheduled Task", &["execution", "persistence"]),
                pattern("attack-pattern--c", "T1027", "Obfuscation", &["defense-evasion"]),
                pattern("attack-pattern--d", "T1036", "Masquerading", &["defense-evasion"]),
                pattern("attack-pattern--e", "T0800", "ICS Technique", &["inhibit-response-function"]),
                uses("relationship--e", "intrusion-set--g", "attack-pattern--e"),
                uses("relationship--d", "intrusion-set--g", "attack-pattern--d"),
                uses("relationship--c", "intrusion-set--g", "attack-pattern--c"),
                uses("relationship--a", "intrusion-set--g", "attack-pattern--a"),
                uses("relationship--b", "intrusion-set--g", "attack-pattern--b")
            ]
        }));

        let chain = resolve_group(&bundle, "G").unwrap();

        assert_eq!(ids(&chain), vec!["T1053", "T1547", "T1027", "T1036", "T0800"]);
        assert_eq!(chain[1].tactic.as_deref(), Some("persistence"));
        assert_eq!(chain[4].tactic.as_deref(), Some("inhibit-response-function"));
        let positions: Vec<usize> = chain.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_resolve_group_without_techniques() {
        let chain = resolve_group(&bundle_from(sample_bundle()), "Other Group").unwrap();
        assert_eq!(ids(&chain), vec!["T1082"]);

        let bundle = bundle_from(json!({
            "objects": [{"type": "intrusion-set", "id": "intrusion-set--quiet", "name": "Quiet"}]
        }));
        assert!(resolve_group(&bundle, "Quiet").unwrap().is_empty());
    }

    #[test]
    fn test_parse_bundle_rejects_non_bundle() {
        let err = parse_bundle(b"{\"type\": \"bundle\"}", "local.json").unwrap_err();
        assert!(matches!(err, ChainError::AttackDataError { .. }));

        let err = parse_bundle(b"<html>", "local.json").unwrap_err();
        assert!(matches!(err, ChainError::AttackDataError { .. }));
    }

    #[tokio::test]
    async fn test_source_reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_bundle().to_string().as_bytes()).unwrap();

        let source = StixTechniqueSource::new(
            file.path().to_str().unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        let chain = source.resolve("APT4").await.unwrap();

        assert_eq!(ids(&chain), vec!["T1059", "T1003"]);
    }

    #[tokio::test]
    async fn test_source_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("enterprise-attack.json");

        let source =
            StixTechniqueSource::new(missing.to_str().unwrap(), Duration::from_secs(5)).unwrap();
        let err = source.resolve("APT4").await.unwrap_err();

        assert!(matches!(err, ChainError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_source_fetches_over_http() {
        let server = MockServer::start_async().await;
        let api_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/enterprise-attack.json");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(sample_bundle());
            })
            .await;

        let source = StixTechniqueSource::new(
            server.url("/enterprise-attack.json"),
            Duration::from_secs(5),
        )
        .unwrap();
        let chain = source.resolve("APT4").await.unwrap();

        api_mock.assert_async().await;
        assert_eq!(ids(&chain), vec!["T1059", "T1003"]);
    }

    #[tokio::test]
    async fn test_source_url_scheme_is_case_insensitive() {
        let server = MockServer::start_async().await;
        let api_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/enterprise-attack.json");
                then.status(200).json_body(sample_bundle());
            })
            .await;

        let url = server
            .url("/enterprise-attack.json")
            .replacen("http://", "HTTP://", 1);
        let source = StixTechniqueSource::new(url, Duration::from_secs(5)).unwrap();
        let chain = source.resolve("APT4").await.unwrap();

        api_mock.assert_async().await;
        assert_eq!(ids(&chain), vec!["T1059", "T1003"]);
    }

    #[tokio::test]
    async fn test_source_http_error_status() {
        let server = MockServer::start_async().await;
        let api_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/enterprise-attack.json");
                then.status(503);
            })
            .await;

        let source = StixTechniqueSource::new(
            server.url("/enterprise-attack.json"),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = source.resolve("APT4").await.unwrap_err();

        api_mock.assert_async().await;
        assert!(matches!(err, ChainError::SourceUnavailable { ref message, .. } if message.contains("503")));
    }
}
