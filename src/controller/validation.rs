//! Aggregate reachability report for a registries list

use futures::future::join_all;
use tracing::debug;

use crate::crd::RegistryEntry;

use super::validator::EndpointValidator;

/// Message for a list without entries
pub const EMPTY_STATUS: &str = "CR list does not contain any entries";

/// Message when every entry answered an index probe
pub const ALL_REGISTRIES_REACHABLE: &str = "All devfile registries are active and reachable";

/// Prefix of the condition message when at least one entry failed
pub const VALIDATION_FAILED_PREFIX: &str = "Devfile registries list failed to validate";

pub fn registry_unreachable(url: &str) -> String {
    format!("Devfile {url} Registry cannot be reached")
}

/// Outcome of validating every entry of one list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    /// Aggregate status message
    pub message: String,
    /// URLs that failed validation, in entry order
    pub unreachable: Vec<String>,
}

impl ValidationReport {
    pub fn is_ready(&self) -> bool {
        self.unreachable.is_empty()
    }

    /// Message written to the ValidateDevfileRegistries condition
    pub fn condition_message(&self) -> String {
        if self.is_ready() {
            self.message.clone()
        } else {
            format!("{VALIDATION_FAILED_PREFIX}: {}", self.message)
        }
    }
}

/// Validate every entry independently and aggregate the verdicts
///
/// Probes run concurrently; failure lines keep the order of the entries.
pub async fn validate_entries(
    validator: &dyn EndpointValidator,
    entries: &[RegistryEntry],
) -> ValidationReport {
    if entries.is_empty() {
        return ValidationReport {
            message: EMPTY_STATUS.to_string(),
            unreachable: Vec::new(),
        };
    }

    let checks = entries
        .iter()
        .map(|entry| validator.validate(&entry.url, entry.skip_tls_verify));
    let results = join_all(checks).await;

    let unreachable: Vec<String> = entries
        .iter()
        .zip(results)
        .filter_map(|(entry, result)| match result {
            Ok(()) => None,
            Err(e) => {
                debug!("Registry {} ({}) failed validation: {}", entry.name, entry.url, e);
                Some(entry.url.clone())
            }
        })
        .collect();

    let message = if unreachable.is_empty() {
        ALL_REGISTRIES_REACHABLE.to_string()
    } else {
        unreachable
            .iter()
            .map(|url| registry_unreachable(url))
            .collect::<Vec<_>>()
            .join("\n")
    };

    ValidationReport {
        message,
        unreachable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Accepts every URL except the listed ones
    struct StaticValidator {
        down: HashSet<String>,
    }

    #[async_trait]
    impl EndpointValidator for StaticValidator {
        async fn validate(&self, url: &str, _skip_tls_verify: bool) -> Result<()> {
            if self.down.contains(url) {
                Err(Error::InvalidRegistry(url.to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn validator(down: &[&str]) -> StaticValidator {
        StaticValidator {
            down: down.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_empty_list() {
        let report = validate_entries(&validator(&[]), &[]).await;
        assert_eq!(report.message, EMPTY_STATUS);
        assert!(report.is_ready());
        assert_eq!(report.condition_message(), EMPTY_STATUS);
    }

    #[tokio::test]
    async fn test_all_reachable() {
        let entries = vec![
            RegistryEntry::new("a", "https://a.example.com"),
            RegistryEntry::new("b", "https://b.example.com"),
        ];
        let report = validate_entries(&validator(&[]), &entries).await;
        assert_eq!(report.message, ALL_REGISTRIES_REACHABLE);
        assert!(report.is_ready());
    }

    #[tokio::test]
    async fn test_failures_follow_entry_order() {
        let entries = vec![
            RegistryEntry::new("c", "https://c.example.com"),
            RegistryEntry::new("ok", "https://ok.example.com"),
            RegistryEntry::new("a", "https://a.example.com"),
        ];
        let report = validate_entries(
            &validator(&["https://a.example.com", "https://c.example.com"]),
            &entries,
        )
        .await;

        assert!(!report.is_ready());
        assert_eq!(
            report.unreachable,
            vec!["https://c.example.com", "https://a.example.com"]
        );
        assert_eq!(
            report.message,
            "Devfile https://c.example.com Registry cannot be reached\nDevfile https://a.example.com Registry cannot be reached"
        );
        assert!(!report.message.contains(ALL_REGISTRIES_REACHABLE));
        assert!(report
            .condition_message()
            .starts_with(VALIDATION_FAILED_PREFIX));
    }

    #[tokio::test]
    async fn test_duplicates_are_validated_independently() {
        let entries = vec![
            RegistryEntry::new("a", "https://down.example.com"),
            RegistryEntry::new("a", "https://down.example.com"),
        ];
        let report = validate_entries(&validator(&["https://down.example.com"]), &entries).await;
        assert_eq!(report.unreachable.len(), 2);
    }
}
