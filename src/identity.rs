//! Replica identity from the pod hostname.

use anyhow::Context;
use regex::Regex;
use std::sync::OnceLock;

/// `<deployment>-<index>`, the StatefulSet pod naming convention.
const HOSTNAME_PATTERN: &str = r"^(?P<name>[a-z0-9]([-a-z0-9]*[a-z0-9])?)-(?P<index>[0-9]+)$";

fn hostname_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(HOSTNAME_PATTERN).expect("hostname pattern is valid"))
}

/// Deployment name and replica index of this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaIdentity {
    pub name: String,
    pub index: usize,
}

impl ReplicaIdentity {
    pub fn parse(hostname: &str) -> anyhow::Result<Self> {
        let captures = hostname_regex().captures(hostname).with_context(|| {
            format!("Hostname '{hostname}' does not match '<name>-<index>' ({HOSTNAME_PATTERN})")
        })?;
        let index = captures["index"]
            .parse()
            .with_context(|| format!("Replica index in hostname '{hostname}' is out of range"))?;
        Ok(Self {
            name: captures["name"].to_string(),
            index,
        })
    }

    /// Identity of the running host, or of `hostname` when given.
    pub fn resolve(hostname: Option<&str>) -> anyhow::Result<Self> {
        match hostname {
            Some(h) => Self::parse(h),
            None => {
                let h = hostname::get().context("Failed to read the system hostname")?;
                Self::parse(&h.to_string_lossy())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statefulset_names() {
        assert_eq!(
            ReplicaIdentity::parse("loadtest-0").unwrap(),
            ReplicaIdentity {
                name: "loadtest".to_string(),
                index: 0
            }
        );
        assert_eq!(
            ReplicaIdentity::parse("event-loadtest-12").unwrap(),
            ReplicaIdentity {
                name: "event-loadtest".to_string(),
                index: 12
            }
        );
    }

    #[test]
    fn test_rejects_other_hostnames() {
        for hostname in ["loadtest", "Loadtest-1", "loadtest-", "-1", "loadtest-a", "my.host-1"] {
            assert!(ReplicaIdentity::parse(hostname).is_err(), "{hostname}");
        }
    }
}
