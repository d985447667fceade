//! Source (write key) selection and per-replica ownership.

use crate::concentration::{ConcentrationTable, CONCENTRATION_SLOTS};
use crate::error::GeneratorError;
use rand::Rng;
use std::sync::Arc;

/// Sources owned by replica `index` out of `replicas`.
///
/// Shared sources are owned by every replica. Otherwise sources are dealt
/// round-robin: replica `index` owns source `i` when `i % replicas == index`.
pub fn partition_sources(
    sources: &[String],
    index: usize,
    replicas: usize,
    shared: bool,
) -> Result<Vec<String>, GeneratorError> {
    if sources.is_empty() {
        return Err(GeneratorError::InvalidSources("SOURCES is empty".to_string()));
    }
    if shared {
        return Ok(sources.to_vec());
    }
    if replicas == 0 {
        return Err(GeneratorError::InvalidSources(
            "REPLICAS must be at least 1".to_string(),
        ));
    }
    if index >= replicas {
        return Err(GeneratorError::InvalidSources(format!(
            "replica index {index} is out of range for {replicas} replicas"
        )));
    }

    let owned: Vec<String> = sources
        .iter()
        .enumerate()
        .filter(|(i, _)| i % replicas == index)
        .map(|(_, source)| source.clone())
        .collect();

    if owned.is_empty() {
        return Err(GeneratorError::InvalidSources(format!(
            "replica {index} owns no sources ({} sources over {replicas} replicas)",
            sources.len()
        )));
    }
    Ok(owned)
}

/// Weighted choice of the source a message is sent on behalf of.
#[derive(Debug, Clone)]
pub struct SourceSelector {
    table: ConcentrationTable<Arc<str>>,
}

impl SourceSelector {
    /// Build the selector for the owned sources.
    ///
    /// Without `hot` the slots are spread flat. With `hot = [h1..hk]` the
    /// first k sources take those percentages and the rest share the
    /// remainder flat.
    pub fn new(sources: &[String], hot: Option<&[u32]>) -> Result<Self, GeneratorError> {
        let percentages = source_percentages(sources.len(), hot)?;
        let candidates = sources.iter().map(|s| Arc::from(s.as_str())).collect();
        Ok(Self {
            table: ConcentrationTable::new("SOURCES", candidates, &percentages)?,
        })
    }

    /// Write key for the next message.
    pub fn next_source<R: Rng + ?Sized>(&self, rng: &mut R) -> Arc<str> {
        Arc::clone(self.table.sample(rng))
    }

    pub fn sources(&self) -> &[Arc<str>] {
        self.table.candidates()
    }

    /// Slots owned by source `k`.
    pub fn slots_for(&self, k: usize) -> usize {
        self.table.slots_for(k)
    }
}

fn source_percentages(n: usize, hot: Option<&[u32]>) -> Result<Vec<u32>, GeneratorError> {
    if n == 0 {
        return Err(GeneratorError::InvalidSources("no sources".to_string()));
    }

    let Some(hot) = hot else {
        return flat(n, CONCENTRATION_SLOTS as u32).ok_or_else(|| {
            GeneratorError::InvalidSources(format!(
                "{n} sources do not fit in {CONCENTRATION_SLOTS} slots"
            ))
        });
    };

    if hot.len() > n {
        return Err(GeneratorError::InvalidSources(format!(
            "HOT_SOURCES has {} entries but only {n} sources are owned",
            hot.len()
        )));
    }
    let hot_total: u64 = hot.iter().map(|&p| u64::from(p)).sum();
    if hot_total > CONCENTRATION_SLOTS as u64 {
        return Err(GeneratorError::InvalidSources(format!(
            "HOT_SOURCES sum to {hot_total}, more than 100"
        )));
    }
    let hot_total = hot_total as u32;

    let rest = n - hot.len();
    let remainder = CONCENTRATION_SLOTS as u32 - hot_total;
    let mut percentages = hot.to_vec();
    match (rest, remainder) {
        (0, 0) => {}
        (0, r) => {
            return Err(GeneratorError::InvalidSources(format!(
                "HOT_SOURCES leave {r}% with no remaining sources"
            )))
        }
        (k, 0) => {
            return Err(GeneratorError::InvalidSources(format!(
                "HOT_SOURCES leave no share for the remaining {k} sources"
            )))
        }
        (k, r) => {
            let spread = flat(k, r).ok_or_else(|| {
                GeneratorError::InvalidSources(format!(
                    "{k} remaining sources do not fit in the {r}% left by HOT_SOURCES"
                ))
            })?;
            percentages.extend(spread);
        }
    }
    Ok(percentages)
}

/// Spread `slots` over `n` candidates, the first `slots % n` getting one
/// extra. `None` when some candidate would get no slot.
fn flat(n: usize, slots: u32) -> Option<Vec<u32>> {
    let n32 = u32::try_from(n).ok()?;
    if n32 == 0 || n32 > slots {
        return None;
    }
    let base = slots / n32;
    let extra = (slots % n32) as usize;
    Some(
        (0..n)
            .map(|i| if i < extra { base + 1 } else { base })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("wk-{i}")).collect()
    }

    #[test]
    fn test_partition_round_robin() {
        let sources = keys(5);
        assert_eq!(
            partition_sources(&sources, 0, 2, false).unwrap(),
            vec!["wk-0", "wk-2", "wk-4"]
        );
        assert_eq!(
            partition_sources(&sources, 1, 2, false).unwrap(),
            vec!["wk-1", "wk-3"]
        );
    }

    #[test]
    fn test_partition_shared() {
        let sources = keys(3);
        assert_eq!(partition_sources(&sources, 7, 2, true).unwrap(), sources);
    }

    #[test]
    fn test_partition_errors() {
        let sources = keys(2);
        assert!(partition_sources(&sources, 2, 2, false).is_err());
        assert!(partition_sources(&sources, 2, 3, false).is_err());
        assert!(partition_sources(&[], 0, 1, false).is_err());
        assert!(partition_sources(&sources, 0, 0, false).is_err());
    }

    #[test]
    fn test_flat_distribution() {
        let selector = SourceSelector::new(&keys(3), None).unwrap();
        assert_eq!(selector.slots_for(0), 34);
        assert_eq!(selector.slots_for(1), 33);
        assert_eq!(selector.slots_for(2), 33);
    }

    #[test]
    fn test_hot_distribution() {
        let selector = SourceSelector::new(&keys(4), Some(&[70])).unwrap();
        assert_eq!(selector.slots_for(0), 70);
        assert_eq!(selector.slots_for(1), 10);
        assert_eq!(selector.slots_for(2), 10);
        assert_eq!(selector.slots_for(3), 10);

        let selector = SourceSelector::new(&keys(2), Some(&[60, 40])).unwrap();
        assert_eq!(selector.slots_for(1), 40);
    }

    #[test]
    fn test_invalid_hot_sources() {
        assert!(SourceSelector::new(&keys(1), Some(&[50, 50])).is_err());
        assert!(SourceSelector::new(&keys(2), Some(&[60, 50])).is_err());
        assert!(SourceSelector::new(&keys(2), Some(&[100])).is_err());
        assert!(SourceSelector::new(&keys(2), Some(&[60, 30])).is_err());
        assert!(SourceSelector::new(&keys(101), None).is_err());
    }

    #[test]
    fn test_hot_sources_sum_past_u32() {
        let err = SourceSelector::new(&keys(3), Some(&[u32::MAX, 1])).unwrap_err();
        assert!(err.to_string().contains("more than 100"), "{err}");
    }

    #[test]
    fn test_next_source_is_owned() {
        let sources = keys(3);
        let selector = SourceSelector::new(&sources, None).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let source = selector.next_source(&mut rng);
            assert!(sources.iter().any(|s| s.as_str() == &*source));
        }
    }
}
