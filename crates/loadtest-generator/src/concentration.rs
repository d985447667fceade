//! Fixed-size weighted lookup tables.
//!
//! A [`ConcentrationTable`] maps every index in `0..100` to one of N
//! candidates. Candidate `k` owns a contiguous run of `percentages[k]` slots,
//! so drawing a uniform index selects candidate `k` with probability
//! `percentages[k] / 100`. Construction is deterministic; randomness only
//! enters when the caller picks the index.

use crate::error::GeneratorError;
use crate::event_type::parse_int_list;
use rand::Rng;

/// Number of slots in every concentration table.
pub const CONCENTRATION_SLOTS: usize = 100;

/// Weighted lookup table with exactly [`CONCENTRATION_SLOTS`] entries.
///
/// Immutable after construction and safe to share between tasks.
#[derive(Debug, Clone)]
pub struct ConcentrationTable<T> {
    candidates: Vec<T>,
    slots: [u16; CONCENTRATION_SLOTS],
}

impl<T> ConcentrationTable<T> {
    /// Build a table from parallel candidate and percentage lists.
    ///
    /// `name` identifies the setting in error messages.
    pub fn new(name: &str, candidates: Vec<T>, percentages: &[u32]) -> Result<Self, GeneratorError> {
        let invalid = |reason: String| GeneratorError::InvalidConcentration {
            name: name.to_string(),
            reason,
        };

        if candidates.is_empty() {
            return Err(invalid("no candidates".to_string()));
        }
        if candidates.len() != percentages.len() {
            return Err(invalid(format!(
                "{} candidates but {} percentages",
                candidates.len(),
                percentages.len()
            )));
        }
        let total: u64 = percentages.iter().map(|&p| u64::from(p)).sum();
        if total != CONCENTRATION_SLOTS as u64 {
            return Err(invalid(format!("percentages sum to {total}, expected 100")));
        }

        let mut slots = [0u16; CONCENTRATION_SLOTS];
        let mut next = 0usize;
        for (candidate, &percentage) in percentages.iter().enumerate() {
            for slot in &mut slots[next..next + percentage as usize] {
                *slot = candidate as u16;
            }
            next += percentage as usize;
        }

        Ok(Self { candidates, slots })
    }

    /// Build a table, panicking on invalid input.
    ///
    /// For call sites where the inputs were already validated and a failure
    /// is a broken invariant rather than a configuration mistake.
    pub fn must_build(name: &str, candidates: Vec<T>, percentages: &[u32]) -> Self {
        match Self::new(name, candidates, percentages) {
            Ok(table) => table,
            Err(e) => panic!("{e}"),
        }
    }

    /// Candidate selected by `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= CONCENTRATION_SLOTS`.
    pub fn get(&self, index: usize) -> &T {
        &self.candidates[self.slots[index] as usize]
    }

    /// Candidate selected by a uniformly random index.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        self.get(rng.random_range(0..CONCENTRATION_SLOTS))
    }

    /// Number of slots owned by candidate `k`.
    pub fn slots_for(&self, k: usize) -> usize {
        self.slots.iter().filter(|&&s| s as usize == k).count()
    }

    /// Candidates in declaration order.
    pub fn candidates(&self) -> &[T] {
        &self.candidates
    }

    /// Always [`CONCENTRATION_SLOTS`].
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Parse a percentage list (`HOT_*` settings).
///
/// Only checks syntax; the sum and cardinality are checked when the table is
/// built against its candidates.
pub fn parse_percentages(name: &str, input: &str) -> Result<Vec<u32>, GeneratorError> {
    parse_int_list(name, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_slot_counts_match_percentages() {
        let table =
            ConcentrationTable::new("test", vec!["a", "b", "c", "d"], &[10, 0, 65, 25]).unwrap();

        assert_eq!(table.len(), CONCENTRATION_SLOTS);
        assert_eq!(table.slots_for(0), 10);
        assert_eq!(table.slots_for(1), 0);
        assert_eq!(table.slots_for(2), 65);
        assert_eq!(table.slots_for(3), 25);
        let total: usize = (0..4).map(|k| table.slots_for(k)).sum();
        assert_eq!(total, CONCENTRATION_SLOTS);
    }

    #[test]
    fn test_contiguous_layout() {
        let table = ConcentrationTable::new("test", vec![1u32, 2, 3], &[40, 30, 30]).unwrap();
        assert_eq!(*table.get(0), 1);
        assert_eq!(*table.get(39), 1);
        assert_eq!(*table.get(40), 2);
        assert_eq!(*table.get(69), 2);
        assert_eq!(*table.get(70), 3);
        assert_eq!(*table.get(99), 3);
    }

    #[test]
    fn test_rejects_bad_sum() {
        let result = ConcentrationTable::new("HOT_EVENT_TYPES", vec!["track", "page"], &[50, 40]);
        match result {
            Err(GeneratorError::InvalidConcentration { name, reason }) => {
                assert_eq!(name, "HOT_EVENT_TYPES");
                assert!(reason.contains("90"));
            }
            other => panic!("expected InvalidConcentration, got {other:?}"),
        }

        assert!(ConcentrationTable::new("t", vec!["a"], &[101]).is_err());
    }

    #[test]
    fn test_rejects_length_mismatch() {
        assert!(ConcentrationTable::new("t", vec!["a", "b"], &[100]).is_err());
        assert!(ConcentrationTable::new("t", vec!["a"], &[50, 50]).is_err());
        assert!(ConcentrationTable::<&str>::new("t", vec![], &[]).is_err());
    }

    #[test]
    #[should_panic(expected = "sum to 90")]
    fn test_must_build_panics() {
        ConcentrationTable::must_build("t", vec!["a", "b"], &[45, 45]);
    }

    #[test]
    fn test_fixed_index_is_deterministic() {
        let table = ConcentrationTable::new("t", vec!["a", "b"], &[30, 70]).unwrap();
        for _ in 0..1000 {
            assert_eq!(*table.get(29), "a");
            assert_eq!(*table.get(30), "b");
        }
    }

    #[test]
    fn test_sampling_reproduces_proportions() {
        let table = ConcentrationTable::new("t", vec![0usize, 1, 2], &[50, 30, 20]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0u32; 3];
        for _ in 0..10_000 {
            counts[*table.sample(&mut rng)] += 1;
        }

        // 10k draws: a 3% band is well over four standard deviations.
        assert!((4700..=5300).contains(&counts[0]), "{counts:?}");
        assert!((2700..=3300).contains(&counts[1]), "{counts:?}");
        assert!((1700..=2300).contains(&counts[2]), "{counts:?}");
    }

    #[test]
    fn test_parse_percentages() {
        assert_eq!(parse_percentages("HOT", "100").unwrap(), vec![100]);
        assert!(parse_percentages("HOT", "a,b").is_err());
    }
}
