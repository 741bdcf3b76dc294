// rust/corpus-core/src/split/resolver.rs

use crate::error::{CorpusError, Result};

/// Returns `[0, n)` minus `right`, strictly increasing.
///
/// `right` must be strictly increasing. The resulting pair is checked with
/// [`verify_partition`] before it is returned.
pub fn resolve_left_indices(n: usize, right: &[usize]) -> Result<Vec<usize>> {
    let mut left = Vec::with_capacity(n.saturating_sub(right.len()));
    let mut pending = right.iter().peekable();

    for i in 0..n {
        if pending.peek() == Some(&&i) {
            pending.next();
        } else {
            left.push(i);
        }
    }

    verify_partition(n, &left, right)?;
    Ok(left)
}

/// Checks that `left` and `right` partition `[0, n)` exactly.
///
/// # Errors
///
/// Returns an invariant error if either set is out of order or out of
/// range, if they overlap, or if together they miss an index.
pub fn verify_partition(n: usize, left: &[usize], right: &[usize]) -> Result<()> {
    check_ordered("left", n, left)?;
    check_ordered("right", n, right)?;

    let mut seen = vec![0u64; n.div_ceil(64)];
    for &i in left.iter().chain(right) {
        let (word, bit) = (i / 64, 1u64 << (i % 64));
        if seen[word] & bit != 0 {
            return Err(CorpusError::invariant(format!(
                "index {i} is in both partitions"
            )));
        }
        seen[word] |= bit;
    }

    if left.len() + right.len() != n {
        return Err(CorpusError::invariant(format!(
            "partitions cover {} of {n} indices",
            left.len() + right.len()
        )));
    }
    Ok(())
}

fn check_ordered(name: &str, n: usize, indices: &[usize]) -> Result<()> {
    if let Some(w) = indices.windows(2).find(|w| w[0] >= w[1]) {
        return Err(CorpusError::invariant(format!(
            "{name} indices not strictly increasing at {} -> {}",
            w[0], w[1]
        )));
    }
    match indices.last() {
        Some(&last) if last >= n => Err(CorpusError::invariant(format!(
            "{name} index {last} out of range for {n} items"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::sample_right_indices;

    #[test]
    fn test_zero_probability_keeps_everything_left() {
        let right = sample_right_indices(1000, 0.0, 1000, 24301).unwrap();
        assert!(right.is_empty());

        let left = resolve_left_indices(1000, &right).unwrap();
        assert_eq!(left, (0..1000).collect::<Vec<_>>());
        verify_partition(1000, &left, &right).unwrap();
    }

    #[test]
    fn test_complement() {
        let left = resolve_left_indices(10, &[0, 3, 4, 9]).unwrap();
        assert_eq!(left, vec![1, 2, 5, 6, 7, 8]);
    }

    #[test]
    fn test_empty_and_full_right() {
        assert_eq!(resolve_left_indices(5, &[]).unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(resolve_left_indices(3, &[0, 1, 2]).unwrap().is_empty());
        assert!(resolve_left_indices(0, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_unsorted_right_is_invariant_violation() {
        assert!(matches!(
            resolve_left_indices(10, &[5, 3]),
            Err(CorpusError::Invariant { .. })
        ));
    }

    #[test]
    fn test_out_of_range_right() {
        assert!(matches!(
            resolve_left_indices(4, &[1, 4]),
            Err(CorpusError::Invariant { .. })
        ));
    }

    #[test]
    fn test_verify_detects_overlap_and_gaps() {
        assert!(verify_partition(4, &[0, 1, 2], &[2, 3]).is_err());
        assert!(verify_partition(4, &[0, 1], &[3]).is_err());
        assert!(verify_partition(4, &[0, 0, 1], &[2, 3]).is_err());
        assert!(verify_partition(4, &[0, 2], &[1, 3]).is_ok());
    }
}
