//! Longest increasing subsequence.
//!
//! Keyed placement keeps the nodes on the longest increasing run of old
//! positions where they are and moves everything else around them.

/// Positions (into `seq`) of one longest strictly increasing subsequence,
/// in ascending order.
///
/// Runs in `O(n log n)`.
pub fn lis(seq: &[usize]) -> Vec<usize> {
    // tails[k]: position of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::with_capacity(seq.len());
    let mut previous: Vec<Option<usize>> = vec![None; seq.len()];

    for (position, &value) in seq.iter().enumerate() {
        let slot = tails.partition_point(|&tail| seq[tail] < value);
        if slot > 0 {
            previous[position] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(position);
        } else {
            tails[slot] = position;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        result.push(position);
        cursor = previous[position];
    }
    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(seq: &[usize]) -> Vec<usize> {
        lis(seq).into_iter().map(|position| seq[position]).collect()
    }

    #[test]
    fn empty_and_single() {
        assert!(lis(&[]).is_empty());
        assert_eq!(lis(&[4]), vec![0]);
    }

    #[test]
    fn sorted_input_is_kept_whole() {
        assert_eq!(lis(&[0, 1, 2, 3]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn rotation_keeps_the_long_run() {
        // [C, A, B] over old [A, B, C]
        assert_eq!(values(&[2, 0, 1]), vec![0, 1]);
    }

    #[test]
    fn swap_keeps_one() {
        assert_eq!(lis(&[1, 0]).len(), 1);
    }

    #[test]
    fn mixed_sequence() {
        let seq = [3, 1, 8, 2, 5, 9, 4, 6];
        let kept = values(&seq);
        assert_eq!(kept.len(), 4);
        assert!(kept.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
