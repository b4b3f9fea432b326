use crate::components::{FormattedConfigError, InvalidConfigError};

/// Validated number of rows of every group.
///
/// Sizes are non-negative and sum to the total row count of the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupSizes<'a> {
    sizes: &'a [i32],
}

impl<'a> GroupSizes<'a> {
    pub fn new(sizes: &'a [i32], total_rows: usize) -> Result<Self, InvalidConfigError> {
        if let Some(group) = sizes.iter().position(|size| *size < 0) {
            let size = sizes[group];
            return Err(FormattedConfigError::new(move || {
                format!("Group {group} has a negative size ({size})")
            }));
        }

        let sum: usize = sizes.iter().map(|size| *size as usize).sum();
        if sum != total_rows {
            return Err(FormattedConfigError::new(move || {
                format!("Sum of group sizes ({sum}) must match M ({total_rows})")
            }));
        }

        Ok(Self { sizes })
    }

    pub fn num_groups(&self) -> usize {
        self.sizes.len()
    }

    /// Number of rows of `group`.
    pub fn size(&self, group: usize) -> usize {
        self.sizes[group] as usize
    }

}

/// Splits `m` rows into `num_groups` near-equal groups.
///
/// The remainder goes to the first groups, one extra row each.
pub fn balanced_group_sizes(m: usize, num_groups: usize) -> Vec<i32> {
    if num_groups == 0 {
        return Vec::new();
    }

    let base = m / num_groups;
    let remainder = m % num_groups;

    (0..num_groups)
        .map(|group| (base + usize::from(group < remainder)) as i32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zero_sized_groups() {
        let sizes = [3, 0, 4, 3];
        let group_sizes = GroupSizes::new(&sizes, 10).unwrap();

        assert_eq!(group_sizes.num_groups(), 4);
        assert_eq!(group_sizes.size(1), 0);
        assert_eq!(group_sizes.size(2), 4);
    }

    #[test]
    fn rejects_sum_mismatch() {
        let err = GroupSizes::new(&[3, 0, 4, 2], 10).unwrap_err();

        assert_eq!(err.to_string(), "Sum of group sizes (9) must match M (10)");
    }

    #[test]
    fn rejects_negative_size() {
        let err = GroupSizes::new(&[5, -1, 6], 10).unwrap_err();

        assert_eq!(err.to_string(), "Group 1 has a negative size (-1)");
    }

    #[test]
    fn balanced_split_gives_remainder_to_first_groups() {
        assert_eq!(balanced_group_sizes(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(balanced_group_sizes(8, 4), vec![2, 2, 2, 2]);
        assert_eq!(balanced_group_sizes(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(balanced_group_sizes(0, 3), vec![0, 0, 0]);
        assert!(balanced_group_sizes(5, 0).is_empty());
    }
}
