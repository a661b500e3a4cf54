/// `Vec::extend_no_dup`
pub trait VecExtendNoDup<T> {
    /// Extends the vector with the items of `iter` which it doesn't contain yet, keeping the
    /// first occurrence of each
    fn extend_no_dup(&mut self, iter: impl IntoIterator<Item = T>);
}

impl<T: PartialEq> VecExtendNoDup<T> for Vec<T> {
    fn extend_no_dup(&mut self, iter: impl IntoIterator<Item = T>) {
        for item in iter {
            if !self.contains(&item) {
                self.push(item);
            }
        }
    }
}

/// Items of `iter` without duplicates, in first-occurrence order. Scope lists are short, so this
/// is quadratic.
pub fn uniq<T: PartialEq>(iter: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut uniq = Vec::new();
    uniq.extend_no_dup(iter);
    uniq
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::misc::{uniq, VecExtendNoDup};

    #[test]
    pub fn keeps_first_occurrence() {
        let mut scopes = vec!["global", "a"];
        scopes.extend_no_dup(["b", "a", "global", "c", "b"]);
        assert_eq!(scopes, vec!["global", "a", "b", "c"]);
        assert_eq!(uniq([3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
