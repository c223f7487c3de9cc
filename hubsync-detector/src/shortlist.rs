//! "Most recently pushed" shortlist.

use hubsync_core::Fork;

/// Top `count` forks by `pushed_at`, newest first. The upstream repository
/// and forks without a push time are dropped. Ties keep input order.
pub fn shortlist(forks: &[Fork], upstream: &str, count: usize) -> Vec<Fork> {
    let mut candidates: Vec<&Fork> = forks
        .iter()
        .filter(|f| f.pushed_at.is_some())
        .filter(|f| !f.full_name.same_repository(upstream))
        .collect();
    candidates.sort_by(|a, b| b.pushed_at.cmp(&a.pushed_at));
    candidates.into_iter().take(count).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hubsync_core::ForkName;

    fn fork(name: &str, day: Option<u32>) -> Fork {
        Fork {
            full_name: ForkName::from(name),
            clone_url: String::new(),
            pushed_at: day.map(|d| Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()),
            default_branch: "main".to_string(),
        }
    }

    #[test]
    fn newest_first_limited_to_count() {
        let forks = vec![
            fork("a/x", Some(1)),
            fork("b/x", Some(9)),
            fork("c/x", None),
            fork("d/x", Some(5)),
            fork("Up/X", Some(20)),
        ];
        let names: Vec<_> = shortlist(&forks, "up/x", 2)
            .into_iter()
            .map(|f| f.full_name.0)
            .collect();
        assert_eq!(names, vec!["b/x", "d/x"]);
    }

    #[test]
    fn count_larger_than_input() {
        let forks = vec![fork("a/x", Some(1))];
        assert_eq!(shortlist(&forks, "up/x", 10).len(), 1);
        assert!(shortlist(&[], "up/x", 5).is_empty());
    }
}
