use crate::analyzer::{mean, median};
use crate::model::{BreakCluster, SupportBreak};
use crate::utils::days_between;

/// Splits the ordered break sequence into clusters.
///
/// A break stays in the current cluster while its gap to the previous break
/// is at most `max_gap_days`. Cluster ids are assigned in emission order.
pub fn cluster(breaks: &[SupportBreak], max_gap_days: u32) -> Vec<BreakCluster> {
    let mut groups: Vec<&[SupportBreak]> = Vec::new();
    let mut start = 0;

    for (i, brk) in breaks.iter().enumerate().skip(1) {
        let joins = brk.days_since.is_some_and(|gap| gap <= i64::from(max_gap_days));
        if !joins {
            groups.push(&breaks[start..i]);
            start = i;
        }
    }
    if start < breaks.len() {
        groups.push(&breaks[start..]);
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(id, group)| build_cluster(id, group))
        .collect()
}

fn build_cluster(id: usize, breaks: &[SupportBreak]) -> BreakCluster {
    let first = &breaks[0];
    let last = &breaks[breaks.len() - 1];

    // gaps of breaks 2..n; always present inside a cluster
    let gaps: Vec<i64> = breaks[1..].iter().filter_map(|b| b.days_since).collect();
    let gap_values: Vec<f64> = gaps.iter().map(|&g| g as f64).collect();

    let drops: Vec<f64> = breaks.iter().map(|b| b.drop_pct).collect();
    let total_drop: f64 = drops.iter().sum();

    BreakCluster {
        id,
        breaks: breaks.to_vec(),
        num_breaks: breaks.len(),
        start_date: first.date,
        end_date: last.date,
        duration_days: days_between(first.date, last.date),
        avg_gap: mean(&gap_values),
        min_gap: gaps.iter().copied().min(),
        max_gap: gaps.iter().copied().max(),
        total_drop,
        avg_drop: total_drop / breaks.len() as f64,
        median_drop: median(&drops).unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    /// Builds breaks at the given day offsets from 2024-01-01 with the given drops.
    fn breaks_at(offsets: &[i64], drops: &[f64]) -> Vec<SupportBreak> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut support = 100.0;
        offsets
            .iter()
            .zip(drops)
            .enumerate()
            .map(|(i, (&offset, &drop))| {
                let new_support = support * (1.0 - drop);
                let brk = SupportBreak {
                    date: start + Duration::days(offset),
                    prev_support: support,
                    new_support,
                    drop_pct: drop,
                    days_since: (i > 0).then(|| offset - offsets[i - 1]),
                };
                support = new_support;
                brk
            })
            .collect()
    }

    #[test]
    fn no_breaks_no_clusters() {
        assert!(cluster(&[], 10).is_empty());
    }

    #[test]
    fn close_breaks_group_and_distant_break_splits() {
        let breaks = breaks_at(&[0, 3, 33], &[0.05, 0.03, 0.04]);
        let clusters = cluster(&breaks, 10);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].id, 0);
        assert_eq!(clusters[0].num_breaks, 2);
        assert_eq!(clusters[0].duration_days, 3);
        assert_eq!(clusters[0].avg_gap, Some(3.0));
        assert_eq!(clusters[0].min_gap, Some(3));
        assert_eq!(clusters[0].max_gap, Some(3));
        assert!((clusters[0].total_drop - 0.08).abs() < 1e-12);
        assert!((clusters[0].avg_drop - 0.04).abs() < 1e-12);
        assert!((clusters[0].median_drop - 0.04).abs() < 1e-12);

        assert_eq!(clusters[1].id, 1);
        assert_eq!(clusters[1].num_breaks, 1);
        assert_eq!(clusters[1].duration_days, 0);
        assert_eq!(clusters[1].avg_gap, None);
        assert_eq!(clusters[1].min_gap, None);
        assert_eq!(clusters[1].start_date, clusters[1].end_date);
    }

    #[test]
    fn gap_equal_to_limit_stays_in_cluster() {
        let breaks = breaks_at(&[0, 10, 21], &[0.02, 0.02, 0.02]);
        let clusters = cluster(&breaks, 10);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].num_breaks, 2);
    }

    #[test]
    fn zero_gap_limit_isolates_every_break() {
        let breaks = breaks_at(&[0, 1, 2], &[0.02, 0.02, 0.02]);
        let clusters = cluster(&breaks, 0);
        assert_eq!(clusters.len(), 3);
        assert!(clusters.iter().all(|c| c.num_breaks == 1));
    }

    #[test]
    fn clusters_partition_the_break_sequence() {
        let offsets = [0, 2, 5, 20, 22, 60, 61, 62, 100];
        let drops = [0.02, 0.03, 0.05, 0.1, 0.02, 0.04, 0.03, 0.06, 0.02];
        let breaks = breaks_at(&offsets, &drops);
        let max_gap = 7;
        let clusters = cluster(&breaks, max_gap);

        let rebuilt: Vec<SupportBreak> = clusters.iter().flat_map(|c| c.breaks.clone()).collect();
        assert_eq!(rebuilt, breaks);

        for c in &clusters {
            assert_eq!(c.num_breaks, c.breaks.len());
            assert!(c.breaks[1..].iter().all(|b| b.days_since.unwrap() <= max_gap as i64));
        }
        for pair in clusters.windows(2) {
            let boundary = &pair[1].breaks[0];
            assert!(boundary.days_since.unwrap() > max_gap as i64);
        }
        assert_eq!(clusters.len(), 4);
        assert_eq!(clusters[2].min_gap, Some(1));
        assert_eq!(clusters[2].median_drop, 0.04);
    }

    #[test]
    fn even_cluster_median_averages_middle_drops() {
        let breaks = breaks_at(&[0, 1, 2, 3], &[0.02, 0.08, 0.04, 0.06]);
        let clusters = cluster(&breaks, 5);
        assert_eq!(clusters.len(), 1);
        assert!((clusters[0].median_drop - 0.05).abs() < 1e-12);
    }
}
