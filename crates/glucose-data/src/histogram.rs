//! Time-of-day frequency histograms for insulin doses and carb entries.
//!
//! Every histogram goes through the same two steps: count events per
//! floored time-of-day, then reindex the sparse counts onto the dense
//! bucket grid so absent buckets read as zero.

use std::collections::BTreeMap;

use chrono::NaiveTime;
use glucose_core::models::{BucketCount, CarbEvent, InsulinEvent, InsulinSubtype, Timestamped};
use glucose_core::policy::PolicyConfig;
use glucose_core::time_utils::{floor_time_of_day, BucketSize, BucketSpec};
use serde::Serialize;
use tracing::debug;

pub const LONG_ACTING_TITLE: &str = "Frequency of Long Acting Insulin Dose Time";
pub const FAST_ACTING_TITLE: &str = "Frequency of Fast Acting Insulin Dose Time";
pub const MEAL_TITLE: &str = "Frequency of Meal or Snack Time";

// ── Histogram ─────────────────────────────────────────────────────────────────

/// A dense time-of-day histogram, one row per grid point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Histogram {
    pub title: String,
    pub bucket_size: BucketSize,
    pub buckets: Vec<BucketCount>,
    /// Events that passed every filter and were offered to the grid.
    pub contributing: usize,
}

impl Histogram {
    /// Sum of all bucket counts.
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| u64::from(b.count)).sum()
    }

    /// Largest single bucket count (0 for an all-zero histogram).
    pub fn max_count(&self) -> u32 {
        self.buckets.iter().map(|b| b.count).max().unwrap_or(0)
    }
}

// ── Dense reindexing ──────────────────────────────────────────────────────────

/// Merge a sparse count mapping onto an ordered key domain.
///
/// The output follows `domain` exactly, with `0` for keys absent from
/// `sparse`. Keys in `sparse` outside `domain` are dropped.
pub fn dense_reindex<K: Ord + Copy>(sparse: &BTreeMap<K, u32>, domain: &[K]) -> Vec<(K, u32)> {
    domain
        .iter()
        .map(|key| (*key, sparse.get(key).copied().unwrap_or(0)))
        .collect()
}

// ── Bucketizer ────────────────────────────────────────────────────────────────

/// Count events per floored time-of-day. The date is discarded.
pub fn count_by_time_of_day<'a, E>(
    events: impl IntoIterator<Item = &'a E>,
    bucket_size: BucketSize,
) -> BTreeMap<NaiveTime, u32>
where
    E: Timestamped + 'a,
{
    let mut counts: BTreeMap<NaiveTime, u32> = BTreeMap::new();
    for event in events {
        *counts
            .entry(floor_time_of_day(event.datetime(), bucket_size))
            .or_insert(0) += 1;
    }
    counts
}

/// Floor, count and densify `events` onto the grid of `spec`.
///
/// Returns one row per grid point (`spec.periods` for a valid spec), ascending.
pub fn bucketize<'a, E>(
    events: impl IntoIterator<Item = &'a E>,
    spec: &BucketSpec,
) -> Vec<BucketCount>
where
    E: Timestamped + 'a,
{
    let sparse = count_by_time_of_day(events, spec.bucket_size);
    let grid = spec.grid();

    let dense: Vec<BucketCount> = dense_reindex(&sparse, &grid)
        .into_iter()
        .map(|(time_of_day, count)| BucketCount { time_of_day, count })
        .collect();

    let offered: u64 = sparse.values().map(|c| u64::from(*c)).sum();
    let placed: u64 = sparse
        .iter()
        .filter(|(k, _)| grid.contains(k))
        .map(|(_, c)| u64::from(*c))
        .sum();
    if placed < offered {
        debug!(
            "{} events fell outside the {}-bucket grid and were not counted",
            offered - placed,
            grid.len()
        );
    }

    dense
}

/// Build a titled [`Histogram`] from already-filtered events.
pub fn histogram<'a, E>(title: &str, events: &[&'a E], spec: &BucketSpec) -> Histogram
where
    E: Timestamped + 'a,
{
    Histogram {
        title: title.to_string(),
        bucket_size: spec.bucket_size,
        buckets: bucketize(events.iter().copied(), spec),
        contributing: events.len(),
    }
}

// ── Filters ───────────────────────────────────────────────────────────────────

/// Carb entries that count as meals: at least `min_grams` grams.
///
/// Entries with a blank gram cell never pass.
pub fn filter_meals(carbs: &[CarbEvent], min_grams: f64) -> Vec<&CarbEvent> {
    carbs
        .iter()
        .filter(|c| c.grams.is_some_and(|g| g >= min_grams))
        .collect()
}

/// Doses whose subtype matches `subtype` exactly.
pub fn select_subtype<'a>(
    doses: &'a [InsulinEvent],
    subtype: &InsulinSubtype,
) -> Vec<&'a InsulinEvent> {
    doses.iter().filter(|d| &d.subtype == subtype).collect()
}

/// Drop doses below `min_units`. With no minimum every dose is kept.
pub fn filter_min_units(doses: Vec<&InsulinEvent>, min_units: Option<f64>) -> Vec<&InsulinEvent> {
    match min_units {
        None => doses,
        Some(min) => doses
            .into_iter()
            .filter(|d| d.units.is_some_and(|u| u >= min))
            .collect(),
    }
}

// ── Category histograms ───────────────────────────────────────────────────────

/// Long- and fast-acting dose histograms over disjoint subsets of the
/// insulin view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsulinHistograms {
    pub long_acting: Histogram,
    pub fast_acting: Histogram,
}

pub fn insulin_histograms(
    insulin: &[InsulinEvent],
    spec: &BucketSpec,
    policy: &PolicyConfig,
) -> InsulinHistograms {
    let long = select_subtype(insulin, &InsulinSubtype::LongActing);
    let fast = filter_min_units(
        select_subtype(insulin, &InsulinSubtype::FastActing),
        policy.min_fast_acting_units,
    );

    debug!(
        "Insulin: {} long-acting, {} fast-acting, {} other subtype",
        long.len(),
        fast.len(),
        insulin
            .iter()
            .filter(|d| matches!(d.subtype, InsulinSubtype::Other(_)))
            .count()
    );

    InsulinHistograms {
        long_acting: histogram(LONG_ACTING_TITLE, &long, spec),
        fast_acting: histogram(FAST_ACTING_TITLE, &fast, spec),
    }
}

pub fn carb_histogram(carbs: &[CarbEvent], spec: &BucketSpec, policy: &PolicyConfig) -> Histogram {
    let meals = filter_meals(carbs, policy.min_carb_grams);
    debug!(
        "Carbs: {} of {} entries at or above {}g",
        meals.len(),
        carbs.len(),
        policy.min_carb_grams
    );
    histogram(MEAL_TITLE, &meals, spec)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn dose(day: u32, h: u32, m: u32, subtype: InsulinSubtype, units: f64) -> InsulinEvent {
        InsulinEvent {
            datetime: at(day, h, m),
            subtype,
            units: Some(units),
        }
    }

    fn carb(h: u32, m: u32, grams: Option<f64>) -> CarbEvent {
        CarbEvent {
            datetime: at(1, h, m),
            grams,
        }
    }

    fn half_hours() -> BucketSpec {
        BucketSpec::new(48, "30min".parse().unwrap())
    }

    fn count_at(h: &Histogram, t: NaiveTime) -> u32 {
        h.buckets
            .iter()
            .find(|b| b.time_of_day == t)
            .map(|b| b.count)
            .unwrap()
    }

    // ── dense_reindex ─────────────────────────────────────────────────────────

    #[test]
    fn test_dense_reindex_fills_missing_with_zero() {
        let sparse: BTreeMap<u32, u32> = [(2, 5), (4, 1)].into_iter().collect();
        assert_eq!(
            dense_reindex(&sparse, &[0, 1, 2, 3, 4]),
            vec![(0, 0), (1, 0), (2, 5), (3, 0), (4, 1)]
        );
    }

    #[test]
    fn test_dense_reindex_drops_keys_outside_domain() {
        let sparse: BTreeMap<u32, u32> = [(1, 2), (9, 7)].into_iter().collect();
        assert_eq!(dense_reindex(&sparse, &[0, 1]), vec![(0, 0), (1, 2)]);
    }

    // ── bucketize ─────────────────────────────────────────────────────────────

    #[test]
    fn test_fast_acting_example() {
        let doses = vec![
            dose(1, 8, 5, InsulinSubtype::FastActing, 4.0),
            dose(1, 8, 35, InsulinSubtype::FastActing, 1.0),
        ];
        let hists = insulin_histograms(&doses, &half_hours(), &PolicyConfig::default());
        let fast = &hists.fast_acting;

        assert_eq!(fast.buckets.len(), 48);
        assert_eq!(count_at(fast, hm(8, 0)), 1);
        assert_eq!(count_at(fast, hm(8, 30)), 1);
        assert_eq!(fast.buckets.iter().filter(|b| b.count == 0).count(), 46);
        assert_eq!(hists.long_acting.total(), 0);
    }

    #[test]
    fn test_grid_is_exact_regardless_of_input() {
        let doses = vec![
            dose(3, 23, 59, InsulinSubtype::LongActing, 20.0),
            dose(1, 0, 1, InsulinSubtype::LongActing, 20.0),
        ];
        let spec = half_hours();
        let buckets = bucketize(doses.iter(), &spec);

        let keys: Vec<NaiveTime> = buckets.iter().map(|b| b.time_of_day).collect();
        assert_eq!(keys, spec.grid());
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[47].count, 1);
    }

    #[test]
    fn test_same_time_on_different_days_shares_bucket() {
        let doses = vec![
            dose(1, 22, 0, InsulinSubtype::LongActing, 20.0),
            dose(2, 22, 10, InsulinSubtype::LongActing, 20.0),
            dose(3, 22, 29, InsulinSubtype::LongActing, 20.0),
        ];
        let buckets = bucketize(doses.iter(), &half_hours());
        let at_22 = buckets.iter().find(|b| b.time_of_day == hm(22, 0)).unwrap();
        assert_eq!(at_22.count, 3);
    }

    #[test]
    fn test_counting_is_conservative() {
        let doses: Vec<InsulinEvent> = (0..24)
            .flat_map(|h| {
                (0..60).step_by(7).map(move |m| dose(1, h, m, InsulinSubtype::FastActing, 2.0))
            })
            .collect();
        let buckets = bucketize(doses.iter(), &half_hours());
        let total: u32 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total as usize, doses.len());
    }

    #[test]
    fn test_empty_input_yields_all_zero_grid() {
        let doses: Vec<InsulinEvent> = Vec::new();
        let buckets = bucketize(doses.iter(), &BucketSpec::new(24, "1h".parse().unwrap()));
        assert_eq!(buckets.len(), 24);
        assert!(buckets.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_short_grid_drops_events_past_its_end() {
        let doses = vec![
            dose(1, 1, 0, InsulinSubtype::FastActing, 2.0),
            dose(1, 20, 0, InsulinSubtype::FastActing, 2.0),
        ];
        let spec = BucketSpec::new(12, "1h".parse().unwrap());
        let buckets = bucketize(doses.iter(), &spec);
        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<u32>(), 1);
    }

    // ── subtypes ──────────────────────────────────────────────────────────────

    #[test]
    fn test_subtypes_are_disjoint() {
        let doses = vec![
            dose(1, 7, 0, InsulinSubtype::FastActing, 5.0),
            dose(1, 22, 0, InsulinSubtype::LongActing, 20.0),
            dose(1, 12, 0, InsulinSubtype::Other("Mixed".to_string()), 5.0),
        ];
        let hists = insulin_histograms(&doses, &half_hours(), &PolicyConfig::default());
        assert_eq!(hists.fast_acting.total(), 1);
        assert_eq!(hists.long_acting.total(), 1);
        assert_eq!(count_at(&hists.long_acting, hm(22, 0)), 1);
    }

    #[test]
    fn test_fast_acting_minimum_units() {
        let doses = vec![
            dose(1, 7, 0, InsulinSubtype::FastActing, 5.0),
            dose(1, 7, 10, InsulinSubtype::FastActing, 1.0),
            InsulinEvent {
                datetime: at(1, 7, 20),
                subtype: InsulinSubtype::FastActing,
                units: None,
            },
        ];
        let policy = PolicyConfig {
            min_fast_acting_units: Some(2.0),
            ..Default::default()
        };
        let hists = insulin_histograms(&doses, &half_hours(), &policy);
        assert_eq!(hists.fast_acting.contributing, 1);
        assert_eq!(count_at(&hists.fast_acting, hm(7, 0)), 1);

        let all = insulin_histograms(&doses, &half_hours(), &PolicyConfig::default());
        assert_eq!(all.fast_acting.total(), 3);
    }

    // ── carbs ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_carb_threshold_example() {
        let carbs = vec![carb(12, 5, Some(3.0)), carb(12, 10, Some(10.0))];
        let hist = carb_histogram(&carbs, &half_hours(), &PolicyConfig::default());

        assert_eq!(count_at(&hist, hm(12, 0)), 1);
        assert_eq!(hist.contributing, 1);
        assert_eq!(hist.total(), 1);
    }

    #[test]
    fn test_carb_threshold_is_inclusive_and_skips_blank() {
        let carbs = vec![
            carb(8, 0, Some(5.0)),
            carb(8, 1, Some(4.99)),
            carb(8, 2, None),
        ];
        let meals = filter_meals(&carbs, 5.0);
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].grams, Some(5.0));
    }

    #[test]
    fn test_histogram_helpers() {
        let carbs = vec![
            carb(8, 0, Some(20.0)),
            carb(8, 10, Some(20.0)),
            carb(19, 0, Some(50.0)),
        ];
        let hist = carb_histogram(&carbs, &half_hours(), &PolicyConfig::default());
        assert_eq!(hist.total(), 3);
        assert_eq!(hist.max_count(), 2);
        assert_eq!(hist.title, MEAL_TITLE);
    }
}
