//! The published read model and the pure pipeline that produces it.
//!
//! [`build_timeline_view`] runs validation, bucket building, aggregation,
//! interpolation and scoring for all three scales in one pass. It has no
//! clock or other hidden inputs: `today` is passed in explicitly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregation::{aggregate_parent, aggregate_week};
use crate::bucket::{
    all_week_shells, build_month_shells, build_year_shells, month_shells_between,
    recent_weeks, retain_rendered_years, TimelineBucket,
};
use crate::config::TimelineConfig;
use crate::event::{partition_valid, HealthEvent};
use crate::interpolation::interpolate_buckets;
use crate::scale::{local_date, TimelineScale};
use crate::score::{apply_score, ScoreFunction};

// ---------------------------------------------------------------------------
// TimelineView
// ---------------------------------------------------------------------------

/// One immutable generation of bucket collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineView {
    /// Increments with every recomputation; not part of bucket identity.
    pub generation: u64,
    pub weeks: Vec<TimelineBucket>,
    pub months: Vec<TimelineBucket>,
    pub years: Vec<TimelineBucket>,
    pub score_version: Option<String>,
    /// Valid events that fed this generation.
    pub event_count: usize,
    /// Events dropped as malformed, out of range or duplicated.
    pub skipped_events: usize,
}

impl TimelineView {
    /// The "no data" view.
    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            weeks: Vec::new(),
            months: Vec::new(),
            years: Vec::new(),
            score_version: None,
            event_count: 0,
            skipped_events: 0,
        }
    }

    pub fn buckets(&self, scale: TimelineScale) -> &[TimelineBucket] {
        match scale {
            TimelineScale::Week => &self.weeks,
            TimelineScale::Month => &self.months,
            TimelineScale::Year => &self.years,
        }
    }

    pub fn find(&self, scale: TimelineScale, id: &str) -> Option<&TimelineBucket> {
        self.buckets(scale).iter().find(|b| b.id == id)
    }

    pub fn is_empty(&self) -> bool {
        TimelineScale::ALL
            .iter()
            .all(|scale| self.buckets(*scale).is_empty())
    }

    /// The most recent week bucket ("today").
    pub fn newest_week(&self) -> Option<&TimelineBucket> {
        self.weeks.last()
    }

    /// The bucket at `scale` containing `date`, or the closest one to it.
    ///
    /// Ties go to the earlier bucket.
    pub fn nearest(&self, scale: TimelineScale, date: NaiveDate) -> Option<&TimelineBucket> {
        self.buckets(scale)
            .iter()
            .min_by_key(|b| (b.distance_days(date), b.start_date))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Compute every scale's buckets from the full event set.
pub fn build_timeline_view(
    events: &[HealthEvent],
    config: &TimelineConfig,
    score_fn: Option<&ScoreFunction>,
    today: NaiveDate,
    generation: u64,
) -> TimelineView {
    let offset = config.offset();
    let validated = partition_valid(events, today, offset);
    let events = &validated.events;

    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return TimelineView {
            skipped_events: validated.skipped,
            score_version: score_fn.map(|f| f.version().to_string()),
            ..TimelineView::empty(generation)
        };
    };
    let first_date = local_date(first.timestamp, offset);
    let last_date = local_date(last.timestamp, offset);

    // Weeks: aggregate every data-bearing week, render the most recent.
    let mut all_weeks = all_week_shells(events, config);
    for week in &mut all_weeks {
        aggregate_week(week, events, config);
    }
    let mut weeks = recent_weeks(&all_weeks, config.recent_weeks).to_vec();

    // Months: aggregate and interpolate over the full span, then cut the
    // trailing window out of it so window edges see their real neighbours.
    let window = build_month_shells(weeks.first().map(|w| w.start_date), config);
    let series_first = window
        .first()
        .map_or(first_date, |m| m.start_date.min(first_date));
    let series_last = window
        .last()
        .map_or(last_date, |m| m.start_date.max(last_date));
    let mut month_series = month_shells_between(series_first, series_last);
    for month in &mut month_series {
        aggregate_parent(month, &all_weeks, events, config);
    }
    let observed_months = month_series.clone();
    interpolate_buckets(&mut month_series, config.max_interpolation_gap);
    let mut months: Vec<TimelineBucket> = window
        .iter()
        .filter_map(|shell| month_series.iter().find(|m| m.id == shell.id).cloned())
        .collect();

    // Years roll up observed (not interpolated) months.
    let mut years = build_year_shells(events, today, config);
    for year in &mut years {
        aggregate_parent(year, &observed_months, events, config);
    }
    let observed_years = years.clone();
    interpolate_buckets(&mut years, config.max_interpolation_gap);
    retain_rendered_years(&mut years, &observed_years, events, config);

    for bucket in weeks
        .iter_mut()
        .chain(months.iter_mut())
        .chain(years.iter_mut())
    {
        apply_score(
            &mut bucket.metrics,
            score_fn,
            config.high_confidence_threshold,
            &bucket.id,
        );
    }

    tracing::debug!(
        generation,
        events = events.len(),
        skipped = validated.skipped,
        weeks = weeks.len(),
        months = months.len(),
        years = years.len(),
        "Timeline view computed"
    );

    TimelineView {
        generation,
        weeks,
        months,
        years,
        score_version: score_fn.map(|f| f.version().to_string()),
        event_count: events.len(),
        skipped_events: validated.skipped,
    }
}

/// Data-bearing weeks starting before `before`, the newest `limit` of them,
/// oldest first.
///
/// These are the weeks that have scrolled out of the rendered zone. They
/// are aggregated and scored exactly like rendered weeks but are never
/// part of a published view.
pub fn build_weeks_before(
    events: &[HealthEvent],
    config: &TimelineConfig,
    score_fn: Option<&ScoreFunction>,
    today: NaiveDate,
    before: NaiveDate,
    limit: usize,
) -> Vec<TimelineBucket> {
    let validated = partition_valid(events, today, config.offset());
    let older: Vec<TimelineBucket> = all_week_shells(&validated.events, config)
        .into_iter()
        .filter(|week| week.start_date < before)
        .collect();

    let mut weeks = recent_weeks(&older, limit).to_vec();
    for week in &mut weeks {
        aggregate_week(week, &validated.events, config);
        apply_score(
            &mut week.metrics,
            score_fn,
            config.high_confidence_threshold,
            &week.id,
        );
    }
    weeks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::event::EventPayload;
    use crate::metrics::{BodyScoreCompleteness, MetricKind, MetricPresence, MetricValue};
    use crate::score::ScoreOutput;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2025, 10, 17)
    }

    fn ev(id: &str, y: i32, m: u32, d: u32, payload: EventPayload) -> HealthEvent {
        HealthEvent::new(id, Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap(), payload)
    }

    fn weight(id: &str, y: i32, m: u32, d: u32, kg: f64) -> HealthEvent {
        ev(id, y, m, d, EventPayload::Weight { kg })
    }

    fn dexa(id: &str, y: i32, m: u32, d: u32, ffmi: f64) -> HealthEvent {
        ev(
            id,
            y,
            m,
            d,
            EventPayload::Dexa {
                ffmi: Some(ffmi),
                lean_mass_kg: None,
                fat_mass_kg: None,
            },
        )
    }

    fn weight_and_fat_score() -> ScoreFunction {
        ScoreFunction::new(
            "test-v1",
            vec![MetricKind::Weight, MetricKind::BodyFat],
            |snapshot, _| {
                Ok(ScoreOutput {
                    score: snapshot.get(MetricKind::Weight).value.unwrap_or(0.0),
                    core_fields_used: vec![MetricKind::Weight],
                })
            },
        )
    }

    fn view(events: &[HealthEvent]) -> TimelineView {
        build_timeline_view(
            events,
            &TimelineConfig::default(),
            Some(&weight_and_fat_score()),
            today(),
            1,
        )
    }

    #[test]
    fn single_weight_event_scores_partial() {
        let v = view(&[weight("w", 2025, 10, 15, 80.0)]);
        assert_eq!(v.weeks.len(), 1);
        let week = &v.weeks[0];
        assert_eq!(week.metrics.get(MetricKind::Weight).presence, MetricPresence::Present);
        assert!(week.metrics.get(MetricKind::BodyFat).is_missing());
        assert_eq!(
            week.metrics.body_score_completeness,
            BodyScoreCompleteness::Partial
        );
    }

    #[test]
    fn no_events_yields_empty_view() {
        let v = view(&[]);
        assert!(v.is_empty());
        assert_eq!(v.event_count, 0);
    }

    #[test]
    fn only_malformed_events_yields_empty_view_with_skip_count() {
        let v = view(&[weight("bad", 2025, 10, 15, -3.0)]);
        assert!(v.is_empty());
        assert_eq!(v.skipped_events, 1);
    }

    #[test]
    fn dexa_gap_month_is_interpolated() {
        let events = vec![
            dexa("mar", 2025, 3, 12, 20.0),
            dexa("may", 2025, 5, 14, 22.0),
            weight("w1", 2025, 9, 22, 80.0),
            weight("w2", 2025, 9, 29, 80.0),
            weight("w3", 2025, 10, 6, 80.0),
            weight("w4", 2025, 10, 15, 80.0),
        ];
        let v = view(&events);
        let ffmi = |id: &str| v.find(TimelineScale::Month, id).unwrap().metrics.get(MetricKind::Ffmi);
        assert_eq!(ffmi("2025-03").presence, MetricPresence::Present);
        assert_eq!(ffmi("2025-04").presence, MetricPresence::Estimated);
        assert_eq!(ffmi("2025-04").value, Some(21.0));
        assert_eq!(ffmi("2025-05").presence, MetricPresence::Present);
    }

    #[test]
    fn always_six_trailing_months() {
        let v = view(&[weight("w", 2025, 10, 15, 80.0)]);
        let ids: Vec<&str> = v.months.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["2025-04", "2025-05", "2025-06", "2025-07", "2025-08", "2025-09"]
        );
        assert!(v.months.iter().all(|m| !m.metrics.has_any_value()));
    }

    #[test]
    fn photo_only_week() {
        let v = view(&[ev(
            "p",
            2025,
            10,
            15,
            EventPayload::Photo {
                photo_id: "photo-1".into(),
            },
        )]);
        let week = &v.weeks[0];
        assert!(week.metrics.has_photos_in_range);
        assert_eq!(week.metrics.canonical_photo_id.as_deref(), Some("photo-1"));
        assert!(!week.metrics.has_any_value());
        assert_eq!(
            week.metrics.body_score_completeness,
            BodyScoreCompleteness::None
        );
    }

    #[test]
    fn three_year_gap_is_not_bridged() {
        let events = vec![weight("a", 2019, 6, 1, 90.0), weight("b", 2023, 6, 1, 80.0)];
        let v = view(&events);
        let ids: Vec<&str> = v.years.iter().map(|y| y.id.as_str()).collect();
        assert_eq!(ids, vec!["2019", "2023"]);
    }

    #[test]
    fn two_year_gap_is_bridged() {
        let events = vec![weight("a", 2020, 6, 1, 90.0), weight("b", 2023, 6, 1, 84.0)];
        let v = view(&events);
        let ids: Vec<&str> = v.years.iter().map(|y| y.id.as_str()).collect();
        assert_eq!(ids, vec!["2020", "2021", "2022", "2023"]);
        let bridge = v.find(TimelineScale::Year, "2021").unwrap();
        assert!(bridge.bridge);
        let bridged = bridge.metrics.get(MetricKind::Weight).value.unwrap();
        assert!((bridged - 88.0).abs() < 1e-9);
        assert!(!v.find(TimelineScale::Year, "2023").unwrap().bridge);
    }

    #[test]
    fn recomputation_is_byte_identical() {
        let events = vec![
            weight("a", 2024, 2, 1, 90.0),
            dexa("d", 2025, 3, 12, 20.0),
            weight("b", 2025, 10, 15, 80.0),
        ];
        let mut shuffled = events.clone();
        shuffled.reverse();
        let first = serde_json::to_vec(&view(&events)).unwrap();
        let second = serde_json::to_vec(&view(&shuffled)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nearest_prefers_containing_bucket() {
        let events = vec![weight("a", 2025, 9, 1, 80.0), weight("b", 2025, 10, 15, 80.0)];
        let v = view(&events);
        let hit = v.nearest(TimelineScale::Week, date(2025, 10, 16)).unwrap();
        assert_eq!(hit.id, "2025-W42");
        let near = v.nearest(TimelineScale::Week, date(2025, 9, 10)).unwrap();
        assert_eq!(near.id, "2025-W36");
    }

    #[test]
    fn older_weeks_are_derived_on_demand() {
        let dates = [(8, 4), (8, 11), (8, 18), (9, 22), (9, 29), (10, 6), (10, 15)];
        let events: Vec<HealthEvent> = dates
            .iter()
            .enumerate()
            .map(|(i, (m, d))| weight(&format!("w{i}"), 2025, *m, *d, 80.0))
            .collect();
        let v = view(&events);
        let oldest_rendered = v.weeks[0].start_date;
        assert_eq!(v.weeks[0].id, "2025-W39");

        let older = build_weeks_before(
            &events,
            &TimelineConfig::default(),
            Some(&weight_and_fat_score()),
            today(),
            oldest_rendered,
            2,
        );
        let ids: Vec<&str> = older.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["2025-W33", "2025-W34"]);
        assert_eq!(
            older[1].metrics.get(MetricKind::Weight).presence,
            MetricPresence::Present
        );
        assert_eq!(older[1].metrics.body_score, Some(80.0));
    }

    #[test]
    fn dexa_only_months_interpolate_between_scans() {
        let config = TimelineConfig::default();
        let events = vec![dexa("mar", 2025, 3, 12, 20.0), dexa("may", 2025, 5, 14, 22.0)];
        let mut weeks = all_week_shells(&events, &config);
        for week in &mut weeks {
            aggregate_week(week, &events, &config);
        }
        let mut months = month_shells_between(date(2025, 3, 12), date(2025, 5, 14));
        for month in &mut months {
            aggregate_parent(month, &weeks, &events, &config);
        }

        interpolate_buckets(&mut months, config.max_interpolation_gap);

        let ffmi: Vec<MetricValue> = months.iter().map(|m| m.metrics.get(MetricKind::Ffmi)).collect();
        assert_eq!(ffmi[0], MetricValue::present(20.0));
        assert_eq!(ffmi[1].presence, MetricPresence::Estimated);
        assert_eq!(ffmi[1].value, Some(21.0));
        assert_eq!(ffmi[2], MetricValue::present(22.0));
    }

    #[test]
    fn adding_events_never_downgrades_presence() {
        let mut events = vec![
            weight("mar", 2025, 3, 5, 80.0),
            weight("jun", 2025, 6, 5, 84.0),
            weight("w1", 2025, 9, 22, 82.0),
            weight("w2", 2025, 9, 29, 82.0),
            weight("w3", 2025, 10, 6, 81.0),
            weight("w4", 2025, 10, 15, 81.0),
            dexa("dexa", 2024, 11, 20, 19.5),
        ];
        let before = view(&events);

        events.push(weight("apr", 2025, 4, 15, 81.0));
        events.push(weight("aug", 2025, 8, 20, 83.0));
        let after = view(&events);

        for scale in [TimelineScale::Week, TimelineScale::Month, TimelineScale::Year] {
            for old in before.buckets(scale) {
                let Some(new) = after.find(scale, &old.id) else {
                    continue;
                };
                for metric in MetricKind::ALL {
                    if !old.metrics.get(metric).is_missing() {
                        assert!(
                            !new.metrics.get(metric).is_missing(),
                            "{} {metric:?} went missing",
                            old.id
                        );
                    }
                }
            }
        }
    }

    fn steps(id: &str, y: i32, m: u32, d: u32, count: u32) -> HealthEvent {
        ev(id, y, m, d, EventPayload::Steps { count })
    }

    #[test]
    fn earliest_event_year_renders_without_usable_values() {
        let events = vec![
            steps("s1", 2023, 3, 6, 4_000),
            steps("s2", 2023, 3, 7, 5_000),
            weight("w", 2025, 10, 15, 80.0),
        ];
        let v = view(&events);

        let ids: Vec<&str> = v.years.iter().map(|y| y.id.as_str()).collect();
        assert_eq!(ids, vec!["2023", "2025"]);
        assert!(!v.years[0].bridge);
    }

    #[test]
    fn year_with_only_estimates_is_not_a_bridge() {
        let events = vec![
            weight("w", 2023, 12, 28, 80.0),
            steps("s1", 2024, 1, 2, 6_000),
            steps("s2", 2024, 1, 3, 6_000),
            steps("s3", 2024, 1, 4, 6_000),
            steps("s4", 2024, 1, 5, 6_000),
        ];
        let v = view(&events);

        let year = v.find(TimelineScale::Year, "2024").unwrap();
        assert!(!year.bridge);
        assert!(v.years.iter().all(|y| !y.bridge));
    }

    #[test]
    fn cursor_on_earliest_year_week_snaps_to_that_year() {
        let events = vec![
            steps("s1", 2023, 3, 6, 4_000),
            steps("s2", 2023, 3, 7, 5_000),
            weight("w", 2025, 10, 15, 80.0),
        ];
        let v = view(&events);

        let nearest = v.nearest(TimelineScale::Year, date(2023, 3, 6)).unwrap();
        assert_eq!(nearest.id, "2023");
    }
}
