use std::cmp::Ordering;

use crate::profile::{Profile, RatingMetric};

/// Display order: lobbies grouped (highest id first), resolved before
/// failed, then `metric` high to low, then id high to low.
pub fn compare_profiles(a: &Profile, b: &Profile, metric: RatingMetric) -> Ordering {
    b.lobby_id
        .cmp(&a.lobby_id)
        .then_with(|| b.succeeded.cmp(&a.succeeded))
        .then_with(|| b.rating(metric).total_cmp(&a.rating(metric)))
        .then_with(|| b.id.cmp(&a.id))
}

pub fn sort_profiles(profiles: &mut [Profile], metric: RatingMetric) {
    profiles.sort_by(|a, b| compare_profiles(a, b, metric));
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::profile::Candidate;

    fn profile(id: u64, lobby: u32, ok: bool, leetify: f64) -> Profile {
        let mut p = Profile::unresolved(&Candidate::new(id, DateTime::<Utc>::UNIX_EPOCH));
        p.lobby_id = lobby;
        p.succeeded = ok;
        if ok {
            p.ratings.insert(RatingMetric::Leetify, leetify);
        }
        p
    }

    fn ids(ps: &[Profile]) -> Vec<u64> {
        ps.iter().map(|p| p.id).collect()
    }

    #[test]
    fn lobbies_stay_contiguous() {
        let mut ps = vec![
            profile(1, 1, true, 0.5),
            profile(2, 0, true, 9.0),
            profile(3, 2, true, 0.1),
            profile(4, 1, true, 0.2),
            profile(5, 2, true, 0.3),
        ];
        sort_profiles(&mut ps, RatingMetric::Leetify);
        assert_eq!(ids(&ps), vec![5, 3, 1, 4, 2]);
    }

    #[test]
    fn failed_sorts_after_resolved_in_same_lobby() {
        let mut ps = vec![
            profile(10, 1, false, 0.0),
            profile(11, 1, true, -3.0),
            profile(12, 1, true, 1.0),
        ];
        sort_profiles(&mut ps, RatingMetric::Leetify);
        assert_eq!(ids(&ps), vec![12, 11, 10]);
    }

    #[test]
    fn equal_ratings_break_on_id() {
        let mut ps = vec![profile(7, 0, true, 1.0), profile(9, 0, true, 1.0), profile(8, 0, true, 1.0)];
        sort_profiles(&mut ps, RatingMetric::Leetify);
        assert_eq!(ids(&ps), vec![9, 8, 7]);
    }

    #[test]
    fn configured_metric_drives_order() {
        let mut a = profile(1, 0, true, 0.0);
        let mut b = profile(2, 0, true, 0.0);
        a.ratings.insert(RatingMetric::Aim, 90.0);
        b.ratings.insert(RatingMetric::Aim, 40.0);
        let mut ps = vec![b, a];
        sort_profiles(&mut ps, RatingMetric::Aim);
        assert_eq!(ids(&ps), vec![1, 2]);
    }

    #[test]
    fn distinct_profiles_never_compare_equal() {
        let ps = [profile(1, 0, true, 0.0), profile(2, 0, true, 0.0)];
        assert_ne!(compare_profiles(&ps[0], &ps[1], RatingMetric::Leetify), Ordering::Equal);
    }
}
