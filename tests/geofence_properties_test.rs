use proptest::prelude::*;
use recycle_xp::core::classification::{normalize_predictions, reward_points};
use recycle_xp::core::geofence::{evaluate, haversine_distance, NO_ZONES_MESSAGE};
use recycle_xp::domain::model::{Coordinate, RecyclingZone};
use serde_json::json;

fn coordinate() -> impl Strategy<Value = Coordinate> {
    (-80.0f64..80.0, -179.0f64..179.0).prop_map(|(lat, lon)| Coordinate::new(lat, lon))
}

fn zone(index: usize) -> impl Strategy<Value = RecyclingZone> {
    (coordinate(), 1.0f64..5_000.0, any::<bool>()).prop_map(move |(center, radius, active)| {
        let zone = RecyclingZone::new(
            index.to_string(),
            format!("Zone {}", index),
            center.latitude,
            center.longitude,
        )
        .with_radius(radius);
        if active {
            zone
        } else {
            zone.inactive()
        }
    })
}

fn zone_lists() -> impl Strategy<Value = Vec<RecyclingZone>> {
    (0usize..6).prop_flat_map(|n| (0..n).map(zone).collect::<Vec<_>>())
}

proptest! {
    #[test]
    fn distance_is_symmetric_and_non_negative(a in coordinate(), b in coordinate()) {
        let ab = haversine_distance(a, b);
        let ba = haversine_distance(b, a);
        prop_assert!(ab >= 0.0);
        prop_assert!((ab - ba).abs() < 1e-6);
        prop_assert!(haversine_distance(a, a).abs() < 1e-9);
    }

    #[test]
    fn inside_means_some_active_zone_contains_the_point(
        point in coordinate(),
        zones in zone_lists(),
    ) {
        let verdict = evaluate(point, &zones);

        if verdict.is_inside {
            let id = verdict.matched_zone_id.clone().unwrap();
            let matched = zones.iter().find(|z| z.id == id).unwrap();
            prop_assert!(matched.active);
            prop_assert!(haversine_distance(point, matched.center()) <= matched.radius_meters);

            // first match wins: no earlier active zone contained the point
            for earlier in zones.iter().take_while(|z| z.id != id) {
                prop_assert!(
                    !earlier.active
                        || haversine_distance(point, earlier.center()) > earlier.radius_meters
                );
            }
        } else {
            prop_assert!(verdict.matched_zone_id.is_none());
            for zone in zones.iter().filter(|z| z.active) {
                prop_assert!(haversine_distance(point, zone.center()) > zone.radius_meters);
            }
        }
    }

    #[test]
    fn reported_nearest_zone_is_the_closest_active_one(
        point in coordinate(),
        zones in zone_lists(),
    ) {
        let verdict = evaluate(point, &zones);
        let active: Vec<&RecyclingZone> = zones.iter().filter(|z| z.active).collect();

        if active.is_empty() {
            prop_assert!(!verdict.is_inside);
            prop_assert_eq!(verdict.message.as_str(), NO_ZONES_MESSAGE);
            prop_assert!(verdict.nearest_zone_name.is_none());
        } else if !verdict.is_inside {
            let reported = verdict.distance_meters.unwrap();
            let minimum = active
                .iter()
                .map(|z| haversine_distance(point, z.center()))
                .fold(f64::INFINITY, f64::min);
            prop_assert!((reported - minimum).abs() < 1e-6);
        }
    }

    #[test]
    fn boundary_is_inclusive(center in coordinate(), radius in 10.0f64..2_000.0) {
        let zone = RecyclingZone::new("b", "Boundary", center.latitude, center.longitude)
            .with_radius(radius);

        // Move due north by slightly less than the radius
        let inside_lat = center.latitude + ((radius - 0.01) / 6_371_000.0).to_degrees();
        let verdict = evaluate(Coordinate::new(inside_lat, center.longitude), &[zone.clone()]);
        prop_assert!(verdict.is_inside);

        let outside_lat = center.latitude + ((radius + 0.5) / 6_371_000.0).to_degrees();
        let verdict = evaluate(Coordinate::new(outside_lat, center.longitude), &[zone]);
        prop_assert!(!verdict.is_inside);
    }

    #[test]
    fn point_exactly_on_the_radius_is_inside(center in coordinate(), point in coordinate()) {
        let radius = haversine_distance(point, center);
        prop_assume!(radius > 0.0);
        let zone = RecyclingZone::new("edge", "Edge", center.latitude, center.longitude)
            .with_radius(radius);

        let verdict = evaluate(point, &[zone]);
        prop_assert!(verdict.is_inside);
        prop_assert_eq!(verdict.distance_meters, Some(radius));
    }

    #[test]
    fn matched_distance_reproduces_haversine(
        center in coordinate(),
        radius in 1.0f64..5_000.0,
        fraction in 0.0f64..1.0,
        bearing_east in any::<bool>(),
    ) {
        let zone = RecyclingZone::new("z", "Zone", center.latitude, center.longitude)
            .with_radius(radius);
        let offset = (fraction * radius / 6_371_000.0).to_degrees();
        let point = if bearing_east {
            Coordinate::new(center.latitude, center.longitude + offset)
        } else {
            Coordinate::new(center.latitude + offset, center.longitude)
        };

        let verdict = evaluate(point, &[zone.clone()]);
        prop_assert!(verdict.is_inside);

        let expected = haversine_distance(point, zone.center());
        let reported = verdict.distance_meters.unwrap();
        prop_assert!((reported - expected).abs() <= 1e-6 * expected.max(1.0));
    }

    #[test]
    fn points_are_monotonic_and_bounded(
        a in 0.0f64..=1.0,
        b in 0.0f64..=1.0,
        scale in 0.0f64..100.0,
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(reward_points(low, scale) <= reward_points(high, scale));
        prop_assert!(f64::from(reward_points(high, scale)) <= scale.round());
    }

    #[test]
    fn normalized_predictions_are_sorted_and_clamped(
        scores in proptest::collection::vec(-1.0f64..2.0, 0..8)
    ) {
        let body = json!(scores
            .iter()
            .enumerate()
            .map(|(i, s)| json!({"class": format!("m{}", i), "confidence": s}))
            .collect::<Vec<_>>());

        let predictions = normalize_predictions(&body);
        prop_assert_eq!(predictions.len(), scores.len());
        for pair in predictions.windows(2) {
            prop_assert!(pair[0].confidence >= pair[1].confidence);
        }
        for p in &predictions {
            prop_assert!((0.0..=1.0).contains(&p.confidence));
        }
    }
}
