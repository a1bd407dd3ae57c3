#![allow(missing_docs)]


use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tracking::{Coordinate, RouteOutcome, RoutePlanner};

use self::provider::MockProvider;

const PICKUP: Coordinate = Coordinate::new(-36.8442, 174.7681);
const DROPOFF: Coordinate = Coordinate::new(-36.878, 174.7456);

fn planner(provider: &MockProvider) -> RoutePlanner<MockProvider> {
    RoutePlanner::new(Arc::new(provider.clone()), 25.0, Duration::from_secs(2))
}

// Should store provider geometry as (lat, lon), never (lon, lat).
#[tokio::test]
async fn geometry_transposed() {
    let provider = MockProvider::with_status("GOING_TO_PICKUP");

    let route = planner(&provider).compute_route(PICKUP, DROPOFF).await.expect("should route");

    // first pair in the fixture is [174.7681, -36.8442]
    assert_eq!(route.points[0], Coordinate::new(-36.8442, 174.7681));
    assert_eq!(route.points[1], Coordinate::new(-36.8571, 174.7612));
    assert_eq!(route.anchors.origin, PICKUP);
    assert_eq!(route.anchors.destination, DROPOFF);

    let request = &provider.requests_to("directions")[0];
    assert_eq!(request.param("start").as_deref(), Some("-36.8442,174.7681"));
    assert_eq!(request.param("end").as_deref(), Some("-36.878,174.7456"));
}

// Should issue one request for two samples inside the debounce radius.
#[tokio::test]
async fn debounced_jitter() {
    let provider = MockProvider::with_status("PICKED_UP");
    let planner = planner(&provider);

    // roughly 3m apart
    let first = Coordinate::new(-36.85, 174.765);
    let second = Coordinate::new(-36.85002, 174.76502);

    assert_eq!(planner.recompute(first, DROPOFF).await, RouteOutcome::Updated);
    assert_eq!(planner.recompute(second, DROPOFF).await, RouteOutcome::Debounced);
    assert_eq!(provider.requests_to("directions").len(), 1);
}

// Should recompute once the origin leaves the debounce radius.
#[tokio::test]
async fn recompute_on_move() {
    let provider = MockProvider::with_status("PICKED_UP");
    let planner = planner(&provider);

    planner.recompute(Coordinate::new(-36.85, 174.765), DROPOFF).await;
    let outcome = planner.recompute(Coordinate::new(-36.86, 174.76), DROPOFF).await;

    assert_eq!(outcome, RouteOutcome::Updated);
    assert_eq!(provider.requests_to("directions").len(), 2);
    let current = planner.current().expect("should have route");
    assert_eq!(current.anchors.origin, Coordinate::new(-36.86, 174.76));
}

// Should recompute for a new destination even if the origin has not moved.
#[tokio::test]
async fn recompute_on_destination_change() {
    let provider = MockProvider::with_status("GOING_TO_PICKUP");
    let planner = planner(&provider);
    let origin = Coordinate::new(-36.85, 174.765);

    planner.recompute(origin, PICKUP).await;
    let outcome = planner.recompute(origin, DROPOFF).await;

    assert_eq!(outcome, RouteOutcome::Updated);
    assert_eq!(provider.requests_to("directions").len(), 2);
}

// Should keep the last good route when the provider fails, and retry on the next sample.
#[tokio::test]
async fn failure_keeps_last_route() {
    let provider = MockProvider::with_status("PICKED_UP");
    let planner = planner(&provider);
    let origin = Coordinate::new(-36.85, 174.765);

    planner.recompute(origin, DROPOFF).await;
    let good = planner.current().expect("should have route");

    provider.fail("directions", 1);
    let moved = Coordinate::new(-36.86, 174.76);
    assert_eq!(planner.recompute(moved, DROPOFF).await, RouteOutcome::Failed);
    assert_eq!(planner.current(), Some(good));

    // same origin again is not debounced after a failure
    assert_eq!(planner.recompute(moved, DROPOFF).await, RouteOutcome::Updated);
    assert_eq!(provider.requests_to("directions").len(), 3);
}

// Should report a provider failure as a route compute error.
#[tokio::test]
async fn compute_failure() {
    let provider = MockProvider::with_status("PICKED_UP");
    provider.fail("directions", 1);

    let Err(err) = planner(&provider).compute_route(PICKUP, DROPOFF).await else {
        panic!("route should fail");
    };
    assert_eq!(err.code(), "route_compute_failed");
}

// Should only display a route that leads to the current destination.
#[tokio::test]
async fn displayable_matches_destination() {
    let provider = MockProvider::with_status("GOING_TO_PICKUP");
    let planner = planner(&provider);

    planner.recompute(Coordinate::new(-36.85, 174.765), PICKUP).await;

    assert!(planner.displayable(PICKUP).is_some());
    assert_eq!(planner.displayable(DROPOFF), None);
}
