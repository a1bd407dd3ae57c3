//! # Route Planner
//!
//! Requests road-following paths from the directions provider and keeps the
//! last good one. Recomputes are debounced against sensor jitter and results
//! for superseded anchors are discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context;
use backend::directions;
use platform::Coordinate;
use tracing::{debug, info, warn};

use crate::provider::{Provider, within};
use crate::{Error, Result};

/// The origin/destination pair a route was requested for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchors {
    pub origin: Coordinate,
    pub destination: Coordinate,
}

/// A computed path, `(lat, lon)` ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub points: Vec<Coordinate>,
    pub anchors: Anchors,
}

/// What a [`RoutePlanner::recompute`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A new route replaced the previous one.
    Updated,

    /// The origin moved less than the debounce radius; nothing was requested.
    Debounced,

    /// A newer request was issued while this one was in flight.
    Stale,

    /// The provider failed; the previous route is retained.
    Failed,
}

#[derive(Default)]
struct PlannerState {
    requested: Option<Anchors>,
    route: Option<Route>,
}

pub struct RoutePlanner<P> {
    provider: Arc<P>,
    state: Mutex<PlannerState>,
    epsilon_m: f64,
    timeout: Duration,
}

impl<P: Provider> RoutePlanner<P> {
    pub fn new(provider: Arc<P>, epsilon_m: f64, timeout: Duration) -> Self {
        Self { provider, state: Mutex::new(PlannerState::default()), epsilon_m, timeout }
    }

    /// Request a path from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RouteComputeFailed`] when the provider fails or times
    /// out.
    pub async fn compute_route(&self, origin: Coordinate, destination: Coordinate) -> Result<Route> {
        let points = within(self.timeout, directions::route(origin, destination, self.provider.as_ref()))
            .await
            .context("computing route")
            .map_err(|e| Error::route_failed(&e))?;

        Ok(Route { points, anchors: Anchors { origin, destination } })
    }

    /// Recompute the live route for a new origin.
    pub async fn recompute(&self, origin: Coordinate, destination: Coordinate) -> RouteOutcome {
        let anchors = Anchors { origin, destination };

        {
            let mut state = self.lock();
            if let Some(last) = state.requested
                && last.destination == destination
                && last.origin.distance_to(&origin) < self.epsilon_m
            {
                debug!(monotonic_counter.route_debounced = 1, "origin within debounce radius");
                return RouteOutcome::Debounced;
            }
            state.requested = Some(anchors);
        }

        debug!(
            monotonic_counter.route_requested = 1,
            origin = ?origin, destination = ?destination, "requesting route"
        );
        let result = self.compute_route(origin, destination).await;

        let mut state = self.lock();
        if state.requested != Some(anchors) {
            debug!("discarding route for superseded anchors");
            return RouteOutcome::Stale;
        }

        match result {
            Ok(route) => {
                info!(points = route.points.len(), "route updated");
                state.route = Some(route);
                RouteOutcome::Updated
            }
            Err(e) => {
                // let the next sample try again
                state.requested = None;
                warn!(monotonic_counter.route_failed = 1, error = %e, "route compute failed, keeping last route");
                RouteOutcome::Failed
            }
        }
    }

    /// The last successfully computed route.
    #[must_use]
    pub fn current(&self) -> Option<Route> {
        self.lock().route.clone()
    }

    /// The last route, provided it still leads to `destination`.
    #[must_use]
    pub fn displayable(&self, destination: Coordinate) -> Option<Route> {
        self.lock().route.as_ref().filter(|route| route.anchors.destination == destination).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, PlannerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
