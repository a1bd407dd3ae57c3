//! # Tracking Session
//!
//! One session per visit to the trip tracking screen. Opening a session loads
//! the trip, initialises the lifecycle machine and starts the position feed;
//! closing or dropping it cancels every background task it started.

use std::mem;
use std::sync::Arc;

use backend::TripStatus;
use platform::{Coordinate, Position};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::{ContextLoader, TripContext, TripIdentity};
use crate::lifecycle::{self, Lifecycle, Transition};
use crate::provider::{Provider, SubFlow};
use crate::publisher::Publisher;
use crate::route::{Route, RouteOutcome, RoutePlanner};
use crate::sampler::{Sampler, SamplerGuard};
use crate::view::{LiveTracking, TrackingView};
use crate::{Error, Result};

struct Inner<P, S> {
    context: TripContext,
    lifecycle: Lifecycle<P, S>,
}

pub struct Session<P, S> {
    provider: Arc<P>,
    config: Config,
    loader: ContextLoader<P>,
    inner: Mutex<Inner<P, S>>,
    planner: Arc<RoutePlanner<P>>,
    publisher: Publisher<P>,
    sampler: Option<SamplerGuard>,
    static_route: Option<Route>,
    view: Arc<watch::Sender<TrackingView>>,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    trip_id: String,
}

impl<P, S> Session<P, S>
where
    P: Provider + 'static,
    S: SubFlow,
{
    /// Load the trip and start tracking it.
    ///
    /// A refused location permission does not fail the session: the view
    /// keeps the static pickup and dropoff markers and carries a notice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoadFailed`] when the trip record cannot be loaded.
    pub async fn open(identity: TripIdentity, provider: Arc<P>, sub_flow: Arc<S>, config: &Config) -> Result<Self> {
        let loader = ContextLoader::new(Arc::clone(&provider), config.request_timeout);
        let context = loader.load(&identity).await?;

        let lifecycle =
            Lifecycle::new(context.record.clone(), Arc::clone(&provider), sub_flow, config.request_timeout);
        let view = Arc::new(watch::Sender::new(initial_view(&context, &lifecycle)));
        let trip_id = context.record.trip_id.clone();

        let token = CancellationToken::new();
        let planner =
            Arc::new(RoutePlanner::new(Arc::clone(&provider), config.route_epsilon_m, config.request_timeout));
        let publisher =
            Publisher::new(Arc::clone(&provider), &token, config.publish_interval, config.request_timeout);
        let sampler = Sampler::new(Arc::clone(&provider), config.watch_options());

        let pickup = context.record.pickup.coordinates;
        let dropoff = context.record.dropoff.coordinates;
        let (static_route, started) = tokio::join!(planner.compute_route(pickup, dropoff), sampler.start(&token));

        let static_route = static_route
            .inspect_err(|e| warn!(trip_id = %trip_id, error = %e, "static route unavailable"))
            .ok();
        view.send_modify(|v| v.route.clone_from(&static_route));

        let mut tasks = Vec::new();
        let sampler = match started {
            Ok(guard) => {
                view.send_modify(|v| v.live_tracking = LiveTracking::Active);
                tasks.push(tokio::spawn(feed_loop(
                    guard.subscribe(),
                    publisher.clone(),
                    trip_id.clone(),
                    Arc::clone(&view),
                    token.clone(),
                )));
                tasks.push(tokio::spawn(route_loop(
                    guard.subscribe(),
                    Arc::clone(&planner),
                    Arc::clone(&view),
                    token.clone(),
                )));
                Some(guard)
            }
            Err(e) => {
                let live_tracking = match e {
                    Error::PermissionDenied(_) => LiveTracking::Denied,
                    _ => LiveTracking::Unavailable,
                };
                warn!(trip_id = %trip_id, error = %e, "live tracking disabled");
                view.send_modify(|v| {
                    v.live_tracking = live_tracking;
                    v.notice = Some(e);
                });
                None
            }
        };

        info!(monotonic_counter.session_opened = 1, trip_id = %trip_id, live = sampler.is_some(), "tracking session opened");

        Ok(Self {
            provider,
            config: config.clone(),
            loader,
            inner: Mutex::new(Inner { context, lifecycle }),
            planner,
            publisher,
            sampler,
            static_route,
            view,
            token,
            tasks,
            trip_id,
        })
    }

    /// Request the transition to `target`.
    ///
    /// Only one advance may be in flight at a time; the context is reloaded
    /// after every applied transition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AdvanceInFlight`] when another advance has not yet
    /// finished, otherwise as [`Lifecycle::advance`].
    pub async fn advance(&self, target: TripStatus) -> Result<Transition> {
        let Ok(mut inner) = self.inner.try_lock() else {
            warn!(trip_id = %self.trip_id, target = %target, "advance already in flight");
            return Err(Error::AdvanceInFlight);
        };

        let result = {
            let _advancing = Advancing::start(&self.view);
            inner.lifecycle.advance(target).await
        };

        let transition = result?;
        if let Transition::Advanced(status) = transition {
            self.project_status(&inner.lifecycle);

            match self.loader.refresh(&inner.context).await {
                Ok(context) => {
                    inner.lifecycle.replace_record(context.record.clone());
                    self.view.send_modify(|v| {
                        v.summary = context.trip_type.summary_fields(&context.record);
                        v.trail.clone_from(&context.trail);
                        v.pickup = context.record.pickup.clone();
                        v.dropoff = context.record.dropoff.clone();
                    });
                    inner.context = context;
                }
                Err(e) => {
                    warn!(trip_id = %self.trip_id, status = %status, error = %e, "refresh after advance failed");
                }
            }
        }

        Ok(transition)
    }

    /// Ask the backend to send the recipient a new one-time password.
    ///
    /// Does not wait for an in-flight advance, so it can be called while the
    /// OTP gate is open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatusAdvanceFailed`] when the request fails.
    pub async fn resend_otp(&self) -> Result<()> {
        lifecycle::resend_otp(&self.trip_id, self.provider.as_ref(), self.config.request_timeout).await
    }

    /// A receiver notified on every view change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackingView> {
        self.view.subscribe()
    }

    #[must_use]
    pub fn view(&self) -> TrackingView {
        self.view.borrow().clone()
    }

    #[must_use]
    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    /// Whether live positions are flowing.
    #[must_use]
    pub fn is_sampling(&self) -> bool {
        self.sampler.as_ref().is_some_and(|sampler| !sampler.is_stopped())
    }

    /// End the session and wait for its background work to finish.
    pub async fn close(mut self) {
        self.token.cancel();
        self.publisher.cancel();

        if let Some(mut sampler) = self.sampler.take() {
            sampler.stopped().await;
        }
        for task in mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "session task failed");
            }
        }

        info!(trip_id = %self.trip_id, "tracking session closed");
    }

    fn project_status(&self, lifecycle: &Lifecycle<P, S>) {
        let status = lifecycle.status();
        let index = lifecycle.index();
        let next = lifecycle.next();

        self.view.send_modify(|v| {
            v.status = status;
            v.status_index = index;
            v.next_status = next;

            // hide a live route that leads to the previous destination
            let destination = destination_of(v);
            v.route = self.planner.displayable(destination).or_else(|| self.static_route.clone());
        });
    }
}

impl<P, S> Drop for Session<P, S> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Shows an advance as running until dropped, whether the advance finished
/// or its caller let go of it.
struct Advancing<'a>(&'a watch::Sender<TrackingView>);

impl<'a> Advancing<'a> {
    fn start(view: &'a watch::Sender<TrackingView>) -> Self {
        view.send_modify(|v| v.advancing = true);
        Self(view)
    }
}

impl Drop for Advancing<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|v| v.advancing = false);
    }
}

fn initial_view<P, S>(context: &TripContext, lifecycle: &Lifecycle<P, S>) -> TrackingView
where
    P: Provider,
    S: SubFlow,
{
    let record = &context.record;
    TrackingView {
        trip_id: record.trip_id.clone(),
        booking_id: record.booking_id.clone(),
        trip_type: context.trip_type,
        status: lifecycle.status(),
        status_index: lifecycle.index(),
        next_status: lifecycle.next(),
        advancing: false,
        pickup: record.pickup.clone(),
        dropoff: record.dropoff.clone(),
        summary: context.trip_type.summary_fields(record),
        trail: context.trail.clone(),
        position: None,
        route: None,
        live_tracking: LiveTracking::Pending,
        notice: None,
    }
}

fn destination_of(view: &TrackingView) -> Coordinate {
    view.trip_type.destination_anchor(view.status, &view.pickup, &view.dropoff).coordinates
}

/// Forward every admitted sample to the view and the publisher.
async fn feed_loop<P: Provider + 'static>(
    mut positions: watch::Receiver<Position>, publisher: Publisher<P>, trip_id: String,
    view: Arc<watch::Sender<TrackingView>>, token: CancellationToken,
) {
    positions.mark_changed();

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            changed = positions.changed() => {
                if changed.is_err() {
                    view.send_modify(|v| v.live_tracking = LiveTracking::Unavailable);
                    break;
                }
            }
        }

        let position = *positions.borrow_and_update();
        publisher.publish(&trip_id, position);
        view.send_modify(|v| {
            v.position = Some(position);
            v.live_tracking = LiveTracking::Active;
        });
    }

    debug!(trip_id = %trip_id, "position feed stopped");
}

/// Recompute the live route on every new sample and on destination changes.
async fn route_loop<P: Provider>(
    mut positions: watch::Receiver<Position>, planner: Arc<RoutePlanner<P>>,
    view: Arc<watch::Sender<TrackingView>>, token: CancellationToken,
) {
    let mut views = view.subscribe();
    let mut last_destination = None;
    positions.mark_changed();

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            changed = positions.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let destination = destination_of(&views.borrow_and_update());
                if last_destination == Some(destination) {
                    continue;
                }
            }
        }

        let origin = positions.borrow_and_update().coordinate();
        let destination = destination_of(&view.borrow());
        last_destination = Some(destination);

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => break,
            outcome = planner.recompute(origin, destination) => outcome,
        };

        if outcome == RouteOutcome::Updated
            && let Some(route) = planner.displayable(destination)
        {
            view.send_modify(|v| v.route = Some(route));
        }
    }

    debug!("route updates stopped");
}
