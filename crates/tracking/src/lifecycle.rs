//! # Trip Lifecycle
//!
//! The lifecycle machine is the single writer of a trip's status. It accepts
//! only the immediate successor of the current status, routes gated
//! transitions through a [`SubFlow`] capture, and applies a new status only
//! after the backend has acknowledged it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use backend::{Expense, StatusUpdate, TripRecord, TripStatus, status};
use tracing::{info, warn};

use crate::provider::{Provider, SubFlow, within};
use crate::{Error, Result};

/// A sub-flow that must complete before its status is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Proof-of-delivery capture guarding `DELIVERED`.
    DeliveryConfirmation,

    /// Toll and expense capture guarding `TOLL_BILL_PENDING`.
    TollCapture,

    /// Recipient one-time password guarding `COMPLETED`.
    OtpVerification,
}

impl Gate {
    /// The gate, if any, standing in front of `status`.
    #[must_use]
    pub const fn for_status(status: TripStatus) -> Option<Self> {
        match status {
            TripStatus::Delivered => Some(Self::DeliveryConfirmation),
            TripStatus::TollBillPending => Some(Self::TollCapture),
            TripStatus::Completed => Some(Self::OtpVerification),
            _ => None,
        }
    }
}

/// What a completed sub-flow hands back to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum GateCapture {
    DeliveryConfirmation { image_url: String },

    /// An empty list means no tolls were paid.
    TollCapture { expenses: Vec<Expense> },

    OtpVerification { otp: String },
}

impl GateCapture {
    const fn gate(&self) -> Gate {
        match self {
            Self::DeliveryConfirmation { .. } => Gate::DeliveryConfirmation,
            Self::TollCapture { .. } => Gate::TollCapture,
            Self::OtpVerification { .. } => Gate::OtpVerification,
        }
    }

    /// Fold the captured payload into the outgoing status update.
    fn apply(self, gate: Gate, update: &mut StatusUpdate) -> Result<()> {
        if self.gate() != gate {
            return Err(Error::StatusAdvanceFailed(format!(
                "{:?} capture cannot satisfy the {gate:?} gate",
                self.gate()
            )));
        }

        match self {
            Self::DeliveryConfirmation { image_url } => {
                update.delivered_image_url = Some(image_url);
            }
            Self::TollCapture { expenses } => {
                if let Some(bad) = expenses.iter().find(|e| !e.amount.is_finite() || e.amount < 0.0) {
                    return Err(Error::StatusAdvanceFailed(format!(
                        "toll expense '{}' has invalid amount {}",
                        bad.description, bad.amount
                    )));
                }
                update.expenses = Some(expenses);
            }
            Self::OtpVerification { otp } => {
                let otp = otp.trim();
                if otp.is_empty() {
                    return Err(Error::OtpNotVerified("no one-time password was entered".to_string()));
                }
                update.otp = Some(otp.to_string());
            }
        }
        Ok(())
    }
}

/// Outcome of a successful [`Lifecycle::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The backend acknowledged the new status and it is now current.
    Advanced(TripStatus),

    /// The requested status was already current; nothing was sent.
    AlreadyAt(TripStatus),

    /// The user backed out of the gate; the status is unchanged.
    Cancelled(TripStatus),
}

impl Transition {
    /// Status held by the machine after the transition.
    #[must_use]
    pub const fn status(self) -> TripStatus {
        match self {
            Self::Advanced(status) | Self::AlreadyAt(status) | Self::Cancelled(status) => status,
        }
    }
}

/// Everything the machine knows about the trip, exposed read-only.
#[derive(Debug, Clone)]
pub struct TripTrackingState {
    pub record: TripRecord,

    /// Authoritative status; `None` until a lifecycle status is known.
    pub status: Option<TripStatus>,

    /// A status update is on the wire.
    pub advancing: bool,

    /// Trip id for which the backend accepted a recipient OTP.
    pub otp_verified_for: Option<String>,

    /// The gate whose sub-flow is currently open.
    pub open_gate: Option<Gate>,
}

/// Status state machine for one trip.
pub struct Lifecycle<P, S> {
    provider: Arc<P>,
    sub_flow: Arc<S>,
    state: TripTrackingState,
    timeout: Duration,
}

impl<P, S> Lifecycle<P, S>
where
    P: Provider,
    S: SubFlow,
{
    /// Initialise the machine from a freshly loaded record.
    pub fn new(record: TripRecord, provider: Arc<P>, sub_flow: Arc<S>, timeout: Duration) -> Self {
        let status = record.status;
        Self {
            provider,
            sub_flow,
            state: TripTrackingState {
                record,
                status,
                advancing: false,
                otp_verified_for: None,
                open_gate: None,
            },
            timeout,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &TripTrackingState {
        &self.state
    }

    #[must_use]
    pub const fn status(&self) -> Option<TripStatus> {
        self.state.status
    }

    /// Position of the current status in the lifecycle, or `-1` when unset.
    #[must_use]
    pub fn index(&self) -> i32 {
        self.state.status.and_then(|status| i32::try_from(status.index()).ok()).unwrap_or(-1)
    }

    /// The status the next [`Lifecycle::advance`] call may request.
    #[must_use]
    pub fn next(&self) -> Option<TripStatus> {
        self.state.status.and_then(TripStatus::successor)
    }

    /// Swap in a reloaded record. The machine's own status is kept.
    pub fn replace_record(&mut self, mut record: TripRecord) {
        if record.status != self.state.status {
            warn!(
                trip_id = %record.trip_id,
                remote = record.status.map_or("unset", TripStatus::as_str),
                local = self.state.status.map_or("unset", TripStatus::as_str),
                "reloaded record disagrees with lifecycle status"
            );
        }
        record.status = self.state.status;
        self.state.record = record;
    }

    /// Request the transition to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless `target` is the current
    /// status or its immediate successor, [`Error::OtpNotVerified`] when the
    /// OTP gate hands back no password, and [`Error::StatusAdvanceFailed`]
    /// when the backend update does not go through. The status is unchanged
    /// on every error path, including the returned future being dropped.
    pub async fn advance(&mut self, target: TripStatus) -> Result<Transition> {
        let trip_id = self.state.record.trip_id.clone();

        let Some(current) = self.state.status else {
            warn!(trip_id = %trip_id, target = %target, "advance requested before status is known");
            return Err(Error::InvalidTransition { from: None, to: target });
        };

        if target == current {
            info!(trip_id = %trip_id, status = %current, "status already applied");
            return Ok(Transition::AlreadyAt(current));
        }

        if current.successor() != Some(target) {
            warn!(
                monotonic_counter.transition_rejected = 1,
                trip_id = %trip_id, from = %current, to = %target, "transition rejected"
            );
            return Err(Error::InvalidTransition { from: Some(current), to: target });
        }

        let mut update = StatusUpdate::new(target);
        if let Some(gate) = Gate::for_status(target) {
            info!(trip_id = %trip_id, gate = ?gate, "opening gate");
            let capture = {
                let _open = Reset::set(&mut self.state.open_gate, Some(gate));
                self.sub_flow.capture(gate, &self.state.record).await
            };

            let Some(capture) = capture else {
                info!(trip_id = %trip_id, gate = ?gate, "gate cancelled");
                return Ok(Transition::Cancelled(current));
            };
            capture.apply(gate, &mut update)?;
        }

        let sent = {
            let _advancing = Reset::set(&mut self.state.advancing, true);
            send(&trip_id, &update, self.provider.as_ref(), self.timeout).await
        };

        if let Err(e) = sent {
            warn!(monotonic_counter.advance_failed = 1, trip_id = %trip_id, to = %target, error = %e, "status update failed");
            return Err(e);
        }

        // the backend rejects an update whose OTP does not match
        if update.otp.is_some() {
            self.state.otp_verified_for = Some(trip_id.clone());
        }

        self.state.status = Some(target);
        self.state.record.status = Some(target);
        info!(monotonic_counter.status_advanced = 1, trip_id = %trip_id, status = %target, "status advanced");

        Ok(Transition::Advanced(target))
    }

    /// Ask the backend to send the recipient a fresh one-time password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatusAdvanceFailed`] when the request fails.
    pub async fn resend_otp(&self) -> Result<()> {
        resend_otp(&self.state.record.trip_id, self.provider.as_ref(), self.timeout).await
    }
}

/// Holds a flag for the duration of an await and clears it on every exit
/// path, including the caller dropping the future.
struct Reset<'a, T: Default>(&'a mut T);

impl<'a, T: Default> Reset<'a, T> {
    fn set(flag: &'a mut T, value: T) -> Self {
        *flag = value;
        Self(flag)
    }
}

impl<T: Default> Drop for Reset<'_, T> {
    fn drop(&mut self) {
        *self.0 = T::default();
    }
}

async fn send<P: Provider>(trip_id: &str, update: &StatusUpdate, provider: &P, timeout: Duration) -> Result<()> {
    within(timeout, status::update_status(trip_id, update, provider))
        .await
        .with_context(|| format!("updating trip {trip_id} to {}", update.status))
        .map_err(|e| Error::advance_failed(&e))
}

pub(crate) async fn resend_otp<P: Provider>(trip_id: &str, provider: &P, timeout: Duration) -> Result<()> {
    within(timeout, status::resend_otp(trip_id, provider))
        .await
        .with_context(|| format!("resending OTP for trip {trip_id}"))
        .map_err(|e| Error::advance_failed(&e))?;

    info!(monotonic_counter.otp_resent = 1, trip_id = %trip_id, "OTP resent");
    Ok(())
}
