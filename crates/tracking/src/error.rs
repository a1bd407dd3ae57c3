//! # Tracking Errors

use backend::TripStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure kinds, each with its own remediation.
#[derive(Error, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Error {
    /// Location permission was refused; tracking degrades to static display.
    #[error("code: permission_denied, description: {0}")]
    PermissionDenied(String),

    /// Permission was granted but the sensor could not be opened.
    #[error("code: location_unavailable, description: {0}")]
    LocationUnavailable(String),

    /// The trip record could not be loaded.
    #[error("code: load_failed, description: {0}")]
    LoadFailed(String),

    /// The backend rejected or never acknowledged a status update.
    #[error("code: status_advance_failed, description: {0}")]
    StatusAdvanceFailed(String),

    #[error("code: invalid_transition, description: cannot advance from {} to {to}", .from.map_or("unset", TripStatus::as_str))]
    InvalidTransition { from: Option<TripStatus>, to: TripStatus },

    #[error("code: advance_in_flight, description: a status update is already in progress")]
    AdvanceInFlight,

    #[error("code: otp_not_verified, description: {0}")]
    OtpNotVerified(String),

    #[error("code: route_compute_failed, description: {0}")]
    RouteComputeFailed(String),

    #[error("code: publish_failed, description: {0}")]
    PublishFailed(String),
}

/// How far an error travels towards the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    /// Blocks the flow and offers retry.
    UserVisible,

    /// Shown as a non-blocking banner.
    Notice,

    /// Logged only.
    Internal,
}

impl Error {
    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> &str {
        match self {
            Self::PermissionDenied(_) => "permission_denied",
            Self::LocationUnavailable(_) => "location_unavailable",
            Self::LoadFailed(_) => "load_failed",
            Self::StatusAdvanceFailed(_) => "status_advance_failed",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::AdvanceInFlight => "advance_in_flight",
            Self::OtpNotVerified(_) => "otp_not_verified",
            Self::RouteComputeFailed(_) => "route_compute_failed",
            Self::PublishFailed(_) => "publish_failed",
        }
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }

    #[must_use]
    pub const fn exposure(&self) -> Exposure {
        match self {
            Self::LoadFailed(_)
            | Self::StatusAdvanceFailed(_)
            | Self::InvalidTransition { .. }
            | Self::AdvanceInFlight
            | Self::OtpNotVerified(_) => Exposure::UserVisible,
            Self::PermissionDenied(_) | Self::LocationUnavailable(_) => Exposure::Notice,
            Self::RouteComputeFailed(_) | Self::PublishFailed(_) => Exposure::Internal,
        }
    }

    pub(crate) fn load_failed(err: &anyhow::Error) -> Self {
        Self::LoadFailed(stack(err))
    }

    pub(crate) fn advance_failed(err: &anyhow::Error) -> Self {
        Self::StatusAdvanceFailed(stack(err))
    }

    pub(crate) fn route_failed(err: &anyhow::Error) -> Self {
        Self::RouteComputeFailed(stack(err))
    }

    pub(crate) fn publish_failed(err: &anyhow::Error) -> Self {
        Self::PublishFailed(stack(err))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<Self>() {
            Some(Self::PermissionDenied(e)) => Self::PermissionDenied(format!("{err}: {e}")),
            Some(Self::LocationUnavailable(e)) => Self::LocationUnavailable(format!("{err}: {e}")),
            Some(Self::LoadFailed(e)) => Self::LoadFailed(format!("{err}: {e}")),
            Some(Self::StatusAdvanceFailed(e)) => Self::StatusAdvanceFailed(format!("{err}: {e}")),
            Some(Self::OtpNotVerified(e)) => Self::OtpNotVerified(format!("{err}: {e}")),
            Some(Self::RouteComputeFailed(e)) => Self::RouteComputeFailed(format!("{err}: {e}")),
            Some(Self::PublishFailed(e)) => Self::PublishFailed(format!("{err}: {e}")),

            // carry no description
            Some(inner @ (Self::InvalidTransition { .. } | Self::AdvanceInFlight)) => inner.clone(),
            None => Self::StatusAdvanceFailed(stack(&err)),
        }
    }
}

fn stack(err: &anyhow::Error) -> String {
    let stack = err.chain().fold(String::new(), |cause, e| format!("{cause} -> {e}"));
    stack.trim_start_matches(" -> ").to_string()
}
