#![allow(missing_docs)]


use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::Notify;
use tracking::{
    ContextLoader, Error, Expense, Gate, GateCapture, Lifecycle, Transition, TransportType, TripIdentity,
    TripStatus,
};

use self::provider::{GROUND_ID, MockProvider, ScriptedSubFlow, TRIP_ID};

const TIMEOUT: Duration = Duration::from_secs(2);

async fn lifecycle(provider: &MockProvider, sub_flow: ScriptedSubFlow) -> Lifecycle<MockProvider, ScriptedSubFlow> {
    let provider = Arc::new(provider.clone());
    let loader = ContextLoader::new(Arc::clone(&provider), TIMEOUT);
    let context =
        loader.load(&TripIdentity::new(GROUND_ID, TransportType::Ground)).await.expect("should load");
    Lifecycle::new(context.record, provider, Arc::new(sub_flow), TIMEOUT)
}

// Should reject every target other than the current status and its successor.
#[tokio::test]
async fn successor_only() {
    for current in TripStatus::SEQUENCE {
        let provider = MockProvider::with_status(current.as_str());
        let mut machine = lifecycle(&provider, ScriptedSubFlow::default()).await;

        for target in TripStatus::SEQUENCE {
            if Some(target) == current.successor() {
                continue;
            }
            let result = machine.advance(target).await;
            if target == current {
                assert_eq!(result, Ok(Transition::AlreadyAt(current)));
            } else {
                assert_eq!(result, Err(Error::InvalidTransition { from: Some(current), to: target }));
            }
        }

        assert_eq!(machine.status(), Some(current));
        assert!(provider.requests_to("status").is_empty(), "{current} sent a status update");
    }
}

// Should reject PICKED_UP to ARRIVED_DESTINATION because IN_TRANSIT lies between them.
#[tokio::test]
async fn picked_up_skip_rejected() {
    let provider = MockProvider::with_status("PICKED_UP");
    let mut machine = lifecycle(&provider, ScriptedSubFlow::default()).await;

    let result = machine.advance(TripStatus::ArrivedDestination).await;
    assert_eq!(
        result,
        Err(Error::InvalidTransition { from: Some(TripStatus::PickedUp), to: TripStatus::ArrivedDestination })
    );
    assert_eq!(machine.index(), 2);

    let transition = machine.advance(TripStatus::InTransit).await.expect("should advance");
    assert_eq!(transition, Transition::Advanced(TripStatus::InTransit));
    assert_eq!(machine.index(), 3);
}

// Should advance IN_TRANSIT to ARRIVED_DESTINATION, moving the index by exactly one.
#[tokio::test]
async fn direct_advance() {
    let provider = MockProvider::with_status("IN_TRANSIT");
    let mut machine = lifecycle(&provider, ScriptedSubFlow::default()).await;
    let before = machine.index();

    let transition = machine.advance(TripStatus::ArrivedDestination).await.expect("should advance");

    assert_eq!(transition.status(), TripStatus::ArrivedDestination);
    assert_eq!(machine.index(), before + 1);
    assert_eq!(machine.state().record.status, Some(TripStatus::ArrivedDestination));
    assert_eq!(machine.next(), Some(TripStatus::Delivered));

    let updates = provider.requests_to("status");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].path, format!("/trips/{TRIP_ID}/status"));
    assert_eq!(updates[0].body, Some(json!({"status": "ARRIVED_DESTINATION"})));
}

// Should treat a repeated advance to the applied status as a no-op success.
#[tokio::test]
async fn idempotent_advance() {
    let provider = MockProvider::with_status("GOING_TO_PICKUP");
    let mut machine = lifecycle(&provider, ScriptedSubFlow::default()).await;

    let first = machine.advance(TripStatus::PickedUp).await.expect("should advance");
    let second = machine.advance(TripStatus::PickedUp).await.expect("should be a no-op");

    assert_eq!(first, Transition::Advanced(TripStatus::PickedUp));
    assert_eq!(second, Transition::AlreadyAt(TripStatus::PickedUp));
    assert_eq!(provider.requests_to("status").len(), 1);
}

// Should leave the status unchanged when the backend fails, then succeed on retry.
#[tokio::test]
async fn backend_failure() {
    let provider = MockProvider::with_status("IN_TRANSIT");
    provider.fail("status", 1);
    let mut machine = lifecycle(&provider, ScriptedSubFlow::default()).await;

    let Err(err) = machine.advance(TripStatus::ArrivedDestination).await else {
        panic!("advance should fail");
    };
    assert_eq!(err.code(), "status_advance_failed");
    assert_eq!(machine.status(), Some(TripStatus::InTransit));
    assert!(!machine.state().advancing);

    let transition = machine.advance(TripStatus::ArrivedDestination).await.expect("retry should advance");
    assert_eq!(transition, Transition::Advanced(TripStatus::ArrivedDestination));
}

// Should set DELIVERED once the delivery confirmation completes.
#[tokio::test]
async fn delivery_gate() {
    let provider = MockProvider::with_status("ARRIVED_DESTINATION");
    let sub_flow = ScriptedSubFlow::answering([Some(GateCapture::DeliveryConfirmation {
        image_url: "https://cdn.example.com/pod/TR-2001.jpg".to_string(),
    })]);
    let mut machine = lifecycle(&provider, sub_flow).await;

    let transition = machine.advance(TripStatus::Delivered).await.expect("should advance");

    assert_eq!(transition, Transition::Advanced(TripStatus::Delivered));
    assert_eq!(
        provider.requests_to("status")[0].body,
        Some(json!({"status": "DELIVERED", "deliveredImageUrl": "https://cdn.example.com/pod/TR-2001.jpg"}))
    );
}

// Should keep ARRIVED_DESTINATION when the delivery confirmation is cancelled.
#[tokio::test]
async fn delivery_gate_cancelled() {
    let provider = MockProvider::with_status("ARRIVED_DESTINATION");
    let mut machine = lifecycle(&provider, ScriptedSubFlow::answering([None])).await;

    let transition = machine.advance(TripStatus::Delivered).await.expect("cancel is not an error");

    assert_eq!(transition, Transition::Cancelled(TripStatus::ArrivedDestination));
    assert_eq!(machine.status(), Some(TripStatus::ArrivedDestination));
    assert_eq!(machine.state().open_gate, None);
    assert!(provider.requests_to("status").is_empty());
}

// Should accept a toll capture with no expenses.
#[tokio::test]
async fn toll_gate_without_tolls() {
    let provider = MockProvider::with_status("DELIVERED");
    let mut machine =
        lifecycle(&provider, ScriptedSubFlow::answering([Some(GateCapture::TollCapture { expenses: vec![] })])).await;

    machine.advance(TripStatus::TollBillPending).await.expect("should advance");

    assert_eq!(provider.requests_to("status")[0].body, Some(json!({"status": "TOLL_BILL_PENDING", "expenses": []})));
}

// Should forward captured toll expenses.
#[tokio::test]
async fn toll_gate_with_expenses() {
    let provider = MockProvider::with_status("DELIVERED");
    let expense = Expense {
        amount: 2.4,
        receipt: "https://cdn.example.com/receipts/nl-1.jpg".to_string(),
        description: "Northern Gateway toll".to_string(),
    };
    let sub_flow = ScriptedSubFlow::answering([Some(GateCapture::TollCapture { expenses: vec![expense] })]);
    let mut machine = lifecycle(&provider, sub_flow).await;

    machine.advance(TripStatus::TollBillPending).await.expect("should advance");

    let body = provider.requests_to("status")[0].body.clone().expect("should have body");
    assert_eq!(body["expenses"][0]["description"], "Northern Gateway toll");
}

// Should never reach COMPLETED without a verified OTP.
#[tokio::test]
async fn completed_requires_otp() {
    let provider = MockProvider::with_status("TOLL_BILL_PENDING");
    let sub_flow = ScriptedSubFlow::answering([
        Some(GateCapture::OtpVerification { otp: String::new() }),
        Some(GateCapture::OtpVerification { otp: "4821".to_string() }),
    ]);
    let mut machine = lifecycle(&provider, sub_flow).await;

    let Err(err) = machine.advance(TripStatus::Completed).await else {
        panic!("blank OTP should be rejected");
    };
    assert_eq!(err.code(), "otp_not_verified");
    assert_eq!(machine.status(), Some(TripStatus::TollBillPending));
    assert_eq!(machine.state().otp_verified_for, None);
    assert!(provider.requests_to("status").is_empty());

    let transition = machine.advance(TripStatus::Completed).await.expect("should complete");
    assert_eq!(transition, Transition::Advanced(TripStatus::Completed));
    assert_eq!(machine.state().otp_verified_for.as_deref(), Some(TRIP_ID));
    assert_eq!(machine.next(), None);
    assert_eq!(provider.requests_to("status")[0].body, Some(json!({"status": "COMPLETED", "otp": "4821"})));
}

// Should record OTP verification only for an acknowledged update that carried one.
#[tokio::test]
async fn otp_recorded_on_acknowledgement() {
    let provider = MockProvider::with_status("ARRIVED_DESTINATION");
    let sub_flow = ScriptedSubFlow::answering([Some(GateCapture::DeliveryConfirmation {
        image_url: "https://cdn.example.com/pod/TR-2001.jpg".to_string(),
    })]);
    let mut machine = lifecycle(&provider, sub_flow).await;

    machine.advance(TripStatus::Delivered).await.expect("should deliver");
    assert_eq!(machine.state().otp_verified_for, None);
}

// Should not complete when the backend rejects the OTP.
#[tokio::test]
async fn rejected_otp() {
    let provider = MockProvider::with_status("TOLL_BILL_PENDING");
    provider.fail("status", 1);
    let sub_flow = ScriptedSubFlow::answering([Some(GateCapture::OtpVerification { otp: "0000".to_string() })]);
    let mut machine = lifecycle(&provider, sub_flow).await;

    let Err(err) = machine.advance(TripStatus::Completed).await else {
        panic!("rejected OTP should fail");
    };
    assert_eq!(err.code(), "status_advance_failed");
    assert_eq!(machine.status(), Some(TripStatus::TollBillPending));
    assert_eq!(machine.state().otp_verified_for, None);
}

// Should clear the open gate when the caller gives up on an advance.
#[tokio::test]
async fn dropped_advance_clears_gate() {
    let provider = MockProvider::with_status("ARRIVED_DESTINATION");
    let sub_flow = ScriptedSubFlow::answering([None]).held_by(Arc::new(Notify::new()));
    let mut machine = lifecycle(&provider, sub_flow).await;

    let abandoned = tokio::time::timeout(Duration::from_millis(50), machine.advance(TripStatus::Delivered)).await;
    assert!(abandoned.is_err(), "gate should still be open");

    let state = machine.state();
    assert_eq!(state.open_gate, None);
    assert!(!state.advancing);
    assert_eq!(state.status, Some(TripStatus::ArrivedDestination));
    assert!(provider.requests_to("status").is_empty());
}

// Should reject a capture that belongs to a different gate.
#[tokio::test]
async fn mismatched_capture() {
    let provider = MockProvider::with_status("ARRIVED_DESTINATION");
    let sub_flow = ScriptedSubFlow::answering([Some(GateCapture::OtpVerification { otp: "4821".to_string() })]);
    let mut machine = lifecycle(&provider, sub_flow).await;

    let result = machine.advance(TripStatus::Delivered).await;

    assert!(matches!(result, Err(Error::StatusAdvanceFailed(_))));
    assert_eq!(machine.status(), Some(TripStatus::ArrivedDestination));
}

// Should hold an unset status for a trip outside the lifecycle.
#[tokio::test]
async fn unknown_status_is_unset() {
    let provider = MockProvider::with_status("CANCELLED");
    let mut machine = lifecycle(&provider, ScriptedSubFlow::default()).await;

    assert_eq!(machine.status(), None);
    assert_eq!(machine.index(), -1);
    assert_eq!(machine.next(), None);

    let result = machine.advance(TripStatus::InProgress).await;
    assert_eq!(result, Err(Error::InvalidTransition { from: None, to: TripStatus::InProgress }));
}

// Should open gates only for the three gated statuses.
#[tokio::test]
async fn gates_opened() {
    let provider = MockProvider::with_status("IN_TRANSIT");
    let sub_flow = Arc::new(ScriptedSubFlow::answering([
        Some(GateCapture::DeliveryConfirmation { image_url: "https://cdn.example.com/pod/1.jpg".to_string() }),
        Some(GateCapture::TollCapture { expenses: vec![] }),
        Some(GateCapture::OtpVerification { otp: "4821".to_string() }),
    ]));
    let loader = ContextLoader::new(Arc::new(provider.clone()), TIMEOUT);
    let context =
        loader.load(&TripIdentity::new(GROUND_ID, TransportType::Ground)).await.expect("should load");
    let mut machine = Lifecycle::new(context.record, Arc::new(provider.clone()), Arc::clone(&sub_flow), TIMEOUT);

    for target in &TripStatus::SEQUENCE[4..] {
        machine.advance(*target).await.expect("should advance");
    }

    assert_eq!(machine.status(), Some(TripStatus::Completed));
    assert_eq!(sub_flow.opened(), vec![Gate::DeliveryConfirmation, Gate::TollCapture, Gate::OtpVerification]);
    assert_eq!(provider.requests_to("status").len(), 4);
}

// Should keep the machine's status when a reloaded record disagrees.
#[tokio::test]
async fn replace_record_keeps_status() {
    let provider = MockProvider::with_status("IN_TRANSIT");
    let mut machine = lifecycle(&provider, ScriptedSubFlow::default()).await;

    let mut stale = machine.state().record.clone();
    stale.status = Some(TripStatus::PickedUp);
    stale.dropoff.address = "12 Ponsonby Rd, Ponsonby".to_string();
    machine.replace_record(stale);

    assert_eq!(machine.status(), Some(TripStatus::InTransit));
    assert_eq!(machine.state().record.status, Some(TripStatus::InTransit));
    assert_eq!(machine.state().record.dropoff.address, "12 Ponsonby Rd, Ponsonby");
}

// Should ask the backend to resend the OTP.
#[tokio::test]
async fn resend_otp() {
    let provider = MockProvider::with_status("TOLL_BILL_PENDING");
    let machine = lifecycle(&provider, ScriptedSubFlow::default()).await;

    machine.resend_otp().await.expect("should resend");
    assert_eq!(provider.requests_to("resend-otp")[0].path, format!("/trips/{TRIP_ID}/resend-otp"));

    provider.fail("resend-otp", 1);
    let Err(err) = machine.resend_otp().await else {
        panic!("resend should fail");
    };
    assert_eq!(err.code(), "status_advance_failed");
}
