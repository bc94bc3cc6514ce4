//! Booking lifecycle through the request, approval and payment path

mod common;

use uuid::Uuid;

use common::{date, wait_for, Harness, PRICE_PER_DAY, PRODUCT_ID};
use rental_handoff::booking::{
    BookingStatus, CreateBookingRequest, DisputeRequest, PartyRole, PaymentStatus,
};
use rental_handoff::error::BookingError;
use rental_handoff::handoff::HandoffFlow;
use rental_handoff::settlement::CreateSessionRequest;

fn request(start_day: u32, end_day: u32) -> CreateBookingRequest {
    CreateBookingRequest {
        product_id: PRODUCT_ID,
        start_date: date(9, start_day),
        end_date: date(9, end_day),
        security_deposit: None,
    }
}

#[tokio::test]
async fn test_full_lifecycle_to_completion() {
    let h = Harness::new();
    let bookings = &h.state.booking_service;

    let booking = bookings
        .request_booking(h.borrower, request(1, 4))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.total_amount, 3 * PRICE_PER_DAY);
    assert_eq!(booking.security_deposit, 3 * PRICE_PER_DAY / 5);
    assert_eq!(booking.lender_id, h.lender);
    let id = booking.booking_id;

    bookings.approve(h.lender, id).await.unwrap();

    let gateway = &h.state.settlement_gateway;
    let session = gateway
        .create_session(
            h.borrower,
            None,
            CreateSessionRequest {
                product_id: PRODUCT_ID,
                rental_days: None,
                booking_id: Some(id),
            },
        )
        .await
        .unwrap();
    gateway
        .confirm_payment(h.borrower, id, &session.session_id)
        .await
        .unwrap();

    let tokens = &h.state.token_service;
    let coordinator = &h.state.handoff_coordinator;
    let pickup = tokens.issue(id, HandoffFlow::Borrow, h.lender).await.unwrap();
    coordinator.redeem(&pickup.token, h.borrower).await.unwrap();
    let drop_off = tokens.issue(id, HandoffFlow::Return, h.lender).await.unwrap();
    coordinator.redeem(&drop_off.token, h.borrower).await.unwrap();

    let done = h.row(id);
    assert_eq!(done.status, BookingStatus::Completed);
    assert_eq!(done.payment_status, PaymentStatus::Paid);

    let (lender, borrower) = (h.lender, h.borrower);
    assert!(
        wait_for(|| h.notifier.titles_for(lender)
            == vec![
                "New Rental Request".to_string(),
                "Payment Received".to_string(),
                "Item Collected".to_string(),
                "Item Returned".to_string(),
            ])
        .await
    );
    assert_eq!(
        h.notifier.titles_for(borrower),
        vec!["Booking Approved".to_string()]
    );
}

#[tokio::test]
async fn test_borrow_qr_on_pending_booking_is_invalid_state() {
    let h = Harness::new();
    let booking = h
        .state
        .booking_service
        .request_booking(h.borrower, request(1, 2))
        .await
        .unwrap();

    assert!(matches!(
        h.state
            .token_service
            .issue(booking.booking_id, HandoffFlow::Borrow, h.lender)
            .await,
        Err(BookingError::InvalidState(_))
    ));
    let row = h.row(booking.booking_id);
    assert_eq!(row.status, BookingStatus::Pending);
    assert!(row.collection_token_hash.is_none());
}

#[tokio::test]
async fn test_overlapping_request_is_unavailable() {
    let h = Harness::new();
    let bookings = &h.state.booking_service;
    let other = Uuid::new_v4();

    let first = bookings
        .request_booking(h.borrower, request(10, 12))
        .await
        .unwrap();

    // Shared end date counts as an overlap
    assert!(matches!(
        bookings.request_booking(other, request(12, 14)).await,
        Err(BookingError::Unavailable)
    ));
    bookings.request_booking(other, request(13, 14)).await.unwrap();

    // Rejection frees the calendar
    bookings.reject(h.lender, first.booking_id).await.unwrap();
    bookings.request_booking(other, request(10, 11)).await.unwrap();
}

#[tokio::test]
async fn test_request_validation() {
    let h = Harness::new();
    let bookings = &h.state.booking_service;

    assert!(matches!(
        bookings.request_booking(h.borrower, request(5, 4)).await,
        Err(BookingError::Validation(_))
    ));
    assert!(matches!(
        bookings
            .request_booking(
                h.borrower,
                CreateBookingRequest {
                    product_id: 77,
                    ..request(1, 2)
                },
            )
            .await,
        Err(BookingError::NotFound)
    ));
    assert!(matches!(
        bookings.request_booking(h.lender, request(1, 2)).await,
        Err(BookingError::Validation(_))
    ));
}

#[tokio::test]
async fn test_repeated_approval_is_invalid_transition() {
    let h = Harness::new();
    let bookings = &h.state.booking_service;
    let booking = bookings
        .request_booking(h.borrower, request(1, 2))
        .await
        .unwrap();

    bookings.approve(h.lender, booking.booking_id).await.unwrap();
    assert!(matches!(
        bookings.approve(h.lender, booking.booking_id).await,
        Err(BookingError::InvalidTransition {
            from: BookingStatus::Confirmed,
            to: BookingStatus::Confirmed,
        })
    ));
    assert!(matches!(
        bookings.reject(h.lender, booking.booking_id).await,
        Err(BookingError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_cancel_is_borrower_only_and_final() {
    let h = Harness::new();
    let bookings = &h.state.booking_service;
    let booking = bookings
        .request_booking(h.borrower, request(1, 2))
        .await
        .unwrap();
    let id = booking.booking_id;

    assert!(matches!(
        bookings.cancel(h.lender, id).await,
        Err(BookingError::Unauthorized)
    ));
    let cancelled = bookings.cancel(h.borrower, id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(matches!(
        bookings.cancel(h.borrower, id).await,
        Err(BookingError::InvalidTransition { .. })
    ));
    assert!(matches!(
        bookings.approve(h.lender, id).await,
        Err(BookingError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_dispute_freezes_active_booking() {
    let h = Harness::new();
    h.seed(1, BookingStatus::Active);
    h.seed(2, BookingStatus::Completed);
    let bookings = &h.state.booking_service;

    let disputed = bookings
        .dispute(
            h.lender,
            1,
            DisputeRequest {
                reason: "  Item came back damaged ".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(disputed.status, BookingStatus::Disputed);
    assert_eq!(
        disputed.dispute_reason.as_deref(),
        Some("Item came back damaged")
    );

    // A disputed booking no longer accepts a return scan
    assert!(matches!(
        h.state
            .token_service
            .issue(1, HandoffFlow::Return, h.lender)
            .await,
        Err(BookingError::InvalidState(_))
    ));
    assert!(matches!(
        bookings
            .dispute(
                h.borrower,
                2,
                DisputeRequest {
                    reason: "late".to_string()
                }
            )
            .await,
        Err(BookingError::InvalidTransition { .. })
    ));
    assert!(matches!(
        bookings
            .dispute(
                h.borrower,
                1,
                DisputeRequest {
                    reason: "   ".to_string()
                }
            )
            .await,
        Err(BookingError::Validation(_))
    ));
}

#[tokio::test]
async fn test_reads_are_party_only() {
    let h = Harness::new();
    h.seed(1, BookingStatus::Pending);
    h.seed(2, BookingStatus::Paid);
    let bookings = &h.state.booking_service;

    assert_eq!(bookings.get(h.borrower, 1).await.unwrap().booking_id, 1);
    assert!(matches!(
        bookings.get(Uuid::new_v4(), 1).await,
        Err(BookingError::NotFound)
    ));

    assert_eq!(bookings.list_for_user(h.lender, None).await.unwrap().len(), 2);
    assert!(bookings
        .list_for_user(h.lender, Some(PartyRole::Borrower))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        bookings
            .list_for_user(h.borrower, Some(PartyRole::Borrower))
            .await
            .unwrap()
            .len(),
        2
    );
    assert!(bookings
        .list_for_user(Uuid::new_v4(), None)
        .await
        .unwrap()
        .is_empty());
}
