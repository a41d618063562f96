//! Booking flow and status changes.

use petverse_client::ToastLevel;
use petverse_client::appointments::{AppointmentError, BookingError, BookingField, BookingForm};
use petverse_core::{AppointmentKind, AppointmentStatus, Email};
use petverse_integration_tests::StubApi;

fn filled_form(email: &Email) -> BookingForm {
    let mut form = BookingForm::new(AppointmentKind::Grooming).with_contact("Kim", email);
    form.set(BookingField::PetName, "Biscuit");
    form.set(BookingField::PetType, "dog");
    form.next().unwrap();
    form.set(BookingField::Service, "Full Groom");
    form.next().unwrap();
    form.set(BookingField::Date, "2026-11-02");
    form.set(BookingField::Time, "10:30");
    form.next().unwrap();
    form.set(BookingField::Phone, "555-0142");
    form
}

#[tokio::test]
async fn test_book_and_list_my_appointments() {
    let stub = StubApi::start().await;
    let mut client = stub.signed_in("kim@example.com").await;
    let kim = Email::parse("kim@example.com").unwrap();
    let appointments = client.app.appointments().clone();

    let result = appointments.book_form(&filled_form(&kim)).await.unwrap();
    assert!(result.acknowledged);
    assert_eq!(result.inserted_id.as_deref(), Some("apt-1"));

    let stored = stub.state().appointments("grooming");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["status"], "pending");
    assert_eq!(stored[0]["service"], "Full Groom");

    let mine = appointments
        .my_appointments(AppointmentKind::Grooming, &kim)
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].pet_name, "Biscuit");
    assert_eq!(mine[0].kind, Some(AppointmentKind::Grooming));
    assert_eq!(mine[0].status, AppointmentStatus::Pending);

    let other = Email::parse("lee@example.com").unwrap();
    assert!(
        appointments
            .my_appointments(AppointmentKind::Grooming, &other)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        appointments
            .all_appointments(AppointmentKind::Healthcare)
            .await
            .unwrap()
            .is_empty()
    );

    let toasts = client.drain_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Success);
}

#[tokio::test]
async fn test_invalid_form_is_not_sent() {
    let stub = StubApi::start().await;
    let mut client = stub.signed_in("kim@example.com").await;
    let kim = Email::parse("kim@example.com").unwrap();

    let mut form = filled_form(&kim);
    form.set(BookingField::Date, "next tuesday");
    let err = client.app.appointments().book_form(&form).await.unwrap_err();

    assert!(matches!(
        err,
        AppointmentError::Booking(BookingError::InvalidDate(_))
    ));
    assert_eq!(stub.state().hits("POST /grooming"), 0);
    let toasts = client.drain_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Error);
}

#[tokio::test]
async fn test_status_follows_lifecycle() {
    let stub = StubApi::start().await;
    let client = stub.signed_in("kim@example.com").await;
    let kim = Email::parse("kim@example.com").unwrap();
    let appointments = client.app.appointments();
    appointments.book_form(&filled_form(&kim)).await.unwrap();

    let booked = appointments
        .all_appointments(AppointmentKind::Grooming)
        .await
        .unwrap()
        .remove(0);

    let skipped = appointments
        .update_status(AppointmentKind::Grooming, &booked, AppointmentStatus::Completed)
        .await;
    assert!(matches!(
        skipped,
        Err(AppointmentError::InvalidTransition { .. })
    ));
    assert_eq!(stub.state().hits("PATCH /appointment/:id"), 0);

    let confirmed = appointments
        .update_status(AppointmentKind::Grooming, &booked, AppointmentStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
    assert_eq!(stub.state().appointments("grooming")[0]["status"], "confirmed");

    let done = appointments
        .update_status(AppointmentKind::Grooming, &confirmed, AppointmentStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.status, AppointmentStatus::Completed);
    assert!(
        appointments
            .update_status(AppointmentKind::Grooming, &done, AppointmentStatus::Cancelled)
            .await
            .is_err()
    );
}
