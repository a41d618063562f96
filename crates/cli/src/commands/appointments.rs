//! Appointment commands.

use petverse_client::AppState;
use petverse_client::appointments::{Appointment, BookingField, BookingForm, services};

use super::require_email;
use crate::{AppointmentAction, BookArgs};

/// Fill the booking form step by step and submit it.
pub async fn book(state: &AppState, args: BookArgs) -> Result<(), Box<dyn std::error::Error>> {
    let email = match args.email {
        Some(email) => email,
        None => require_email(state)?.into_inner(),
    };

    let mut form = BookingForm::new(args.kind);
    form.set(BookingField::PetName, args.pet_name);
    form.set(BookingField::PetType, args.pet_type);
    if let Some(age) = args.pet_age {
        form.set(BookingField::PetAge, age);
    }
    form.next()?;

    form.set(BookingField::Service, args.service);
    form.next()?;

    form.set(BookingField::Date, args.date);
    form.set(BookingField::Time, args.time);
    form.next()?;

    form.set(BookingField::OwnerName, args.name);
    form.set(BookingField::OwnerEmail, email);
    form.set(BookingField::Phone, args.phone);
    if let Some(notes) = args.notes {
        form.set(BookingField::Notes, notes);
    }

    let result = state.appointments().book_form(&form).await?;
    tracing::info!(
        kind = %form.kind(),
        id = result.inserted_id.as_deref().unwrap_or("-"),
        "Appointment booked"
    );
    Ok(())
}

pub async fn run(state: &AppState, action: AppointmentAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AppointmentAction::List { kind, all } => {
            let appointments = if all {
                state.appointments().all_appointments(kind).await?
            } else {
                let email = require_email(state)?;
                state.appointments().my_appointments(kind, &email).await?
            };
            for appointment in &appointments {
                log_appointment(appointment);
            }
            tracing::info!(%kind, count = appointments.len(), "Appointments");
        }
        AppointmentAction::SetStatus { kind, id, status } => {
            let appointments = state.appointments().all_appointments(kind).await?;
            let appointment = appointments
                .iter()
                .find(|a| a.id.as_str() == id)
                .ok_or_else(|| format!("no {kind} appointment with id {id}"))?;
            let updated = state
                .appointments()
                .update_status(kind, appointment, status)
                .await?;
            log_appointment(&updated);
        }
        AppointmentAction::Services { kind } => {
            for service in services(kind) {
                tracing::info!(%kind, "{service}");
            }
        }
    }
    Ok(())
}

fn log_appointment(appointment: &Appointment) {
    tracing::info!(
        id = %appointment.id,
        date = %appointment.date,
        time = %appointment.time,
        pet = %appointment.pet_name,
        owner = %appointment.owner_email,
        status = %appointment.status,
        "{}",
        appointment.service
    );
}
