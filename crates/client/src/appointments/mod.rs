//! Grooming and healthcare appointments.
//!
//! Both services share one record shape and differ only in their API
//! collection (`/grooming`, `/healthcare`) and offered services.

mod form;

pub use form::{BookingError, BookingField, BookingForm, BookingStep, services};

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use petverse_core::{AppointmentId, AppointmentKind, AppointmentStatus, Email};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::api::{Access, ApiClient, InsertResult, NO_QUERY};
use crate::error::ApiError;
use crate::notify::{Notifier, Toast};

/// A booked appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(rename = "_id")]
    pub id: AppointmentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AppointmentKind>,
    pub pet_name: String,
    #[serde(default)]
    pub pet_type: String,
    #[serde(default)]
    pub pet_age: Option<String>,
    pub service: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub owner_name: String,
    pub owner_email: Email,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for `POST /:kind`, produced by [`BookingForm::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    pub pet_name: String,
    pub pet_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pet_age: Option<String>,
    pub service: String,
    pub date: NaiveDate,
    pub time: String,
    pub owner_name: String,
    pub owner_email: Email,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Serialize)]
struct BookRequest<'a> {
    #[serde(flatten)]
    request: &'a AppointmentRequest,
    status: AppointmentStatus,
}

#[derive(Serialize)]
struct StatusUpdate {
    status: AppointmentStatus,
}

#[derive(Serialize)]
struct EmailQuery<'a> {
    email: &'a Email,
}

/// Errors from appointment operations.
#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Client for `/grooming` and `/healthcare`.
#[derive(Clone)]
pub struct AppointmentClient {
    inner: Arc<AppointmentClientInner>,
}

struct AppointmentClientInner {
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
}

impl AppointmentClient {
    #[must_use]
    pub fn new(api: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(AppointmentClientInner { api, notifier }),
        }
    }

    /// Submit `form` and book the resulting request.
    ///
    /// # Errors
    ///
    /// Returns the form's validation error without calling the API, or the
    /// API error.
    pub async fn book_form(&self, form: &BookingForm) -> Result<InsertResult, AppointmentError> {
        let request = form.submit().inspect_err(|e| {
            self.inner.notifier.notify(Toast::error(e.to_string()));
        })?;
        self.book(form.kind(), &request).await
    }

    /// Book an appointment (`POST /:kind`). New bookings start as pending.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self, request), fields(service = %request.service, date = %request.date))]
    pub async fn book(
        &self,
        kind: AppointmentKind,
        request: &AppointmentRequest,
    ) -> Result<InsertResult, AppointmentError> {
        let body = BookRequest {
            request,
            status: AppointmentStatus::Pending,
        };
        match self
            .inner
            .api
            .post_json(Access::Secure, &[kind.path()], &body)
            .await
        {
            Ok(result) => {
                self.inner.notifier.notify(Toast::success(format!(
                    "{} booked for {} at {}",
                    request.service, request.date, request.time
                )));
                Ok(result)
            }
            Err(e) => Err(self.fail("book appointment", e)),
        }
    }

    /// Appointments booked by `email` (`GET /:kind?email=`).
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn my_appointments(
        &self,
        kind: AppointmentKind,
        email: &Email,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments: Vec<Appointment> = self
            .inner
            .api
            .get_json(Access::Secure, &[kind.path()], &EmailQuery { email })
            .await?;
        Ok(tag(kind, appointments))
    }

    /// Every appointment of `kind` (admin, `GET /:kind`).
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn all_appointments(
        &self,
        kind: AppointmentKind,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments: Vec<Appointment> = self
            .inner
            .api
            .get_json(Access::Secure, &[kind.path()], NO_QUERY)
            .await?;
        Ok(tag(kind, appointments))
    }

    /// Move `appointment` to `status` (`PATCH /:kind/:id`, admin).
    ///
    /// Transitions out of a terminal state, or skipping confirmation, are
    /// refused before any request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`AppointmentError::InvalidTransition`] or the API error.
    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id, from = %appointment.status, to = %status))]
    pub async fn update_status(
        &self,
        kind: AppointmentKind,
        appointment: &Appointment,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        if !appointment.status.can_transition_to(status) {
            let err = AppointmentError::InvalidTransition {
                from: appointment.status,
                to: status,
            };
            self.inner.notifier.notify(Toast::error(err.to_string()));
            return Err(err);
        }

        if let Err(e) = self
            .inner
            .api
            .patch(
                Access::Secure,
                &[kind.path(), appointment.id.as_str()],
                &StatusUpdate { status },
            )
            .await
        {
            return Err(self.fail("update appointment", e));
        }

        self.inner
            .notifier
            .notify(Toast::success(format!("Appointment {status}")));
        Ok(Appointment {
            status,
            ..appointment.clone()
        })
    }

    fn fail(&self, action: &str, err: ApiError) -> AppointmentError {
        tracing::error!(error = %err, action, "Appointment request failed");
        self.inner
            .notifier
            .notify(Toast::error(format!("Could not {action}: {err}")));
        AppointmentError::Api(err)
    }
}

fn tag(kind: AppointmentKind, mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    for appointment in &mut appointments {
        if appointment.kind.is_none() {
            appointment.kind = Some(kind);
        }
    }
    appointments
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_appointment() {
        let json = r#"{
            "_id": "apt-1",
            "petName": "Mochi",
            "petType": "cat",
            "service": "Vaccination",
            "date": "2026-10-20",
            "time": "09:00",
            "ownerName": "Kim",
            "ownerEmail": "kim@example.com",
            "status": "confirmed"
        }"#;

        let appointment: Appointment = serde_json::from_str(json).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);
        assert!(appointment.kind.is_none());

        let tagged = tag(AppointmentKind::Healthcare, vec![appointment]);
        assert_eq!(tagged[0].kind, Some(AppointmentKind::Healthcare));
    }

    #[test]
    fn test_book_request_wire_shape() {
        let request = AppointmentRequest {
            pet_name: "Mochi".to_string(),
            pet_type: "cat".to_string(),
            pet_age: None,
            service: "Vaccination".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time: "09:00".to_string(),
            owner_name: "Kim".to_string(),
            owner_email: Email::parse("kim@example.com").unwrap(),
            phone: "555-0199".to_string(),
            notes: None,
        };
        let value = serde_json::to_value(BookRequest {
            request: &request,
            status: AppointmentStatus::Pending,
        })
        .unwrap();

        assert_eq!(value["petName"], "Mochi");
        assert_eq!(value["date"], "2026-10-20");
        assert_eq!(value["ownerEmail"], "kim@example.com");
        assert_eq!(value["status"], "pending");
        assert!(value.get("notes").is_none());
    }
}
