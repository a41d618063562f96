//! Multi-step appointment booking form.
//!
//! The form walks `Pet -> Service -> Schedule -> Contact`. "Next" is only
//! available once every required field of the current step has a
//! non-blank value; [`BookingForm::submit`] validates the whole form and
//! produces an [`AppointmentRequest`].

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use petverse_core::{AppointmentKind, Email, EmailError};
use thiserror::Error;

use super::AppointmentRequest;

const GROOMING_SERVICES: &[&str] = &[
    "Bath & Brush",
    "Full Groom",
    "Nail Trim",
    "Teeth Cleaning",
    "De-shedding",
];

const HEALTHCARE_SERVICES: &[&str] = &[
    "General Checkup",
    "Vaccination",
    "Dental Care",
    "Deworming",
    "Surgery Consultation",
];

/// Services offered for `kind`.
#[must_use]
pub const fn services(kind: AppointmentKind) -> &'static [&'static str] {
    match kind {
        AppointmentKind::Grooming => GROOMING_SERVICES,
        AppointmentKind::Healthcare => HEALTHCARE_SERVICES,
    }
}

/// One page of the booking form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BookingStep {
    Pet,
    Service,
    Schedule,
    Contact,
}

impl BookingStep {
    pub const ALL: [Self; 4] = [Self::Pet, Self::Service, Self::Schedule, Self::Contact];

    /// Zero-based position in the form.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Pet => 0,
            Self::Service => 1,
            Self::Schedule => 2,
            Self::Contact => 3,
        }
    }

    #[must_use]
    pub const fn is_first(self) -> bool {
        matches!(self, Self::Pet)
    }

    #[must_use]
    pub const fn is_last(self) -> bool {
        matches!(self, Self::Contact)
    }

    /// Fields that must be filled before leaving this step.
    #[must_use]
    pub const fn required_fields(self) -> &'static [BookingField] {
        match self {
            Self::Pet => &[BookingField::PetName, BookingField::PetType],
            Self::Service => &[BookingField::Service],
            Self::Schedule => &[BookingField::Date, BookingField::Time],
            Self::Contact => &[
                BookingField::OwnerName,
                BookingField::OwnerEmail,
                BookingField::Phone,
            ],
        }
    }

    const fn next(self) -> Self {
        match self {
            Self::Pet => Self::Service,
            Self::Service => Self::Schedule,
            Self::Schedule | Self::Contact => Self::Contact,
        }
    }

    const fn previous(self) -> Self {
        match self {
            Self::Pet | Self::Service => Self::Pet,
            Self::Schedule => Self::Service,
            Self::Contact => Self::Schedule,
        }
    }
}

impl std::fmt::Display for BookingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pet => write!(f, "Pet details"),
            Self::Service => write!(f, "Service"),
            Self::Schedule => write!(f, "Date & time"),
            Self::Contact => write!(f, "Contact"),
        }
    }
}

/// An input of the booking form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingField {
    PetName,
    PetType,
    PetAge,
    Service,
    Date,
    Time,
    OwnerName,
    OwnerEmail,
    Phone,
    Notes,
}

impl std::fmt::Display for BookingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::PetName => "pet name",
            Self::PetType => "pet type",
            Self::PetAge => "pet age",
            Self::Service => "service",
            Self::Date => "date",
            Self::Time => "time",
            Self::OwnerName => "owner name",
            Self::OwnerEmail => "email",
            Self::Phone => "phone",
            Self::Notes => "notes",
        };
        f.write_str(label)
    }
}

/// Errors from advancing or submitting a [`BookingForm`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("missing required fields: {}", join(.0))]
    MissingFields(Vec<BookingField>),

    #[error("the form can only be submitted from the last step")]
    NotOnLastStep,

    #[error("invalid date {0:?} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("invalid time {0:?} (expected HH:MM)")]
    InvalidTime(String),

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("unknown {kind} service: {service}")]
    UnknownService {
        kind: AppointmentKind,
        service: String,
    },
}

fn join(fields: &[BookingField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// State of an in-progress booking.
#[derive(Debug, Clone)]
pub struct BookingForm {
    kind: AppointmentKind,
    step: BookingStep,
    values: HashMap<BookingField, String>,
}

impl BookingForm {
    #[must_use]
    pub fn new(kind: AppointmentKind) -> Self {
        Self {
            kind,
            step: BookingStep::Pet,
            values: HashMap::new(),
        }
    }

    /// Pre-fill the contact step from the signed-in user.
    #[must_use]
    pub fn with_contact(mut self, name: &str, email: &Email) -> Self {
        self.set(BookingField::OwnerName, name);
        self.set(BookingField::OwnerEmail, email.as_str());
        self
    }

    #[must_use]
    pub const fn kind(&self) -> AppointmentKind {
        self.kind
    }

    #[must_use]
    pub const fn step(&self) -> BookingStep {
        self.step
    }

    /// Current value of `field`, untrimmed.
    #[must_use]
    pub fn get(&self, field: BookingField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn set(&mut self, field: BookingField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    /// Required fields of the current step that are still blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<BookingField> {
        self.missing_in(self.step.required_fields())
    }

    /// Whether "Next" is enabled.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Move to the next step.
    ///
    /// Stays on the last step once reached.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::MissingFields`] if the current step is
    /// incomplete.
    pub fn next(&mut self) -> Result<BookingStep, BookingError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(BookingError::MissingFields(missing));
        }
        self.step = self.step.next();
        Ok(self.step)
    }

    /// Move to the previous step; values are kept.
    pub const fn back(&mut self) -> BookingStep {
        self.step = self.step.previous();
        self.step
    }

    /// Validate the form and build the request.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotOnLastStep`] before the contact step, and
    /// a validation error for any blank or malformed field.
    pub fn submit(&self) -> Result<AppointmentRequest, BookingError> {
        if !self.step.is_last() {
            return Err(BookingError::NotOnLastStep);
        }

        let required: Vec<BookingField> = BookingStep::ALL
            .iter()
            .flat_map(|step| step.required_fields().iter().copied())
            .collect();
        let missing = self.missing_in(&required);
        if !missing.is_empty() {
            return Err(BookingError::MissingFields(missing));
        }

        let service = self.trimmed(BookingField::Service).unwrap_or_default();
        if !services(self.kind).contains(&service) {
            return Err(BookingError::UnknownService {
                kind: self.kind,
                service: service.to_string(),
            });
        }

        let date_raw = self.trimmed(BookingField::Date).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d")
            .map_err(|_| BookingError::InvalidDate(date_raw.to_string()))?;

        let time_raw = self.trimmed(BookingField::Time).unwrap_or_default();
        let time = NaiveTime::parse_from_str(time_raw, "%H:%M")
            .map_err(|_| BookingError::InvalidTime(time_raw.to_string()))?;

        let owner_email = Email::parse(self.trimmed(BookingField::OwnerEmail).unwrap_or_default())?;

        Ok(AppointmentRequest {
            pet_name: self.owned(BookingField::PetName),
            pet_type: self.owned(BookingField::PetType),
            pet_age: self.trimmed(BookingField::PetAge).map(str::to_string),
            service: service.to_string(),
            date,
            time: time.format("%H:%M").to_string(),
            owner_name: self.owned(BookingField::OwnerName),
            owner_email,
            phone: self.owned(BookingField::Phone),
            notes: self.trimmed(BookingField::Notes).map(str::to_string),
        })
    }

    fn trimmed(&self, field: BookingField) -> Option<&str> {
        self.values
            .get(&field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn owned(&self, field: BookingField) -> String {
        self.trimmed(field).unwrap_or_default().to_string()
    }

    fn missing_in(&self, fields: &[BookingField]) -> Vec<BookingField> {
        fields
            .iter()
            .copied()
            .filter(|f| self.trimmed(*f).is_none())
            .collect()
    }
}
