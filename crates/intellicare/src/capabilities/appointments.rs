use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::{required_str, Argument, Capability, CapabilityDescriptor, CapabilityName};
use crate::errors::{CapabilityError, CapabilityResult};

const DATETIME_DETAIL: &str = "ISO 8601 format, UTC timezone";

/// The scheduling backend behind the appointment capabilities
#[async_trait]
pub trait AppointmentBook: Send + Sync {
    async fn is_available(&self, at: DateTime<Utc>) -> Result<bool>;

    async fn schedule(&self, at: DateTime<Utc>, name: &str, email: &str) -> Result<bool>;

    async fn cancel(&self, at: DateTime<Utc>, name: &str, email: &str) -> Result<bool>;
}

/// Accepts every request and only logs it. Stands in until a real calendar is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptingAppointmentBook;

#[async_trait]
impl AppointmentBook for AcceptingAppointmentBook {
    async fn is_available(&self, at: DateTime<Utc>) -> Result<bool> {
        info!(%at, "checking appointment availability");
        Ok(true)
    }

    async fn schedule(&self, at: DateTime<Utc>, name: &str, email: &str) -> Result<bool> {
        info!(%at, name, email, "scheduling appointment");
        Ok(true)
    }

    async fn cancel(&self, at: DateTime<Utc>, name: &str, email: &str) -> Result<bool> {
        info!(%at, name, email, "deleting appointment");
        Ok(true)
    }
}

/// Layouts accepted when the value carries no offset; a trailing `Z` is allowed
const NAIVE_LAYOUTS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y%m%dT%H%M%S"];

fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(naive, layout).ok())
        .map(|at| at.and_utc())
}

fn parse_datetime(arguments: &[Value]) -> CapabilityResult<DateTime<Utc>> {
    let raw = required_str(arguments, 0, "datetime")?;
    parse_iso8601(raw.trim()).ok_or_else(|| {
        CapabilityError::InvalidArguments(format!("datetime '{}' is not ISO 8601", raw))
    })
}

fn booking_arguments(arguments: &[Value]) -> CapabilityResult<(DateTime<Utc>, &str, &str)> {
    let at = parse_datetime(arguments)?;
    let name = required_str(arguments, 1, "name")?;
    let email = required_str(arguments, 2, "email")?;
    Ok((at, name, email))
}

fn booking_descriptor(name: CapabilityName) -> CapabilityDescriptor {
    CapabilityDescriptor {
        name,
        description: None,
        arguments: vec![
            Argument {
                name: "datetime",
                detail: DATETIME_DETAIL,
            },
            Argument {
                name: "name",
                detail: "String",
            },
            Argument {
                name: "email",
                detail: "String",
            },
        ],
        notes: vec![],
    }
}

fn execution_failed(error: anyhow::Error) -> CapabilityError {
    CapabilityError::ExecutionFailed(error.to_string())
}

pub struct CheckAppointmentAvailability {
    book: Arc<dyn AppointmentBook>,
    descriptor: CapabilityDescriptor,
}

impl CheckAppointmentAvailability {
    pub fn new(book: Arc<dyn AppointmentBook>) -> Self {
        Self {
            book,
            descriptor: CapabilityDescriptor {
                name: CapabilityName::CheckAppointmentAvailability,
                description: None,
                arguments: vec![Argument {
                    name: "datetime",
                    detail: DATETIME_DETAIL,
                }],
                notes: vec![],
            },
        }
    }
}

#[async_trait]
impl Capability for CheckAppointmentAvailability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(&self, arguments: &[Value]) -> CapabilityResult<String> {
        let at = parse_datetime(arguments)?;
        let available = self.book.is_available(at).await.map_err(execution_failed)?;
        Ok(available.to_string())
    }
}

pub struct ScheduleAppointment {
    book: Arc<dyn AppointmentBook>,
    descriptor: CapabilityDescriptor,
}

impl ScheduleAppointment {
    pub fn new(book: Arc<dyn AppointmentBook>) -> Self {
        Self {
            book,
            descriptor: booking_descriptor(CapabilityName::ScheduleAppointment),
        }
    }
}

#[async_trait]
impl Capability for ScheduleAppointment {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(&self, arguments: &[Value]) -> CapabilityResult<String> {
        let (at, name, email) = booking_arguments(arguments)?;
        let scheduled = self
            .book
            .schedule(at, name, email)
            .await
            .map_err(execution_failed)?;
        Ok(scheduled.to_string())
    }
}

pub struct DeleteAppointment {
    book: Arc<dyn AppointmentBook>,
    descriptor: CapabilityDescriptor,
}

impl DeleteAppointment {
    pub fn new(book: Arc<dyn AppointmentBook>) -> Self {
        Self {
            book,
            descriptor: booking_descriptor(CapabilityName::DeleteAppointment),
        }
    }
}

#[async_trait]
impl Capability for DeleteAppointment {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(&self, arguments: &[Value]) -> CapabilityResult<String> {
        let (at, name, email) = booking_arguments(arguments)?;
        let deleted = self
            .book
            .cancel(at, name, email)
            .await
            .map_err(execution_failed)?;
        Ok(deleted.to_string())
    }
}
