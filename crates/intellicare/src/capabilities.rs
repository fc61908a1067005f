//! Host actions the model may request by name.
//!
//! The set of capabilities is fixed at compile time by [`CapabilityName`]; the
//! registry maps each name to one executor and is never mutated once built, so
//! it can be shared across requests behind an `Arc` without locking.
pub mod appointments;
pub mod records;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::errors::{CapabilityError, CapabilityResult};
use appointments::{
    AppointmentBook, CheckAppointmentAvailability, DeleteAppointment, ScheduleAppointment,
};
use records::{ExecuteSqlQuery, QueryPatientRecords, RecordStore};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumIter, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CapabilityName {
    CheckAppointmentAvailability,
    ScheduleAppointment,
    DeleteAppointment,
    QueryPatientRecords,
    ExecuteSqlQuery,
}

/// A positional argument as described to the model
#[derive(Debug, Clone, Serialize)]
pub struct Argument {
    pub name: &'static str,
    pub detail: &'static str,
}

/// Everything the system prompt needs to know about a capability
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityDescriptor {
    pub name: CapabilityName,
    pub description: Option<&'static str>,
    pub arguments: Vec<Argument>,
    pub notes: Vec<&'static str>,
}

/// A named host action with a uniform positional calling convention.
///
/// Implementations validate their own arguments. A handler that receives too
/// few or mistyped arguments must return an error rather than panic; the error
/// is handed back to the model as text.
#[async_trait]
pub trait Capability: Send + Sync {
    fn descriptor(&self) -> &CapabilityDescriptor;

    async fn execute(&self, arguments: &[Value]) -> CapabilityResult<String>;
}

/// Read-only dispatch table from capability name to executor
pub struct CapabilityRegistry {
    capabilities: HashMap<CapabilityName, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    /// The standard hospital administration capabilities
    pub fn new(book: Arc<dyn AppointmentBook>, store: Arc<dyn RecordStore>) -> Self {
        Self::from_capabilities(vec![
            Arc::new(CheckAppointmentAvailability::new(book.clone())),
            Arc::new(ScheduleAppointment::new(book.clone())),
            Arc::new(DeleteAppointment::new(book)),
            Arc::new(QueryPatientRecords::new(store.clone())),
            Arc::new(ExecuteSqlQuery::new(store)),
        ])
    }

    /// Build a registry from explicit executors; a later entry for the same name wins
    pub fn from_capabilities(capabilities: Vec<Arc<dyn Capability>>) -> Self {
        let capabilities = capabilities
            .into_iter()
            .map(|capability| (capability.descriptor().name, capability))
            .collect();
        Self { capabilities }
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn Capability> {
        let name = CapabilityName::from_str(name).ok()?;
        self.capabilities.get(&name).map(|v| &**v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Run a capability by name with positional arguments
    pub async fn execute(&self, name: &str, arguments: &[Value]) -> CapabilityResult<String> {
        let capability = self
            .lookup(name)
            .ok_or_else(|| CapabilityError::UnknownCapability(name.to_string()))?;
        capability.execute(arguments).await
    }

    /// Descriptors of the registered capabilities, in declaration order
    pub fn descriptors(&self) -> Vec<&CapabilityDescriptor> {
        CapabilityName::iter()
            .filter_map(|name| self.capabilities.get(&name))
            .map(|capability| capability.descriptor())
            .collect()
    }
}

/// Fetch a required string argument at `index`
pub(crate) fn required_str<'a>(
    arguments: &'a [Value],
    index: usize,
    name: &str,
) -> CapabilityResult<&'a str> {
    match arguments.get(index) {
        Some(Value::String(value)) => Ok(value),
        Some(other) => Err(CapabilityError::InvalidArguments(format!(
            "argument {} ({}) must be a string, got {}",
            index + 1,
            name,
            other
        ))),
        None => Err(CapabilityError::InvalidArguments(format!(
            "missing argument {} ({})",
            index + 1,
            name
        ))),
    }
}

/// Fetch an optional string argument at `index`; null counts as absent
pub(crate) fn optional_str<'a>(
    arguments: &'a [Value],
    index: usize,
    name: &str,
) -> CapabilityResult<Option<&'a str>> {
    match arguments.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_str(arguments, index, name).map(Some),
    }
}
