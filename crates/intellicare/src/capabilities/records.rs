use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{optional_str, required_str, Argument, Capability, CapabilityDescriptor, CapabilityName};
use crate::errors::CapabilityResult;
use crate::models::patient::PatientRecord;

/// How many patients a search returns at most
pub const SEARCH_LIMIT: usize = 5;

/// Access to the medical records database
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Newest first. With no query, the most recent records; otherwise records whose
    /// first or last name contains the query, or whose id equals it.
    async fn search_patients(&self, query: Option<&str>, limit: usize)
        -> Result<Vec<PatientRecord>>;

    /// Run a read-only query through a privilege-limited channel, one JSON object per row
    async fn execute_select(&self, sql: &str) -> Result<Vec<Value>>;
}

/// Record store held in memory, optionally seeded from a JSON array of records
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    patients: Vec<PatientRecord>,
}

impl InMemoryRecordStore {
    pub fn new(patients: Vec<PatientRecord>) -> Self {
        Self { patients }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read patient records from {}", path.display()))?;
        let patients: Vec<PatientRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid patient records in {}", path.display()))?;
        Ok(Self::new(patients))
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}

fn matches_query(record: &PatientRecord, query: &str, id: Option<Uuid>) -> bool {
    let needle = query.to_lowercase();
    let name_matches = |name: &str| name.to_lowercase().contains(&needle);

    name_matches(record.first_name.as_str())
        || record.last_name.as_deref().is_some_and(name_matches)
        || id.is_some_and(|id| record.id == id)
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn search_patients(
        &self,
        query: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PatientRecord>> {
        let id = query.and_then(|q| Uuid::parse_str(q).ok());
        let mut found: Vec<PatientRecord> = self
            .patients
            .iter()
            .filter(|record| query.map_or(true, |q| matches_query(record, q, id)))
            .cloned()
            .collect();

        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn execute_select(&self, _sql: &str) -> Result<Vec<Value>> {
        Err(anyhow!(
            "raw SQL queries are not supported by the in-memory record store"
        ))
    }
}

pub struct QueryPatientRecords {
    store: Arc<dyn RecordStore>,
    descriptor: CapabilityDescriptor,
}

impl QueryPatientRecords {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            descriptor: CapabilityDescriptor {
                name: CapabilityName::QueryPatientRecords,
                description: None,
                arguments: vec![Argument {
                    name: "query",
                    detail: "String, optional: A general search string for patient details like 'John Doe' or '123'. Do NOT use 'key:value' format like 'first_name:John'. Leave empty if no specific query is given by the user and you just want a list.",
                }],
                notes: vec![],
            },
        }
    }
}

/// The search text; models often pass ids such as `123` as bare numbers
fn search_query(arguments: &[Value]) -> CapabilityResult<Option<String>> {
    match arguments.first() {
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        _ => Ok(optional_str(arguments, 0, "query")?.map(str::to_string)),
    }
}

#[async_trait]
impl Capability for QueryPatientRecords {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(&self, arguments: &[Value]) -> CapabilityResult<String> {
        let query = search_query(arguments)?;
        let query = query.as_deref().map(str::trim).filter(|q| !q.is_empty());
        info!(query = query.unwrap_or(""), "querying patient records");

        // Store failures go back to the model as text so it can explain them
        let text = match self.store.search_patients(query, SEARCH_LIMIT).await {
            Ok(records) if records.is_empty() => {
                "No patient records found matching the query.".to_string()
            }
            Ok(records) => records
                .iter()
                .map(PatientRecord::summary)
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => {
                warn!(error = %e, "patient record search failed");
                format!("Error querying patient records: {}", e)
            }
        };
        Ok(text)
    }
}

pub struct ExecuteSqlQuery {
    store: Arc<dyn RecordStore>,
    descriptor: CapabilityDescriptor,
}

impl ExecuteSqlQuery {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            descriptor: CapabilityDescriptor {
                name: CapabilityName::ExecuteSqlQuery,
                description: Some(
                    "Generates and runs a PostgreSQL SELECT query directly on the database to retrieve specific patient data.",
                ),
                arguments: vec![Argument {
                    name: "sql_code",
                    detail: "String: The full PostgreSQL SELECT query to execute. MUST ONLY be a SELECT statement. DO NOT include INSERT, UPDATE, DELETE, or DDL commands. ONLY query tables you have knowledge of, such as 'medical_records.patients'. Example: 'SELECT first_name, last_name FROM medical_records.patients WHERE gender = ''Male'' LIMIT 5;'",
                }],
                notes: vec![
                    "If this function returns data, summarize it clearly to the user, ideally using a Markdown code block for raw query results or a Markdown list for structured data.",
                    "If the user explicitly asks for a \"SQL query\", or to \"run a query\", or to \"fetch specific data\" not covered by other functions, suggest using this function.",
                    "IMPORTANT: Before generating SQL, remind the user that you can only run SELECT queries and cannot modify the database. If they ask for something that modifies data, tell them you cannot do it.",
                ],
            },
        }
    }
}

#[async_trait]
impl Capability for ExecuteSqlQuery {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(&self, arguments: &[Value]) -> CapabilityResult<String> {
        let sql = required_str(arguments, 0, "sql_code")?;
        info!(sql, "executing sql query");

        let text = match self.store.execute_select(sql).await {
            Ok(rows) if rows.is_empty() => {
                "Query executed successfully, but no data was returned.".to_string()
            }
            Ok(rows) => {
                let lines: Vec<String> = rows.iter().map(Value::to_string).collect();
                format!("Query results:\n{}", lines.join("\n"))
            }
            Err(e) => {
                warn!(error = %e, "sql query failed");
                format!("Database error: {}. Please refine your SQL query.", e)
            }
        };
        Ok(text)
    }
}
