//! Shift assistant: work shifts and their tools.

use crate::error::DomainError;
use crate::tools::{bind, output};
use async_trait::async_trait;
use brigade_conversation::{
    FieldSpec, FieldType, HandlerError, RegistryError, SchemaSpec, ToolDefinition, ToolRegistry,
    parse_args,
};
use brigade_core::RestaurantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

/// A scheduled work shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: String,
    pub staff_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Shift {
    /// Returns true if the shift overlaps the interval.
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// Input for creating a shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShift {
    pub staff_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update of a shift.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftUpdate {
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ShiftUpdate {
    /// Applies the update to a shift.
    pub fn apply_to(self, shift: &mut Shift) {
        if let Some(staff_id) = self.staff_id {
            shift.staff_id = staff_id;
        }
        if let Some(start) = self.start {
            shift.start = start;
        }
        if let Some(end) = self.end {
            shift.end = end;
        }
        if self.notes.is_some() {
            shift.notes = self.notes;
        }
    }
}

/// Which shifts to list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftFilter {
    #[serde(default)]
    pub staff_id: Option<String>,
    /// Only shifts ending after this instant.
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// Only shifts starting before this instant.
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl ShiftFilter {
    /// Returns true if the shift passes the filter.
    #[must_use]
    pub fn matches(&self, shift: &Shift) -> bool {
        self.staff_id.as_ref().is_none_or(|id| *id == shift.staff_id)
            && self.from.is_none_or(|from| shift.end > from)
            && self.to.is_none_or(|to| shift.start < to)
    }
}

/// Shift schedules of each restaurant.
#[async_trait]
pub trait ShiftService: Send + Sync {
    /// Creates a shift.
    async fn create(
        &self,
        restaurant: &RestaurantId,
        shift: NewShift,
    ) -> Result<Shift, DomainError>;

    /// Updates a shift.
    async fn update(
        &self,
        restaurant: &RestaurantId,
        id: &str,
        changes: ShiftUpdate,
    ) -> Result<Shift, DomainError>;

    /// Deletes a shift and returns the removed record.
    async fn delete(&self, restaurant: &RestaurantId, id: &str) -> Result<Shift, DomainError>;

    /// Lists shifts in start order.
    async fn list(
        &self,
        restaurant: &RestaurantId,
        filter: ShiftFilter,
    ) -> Result<Vec<Shift>, DomainError>;
}

#[derive(Deserialize)]
struct IdArgs {
    id: String,
}

#[derive(Deserialize)]
struct UpdateArgs {
    id: String,
    #[serde(flatten)]
    changes: ShiftUpdate,
}

const TIMESTAMP_HINT: &str = "RFC 3339 timestamp, e.g. 2025-03-14T17:00:00Z";

fn shift_fields(schema: SchemaSpec, required: bool) -> SchemaSpec {
    let field = |t| {
        if required {
            FieldSpec::required(t)
        } else {
            FieldSpec::optional(t)
        }
    };
    schema
        .field(
            "staffId",
            field(FieldType::String).describe("Id of the staff member working the shift"),
        )
        .field(
            "start",
            field(FieldType::String).describe(format!("Shift start, {TIMESTAMP_HINT}")),
        )
        .field(
            "end",
            field(FieldType::String).describe(format!("Shift end, {TIMESTAMP_HINT}")),
        )
        .field("notes", FieldSpec::optional(FieldType::String))
}

async fn create_shift(
    service: Arc<dyn ShiftService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let shift: NewShift = parse_args(args)?;
    output(&service.create(&restaurant, shift).await?)
}

async fn update_shift(
    service: Arc<dyn ShiftService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let args: UpdateArgs = parse_args(args)?;
    output(&service.update(&restaurant, &args.id, args.changes).await?)
}

async fn delete_shift(
    service: Arc<dyn ShiftService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let args: IdArgs = parse_args(args)?;
    let removed = service.delete(&restaurant, &args.id).await?;
    Ok(json!({ "deleted": true, "shift": output(&removed)? }))
}

async fn list_shifts(
    service: Arc<dyn ShiftService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let filter: ShiftFilter = parse_args(args)?;
    output(&service.list(&restaurant, filter).await?)
}

/// Builds the shift assistant's tools.
///
/// # Errors
///
/// Returns [`RegistryError`] if two tools share a name.
pub fn shift_tools(
    service: &Arc<dyn ShiftService>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    let id = |description: &str| FieldSpec::required(FieldType::String).describe(description);

    registry.register(ToolDefinition::new(
        "createShift",
        "Schedule a shift for a staff member. Fails if it overlaps another of their shifts.",
        shift_fields(SchemaSpec::new(), true),
        bind(service, create_shift),
    ))?;
    registry.register(ToolDefinition::new(
        "updateShift",
        "Change an existing shift. Only the given fields change.",
        shift_fields(
            SchemaSpec::new().field("id", id("Id of the shift to update")),
            false,
        ),
        bind(service, update_shift),
    ))?;
    registry.register(ToolDefinition::new(
        "deleteShift",
        "Delete a shift. Only call this after the administrator has explicitly \
         confirmed the deletion in the conversation.",
        SchemaSpec::new().field("id", id("Id of the shift to delete")),
        bind(service, delete_shift),
    ))?;
    registry.register(ToolDefinition::new(
        "listShifts",
        "List shifts, optionally for one staff member and within a time window.",
        SchemaSpec::new()
            .field(
                "staffId",
                FieldSpec::optional(FieldType::String).describe("Only this staff member"),
            )
            .field(
                "from",
                FieldSpec::optional(FieldType::String)
                    .describe(format!("Only shifts ending after this, {TIMESTAMP_HINT}")),
            )
            .field(
                "to",
                FieldSpec::optional(FieldType::String)
                    .describe(format!("Only shifts starting before this, {TIMESTAMP_HINT}")),
            ),
        bind(service, list_shifts),
    ))?;

    Ok(registry)
}
