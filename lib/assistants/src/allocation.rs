//! Table allocation assistant: which staff member serves which tables on a
//! given day.

use crate::error::DomainError;
use crate::tools::{bind, output};
use async_trait::async_trait;
use brigade_conversation::{
    FieldSpec, FieldType, HandlerError, RegistryError, SchemaSpec, ToolDefinition, ToolRegistry,
    parse_args,
};
use brigade_core::RestaurantId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

/// Tables assigned to a staff member for one service day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableAllocation {
    pub id: String,
    pub staff_id: String,
    pub date: NaiveDate,
    pub tables: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// Input for creating an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTableAllocation {
    pub staff_id: String,
    pub date: NaiveDate,
    pub tables: Vec<u32>,
    #[serde(default)]
    pub section: Option<String>,
}

/// Partial update of an allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableAllocationUpdate {
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub tables: Option<Vec<u32>>,
    #[serde(default)]
    pub section: Option<String>,
}

impl TableAllocationUpdate {
    /// Applies the update to an allocation.
    pub fn apply_to(self, allocation: &mut TableAllocation) {
        if let Some(staff_id) = self.staff_id {
            allocation.staff_id = staff_id;
        }
        if let Some(date) = self.date {
            allocation.date = date;
        }
        if let Some(tables) = self.tables {
            allocation.tables = tables;
        }
        if self.section.is_some() {
            allocation.section = self.section;
        }
    }
}

/// Which allocations to list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationFilter {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub staff_id: Option<String>,
}

impl AllocationFilter {
    /// Returns true if the allocation passes the filter.
    #[must_use]
    pub fn matches(&self, allocation: &TableAllocation) -> bool {
        self.date.is_none_or(|date| date == allocation.date)
            && self
                .staff_id
                .as_ref()
                .is_none_or(|id| *id == allocation.staff_id)
    }
}

/// Table allocations of each restaurant.
#[async_trait]
pub trait TableAllocationService: Send + Sync {
    /// Creates an allocation.
    async fn create(
        &self,
        restaurant: &RestaurantId,
        allocation: NewTableAllocation,
    ) -> Result<TableAllocation, DomainError>;

    /// Updates an allocation.
    async fn update(
        &self,
        restaurant: &RestaurantId,
        id: &str,
        changes: TableAllocationUpdate,
    ) -> Result<TableAllocation, DomainError>;

    /// Deletes an allocation and returns the removed record.
    async fn delete(
        &self,
        restaurant: &RestaurantId,
        id: &str,
    ) -> Result<TableAllocation, DomainError>;

    /// Lists allocations by date.
    async fn list(
        &self,
        restaurant: &RestaurantId,
        filter: AllocationFilter,
    ) -> Result<Vec<TableAllocation>, DomainError>;
}

#[derive(Deserialize)]
struct IdArgs {
    id: String,
}

#[derive(Deserialize)]
struct UpdateArgs {
    id: String,
    #[serde(flatten)]
    changes: TableAllocationUpdate,
}

const DATE_HINT: &str = "service day as YYYY-MM-DD";

fn allocation_fields(schema: SchemaSpec, required: bool) -> SchemaSpec {
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
            field(FieldType::String).describe("Id of the staff member serving the tables"),
        )
        .field("date", field(FieldType::String).describe(DATE_HINT))
        .field(
            "tables",
            field(FieldType::Array).describe("Table numbers, e.g. [1, 2, 5]"),
        )
        .field(
            "section",
            FieldSpec::optional(FieldType::String).describe("Dining room section"),
        )
}

async fn create_allocation(
    service: Arc<dyn TableAllocationService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let allocation: NewTableAllocation = parse_args(args)?;
    output(&service.create(&restaurant, allocation).await?)
}

async fn update_allocation(
    service: Arc<dyn TableAllocationService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let args: UpdateArgs = parse_args(args)?;
    output(&service.update(&restaurant, &args.id, args.changes).await?)
}

async fn delete_allocation(
    service: Arc<dyn TableAllocationService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let args: IdArgs = parse_args(args)?;
    let removed = service.delete(&restaurant, &args.id).await?;
    Ok(json!({ "deleted": true, "tableAllocation": output(&removed)? }))
}

async fn list_allocations(
    service: Arc<dyn TableAllocationService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let filter: AllocationFilter = parse_args(args)?;
    output(&service.list(&restaurant, filter).await?)
}

/// Builds the table allocation assistant's tools.
///
/// # Errors
///
/// Returns [`RegistryError`] if two tools share a name.
pub fn table_allocation_tools(
    service: &Arc<dyn TableAllocationService>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    let id = |description: &str| FieldSpec::required(FieldType::String).describe(description);

    registry.register(ToolDefinition::new(
        "createTableAllocation",
        "Assign tables to a staff member for a service day. A table can only \
         be assigned to one staff member per day.",
        allocation_fields(SchemaSpec::new(), true),
        bind(service, create_allocation),
    ))?;
    registry.register(ToolDefinition::new(
        "updateTableAllocation",
        "Change an existing table allocation. Only the given fields change.",
        allocation_fields(
            SchemaSpec::new().field("id", id("Id of the allocation to update")),
            false,
        ),
        bind(service, update_allocation),
    ))?;
    registry.register(ToolDefinition::new(
        "deleteTableAllocation",
        "Delete a table allocation. Only call this after the administrator has \
         explicitly confirmed the deletion in the conversation.",
        SchemaSpec::new().field("id", id("Id of the allocation to delete")),
        bind(service, delete_allocation),
    ))?;
    registry.register(ToolDefinition::new(
        "listTableAllocations",
        "List table allocations, optionally for one day or one staff member.",
        SchemaSpec::new()
            .field(
                "date",
                FieldSpec::optional(FieldType::String).describe(DATE_HINT),
            )
            .field("staffId", FieldSpec::optional(FieldType::String)),
        bind(service, list_allocations),
    ))?;

    Ok(registry)
}
