//! Staff assistant: staff member records and their tools.

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
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Role a staff member works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Waiter,
    Bartender,
    Host,
    Chef,
    SousChef,
    LineCook,
    Dishwasher,
    Manager,
}

impl Position {
    /// Every position, in display order.
    pub const ALL: [Self; 8] = [
        Self::Waiter,
        Self::Bartender,
        Self::Host,
        Self::Chef,
        Self::SousChef,
        Self::LineCook,
        Self::Dishwasher,
        Self::Manager,
    ];

    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiter => "waiter",
            Self::Bartender => "bartender",
            Self::Host => "host",
            Self::Chef => "chef",
            Self::SousChef => "sous_chef",
            Self::LineCook => "line_cook",
            Self::Dishwasher => "dishwasher",
            Self::Manager => "manager",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::invalid(format!("unknown position '{s}'")))
    }
}

/// A member of a restaurant's staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a staff member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStaffMember {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub position: Position,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
}

/// Partial update of a staff member. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
}

impl StaffUpdate {
    /// Applies the update to a record.
    pub fn apply_to(self, staff: &mut StaffMember) {
        if let Some(name) = self.name {
            staff.name = name;
        }
        if let Some(surname) = self.surname {
            staff.surname = surname;
        }
        if let Some(email) = self.email {
            staff.email = email;
        }
        if let Some(position) = self.position {
            staff.position = position;
        }
        if self.tag.is_some() {
            staff.tag = self.tag;
        }
        if self.phone.is_some() {
            staff.phone = self.phone;
        }
        if self.hourly_rate.is_some() {
            staff.hourly_rate = self.hourly_rate;
        }
    }
}

/// Staff records of each restaurant.
#[async_trait]
pub trait StaffService: Send + Sync {
    /// Creates a staff member.
    async fn create(
        &self,
        restaurant: &RestaurantId,
        staff: NewStaffMember,
    ) -> Result<StaffMember, DomainError>;

    /// Updates a staff member.
    async fn update(
        &self,
        restaurant: &RestaurantId,
        id: &str,
        changes: StaffUpdate,
    ) -> Result<StaffMember, DomainError>;

    /// Deletes a staff member and returns the removed record.
    async fn delete(&self, restaurant: &RestaurantId, id: &str) -> Result<StaffMember, DomainError>;

    /// Gets a staff member.
    async fn get(&self, restaurant: &RestaurantId, id: &str) -> Result<StaffMember, DomainError>;

    /// Lists staff members, optionally only those in one position.
    async fn list(
        &self,
        restaurant: &RestaurantId,
        position: Option<Position>,
    ) -> Result<Vec<StaffMember>, DomainError>;

    /// Lists the positions staff can hold.
    async fn positions(&self, restaurant: &RestaurantId) -> Result<Vec<Position>, DomainError>;
}

#[derive(Deserialize)]
struct IdArgs {
    id: String,
}

#[derive(Deserialize)]
struct UpdateArgs {
    id: String,
    #[serde(flatten)]
    changes: StaffUpdate,
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    position: Option<Position>,
}

fn position_field() -> FieldSpec {
    FieldSpec::optional(FieldType::String)
        .one_of(Position::ALL.iter().map(Position::as_str))
        .describe("Position the staff member works in")
}

fn staff_fields(schema: SchemaSpec, required: bool) -> SchemaSpec {
    let field = |t| {
        if required {
            FieldSpec::required(t)
        } else {
            FieldSpec::optional(t)
        }
    };
    let mut position = position_field();
    position.required = required;

    schema
        .field("name", field(FieldType::String).describe("First name"))
        .field("surname", field(FieldType::String).describe("Last name"))
        .field("email", field(FieldType::String).describe("Email address"))
        .field("position", position)
        .field(
            "tag",
            FieldSpec::optional(FieldType::String).describe("Short tag such as initials"),
        )
        .field("phone", FieldSpec::optional(FieldType::String))
        .field(
            "hourlyRate",
            FieldSpec::optional(FieldType::Number).describe("Hourly wage"),
        )
}

fn id_schema(description: &str) -> SchemaSpec {
    SchemaSpec::new().field("id", FieldSpec::required(FieldType::String).describe(description))
}

async fn create_staff(
    service: Arc<dyn StaffService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let staff: NewStaffMember = parse_args(args)?;
    output(&service.create(&restaurant, staff).await?)
}

async fn update_staff(
    service: Arc<dyn StaffService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let args: UpdateArgs = parse_args(args)?;
    output(&service.update(&restaurant, &args.id, args.changes).await?)
}

async fn delete_staff(
    service: Arc<dyn StaffService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let args: IdArgs = parse_args(args)?;
    let removed = service.delete(&restaurant, &args.id).await?;
    Ok(json!({ "deleted": true, "staffMember": output(&removed)? }))
}

async fn get_staff(
    service: Arc<dyn StaffService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let args: IdArgs = parse_args(args)?;
    output(&service.get(&restaurant, &args.id).await?)
}

async fn list_staff(
    service: Arc<dyn StaffService>,
    restaurant: RestaurantId,
    args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    let args: ListArgs = parse_args(args)?;
    output(&service.list(&restaurant, args.position).await?)
}

async fn list_positions(
    service: Arc<dyn StaffService>,
    restaurant: RestaurantId,
    _args: JsonValue,
) -> Result<JsonValue, HandlerError> {
    output(&service.positions(&restaurant).await?)
}

/// Builds the staff assistant's tools.
///
/// # Errors
///
/// Returns [`RegistryError`] if two tools share a name.
pub fn staff_tools(
    service: &Arc<dyn StaffService>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();

    registry.register(ToolDefinition::new(
        "createStaffMember",
        "Create a new staff member. Returns the created record including its id.",
        staff_fields(SchemaSpec::new(), true),
        bind(service, create_staff),
    ))?;
    registry.register(ToolDefinition::new(
        "updateStaffMember",
        "Update fields of an existing staff member. Only the given fields change.",
        staff_fields(id_schema("Id of the staff member to update"), false),
        bind(service, update_staff),
    ))?;
    registry.register(ToolDefinition::new(
        "deleteStaffMember",
        "Delete a staff member. Only call this after the administrator has \
         explicitly confirmed the deletion in the conversation.",
        id_schema("Id of the staff member to delete"),
        bind(service, delete_staff),
    ))?;
    registry.register(ToolDefinition::new(
        "getStaffMember",
        "Get one staff member by id.",
        id_schema("Id of the staff member"),
        bind(service, get_staff),
    ))?;
    registry.register(ToolDefinition::new(
        "listStaffMembers",
        "List staff members, optionally filtered by position. Use this to find \
         a staff member's id from their name.",
        SchemaSpec::new().field("position", position_field()),
        bind(service, list_staff),
    ))?;
    registry.register(ToolDefinition::new(
        "listPositions",
        "List the positions a staff member can hold.",
        SchemaSpec::new(),
        bind(service, list_positions),
    ))?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStaffService;
    use crate::tools::RestaurantTools;
    use brigade_conversation::ToolError;

    fn setup() -> (RestaurantTools, Arc<dyn StaffService>) {
        let service: Arc<dyn StaffService> = Arc::new(InMemoryStaffService::new());
        let registry = RestaurantTools::new(staff_tools(&service).unwrap(), "r1");
        (registry, service)
    }

    fn john() -> JsonValue {
        json!({
            "name": "John",
            "surname": "Doe",
            "email": "john@x.com",
            "position": "waiter",
            "tag": "JD",
        })
    }

    #[test]
    fn registers_every_staff_tool() {
        let (registry, _) = setup();
        let names: Vec<_> = registry.describe_all().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "createStaffMember",
                "updateStaffMember",
                "deleteStaffMember",
                "getStaffMember",
                "listStaffMembers",
                "listPositions",
            ]
        );
    }

    #[test]
    fn delete_tool_asks_for_confirmation() {
        let (registry, _) = setup();
        let delete = registry.get("deleteStaffMember").unwrap();
        assert!(delete.description.contains("confirmed"));
    }

    #[tokio::test]
    async fn create_then_get() {
        let (registry, _) = setup();

        let created = registry.invoke("createStaffMember", john()).await.unwrap();
        assert_eq!(created["name"], "John");
        assert_eq!(created["surname"], "Doe");
        assert_eq!(created["tag"], "JD");

        let id = created["id"].as_str().unwrap();
        let fetched = registry
            .invoke("getStaffMember", json!({"id": id}))
            .await
            .unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let (registry, _) = setup();
        let created = registry.invoke("createStaffMember", john()).await.unwrap();

        let updated = registry
            .invoke(
                "updateStaffMember",
                json!({"id": created["id"], "position": "bartender"}),
            )
            .await
            .unwrap();

        assert_eq!(updated["position"], "bartender");
        assert_eq!(updated["email"], "john@x.com");
    }

    #[tokio::test]
    async fn unknown_position_is_rejected_by_schema() {
        let (registry, _) = setup();
        let mut args = john();
        args["position"] = json!("astronaut");

        let err = registry.invoke("createStaffMember", args).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn missing_staff_member_is_a_handler_error() {
        let (registry, _) = setup();
        let err = registry
            .invoke("deleteStaffMember", json!({"id": "nope"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn list_filters_by_position() {
        let (registry, service) = setup();
        registry.invoke("createStaffMember", john()).await.unwrap();
        let mut chef = john();
        chef["email"] = json!("ann@x.com");
        chef["position"] = json!("chef");
        registry.invoke("createStaffMember", chef).await.unwrap();

        let chefs = registry
            .invoke("listStaffMembers", json!({"position": "chef"}))
            .await
            .unwrap();
        assert_eq!(chefs.as_array().unwrap().len(), 1);

        let restaurant: RestaurantId = "r1".parse().unwrap();
        assert_eq!(service.list(&restaurant, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn positions_are_listed() {
        let (registry, _) = setup();
        let positions = registry.invoke("listPositions", json!({})).await.unwrap();
        assert_eq!(positions.as_array().unwrap().len(), Position::ALL.len());
        assert_eq!(positions[0], "waiter");
    }
}
