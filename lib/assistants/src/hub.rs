//! The assistants of one deployment and the threads they keep.
//!
//! Each assistant kind has one controller and one tool registry, built when
//! the hub is created. The restaurant a turn acts on is set around the turn,
//! and thread ids carry the restaurant, so an administrator's threads and
//! records never mix across restaurants.

use crate::allocation::{TableAllocationService, table_allocation_tools};
use crate::error::{HubError, UnknownAssistantKind};
use crate::memory::{InMemoryShiftService, InMemoryStaffService, InMemoryTableAllocationService};
use crate::prompts::{shift_prompt, staff_prompt, table_allocation_prompt};
use crate::shift::{ShiftService, shift_tools};
use crate::staff::{StaffService, staff_tools};
use crate::tools::in_restaurant;
use brigade_ai::LlmBackend;
use brigade_conversation::{
    AssistantReply, ConversationConfig, ConversationController, InMemoryThreadStore, Message,
    RegistryError, Thread, ThreadId, ThreadStore, ToolDefinition, ToolRegistry,
};
use brigade_core::{AdminId, RestaurantId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// The assistants on offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssistantKind {
    Staff,
    Shift,
    TableAllocation,
}

impl AssistantKind {
    /// Every kind.
    pub const ALL: [Self; 3] = [Self::Staff, Self::Shift, Self::TableAllocation];

    /// Returns the kind as used in paths and thread ids.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Shift => "shift",
            Self::TableAllocation => "table-allocation",
        }
    }

    /// Returns the system message new threads of this kind start from.
    #[must_use]
    pub fn seed(&self) -> Message {
        Message::system(match self {
            Self::Staff => staff_prompt(),
            Self::Shift => shift_prompt(),
            Self::TableAllocation => table_allocation_prompt(),
        })
    }
}

impl fmt::Display for AssistantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssistantKind {
    type Err = UnknownAssistantKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownAssistantKind { kind: s.to_string() })
    }
}

/// The back-office services the assistants' tools act on.
#[derive(Clone)]
pub struct DomainServices {
    pub staff: Arc<dyn StaffService>,
    pub shifts: Arc<dyn ShiftService>,
    pub allocations: Arc<dyn TableAllocationService>,
    extra: Vec<(AssistantKind, ToolDefinition)>,
}

impl DomainServices {
    /// Creates the services from their implementations.
    #[must_use]
    pub fn new(
        staff: Arc<dyn StaffService>,
        shifts: Arc<dyn ShiftService>,
        allocations: Arc<dyn TableAllocationService>,
    ) -> Self {
        Self {
            staff,
            shifts,
            allocations,
            extra: Vec::new(),
        }
    }

    /// Services that keep everything in process memory. Shifts and
    /// allocations are checked against the staff roster.
    #[must_use]
    pub fn in_memory() -> Self {
        let staff: Arc<dyn StaffService> = Arc::new(InMemoryStaffService::new());
        Self::new(
            Arc::clone(&staff),
            Arc::new(InMemoryShiftService::with_roster(Arc::clone(&staff))),
            Arc::new(InMemoryTableAllocationService::with_roster(staff)),
        )
    }

    /// Adds a deployment-specific tool to one assistant.
    #[must_use]
    pub fn with_tool(mut self, kind: AssistantKind, definition: ToolDefinition) -> Self {
        self.extra.push((kind, definition));
        self
    }

    /// Builds the tools of one assistant.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if two tools share a name.
    pub fn tools(&self, kind: AssistantKind) -> Result<ToolRegistry, RegistryError> {
        let mut registry = match kind {
            AssistantKind::Staff => staff_tools(&self.staff),
            AssistantKind::Shift => shift_tools(&self.shifts),
            AssistantKind::TableAllocation => table_allocation_tools(&self.allocations),
        }?;
        for (_, definition) in self.extra.iter().filter(|(k, _)| *k == kind) {
            registry.register(definition.clone())?;
        }
        Ok(registry)
    }
}

impl fmt::Debug for DomainServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainServices")
            .field("extra_tools", &self.extra.len())
            .finish_non_exhaustive()
    }
}

/// Opens the thread store of each assistant kind.
pub trait ThreadStoreProvider: Send + Sync {
    /// Returns the store for `kind`, whose new threads start from `seed`.
    fn store(&self, kind: AssistantKind, seed: Message) -> Arc<dyn ThreadStore>;
}

/// Keeps every assistant's threads in process memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryThreadStores;

impl ThreadStoreProvider for InMemoryThreadStores {
    fn store(&self, _kind: AssistantKind, seed: Message) -> Arc<dyn ThreadStore> {
        Arc::new(InMemoryThreadStore::new(seed))
    }
}

struct Controllers {
    staff: ConversationController,
    shift: ConversationController,
    table_allocation: ConversationController,
}

impl Controllers {
    fn build(
        mut open: impl FnMut(AssistantKind) -> Result<ConversationController, RegistryError>,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            staff: open(AssistantKind::Staff)?,
            shift: open(AssistantKind::Shift)?,
            table_allocation: open(AssistantKind::TableAllocation)?,
        })
    }

    fn get(&self, kind: AssistantKind) -> &ConversationController {
        match kind {
            AssistantKind::Staff => &self.staff,
            AssistantKind::Shift => &self.shift,
            AssistantKind::TableAllocation => &self.table_allocation,
        }
    }
}

/// Entry point for administrator queries.
pub struct AssistantHub {
    services: DomainServices,
    controllers: Controllers,
}

impl AssistantHub {
    /// Creates a hub with one controller per assistant kind. Each kind gets
    /// one store from `stores`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if an assistant's tools cannot be
    /// registered.
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        services: DomainServices,
        stores: &dyn ThreadStoreProvider,
        config: ConversationConfig,
    ) -> Result<Self, RegistryError> {
        let controllers = Controllers::build(|kind| {
            let registry = services.tools(kind)?;
            debug!(kind = %kind, tools = registry.len(), "assistant ready");
            Ok(ConversationController::new(
                Arc::clone(&backend),
                Arc::new(registry),
                stores.store(kind, kind.seed()),
                config.clone(),
            ))
        })?;
        Ok(Self {
            services,
            controllers,
        })
    }

    /// Returns the thread an administrator holds with an assistant.
    #[must_use]
    pub fn thread_id(restaurant: &RestaurantId, kind: AssistantKind, admin: &AdminId) -> ThreadId {
        ThreadId::for_admin(kind.as_str(), admin).in_restaurant(restaurant)
    }

    /// Sends an administrator's message to an assistant and returns the
    /// thread it landed on with the assistant's answer.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Assistant`] if the turn fails.
    #[instrument(skip_all, fields(restaurant = %restaurant, kind = %kind, admin = %admin))]
    pub async fn query(
        &self,
        restaurant: &RestaurantId,
        kind: AssistantKind,
        admin: &AdminId,
        message: &str,
    ) -> Result<(ThreadId, AssistantReply), HubError> {
        let thread_id = Self::thread_id(restaurant, kind, admin);
        let turn = self.controllers.get(kind).process_query(&thread_id, message);
        let reply = in_restaurant(restaurant.clone(), turn).await?;
        Ok((thread_id, reply))
    }

    /// Returns the stored thread, if the administrator ever talked to the
    /// assistant.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ThreadStore`] if the store fails.
    pub async fn thread(
        &self,
        restaurant: &RestaurantId,
        kind: AssistantKind,
        admin: &AdminId,
    ) -> Result<Option<Thread>, HubError> {
        let thread_id = Self::thread_id(restaurant, kind, admin);
        Ok(self.controllers.get(kind).snapshot(&thread_id).await?)
    }

    /// Starts the administrator's thread over.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ThreadStore`] if the store fails.
    pub async fn reset(
        &self,
        restaurant: &RestaurantId,
        kind: AssistantKind,
        admin: &AdminId,
    ) -> Result<(), HubError> {
        let thread_id = Self::thread_id(restaurant, kind, admin);
        self.controllers.get(kind).reset(&thread_id).await?;
        Ok(())
    }
}

impl fmt::Debug for AssistantHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantHub")
            .field("services", &self.services)
            .field("config", self.controllers.staff.config())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brigade_ai::{
        ChatRole, ChatToolCall, LlmError, LlmProvider, LlmRequest, LlmResponse, ScriptedBackend,
    };
    use brigade_conversation::{AssistantError, HandlerError, MessageRole, SchemaSpec, handler_fn};
    use serde_json::{Value as JsonValue, json};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Creates the requested staff member, answers with the tool's record,
    /// and reads ids back out of the history when asked.
    struct FrontDeskModel;

    #[async_trait]
    impl LlmBackend for FrontDeskModel {
        async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            let Some(last) = request.messages.last() else {
                return Ok(LlmResponse::text("Hello"));
            };
            match last.role {
                ChatRole::Tool => Ok(LlmResponse::text(last.content.clone())),
                ChatRole::User if last.content.starts_with("Create") => {
                    Ok(LlmResponse::with_tool_calls(vec![ChatToolCall::new(
                        "call_1",
                        "createStaffMember",
                        json!({
                            "name": "John",
                            "surname": "Doe",
                            "email": "john@x.com",
                            "position": "waiter",
                            "tag": "JD",
                        }),
                    )]))
                }
                _ => {
                    let id = request
                        .messages
                        .iter()
                        .filter(|m| m.role == ChatRole::Tool)
                        .filter_map(|m| serde_json::from_str::<JsonValue>(&m.content).ok())
                        .find_map(|record| record["id"].as_str().map(str::to_string));
                    Ok(LlmResponse::text(match id {
                        Some(id) => format!("His ID is {id}."),
                        None => "I don't know yet.".to_string(),
                    }))
                }
            }
        }

        fn provider(&self) -> LlmProvider {
            LlmProvider::Scripted
        }

        fn model(&self) -> &str {
            "front-desk"
        }
    }

    fn hub(backend: Arc<dyn LlmBackend>) -> AssistantHub {
        AssistantHub::new(
            backend,
            DomainServices::in_memory(),
            &InMemoryThreadStores,
            ConversationConfig::default(),
        )
        .unwrap()
    }

    /// Answers with the number of messages it was shown.
    struct CountingModel;

    #[async_trait]
    impl LlmBackend for CountingModel {
        async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(LlmResponse::text(request.messages.len().to_string()))
        }

        fn provider(&self) -> LlmProvider {
            LlmProvider::Scripted
        }

        fn model(&self) -> &str {
            "counting"
        }
    }

    /// Hands out in-memory stores and keeps them for inspection.
    #[derive(Default)]
    struct KeptStores {
        opened: Mutex<Vec<Arc<InMemoryThreadStore>>>,
    }

    impl KeptStores {
        fn thread_count(&self) -> usize {
            self.opened
                .lock()
                .unwrap()
                .iter()
                .map(|store| store.thread_count())
                .sum()
        }
    }

    impl ThreadStoreProvider for KeptStores {
        fn store(&self, _kind: AssistantKind, seed: Message) -> Arc<dyn ThreadStore> {
            let store = Arc::new(InMemoryThreadStore::new(seed));
            self.opened.lock().unwrap().push(Arc::clone(&store));
            store
        }
    }

    fn ids() -> (RestaurantId, AdminId) {
        ("r1".parse().unwrap(), "1".parse().unwrap())
    }

    #[tokio::test]
    async fn staff_member_created_then_recalled() {
        let hub = hub(Arc::new(FrontDeskModel));
        let (restaurant, admin) = ids();

        let (thread_id, reply) = hub
            .query(
                &restaurant,
                AssistantKind::Staff,
                &admin,
                "Create a waiter John Doe, email john@x.com, tag JD",
            )
            .await
            .unwrap();
        assert_eq!(thread_id.as_str(), "r1/staff-1");
        let record = reply.as_object().unwrap();
        assert_eq!(record["name"], "John");
        assert_eq!(record["position"], "waiter");
        let id = record["id"].as_str().unwrap().to_string();

        let (_, reply) = hub
            .query(&restaurant, AssistantKind::Staff, &admin, "What's his ID?")
            .await
            .unwrap();
        assert_eq!(reply.as_text().unwrap(), format!("His ID is {id}."));

        let thread = hub
            .thread(&restaurant, AssistantKind::Staff, &admin)
            .await
            .unwrap()
            .unwrap();
        // seed, user, assistant call, tool, answer, user, answer
        assert_eq!(thread.message_count(), 7);
        assert_eq!(thread.messages[0].role, MessageRole::System);
    }

    #[tokio::test]
    async fn kinds_and_restaurants_get_separate_threads() {
        let backend = Arc::new(ScriptedBackend::always(LlmResponse::text("ok")));
        let hub = hub(backend);
        let (restaurant, admin) = ids();
        let other: RestaurantId = "r2".parse().unwrap();

        let (a, _) = hub
            .query(&restaurant, AssistantKind::Staff, &admin, "hi")
            .await
            .unwrap();
        let (b, _) = hub
            .query(&restaurant, AssistantKind::Shift, &admin, "hi")
            .await
            .unwrap();
        let (c, _) = hub
            .query(&other, AssistantKind::Staff, &admin, "hi")
            .await
            .unwrap();
        assert_eq!(b.as_str(), "r1/shift-1");
        assert_eq!(c.as_str(), "r2/staff-1");
        assert_ne!(a, c);

        let staff = hub
            .thread(&restaurant, AssistantKind::Staff, &admin)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(staff.message_count(), 3);
        assert!(
            hub.thread(&other, AssistantKind::TableAllocation, &admin)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn records_stay_in_their_restaurant() {
        let hub = hub(Arc::new(FrontDeskModel));
        let (restaurant, admin) = ids();
        hub.query(&restaurant, AssistantKind::Staff, &admin, "Create John")
            .await
            .unwrap();

        let staff = hub
            .services
            .staff
            .list(&"r2".parse().unwrap(), None)
            .await
            .unwrap();
        assert!(staff.is_empty());
        let staff = hub.services.staff.list(&restaurant, None).await.unwrap();
        assert_eq!(staff.len(), 1);
    }

    #[tokio::test]
    async fn reset_forgets_the_thread() {
        let hub = hub(Arc::new(ScriptedBackend::always(LlmResponse::text("ok"))));
        let (restaurant, admin) = ids();
        hub.query(&restaurant, AssistantKind::Shift, &admin, "hi")
            .await
            .unwrap();

        hub.reset(&restaurant, AssistantKind::Shift, &admin)
            .await
            .unwrap();
        assert!(
            hub.thread(&restaurant, AssistantKind::Shift, &admin)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn unavailable_model_surfaces_as_assistant_error() {
        let hub = hub(Arc::new(ScriptedBackend::new([])));
        let (restaurant, admin) = ids();
        let err = hub
            .query(&restaurant, AssistantKind::TableAllocation, &admin, "hi")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::Assistant(AssistantError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn duplicate_tool_fails_hub_construction() {
        let services = DomainServices::in_memory().with_tool(
            AssistantKind::Staff,
            ToolDefinition::new(
                "listPositions",
                "Shadows the built-in tool",
                SchemaSpec::new(),
                handler_fn(|_| async { Ok::<_, HandlerError>(json!([])) }),
            ),
        );
        let err = AssistantHub::new(
            Arc::new(ScriptedBackend::new([])),
            services,
            &InMemoryThreadStores,
            ConversationConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateTool {
                name: "listPositions".to_string()
            }
        );
    }

    #[test]
    fn extra_tools_join_their_assistant_only() {
        let services = DomainServices::in_memory().with_tool(
            AssistantKind::Shift,
            ToolDefinition::new(
                "listHolidays",
                "Public holidays",
                SchemaSpec::new(),
                handler_fn(|_| async { Ok::<_, HandlerError>(json!([])) }),
            ),
        );
        assert!(services.tools(AssistantKind::Shift).unwrap().get("listHolidays").is_some());
        assert!(services.tools(AssistantKind::Staff).unwrap().get("listHolidays").is_none());
    }

    #[tokio::test]
    async fn lookups_for_unseen_restaurants_keep_no_state() {
        let stores = KeptStores::default();
        let hub = AssistantHub::new(
            Arc::new(ScriptedBackend::always(LlmResponse::text("ok"))),
            DomainServices::in_memory(),
            &stores,
            ConversationConfig::default(),
        )
        .unwrap();
        let admin: AdminId = "1".parse().unwrap();

        for i in 0..200 {
            let restaurant: RestaurantId = format!("junk{i}").parse().unwrap();
            assert!(
                hub.thread(&restaurant, AssistantKind::Staff, &admin)
                    .await
                    .unwrap()
                    .is_none()
            );
            hub.reset(&restaurant, AssistantKind::Shift, &admin)
                .await
                .unwrap();
        }
        assert_eq!(stores.opened.lock().unwrap().len(), AssistantKind::ALL.len());
        assert_eq!(stores.thread_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn same_thread_turns_run_one_at_a_time() {
        let hub = hub(Arc::new(CountingModel));
        let (restaurant, admin) = ids();
        let other: RestaurantId = "r2".parse().unwrap();

        let (a, b, c) = tokio::join!(
            hub.query(&restaurant, AssistantKind::Staff, &admin, "first"),
            hub.query(&restaurant, AssistantKind::Staff, &admin, "second"),
            hub.query(&other, AssistantKind::Staff, &admin, "elsewhere"),
        );
        let mut seen: Vec<String> = [a, b]
            .into_iter()
            .map(|r| r.unwrap().1.as_text().unwrap().to_string())
            .collect();
        seen.sort();
        // seed + user, then seed + first turn + user
        assert_eq!(seen, ["2", "4"]);
        assert_eq!(c.unwrap().1.as_text().unwrap(), "2");
    }

    #[test]
    fn kind_round_trips_through_its_name() {
        for kind in AssistantKind::ALL {
            assert_eq!(kind.as_str().parse::<AssistantKind>().unwrap(), kind);
        }
        let err = "payroll".parse::<AssistantKind>().unwrap_err();
        assert_eq!(err.kind, "payroll");
        assert_eq!(
            serde_json::to_value(AssistantKind::TableAllocation).unwrap(),
            "table-allocation"
        );
    }
}
