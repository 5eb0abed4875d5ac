//! Restaurant back-office assistants.
//!
//! Three assistants share the conversation engine: staff, shifts and table
//! allocations. Each exposes its domain operations as tools and seeds its
//! threads with its own system prompt. [`AssistantHub`] routes an
//! administrator's query to the right assistant and thread.

pub mod allocation;
pub mod error;
pub mod hub;
pub mod memory;
pub mod prompts;
pub mod shift;
pub mod staff;
mod tools;

pub use allocation::{
    AllocationFilter, NewTableAllocation, TableAllocation, TableAllocationService,
    TableAllocationUpdate, table_allocation_tools,
};
pub use error::{DomainError, HubError, UnknownAssistantKind};
pub use hub::{AssistantHub, AssistantKind, DomainServices, InMemoryThreadStores, ThreadStoreProvider};
pub use memory::{InMemoryShiftService, InMemoryStaffService, InMemoryTableAllocationService};
pub use shift::{NewShift, Shift, ShiftFilter, ShiftService, ShiftUpdate, shift_tools};
pub use staff::{NewStaffMember, Position, StaffMember, StaffService, StaffUpdate, staff_tools};
