//! In-memory domain services.
//!
//! Used when no external back office is wired in, and by tests. Records are
//! kept per restaurant; ids are ULIDs.

use crate::allocation::{
    AllocationFilter, NewTableAllocation, TableAllocation, TableAllocationService,
    TableAllocationUpdate,
};
use crate::error::DomainError;
use crate::shift::{NewShift, Shift, ShiftFilter, ShiftService, ShiftUpdate};
use crate::staff::{NewStaffMember, Position, StaffMember, StaffService, StaffUpdate};
use async_trait::async_trait;
use brigade_core::RestaurantId;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use ulid::Ulid;

/// Records of one kind, grouped by restaurant.
#[derive(Debug)]
struct Records<T> {
    inner: Mutex<HashMap<RestaurantId, Vec<T>>>,
}

impl<T> Default for Records<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Records<T> {
    fn with<R>(
        &self,
        restaurant: &RestaurantId,
        f: impl FnOnce(&mut Vec<T>) -> Result<R, DomainError>,
    ) -> Result<R, DomainError> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(map.entry(restaurant.clone()).or_default())
    }
}

fn new_id() -> String {
    Ulid::new().to_string()
}

fn position_of<T>(
    records: &[T],
    id: &str,
    entity: &'static str,
    key: impl Fn(&T) -> &str,
) -> Result<usize, DomainError> {
    records
        .iter()
        .position(|r| key(r) == id)
        .ok_or_else(|| DomainError::not_found(entity, id))
}

/// Staff lookup for records that reference a staff member.
#[derive(Clone, Default)]
struct Roster(Option<Arc<dyn StaffService>>);

impl Roster {
    async fn check(&self, restaurant: &RestaurantId, staff_id: &str) -> Result<(), DomainError> {
        match &self.0 {
            Some(staff) => staff.get(restaurant, staff_id).await.map(|_| ()),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Roster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Roster").field(&self.0.is_some()).finish()
    }
}

const STAFF: &str = "staff member";
const SHIFT: &str = "shift";
const ALLOCATION: &str = "table allocation";

/// Staff records held in memory.
#[derive(Debug, Default)]
pub struct InMemoryStaffService {
    records: Records<StaffMember>,
}

impl InMemoryStaffService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn validate_staff(staff: &StaffMember, others: &[StaffMember]) -> Result<(), DomainError> {
    if staff.name.trim().is_empty() || staff.surname.trim().is_empty() {
        return Err(DomainError::invalid("name and surname must not be empty"));
    }
    if !staff.email.contains('@') {
        return Err(DomainError::invalid(format!(
            "'{}' is not an email address",
            staff.email
        )));
    }
    if others
        .iter()
        .any(|o| o.id != staff.id && o.email.eq_ignore_ascii_case(&staff.email))
    {
        return Err(DomainError::conflict(format!(
            "email {} is already used by another staff member",
            staff.email
        )));
    }
    Ok(())
}

#[async_trait]
impl StaffService for InMemoryStaffService {
    async fn create(
        &self,
        restaurant: &RestaurantId,
        staff: NewStaffMember,
    ) -> Result<StaffMember, DomainError> {
        let record = StaffMember {
            id: new_id(),
            name: staff.name,
            surname: staff.surname,
            email: staff.email,
            position: staff.position,
            tag: staff.tag,
            phone: staff.phone,
            hourly_rate: staff.hourly_rate,
            created_at: Utc::now(),
        };
        self.records.with(restaurant, |records| {
            validate_staff(&record, records)?;
            records.push(record.clone());
            Ok(record)
        })
    }

    async fn update(
        &self,
        restaurant: &RestaurantId,
        id: &str,
        changes: StaffUpdate,
    ) -> Result<StaffMember, DomainError> {
        self.records.with(restaurant, |records| {
            let index = position_of(records, id, STAFF, |s| &s.id)?;
            let mut updated = records[index].clone();
            changes.apply_to(&mut updated);
            validate_staff(&updated, records)?;
            records[index] = updated.clone();
            Ok(updated)
        })
    }

    async fn delete(&self, restaurant: &RestaurantId, id: &str) -> Result<StaffMember, DomainError> {
        self.records.with(restaurant, |records| {
            let index = position_of(records, id, STAFF, |s| &s.id)?;
            Ok(records.remove(index))
        })
    }

    async fn get(&self, restaurant: &RestaurantId, id: &str) -> Result<StaffMember, DomainError> {
        self.records.with(restaurant, |records| {
            let index = position_of(records, id, STAFF, |s| &s.id)?;
            Ok(records[index].clone())
        })
    }

    async fn list(
        &self,
        restaurant: &RestaurantId,
        position: Option<Position>,
    ) -> Result<Vec<StaffMember>, DomainError> {
        self.records.with(restaurant, |records| {
            Ok(records
                .iter()
                .filter(|s| position.is_none_or(|p| s.position == p))
                .cloned()
                .collect())
        })
    }

    async fn positions(&self, _restaurant: &RestaurantId) -> Result<Vec<Position>, DomainError> {
        Ok(Position::ALL.to_vec())
    }
}

/// Shifts held in memory.
#[derive(Debug, Default)]
pub struct InMemoryShiftService {
    records: Records<Shift>,
    roster: Roster,
}

impl InMemoryShiftService {
    /// Creates an empty service that accepts any staff id.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty service that only schedules staff known to `staff`.
    #[must_use]
    pub fn with_roster(staff: Arc<dyn StaffService>) -> Self {
        Self {
            roster: Roster(Some(staff)),
            ..Self::default()
        }
    }
}

fn validate_shift(shift: &Shift, others: &[Shift]) -> Result<(), DomainError> {
    if shift.end <= shift.start {
        return Err(DomainError::invalid("a shift must end after it starts"));
    }
    let clash = others.iter().find(|o| {
        o.id != shift.id && o.staff_id == shift.staff_id && o.overlaps(shift.start, shift.end)
    });
    if let Some(clash) = clash {
        return Err(DomainError::conflict(format!(
            "staff member {} already works from {} to {} (shift {})",
            shift.staff_id, clash.start, clash.end, clash.id
        )));
    }
    Ok(())
}

#[async_trait]
impl ShiftService for InMemoryShiftService {
    async fn create(&self, restaurant: &RestaurantId, shift: NewShift) -> Result<Shift, DomainError> {
        self.roster.check(restaurant, &shift.staff_id).await?;
        let record = Shift {
            id: new_id(),
            staff_id: shift.staff_id,
            start: shift.start,
            end: shift.end,
            notes: shift.notes,
        };
        self.records.with(restaurant, |records| {
            validate_shift(&record, records)?;
            records.push(record.clone());
            Ok(record)
        })
    }

    async fn update(
        &self,
        restaurant: &RestaurantId,
        id: &str,
        changes: ShiftUpdate,
    ) -> Result<Shift, DomainError> {
        if let Some(staff_id) = &changes.staff_id {
            self.roster.check(restaurant, staff_id).await?;
        }
        self.records.with(restaurant, |records| {
            let index = position_of(records, id, SHIFT, |s| &s.id)?;
            let mut updated = records[index].clone();
            changes.apply_to(&mut updated);
            validate_shift(&updated, records)?;
            records[index] = updated.clone();
            Ok(updated)
        })
    }

    async fn delete(&self, restaurant: &RestaurantId, id: &str) -> Result<Shift, DomainError> {
        self.records.with(restaurant, |records| {
            let index = position_of(records, id, SHIFT, |s| &s.id)?;
            Ok(records.remove(index))
        })
    }

    async fn list(
        &self,
        restaurant: &RestaurantId,
        filter: ShiftFilter,
    ) -> Result<Vec<Shift>, DomainError> {
        let mut shifts: Vec<Shift> = self.records.with(restaurant, |records| {
            Ok(records.iter().filter(|s| filter.matches(s)).cloned().collect())
        })?;
        shifts.sort_by_key(|s| s.start);
        Ok(shifts)
    }
}

/// Table allocations held in memory.
#[derive(Debug, Default)]
pub struct InMemoryTableAllocationService {
    records: Records<TableAllocation>,
    roster: Roster,
}

impl InMemoryTableAllocationService {
    /// Creates an empty service that accepts any staff id.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty service that only allocates tables to staff known
    /// to `staff`.
    #[must_use]
    pub fn with_roster(staff: Arc<dyn StaffService>) -> Self {
        Self {
            roster: Roster(Some(staff)),
            ..Self::default()
        }
    }
}

fn validate_allocation(
    allocation: &TableAllocation,
    others: &[TableAllocation],
) -> Result<(), DomainError> {
    if allocation.tables.is_empty() {
        return Err(DomainError::invalid("at least one table is required"));
    }
    for table in &allocation.tables {
        let taken = others.iter().find(|o| {
            o.id != allocation.id && o.date == allocation.date && o.tables.contains(table)
        });
        if let Some(other) = taken {
            return Err(DomainError::conflict(format!(
                "table {table} is already allocated to staff member {} on {}",
                other.staff_id, allocation.date
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl TableAllocationService for InMemoryTableAllocationService {
    async fn create(
        &self,
        restaurant: &RestaurantId,
        allocation: NewTableAllocation,
    ) -> Result<TableAllocation, DomainError> {
        self.roster.check(restaurant, &allocation.staff_id).await?;
        let mut tables = allocation.tables;
        tables.sort_unstable();
        tables.dedup();
        let record = TableAllocation {
            id: new_id(),
            staff_id: allocation.staff_id,
            date: allocation.date,
            tables,
            section: allocation.section,
        };
        self.records.with(restaurant, |records| {
            validate_allocation(&record, records)?;
            records.push(record.clone());
            Ok(record)
        })
    }

    async fn update(
        &self,
        restaurant: &RestaurantId,
        id: &str,
        changes: TableAllocationUpdate,
    ) -> Result<TableAllocation, DomainError> {
        if let Some(staff_id) = &changes.staff_id {
            self.roster.check(restaurant, staff_id).await?;
        }
        self.records.with(restaurant, |records| {
            let index = position_of(records, id, ALLOCATION, |a| &a.id)?;
            let mut updated = records[index].clone();
            changes.apply_to(&mut updated);
            updated.tables.sort_unstable();
            updated.tables.dedup();
            validate_allocation(&updated, records)?;
            records[index] = updated.clone();
            Ok(updated)
        })
    }

    async fn delete(
        &self,
        restaurant: &RestaurantId,
        id: &str,
    ) -> Result<TableAllocation, DomainError> {
        self.records.with(restaurant, |records| {
            let index = position_of(records, id, ALLOCATION, |a| &a.id)?;
            Ok(records.remove(index))
        })
    }

    async fn list(
        &self,
        restaurant: &RestaurantId,
        filter: AllocationFilter,
    ) -> Result<Vec<TableAllocation>, DomainError> {
        let mut allocations: Vec<TableAllocation> = self.records.with(restaurant, |records| {
            Ok(records.iter().filter(|a| filter.matches(a)).cloned().collect())
        })?;
        allocations.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.staff_id.cmp(&b.staff_id)));
        Ok(allocations)
    }
}
