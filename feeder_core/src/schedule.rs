//! Per-dispenser dispense schedule, aggregated from per-pet records.
//!
//! A dispenser's `dispense_times` is derived data: the sorted, de-duplicated
//! union of the times of every record that references it. It is recomputed
//! under the dispenser's own lock after every record change and handed to the
//! [`ScheduleSink`] before the change becomes visible. If the sink fails, the
//! dispenser is restored to its previous state.
//!
//! Lock order: dispenser map, then one dispenser, then pets. No path takes a
//! dispenser lock while holding the pets lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use feeder_traits::BoxError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FeederError, Result};

/// Time of day, `HH:MM` on a 24-hour clock.
///
/// Ordering is chronological, which for the zero-padded text form is the
/// same as lexicographic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(FeederError::validation(format!(
                "time {hour}:{minute} out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }
}

fn time_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").ok())
        .as_ref()
}

impl FromStr for TimeOfDay {
    type Err = FeederError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid =
            || FeederError::validation(format!("invalid time '{s}' (expected HH:MM, 00:00-23:59)"));
        let re = time_regex().ok_or_else(invalid)?;
        let caps = re.captures(s).ok_or_else(invalid)?;
        let hour = caps[1].parse::<u8>().map_err(|_| invalid())?;
        let minute = caps[2].parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = FeederError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

/// Validate every entry; the first bad one rejects the whole list.
pub fn parse_times<S: AsRef<str>>(times: &[S]) -> Result<Vec<TimeOfDay>> {
    times.iter().map(|t| t.as_ref().parse()).collect()
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(PetId);
id_type!(DispenserId);
id_type!(UserId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub id: PetId,
    pub owner: UserId,
    #[serde(default)]
    pub dispenser: Option<DispenserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispenser {
    pub id: DispenserId,
    pub owner: UserId,
    #[serde(default)]
    pub pet: Option<PetId>,
    #[serde(rename = "dispenseTimes", default)]
    pub dispense_times: Vec<TimeOfDay>,
}

/// Dispense times one pet gets from one dispenser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub pet: PetId,
    pub dispenser: DispenserId,
    /// Owner of the pet when the record was created.
    pub owner: UserId,
    #[serde(rename = "horarios")]
    pub times: Vec<TimeOfDay>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sorted, de-duplicated union of the records' times.
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a ScheduleRecord>) -> Vec<TimeOfDay> {
    records
        .into_iter()
        .flat_map(|r| r.times.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Receives every recomputed dispenser before the change is committed.
pub trait ScheduleSink {
    fn store(&self, dispenser: &Dispenser) -> std::result::Result<(), BoxError>;

    /// Called after a dispenser and its records were removed.
    fn forget(&self, _dispenser: DispenserId) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

/// Keeps everything in memory only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ScheduleSink for NoopSink {
    fn store(&self, _dispenser: &Dispenser) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

impl<F> ScheduleSink for F
where
    F: Fn(&Dispenser) -> std::result::Result<(), BoxError>,
{
    fn store(&self, dispenser: &Dispenser) -> std::result::Result<(), BoxError> {
        self(dispenser)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    dispenser: Dispenser,
    records: BTreeMap<PetId, ScheduleRecord>,
}

impl Slot {
    fn recompute(&mut self) {
        self.dispenser.dispense_times = aggregate(self.records.values());
    }
}

/// Serializable state of a [`ScheduleBook`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    #[serde(default)]
    pub dispensers: Vec<Dispenser>,
    #[serde(default)]
    pub pets: Vec<Pet>,
    #[serde(default)]
    pub records: Vec<ScheduleRecord>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn fmt_times(times: &[TimeOfDay]) -> String {
    times
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn default_times() -> Vec<TimeOfDay> {
    vec![TimeOfDay { hour: 8, minute: 0 }, TimeOfDay { hour: 18, minute: 0 }]
}

/// Dispensers, pets and schedule records, with derived dispense times.
pub struct ScheduleBook<S: ScheduleSink = NoopSink> {
    slots: Mutex<HashMap<DispenserId, Arc<Mutex<Slot>>>>,
    pets: Mutex<BTreeMap<PetId, Pet>>,
    default_times: Vec<TimeOfDay>,
    sink: S,
}

impl Default for ScheduleBook<NoopSink> {
    fn default() -> Self {
        Self::new(NoopSink)
    }
}

impl<S: ScheduleSink> ScheduleBook<S> {
    pub fn new(sink: S) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            pets: Mutex::new(BTreeMap::new()),
            default_times: default_times(),
            sink,
        }
    }

    /// Times given to a pet the first time it is linked to a dispenser.
    pub fn with_default_times(mut self, times: Vec<TimeOfDay>) -> Self {
        self.default_times = times;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn slot(&self, id: DispenserId) -> Result<Arc<Mutex<Slot>>> {
        lock(&self.slots)
            .get(&id)
            .cloned()
            .ok_or_else(|| FeederError::NotFound(format!("dispenser {id}")))
    }

    /// Apply `f` to one dispenser, recompute, persist, or roll back.
    fn mutate<R>(&self, id: DispenserId, f: impl FnOnce(&mut Slot) -> Result<R>) -> Result<R> {
        let slot = self.slot(id)?;
        let mut guard = lock(&slot);
        let before = guard.clone();
        let out = match f(&mut *guard) {
            Ok(out) => out,
            Err(e) => {
                *guard = before;
                return Err(e);
            }
        };
        guard.recompute();
        if let Err(e) = self.sink.store(&guard.dispenser) {
            warn!(dispenser = %id, error = %e, "storing dispense times failed; rolled back");
            *guard = before;
            return Err(FeederError::Storage(e.to_string()));
        }
        if guard.dispenser.dispense_times != before.dispenser.dispense_times {
            info!(
                dispenser = %id,
                times = %fmt_times(&guard.dispenser.dispense_times),
                "dispense times updated"
            );
        }
        Ok(out)
    }

    fn pet(&self, id: PetId) -> Result<Pet> {
        lock(&self.pets)
            .get(&id)
            .cloned()
            .ok_or_else(|| FeederError::NotFound(format!("pet {id}")))
    }

    /// Fails when the pet was removed since it was looked up. Call with a
    /// dispenser lock held so a concurrent `remove_pet` sees the result.
    fn ensure_pet(&self, id: PetId) -> Result<()> {
        if lock(&self.pets).contains_key(&id) {
            Ok(())
        } else {
            Err(FeederError::NotFound(format!("pet {id}")))
        }
    }

    // ── Dispensers ───────────────────────────────────────────────────────

    /// Register a dispenser with an empty schedule.
    pub fn add_dispenser(&self, id: DispenserId, owner: UserId) -> Result<Dispenser> {
        let dispenser = Dispenser {
            id,
            owner,
            pet: None,
            dispense_times: Vec::new(),
        };
        let mut slots = lock(&self.slots);
        if slots.contains_key(&id) {
            return Err(FeederError::Conflict(format!("dispenser {id} already exists")));
        }
        self.sink
            .store(&dispenser)
            .map_err(|e| FeederError::Storage(e.to_string()))?;
        slots.insert(
            id,
            Arc::new(Mutex::new(Slot {
                dispenser: dispenser.clone(),
                records: BTreeMap::new(),
            })),
        );
        debug!(dispenser = %id, owner = %owner, "dispenser added");
        Ok(dispenser)
    }

    pub fn dispenser(&self, id: DispenserId) -> Result<Dispenser> {
        Ok(lock(&*self.slot(id)?).dispenser.clone())
    }

    pub fn dispensers(&self) -> Vec<Dispenser> {
        let slots: Vec<_> = lock(&self.slots).values().cloned().collect();
        let mut out: Vec<Dispenser> = slots.iter().map(|s| lock(s).dispenser.clone()).collect();
        out.sort_by_key(|d| d.id);
        out
    }

    pub fn dispense_times(&self, id: DispenserId) -> Result<Vec<TimeOfDay>> {
        Ok(lock(&*self.slot(id)?).dispenser.dispense_times.clone())
    }

    /// Recompute one dispenser from its current records.
    pub fn recompute(&self, id: DispenserId) -> Result<Vec<TimeOfDay>> {
        self.mutate(id, |_| Ok(()))?;
        self.dispense_times(id)
    }

    /// Remove a dispenser together with its records; returns the records.
    pub fn remove_dispenser(&self, id: DispenserId) -> Result<Vec<ScheduleRecord>> {
        let mut slots = lock(&self.slots);
        if !slots.contains_key(&id) {
            return Err(FeederError::NotFound(format!("dispenser {id}")));
        }
        if let Err(e) = self.sink.forget(id) {
            warn!(dispenser = %id, error = %e, "sink failed to forget dispenser");
            return Err(FeederError::Storage(e.to_string()));
        }
        let slot = slots
            .remove(&id)
            .ok_or_else(|| FeederError::NotFound(format!("dispenser {id}")))?;
        drop(slots);
        let removed: Vec<ScheduleRecord> = lock(&slot).records.values().cloned().collect();
        for pet in lock(&self.pets).values_mut() {
            if pet.dispenser == Some(id) {
                pet.dispenser = None;
            }
        }
        info!(dispenser = %id, records = removed.len(), "dispenser removed");
        Ok(removed)
    }

    // ── Pets ─────────────────────────────────────────────────────────────

    /// Register a pet, or change its owner.
    pub fn upsert_pet(&self, id: PetId, owner: UserId) -> Pet {
        let mut pets = lock(&self.pets);
        let pet = pets.entry(id).or_insert(Pet {
            id,
            owner,
            dispenser: None,
        });
        pet.owner = owner;
        pet.clone()
    }

    pub fn pets(&self) -> Vec<Pet> {
        lock(&self.pets).values().cloned().collect()
    }

    /// Link a pet to a dispenser.
    ///
    /// When the pair has no record yet, one is created with the default
    /// times and the dispenser is re-aggregated. Returns the created record.
    /// A dispenser serves one linked pet; a previously linked pet is unlinked
    /// but keeps its record. A pet moving away from another dispenser is
    /// unlinked there first; if linking the new one then fails, the old link
    /// is restored.
    pub fn link_pet(
        &self,
        pet_id: PetId,
        dispenser: DispenserId,
    ) -> Result<Option<ScheduleRecord>> {
        let pet = self.pet(pet_id)?;
        let previous = pet.dispenser.filter(|d| *d != dispenser);
        let unlinked = match previous {
            Some(previous) => self.set_linked_pet(previous, pet_id, None)?,
            None => false,
        };

        let defaults = self.default_times.clone();
        let linked = self.mutate(dispenser, |slot| {
            self.ensure_pet(pet_id)?;
            let displaced = slot.dispenser.pet.filter(|p| *p != pet_id);
            slot.dispenser.pet = Some(pet_id);
            if slot.records.contains_key(&pet_id) {
                return Ok((None, displaced));
            }
            let now = Utc::now();
            let record = ScheduleRecord {
                pet: pet_id,
                dispenser,
                owner: pet.owner,
                times: defaults,
                created_at: now,
                updated_at: now,
            };
            slot.records.insert(pet_id, record.clone());
            Ok((Some(record), displaced))
        });
        let (created, displaced) = match linked {
            Ok(out) => out,
            Err(e) => {
                if let (true, Some(previous)) = (unlinked, previous) {
                    if let Err(undo) = self.set_linked_pet(previous, pet_id, Some(pet_id)) {
                        warn!(
                            dispenser = %previous,
                            error = %undo,
                            "restoring previous link failed"
                        );
                    }
                }
                return Err(e);
            }
        };

        let mut pets = lock(&self.pets);
        if let Some(p) = pets.get_mut(&pet_id) {
            p.dispenser = Some(dispenser);
        }
        if let Some(other) = displaced.and_then(|id| pets.get_mut(&id)) {
            if other.dispenser == Some(dispenser) {
                other.dispenser = None;
            }
        }
        drop(pets);

        if let Some(record) = &created {
            info!(
                pet = %pet_id,
                dispenser = %dispenser,
                times = %fmt_times(&record.times),
                "default schedule created"
            );
        }
        Ok(created)
    }

    /// Swap `from` for `to` as the linked pet of a dispenser, if `from` is
    /// what it currently serves (`None` matches only an empty link).
    /// Returns whether anything changed. A dispenser that no longer exists
    /// counts as unchanged.
    fn set_linked_pet(&self, id: DispenserId, pet_id: PetId, to: Option<PetId>) -> Result<bool> {
        let from = if to.is_some() { None } else { Some(pet_id) };
        let changed = self.mutate(id, |slot| {
            if slot.dispenser.pet == from {
                slot.dispenser.pet = to;
                Ok(true)
            } else {
                Ok(false)
            }
        });
        match changed {
            Err(FeederError::NotFound(_)) => Ok(false),
            other => other,
        }
    }

    /// Delete a pet and every record that references it.
    ///
    /// The pet is removed before the dispensers are scanned, so a record
    /// created concurrently either lands before the scan or is refused.
    /// If persisting a dispenser fails the pet is put back; dispensers
    /// already cleaned stay cleaned. Returns the dispensers whose schedules
    /// were recomputed.
    pub fn remove_pet(&self, pet_id: PetId) -> Result<Vec<DispenserId>> {
        let pet = lock(&self.pets)
            .remove(&pet_id)
            .ok_or_else(|| FeederError::NotFound(format!("pet {pet_id}")))?;
        let slots: Vec<(DispenserId, Arc<Mutex<Slot>>)> = lock(&self.slots)
            .iter()
            .map(|(id, s)| (*id, s.clone()))
            .collect();
        let mut affected = Vec::new();
        for (id, slot) in slots {
            let touches = {
                let s = lock(&slot);
                s.records.contains_key(&pet_id) || s.dispenser.pet == Some(pet_id)
            };
            if !touches {
                continue;
            }
            let cleaned = self.mutate(id, |slot| {
                slot.records.remove(&pet_id);
                if slot.dispenser.pet == Some(pet_id) {
                    slot.dispenser.pet = None;
                }
                Ok(())
            });
            match cleaned {
                Ok(()) => affected.push(id),
                Err(FeederError::NotFound(_)) => {}
                Err(e) => {
                    lock(&self.pets).insert(pet_id, pet);
                    return Err(e);
                }
            }
        }
        affected.sort();
        info!(pet = %pet_id, dispensers = affected.len(), "pet removed");
        Ok(affected)
    }

    // ── Records ──────────────────────────────────────────────────────────

    /// Create the record for a (pet, dispenser) pair.
    ///
    /// Without an explicit dispenser the pet's linked dispenser is used.
    /// Times are validated before anything else is looked at.
    pub fn create_record<T: AsRef<str>>(
        &self,
        pet_id: PetId,
        dispenser: Option<DispenserId>,
        times: &[T],
    ) -> Result<ScheduleRecord> {
        let times = parse_times(times)?;
        let pet = self.pet(pet_id)?;
        let dispenser = dispenser.or(pet.dispenser).ok_or_else(|| {
            FeederError::validation(format!("pet {pet_id} has no dispenser; pass one explicitly"))
        })?;
        self.mutate(dispenser, |slot| {
            self.ensure_pet(pet_id)?;
            if slot.records.contains_key(&pet_id) {
                return Err(FeederError::Conflict(format!(
                    "pet {pet_id} already has a schedule on dispenser {dispenser}"
                )));
            }
            let now = Utc::now();
            let record = ScheduleRecord {
                pet: pet_id,
                dispenser,
                owner: pet.owner,
                times,
                created_at: now,
                updated_at: now,
            };
            slot.records.insert(pet_id, record.clone());
            Ok(record)
        })
    }

    /// Replace the times of an existing record.
    pub fn update_record<T: AsRef<str>>(
        &self,
        pet_id: PetId,
        dispenser: DispenserId,
        times: &[T],
    ) -> Result<ScheduleRecord> {
        let times = parse_times(times)?;
        self.mutate(dispenser, |slot| {
            let record = slot.records.get_mut(&pet_id).ok_or_else(|| {
                FeederError::NotFound(format!("schedule for pet {pet_id} on dispenser {dispenser}"))
            })?;
            record.times = times;
            record.updated_at = Utc::now();
            Ok(record.clone())
        })
    }

    /// Create the record, or replace its times when it exists.
    pub fn set_record<T: AsRef<str>>(
        &self,
        pet_id: PetId,
        dispenser: Option<DispenserId>,
        times: &[T],
    ) -> Result<ScheduleRecord> {
        match self.create_record(pet_id, dispenser, times) {
            Err(FeederError::Conflict(_)) => {
                let dispenser = match dispenser {
                    Some(d) => d,
                    None => self.pet(pet_id)?.dispenser.ok_or_else(|| {
                        FeederError::validation(format!("pet {pet_id} has no dispenser"))
                    })?,
                };
                self.update_record(pet_id, dispenser, times)
            }
            other => other,
        }
    }

    pub fn delete_record(&self, pet_id: PetId, dispenser: DispenserId) -> Result<ScheduleRecord> {
        self.mutate(dispenser, |slot| {
            slot.records.remove(&pet_id).ok_or_else(|| {
                FeederError::NotFound(format!("schedule for pet {pet_id} on dispenser {dispenser}"))
            })
        })
    }

    pub fn record(&self, pet_id: PetId, dispenser: DispenserId) -> Result<ScheduleRecord> {
        lock(&*self.slot(dispenser)?)
            .records
            .get(&pet_id)
            .cloned()
            .ok_or_else(|| {
                FeederError::NotFound(format!("schedule for pet {pet_id} on dispenser {dispenser}"))
            })
    }

    pub fn records_for(&self, dispenser: DispenserId) -> Result<Vec<ScheduleRecord>> {
        Ok(lock(&*self.slot(dispenser)?).records.values().cloned().collect())
    }

    // ── Snapshots ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> ScheduleSnapshot {
        let dispensers = self.dispensers();
        let mut records = Vec::new();
        for d in &dispensers {
            if let Ok(mut rs) = self.records_for(d.id) {
                records.append(&mut rs);
            }
        }
        ScheduleSnapshot {
            dispensers,
            pets: self.pets(),
            records,
        }
    }

    /// Rebuild a book from a snapshot.
    ///
    /// Stored dispense times are ignored and recomputed from the records.
    /// Records must reference known pets and dispensers, one per pair.
    pub fn from_snapshot(snapshot: ScheduleSnapshot, sink: S) -> Result<Self> {
        let book = Self::new(sink);
        {
            let mut slots = lock(&book.slots);
            for d in snapshot.dispensers {
                let id = d.id;
                let slot = Slot {
                    dispenser: d,
                    records: BTreeMap::new(),
                };
                if slots.insert(id, Arc::new(Mutex::new(slot))).is_some() {
                    return Err(FeederError::Conflict(format!("dispenser {id} listed twice")));
                }
            }
        }
        {
            let mut pets = lock(&book.pets);
            for p in snapshot.pets {
                let id = p.id;
                if pets.insert(id, p).is_some() {
                    return Err(FeederError::Conflict(format!("pet {id} listed twice")));
                }
            }
        }
        for r in snapshot.records {
            if !lock(&book.pets).contains_key(&r.pet) {
                return Err(FeederError::NotFound(format!(
                    "pet {} referenced by a schedule record",
                    r.pet
                )));
            }
            let slot = book.slot(r.dispenser)?;
            let mut s = lock(&slot);
            let (pet, dispenser) = (r.pet, r.dispenser);
            if s.records.insert(pet, r).is_some() {
                return Err(FeederError::Conflict(format!(
                    "pet {pet} has two schedules on dispenser {dispenser}"
                )));
            }
        }
        for slot in lock(&book.slots).values() {
            lock(slot).recompute();
        }
        Ok(book)
    }
}
