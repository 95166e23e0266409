//! Schedule commands over the JSON state file.

use std::path::Path;

use eyre::WrapErr;
use feeder_config::Config;
use feeder_core::conversions::default_times_from;
use feeder_core::schedule::NoopSink;
use feeder_core::store::SnapshotFile;
use feeder_core::{DispenserId, PetId, ScheduleBook, UserId};
use serde_json::{Value, json};

use crate::cli::ScheduleCmd;

pub fn run(cfg: &Config, state: &Path, action: &ScheduleCmd) -> eyre::Result<Value> {
    let file = SnapshotFile::new(state);
    let snapshot = file.load()?;
    let book = ScheduleBook::from_snapshot(snapshot, NoopSink)
        .wrap_err_with(|| format!("state file {} is inconsistent", state.display()))?
        .with_default_times(default_times_from(&cfg.schedule)?);

    let (body, changed) = apply(&book, action)?;
    if changed {
        file.save(&book.snapshot())?;
        tracing::info!(state = %state.display(), "schedule state saved");
    }
    Ok(body)
}

fn apply(book: &ScheduleBook, action: &ScheduleCmd) -> eyre::Result<(Value, bool)> {
    let out = match action {
        ScheduleCmd::AddDispenser { id, owner } => {
            let d = book.add_dispenser(DispenserId(*id), UserId(*owner))?;
            (json!({ "dispenser": d }), true)
        }
        ScheduleCmd::AddPet { id, owner } => {
            let p = book.upsert_pet(PetId(*id), UserId(*owner));
            (json!({ "pet": p }), true)
        }
        ScheduleCmd::Link { pet, dispenser } => {
            let created = book.link_pet(PetId(*pet), DispenserId(*dispenser))?;
            let d = book.dispenser(DispenserId(*dispenser))?;
            (json!({ "dispenser": d, "created": created }), true)
        }
        ScheduleCmd::Set {
            pet,
            dispenser,
            times,
        } => {
            let record = book.set_record(PetId(*pet), dispenser.map(DispenserId), times)?;
            let d = book.dispenser(record.dispenser)?;
            (json!({ "record": record, "dispenser": d }), true)
        }
        ScheduleCmd::Remove { pet, dispenser } => {
            let record = book.delete_record(PetId(*pet), DispenserId(*dispenser))?;
            let d = book.dispenser(DispenserId(*dispenser))?;
            (json!({ "removed": record, "dispenser": d }), true)
        }
        ScheduleCmd::RemovePet { id } => {
            let affected = book.remove_pet(PetId(*id))?;
            let dispensers = affected
                .into_iter()
                .map(|d| book.dispenser(d))
                .collect::<Result<Vec<_>, _>>()?;
            (json!({ "removed_pet": id, "dispensers": dispensers }), true)
        }
        ScheduleCmd::RemoveDispenser { id } => {
            let removed = book.remove_dispenser(DispenserId(*id))?;
            (json!({ "removed_dispenser": id, "removed_records": removed }), true)
        }
        ScheduleCmd::Show { dispenser: Some(id) } => {
            let d = book.dispenser(DispenserId(*id))?;
            let records = book.records_for(DispenserId(*id))?;
            (json!({ "dispenser": d, "records": records }), false)
        }
        ScheduleCmd::Show { dispenser: None } => (serde_json::to_value(book.snapshot())?, false),
    };
    Ok(out)
}
