use crate::schema::Transaction;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum TripStatus {
    Active,
    Completed,
    Investment,
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Completed => write!(f, "Completed"),
            Self::Investment => write!(f, "Investment"),
        }
    }
}

pub type TripTypeMap = BTreeMap<String, String>;
pub type TripStatusMap = BTreeMap<String, TripStatus>;

/// Read-only snapshot of the trip tag maps handed to the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TagMaps {
    #[serde(default)]
    pub trip_types: TripTypeMap,
    #[serde(default)]
    pub trip_statuses: TripStatusMap,
}

impl TagMaps {
    pub fn trip_type(&self, trip: &str) -> Option<&str> {
        self.trip_types.get(trip).map(String::as_str)
    }

    pub fn trip_status(&self, trip: &str) -> Option<TripStatus> {
        self.trip_statuses.get(trip).copied()
    }
}

/// A pending edit queued by the tag editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TagOperation {
    /// Register a trip, optionally with its type and status.
    AddTrip {
        name: String,
        trip_type: Option<String>,
        status: Option<TripStatus>,
    },

    /// Forget a trip. Transactions tagged with it become untagged.
    DeleteTrip { name: String },

    /// Rename a trip everywhere it is referenced.
    RenameTrip { from: String, to: String },

    UpdateType { trip: String, trip_type: String },

    UpdateStatus { trip: String, status: TripStatus },
}

/// Applies queued edits to a snapshot, returning the map the editor should
/// display. `base` is never modified.
pub fn apply_pending_ops(base: &TagMaps, ops: &[TagOperation]) -> TagMaps {
    let mut maps = base.clone();
    for op in ops {
        apply_single_op(&mut maps, op);
    }
    maps
}

fn apply_single_op(maps: &mut TagMaps, op: &TagOperation) {
    match op {
        TagOperation::AddTrip {
            name,
            trip_type,
            status,
        } => {
            if let Some(t) = trip_type {
                maps.trip_types.insert(name.clone(), t.clone());
            }
            if let Some(s) = status {
                maps.trip_statuses.insert(name.clone(), *s);
            }
        }

        TagOperation::DeleteTrip { name } => {
            maps.trip_types.remove(name);
            maps.trip_statuses.remove(name);
        }

        TagOperation::RenameTrip { from, to } => {
            if from == to {
                return;
            }
            if let Some(t) = maps.trip_types.remove(from) {
                maps.trip_types.insert(to.clone(), t);
            }
            if let Some(s) = maps.trip_statuses.remove(from) {
                maps.trip_statuses.insert(to.clone(), s);
            }
        }

        TagOperation::UpdateType { trip, trip_type } => {
            maps.trip_types.insert(trip.clone(), trip_type.clone());
        }

        TagOperation::UpdateStatus { trip, status } => {
            maps.trip_statuses.insert(trip.clone(), *status);
        }
    }
}

/// Carries trip renames and deletions over to the transactions that use the
/// trip tag. Returns a new ledger; other operations leave rows unchanged.
pub fn apply_ops_to_ledger(ledger: &[Transaction], ops: &[TagOperation]) -> Vec<Transaction> {
    let mut rows = ledger.to_vec();

    for op in ops {
        match op {
            TagOperation::RenameTrip { from, to } => {
                for row in rows.iter_mut() {
                    if row.trip() == Some(from.as_str()) {
                        row.trip_event = Some(to.clone());
                    }
                }
            }
            TagOperation::DeleteTrip { name } => {
                for row in rows.iter_mut() {
                    if row.trip() == Some(name.as_str()) {
                        row.trip_event = None;
                    }
                }
            }
            TagOperation::AddTrip { .. }
            | TagOperation::UpdateType { .. }
            | TagOperation::UpdateStatus { .. } => {}
        }
    }

    rows
}
