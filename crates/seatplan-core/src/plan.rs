//! The committed seating plan as it is persisted between process restarts.
//!
//! A plan is never patched. Each successful run replaces the stored plan
//! wholesale, so the allotments and the log always describe the same run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Allotment;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPlan {
  pub snapshot_id:  Uuid,
  /// Monotonic publication counter; the first real run is version 1.
  pub version:      u64,
  pub published_at: DateTime<Utc>,
  /// Allotments in ascending id order.
  pub allotments:   Vec<Allotment>,
  /// The run log, line by line, exactly as returned to the caller.
  pub log:          Vec<String>,
}
