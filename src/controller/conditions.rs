//! Condition management helpers following Kubernetes API conventions

use chrono::Utc;

use crate::crd::Condition;

/// Condition types written by the controllers
pub const CONDITION_TYPE_VALIDATE_REGISTRIES: &str = "ValidateDevfileRegistries";
pub const CONDITION_TYPE_AVAILABLE: &str = "Available";

/// Standard condition statuses
pub const CONDITION_STATUS_TRUE: &str = "True";
pub const CONDITION_STATUS_FALSE: &str = "False";
pub const CONDITION_STATUS_UNKNOWN: &str = "Unknown";

/// Condition reasons
pub const REASON_READY: &str = "Ready";
pub const REASON_NOT_READY: &str = "NotReady";
pub const REASON_RECONCILING: &str = "Reconciling";

pub const MESSAGE_STARTING_RECONCILIATION: &str = "Starting reconciliation";

/// Update or add a condition to the conditions list
///
/// The transition time only moves when the status flips. Reason, message and
/// observed generation always take the new values.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status != condition.status {
                existing.status = condition.status;
                existing.last_transition_time = Utc::now().to_rfc3339();
            }
            existing.reason = condition.reason;
            existing.message = condition.message;
            existing.observed_generation = condition.observed_generation;
        }
        None => conditions.push(condition),
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Result of validating a registries list
pub fn validation_condition(ready: bool, message: &str, generation: Option<i64>) -> Condition {
    let (status, reason) = if ready {
        (CONDITION_STATUS_TRUE, REASON_READY)
    } else {
        (CONDITION_STATUS_FALSE, REASON_NOT_READY)
    };
    Condition {
        observed_generation: generation,
        ..Condition::new(CONDITION_TYPE_VALIDATE_REGISTRIES, status, reason, message)
    }
}

/// Mirrors the validation verdict onto the Available condition
pub fn available_condition(ready: bool, message: &str, generation: Option<i64>) -> Condition {
    let (status, reason) = if ready {
        (CONDITION_STATUS_TRUE, REASON_READY)
    } else {
        (CONDITION_STATUS_FALSE, REASON_NOT_READY)
    };
    Condition {
        observed_generation: generation,
        ..Condition::new(CONDITION_TYPE_AVAILABLE, status, reason, message)
    }
}

/// Available=Unknown written before the first validation
pub fn reconciling_condition(generation: Option<i64>) -> Condition {
    Condition {
        observed_generation: generation,
        ..Condition::new(
            CONDITION_TYPE_AVAILABLE,
            CONDITION_STATUS_UNKNOWN,
            REASON_RECONCILING,
            MESSAGE_STARTING_RECONCILIATION,
        )
    }
}
