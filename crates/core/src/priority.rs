//! Priority values and their display names.
//!
//! Priorities are stored as small signed integers so that `ORDER BY
//! priority DESC` yields the most important rows first. The UI shows the
//! name instead of the number.

// ---------------------------------------------------------------------------
// Priority constants
// ---------------------------------------------------------------------------

/// Highest priority.
pub const PRIORITY_HIGH: i32 = 1;

/// Default priority for new rows.
pub const PRIORITY_NORMAL: i32 = 0;

/// Lowest priority.
pub const PRIORITY_LOW: i32 = -1;

/// Known priorities, highest first.
pub const PRIORITIES: &[(i32, &str)] = &[
    (PRIORITY_HIGH, "high"),
    (PRIORITY_NORMAL, "normal"),
    (PRIORITY_LOW, "low"),
];

/// Map a raw priority to its display name.
///
/// Values outside [`PRIORITIES`] render as their decimal string so that a
/// row written by a newer schema never fails to serialize.
pub fn priority_name(priority: i32) -> String {
    PRIORITIES
        .iter()
        .find(|(value, _)| *value == priority)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| priority.to_string())
}

/// Capability for entities that carry an integer priority.
pub trait PriorityNamed {
    /// The raw stored priority.
    fn priority(&self) -> i32;

    /// Display name for [`PriorityNamed::priority`].
    fn priority_name(&self) -> String {
        priority_name(self.priority())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Prioritized(i32);

    impl PriorityNamed for Prioritized {
        fn priority(&self) -> i32 {
            self.0
        }
    }

    #[test]
    fn known_priorities_have_names() {
        assert_eq!(priority_name(PRIORITY_HIGH), "high");
        assert_eq!(priority_name(PRIORITY_NORMAL), "normal");
        assert_eq!(priority_name(PRIORITY_LOW), "low");
    }

    #[test]
    fn unknown_priority_renders_number() {
        assert_eq!(priority_name(7), "7");
        assert_eq!(priority_name(-3), "-3");
    }

    #[test]
    fn trait_default_uses_lookup() {
        assert_eq!(Prioritized(1).priority_name(), "high");
        assert_eq!(Prioritized(2).priority_name(), "2");
    }
}
