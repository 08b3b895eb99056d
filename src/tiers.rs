use std::cmp::Ordering;

use crate::models::{AssignmentStatus, SlotStatus, TierCode};

impl TierCode {
    pub fn rank(self) -> u8 {
        match self {
            TierCode::Tier1 => 1,
            TierCode::Tier2 => 2,
            TierCode::Tier3 => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TierCode::Tier1 => "Tier 1",
            TierCode::Tier2 => "Tier 2",
            TierCode::Tier3 => "Tier 3",
        }
    }

    pub fn is_escalated(self) -> bool {
        self != TierCode::Tier1
    }
}

impl AssignmentStatus {
    /// Missing status is treated as a live plan; anything unrecognized ranks below `closed`.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return AssignmentStatus::Active;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "active" => AssignmentStatus::Active,
            "paused" | "on hold" | "on-hold" => AssignmentStatus::Paused,
            "completed" | "complete" => AssignmentStatus::Completed,
            "closed" => AssignmentStatus::Closed,
            _ => AssignmentStatus::Unknown,
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            AssignmentStatus::Active => 4,
            AssignmentStatus::Paused => 3,
            AssignmentStatus::Completed => 2,
            AssignmentStatus::Closed => 1,
            AssignmentStatus::Unknown => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssignmentStatus::Active => "Active",
            AssignmentStatus::Paused => "Paused",
            AssignmentStatus::Completed => "Completed",
            AssignmentStatus::Closed => "Closed",
            AssignmentStatus::Unknown => "Monitoring",
        }
    }

    pub fn slot_status(self) -> SlotStatus {
        match self {
            AssignmentStatus::Active => SlotStatus::Active,
            AssignmentStatus::Paused => SlotStatus::Paused,
            AssignmentStatus::Completed | AssignmentStatus::Closed => SlotStatus::Closed,
            AssignmentStatus::Unknown => SlotStatus::Monitoring,
        }
    }
}

impl SlotStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("active") => SlotStatus::Active,
            Some("paused") => SlotStatus::Paused,
            Some("closed") | Some("completed") => SlotStatus::Closed,
            _ => SlotStatus::Monitoring,
        }
    }
}

/// Assignment tier tokens are matched by substring: "3" wins, then "1", anything else is Tier 2.
pub fn assignment_tier(raw: Option<&str>) -> TierCode {
    let token = raw.unwrap_or("");
    if token.contains('3') {
        TierCode::Tier3
    } else if token.contains('1') {
        TierCode::Tier1
    } else {
        TierCode::Tier2
    }
}

/// A tier declared on a roster entry or stored slot. `None` when nothing recognizable is there.
pub fn declared_tier(raw: Option<&str>) -> Option<TierCode> {
    let token = raw?.trim().to_ascii_lowercase();
    if token.contains('3') || token.contains("intensive") {
        Some(TierCode::Tier3)
    } else if token.contains('2') || token.contains("targeted") {
        Some(TierCode::Tier2)
    } else if token.contains('1') || token.contains("universal") {
        Some(TierCode::Tier1)
    } else {
        None
    }
}

pub fn declared_rank(raw: Option<&str>) -> u8 {
    declared_tier(raw).map(TierCode::rank).unwrap_or(0)
}

pub fn compare_tiers_desc(a: TierCode, b: TierCode) -> Ordering {
    b.rank().cmp(&a.rank())
}

/// Orders assignments most urgent first: higher tier, then higher status.
pub fn compare_urgency(
    a: (TierCode, AssignmentStatus),
    b: (TierCode, AssignmentStatus),
) -> Ordering {
    compare_tiers_desc(a.0, b.0).then_with(|| b.1.rank().cmp(&a.1.rank()))
}
