//! Decoded attribute records and the lore text attached to them.
//!
//! A [`PlayerAttribute`] is the already-parsed representation of one
//! allocatable attribute as it appeared in the most recent inventory
//! snapshot. Decoding item tooltips into records is a collaborator concern;
//! this module only defines the record itself plus the one lore sentence the
//! core is required to understand (the spent-points total on the
//! reallocation item).

/// Broad grouping used to organize attributes.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AttributeCategory {
    /// Damage-dealing attributes.
    Offense,
    /// Mitigation and survivability attributes.
    Defense,
    /// Utility and resource attributes.
    Support,
    /// Anything the decoder could not classify.
    #[default]
    Other,
}

/// One allocatable attribute from the received inventory snapshot.
///
/// The display name doubles as the lookup key and must be unique within a
/// snapshot; ingestion overwrites on collision. Records are replaced
/// wholesale whenever a new snapshot arrives and are never partially mutated
/// in live mode. Preview mode adjusts local copies via [`adjust`] and
/// [`cleared`].
///
/// [`adjust`]: PlayerAttribute::adjust
/// [`cleared`]: PlayerAttribute::cleared
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlayerAttribute {
    /// Display name, also the snapshot lookup key.
    pub name: String,

    /// Grouping reported by the decoder.
    pub category: AttributeCategory,

    /// Points currently spent on this attribute.
    pub spent: u32,

    /// Maximum points this attribute accepts.
    pub max: u32,

    /// Points consumed by a single increment.
    pub cost: u32,

    /// Slot index locating this attribute in the received inventory.
    pub slot: usize,
}

impl PlayerAttribute {
    pub fn new(
        name: impl Into<String>,
        category: AttributeCategory,
        spent: u32,
        max: u32,
        cost: u32,
        slot: usize,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            spent,
            max,
            cost,
            slot,
        }
    }

    /// Returns a copy with `delta` applied to the spent count.
    ///
    /// Returns `None` when the adjusted value would leave `0..=max`.
    pub fn adjust(&self, delta: i32) -> Option<Self> {
        let adjusted = i64::from(self.spent) + i64::from(delta);
        if adjusted < 0 || adjusted > i64::from(self.max) {
            return None;
        }

        let mut attribute = self.clone();
        attribute.spent = adjusted as u32;
        Some(attribute)
    }

    /// Returns a copy with all spent points removed.
    pub fn cleared(&self) -> Self {
        let mut attribute = self.clone();
        attribute.spent = 0;
        attribute
    }
}

/// Extracts the spent-points total from one reallocation-item lore line.
///
/// Matches the full sentence `You have spent a total of <N> attributes.`
/// and returns `N`. Any other line yields `None`.
pub fn parse_spent_points(line: &str) -> Option<u32> {
    line.trim()
        .strip_prefix("You have spent a total of ")
        .and_then(|rest| rest.strip_suffix(" attributes."))
        .and_then(|count| count.parse().ok())
}
