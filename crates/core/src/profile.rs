//! Named target allocations and their compilation into command sequences.

use indexmap::IndexMap;

use crate::attribute::PlayerAttribute;
use crate::command::Command;

/// A named target allocation of skill points across attributes.
///
/// Profiles are the savable unit of this system: a user-chosen name plus a
/// mapping from attribute key to desired spent-points count. The mapping
/// iterates in insertion order, which fixes the order of the compiled
/// command sequence.
///
/// The persisted encoding is `{ "name": string, "attributeAllocations":
/// map<string, integer> }`; round-tripping it reproduces an identical
/// compiled sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatProfile {
    /// User-chosen name, unique among saved profiles.
    pub name: String,

    #[cfg_attr(feature = "serde", serde(rename = "attributeAllocations"))]
    allocations: IndexMap<String, u32>,
}

impl StatProfile {
    /// Creates an empty profile with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allocations: IndexMap::new(),
        }
    }

    /// Derives a profile from a live attribute snapshot.
    ///
    /// Each attribute contributes its current spent count; zero-spend
    /// attributes are skipped. This is the inverse of applying the profile
    /// against an empty allocation.
    pub fn from_attributes(
        name: impl Into<String>,
        attributes: &IndexMap<String, PlayerAttribute>,
    ) -> Self {
        let mut profile = Self::new(name);
        for (key, attribute) in attributes {
            if attribute.spent > 0 {
                profile.allocations.insert(key.clone(), attribute.spent);
            }
        }
        profile
    }

    /// Sets the desired spend for an attribute key.
    ///
    /// A zero spend removes the entry so it does not linger in the persisted
    /// encoding.
    pub fn set(&mut self, attribute: impl Into<String>, points: u32) {
        let attribute = attribute.into();
        if points == 0 {
            self.allocations.shift_remove(&attribute);
        } else {
            self.allocations.insert(attribute, points);
        }
    }

    /// Returns the desired spend for an attribute key (0 when absent).
    pub fn get(&self, attribute: &str) -> u32 {
        self.allocations.get(attribute).copied().unwrap_or(0)
    }

    /// The attribute-key → spend mapping in insertion order.
    pub fn allocations(&self) -> &IndexMap<String, u32> {
        &self.allocations
    }

    /// Removes every allocation.
    pub fn clear(&mut self) {
        self.allocations.clear();
    }

    /// Total number of points this profile spends.
    pub fn total_points(&self) -> u32 {
        self.allocations.values().sum()
    }

    /// Compiles this profile into an ordered command sequence.
    ///
    /// Always exactly one [`Command::Reset`] followed by one
    /// [`Command::Increment`] per spent point, increments for each attribute
    /// contiguous, attributes visited in insertion order. A profile with no
    /// allocations compiles to `[Reset]`.
    ///
    /// Attribute keys are not validated here; a key unknown to the live
    /// snapshot is skipped at execution time.
    pub fn compile(&self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(1 + self.total_points() as usize);
        commands.push(Command::Reset);

        for (attribute, &points) in &self.allocations {
            for _ in 0..points {
                commands.push(Command::increment(attribute.clone()));
            }
        }

        commands
    }
}
