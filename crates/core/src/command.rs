//! Atomic server-interaction commands.

/// One atomic server action produced by compiling a [`StatProfile`].
///
/// Commands are immutable: they are created once during compilation and
/// consumed one at a time by the sequencer.
///
/// [`StatProfile`]: crate::profile::StatProfile
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Clear every allocated point by activating the reallocation item.
    Reset,

    /// Spend one point on the named attribute.
    Increment(String),
}

impl Command {
    /// Creates an increment command for the given attribute key.
    pub fn increment(attribute: impl Into<String>) -> Self {
        Self::Increment(attribute.into())
    }

    /// Returns true if this is a reset command.
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }

    /// Returns true if this is an increment command.
    pub fn is_increment(&self) -> bool {
        matches!(self, Self::Increment(_))
    }

    /// Returns the attribute key for increment commands.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::Reset => None,
            Self::Increment(name) => Some(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        let reset = Command::Reset;
        assert!(reset.is_reset());
        assert!(!reset.is_increment());
        assert_eq!(reset.attribute(), None);

        let inc = Command::increment("Ferocity");
        assert!(inc.is_increment());
        assert_eq!(inc.attribute(), Some("Ferocity"));
    }
}
