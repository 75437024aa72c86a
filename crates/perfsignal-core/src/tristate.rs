//! Three-valued booleans used by `should_alert` and `monitor`.
//!
//! The source keeps these as nullable booleans with implicit defaults; per
//! §9 of the spec we model the three states explicitly so that "unset" can
//! never be silently confused with "false" at a call site.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    True,
    False,
    Unset,
}

impl TriState {
    pub fn is_true(self) -> bool {
        matches!(self, TriState::True)
    }

    pub fn is_false(self) -> bool {
        matches!(self, TriState::False)
    }

    pub fn is_unset(self) -> bool {
        matches!(self, TriState::Unset)
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => TriState::True,
            Some(false) => TriState::False,
            None => TriState::Unset,
        }
    }
}

impl Default for TriState {
    fn default() -> Self {
        TriState::Unset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_option_bool_round_trips_all_three_states() {
        assert_eq!(TriState::from(Some(true)), TriState::True);
        assert_eq!(TriState::from(Some(false)), TriState::False);
        assert_eq!(TriState::from(None), TriState::Unset);
    }
}
