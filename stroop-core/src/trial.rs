use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Valence category of a stimulus word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Practice,
    Positive,
    Negative,
    Neutral,
}

impl Condition {
    /// The three experimental conditions, in catalog order.
    pub const EXPERIMENTAL: [Condition; 3] =
        [Condition::Positive, Condition::Negative, Condition::Neutral];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Practice => "practice",
            Condition::Positive => "positive",
            Condition::Negative => "negative",
            Condition::Neutral => "neutral",
        }
    }

    /// Three-letter code used in per-trial export columns.
    pub fn short_code(&self) -> &'static str {
        &self.as_str()[..3]
    }

    pub fn parse(s: &str) -> Option<Condition> {
        match s.trim() {
            "practice" => Some(Condition::Practice),
            "positive" => Some(Condition::Positive),
            "negative" => Some(Condition::Negative),
            "neutral" => Some(Condition::Neutral),
            _ => None,
        }
    }
}

/// Ink color a stimulus word can be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InkColor {
    Red,
    Green,
    Blue,
}

impl InkColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            InkColor::Red => "red",
            InkColor::Green => "green",
            InkColor::Blue => "blue",
        }
    }
}

/// Response keys, in the order color-set slots are bound to them.
const RESPONSE_KEYS: [char; 3] = ['f', 'j', 'k'];

/// The active set of 2 or 3 ink colors, each bound to one response key
/// by position (`f`, `j`, then `k`). Serialized as a plain color list;
/// deserialization goes through `new` so the size and distinctness
/// invariants hold for configuration loaded from files too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<InkColor>", try_from = "Vec<InkColor>")]
pub struct ColorSet {
    colors: Vec<InkColor>,
}

impl From<ColorSet> for Vec<InkColor> {
    fn from(set: ColorSet) -> Vec<InkColor> {
        set.colors
    }
}

impl TryFrom<Vec<InkColor>> for ColorSet {
    type Error = CatalogError;

    fn try_from(colors: Vec<InkColor>) -> Result<Self, CatalogError> {
        ColorSet::new(colors)
    }
}

impl ColorSet {
    pub fn new(colors: Vec<InkColor>) -> Result<Self, CatalogError> {
        if colors.len() < 2 || colors.len() > 3 {
            return Err(CatalogError::InvalidColorSet {
                reason: format!("expected 2 or 3 colors, got {}", colors.len()),
            });
        }
        for (i, c) in colors.iter().enumerate() {
            if colors[..i].contains(c) {
                return Err(CatalogError::InvalidColorSet {
                    reason: format!("duplicate color {}", c.as_str()),
                });
            }
        }
        Ok(Self { colors })
    }

    pub fn colors(&self) -> &[InkColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn key_for(&self, color: InkColor) -> Option<char> {
        self.colors
            .iter()
            .position(|c| *c == color)
            .map(|i| RESPONSE_KEYS[i])
    }

    pub fn color_for_key(&self, key: char) -> Option<InkColor> {
        let key = key.to_ascii_lowercase();
        RESPONSE_KEYS
            .iter()
            .position(|k| *k == key)
            .and_then(|i| self.colors.get(i).copied())
    }

    /// Uniformly random member of the set.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> InkColor {
        self.colors[rng.random_range(0..self.colors.len())]
    }
}

impl Default for ColorSet {
    fn default() -> Self {
        Self {
            colors: vec![InkColor::Red, InkColor::Green],
        }
    }
}

/// One stimulus presentation. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub text: String,
    pub display_color: InkColor,
    /// Equals `display_color` in this task; kept separate for clarity.
    pub correct_answer: InkColor,
    pub condition: Condition,
}

/// Ordered, fixed-length list of trials for one phase. Order is randomized
/// once at creation and never reshuffled mid-phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSequence {
    trials: Vec<Trial>,
}

impl TrialSequence {
    pub fn new(trials: Vec<Trial>) -> Self {
        Self { trials }
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Trial> {
        self.trials.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trial> {
        self.trials.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_set_rejects_wrong_sizes() {
        assert!(ColorSet::new(vec![InkColor::Red]).is_err());
        assert!(ColorSet::new(vec![
            InkColor::Red,
            InkColor::Green,
            InkColor::Blue
        ])
        .is_ok());
    }

    #[test]
    fn color_set_rejects_duplicates() {
        assert!(ColorSet::new(vec![InkColor::Red, InkColor::Red]).is_err());
    }

    #[test]
    fn key_bindings_follow_slot_order() {
        let set =
            ColorSet::new(vec![InkColor::Red, InkColor::Green, InkColor::Blue]).unwrap();
        assert_eq!(set.key_for(InkColor::Red), Some('f'));
        assert_eq!(set.key_for(InkColor::Green), Some('j'));
        assert_eq!(set.key_for(InkColor::Blue), Some('k'));
        assert_eq!(set.color_for_key('F'), Some(InkColor::Red));
        assert_eq!(set.color_for_key('x'), None);
    }

    #[test]
    fn color_set_deserialization_enforces_invariants() {
        let set: ColorSet = serde_json::from_str(r#"["red","green"]"#).unwrap();
        assert_eq!(set.colors(), &[InkColor::Red, InkColor::Green]);
        assert!(!set.is_empty());

        assert!(serde_json::from_str::<ColorSet>("[]").is_err());
        assert!(serde_json::from_str::<ColorSet>(r#"["red"]"#).is_err());
        assert!(serde_json::from_str::<ColorSet>(r#"["red","red"]"#).is_err());
        assert!(
            serde_json::from_str::<ColorSet>(r#"["red","green","blue","red"]"#).is_err()
        );
    }

    #[test]
    fn color_set_serializes_as_color_list() {
        let set = ColorSet::new(vec![InkColor::Blue, InkColor::Red]).unwrap();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["blue","red"]"#);
    }

    #[test]
    fn condition_short_codes() {
        assert_eq!(Condition::Positive.short_code(), "pos");
        assert_eq!(Condition::Negative.short_code(), "neg");
        assert_eq!(Condition::Neutral.short_code(), "neu");
    }
}
