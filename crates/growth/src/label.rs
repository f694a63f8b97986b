use serde::{Serialize, Serializer};
use std::fmt;

/// Growth stages the harvest logic understands, in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Primordia,
    Muda,
    Matang,
}

impl Stage {
    pub const COUNT: usize = 3;
    pub const ALL: [Stage; Self::COUNT] = [Stage::Primordia, Stage::Muda, Stage::Matang];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Primordia => "Primordia",
            Stage::Muda => "Muda",
            Stage::Matang => "Matang",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of normalizing a raw detector class name.
///
/// Labels the synonym table does not know are carried verbatim so upstream
/// label drift stays visible in responses and counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Stage(Stage),
    Unrecognized(String),
}

impl Label {
    pub fn as_str(&self) -> &str {
        match self {
            Label::Stage(stage) => stage.as_str(),
            Label::Unrecognized(raw) => raw,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Label::Stage(stage) => Some(*stage),
            Label::Unrecognized(_) => None,
        }
    }
}

impl From<Stage> for Label {
    fn from(stage: Stage) -> Self {
        Label::Stage(stage)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Keys are already folded (lowercase, single spaces).
const SYNONYMS: &[(&str, Stage)] = &[
    ("primordia", Stage::Primordia),
    ("fase primordia", Stage::Primordia),
    ("muda", Stage::Muda),
    ("fase muda", Stage::Muda),
    ("matang", Stage::Matang),
    ("fase matang", Stage::Matang),
];

/// Map a raw class name onto a growth stage.
///
/// Matching ignores case, surrounding whitespace, and treats runs of
/// whitespace, `_` and `-` as a single space, so `"Fase_Muda"` and
/// `" fase  muda "` both resolve to [`Stage::Muda`].
pub fn normalize(raw: &str) -> Label {
    let folded = fold(raw);
    SYNONYMS
        .iter()
        .find(|(key, _)| *key == folded)
        .map(|(_, stage)| Label::Stage(*stage))
        .unwrap_or_else(|| Label::Unrecognized(raw.to_string()))
}

fn fold(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_variants_resolve_to_same_stage() {
        assert_eq!(normalize("primordia"), normalize("Primordia"));
        assert_eq!(normalize("PRIMORDIA"), Label::Stage(Stage::Primordia));
        assert_ne!(normalize("primordia"), normalize("Matang"));
    }

    #[test]
    fn test_known_dataset_spellings() {
        assert_eq!(normalize("Fase Muda"), Label::Stage(Stage::Muda));
        assert_eq!(normalize("Muda"), Label::Stage(Stage::Muda));
        assert_eq!(normalize("matang"), Label::Stage(Stage::Matang));
        assert_eq!(normalize("Matang"), Label::Stage(Stage::Matang));
    }

    #[test]
    fn test_whitespace_and_separators_are_tolerated() {
        assert_eq!(normalize("  fase   muda "), Label::Stage(Stage::Muda));
        assert_eq!(normalize("Fase_Muda"), Label::Stage(Stage::Muda));
        assert_eq!(normalize("fase-matang"), Label::Stage(Stage::Matang));
        assert_eq!(normalize("\tPrimordia\n"), Label::Stage(Stage::Primordia));
    }

    #[test]
    fn test_unknown_label_passes_through_verbatim() {
        assert_eq!(
            normalize("  Busuk "),
            Label::Unrecognized("  Busuk ".to_string())
        );
        assert_eq!(normalize(""), Label::Unrecognized(String::new()));
    }

    #[test]
    fn test_partial_matches_are_not_stages() {
        assert!(normalize("muda matang").stage().is_none());
        assert!(normalize("fase").stage().is_none());
    }

    #[test]
    fn test_label_serializes_as_plain_string() {
        let json = serde_json::to_string(&Label::Stage(Stage::Muda)).unwrap();
        assert_eq!(json, "\"Muda\"");
        let json = serde_json::to_string(&Label::Unrecognized("class_7".into())).unwrap();
        assert_eq!(json, "\"class_7\"");
    }
}
