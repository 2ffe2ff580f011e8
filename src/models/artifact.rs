use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result};

/// Display names are cut from the description at this many characters.
const NAME_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactKind {
    /// Expert Advisor (automated trading robot)
    Ea,
    Indicator,
}

/// A generated MQL5 program. Its license key is bound once and never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub name: String,
    pub description: String,
    pub strategy_details: Option<String>,
    pub code: String,
    pub license_key: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct GenerateArtifact {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub description: String,
    #[serde(default)]
    pub strategy_details: Option<String>,
}

impl GenerateArtifact {
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(AppError::BadRequest("Description is required".into()));
        }
        Ok(())
    }

    /// Display name derived from the description.
    pub fn display_name(&self) -> String {
        self.description.chars().take(NAME_MAX_CHARS).collect()
    }
}

/// Row data for inserting an artifact once its code has been generated.
#[derive(Debug)]
pub struct NewArtifact<'a> {
    pub user_id: &'a str,
    pub kind: ArtifactKind,
    pub name: &'a str,
    pub description: &'a str,
    pub strategy_details: Option<&'a str>,
    pub code: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_truncates_on_char_boundary() {
        let input = GenerateArtifact {
            kind: ArtifactKind::Ea,
            description: "é".repeat(60),
            strategy_details: None,
        };
        assert_eq!(input.display_name().chars().count(), 50);

        let short = GenerateArtifact {
            kind: ArtifactKind::Indicator,
            description: "RSI divergence".into(),
            strategy_details: None,
        };
        assert_eq!(short.display_name(), "RSI divergence");
    }

    #[test]
    fn test_kind_deserializes_from_type_field() {
        let input: GenerateArtifact =
            serde_json::from_str(r#"{"type":"indicator","description":"x"}"#).unwrap();
        assert_eq!(input.kind, ArtifactKind::Indicator);
        assert!(input.strategy_details.is_none());
    }
}
