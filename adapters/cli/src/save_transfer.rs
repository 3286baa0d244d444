//! Single-line save-game transfer strings.
//!
//! Saves travel as `bulwark:v1:<columns>x<rows>:<base64 json>` so a whole
//! session fits on a clipboard line. The grid dimensions are repeated in
//! clear text for human inspection and cross-checked against the payload on
//! decode.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use bulwark_core::SaveGame;
use thiserror::Error;

const TRANSFER_DOMAIN: &str = "bulwark";
const TRANSFER_VERSION: &str = "v1";
const FIELD_DELIMITER: char = ':';

/// Encodes a save payload into a single-line transfer string.
pub(crate) fn encode(save: &SaveGame) -> String {
    let json = serde_json::to_vec(save).expect("save serialization never fails");
    let encoded = STANDARD_NO_PAD.encode(json);
    format!(
        "{TRANSFER_DOMAIN}{FIELD_DELIMITER}{TRANSFER_VERSION}{FIELD_DELIMITER}{}x{}{FIELD_DELIMITER}{encoded}",
        save.field.columns, save.field.rows
    )
}

/// Decodes a transfer string back into a save payload.
pub(crate) fn decode(value: &str) -> Result<SaveGame, SaveTransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SaveTransferError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(SaveTransferError::MissingPrefix)?;
    let version = parts.next().ok_or(SaveTransferError::MissingVersion)?;
    let dimensions = parts.next().ok_or(SaveTransferError::MissingDimensions)?;
    let payload = parts.next().ok_or(SaveTransferError::MissingPayload)?;

    if domain != TRANSFER_DOMAIN {
        return Err(SaveTransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != TRANSFER_VERSION {
        return Err(SaveTransferError::UnsupportedVersion(version.to_owned()));
    }

    let (columns, rows) = parse_dimensions(dimensions)?;
    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(SaveTransferError::InvalidEncoding)?;
    let save: SaveGame =
        serde_json::from_slice(&bytes).map_err(SaveTransferError::InvalidPayload)?;

    if save.field.columns != columns || save.field.rows != rows {
        return Err(SaveTransferError::DimensionMismatch {
            header: (columns, rows),
            payload: (save.field.columns, save.field.rows),
        });
    }

    Ok(save)
}

/// Errors that can occur while decoding save transfer strings.
#[derive(Debug, Error)]
pub(crate) enum SaveTransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("save string was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("save string is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("save string is missing the version")]
    MissingVersion,
    /// The grid-dimension segment was missing.
    #[error("save string is missing the grid dimensions")]
    MissingDimensions,
    /// The payload segment was missing.
    #[error("save string is missing the payload")]
    MissingPayload,
    /// The prefix did not match this application.
    #[error("save prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The version is not understood by this build.
    #[error("save version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The dimensions could not be parsed.
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    /// The clear-text dimensions disagree with the payload.
    #[error("header says {header:?} but payload says {payload:?}")]
    DimensionMismatch {
        /// Dimensions from the clear-text header.
        header: (u32, u32),
        /// Dimensions from the decoded payload.
        payload: (u32, u32),
    },
    /// The base64 payload could not be decoded.
    #[error("could not decode save payload: {0}")]
    InvalidEncoding(base64::DecodeError),
    /// The decoded payload could not be deserialized.
    #[error("could not parse save payload: {0}")]
    InvalidPayload(serde_json::Error),
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), SaveTransferError> {
    let (columns, rows) = dimensions
        .split_once(['x', 'X'])
        .ok_or_else(|| SaveTransferError::InvalidDimensions(dimensions.to_owned()))?;

    let columns = columns
        .trim()
        .parse::<u32>()
        .map_err(|_| SaveTransferError::InvalidDimensions(dimensions.to_owned()))?;
    let rows = rows
        .trim()
        .parse::<u32>()
        .map_err(|_| SaveTransferError::InvalidDimensions(dimensions.to_owned()))?;

    if columns == 0 || rows == 0 {
        return Err(SaveTransferError::InvalidDimensions(dimensions.to_owned()));
    }

    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_core::{
        FieldConfig, GameRules, GridPos, SavedTower, TargetPriority, TowerKind, WaveId,
    };
    use std::time::Duration;

    fn sample_save() -> SaveGame {
        SaveGame {
            wave: WaveId::new(7),
            balance: 420,
            lives: 15,
            clock: Duration::from_millis(301_500),
            field: FieldConfig::standard(),
            rules: GameRules::default(),
            towers: vec![
                SavedTower {
                    kind: TowerKind::Bolt,
                    cell: GridPos::new(5, 5),
                    level: 2,
                    invested: 95,
                    priority: TargetPriority::First,
                },
                SavedTower {
                    kind: TowerKind::Frost,
                    cell: GridPos::new(6, 4),
                    level: 0,
                    invested: 70,
                    priority: TargetPriority::Fastest,
                },
            ],
        }
    }

    #[test]
    fn round_trip_preserves_the_save() {
        let save = sample_save();
        let encoded = encode(&save);
        assert!(encoded.starts_with("bulwark:v1:10x10:"));

        let decoded = decode(&encoded).expect("save decodes");
        assert_eq!(decoded, save);
    }

    #[test]
    fn foreign_prefixes_are_rejected() {
        let encoded = encode(&sample_save()).replace("bulwark:", "other:");
        assert!(matches!(
            decode(&encoded),
            Err(SaveTransferError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn future_versions_are_rejected() {
        let encoded = encode(&sample_save()).replace(":v1:", ":v9:");
        assert!(matches!(
            decode(&encoded),
            Err(SaveTransferError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn tampered_dimensions_are_rejected() {
        let encoded = encode(&sample_save()).replace(":10x10:", ":12x10:");
        assert!(matches!(
            decode(&encoded),
            Err(SaveTransferError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn garbage_payloads_fail_cleanly() {
        assert!(matches!(decode(""), Err(SaveTransferError::EmptyPayload)));
        assert!(matches!(
            decode("bulwark:v1:10x10:!!!not-base64!!!"),
            Err(SaveTransferError::InvalidEncoding(_))
        ));
        assert!(matches!(
            decode("bulwark:v1:axb:AAAA"),
            Err(SaveTransferError::InvalidDimensions(_))
        ));
    }
}
