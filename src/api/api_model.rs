use serde::Deserialize;

use crate::errors::ValidationError;
use crate::suggestions::{SuggestedItemsFilters, VolumeType};

/// Inbound query for the suggestions procedure. Validated at the boundary
/// before anything reaches the scoring engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedItemsQuery {
    pub capital: Option<i64>,
    pub volume_type: Option<String>,
}

impl SuggestedItemsQuery {
    pub fn validate(&self) -> Result<SuggestedItemsFilters, ValidationError> {
        if let Some(capital) = self.capital {
            if capital <= 0 {
                return Err(ValidationError::InvalidInput(format!(
                    "Capital must be a positive integer, got {}",
                    capital
                )));
            }
        }

        let volume_type = self
            .volume_type
            .as_deref()
            .map(|s| s.parse::<VolumeType>())
            .transpose()?;

        Ok(SuggestedItemsFilters {
            capital: self.capital,
            volume_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_query_maps_to_filters() {
        let query = SuggestedItemsQuery {
            capital: Some(1_000_000),
            volume_type: Some("high".to_string()),
        };
        let filters = query.validate().unwrap();
        assert_eq!(filters.capital, Some(1_000_000));
        assert_eq!(filters.volume_type, Some(VolumeType::High));
    }

    #[test]
    fn test_empty_query_is_unfiltered() {
        let filters = SuggestedItemsQuery::default().validate().unwrap();
        assert!(filters.is_unfiltered());
    }

    #[test]
    fn test_non_positive_capital_is_rejected() {
        for capital in [0, -5] {
            let query = SuggestedItemsQuery {
                capital: Some(capital),
                volume_type: None,
            };
            assert!(query.validate().is_err());
        }
    }

    #[test]
    fn test_unknown_volume_type_is_rejected() {
        let query = SuggestedItemsQuery {
            capital: None,
            volume_type: Some("medium".to_string()),
        };
        assert!(query.validate().is_err());
    }
}
