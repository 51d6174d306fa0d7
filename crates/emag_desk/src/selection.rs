//! What the calculator is currently looking at.
//!
//! A selection is an imported offer, a saved calculation, or a scratch
//! calculation created in the current session. The textual form is used on
//! the command line:
//!
//! | Variant            | Text                         |
//! |--------------------|------------------------------|
//! | `EmagProduct`      | `emag:<integration-uuid>:<offer id>` |
//! | `SavedCalculation` | `saved:<uuid>`               |
//! | `Created`          | `created:<n>`                |

use std::fmt;
use std::str::FromStr;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::calculator::{CalculatorInput, Profile};
use crate::repository::{self, RepositoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    EmagProduct { integration_id: Uuid, offer_id: i64 },
    SavedCalculation { id: Uuid },
    Created { index: u32 },
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Malformed selection {input:?}: {reason}")]
    Malformed { input: String, reason: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Saved calculation {id} has an unreadable input: {source}")]
    CorruptSaved {
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("Offer {offer_id} has no usable sale price")]
    MissingPrice { offer_id: i64 },
}

impl SelectionError {
    fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// A selection together with the calculator input it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub selection: Selection,
    pub label: String,
    pub input: CalculatorInput,
}

impl Selection {
    pub fn kind(&self) -> &'static str {
        match self {
            Selection::EmagProduct { .. } => "emag",
            Selection::SavedCalculation { .. } => "saved",
            Selection::Created { .. } => "created",
        }
    }

    /// Load the calculator input behind this selection.
    ///
    /// Offers prefill their sale price on every profile on top of
    /// `defaults`; saved calculations come back as stored; created ones
    /// start from `defaults`.
    pub async fn resolve(
        &self,
        db: &DatabaseConnection,
        defaults: &CalculatorInput,
    ) -> Result<ResolvedSelection, SelectionError> {
        let (label, input) = match *self {
            Selection::EmagProduct {
                integration_id,
                offer_id,
            } => {
                let offer = repository::find_offer(db, integration_id, offer_id).await?;
                let price = offer
                    .sale_price_decimal()
                    .ok_or(SelectionError::MissingPrice { offer_id })?;
                let mut input = defaults.clone();
                for profile in Profile::ALL {
                    input.profiles.get_mut(profile).sale_price = price;
                }
                (offer.name, input)
            }
            Selection::SavedCalculation { id } => {
                let saved = repository::find_calculation(db, id).await?;
                let input = serde_json::from_value(saved.input)
                    .map_err(|source| SelectionError::CorruptSaved { id, source })?;
                (saved.name, input)
            }
            Selection::Created { index } => (format!("Calculation #{index}"), defaults.clone()),
        };

        tracing::debug!(selection = %self, label = %label, "Resolved selection");
        Ok(ResolvedSelection {
            selection: *self,
            label,
            input,
        })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::EmagProduct {
                integration_id,
                offer_id,
            } => write!(f, "emag:{integration_id}:{offer_id}"),
            Selection::SavedCalculation { id } => write!(f, "saved:{id}"),
            Selection::Created { index } => write!(f, "created:{index}"),
        }
    }
}

impl FromStr for Selection {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| SelectionError::malformed(s, "expected <kind>:<id>"))?;

        match kind {
            "emag" => {
                let (integration, offer) = rest.split_once(':').ok_or_else(|| {
                    SelectionError::malformed(s, "expected emag:<integration>:<offer id>")
                })?;
                let integration_id = Uuid::parse_str(integration)
                    .map_err(|e| SelectionError::malformed(s, e.to_string()))?;
                let offer_id = offer
                    .parse::<i64>()
                    .map_err(|e| SelectionError::malformed(s, format!("offer id: {e}")))?;
                Ok(Selection::EmagProduct {
                    integration_id,
                    offer_id,
                })
            }
            "saved" => Uuid::parse_str(rest)
                .map(|id| Selection::SavedCalculation { id })
                .map_err(|e| SelectionError::malformed(s, e.to_string())),
            "created" => rest
                .parse::<u32>()
                .map(|index| Selection::Created { index })
                .map_err(|e| SelectionError::malformed(s, format!("index: {e}"))),
            other => Err(SelectionError::malformed(
                s,
                format!("unknown kind {other:?}, expected emag, saved or created"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    use crate::entity::{product_offer, saved_calculation};

    #[test]
    fn text_form_round_trips() {
        let id = Uuid::new_v4();
        for selection in [
            Selection::EmagProduct {
                integration_id: id,
                offer_id: 4021,
            },
            Selection::SavedCalculation { id },
            Selection::Created { index: 3 },
        ] {
            let text = selection.to_string();
            assert!(text.starts_with(selection.kind()));
            assert_eq!(text.parse::<Selection>().unwrap(), selection);
        }
    }

    #[test]
    fn malformed_text_is_rejected() {
        for bad in [
            "emag",
            "emag:not-a-uuid:5",
            "emag:6f1c5e0e-8f5f-4b8e-9a53-2f0f4f1f3c11",
            "saved:42",
            "created:-1",
            "product:1",
        ] {
            let err = bad.parse::<Selection>().expect_err(bad);
            assert!(matches!(err, SelectionError::Malformed { .. }), "{bad}");
        }
    }

    #[test]
    fn json_form_is_tagged_by_kind() {
        let json = serde_json::to_value(Selection::Created { index: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "created", "index": 2}));

        let parsed: Selection = serde_json::from_value(serde_json::json!({
            "kind": "emag_product",
            "integration_id": "6f1c5e0e-8f5f-4b8e-9a53-2f0f4f1f3c11",
            "offer_id": 9
        }))
        .unwrap();
        assert!(matches!(parsed, Selection::EmagProduct { offer_id: 9, .. }));
    }

    fn offer(price: &str) -> product_offer::Model {
        product_offer::Model {
            id: Uuid::new_v4(),
            integration_id: Uuid::new_v4(),
            emag_id: 77,
            name: "Espressor manual".to_string(),
            part_number: None,
            part_number_key: None,
            category_id: None,
            brand: None,
            sale_price: price.to_string(),
            currency: Some("RON".to_string()),
            stock: 3,
            status: 1,
            genius_eligible: true,
            payload: serde_json::json!({}),
            imported_at: Utc::now().fixed_offset(),
        }
    }

    #[tokio::test]
    async fn offer_prefills_price_on_every_profile() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![offer("249.90")]])
            .into_connection();
        let selection = Selection::EmagProduct {
            integration_id: Uuid::new_v4(),
            offer_id: 77,
        };

        let resolved = selection
            .resolve(&db, &CalculatorInput::default())
            .await
            .unwrap();
        assert_eq!(resolved.label, "Espressor manual");
        for profile in Profile::ALL {
            assert_eq!(resolved.input.profiles.get(profile).sale_price, dec!(249.90));
        }
    }

    #[tokio::test]
    async fn offer_with_garbage_price_is_an_error() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![offer("n/a")]])
            .into_connection();
        let err = Selection::EmagProduct {
            integration_id: Uuid::new_v4(),
            offer_id: 77,
        }
        .resolve(&db, &CalculatorInput::default())
        .await
        .unwrap_err();
        assert!(matches!(err, SelectionError::MissingPrice { offer_id: 77 }));
    }

    #[tokio::test]
    async fn saved_calculation_returns_stored_input() {
        let stored = CalculatorInput::default().with_price(dec!(59.99), dec!(20));
        let now = Utc::now().fixed_offset();
        let id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![saved_calculation::Model {
                id,
                name: "husa".to_string(),
                input: serde_json::to_value(&stored).unwrap(),
                created_at: now,
                updated_at: now,
            }]])
            .into_connection();

        let resolved = Selection::SavedCalculation { id }
            .resolve(&db, &CalculatorInput::default())
            .await
            .unwrap();
        assert_eq!(resolved.label, "husa");
        assert_eq!(resolved.input, stored);
    }

    #[tokio::test]
    async fn created_selection_uses_defaults() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let defaults = CalculatorInput::default().with_price(dec!(10), dec!(1));
        let resolved = Selection::Created { index: 1 }
            .resolve(&db, &defaults)
            .await
            .unwrap();
        assert_eq!(resolved.input, defaults);
        assert_eq!(resolved.label, "Calculation #1");
    }
}
