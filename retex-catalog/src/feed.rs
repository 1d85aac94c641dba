use serde::Deserialize;
use std::collections::HashMap;

use crate::importer::ImportError;
use crate::models::ParameterValue;

/// The external feed document as shops publish it: one YAML file naming
/// the shop, its categories and its sellable goods.
#[derive(Debug, Deserialize)]
pub struct Feed {
    pub shop: String,
    pub categories: Vec<FeedCategory>,
    pub goods: Vec<FeedGood>,
}

#[derive(Debug, Deserialize)]
pub struct FeedCategory {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedGood {
    /// The shop's own identifier for this offer.
    pub id: i64,
    /// References a `FeedCategory.id` within the same document.
    pub category: i64,
    pub model: String,
    pub name: String,
    pub price: i64,
    pub price_rrc: i64,
    pub quantity: i64,
    #[serde(default)]
    pub parameters: serde_yaml::Mapping,
}

/// A parsed, validated feed normalized for the catalog store: category ids
/// are resolved to names, parameters are flattened to ordered pairs.
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub shop_name: String,
    pub categories: Vec<String>,
    pub offers: Vec<OfferSpec>,
}

#[derive(Debug, Clone)]
pub struct OfferSpec {
    pub external_id: i64,
    pub model: String,
    pub name: String,
    pub category: String,
    pub price: i64,
    pub price_rrc: i64,
    pub quantity: i64,
    pub parameters: Vec<ParameterValue>,
}

impl Feed {
    /// Structural parse. Anything YAML or the schema rejects fails the
    /// whole import as `MalformedFeed`.
    pub fn parse(raw: &str) -> Result<Self, ImportError> {
        serde_yaml::from_str(raw).map_err(|e| ImportError::MalformedFeed(e.to_string()))
    }

    /// Semantic validation and normalization. Any bad row aborts the whole
    /// feed; nothing is partially applied.
    pub fn into_batch(self) -> Result<ImportBatch, ImportError> {
        if self.shop.trim().is_empty() {
            return Err(ImportError::ValidationFailed("shop name is empty".to_string()));
        }

        let mut category_names: HashMap<i64, String> = HashMap::new();
        let mut categories = Vec::new();
        for category in &self.categories {
            let name = category.name.trim();
            if name.is_empty() {
                return Err(ImportError::ValidationFailed(format!(
                    "category {} has an empty name",
                    category.id
                )));
            }
            if category_names.contains_key(&category.id) {
                return Err(ImportError::ValidationFailed(format!(
                    "duplicate category id {}",
                    category.id
                )));
            }
            category_names.insert(category.id, name.to_string());
            categories.push(name.to_string());
        }

        let mut offers = Vec::with_capacity(self.goods.len());
        for good in self.goods {
            let model = good.model.trim();
            let name = good.name.trim();
            if model.is_empty() || name.is_empty() {
                return Err(ImportError::ValidationFailed(format!(
                    "good {} is missing model or name",
                    good.id
                )));
            }
            if good.price < 0 || good.price_rrc < 0 {
                return Err(ImportError::ValidationFailed(format!(
                    "good {} has a negative price",
                    good.id
                )));
            }
            if good.quantity < 0 {
                return Err(ImportError::ValidationFailed(format!(
                    "good {} has a negative quantity",
                    good.id
                )));
            }
            let category = category_names.get(&good.category).cloned().ok_or_else(|| {
                ImportError::ValidationFailed(format!(
                    "good {} references unknown category {}",
                    good.id, good.category
                ))
            })?;

            offers.push(OfferSpec {
                external_id: good.id,
                model: model.to_string(),
                name: name.to_string(),
                category,
                price: good.price,
                price_rrc: good.price_rrc,
                quantity: good.quantity,
                parameters: flatten_parameters(good.id, &good.parameters)?,
            });
        }

        Ok(ImportBatch { shop_name: self.shop.trim().to_string(), categories, offers })
    }
}

/// Feed parameters arrive as a YAML mapping of scalars. Document order is
/// kept; nested values are rejected rather than silently stringified.
fn flatten_parameters(
    good_id: i64,
    mapping: &serde_yaml::Mapping,
) -> Result<Vec<ParameterValue>, ImportError> {
    let mut parameters = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = key.as_str().ok_or_else(|| {
            ImportError::ValidationFailed(format!("good {} has a non-string parameter name", good_id))
        })?;
        let value = match value {
            serde_yaml::Value::String(s) => s.clone(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            _ => {
                return Err(ImportError::ValidationFailed(format!(
                    "good {} parameter '{}' is not a scalar",
                    good_id, name
                )))
            }
        };
        parameters.push(ParameterValue { name: name.to_string(), value });
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"
shop: TechnoTrade
categories:
  - id: 224
    name: Storage
goods:
  - id: 4216292
    category: 224
    model: ssd-1tb
    name: Vertex SSD 1TB
    price: 5000
    price_rrc: 5990
    quantity: 10
    parameters:
      form_factor: "2.5"
      warranty_months: 36
"#;

    #[test]
    fn test_parse_and_normalize() {
        let batch = Feed::parse(FEED).unwrap().into_batch().unwrap();

        assert_eq!(batch.shop_name, "TechnoTrade");
        assert_eq!(batch.categories, vec!["Storage".to_string()]);
        assert_eq!(batch.offers.len(), 1);

        let offer = &batch.offers[0];
        assert_eq!(offer.model, "ssd-1tb");
        assert_eq!(offer.category, "Storage");
        assert_eq!(offer.quantity, 10);
        assert_eq!(
            offer.parameters,
            vec![
                ParameterValue::new("form_factor", "2.5"),
                ParameterValue::new("warranty_months", "36"),
            ]
        );
    }

    #[test]
    fn test_not_yaml_is_malformed() {
        let result = Feed::parse("{{{ not yaml");
        assert!(matches!(result, Err(ImportError::MalformedFeed(_))));
    }

    #[test]
    fn test_missing_goods_key_is_malformed() {
        let result = Feed::parse("shop: X\ncategories: []\n");
        assert!(matches!(result, Err(ImportError::MalformedFeed(_))));
    }

    #[test]
    fn test_negative_quantity_fails_validation() {
        let raw = FEED.replace("quantity: 10", "quantity: -1");
        let result = Feed::parse(&raw).unwrap().into_batch();
        assert!(matches!(result, Err(ImportError::ValidationFailed(_))));
    }

    #[test]
    fn test_duplicate_category_id_fails_validation() {
        let raw = FEED.replace(
            "  - id: 224\n    name: Storage",
            "  - id: 224\n    name: Storage\n  - id: 224\n    name: Peripherals",
        );
        let result = Feed::parse(&raw).unwrap().into_batch();
        assert!(matches!(result, Err(ImportError::ValidationFailed(_))));
    }

    #[test]
    fn test_unknown_category_reference_fails_validation() {
        let raw = FEED.replace("category: 224", "category: 999");
        let result = Feed::parse(&raw).unwrap().into_batch();
        assert!(matches!(result, Err(ImportError::ValidationFailed(_))));
    }

    #[test]
    fn test_nested_parameter_fails_validation() {
        let raw = FEED.replace("warranty_months: 36", "warranty_months: [36]");
        let result = Feed::parse(&raw).unwrap().into_batch();
        assert!(matches!(result, Err(ImportError::ValidationFailed(_))));
    }
}
