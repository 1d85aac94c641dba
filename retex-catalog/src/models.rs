use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A supplier selling through the shared catalog. `accepting_orders` is
/// the shop's intake switch: a paused shop keeps its catalog visible but
/// checkout refuses baskets that touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: Uuid,
    pub name: String,
    pub url: Option<String>,
    pub accepting_orders: bool,
}

/// Named grouping; shops declare which categories they sell in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// Canonical item identity, shared across shops. `model` is the unique
/// slug that import matches on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub model: String,
}

/// One named characteristic on an offer, e.g. ("color", "black").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParameterValue {
    pub name: String,
    pub value: String,
}

impl ParameterValue {
    pub fn new(name: &str, value: &str) -> Self {
        Self { name: name.to_string(), value: value.to_string() }
    }
}

/// A shop's priced, stocked instance of a product. Unique per
/// (shop, product). Prices are integer minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub product_id: Uuid,
    pub external_id: i64,
    pub quantity: i64,
    pub price: i64,
    pub price_rrc: i64,
    pub parameters: Vec<ParameterValue>,
}

impl Offer {
    /// Import merge rule for parameters: incoming values overwrite
    /// same-named existing ones in place, names the feed does not mention
    /// stay untouched, new names append in feed order.
    pub fn merge_parameters(&mut self, incoming: &[ParameterValue]) {
        merge_parameter_values(&mut self.parameters, incoming);
    }
}

/// The merge rule itself, shared by every catalog backend.
pub fn merge_parameter_values(existing: &mut Vec<ParameterValue>, incoming: &[ParameterValue]) {
    for param in incoming {
        match existing.iter_mut().find(|p| p.name == param.name) {
            Some(current) => current.value = param.value.clone(),
            None => existing.push(param.clone()),
        }
    }
}

/// One offer joined with its product and shop, as checkout and the basket
/// view consume it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferDetail {
    pub offer: Offer,
    pub product_name: String,
    pub product_model: String,
    pub shop_name: String,
    pub shop_accepting: bool,
}

/// One line of a stock reservation: decrement `quantity` from the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub offer_id: Uuid,
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer_with_params(params: Vec<ParameterValue>) -> Offer {
        Offer {
            id: Uuid::new_v4(),
            shop_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            external_id: 1,
            quantity: 5,
            price: 1000,
            price_rrc: 1200,
            parameters: params,
        }
    }

    #[test]
    fn test_parameter_merge_overwrites_and_preserves() {
        let mut offer = offer_with_params(vec![
            ParameterValue::new("color", "silver"),
            ParameterValue::new("warranty_months", "12"),
        ]);

        offer.merge_parameters(&[
            ParameterValue::new("color", "black"),
            ParameterValue::new("form_factor", "2.5"),
        ]);

        assert_eq!(
            offer.parameters,
            vec![
                ParameterValue::new("color", "black"),
                ParameterValue::new("warranty_months", "12"),
                ParameterValue::new("form_factor", "2.5"),
            ]
        );
    }
}
