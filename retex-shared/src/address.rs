use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A buyer-owned delivery address. At most one per buyer carries
/// `is_default`; the address collaborator enforces that, the core only
/// ever checks ownership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub label: String,
    pub country: String,
    pub city: String,
    pub street: String,
    pub house: String,
    pub apartment: Option<String>,
    pub is_default: bool,
}

impl Address {
    /// Single-line rendering used on invoices and order snapshots.
    pub fn summary(&self) -> String {
        let mut line = [&self.country, &self.city, &self.street, &self.house]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        if let Some(apartment) = &self.apartment {
            if !apartment.is_empty() {
                line.push_str(&format!(", apt. {}", apartment));
            }
        }

        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_summary() {
        let address = Address {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            label: "home".to_string(),
            country: "NL".to_string(),
            city: "Amsterdam".to_string(),
            street: "Herengracht".to_string(),
            house: "12".to_string(),
            apartment: Some("3".to_string()),
            is_default: true,
        };

        assert_eq!(address.summary(), "NL, Amsterdam, Herengracht, 12, apt. 3");
    }
}
