use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use retex_catalog::feed::ImportBatch;
use retex_catalog::importer::ImportSummary;
use retex_catalog::repository::{CatalogRepository, ReserveError};
use retex_catalog::{merge_parameter_values, Offer, OfferDetail, ParameterValue, Shop, StockLine};
use retex_core::BoxError;

pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct ShopRow {
    id: Uuid,
    name: String,
    url: Option<String>,
    accepting_orders: bool,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Shop {
            id: row.id,
            name: row.name,
            url: row.url,
            accepting_orders: row.accepting_orders,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OfferRow {
    id: Uuid,
    shop_id: Uuid,
    product_id: Uuid,
    external_id: i64,
    quantity: i64,
    price: i64,
    price_rrc: i64,
    parameters: Value,
}

impl OfferRow {
    fn into_offer(self) -> Result<Offer, BoxError> {
        let parameters: Vec<ParameterValue> = serde_json::from_value(self.parameters)?;
        Ok(Offer {
            id: self.id,
            shop_id: self.shop_id,
            product_id: self.product_id,
            external_id: self.external_id,
            quantity: self.quantity,
            price: self.price,
            price_rrc: self.price_rrc,
            parameters,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OfferDetailRow {
    id: Uuid,
    shop_id: Uuid,
    product_id: Uuid,
    external_id: i64,
    quantity: i64,
    price: i64,
    price_rrc: i64,
    parameters: Value,
    product_name: String,
    product_model: String,
    shop_name: String,
    shop_accepting: bool,
}

#[async_trait]
impl CatalogRepository for PgCatalog {
    async fn get_shop(&self, id: Uuid) -> Result<Option<Shop>, BoxError> {
        let row = sqlx::query_as::<_, ShopRow>(
            "SELECT id, name, url, accepting_orders FROM shops WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Shop::from))
    }

    async fn set_shop_state(&self, id: Uuid, accepting: bool) -> Result<(), BoxError> {
        let result = sqlx::query("UPDATE shops SET accepting_orders = $2 WHERE id = $1")
            .bind(id)
            .bind(accepting)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(format!("shop {} not found", id).into());
        }
        Ok(())
    }

    async fn get_offer(&self, id: Uuid) -> Result<Option<Offer>, BoxError> {
        let row = sqlx::query_as::<_, OfferRow>(
            "SELECT id, shop_id, product_id, external_id, quantity, price, price_rrc, parameters \
             FROM offers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OfferRow::into_offer).transpose()
    }

    async fn get_offer_detail(&self, id: Uuid) -> Result<Option<OfferDetail>, BoxError> {
        let row = sqlx::query_as::<_, OfferDetailRow>(
            "SELECT o.id, o.shop_id, o.product_id, o.external_id, o.quantity, o.price, \
                    o.price_rrc, o.parameters, \
                    p.name AS product_name, p.model AS product_model, \
                    s.name AS shop_name, s.accepting_orders AS shop_accepting \
             FROM offers o \
             JOIN products p ON p.id = o.product_id \
             JOIN shops s ON s.id = o.shop_id \
             WHERE o.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let parameters: Vec<ParameterValue> = serde_json::from_value(row.parameters)?;
        Ok(Some(OfferDetail {
            offer: Offer {
                id: row.id,
                shop_id: row.shop_id,
                product_id: row.product_id,
                external_id: row.external_id,
                quantity: row.quantity,
                price: row.price,
                price_rrc: row.price_rrc,
                parameters,
            },
            product_name: row.product_name,
            product_model: row.product_model,
            shop_name: row.shop_name,
            shop_accepting: row.shop_accepting,
        }))
    }

    async fn offers_for_shop(&self, shop_id: Uuid) -> Result<Vec<Offer>, BoxError> {
        let rows = sqlx::query_as::<_, OfferRow>(
            "SELECT id, shop_id, product_id, external_id, quantity, price, price_rrc, parameters \
             FROM offers WHERE shop_id = $1 ORDER BY external_id",
        )
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OfferRow::into_offer).collect()
    }

    async fn apply_import(
        &self,
        shop_id: Uuid,
        batch: ImportBatch,
    ) -> Result<ImportSummary, BoxError> {
        let mut summary = ImportSummary::default();
        let mut tx = self.pool.begin().await?;

        // The feed is authoritative for the shop's display name.
        sqlx::query(
            "INSERT INTO shops (id, name, accepting_orders) VALUES ($1, $2, TRUE) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(shop_id)
        .bind(&batch.shop_name)
        .execute(&mut *tx)
        .await?;

        let mut category_ids: HashMap<String, Uuid> = HashMap::new();
        for name in &batch.categories {
            let existing: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM categories WHERE name = $1")
                    .bind(name)
                    .fetch_optional(&mut *tx)
                    .await?;
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = Uuid::new_v4();
                    sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
                        .bind(id)
                        .bind(name)
                        .execute(&mut *tx)
                        .await?;
                    summary.categories_created += 1;
                    id
                }
            };
            sqlx::query(
                "INSERT INTO shop_categories (shop_id, category_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(shop_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            category_ids.insert(name.clone(), id);
        }

        for spec in &batch.offers {
            let category_id = category_ids
                .get(&spec.category)
                .copied()
                .ok_or_else(|| format!("category '{}' missing from batch", spec.category))?;

            let existing: Option<(Uuid, String, Uuid)> =
                sqlx::query_as("SELECT id, name, category_id FROM products WHERE model = $1")
                    .bind(&spec.model)
                    .fetch_optional(&mut *tx)
                    .await?;
            let product_id = match existing {
                Some((id, name, current_category)) => {
                    if name != spec.name || current_category != category_id {
                        sqlx::query("UPDATE products SET name = $2, category_id = $3 WHERE id = $1")
                            .bind(id)
                            .bind(&spec.name)
                            .bind(category_id)
                            .execute(&mut *tx)
                            .await?;
                        summary.products_updated += 1;
                    }
                    id
                }
                None => {
                    let id = Uuid::new_v4();
                    sqlx::query(
                        "INSERT INTO products (id, category_id, name, model) \
                         VALUES ($1, $2, $3, $4)",
                    )
                    .bind(id)
                    .bind(category_id)
                    .bind(&spec.name)
                    .bind(&spec.model)
                    .execute(&mut *tx)
                    .await?;
                    summary.products_created += 1;
                    id
                }
            };

            let existing: Option<(Uuid, Value)> = sqlx::query_as(
                "SELECT id, parameters FROM offers WHERE shop_id = $1 AND product_id = $2",
            )
            .bind(shop_id)
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
            match existing {
                Some((offer_id, stored)) => {
                    // Import is authoritative for these fields, incremental
                    // for parameters.
                    let mut parameters: Vec<ParameterValue> = serde_json::from_value(stored)?;
                    merge_parameter_values(&mut parameters, &spec.parameters);
                    sqlx::query(
                        "UPDATE offers SET external_id = $2, quantity = $3, price = $4, \
                         price_rrc = $5, parameters = $6 WHERE id = $1",
                    )
                    .bind(offer_id)
                    .bind(spec.external_id)
                    .bind(spec.quantity)
                    .bind(spec.price)
                    .bind(spec.price_rrc)
                    .bind(serde_json::to_value(&parameters)?)
                    .execute(&mut *tx)
                    .await?;
                    summary.offers_updated += 1;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO offers (id, shop_id, product_id, external_id, quantity, \
                         price, price_rrc, parameters) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                    )
                    .bind(Uuid::new_v4())
                    .bind(shop_id)
                    .bind(product_id)
                    .bind(spec.external_id)
                    .bind(spec.quantity)
                    .bind(spec.price)
                    .bind(spec.price_rrc)
                    .bind(serde_json::to_value(&spec.parameters)?)
                    .execute(&mut *tx)
                    .await?;
                    summary.offers_created += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(summary)
    }

    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<(), ReserveError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ReserveError::Storage(e.into()))?;

        // Lock every touched offer row up front; concurrent reservations
        // over the same offers serialize here.
        let ids: Vec<Uuid> = lines.iter().map(|l| l.offer_id).collect();
        let rows: Vec<(Uuid, i64)> =
            sqlx::query_as("SELECT id, quantity FROM offers WHERE id = ANY($1) FOR UPDATE")
                .bind(&ids)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| ReserveError::Storage(e.into()))?;
        let held: HashMap<Uuid, i64> = rows.into_iter().collect();

        for line in lines {
            let available = *held
                .get(&line.offer_id)
                .ok_or(ReserveError::OfferMissing(line.offer_id))?;
            if available < line.quantity {
                // Dropping the transaction rolls the locks back.
                return Err(ReserveError::InsufficientStock {
                    offer_id: line.offer_id,
                    available,
                    requested: line.quantity,
                });
            }
        }

        for line in lines {
            sqlx::query("UPDATE offers SET quantity = quantity - $2 WHERE id = $1")
                .bind(line.offer_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await
                .map_err(|e| ReserveError::Storage(e.into()))?;
        }

        tx.commit()
            .await
            .map_err(|e| ReserveError::Storage(e.into()))?;
        Ok(())
    }

    async fn release_stock(&self, lines: &[StockLine]) -> Result<(), BoxError> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            sqlx::query("UPDATE offers SET quantity = quantity + $2 WHERE id = $1")
                .bind(line.offer_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
