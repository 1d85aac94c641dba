use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use retex_catalog::ParameterValue;
use retex_core::BoxError;
use retex_order::models::{Basket, BasketItem, Order, OrderItem, OrderStatus};
use retex_order::repository::{BasketRepository, OrderRepository};
use retex_shared::Address;

pub struct PgOrders {
    pool: PgPool,
}

impl PgOrders {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, BoxError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, product_id, product_name, product_model, unit_price, quantity, parameters \
             FROM order_items WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderItemRow::into_item).collect()
    }

    async fn hydrate(&self, row: OrderRow) -> Result<Order, BoxError> {
        let items = self.load_items(row.id).await?;
        row.into_order(items)
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    buyer_id: Uuid,
    shop_id: Uuid,
    address: Value,
    status: String,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, BoxError> {
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| format!("order {} has unknown status '{}'", self.id, self.status))?;
        let address: Address = serde_json::from_value(self.address)?;
        Ok(Order {
            id: self.id,
            buyer_id: self.buyer_id,
            shop_id: self.shop_id,
            address,
            status,
            created_at: self.created_at,
            items,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    product_id: Uuid,
    product_name: String,
    product_model: String,
    unit_price: i64,
    quantity: i64,
    parameters: Value,
}

impl OrderItemRow {
    fn into_item(self) -> Result<OrderItem, BoxError> {
        let parameters: Vec<ParameterValue> = serde_json::from_value(self.parameters)?;
        Ok(OrderItem {
            id: self.id,
            product_id: self.product_id,
            product_name: self.product_name,
            product_model: self.product_model,
            unit_price: self.unit_price,
            quantity: self.quantity,
            parameters,
        })
    }
}

#[async_trait]
impl BasketRepository for PgOrders {
    async fn open_basket(&self, buyer_id: Uuid) -> Result<Basket, BoxError> {
        let row: Option<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, created_at FROM baskets WHERE buyer_id = $1 AND NOT consumed",
        )
        .bind(buyer_id)
        .fetch_optional(&self.pool)
        .await?;

        let (id, created_at) = match row {
            Some(row) => row,
            None => {
                let basket = Basket::new(buyer_id);
                sqlx::query(
                    "INSERT INTO baskets (id, buyer_id, consumed, created_at) \
                     VALUES ($1, $2, FALSE, $3)",
                )
                .bind(basket.id)
                .bind(buyer_id)
                .bind(basket.created_at)
                .execute(&self.pool)
                .await?;
                return Ok(basket);
            }
        };

        let items: Vec<(Uuid, Uuid, i64)> = sqlx::query_as(
            "SELECT offer_id, shop_id, quantity FROM basket_items \
             WHERE basket_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Basket {
            id,
            buyer_id,
            consumed: false,
            created_at,
            items: items
                .into_iter()
                .map(|(offer_id, shop_id, quantity)| BasketItem { offer_id, shop_id, quantity })
                .collect(),
        })
    }

    async fn save_basket(&self, basket: &Basket) -> Result<(), BoxError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO baskets (id, buyer_id, consumed, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET consumed = EXCLUDED.consumed",
        )
        .bind(basket.id)
        .bind(basket.buyer_id)
        .bind(basket.consumed)
        .bind(basket.created_at)
        .execute(&mut *tx)
        .await?;

        // Rewrite the whole line set; position keeps insertion order.
        sqlx::query("DELETE FROM basket_items WHERE basket_id = $1")
            .bind(basket.id)
            .execute(&mut *tx)
            .await?;
        for (position, item) in basket.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO basket_items (basket_id, offer_id, shop_id, quantity, position) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(basket.id)
            .bind(item.offer_id)
            .bind(item.shop_id)
            .bind(item.quantity)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn consume_basket(&self, basket_id: Uuid) -> Result<bool, BoxError> {
        // Compare-and-set on the consumed flag; only one claimer sees a row.
        let result =
            sqlx::query("UPDATE baskets SET consumed = TRUE WHERE id = $1 AND NOT consumed")
                .bind(basket_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl OrderRepository for PgOrders {
    async fn create_orders(&self, orders: &[Order]) -> Result<(), BoxError> {
        let mut tx = self.pool.begin().await?;

        for order in orders {
            sqlx::query(
                "INSERT INTO orders (id, buyer_id, shop_id, address, status, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order.id)
            .bind(order.buyer_id)
            .bind(order.shop_id)
            .bind(serde_json::to_value(&order.address)?)
            .bind(order.status.as_str())
            .bind(order.created_at)
            .execute(&mut *tx)
            .await?;

            for (position, item) in order.items.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO order_items (id, order_id, product_id, product_name, \
                     product_model, unit_price, quantity, parameters, position) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                )
                .bind(item.id)
                .bind(order.id)
                .bind(item.product_id)
                .bind(&item.product_name)
                .bind(&item.product_model)
                .bind(item.unit_price)
                .bind(item.quantity)
                .bind(serde_json::to_value(&item.parameters)?)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, BoxError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, buyer_id, shop_id, address, status, created_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, buyer_id: Uuid) -> Result<Vec<Order>, BoxError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, buyer_id, shop_id, address, status, created_at \
             FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC",
        )
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn list_shop_orders(&self, shop_id: Uuid) -> Result<Vec<Order>, BoxError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, buyer_id, shop_id, address, status, created_at \
             FROM orders WHERE shop_id = $1 ORDER BY created_at DESC",
        )
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, BoxError> {
        let result = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(format!("order {} not found", id).into());
        }
        Ok(false)
    }
}
