use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::cart_line::CartLine;
use crate::models::order::{NewOrder, Order};
use crate::models::order_item::{NewOrderItem, OrderItem};
use crate::schema::{books, cart_lines, order_items, orders};

use super::Pagination;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutTotals {
    /// Client-computed grand total. Accepted as a JSON number or a decimal
    /// string; anything non-numeric falls back to the server-side subtotal.
    pub total: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub shipping_address: Option<serde_json::Value>,
    pub payment_method: Option<String>,
    pub courier: Option<String>,
    pub discounts: Option<serde_json::Value>,
    pub totals: Option<CheckoutTotals>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub message: String,
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub quantity: i32,
    pub price: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: String,
    pub status: String,
    pub shipping_address: String,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: String,
    pub shipping_address: Option<String>,
}

fn order_response(order: Order, items: Vec<OrderItem>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        user_id: order.user_id,
        total_amount: order.total_amount.to_string(),
        status: order.status,
        shipping_address: order.shipping_address,
        created_at: order.created_at.to_rfc3339(),
        items: items
            .into_iter()
            .map(|i| OrderItemResponse {
                id: i.id,
                book_id: i.book_id,
                quantity: i.quantity,
                price: i.price.to_string(),
            })
            .collect(),
    }
}

/// Pick the order total: the client-supplied value wins when it is numeric,
/// otherwise the server-computed subtotal applies.
///
/// Trusting the client here is inherited behavior and a known
/// pricing-integrity concern; the computed subtotal is kept in the order's
/// metadata blob so discrepancies stay auditable.
fn resolve_total(client_total: Option<&serde_json::Value>, subtotal: &BigDecimal) -> BigDecimal {
    let parsed = client_total.and_then(|v| match v {
        serde_json::Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => BigDecimal::from_str(s).ok(),
        _ => None,
    });
    parsed.unwrap_or_else(|| subtotal.clone())
}

// ── Checkout ─────────────────────────────────────────────────────────────────

/// POST /api/orders
///
/// Converts the caller's selected cart lines into an order with its items,
/// decrements book stock and clears the checked-out lines. All writes happen
/// inside one transaction; the selected lines are locked with
/// `SELECT ... FOR UPDATE` so a concurrent checkout of the same cart observes
/// either the full selection or an empty one, never a duplicate.
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = CreateOrderResponse),
        (status = 400, description = "No items selected for checkout"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Internal server error"),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn create_order(
    pool: web::Data<DbPool>,
    user: AuthUser,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let caller = user.user_id;

    let order_id = web::block(move || {
        let mut conn = pool.get()?;

        conn.transaction::<_, AppError, _>(|conn| {
            // 1. Lock the selected lines for the duration of the checkout.
            let lines: Vec<CartLine> = cart_lines::table
                .filter(cart_lines::user_id.eq(caller))
                .filter(cart_lines::selected_for_checkout.eq(true))
                .select(CartLine::as_select())
                .order(cart_lines::created_at.desc())
                .for_update()
                .load(conn)?;

            if lines.is_empty() {
                return Err(AppError::Validation(
                    "No items selected for checkout".to_string(),
                ));
            }

            // 2. Snapshot current unit prices for the referenced books.
            let book_ids: Vec<Uuid> = lines.iter().map(|l| l.book_id).collect();
            let prices: HashMap<Uuid, BigDecimal> = books::table
                .filter(books::id.eq_any(&book_ids))
                .select((books::id, books::price))
                .load::<(Uuid, BigDecimal)>(conn)?
                .into_iter()
                .collect();

            let mut items_subtotal = BigDecimal::from(0);
            for line in &lines {
                let price = prices.get(&line.book_id).ok_or_else(|| {
                    AppError::Internal(format!("Book {} missing for cart line", line.book_id))
                })?;
                items_subtotal += price * BigDecimal::from(line.quantity);
            }

            let client_total = body.totals.as_ref().and_then(|t| t.total.as_ref());
            let total_amount = resolve_total(client_total, &items_subtotal);

            // 3. Order header; the shipping_address column carries the full
            //    checkout metadata blob.
            let order_id = Uuid::new_v4();
            let metadata = json!({
                "shipping_address": body.shipping_address,
                "payment_method": body.payment_method,
                "courier": body.courier,
                "discounts": body.discounts,
                "items_subtotal": items_subtotal.to_string(),
            });
            diesel::insert_into(orders::table)
                .values(&NewOrder {
                    id: order_id,
                    user_id: caller,
                    total_amount,
                    status: "pending".to_string(),
                    shipping_address: metadata.to_string(),
                })
                .execute(conn)?;

            // 4. One item per line, (book_id, quantity, price) as read.
            let new_items: Vec<NewOrderItem> = lines
                .iter()
                .map(|l| NewOrderItem {
                    id: Uuid::new_v4(),
                    order_id,
                    book_id: l.book_id,
                    quantity: l.quantity,
                    price: prices[&l.book_id].clone(),
                })
                .collect();
            diesel::insert_into(order_items::table)
                .values(&new_items)
                .execute(conn)?;

            // 5. Stock decrement. No floor at zero; stock can go negative.
            for line in &lines {
                diesel::update(books::table.filter(books::id.eq(line.book_id)))
                    .set(books::stock_quantity.eq(books::stock_quantity - line.quantity))
                    .execute(conn)?;
            }

            // 6. Clear the checked-out lines.
            let line_ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();
            diesel::delete(cart_lines::table.filter(cart_lines::id.eq_any(&line_ids)))
                .execute(conn)?;

            Ok(order_id)
        })
    })
    .await??;

    Ok(HttpResponse::Created().json(CreateOrderResponse {
        message: "Order created".to_string(),
        order_id,
    }))
}

// ── Reads ────────────────────────────────────────────────────────────────────

/// GET /api/orders
///
/// The caller's orders, newest first, items included. Archived orders are
/// hidden.
#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "Caller's orders", body = [OrderResponse]),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    pool: web::Data<DbPool>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    let caller = user.user_id;

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let rows: Vec<Order> = orders::table
            .filter(orders::user_id.eq(caller))
            .filter(orders::archived.eq(false))
            .order(orders::created_at.desc())
            .select(Order::as_select())
            .load(&mut conn)?;

        let items: Vec<Vec<OrderItem>> = OrderItem::belonging_to(&rows)
            .select(OrderItem::as_select())
            .load(&mut conn)?
            .grouped_by(&rows);

        Ok::<_, AppError>(
            rows.into_iter()
                .zip(items)
                .map(|(o, i)| order_response(o, i))
                .collect::<Vec<_>>(),
        )
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/orders/{id}
///
/// Detail is owner-scoped: another user's order yields 403 unless the caller
/// is an admin.
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 403, description = "Order owned by another user"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn get_order(
    pool: web::Data<DbPool>,
    user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let order = orders::table
            .filter(orders::id.eq(order_id))
            .select(Order::as_select())
            .first(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Err(AppError::NotFound);
        };
        if order.user_id != user.user_id && !user.is_admin {
            return Err(AppError::Forbidden);
        }

        let items = order_items::table
            .filter(order_items::order_id.eq(order.id))
            .select(OrderItem::as_select())
            .load(&mut conn)?;

        Ok(order_response(order, items))
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

// ── Admin operations ─────────────────────────────────────────────────────────

/// GET /api/admin/orders
///
/// Paginated list across all users; archived orders are hidden.
#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 403, description = "Caller is not an admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn admin_list_orders(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, AppError> {
    let (page, limit, offset) = query.into_inner().clamp();

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let total: i64 = orders::table
            .filter(orders::archived.eq(false))
            .count()
            .get_result(&mut conn)?;

        let rows: Vec<Order> = orders::table
            .filter(orders::archived.eq(false))
            .order(orders::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(Order::as_select())
            .load(&mut conn)?;

        let items: Vec<Vec<OrderItem>> = OrderItem::belonging_to(&rows)
            .select(OrderItem::as_select())
            .load(&mut conn)?
            .grouped_by(&rows);

        Ok::<_, AppError>(ListOrdersResponse {
            items: rows
                .into_iter()
                .zip(items)
                .map(|(o, i)| order_response(o, i))
                .collect(),
            total,
            page,
            limit,
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// PUT /api/orders/{id}/status
#[utoipa::path(
    put,
    path = "/api/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_order(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let body = body.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;

        let updated = match body.shipping_address {
            Some(address) => diesel::update(orders::table.filter(orders::id.eq(order_id)))
                .set((
                    orders::status.eq(body.status),
                    orders::shipping_address.eq(address),
                    orders::updated_at.eq(diesel::dsl::now),
                ))
                .execute(&mut conn)?,
            None => diesel::update(orders::table.filter(orders::id.eq(order_id)))
                .set((
                    orders::status.eq(body.status),
                    orders::updated_at.eq(diesel::dsl::now),
                ))
                .execute(&mut conn)?,
        };

        if updated == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Order updated" })))
}

/// Archive toggling is an independent single-statement soft delete; it never
/// joins any other transaction.
async fn set_order_archived(
    pool: web::Data<DbPool>,
    order_id: Uuid,
    archived: bool,
) -> Result<HttpResponse, AppError> {
    web::block(move || {
        let mut conn = pool.get()?;
        let updated = diesel::update(orders::table.filter(orders::id.eq(order_id)))
            .set(orders::archived.eq(archived))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Order updated" })))
}

/// PUT /api/orders/{id}/archive
#[utoipa::path(
    put,
    path = "/api/orders/{id}/archive",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order archived"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn archive_order(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    set_order_archived(pool, path.into_inner(), true).await
}

/// PUT /api/orders/{id}/unarchive
#[utoipa::path(
    put,
    path = "/api/orders/{id}/unarchive",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order unarchived"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn unarchive_order(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    set_order_archived(pool, path.into_inner(), false).await
}

#[cfg(test)]
mod tests {
    use super::resolve_total;
    use bigdecimal::BigDecimal;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    #[test]
    fn numeric_client_total_wins() {
        let total = resolve_total(Some(&json!(199.5)), &dec("250"));
        assert_eq!(total, dec("199.5"));
    }

    #[test]
    fn decimal_string_client_total_wins() {
        let total = resolve_total(Some(&json!("42.00")), &dec("250"));
        assert_eq!(total, dec("42.00"));
    }

    #[test]
    fn missing_client_total_falls_back_to_subtotal() {
        let total = resolve_total(None, &dec("250"));
        assert_eq!(total, dec("250"));
    }

    #[test]
    fn non_numeric_client_total_falls_back_to_subtotal() {
        let total = resolve_total(Some(&json!("free")), &dec("250"));
        assert_eq!(total, dec("250"));

        let total = resolve_total(Some(&json!({"amount": 10})), &dec("250"));
        assert_eq!(total, dec("250"));
    }
}
