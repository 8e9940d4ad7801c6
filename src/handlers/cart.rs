use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::cart_line::NewCartLine;
use crate::schema::{books, cart_lines};

// ── DTOs ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartLineRequest {
    pub book_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetSelectionRequest {
    pub selected: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineResponse {
    pub book_id: Uuid,
    pub title: String,
    pub cover_url: Option<String>,
    pub price: String,
    pub quantity: i32,
    pub selected_for_checkout: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SelectedTotalResponse {
    /// Number of selected lines.
    pub count: i64,
    /// Σ(quantity × current price) over the selected lines.
    pub total: String,
}

type CartRow = (Uuid, i32, bool, String, Option<String>, BigDecimal);

fn cart_row_response(row: CartRow) -> CartLineResponse {
    let (book_id, quantity, selected_for_checkout, title, cover_url, price) = row;
    CartLineResponse {
        book_id,
        title,
        cover_url,
        price: price.to_string(),
        quantity,
        selected_for_checkout,
    }
}

fn load_cart(
    conn: &mut PgConnection,
    caller: Uuid,
    selected_only: bool,
) -> Result<Vec<CartLineResponse>, AppError> {
    let mut query = cart_lines::table
        .inner_join(books::table)
        .filter(cart_lines::user_id.eq(caller))
        .select((
            cart_lines::book_id,
            cart_lines::quantity,
            cart_lines::selected_for_checkout,
            books::title,
            books::cover_url,
            books::price,
        ))
        .order(cart_lines::created_at.desc())
        .into_boxed();
    if selected_only {
        query = query.filter(cart_lines::selected_for_checkout.eq(true));
    }
    let rows: Vec<CartRow> = query.load(conn)?;
    Ok(rows.into_iter().map(cart_row_response).collect())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /api/cart
#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "All cart lines", body = [CartLineResponse]),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn list_cart(pool: web::Data<DbPool>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let caller = user.user_id;
    let rows = web::block(move || {
        let mut conn = pool.get()?;
        load_cart(&mut conn, caller, false)
    })
    .await??;
    Ok(HttpResponse::Ok().json(rows))
}

/// POST /api/cart
///
/// Adds a book to the cart. An existing (user, book) line has the quantity
/// added onto it instead of a second row being created.
#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddCartLineRequest,
    responses(
        (status = 201, description = "Line added"),
        (status = 400, description = "Invalid quantity or unknown book"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn add_to_cart(
    pool: web::Data<DbPool>,
    user: AuthUser,
    body: web::Json<AddCartLineRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    if body.quantity < 1 {
        return Err(AppError::Validation("Quantity must be at least 1".to_string()));
    }
    let caller = user.user_id;

    web::block(move || {
        let mut conn = pool.get()?;

        let book_exists: i64 = books::table
            .filter(books::id.eq(body.book_id))
            .filter(books::archived.eq(false))
            .count()
            .get_result(&mut conn)?;
        if book_exists == 0 {
            return Err(AppError::Validation("Unknown book".to_string()));
        }

        diesel::insert_into(cart_lines::table)
            .values(&NewCartLine {
                id: Uuid::new_v4(),
                user_id: caller,
                book_id: body.book_id,
                quantity: body.quantity,
                selected_for_checkout: true,
            })
            .on_conflict((cart_lines::user_id, cart_lines::book_id))
            .do_update()
            .set(cart_lines::quantity.eq(cart_lines::quantity + body.quantity))
            .execute(&mut conn)?;
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Created().json(json!({ "message": "Added to cart" })))
}

/// PUT /api/cart/{book_id}
#[utoipa::path(
    put,
    path = "/api/cart/{book_id}",
    params(("book_id" = Uuid, Path, description = "Book UUID")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity updated"),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Line not in cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn update_quantity(
    pool: web::Data<DbPool>,
    user: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateQuantityRequest>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();
    let quantity = body.into_inner().quantity;
    if quantity < 1 {
        return Err(AppError::Validation("Quantity must be at least 1".to_string()));
    }
    let caller = user.user_id;

    web::block(move || {
        let mut conn = pool.get()?;
        let updated = diesel::update(
            cart_lines::table
                .filter(cart_lines::user_id.eq(caller))
                .filter(cart_lines::book_id.eq(book_id)),
        )
        .set(cart_lines::quantity.eq(quantity))
        .execute(&mut conn)?;
        if updated == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Quantity updated" })))
}

/// DELETE /api/cart/{book_id}
#[utoipa::path(
    delete,
    path = "/api/cart/{book_id}",
    params(("book_id" = Uuid, Path, description = "Book UUID")),
    responses(
        (status = 200, description = "Line removed"),
        (status = 404, description = "Line not in cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn remove_from_cart(
    pool: web::Data<DbPool>,
    user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();
    let caller = user.user_id;

    web::block(move || {
        let mut conn = pool.get()?;
        let deleted = diesel::delete(
            cart_lines::table
                .filter(cart_lines::user_id.eq(caller))
                .filter(cart_lines::book_id.eq(book_id)),
        )
        .execute(&mut conn)?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Removed from cart" })))
}

/// PUT /api/cart/{book_id}/select
///
/// Idempotent flag update on one line. Updating an absent line is a silent
/// no-op, matching the storefront client's optimistic toggling.
#[utoipa::path(
    put,
    path = "/api/cart/{book_id}/select",
    params(("book_id" = Uuid, Path, description = "Book UUID")),
    request_body = SetSelectionRequest,
    responses(
        (status = 200, description = "Selection updated"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn set_selection(
    pool: web::Data<DbPool>,
    user: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<SetSelectionRequest>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();
    let selected = body.into_inner().selected;
    let caller = user.user_id;

    web::block(move || {
        let mut conn = pool.get()?;
        diesel::update(
            cart_lines::table
                .filter(cart_lines::user_id.eq(caller))
                .filter(cart_lines::book_id.eq(book_id)),
        )
        .set(cart_lines::selected_for_checkout.eq(selected))
        .execute(&mut conn)?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Selection updated" })))
}

async fn set_all_selected(
    pool: web::Data<DbPool>,
    caller: Uuid,
    selected: bool,
) -> Result<HttpResponse, AppError> {
    web::block(move || {
        let mut conn = pool.get()?;
        diesel::update(cart_lines::table.filter(cart_lines::user_id.eq(caller)))
            .set(cart_lines::selected_for_checkout.eq(selected))
            .execute(&mut conn)?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Selection updated" })))
}

/// POST /api/cart/select-all
#[utoipa::path(
    post,
    path = "/api/cart/select-all",
    responses((status = 200, description = "All lines selected")),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn select_all(pool: web::Data<DbPool>, user: AuthUser) -> Result<HttpResponse, AppError> {
    set_all_selected(pool, user.user_id, true).await
}

/// POST /api/cart/deselect-all
#[utoipa::path(
    post,
    path = "/api/cart/deselect-all",
    responses((status = 200, description = "All lines deselected")),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn deselect_all(
    pool: web::Data<DbPool>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    set_all_selected(pool, user.user_id, false).await
}

/// GET /api/cart/selected
#[utoipa::path(
    get,
    path = "/api/cart/selected",
    responses(
        (status = 200, description = "Selected cart lines", body = [CartLineResponse]),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn list_selected(
    pool: web::Data<DbPool>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    let caller = user.user_id;
    let rows = web::block(move || {
        let mut conn = pool.get()?;
        load_cart(&mut conn, caller, true)
    })
    .await??;
    Ok(HttpResponse::Ok().json(rows))
}

/// GET /api/cart/selected/total
#[utoipa::path(
    get,
    path = "/api/cart/selected/total",
    responses(
        (status = 200, description = "Aggregate over selected lines", body = SelectedTotalResponse),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "cart"
)]
pub async fn selected_total(
    pool: web::Data<DbPool>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    let caller = user.user_id;

    let result = web::block(move || {
        let mut conn = pool.get()?;
        let rows: Vec<(i32, BigDecimal)> = cart_lines::table
            .inner_join(books::table)
            .filter(cart_lines::user_id.eq(caller))
            .filter(cart_lines::selected_for_checkout.eq(true))
            .select((cart_lines::quantity, books::price))
            .load(&mut conn)?;

        let mut total = BigDecimal::from(0);
        for (quantity, price) in &rows {
            total += price * BigDecimal::from(*quantity);
        }
        Ok::<_, AppError>(SelectedTotalResponse {
            count: rows.len() as i64,
            total: total.to_string(),
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}
