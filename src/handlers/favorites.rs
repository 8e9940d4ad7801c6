use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::favorite::NewFavorite;
use crate::schema::{books, favorites};

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteResponse {
    pub book_id: Uuid,
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    pub price: String,
}

/// GET /api/favorites
#[utoipa::path(
    get,
    path = "/api/favorites",
    responses(
        (status = 200, description = "Caller's favorite books", body = [FavoriteResponse]),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "favorites"
)]
pub async fn list_favorites(
    pool: web::Data<DbPool>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    let caller = user.user_id;

    let result = web::block(move || {
        let mut conn = pool.get()?;
        let rows: Vec<(Uuid, String, String, Option<String>, BigDecimal)> = favorites::table
            .inner_join(books::table)
            .filter(favorites::user_id.eq(caller))
            .order(favorites::created_at.desc())
            .select((
                favorites::book_id,
                books::title,
                books::author,
                books::cover_url,
                books::price,
            ))
            .load(&mut conn)?;

        Ok::<_, AppError>(
            rows.into_iter()
                .map(|(book_id, title, author, cover_url, price)| FavoriteResponse {
                    book_id,
                    title,
                    author,
                    cover_url,
                    price: price.to_string(),
                })
                .collect::<Vec<_>>(),
        )
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/favorites/{book_id}
///
/// Idempotent: favoriting an already-favorited book is a no-op.
#[utoipa::path(
    post,
    path = "/api/favorites/{book_id}",
    params(("book_id" = Uuid, Path, description = "Book UUID")),
    responses(
        (status = 201, description = "Favorite recorded"),
        (status = 400, description = "Unknown book"),
    ),
    security(("bearer_auth" = [])),
    tag = "favorites"
)]
pub async fn add_favorite(
    pool: web::Data<DbPool>,
    user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();
    let caller = user.user_id;

    web::block(move || {
        let mut conn = pool.get()?;

        let book_exists: i64 = books::table
            .filter(books::id.eq(book_id))
            .count()
            .get_result(&mut conn)?;
        if book_exists == 0 {
            return Err(AppError::Validation("Unknown book".to_string()));
        }

        diesel::insert_into(favorites::table)
            .values(&NewFavorite {
                id: Uuid::new_v4(),
                user_id: caller,
                book_id,
            })
            .on_conflict_do_nothing()
            .execute(&mut conn)?;
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Created().json(json!({ "message": "Added to favorites" })))
}

/// DELETE /api/favorites/{book_id}
#[utoipa::path(
    delete,
    path = "/api/favorites/{book_id}",
    params(("book_id" = Uuid, Path, description = "Book UUID")),
    responses(
        (status = 200, description = "Favorite removed"),
        (status = 404, description = "Book was not favorited"),
    ),
    security(("bearer_auth" = [])),
    tag = "favorites"
)]
pub async fn remove_favorite(
    pool: web::Data<DbPool>,
    user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();
    let caller = user.user_id;

    web::block(move || {
        let mut conn = pool.get()?;
        let deleted = diesel::delete(
            favorites::table
                .filter(favorites::user_id.eq(caller))
                .filter(favorites::book_id.eq(book_id)),
        )
        .execute(&mut conn)?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Removed from favorites" })))
}
