use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::book::{Book, NewBook};
use crate::schema::books;

use super::Pagination;

// ── DTOs ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct BookInput {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    /// Decimal price as a string, e.g. "19.99".
    pub price: String,
    pub stock_quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub price: String,
    pub stock_quantity: i32,
    pub archived: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListBooksResponse {
    pub items: Vec<BookResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl From<Book> for BookResponse {
    fn from(b: Book) -> Self {
        BookResponse {
            id: b.id,
            title: b.title,
            author: b.author,
            description: b.description,
            cover_url: b.cover_url,
            price: b.price.to_string(),
            stock_quantity: b.stock_quantity,
            archived: b.archived,
        }
    }
}

fn parse_price(raw: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(raw)
        .map_err(|e| AppError::Validation(format!("Invalid price '{raw}': {e}")))
}

// ── Public reads ─────────────────────────────────────────────────────────────

/// GET /api/books
///
/// Paginated catalog listing, newest first. Archived books are hidden.
#[utoipa::path(
    get,
    path = "/api/books",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses((status = 200, description = "Paginated list of books", body = ListBooksResponse)),
    tag = "books"
)]
pub async fn list_books(
    pool: web::Data<DbPool>,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, AppError> {
    let (page, limit, offset) = query.into_inner().clamp();

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let total: i64 = books::table
            .filter(books::archived.eq(false))
            .count()
            .get_result(&mut conn)?;

        let rows: Vec<Book> = books::table
            .filter(books::archived.eq(false))
            .order(books::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(Book::as_select())
            .load(&mut conn)?;

        Ok::<_, AppError>(ListBooksResponse {
            items: rows.into_iter().map(BookResponse::from).collect(),
            total,
            page,
            limit,
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/books/{id}
#[utoipa::path(
    get,
    path = "/api/books/{id}",
    params(("id" = Uuid, Path, description = "Book UUID")),
    responses(
        (status = 200, description = "Book found", body = BookResponse),
        (status = 404, description = "Book not found or archived"),
    ),
    tag = "books"
)]
pub async fn get_book(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();

    let book = web::block(move || {
        let mut conn = pool.get()?;
        let book = books::table
            .filter(books::id.eq(book_id))
            .filter(books::archived.eq(false))
            .select(Book::as_select())
            .first(&mut conn)
            .optional()?;
        book.ok_or(AppError::NotFound)
    })
    .await??;

    Ok(HttpResponse::Ok().json(BookResponse::from(book)))
}

// ── Admin writes ─────────────────────────────────────────────────────────────

/// POST /api/books
#[utoipa::path(
    post,
    path = "/api/books",
    request_body = BookInput,
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Invalid price"),
        (status = 403, description = "Caller is not an admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "books"
)]
pub async fn create_book(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    body: web::Json<BookInput>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let price = parse_price(&body.price)?;

    let book = web::block(move || {
        let mut conn = pool.get()?;
        let new_book = NewBook {
            id: Uuid::new_v4(),
            title: body.title,
            author: body.author,
            description: body.description,
            cover_url: body.cover_url,
            price,
            stock_quantity: body.stock_quantity,
        };
        let book: Book = diesel::insert_into(books::table)
            .values(&new_book)
            .returning(Book::as_returning())
            .get_result(&mut conn)?;
        Ok::<_, AppError>(book)
    })
    .await??;

    Ok(HttpResponse::Created().json(BookResponse::from(book)))
}

/// PUT /api/books/{id}
#[utoipa::path(
    put,
    path = "/api/books/{id}",
    params(("id" = Uuid, Path, description = "Book UUID")),
    request_body = BookInput,
    responses(
        (status = 200, description = "Book updated", body = BookResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Book not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "books"
)]
pub async fn update_book(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<BookInput>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();
    let body = body.into_inner();
    let price = parse_price(&body.price)?;

    let book = web::block(move || {
        let mut conn = pool.get()?;
        let book: Book = diesel::update(books::table.filter(books::id.eq(book_id)))
            .set((
                books::title.eq(body.title),
                books::author.eq(body.author),
                books::description.eq(body.description),
                books::cover_url.eq(body.cover_url),
                books::price.eq(price),
                books::stock_quantity.eq(body.stock_quantity),
                books::updated_at.eq(diesel::dsl::now),
            ))
            .returning(Book::as_returning())
            .get_result(&mut conn)
            .optional()?
            .ok_or(AppError::NotFound)?;
        Ok::<_, AppError>(book)
    })
    .await??;

    Ok(HttpResponse::Ok().json(BookResponse::from(book)))
}

/// DELETE /api/books/{id}
///
/// Physical deletion; archiving is the soft alternative below.
#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    params(("id" = Uuid, Path, description = "Book UUID")),
    responses(
        (status = 200, description = "Book deleted"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Book not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "books"
)]
pub async fn delete_book(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;
        let deleted =
            diesel::delete(books::table.filter(books::id.eq(book_id))).execute(&mut conn)?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Book deleted" })))
}

/// Soft-delete toggle, always a single independent statement.
async fn set_book_archived(
    pool: web::Data<DbPool>,
    book_id: Uuid,
    archived: bool,
) -> Result<HttpResponse, AppError> {
    web::block(move || {
        let mut conn = pool.get()?;
        let updated = diesel::update(books::table.filter(books::id.eq(book_id)))
            .set(books::archived.eq(archived))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Book updated" })))
}

/// PUT /api/books/{id}/archive
#[utoipa::path(
    put,
    path = "/api/books/{id}/archive",
    params(("id" = Uuid, Path, description = "Book UUID")),
    responses(
        (status = 200, description = "Book archived"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Book not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "books"
)]
pub async fn archive_book(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    set_book_archived(pool, path.into_inner(), true).await
}

/// PUT /api/books/{id}/unarchive
#[utoipa::path(
    put,
    path = "/api/books/{id}/unarchive",
    params(("id" = Uuid, Path, description = "Book UUID")),
    responses(
        (status = 200, description = "Book unarchived"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Book not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "books"
)]
pub async fn unarchive_book(
    pool: web::Data<DbPool>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    set_book_archived(pool, path.into_inner(), false).await
}
