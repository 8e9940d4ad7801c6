use actix_web::{web, HttpResponse};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::review::NewReview;
use crate::schema::{books, reviews, users};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    /// Star rating, 1 to 5.
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub reviewer: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: String,
}

/// GET /api/books/{id}/reviews
///
/// Public; newest first with the reviewer's display name joined in.
#[utoipa::path(
    get,
    path = "/api/books/{id}/reviews",
    params(("id" = Uuid, Path, description = "Book UUID")),
    responses((status = 200, description = "Reviews for the book", body = [ReviewResponse])),
    tag = "reviews"
)]
pub async fn list_reviews(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();

    let result = web::block(move || {
        let mut conn = pool.get()?;
        let rows: Vec<(Uuid, Uuid, String, i32, Option<String>, chrono::DateTime<chrono::Utc>)> =
            reviews::table
                .inner_join(users::table)
                .filter(reviews::book_id.eq(book_id))
                .order(reviews::created_at.desc())
                .select((
                    reviews::id,
                    reviews::book_id,
                    users::name,
                    reviews::rating,
                    reviews::comment,
                    reviews::created_at,
                ))
                .load(&mut conn)?;

        Ok::<_, AppError>(
            rows.into_iter()
                .map(|(id, book_id, reviewer, rating, comment, created_at)| ReviewResponse {
                    id,
                    book_id,
                    reviewer,
                    rating,
                    comment,
                    created_at: created_at.to_rfc3339(),
                })
                .collect::<Vec<_>>(),
        )
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/books/{id}/reviews
///
/// One review per (user, book); a second attempt conflicts.
#[utoipa::path(
    post,
    path = "/api/books/{id}/reviews",
    params(("id" = Uuid, Path, description = "Book UUID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created"),
        (status = 400, description = "Rating out of range or unknown book"),
        (status = 409, description = "Caller already reviewed this book"),
    ),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub async fn create_review(
    pool: web::Data<DbPool>,
    user: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();
    let body = body.into_inner();
    if !(1..=5).contains(&body.rating) {
        return Err(AppError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
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

        diesel::insert_into(reviews::table)
            .values(&NewReview {
                id: Uuid::new_v4(),
                user_id: caller,
                book_id,
                rating: body.rating,
                comment: body.comment,
            })
            .execute(&mut conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => AppError::Conflict("You have already reviewed this book".to_string()),
                other => other.into(),
            })?;
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Created().json(json!({ "message": "Review created" })))
}

/// DELETE /api/reviews/{id}
///
/// Owner or admin only.
#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review UUID")),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 403, description = "Review owned by another user"),
        (status = 404, description = "Review not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub async fn delete_review(
    pool: web::Data<DbPool>,
    user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let review_id = path.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;

        let owner: Option<Uuid> = reviews::table
            .filter(reviews::id.eq(review_id))
            .select(reviews::user_id)
            .first(&mut conn)
            .optional()?;

        let Some(owner) = owner else {
            return Err(AppError::NotFound);
        };
        if owner != user.user_id && !user.is_admin {
            return Err(AppError::Forbidden);
        }

        diesel::delete(reviews::table.filter(reviews::id.eq(review_id))).execute(&mut conn)?;
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Review deleted" })))
}
