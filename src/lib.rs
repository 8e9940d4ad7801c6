pub mod auth;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod schema;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub use auth::AuthConfig;
pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::books::list_books,
        handlers::books::get_book,
        handlers::books::create_book,
        handlers::books::update_book,
        handlers::books::delete_book,
        handlers::books::archive_book,
        handlers::books::unarchive_book,
        handlers::cart::list_cart,
        handlers::cart::add_to_cart,
        handlers::cart::update_quantity,
        handlers::cart::remove_from_cart,
        handlers::cart::set_selection,
        handlers::cart::select_all,
        handlers::cart::deselect_all,
        handlers::cart::list_selected,
        handlers::cart::selected_total,
        handlers::orders::create_order,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::admin_list_orders,
        handlers::orders::update_order,
        handlers::orders::archive_order,
        handlers::orders::unarchive_order,
        handlers::reviews::list_reviews,
        handlers::reviews::create_review,
        handlers::reviews::delete_review,
        handlers::favorites::list_favorites,
        handlers::favorites::add_favorite,
        handlers::favorites::remove_favorite,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration and sign-in"),
        (name = "books", description = "Catalog"),
        (name = "cart", description = "Cart and checkout selection"),
        (name = "orders", description = "Checkout and order history"),
        (name = "reviews", description = "Book reviews"),
        (name = "favorites", description = "Favorite books"),
        (name = "admin", description = "Admin operations"),
    )
)]
pub struct ApiDoc;

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    pool: DbPool,
    auth_config: AuthConfig,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(auth_config.clone()))
            .wrap(Logger::default())
            .service(
                web::scope("/api")
                    .service(
                        web::scope("/auth")
                            .route("/register", web::post().to(handlers::auth::register))
                            .route("/login", web::post().to(handlers::auth::login)),
                    )
                    .service(
                        web::scope("/books")
                            .route("", web::get().to(handlers::books::list_books))
                            .route("", web::post().to(handlers::books::create_book))
                            .route("/{id}", web::get().to(handlers::books::get_book))
                            .route("/{id}", web::put().to(handlers::books::update_book))
                            .route("/{id}", web::delete().to(handlers::books::delete_book))
                            .route("/{id}/archive", web::put().to(handlers::books::archive_book))
                            .route(
                                "/{id}/unarchive",
                                web::put().to(handlers::books::unarchive_book),
                            )
                            .route(
                                "/{id}/reviews",
                                web::get().to(handlers::reviews::list_reviews),
                            )
                            .route(
                                "/{id}/reviews",
                                web::post().to(handlers::reviews::create_review),
                            ),
                    )
                    .service(
                        web::scope("/cart")
                            // Literal segments before `{book_id}` routes.
                            .route("/select-all", web::post().to(handlers::cart::select_all))
                            .route("/deselect-all", web::post().to(handlers::cart::deselect_all))
                            .route(
                                "/selected/total",
                                web::get().to(handlers::cart::selected_total),
                            )
                            .route("/selected", web::get().to(handlers::cart::list_selected))
                            .route("", web::get().to(handlers::cart::list_cart))
                            .route("", web::post().to(handlers::cart::add_to_cart))
                            .route(
                                "/{book_id}/select",
                                web::put().to(handlers::cart::set_selection),
                            )
                            .route("/{book_id}", web::put().to(handlers::cart::update_quantity))
                            .route(
                                "/{book_id}",
                                web::delete().to(handlers::cart::remove_from_cart),
                            ),
                    )
                    .service(
                        web::scope("/orders")
                            .route("", web::post().to(handlers::orders::create_order))
                            .route("", web::get().to(handlers::orders::list_orders))
                            .route("/{id}", web::get().to(handlers::orders::get_order))
                            .route(
                                "/{id}/status",
                                web::put().to(handlers::orders::update_order),
                            )
                            .route(
                                "/{id}/archive",
                                web::put().to(handlers::orders::archive_order),
                            )
                            .route(
                                "/{id}/unarchive",
                                web::put().to(handlers::orders::unarchive_order),
                            ),
                    )
                    .service(
                        web::scope("/admin").route(
                            "/orders",
                            web::get().to(handlers::orders::admin_list_orders),
                        ),
                    )
                    .service(
                        web::scope("/favorites")
                            .route("", web::get().to(handlers::favorites::list_favorites))
                            .route(
                                "/{book_id}",
                                web::post().to(handlers::favorites::add_favorite),
                            )
                            .route(
                                "/{book_id}",
                                web::delete().to(handlers::favorites::remove_favorite),
                            ),
                    )
                    .service(web::scope("/reviews").route(
                        "/{id}",
                        web::delete().to(handlers::reviews::delete_review),
                    )),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
