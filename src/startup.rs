use actix_web::dev::Server;
use actix_web::{guard, middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{LoginRateLimiter, SessionIssuer};
use crate::middleware::{JwtMiddleware, LoggerMiddleware, RoleGuard};
use crate::routes::{
    create_user, delete_user, get_current_user, get_user, health_check, login, logout, refresh,
    register, update_user,
};
use crate::users::{UserStore, ROLE_ADMIN};

pub fn run(
    listener: TcpListener,
    store: Arc<dyn UserStore>,
    issuer: Arc<SessionIssuer>,
    login_limiter: Arc<LoginRateLimiter>,
) -> Result<Server, std::io::Error> {
    let store_data: web::Data<dyn UserStore> = web::Data::from(store.clone());
    let issuer_data: web::Data<SessionIssuer> = web::Data::from(issuer.clone());
    let limiter_data: web::Data<LoginRateLimiter> = web::Data::from(login_limiter);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(store_data.clone())
            .app_data(issuer_data.clone())
            .app_data(limiter_data.clone())

            .route("/health_check", web::get().to(health_check))

            .service(
                web::scope("/auth")
                    // Public
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    // Authenticated
                    .service(
                        web::resource("/logout")
                            .wrap(JwtMiddleware::new(issuer.clone()))
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(issuer.clone()))
                            .route(web::get().to(get_current_user)),
                    ),
            )

            .service(
                web::scope("/users")
                    .wrap(JwtMiddleware::new(issuer.clone()))
                    // Admin only; the role guard runs after authentication
                    .service(
                        web::scope("")
                            .guard(guard::Any(guard::Post()).or(guard::Put()).or(guard::Delete()))
                            .wrap(RoleGuard::new(store.clone(), &[ROLE_ADMIN]))
                            .route("", web::post().to(create_user))
                            .route("/{id}", web::put().to(update_user))
                            .route("/{id}", web::delete().to(delete_user)),
                    )
                    .route("/{id}", web::get().to(get_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
