use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::AuthService;
use crate::configuration::JwtSettings;
use crate::middleware::JwtMiddleware;
use crate::routes::{current_session, health_check, login, logout, refresh};

pub fn run(
    listener: TcpListener,
    service: AuthService,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(service.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/logout", web::post().to(logout))
            // Protected routes (require a valid access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/session", web::get().to(current_session)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
