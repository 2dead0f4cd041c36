/// Middleware module
///
/// Authentication, role gating and request logging.

mod jwt_middleware;
mod logger;
mod role_middleware;

pub use jwt_middleware::JwtMiddleware;
pub use logger::LoggerMiddleware;
pub use role_middleware::RoleGuard;
