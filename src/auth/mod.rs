/// Authentication module
///
/// Password hashing, token signing/verification, session issuance with
/// refresh rotation, and the per-request authorization gate.

mod claims;
mod clock;
mod gate;
mod jwt;
mod password;
mod rate_limit;
mod refresh_token;
mod session;

pub use claims::{Claims, TokenType};
pub use clock::{Clock, FixedClock, SystemClock};
pub use gate::{authenticate, authorize_role, extract_bearer, AuthenticatedUser};
pub use jwt::TokenCodec;
pub use password::{hash_password, verify_password, verify_user_password, BCRYPT_COST};
pub use rate_limit::LoginRateLimiter;
pub use refresh_token::{RefreshTokenTracker, StatelessTracker, StoreTracker};
pub use session::{SessionIssuer, TokenPair};
