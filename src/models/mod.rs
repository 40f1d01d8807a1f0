mod password_reset_token;
mod refresh_token;
mod user;

pub use password_reset_token::PasswordResetToken;
pub use refresh_token::RefreshToken;
pub use user::{NewUser, User, UserProfile, ROLE_ADMIN, ROLE_CUSTOMER};
