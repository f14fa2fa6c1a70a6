pub mod token;
pub mod user;

pub use token::RefreshToken;
pub use user::{NewUser, User};
