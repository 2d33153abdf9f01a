//! One token granter per grant type.

mod authorization_code;
mod client_credentials;
mod implicit;
mod password;
mod refresh_token;

pub use authorization_code::AuthorizationCodeTokenGranter;
pub use client_credentials::ClientCredentialsTokenGranter;
pub use implicit::ImplicitTokenGranter;
pub use password::{
    ResourceOwnerPasswordTokenGranter, StaticUserAuthenticator, UserAuthenticator,
};
pub use refresh_token::RefreshTokenGranter;
