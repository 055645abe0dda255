//! Adapters from the core ports to Google services and SMTP.

pub mod auth;
pub mod drive;
pub mod mail;
pub mod photos;

pub use auth::{
    AuthError, RefreshTokenSource, ServiceAccountKey, ServiceAccountTokens,
    StaticToken, TokenSource,
};
pub use drive::DriveStore;
pub use mail::SmtpNotifier;
pub use photos::PhotosLibrary;
