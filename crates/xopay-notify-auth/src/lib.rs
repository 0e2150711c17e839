//! # xopay-notify-auth
//!
//! Token handling for service-to-service calls inside the XOPay ecosystem.
//!
//! This crate provides:
//! - Minting of short-lived HS512 system tokens attached to every outbound
//!   HTTP request as `Authorization: Bearer <token>`
//! - Validation of incoming Bearer tokens for the admin surface, including
//!   the access-group check

pub mod error;
pub mod token;

pub use error::AuthError;
pub use token::{AuthSettings, SystemTokenClaims, TokenSigner};
