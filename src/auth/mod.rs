//! Authentication module
//!
//! Supports: Pulumi access token, Bearer token, no auth
//!
//! Pulumi Cloud expects `Authorization: token <access token>`. The Bearer
//! variant covers self-hosted installations fronted by a standard gateway.

mod authenticator;

pub use authenticator::{AuthConfig, Authenticator};
