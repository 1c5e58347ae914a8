//! Usage: Outbound integrations (provider consent pages, token endpoints, auth backend).

pub(crate) mod http_client;
pub(crate) mod identity_toolkit;
pub(crate) mod oauth;
pub(crate) mod presentation;
