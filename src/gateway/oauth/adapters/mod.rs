//! Usage: Per-provider gateways built on the shared loopback flow.

pub(crate) mod apple;
pub(crate) mod google;
pub(crate) mod line;

pub use apple::AppleGateway;
pub use google::GoogleGateway;
pub use line::LineGateway;
