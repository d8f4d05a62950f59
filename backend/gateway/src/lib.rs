//! ChartForge gateway: WebSocket sessions and HTTP side endpoints.

pub mod health_api;
pub mod server;
pub mod session;
pub mod session_registry;
pub mod ws_protocol;
pub mod ws_server;

pub use server::{build_router, start_server, GatewayState};
pub use session::{Session, SessionConfig, SessionManager, SessionState};
pub use session_registry::{RegistryError, SessionRegistry};
pub use ws_protocol::{Capabilities, InboundFrame, OutboundBody, OutboundFrame};
