//! Push side of the backend: every participant of a changed match,
//! conversation or message gets a [`GatewayEvent`](kind_types::events::GatewayEvent)
//! over their WebSocket connections.

pub mod connection;
pub mod dispatcher;
