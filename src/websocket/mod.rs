//! WebSocket Transport
//!
//! Bridges browser and mobile clients to the [`Hub`](crate::hub::Hub).
//!
//! ## Architecture
//!
//! - **Handler**: upgrades `GET /ws?user_id=N`, registers the connection and
//!   runs the writer and reader tasks
//! - **Messages**: client frames and the server events they produce
//!
//! Anything delivered through the hub reaches the socket verbatim: UTF-8
//! payloads as text frames, everything else as binary.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8080/ws?user_id=42');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'typing', conversation_id: 7, recipients: [43]}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log('Received:', msg);
//! };
//! ```

mod handler;
mod messages;

pub use handler::{websocket_handler, ConnectParams};
pub use messages::{ClientMessage, ReceiptStatus, Relay, ServerEvent};
