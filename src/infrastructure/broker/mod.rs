//! Push-notification broker client: STOMP framing, websocket transport and
//! the channel reconnect loop.

mod channel;
mod codec;
mod connection;
mod constants;
mod error;
mod frame;
mod heartbeat;
mod payloads;
mod state;

pub use channel::{ChannelConfig, ChannelStatusEvent, NotificationChannel};
pub use codec::EventParser;
pub use connection::{BrokerConnection, WebSocketBrokerConnection};
pub use constants::{DEFAULT_BROKER_URL, NOTIFICATION_DESTINATION};
pub use error::{BrokerError, BrokerResult};
pub use frame::{Command, Frame};
pub use state::ChannelState;
