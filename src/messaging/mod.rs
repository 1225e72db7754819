pub mod channels;
pub mod command;
pub mod notification;

pub use channels::{ClientOutbox, OutboundConsumer, create_outbound_channel, drain, drain_messages};
pub use command::{Action, ClientRequest, Command, CommandError, parse_command};
pub use notification::{ClientMessage, Outbound, PlaybackStatus};
