//! External notification channels and the chat ingest loop.
//!
//! Transports are pluggable behind [`ChatTransport`] and [`WebhookTransport`].
//! The dispatcher owns channel selection and failure containment; the
//! ingest loop owns the poll cursor and command handling.

pub mod connect;
pub mod dispatcher;
pub mod ingest;
pub mod messages;
pub mod settings;
pub mod telegram;
pub mod traits;
pub mod webhook;

pub use connect::ConnectService;
pub use dispatcher::{DeliveryChannel, DeliveryOutcome, DeliveryReport, NotificationDispatcher};
pub use ingest::{ChatIngestLoop, Command, IngestSettings, PollCursor, parse_command};
pub use settings::{NotificationInfo, NotificationSettings};
pub use telegram::TelegramClient;
pub use traits::{ChannelError, ChatMessage, ChatTransport, ChatUpdate, WebhookTransport};
pub use webhook::WebhookClient;
