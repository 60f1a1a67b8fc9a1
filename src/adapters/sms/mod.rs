//! SMS adapters for payment receipts.

mod logging;
mod recording;
mod twilio;

pub use logging::LoggingMessageSender;
pub use recording::{RecordingMessageSender, SentMessage};
pub use twilio::{to_e164, TwilioConfig, TwilioMessageSender};
