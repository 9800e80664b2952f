pub mod notifier;

pub use notifier::{DealInfo, NotificationEvent, NotificationResult, NotifierPlugin};
