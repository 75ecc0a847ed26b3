pub mod metrics;
pub mod notifier;
pub mod reconciliation;
pub mod repository;
pub mod stripe;

pub use metrics::{get_metrics, init_metrics, record_purchase, record_webhook_event};
pub use notifier::{HttpNotifier, MockNotifier, Notifier};
pub use reconciliation::{Outcome, Reconciler, SubscriptionProvider};
pub use repository::{BillingRepository, BillingStore};
pub use stripe::StripeClient;
