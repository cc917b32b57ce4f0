pub mod orchestrator;
pub mod webhook_ingestor;

pub use orchestrator::PaymentOrchestrator;
pub use webhook_ingestor::WebhookIngestor;
