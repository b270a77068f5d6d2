//! Service layer: resolution, click recording, attribution, webhooks and
//! the lifecycle operations behind the CRUD collaborator.

pub mod attribution;
pub mod clicks;
pub mod device;
pub mod fingerprint;
pub mod geoip;
pub mod html;
pub mod links;
pub mod resolver;
pub mod webhooks;

pub use attribution::{AttributionEngine, AttributionResult, InstallReport};
pub use clicks::ClickRecorder;
pub use geoip::GeoIpProvider;
pub use links::{LinkService, NewLink};
pub use resolver::{RequestContext, ResolveDecision, ResolveOutcome, Resolver};
pub use webhooks::{NewWebhook, WebhookDispatcher, WebhookService};
