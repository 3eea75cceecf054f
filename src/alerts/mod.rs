pub mod message;
pub mod queue;
pub mod registry;
pub mod router;

pub use message::ServerMessage;
pub use queue::{OutboundQueue, PushOutcome};
pub use registry::{
    BroadcastReport, Connection, ConnectionInfo, ConnectionState, RegistryConfig, SubscriptionRegistry,
    SweepReport, WatchSet,
};
pub use router::{AlertRouter, RouteDecision};
