//! Beacon server-side membership.
//!
//! Keeps live back-office connections in the broadcast groups they are
//! authorized for, and only those.
//!
//! # Architecture
//!
//! - [`ConnectionRegistry`]: user → live connections
//! - [`MembershipCoordinator`]: applies authorization results as gateway
//!   joins and leaves
//! - [`Hub`]: connect, disconnect and permission-change entry points
//! - [`PermissionChangeWorker`]: drains permission changes from a queue
//! - [`EventRouter`]: publishes events to channel groups and to single users
//! - [`BroadcastGroupGateway`]: the transport's group primitive, supplied by
//!   the host ([`MemoryGateway`] for tests)
//!
//! Authorization itself lives in `beacon-core`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod event;
mod gateway;
mod hub;
mod refresh_gate;
mod registry;
mod report;
mod router;
mod worker;

pub use config::HubConfig;
pub use coordinator::MembershipCoordinator;
pub use error::{CoordinatorError, HubError, ResolveError, RouterError};
pub use event::{EventKind, ServerEvent};
pub use gateway::{BroadcastGroupGateway, ChaoticGateway, GatewayCall, GatewayError, MemoryGateway};
pub use hub::{
    ConnectOutcome, FailClosedReason, Hub, PermissionChange, PrincipalResolver, UserRefresh,
};
pub use registry::ConnectionRegistry;
pub use report::{GatewayFailure, MembershipOp, MembershipReport, RefreshOutcome};
pub use router::{DeliveryReport, EventRouter};
pub use worker::PermissionChangeWorker;
