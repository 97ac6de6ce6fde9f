//! Beacon channel authorization.
//!
//! Decides which broadcast channels ("event sources") a back-office principal
//! may receive events from. Contains no connection state and no I/O of its
//! own; authorizers may suspend while they consult an external policy store.
//!
//! # Components
//!
//! - [`ChannelAuthorizer`]: capability deciding `(principal, channel) -> bool`
//! - [`AuthorizerIndex`]: lazily built `channel -> authorizers` map
//! - [`AuthorizationEngine`]: partitions every known channel into authorized
//!   and unauthorized for one principal
//! - [`catalog`]: the standard back-office channels and their authorizers
//!
//! A channel governed by several authorizers is granted only when all of them
//! grant it. Any authorizer failure denies the channel.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod authorizer;
pub mod catalog;
mod engine;
mod error;
mod index;
mod policy;
mod principal;

pub use authorizer::{ChannelAuthorizer, PolicyAuthorizer, SelfAuthorizer};
pub use engine::{AuthorizationEngine, AuthorizationResult};
pub use error::{AuthorizerError, EngineError};
pub use index::{AuthorizerIndex, AuthorizerIndexBuilder};
pub use policy::{ClaimPolicyEvaluator, PolicyEvaluator};
pub use principal::{Channel, Claim, ConnectionId, Principal, ROLE_CLAIM, UserKey};
