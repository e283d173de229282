//! State and query core of the lock/mint dashboard.
//!
//! UI intents arrive as [`Command`]s and go through [`reduce_command`], which
//! may queue [`Query`]s on the state. A runner executes queued queries with
//! [`query::execute`] and feeds each [`QueryResponse`] to [`reduce_response`].

pub mod command;
pub mod ecosystem;
pub mod error;
pub mod interfaces;
pub mod multicall;
pub mod numeric;
pub mod query;
pub mod response;
pub mod state;

pub use command::{reduce_command, reduce_command_at, Command, SwapCommand};
pub use ecosystem::{Deployment, Deployments, Ecosystem, Layer};
pub use error::{ChainError, CodecError, CommandError, QueryError};
pub use query::{execute, ChainClient, PendingQuery, ProviderClient, Query, QueryResponse, QueryResult};
pub use response::reduce_response;
pub use state::{AppState, PersistedSettings};
