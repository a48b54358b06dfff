//! A differentially private aggregate query gateway for protected tabular
//! data: queries never see raw rows, every released aggregate is noised
//! under a formal epsilon budget, and every admission decision is recorded
//! before it's returned to the caller.
//!
//! The crate is organized around four components, mirroring the
//! boundaries a deployment actually needs to audit independently:
//!
//! - [`mechanism`]: the noise engine (Laplace, Gaussian, exponential).
//! - [`budget`]: the per-principal epsilon ledger.
//! - [`query`]: query/filter types and the planner that dispatches them.
//! - [`gate`]: the gateway that ties the above together with a row store,
//!   a principal directory and an audit sink, and decides admission.
//!
//! [`store`], [`config`], [`principal`] and [`error`] are the supporting
//! cast: the protected-data interface, deployment configuration, identity,
//! and the typed error taxonomy shared by every component.

pub mod budget;
pub mod config;
pub mod error;
pub mod gate;
pub mod mechanism;
pub mod principal;
pub mod query;
pub mod store;

pub use budget::{BudgetEntry, BudgetLedger, HashMapBudgetLedger};
pub use config::{ColumnDescriptor, GatewayConfig};
pub use error::GatewayError;
pub use gate::{AuditRecord, AuditSink, PrivacyGateway, QueryResponse, ResetRequest, VecAuditSink};
pub use mechanism::rng::{NoiseSource, OsNoiseSource, SeededNoiseSource};
pub use principal::{HashMapPrincipalDirectory, Principal, PrincipalDirectory, Role};
pub use query::{FilterSet, Predicate, QueryDescriptor, QueryRequest, Value};
pub use store::{RowStore, VecRowStore};
