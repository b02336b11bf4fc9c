//! Query backends
//!
//! Request/response model shared by every backend, the [`QueryService`]
//! trait they implement, a remote HTTP client, and the registry the
//! federated search uses to find a backend for each document type.

pub mod client;
pub mod error;
pub mod model;
pub mod registry;
pub mod service;

pub use client::HttpQueryClient;
pub use error::{QueryApiError, QueryApiResult};
pub use model::{
    Condition, DataSource, DataSourceField, DocRef, ExpressionItem, ExpressionOperator,
    ExpressionTerm, FieldType, OffsetRange, Op, Param, Query, ResultRequest, Row, SearchRequest,
    SearchResponse, TableResult,
};
pub use registry::{ClientRegistry, ClientResolver};
pub use service::{QueryService, ServiceUser};
