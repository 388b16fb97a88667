pub mod client;
pub mod error;
pub mod types;

pub use client::{DEFAULT_BASE_URL, JobSource, ReportsClient, StatsSource};
pub use error::ApiError;
pub use types::{
    DashboardStats, JobStatus, PageQuery, PaginationMeta, ReportJob, has_active,
};
