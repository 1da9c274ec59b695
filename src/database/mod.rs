pub mod audit;
pub mod estimate;
pub mod invoice;
pub mod numbering;
pub mod postgres_repository;
pub mod principal;
pub mod rate_limit;
pub mod session;
pub mod token;
