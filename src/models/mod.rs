pub mod audit;
pub mod estimate;
pub mod invoice;
pub mod principal;
pub mod rate_limit;
pub mod session;
