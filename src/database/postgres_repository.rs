use sqlx::PgPool;

/// Shared handle to the relational store. All persistence lives in
/// `impl PostgresRepository` blocks spread across this module's
/// siblings, one per concern.
#[derive(Clone)]
pub struct PostgresRepository {
    pub pool: PgPool,
}
