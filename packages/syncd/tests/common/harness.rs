//! Disposable-Postgres harness for integration tests.
//!
//! One container per test: several scheduling assertions count whole
//! tables, so tests cannot share a database.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

pub struct TestHarness {
    pub db_pool: PgPool,
    _container: ContainerAsync<Postgres>,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        let container = Postgres::default()
            .start()
            .await
            .expect("Failed to start postgres container");
        let host = container.get_host().await.expect("Failed to resolve host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to resolve postgres port");

        let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .expect("Failed to run migrations");

        Self {
            db_pool,
            _container: container,
        }
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}
