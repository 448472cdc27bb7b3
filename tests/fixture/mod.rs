use mysql_async::prelude::*;
use mysql_async::{Conn, Error, Opts};

static DATABASE_SCHEMA: [&str; 2] = [
    r#"CREATE TABLE users (
            id INT UNSIGNED NOT NULL AUTO_INCREMENT,
            email VARCHAR(255) NOT NULL,
            balance DECIMAL(12, 4) NOT NULL DEFAULT '0.00',
            status ENUM('new', 'active', 'blocked') NOT NULL DEFAULT 'new',
            PRIMARY KEY(id),
            UNIQUE INDEX `users_email` (`email`)
        )"#,
    r#"CREATE TABLE sessions (
            session_id VARCHAR(64) NOT NULL,
            user_id INT UNSIGNED NOT NULL,
            PRIMARY KEY(session_id)
        )"#,
];

pub struct Fixture {
    conn: Conn,
    database: &'static str,
}

/// Connection options of the test server, `None` skips the calling test.
pub fn test_opts() -> Option<Opts> {
    let url = std::env::var("TEST_MYSQL_URL").ok()?;

    Opts::from_url(&url).ok()
}

impl Fixture {
    pub async fn create_with_database(database: &'static str) -> Result<Option<Self>, Error> {
        let Some(opts) = test_opts() else {
            return Ok(None);
        };

        let mut conn = Conn::new(opts).await?;
        conn.query_drop(format!("DROP DATABASE IF EXISTS {database}"))
            .await?;
        conn.query_drop(format!("CREATE DATABASE {database}")).await?;
        conn.query_drop(format!("USE {database}")).await?;

        for query in DATABASE_SCHEMA {
            conn.query_drop(query).await?;
        }

        Ok(Some(Self { conn, database }))
    }

    pub fn database(&self) -> &'static str {
        self.database
    }

    pub async fn execute_queries(
        &mut self,
        queries: impl IntoIterator<Item = impl AsQuery>,
    ) -> Result<(), Error> {
        for query in queries {
            self.conn.query_drop(query).await?;
        }
        Ok(())
    }

    pub async fn cleanup(mut self) -> Result<(), Error> {
        self.conn
            .query_drop(format!("DROP DATABASE IF EXISTS {}", self.database))
            .await?;
        self.conn.disconnect().await
    }
}
