//! # MongoDB Backend
//!
//! Pools `mongodb::sync::Client` handles to one deployment. Enabled with the
//! `mongodb` feature.
//!
//! The driver connects lazily: building a client never touches the network,
//! so an unreachable deployment does not surface as `PoolError::Connect`.
//! It shows up as `PoolError::Validation` when the pool pings on init, or
//! as the first operation's error otherwise.

use kvpool_common::{BoxError, MongoEndpoint};
use mongodb::bson::doc;
use mongodb::sync::{Client, Database};

use crate::backend::Backend;

/// Connection factory for MongoDB.
///
/// `connect` only parses the URI and builds the client; `ping` is the first
/// round trip.
#[derive(Debug, Clone)]
pub struct MongoBackend {
    /// Database the liveness probe runs against.
    pub ping_database: String,
}

impl Default for MongoBackend {
    fn default() -> Self {
        MongoBackend {
            ping_database: "admin".to_string(),
        }
    }
}

impl Backend for MongoBackend {
    type Endpoint = MongoEndpoint;
    type Conn = MongoConnection;

    const KIND: &'static str = "mongodb";

    fn connect(&self, endpoint: &MongoEndpoint) -> Result<MongoConnection, BoxError> {
        let client = Client::with_uri_str(endpoint.uri())?;
        Ok(MongoConnection { client })
    }

    fn ping(&self, conn: &mut MongoConnection) -> Result<(), BoxError> {
        conn.client
            .database(&self.ping_database)
            .run_command(doc! { "ping": 1 })
            .run()?;
        Ok(())
    }

    fn close(&self, conn: MongoConnection) {
        // Dropping the last clone of a client tears down its connection pool.
        drop(conn);
    }
}

/// One MongoDB client.
pub struct MongoConnection {
    client: Client,
}

impl MongoConnection {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self, name: &str) -> Database {
        self.client.database(name)
    }

    /// Database named in the connection URI, if any.
    pub fn default_database(&self) -> Option<Database> {
        self.client.default_database()
    }
}
