use std::{net::SocketAddr, time::Duration};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub mongo: MongoSettings,
    pub neo4j: Neo4jSettings,
    pub query_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub view_collection: String,
}

#[derive(Clone, Debug)]
pub struct Neo4jSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let mongo = MongoSettings {
            uri: env_or("MONGO_URI", "mongodb://localhost:27017"),
            database: env_or("MONGO_DATABASE", "entertainment"),
            collection: env_or("MONGO_COLLECTION", "films"),
            view_collection: env_or("MONGO_VIEW_COLLECTION", "high_score_films"),
        };

        let neo4j = Neo4jSettings {
            uri: env_or("NEO4J_URI", "127.0.0.1:7687"),
            user: env_or("NEO4J_USER", "neo4j"),
            password: env_or("NEO4J_PASSWORD", "neo4j"),
        };

        let query_timeout_secs: u64 =
            std::env::var("QUERY_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(30);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            mongo,
            neo4j,
            query_timeout: Duration::from_secs(query_timeout_secs.max(1)),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
