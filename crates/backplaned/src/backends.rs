//! Registry wiring from configuration

use std::sync::Arc;

use anyhow::Result;
use backplane_gateway::BackendRegistry;
use backplane_probes::{
    BackendsConfig, ElasticsearchBackend, MockBackend, PostgresBackend, QdrantBackend,
    RedisBackend,
};

/// Register every enabled backend from `config`
pub fn build_registry(config: &BackendsConfig) -> Result<BackendRegistry> {
    let timeout = config.probe.timeout();
    let command_timeout = config.probe.command_timeout();
    let mut registry = BackendRegistry::new();

    if config.redis.enabled {
        tracing::info!(url = %config.redis.connection_url(), "Configuring Redis backend");
        registry.register_backend(Arc::new(RedisBackend::new(&config.redis, timeout)?));
    }
    if config.postgres.enabled {
        if config.postgres.url.is_none() {
            tracing::warn!(
                backend = %config.postgres.name,
                "No PostgreSQL connection string; backend will report not configured"
            );
        }
        registry.register_backend(Arc::new(PostgresBackend::new(&config.postgres, timeout)));
    }
    if config.elasticsearch.enabled {
        tracing::info!(url = %config.elasticsearch.url, "Configuring Elasticsearch backend");
        registry.register_backend(Arc::new(ElasticsearchBackend::new(
            &config.elasticsearch,
            timeout,
            command_timeout,
        )?));
    }
    if config.qdrant.enabled {
        tracing::info!(url = %config.qdrant.url, "Configuring Qdrant backend");
        registry.register_backend(Arc::new(QdrantBackend::new(
            &config.qdrant,
            timeout,
            command_timeout,
        )?));
    }

    Ok(registry)
}

/// Register in-memory demo backends under the configured names
pub fn build_demo_registry(config: &BackendsConfig) -> BackendRegistry {
    let mut registry = BackendRegistry::new();

    if config.redis.enabled {
        registry.register_backend(Arc::new(MockBackend::demo_key_value(&config.redis.name)));
    }
    if config.postgres.enabled {
        registry.register_backend(Arc::new(MockBackend::demo_relational(&config.postgres.name)));
    }
    if config.elasticsearch.enabled {
        registry.register_backend(Arc::new(MockBackend::demo_search(
            &config.elasticsearch.name,
        )));
    }
    if config.qdrant.enabled {
        registry.register_backend(Arc::new(MockBackend::demo_vector(&config.qdrant.name)));
    }

    registry
}
