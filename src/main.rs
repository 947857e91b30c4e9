use accounts::configuration::{get_configuration, EventSinkKind, Settings, StoreBackend};
use accounts::events::{EventPublisher, EventSink, LogEventSink, RedisEventSink};
use accounts::startup::{run, AppState};
use accounts::store::{KeyValueStore, MemoryStore, RedisStore};
use accounts::telemetry::init_telemetry;
use accounts::users::PgUserRepository;
use sqlx::postgres::PgPoolOptions;
use std::io::{Error, ErrorKind};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(Error::new(ErrorKind::InvalidInput, "Configuration error"));
        }
    };

    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            Error::new(ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        Error::new(ErrorKind::Other, "Migration error")
    })?;
    tracing::info!("Database ready");

    let redis = connect_redis(&configuration).await?;

    let store: Arc<dyn KeyValueStore> = match (&configuration.store.backend, &redis) {
        (StoreBackend::Redis, Some(redis)) => Arc::new(redis.clone()),
        _ => {
            tracing::warn!("Using in-process token store; revocations are not shared between instances");
            let memory = MemoryStore::new();
            memory.start_cleanup_task(Duration::from_secs(
                configuration.store.cleanup_interval_secs.max(1),
            ));
            Arc::new(memory)
        }
    };

    let sink: Arc<dyn EventSink> = match (&configuration.events.sink, &redis) {
        (EventSinkKind::Redis, Some(redis)) => Arc::new(RedisEventSink::new(
            redis.pool().clone(),
            configuration.events.channel.clone(),
        )),
        _ => Arc::new(LogEventSink),
    };
    let (events, _dispatcher) = EventPublisher::start(sink, configuration.events.queue_capacity);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(
        listener,
        AppState {
            users: Arc::new(PgUserRepository::new(pool)),
            store,
            events,
            jwt: configuration.jwt.clone(),
        },
    )?;

    server.await
}

/// Connect to Redis when the store or the event sink is configured to use it.
async fn connect_redis(configuration: &Settings) -> std::io::Result<Option<RedisStore>> {
    let needed = configuration.store.backend == StoreBackend::Redis
        || configuration.events.sink == EventSinkKind::Redis;
    if !needed {
        return Ok(None);
    }

    let redis = RedisStore::from_settings(&configuration.redis).map_err(|e| {
        tracing::error!("Failed to create Redis pool: {}", e);
        Error::new(ErrorKind::InvalidInput, "Redis configuration error")
    })?;

    redis.ping().await.map_err(|e| {
        tracing::error!("Failed to reach Redis: {}", e);
        Error::new(ErrorKind::ConnectionRefused, "Redis connection error")
    })?;

    tracing::info!("Redis connection pool created successfully");
    Ok(Some(redis))
}
