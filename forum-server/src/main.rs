use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use forum_server::application::{
    auth_service::AuthService, post_service::PostService, search_service::SearchService,
    user_service::UserService,
};
use forum_server::data::{
    post_repository::{PostRepository, PostgresPostRepository},
    user_repository::{PostgresUserRepository, UserRepository},
};
use forum_server::infrastructure::{
    config::AppConfig,
    database::{create_pool, run_migrations},
    events::{EventNotifier, KafkaEventPublisher},
    logging::init_logging,
    media::MediaStore,
    search::ElasticsearchIndex,
    security::JwtKeys,
};
use forum_server::server::{AppState, run_server};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let pool = create_pool(&config.database_url)
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    let user_repo: Arc<dyn UserRepository> = Arc::new(PostgresUserRepository::new(pool.clone()));
    let post_repo: Arc<dyn PostRepository> = Arc::new(PostgresPostRepository::new(pool));

    let notifier = match &config.kafka_brokers {
        Some(brokers) => EventNotifier::new(Arc::new(
            KafkaEventPublisher::new(brokers, &config.kafka_posts_topic)
                .context("failed to create kafka producer")?,
        )),
        None => {
            info!("KAFKA_BROKERS not set, event publishing disabled");
            EventNotifier::disabled()
        }
    };

    let index = ElasticsearchIndex::new(&config.elasticsearch_url, &config.elasticsearch_index)
        .context("invalid Elasticsearch configuration")?;
    let search = SearchService::new(Arc::new(index), notifier.clone());
    // the forum keeps working without the search engine
    if let Err(err) = search.create_index().await {
        warn!(error = %err, "search index unavailable at startup");
    }

    let media = MediaStore::new(&config.media_root);
    let auth = AuthService::new(
        Arc::clone(&user_repo),
        JwtKeys::new(config.jwt_secret.clone()),
    );
    let users = UserService::new(
        user_repo,
        Arc::clone(&post_repo),
        search.clone(),
        media.clone(),
    );
    let posts = PostService::new(
        post_repo,
        search.clone(),
        notifier,
        media,
        i64::from(config.page_size),
    );

    let state = AppState::new(auth, users, posts, search);
    run_server(config, state).await?;
    Ok(())
}
