use std::{sync::Arc, time::Duration};

use aws_config::BehaviorVersion;
use domain::{
    conversations::{
        dynamo::DynamoConversationStore, ConversationEngine, ConversationStore,
        InMemoryConversationStore,
    },
    prescriptions::{PrescriptionBuilder, PrescriptionExtractor, Vocabulary},
};
use tracing_subscriber::EnvFilter;

mod archive;
mod azure;
mod config;
mod openfda;
mod routes;
mod twilio;

use config::Config;
use routes::AppState;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;

    let vocabulary = Arc::new(Vocabulary::load(&config.active_ingredients_csv));

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let aws = aws_config::defaults(BehaviorVersion::latest()).load().await;

    let mut extractor = PrescriptionExtractor::new(
        Arc::new(twilio::TwilioMediaFetcher::new(
            http.clone(),
            config.twilio_sid.clone(),
            config.twilio_auth.clone(),
        )),
        Arc::new(azure::AzureVisionRecognizer::new(
            http.clone(),
            &config.azure_endpoint,
            config.azure_key.clone(),
        )),
        PrescriptionBuilder::new(vocabulary),
    );
    if let Some(bucket) = &config.prescriptions_bucket {
        extractor = extractor.with_archive(Arc::new(archive::S3MediaArchive::new(
            aws_sdk_s3::Client::new(&aws),
            bucket.clone(),
        )));
    }
    if config.openfda_enabled {
        extractor = extractor.with_label_lookup(Arc::new(openfda::OpenFdaLookup::new(http)));
    }

    let store: Arc<dyn ConversationStore> = match &config.conversations_table {
        Some(table) => Arc::new(DynamoConversationStore::new(
            aws_sdk_dynamodb::Client::new(&aws),
            table.clone(),
            config.conversation_ttl,
        )),
        None => {
            let store = Arc::new(InMemoryConversationStore::new(config.conversation_ttl));
            spawn_purge(store.clone());
            store
        }
    };

    let state = AppState {
        engine: Arc::new(ConversationEngine::new(store, Arc::new(extractor))),
    };
    let app = routes::router(state);

    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        let app = tower::ServiceBuilder::new()
            .layer(axum_aws_lambda::LambdaLayer::default())
            .service(app);

        lambda_http::run(app).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
        tracing::info!("Listening on {}", config.bind_addr);
        axum::serve(listener, app).await?;
    }
    Ok(())
}

fn spawn_purge(store: Arc<InMemoryConversationStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!("Purged {} expired conversations", removed),
                Err(e) => tracing::warn!("Purging conversations failed: {}", e),
            }
        }
    });
}
