use flood_server::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flood_server=info".into()),
        )
        .init();

    let config = Config::from_env();
    let db_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:flood.db?mode=rwc".to_string());
    let (app, _state) = flood_server::build_app(&db_url, config).await;

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");
    tracing::info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}
