use std::sync::Arc;

use fit_coach::composer::{LlmComposer, PassthroughComposer, Persona, ResponseComposer};
use fit_coach::config::CoachConfig;
use fit_coach::llm::{LlmConfig, create_provider};
use fit_coach::registry::SessionRegistry;
use fit_coach::routes::coach_routes;
use fit_coach::session::Mode;
use fit_coach::store::{FitnessStore, LibSqlBackend};
use fit_coach::workflow::Workflow;
use tokio::io::{AsyncBufReadExt, BufReader};
use tower_http::cors::CorsLayer;

const LOCAL_SESSION: &str = "local";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = CoachConfig::from_env()?;

    eprintln!("🏋️ Fit Coach v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   HTTP API: http://0.0.0.0:{}/api/sessions", config.http_port);

    // ── Database ─────────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let store: Arc<dyn FitnessStore> = Arc::new(
        LibSqlBackend::new_local(db_path)
            .await
            .map_err(|e| format!("Failed to open database at {}: {e}", config.db_path))?,
    );
    eprintln!("   Database: {}", config.db_path);

    // ── Composer ─────────────────────────────────────────────────────────
    let persona = Persona::new(config.persona_name.clone(), config.user_name.clone());
    let composer: Arc<dyn ResponseComposer> = match config.require_api_key() {
        Ok(api_key) => {
            let llm = create_provider(&LlmConfig {
                base_url: config.api_base.clone(),
                api_key,
                model: config.model.clone(),
            })?;
            Arc::new(LlmComposer::new(llm, persona))
        }
        Err(e) => {
            tracing::warn!(error = %e, "No API key, replies will not be styled");
            Arc::new(PassthroughComposer)
        }
    };

    let workflow = Arc::new(Workflow::new(store, composer));
    let registry = Arc::new(SessionRegistry::new(workflow, config.activity_level));

    // Spawn Axum REST server
    let app = coach_routes(Arc::clone(&registry)).layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    tracing::info!(port = config.http_port, "HTTP server started");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server stopped");
        }
    });

    eprintln!("   Type a message and press Enter. /chat, /fitness, /quit.\n");

    // ── REPL ─────────────────────────────────────────────────────────────
    print_replies(&registry.open(LOCAL_SESSION).await);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let replies = match line {
            "" => {
                eprint!("> ");
                continue;
            }
            "/quit" | "/exit" => break,
            "/chat" => registry.set_mode(LOCAL_SESSION, Mode::Chat).await,
            "/fitness" => registry.set_mode(LOCAL_SESSION, Mode::Fitness).await,
            text => registry.send_message(LOCAL_SESSION, text).await,
        };
        print_replies(&replies.unwrap_or_default());
        eprint!("> ");
    }

    Ok(())
}

fn print_replies(replies: &[String]) {
    for reply in replies {
        println!("\n{reply}\n");
    }
}
