mod config;
mod http;
mod orchestrator;
mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;

use alpaca_broker::AlpacaClient;
use broker_trait::BrokerClient;
use circuit_breaker::{BreakerConfig, DrawdownCircuitBreaker};
use decision_agent::{ChatClient, ChatClientConfig, DecisionAgent};
use execution_agent::{ExecutionAgent, ExecutionConfig, PendingTradeStore};
use kelly_position_sizer::{SizerConfig, TradeHistorySizer};
use market_data_client::MarketDataClient;
use observability::ObservabilityStore;
use portfolio_manager::{EntryCriteriaStore, PortfolioManager};
use research_client::{ResearchApiClient, ResearchClientConfig, ResearchHook};
use risk_manager::RiskConfig;

use crate::config::AgentConfig;
use crate::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let agent_cfg = AgentConfig::from_env()?;
    let risk_cfg = RiskConfig::from_env()?;
    let sizer_cfg = SizerConfig::from_env();
    let breaker_cfg = BreakerConfig::from_env();
    let execution_cfg = ExecutionConfig::from_env()?;
    let filter_cfg = config::filter_config_from_env();

    std::fs::create_dir_all(&agent_cfg.log_dir)?;

    let broker: Arc<dyn BrokerClient> = Arc::new(AlpacaClient::new(
        agent_cfg.alpaca_key_id.clone(),
        agent_cfg.alpaca_secret_key.clone(),
        agent_cfg.alpaca_base_url.clone(),
    )?);

    let market_data = MarketDataClient::new(broker.clone(), agent_cfg.lookback_bars);

    let entry_criteria_store =
        EntryCriteriaStore::new(agent_cfg.log_dir.join("entry_criteria.json"));
    let portfolio = Arc::new(PortfolioManager::new(broker.clone(), entry_criteria_store));

    let chat_client = ChatClient::new(ChatClientConfig::from_env());
    let decision = DecisionAgent::new(chat_client, risk_cfg.max_dollars_per_trade);

    let research = if agent_cfg.research_enabled {
        let research_cfg = ResearchClientConfig::from_env();
        if research_cfg.api_key.is_empty() {
            tracing::warn!(
                "RESEARCH_ENABLED=true but PERPLEXITY_API_KEY is empty, disabling research"
            );
            None
        } else {
            Some(ResearchHook::new(ResearchApiClient::new(research_cfg)))
        }
    } else {
        None
    };

    let sizer = TradeHistorySizer::new(
        agent_cfg.log_dir.join("kelly_trade_history.json"),
        sizer_cfg,
    );
    let breaker = DrawdownCircuitBreaker::new(
        agent_cfg.log_dir.join("circuit_breaker_state.json"),
        breaker_cfg,
    );

    let pending_store = PendingTradeStore::new(agent_cfg.log_dir.join("pending_trades.json"));
    let execution = Arc::new(ExecutionAgent::new(
        broker.clone(),
        execution_cfg.clone(),
        pending_store,
    ));

    let store = ObservabilityStore::new(agent_cfg.log_dir.clone());
    let risk_cfg = Arc::new(risk_cfg);

    let orchestrator = Orchestrator::new(
        agent_cfg.symbols.clone(),
        market_data,
        portfolio.clone(),
        decision,
        research,
        agent_cfg.research_score_threshold,
        (*risk_cfg).clone(),
        sizer,
        breaker,
        execution.clone(),
        store,
        filter_cfg,
        execution_cfg.trading_mode,
    );

    let app_state = http::AppState {
        broker: broker.clone(),
        portfolio: portfolio.clone(),
        execution: execution.clone(),
        risk_cfg: risk_cfg.clone(),
        limiter: Arc::new(rate_limit::RateLimiter::new()),
    };

    let bind_addr: SocketAddr = agent_cfg.http_bind_addr.parse()?;
    let router = http::router(app_state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    tracing::info!(
        bind = %bind_addr,
        loop_seconds = agent_cfg.loop_seconds,
        symbols = ?agent_cfg.symbols,
        "trading agent starting"
    );

    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(agent_cfg.loop_seconds));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    );
    let mut server = std::pin::pin!(server);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let result = orchestrator.run_tick().await;
                tracing::debug!(loop_id = %result.loop_id, "tick complete");
            }
            res = &mut server => {
                if let Err(e) = res {
                    tracing::error!(error = %e, "http server exited with an error");
                }
                break;
            }
            _ = shutdown_signal() => {
                tracing::info!("shutdown signal received, exiting after current tick");
                break;
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
