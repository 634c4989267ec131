use std::sync::Arc;
use std::time::Duration;

use common::config::Settings;
use common::logger;
use executor::{
    AlertNotifier, PaperLedger, ScanningController, TelegramSink, TradingCore, TradingCoreParts,
};
use market_data::SimulatedMarket;
use market_data::simulated::DEFAULT_SEEDS;
use strategy::{PatternScanner, ScanState, ScannerSettings, SignalGenerator};
use tracing::{debug, info, warn};

const MARKET_BAR_EVERY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup_logger();
    let settings = Settings::from_env()?;
    debug!("System starting up with {:?}", settings.universe);

    let pool = storage::open_pool(&settings.database_url).await?;

    let market = Arc::new(SimulatedMarket::new(
        DEFAULT_SEEDS,
        settings.scan_lookback.max(100),
    ));
    let ticker = market.clone().spawn_ticker(MARKET_BAR_EVERY);
    let known = market.symbols();
    let unseeded: Vec<&String> = settings
        .universe
        .iter()
        .filter(|s| !known.contains(*s))
        .collect();
    if !unseeded.is_empty() {
        warn!("No simulated market for {:?}; scans will report errors", unseeded);
    }

    let ledger = Arc::new(
        PaperLedger::new(pool, market.clone())
            .with_fallback_price(settings.fallback_price)
            .with_starting_balance(settings.starting_balance),
    );

    let state = Arc::new(ScanState::new(settings.alert_capacity));
    let scanner = PatternScanner::new(
        market.clone(),
        state.clone(),
        ScannerSettings {
            eval_timeout: settings.scan_eval_timeout,
            lookback: settings.scan_lookback,
        },
    );
    let controller = Arc::new(ScanningController::new(
        scanner.clone(),
        settings.universe.clone(),
        settings.scan_interval,
    ));

    let notifier = settings.telegram.as_ref().map(|telegram| {
        let rx = state.subscribe();
        let notifier = AlertNotifier::new(TelegramSink::new(telegram));
        tokio::spawn(notifier.start(rx))
    });

    let core = TradingCore::new(TradingCoreParts {
        ledger,
        controller: controller.clone(),
        scanner,
        generator: SignalGenerator::default(),
        oracle: market.clone(),
        candles: market,
        universe: settings.universe.clone(),
        fallback_price: settings.fallback_price,
        lookback: settings.scan_lookback,
    });

    if settings.scan_autostart {
        controller.start().await;
    }

    let mut heartbeat = tokio::time::interval(settings.status_log_interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            _ = heartbeat.tick() => log_status(&core).await,
        }
    }

    controller.stop().await;
    ticker.abort();
    if let Some(handle) = notifier {
        handle.abort();
    }
    info!("paperd stopped");
    Ok(())
}

async fn log_status(core: &TradingCore) {
    let status = core.controller().status().await;
    let stats = match core.ledger().portfolio_stats(None).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Could not compute portfolio stats: {}", e);
            return;
        }
    };

    let mut summary = format!(
        "STATUS: scanning={} alerts={} open={} pnl={:.2} balance={:.2}",
        status.scanning,
        status.active_alert_count,
        stats.open_positions,
        stats.total_pnl,
        stats.balance
    );
    for symbol in core.universe() {
        if let Some(price) = core.price_of(symbol).await {
            summary.push_str(&format!(" [{}: {:.2}]", symbol, price));
        }
    }
    info!("{}", summary);
}
