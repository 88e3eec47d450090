//! Pulls balance and recent transactions from the authority and prints a
//! summary.
//!
//! Usage: cargo run -p parlor_client --bin parlor-sync -- [--recent N] [--watch SECS]

use std::time::Duration;

use parlor_client::{
    config, init_logging, BalanceSync, EventBus, IntoUserNotice, RemoteActionClient,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(err) = init_logging() {
        eprintln!("Warning: logging not initialised: {err}");
    }

    let args: Vec<String> = std::env::args().collect();
    let mut recent = 10usize;
    let mut watch: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--recent" | "-n" => {
                recent = parse_value(&args, i, "--recent");
                i += 2;
            }
            "--watch" | "-w" => {
                watch = Some(parse_value(&args, i, "--watch"));
                i += 2;
            }
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    let resolved = config::load_with_sources()?;
    resolved.config.validate()?;
    tracing::info!(
        base_url = %resolved.config.base_url,
        source = ?resolved.sources.base_url,
        "using authority"
    );

    let remote = RemoteActionClient::from_config(&resolved.config)?;
    let sync = BalanceSync::new(EventBus::new(), resolved.config.history_limit);

    summarize(&sync, &remote, recent).await;

    let Some(secs) = watch.filter(|secs| *secs > 0) else {
        return Ok(());
    };
    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => summarize(&sync, &remote, recent).await,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("stopping");
                break;
            }
        }
    }
    Ok(())
}

async fn summarize(sync: &BalanceSync, remote: &RemoteActionClient, recent: usize) {
    let balance = match sync.refresh(remote).await {
        Ok(balance) => balance,
        Err(err) => {
            let notice = err.report();
            eprintln!("Error: {}", notice.message);
            return;
        }
    };

    println!("Balance: {balance}");
    match sync.stats() {
        Ok(stats) => println!(
            "Rounds: {}  Wins: {} ({:.1}%)  Wagered: {}  Net: {}",
            stats.total_rounds, stats.wins, stats.win_rate, stats.total_wagered, stats.net_profit
        ),
        Err(err) => eprintln!("Error: {}", err.to_notice().message),
    }
    if let Ok(transactions) = sync.recent(Some(recent)) {
        for tx in transactions {
            println!(
                "  {}  {:<9} bet {:>8}  x{:<6.2} win {:>8}",
                tx.timestamp.format("%H:%M:%S"),
                tx.game.slug(),
                tx.bet,
                tx.multiplier,
                tx.win
            );
        }
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Error: {flag} requires a value");
        std::process::exit(1);
    };
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for {flag}: {raw}");
        std::process::exit(1);
    })
}

fn print_help() {
    println!("Parlor balance sync");
    println!();
    println!("Usage: parlor-sync [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --recent, -n <N>       Transactions to list (default: 10)");
    println!("  --watch, -w <SECS>     Refresh every SECS seconds until Ctrl+C");
    println!("  --help                 Show this help message");
    println!();
    println!("Environment: PARLOR_CONFIG, PARLOR_BASE_URL, PARLOR_TIMEOUT_MS");
}
