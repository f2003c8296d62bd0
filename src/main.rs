use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use mvi_store::config::LogLevel;
use mvi_store::{
    reducer_fn, ExceptionHandlerResult, LoggingPlugin, MetricsPlugin, RecordingPlugin, Reduction,
    Scope, Store, StoreBuilder, StoreConfig, StoreError, StorePlugin,
};

#[derive(Parser)]
#[command(
    name = "mvi-store",
    version,
    about = "Counter demo driven by the mvi-store engine",
    after_help = r#"COMMANDS (stdin, one per line)
  inc | dec | add <n>   change the counter (every multiple of 5 sends a notification)
  fail                  make the reducer fail
  reset                 back to zero
  replay                replay recorded intents into a fresh store and compare
  state                 print the current state
  quit                  stop the store and exit"#
)]
struct Cli {
    #[arg(long, help = "Store config file (default: ~/.config/mvi-store/store.toml)")]
    config: Option<PathBuf>,
    #[arg(long, help = "Override the store name from the config file")]
    name: Option<String>,
    #[arg(long, value_parser = parse_log_level, help = "Event log level: off, trace, debug, info, warn")]
    log_level: Option<LogLevel>,
    #[arg(long, help = "Let reducer errors stop the store instead of resetting it")]
    no_recovery: bool,
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    match s.to_ascii_lowercase().as_str() {
        "off" => Ok(LogLevel::Off),
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        other => Err(format!("unknown log level '{other}'")),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Counter {
    count: i64,
}

#[derive(Debug, Clone, PartialEq)]
enum CounterIntent {
    Increment,
    Decrement,
    Add(i64),
    Fail,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
enum CounterAction {
    Milestone(i64),
}

type CounterStore = Store<Counter, CounterIntent, CounterAction>;

#[derive(Debug, PartialEq)]
enum Command {
    Intent(CounterIntent),
    Replay,
    State,
    Quit,
}

fn reduce(
    state: &Counter,
    intent: CounterIntent,
) -> anyhow::Result<Reduction<Counter, CounterAction>> {
    let count = match intent {
        CounterIntent::Increment => state.count + 1,
        CounterIntent::Decrement => state.count - 1,
        CounterIntent::Add(n) => state
            .count
            .checked_add(n)
            .ok_or_else(|| anyhow::anyhow!("counter overflow adding {n}"))?,
        CounterIntent::Fail => anyhow::bail!("requested failure"),
        CounterIntent::Reset => 0,
    };

    let next = Counter { count };
    if count != 0 && count != state.count && count % 5 == 0 {
        Ok(Reduction::with_action(next, CounterAction::Milestone(count)))
    } else {
        Ok(Reduction::state(next))
    }
}

/// Recovers from every reducer error by resetting the counter.
struct ResetOnError;

#[async_trait]
impl StorePlugin<Counter, CounterIntent, CounterAction> for ResetOnError {
    fn name(&self) -> &str {
        "reset-on-error"
    }

    async fn on_exception(
        &self,
        error: &StoreError,
        _store: &CounterStore,
    ) -> anyhow::Result<ExceptionHandlerResult<CounterIntent, CounterAction>> {
        eprintln!("error: {error} (resetting)");
        Ok(ExceptionHandlerResult::DispatchIntent(CounterIntent::Reset))
    }
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let command = match parts.next() {
        Some("inc") => Command::Intent(CounterIntent::Increment),
        Some("dec") => Command::Intent(CounterIntent::Decrement),
        Some("add") => {
            let raw = parts.next().ok_or("usage: add <n>")?;
            let n = raw
                .parse()
                .map_err(|_| format!("not a number: '{raw}'"))?;
            Command::Intent(CounterIntent::Add(n))
        }
        Some("fail") => Command::Intent(CounterIntent::Fail),
        Some("reset") => Command::Intent(CounterIntent::Reset),
        Some("replay") => Command::Replay,
        Some("state") => Command::State,
        Some("quit") | Some("exit") => Command::Quit,
        Some(other) => return Err(format!("unknown command '{other}'")),
        None => return Err("empty command".to_string()),
    };
    if parts.next().is_some() {
        return Err("too many arguments".to_string());
    }
    Ok(command)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
}

fn counter_builder(
    config: &StoreConfig,
    recovery: bool,
) -> StoreBuilder<Counter, CounterIntent, CounterAction> {
    let builder = Store::builder(Counter::default(), reducer_fn(reduce)).config(config);
    if recovery {
        builder.plugin(ResetOnError)
    } else {
        builder
    }
}

async fn print_updates(store: CounterStore) {
    let mut states = store.state_stream();
    let mut actions = store.observe_actions();
    loop {
        tokio::select! {
            Some(state) = states.next() => println!("count = {}", state.count),
            Some(action) = actions.recv() => match action {
                CounterAction::Milestone(n) => println!("*** milestone: {n} ***"),
            },
            else => break,
        }
    }
}

/// Replays the recorded intents into a fresh replica and checks that it
/// reaches the same state as `store`.
async fn replay(
    store: &CounterStore,
    recorder: &RecordingPlugin<Counter, CounterIntent, CounterAction>,
    config: &StoreConfig,
    recovery: bool,
) {
    let expected = store.state();
    let mut replica_config = config.clone();
    replica_config.name = format!("{}-replica", config.name);
    let replica = counter_builder(&replica_config, recovery).build();

    let scope = Scope::new();
    let lifecycle = replica.start(&scope);
    let count = recorder.replay(&replica);

    let mut states = replica.observe_state();
    let reached =
        tokio::time::timeout(Duration::from_secs(1), states.wait_for(|s| *s == expected)).await;
    match reached {
        Ok(Ok(_)) => println!(
            "replayed {count} intents, replica reached count = {}",
            expected.count
        ),
        _ => println!(
            "replayed {count} intents, replica diverged: {} != {}",
            replica.state().count,
            expected.count
        ),
    }

    scope.cancel();
    lifecycle.join().await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => StoreConfig::load_from(path)?,
        None => StoreConfig::load()?,
    };
    if let Some(name) = cli.name {
        config.name = name;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;
    let recovery = !cli.no_recovery;

    let recorder = Arc::new(RecordingPlugin::from_config(&config.recording));
    let metrics = Arc::new(MetricsPlugin::new());

    let mut builder = counter_builder(&config, recovery)
        .plugin(LoggingPlugin::from_config(&config.logging))
        .shared_plugin(metrics.clone());
    if config.recording.enabled {
        builder = builder.shared_plugin(recorder.clone());
    }
    let store = builder.build();

    let scope = Scope::new();
    let lifecycle = store.start(&scope);
    let printer = tokio::spawn(print_updates(store.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = lifecycle.join() => {
                eprintln!("store stopped");
                break;
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(Command::Intent(intent)) => store.submit(intent),
            Ok(Command::Replay) if !config.recording.enabled => {
                eprintln!("recording is disabled; set [recording] enabled = true");
            }
            Ok(Command::Replay) => replay(&store, &recorder, &config, recovery).await,
            Ok(Command::State) => println!("{:?}", store.state()),
            Ok(Command::Quit) => break,
            Err(message) => eprintln!("{message}"),
        }
    }

    scope.cancel();
    let error = lifecycle.join().await;
    printer.abort();

    let snapshot = metrics.snapshot();
    println!(
        "intents: {}, state changes: {}, actions: {}, exceptions: {}, avg latency: {:.3}ms",
        snapshot.intents,
        snapshot.state_changes,
        snapshot.actions,
        snapshot.exceptions,
        snapshot.avg_latency_ms
    );

    if let Some(error) = error {
        anyhow::bail!("store terminated: {error}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_commands() {
        assert_eq!(parse_command("inc"), Ok(Command::Intent(CounterIntent::Increment)));
        assert_eq!(parse_command(" add -3 "), Ok(Command::Intent(CounterIntent::Add(-3))));
        assert_eq!(parse_command("replay"), Ok(Command::Replay));
        assert_eq!(parse_command("exit"), Ok(Command::Quit));
    }

    #[test]
    fn log_level_flag_is_case_insensitive() {
        assert_eq!(parse_log_level("INFO"), Ok(LogLevel::Info));
        assert_eq!(parse_log_level("off"), Ok(LogLevel::Off));
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(parse_command("add").is_err());
        assert!(parse_command("add x").is_err());
        assert!(parse_command("inc 2").is_err());
        assert!(parse_command("jump").is_err());
    }

    #[test]
    fn milestones_every_fifth_count() {
        let mut state = Counter::default();
        let mut milestones = Vec::new();
        for _ in 0..10 {
            let reduction = reduce(&state, CounterIntent::Increment).expect("reduce");
            state = reduction.state;
            milestones.extend(reduction.action);
        }
        assert_eq!(
            milestones,
            vec![CounterAction::Milestone(5), CounterAction::Milestone(10)]
        );
    }

    #[test]
    fn fail_and_overflow_are_errors() {
        assert!(reduce(&Counter::default(), CounterIntent::Fail).is_err());
        let max = Counter { count: i64::MAX };
        assert!(reduce(&max, CounterIntent::Add(1)).is_err());
    }
}
