use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use harbor_api::{ApiError, BulkStateItem, RuntimeConfig, StateApi, StoreRegistry, IN_MEMORY_KIND};
use harbor_state::{InMemoryStore, Store};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::cli::*;
use crate::script::{self, Step};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = RuntimeConfig::load(&cli.config)?;
    match cli.command {
        Command::Stores => cmd_stores(&config, cli.format).await,
        Command::Run(args) => cmd_run(&config, &args, cli.format).await,
    }
}

/// Instantiate and initialise every configured store.
pub async fn build_registry(config: &RuntimeConfig) -> anyhow::Result<StoreRegistry> {
    let mut builder = StoreRegistry::builder();
    for store_config in &config.stores {
        let store: Arc<dyn Store> = match store_config.kind.as_str() {
            IN_MEMORY_KIND => Arc::new(InMemoryStore::new()),
            other => bail!(
                "state store {} has unknown kind '{}'",
                store_config.name,
                other
            ),
        };
        store
            .init(store_config.metadata.clone())
            .await
            .with_context(|| format!("failed to initialise state store {}", store_config.name))?;
        info!(store = %store_config.name, kind = %store_config.kind, "state store ready");
        builder = builder.register(store_config.name.clone(), store);
    }
    Ok(builder.build())
}

async fn cmd_stores(config: &RuntimeConfig, format: OutputFormat) -> anyhow::Result<()> {
    let registry = build_registry(config).await?;
    let api_config = config.api_config();

    if config.stores.is_empty() {
        if let OutputFormat::Text = format {
            println!("No state stores configured.");
        }
        return Ok(());
    }

    for store_config in &config.stores {
        let features: Vec<String> = registry
            .get(&store_config.name)
            .map(|store| store.features().iter().map(ToString::to_string).collect())
            .unwrap_or_default();
        let prefix = api_config.key_prefix(&store_config.name).to_string();
        match format {
            OutputFormat::Json => println!(
                "{}",
                json!({
                    "name": store_config.name,
                    "kind": store_config.kind,
                    "features": features,
                    "key_prefix": prefix,
                })
            ),
            OutputFormat::Text => println!(
                "{}  {}  [{}]  prefix={}",
                store_config.name.bold(),
                store_config.kind.cyan(),
                features.join(", "),
                prefix.yellow()
            ),
        }
    }
    Ok(())
}

async fn cmd_run(
    config: &RuntimeConfig,
    args: &RunArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let steps = script::load(&args.script)?;
    let registry = build_registry(config).await?;
    let api = StateApi::new(Arc::new(registry), config.api_config());

    let outcomes = run_steps(&api, steps).await;
    for outcome in &outcomes {
        print_outcome(outcome, format)?;
    }

    let failed = outcomes.iter().filter(|o| !o.ok).count();
    if failed > 0 {
        bail!("{failed} of {} steps failed", outcomes.len());
    }
    Ok(())
}

/// Result of one replayed step, printed as one line.
#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub op: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Replay every step in order. A failed step does not stop the run.
pub async fn run_steps(api: &StateApi, steps: Vec<Step>) -> Vec<StepOutcome> {
    let mut outcomes = Vec::with_capacity(steps.len());
    for (index, step) in steps.into_iter().enumerate() {
        let op = step.op();
        let outcome = match run_step(api, step).await {
            Ok(result) => StepOutcome {
                step: index + 1,
                op,
                ok: true,
                code: None,
                error: None,
                result,
            },
            Err(err) => StepOutcome {
                step: index + 1,
                op,
                ok: false,
                code: Some(err.code().to_string()),
                error: Some(err.to_string()),
                result: None,
            },
        };
        outcomes.push(outcome);
    }
    outcomes
}

async fn run_step(api: &StateApi, step: Step) -> Result<Option<Value>, ApiError> {
    match step {
        Step::Save { store, items } => {
            api.save_state(script::save_request(store, items)).await?;
            Ok(None)
        }
        Step::Get {
            store,
            key,
            consistency,
            metadata,
        } => {
            let resp = api
                .get_state(script::get_request(store, key, consistency, metadata))
                .await?;
            Ok(Some(value_json(&resp.data, resp.etag.as_deref())))
        }
        Step::GetBulk {
            store,
            keys,
            metadata,
        } => {
            let resp = api
                .get_bulk_state(script::get_bulk_request(store, keys, metadata))
                .await?;
            Ok(Some(Value::Array(resp.items.iter().map(bulk_item_json).collect())))
        }
        Step::Delete {
            store,
            key,
            etag,
            options,
            metadata,
        } => {
            api.delete_state(script::delete_request(store, key, etag, options, metadata))
                .await?;
            Ok(None)
        }
        Step::DeleteBulk { store, items } => {
            api.delete_bulk_state(script::delete_bulk_request(store, items))
                .await?;
            Ok(None)
        }
        Step::Transaction {
            store,
            operations,
            metadata,
        } => {
            api.execute_state_transaction(script::transaction_request(store, operations, metadata))
                .await?;
            Ok(None)
        }
    }
}

fn value_json(data: &[u8], etag: Option<&str>) -> Value {
    json!({
        "value": String::from_utf8_lossy(data),
        "etag": etag,
    })
}

fn bulk_item_json(item: &BulkStateItem) -> Value {
    json!({
        "key": item.key,
        "value": String::from_utf8_lossy(&item.data),
        "etag": item.etag,
        "error": item.error,
    })
}

fn print_outcome(outcome: &StepOutcome, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(outcome)?),
        OutputFormat::Text => {
            let label = format!("[{}] {}", outcome.step, outcome.op);
            if outcome.ok {
                println!("{} {}", "✓".green().bold(), label);
            } else {
                println!(
                    "{} {}  {}",
                    "✗".red().bold(),
                    label,
                    outcome.error.as_deref().unwrap_or_default().red()
                );
            }
            if let Some(result) = &outcome.result {
                println!("    {result}");
            }
        }
    }
    Ok(())
}
