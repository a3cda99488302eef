//! Runs a checkout flow against the in-memory ports and prints the collected metrics.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use scene_core::{fields, Fields, Operation, RecordClass, Value};
use scene_runtime::scene::set_default_project;
use scene_runtime::telemetry::{init_tracing, LogFormat};
use scene_runtime::{
    LocalServiceConfig, LocalServiceProtocol, MemoryStorage, Query, RecordingSubscriber, Scene,
    ServiceRequest, ServiceRouter, StoragePort, Subscriber,
};

#[derive(Debug, Parser)]
#[command(name = "scene-demo", about = "Checkout flow over in-memory storage and services")]
struct Args {
    /// Project targeted by calls that do not name one.
    #[arg(long, env = "SCENE_PROJECT", default_value = "shop")]
    project: String,

    /// Log output format.
    #[arg(long, env = "SCENE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Number of orders to attempt.
    #[arg(long, default_value_t = 3)]
    orders: u32,

    /// Units of stock seeded before the run.
    #[arg(long, default_value_t = 5)]
    stock: i64,
}

scene_runtime::service_client! {
    /// Typed client for the shop project.
    struct Shop {
        fn place_order(sku: String, quantity: i64) -> String = "placeOrder";
    }
}

fn orders() -> RecordClass {
    RecordClass::new("orders")
}

fn stock() -> RecordClass {
    RecordClass::new("stock").with_primary_key("sku")
}

fn sku_and_quantity(args: &[Value]) -> anyhow::Result<(Value, i64)> {
    let [sku, quantity] = args else {
        anyhow::bail!("expected (sku, quantity), got {} arguments", args.len());
    };
    let quantity = quantity.as_i64().context("quantity must be an integer")?;
    Ok((sku.clone(), quantity))
}

async fn place_order(req: ServiceRequest) -> anyhow::Result<Value> {
    let (sku, quantity) = sku_and_quantity(&req.args)?;
    let reserved = req
        .scene
        .use_services(Some("inventory"))
        .invoke("reserve", req.args.clone())
        .await?;
    anyhow::ensure!(reserved == Value::Bool(true), "insufficient stock for {sku}");

    let order = req
        .scene
        .insert(
            &orders(),
            fields([("sku", sku), ("quantity", Value::Int(quantity))]),
        )
        .await?;
    Ok(order.id().cloned().unwrap_or(Value::Null))
}

async fn reserve(req: ServiceRequest) -> anyhow::Result<Value> {
    let (sku, quantity) = sku_and_quantity(&req.args)?;
    let mut item = req.scene.get(&stock(), Some(sku)).await?;
    let available = item.get("available").and_then(Value::as_i64).unwrap_or(0);
    if available < quantity {
        return Ok(Value::Bool(false));
    }
    item.fields
        .insert("available".to_string(), Value::Int(available - quantity));
    req.scene.update(&item).await?;
    Ok(Value::Bool(true))
}

fn router(project: &str) -> ServiceRouter {
    let mut router = ServiceRouter::new();
    router.register_fn(project, "placeOrder", place_order);
    router.register_fn("inventory", "reserve", reserve);
    router
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format)?;
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;
    set_default_project(args.project.clone());

    let storage = Arc::new(MemoryStorage::new());
    let protocol = LocalServiceProtocol::new(
        router(&args.project),
        Arc::clone(&storage) as Arc<dyn StoragePort>,
        LocalServiceConfig::default(),
    );

    let operation = Operation::new("checkout")
        .with_baggage("tenant", "demo")
        .with_on_error(Arc::new(|err: &(dyn std::error::Error + 'static)| {
            tracing::debug!(error = %err, "checkout step failed");
        }));
    let scene = Scene::new(Arc::new(operation), storage, Arc::new(protocol));
    scene.set_notify_change(Arc::new(|resource: &str| {
        tracing::info!(resource, "resource changed");
    }));

    scene
        .insert(
            &stock(),
            fields([("sku", Value::from("sku-1")), ("available", Value::Int(args.stock))]),
        )
        .await?;

    let shop = Shop::new(scene.use_services(None));
    for attempt in 1..=args.orders {
        match shop.place_order("sku-1".to_string(), 2).await {
            Ok(id) => tracing::info!(attempt, order_id = %id, "order placed"),
            Err(err) => tracing::warn!(attempt, error = %err, "order rejected"),
        }
    }

    let reader = scene.fork();
    let recorder = Arc::new(RecordingSubscriber::new());
    reader
        .subscribers()
        .join(Arc::clone(&recorder) as Arc<dyn Subscriber>);
    let placed = reader.query(Query::filter(orders(), Fields::new())).await?;
    let remaining = reader.get(&stock(), Some(Value::from("sku-1"))).await?;
    tracing::info!(
        trace_id = %scene.operation().trace_id(),
        orders = placed.len(),
        available = ?remaining.get("available"),
        depends_on = ?recorder.resources(),
        "checkout finished"
    );

    println!("{}", metrics.render());
    Ok(())
}
