use microkernel::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[module(group = "RESOURCE", tag = "storage")]
#[derive(Default)]
pub struct Database;

#[lifecycle]
impl Database {
    async fn boot(&self, kernel: &Kernel) -> anyhow::Result<()> {
        tracing::info!("database: opening pool");
        tokio::time::sleep(Duration::from_millis(50)).await;
        kernel.set_resource("db.pool", String::from("postgres://localhost/app"));
        Ok(())
    }

    async fn shutdown(&self, _kernel: &Kernel) {
        tracing::info!("database: pool closed");
    }
}

#[module(group = "SERVICE", after = "storage")]
#[derive(Default)]
pub struct Api;

#[lifecycle]
impl Api {
    async fn configure(&self, kernel: &Kernel) -> anyhow::Result<()> {
        let pool = kernel.resource::<String>("db.pool")?;
        tracing::info!("api: using {}", pool);
        kernel.register("health", |_| Ok(serde_json::json!("ok")))?;
        Ok(())
    }

    async fn start(&self, _kernel: &Kernel) -> anyhow::Result<()> {
        tracing::info!("api: listening");
        Ok(())
    }

    async fn stop(&self, _kernel: &Kernel) -> anyhow::Result<()> {
        tracing::info!("api: stopped");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    tracing::info!("Starting microkernel {}", Kernel::version());

    let kernel = Kernel::builder()
        .config(KernelConfig::from_env()?)
        .module(Api)
        .module(Database)
        .build()?;

    // Time every lifecycle call
    kernel.latch(METHOD_HOOK, |args, acc| {
        let inner = acc
            .clone()
            .into_method()
            .ok_or_else(|| anyhow::anyhow!("expected a lifecycle method"))?;
        let label = format!(
            "{}.{}",
            args[1].as_str().unwrap_or_default(),
            args[2].as_str().unwrap_or_default()
        );
        Ok(HookValue::Method(LifecycleMethod::new(move |kernel| {
            let inner = inner.clone();
            let label = label.clone();
            async move {
                let started = std::time::Instant::now();
                let outcome = inner.call(kernel).await;
                tracing::debug!("{} took {:?}", label, started.elapsed());
                outcome
            }
        })))
    });

    kernel.subscribe(TRANSIT_AFTER_EVENT, |args| async move {
        tracing::info!("reached {}", args[1]);
        Ok(())
    });

    kernel.request_phase("started").await?;
    tracing::info!("health: {}", kernel.service("health", &[])?);

    kernel.request_phase("dead").await?;
    tracing::info!("Kernel is back at rest");
    Ok(())
}
