use microkernel::{Kernel, KernelError, Module, lifecycle, module};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[module(group = "RESOURCE", tag = "storage")]
#[derive(Default)]
pub struct Database {
    opened: AtomicUsize,
}

#[lifecycle]
impl Database {
    async fn boot(&self, _kernel: &Kernel) -> anyhow::Result<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self, _kernel: &Kernel) {
        self.opened.fetch_sub(1, Ordering::SeqCst);
    }

    /// Not a lifecycle method: wrong arity
    #[allow(dead_code)]
    async fn query(&self, _sql: &str, _kernel: &Kernel, _limit: usize) {}

    /// Not a lifecycle method: second argument is not the kernel
    #[allow(dead_code)]
    async fn fetch(&self, id: u64) -> u64 {
        id
    }

    /// Not a lifecycle method: exclusive receiver
    #[allow(dead_code)]
    async fn reset(&mut self, _kernel: &Kernel) {
        *self.opened.get_mut() = 0;
    }

    /// Not a lifecycle method: kernel taken mutably
    #[allow(dead_code)]
    async fn rebind(&self, _kernel: &mut Kernel) {}

    /// Not a lifecycle method: not async
    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::SeqCst) > 0
    }
}

#[module(
    name = "http",
    group = "SERVICE",
    tag = ["public", "network"],
    after = ["storage"],
)]
#[derive(Default)]
pub struct HttpServer {
    log: Mutex<Vec<&'static str>>,
}

#[lifecycle]
impl HttpServer {
    async fn start(&self, kernel: &Kernel) -> Result<(), KernelError> {
        let db = kernel.get_as::<Database>("database")?;
        if !db.is_open() {
            return Err(KernelError::configuration("database is closed"));
        }
        self.log.lock().unwrap().push("start");
        Ok(())
    }

    async fn stop(&self, _kernel: &Kernel) -> anyhow::Result<()> {
        self.log.lock().unwrap().push("stop");
        Ok(())
    }
}

#[module(before = "database")]
pub struct Marker;

#[lifecycle]
impl Marker {}

#[test]
fn manifest_reflects_attribute() {
    let manifest = HttpServer::manifest();
    assert_eq!(manifest.name, "http");
    assert_eq!(manifest.group.as_deref(), Some("SERVICE"));
    assert_eq!(manifest.tags, vec!["public", "network"]);
    assert_eq!(manifest.after, vec!["storage"]);
    assert!(manifest.before.is_empty());

    let manifest = Database::manifest();
    assert_eq!(manifest.name, "database");
    assert_eq!(manifest.tags, vec!["storage"]);
}

#[test]
fn provides_only_lifecycle_methods() {
    let db = Database::default();
    assert!(db.provides("boot"));
    assert!(db.provides("shutdown"));
    assert!(!db.provides("query"));
    assert!(!db.provides("fetch"));
    assert!(!db.provides("reset"));
    assert!(!db.provides("rebind"));
    assert!(!db.provides("is_open"));
    assert!(!Marker.provides("boot"));
    assert_eq!(Marker.descriptor().name, "marker");
}

#[tokio::test]
async fn unknown_method_call_fails() {
    let kernel = Kernel::new();
    let err = Marker.call("boot", &kernel).await.unwrap_err();
    assert!(err.to_string().contains("no lifecycle method boot"));
}

#[tokio::test]
async fn macro_modules_drive_through_the_ladder() {
    let kernel = Kernel::builder()
        .module(HttpServer::default())
        .module(Database::default())
        .module(Marker)
        .launch("started")
        .await
        .unwrap();

    assert_eq!(
        kernel.execution_order().await.unwrap(),
        vec!["marker", "database", "http"]
    );
    let db = kernel.get_as::<Database>("database").unwrap();
    assert!(db.is_open());

    kernel.request_phase("dead").await.unwrap();
    assert!(!db.is_open());
    let http = kernel.get_as::<HttpServer>("http").unwrap();
    assert_eq!(*http.log.lock().unwrap(), vec!["start", "stop"]);
}
