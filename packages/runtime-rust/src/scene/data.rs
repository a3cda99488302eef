//! Data-access facade: Scene-scoped record CRUD over the bound [`StoragePort`].
//!
//! Successful reads broadcast the record class name to the Scene's
//! subscribers; successful writes invoke the Scene's change hook with the
//! record class name, strictly after the storage port reported success.
//! Failed calls do neither.
//!
//! [`StoragePort`]: crate::traits::StoragePort

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use scene_core::{Fields, Record, RecordClass, Value};
use tracing::Instrument;

use super::Scene;
use crate::error::SceneError;
use crate::traits::SqlHints;

/// Reusable parametrized query logic, invoked with the Scene and its variables.
#[async_trait]
pub trait View: Send + Sync {
    type Output: Send;

    async fn run(&self, scene: &Scene, vars: Fields) -> Result<Self::Output, SceneError>;
}

/// Adapts a closure into a [`View`].
///
/// ```
/// use futures_util::FutureExt;
/// use scene_core::{fields, RecordClass, Value};
/// use scene_runtime::scene::FnView;
///
/// let open_orders = FnView::new(|scene, vars| {
///     async move {
///         let mut example = fields([("state", Value::from("open"))]);
///         example.extend(vars);
///         scene.query_by_example(&RecordClass::new("orders"), example).await
///     }
///     .boxed()
/// });
/// # let _ = open_orders;
/// ```
pub struct FnView<F, O> {
    f: F,
    _output: PhantomData<fn() -> O>,
}

impl<F, O> FnView<F, O>
where
    F: for<'a> Fn(&'a Scene, Fields) -> BoxFuture<'a, Result<O, SceneError>> + Send + Sync,
    O: Send,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _output: PhantomData,
        }
    }
}

#[async_trait]
impl<F, O> View for FnView<F, O>
where
    F: for<'a> Fn(&'a Scene, Fields) -> BoxFuture<'a, Result<O, SceneError>> + Send + Sync,
    O: Send,
{
    type Output = O;

    async fn run(&self, scene: &Scene, vars: Fields) -> Result<O, SceneError> {
        (self.f)(scene, vars).await
    }
}

/// Query chosen explicitly by the call site: an example filter or a view.
pub enum Query {
    /// Equality-only filter over `class`; behaves as [`Scene::query_by_example`].
    Filter { class: RecordClass, example: Fields },
    /// Parametrized view invoked with the Scene and `vars`.
    View {
        view: Arc<dyn View<Output = Vec<Record>>>,
        vars: Fields,
    },
}

impl Query {
    /// Filter query over `class`.
    #[must_use]
    pub fn filter(class: RecordClass, example: Fields) -> Self {
        Query::Filter { class, example }
    }

    /// View query with `vars`.
    pub fn view(view: Arc<dyn View<Output = Vec<Record>>>, vars: Fields) -> Self {
        Query::View { view, vars }
    }
}

impl Scene {
    /// Creates a record of `class`; returns it with storage-assigned fields.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Port`] if the storage port fails.
    pub async fn insert(&self, class: &RecordClass, fields: Fields) -> Result<Record, SceneError> {
        let record = self
            .storage_call("insert", &class.name, self.database.insert(self, class, fields))
            .await?;
        self.notify_change(&class.name);
        Ok(record)
    }

    /// Overwrites an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Port`] if the storage port fails.
    pub async fn update(&self, record: &Record) -> Result<(), SceneError> {
        self.storage_call("update", &record.class.name, self.database.update(self, record))
            .await?;
        self.notify_change(&record.class.name);
        Ok(())
    }

    /// Removes an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Port`] if the storage port fails.
    pub async fn delete(&self, record: &Record) -> Result<(), SceneError> {
        self.storage_call("delete", &record.class.name, self.database.delete(self, record))
            .await?;
        self.notify_change(&record.class.name);
        Ok(())
    }

    /// Records of `class` whose fields equal every entry of `example`.
    ///
    /// Equality only, implicit AND; values are never interpreted as operators.
    /// Anything richer goes through [`execute_sql`](Self::execute_sql).
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Port`] if the storage port fails.
    pub async fn query_by_example(
        &self,
        class: &RecordClass,
        example: Fields,
    ) -> Result<Vec<Record>, SceneError> {
        let records = self
            .storage_call(
                "query_by_example",
                &class.name,
                self.database.query_by_example(self, class, &example),
            )
            .await?;
        self.subscribe(&class.name);
        Ok(records)
    }

    /// Runs a raw statement. `hints` are declarative: read classes are
    /// subscribed and write classes announced as changed after success.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Port`] if the storage port fails.
    pub async fn execute_sql(
        &self,
        sql: &str,
        vars: &[Value],
        hints: SqlHints,
    ) -> Result<Vec<Fields>, SceneError> {
        let rows = self
            .storage_call(
                "execute_sql",
                "sql",
                self.database.execute_sql(self, sql, vars, &hints),
            )
            .await?;
        for class in &hints.read {
            self.subscribe(&class.name);
        }
        for class in &hints.write {
            self.notify_change(&class.name);
        }
        Ok(rows)
    }

    /// Runs a query chosen by the call site.
    ///
    /// # Errors
    ///
    /// Returns whatever the filter or the view fails with.
    pub async fn query(&self, query: Query) -> Result<Vec<Record>, SceneError> {
        match query {
            Query::Filter { class, example } => self.query_by_example(&class, example).await,
            Query::View { view, vars } => self.query_view(view.as_ref(), vars).await,
        }
    }

    /// Invokes `view` with this Scene and `vars`.
    ///
    /// # Errors
    ///
    /// Returns whatever the view fails with.
    pub async fn query_view<V>(&self, view: &V, vars: Fields) -> Result<V::Output, SceneError>
    where
        V: View + ?Sized,
    {
        tracing::debug!(vars = vars.len(), "running view");
        view.run(self, vars).await
    }

    /// The single record of `class` matching `example`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NotFound`] for zero matches,
    /// [`SceneError::MultipleMatches`] for more than one, and
    /// [`SceneError::Port`] if the storage port fails.
    pub async fn load(&self, class: &RecordClass, example: Fields) -> Result<Record, SceneError> {
        let mut records = self.query_by_example(class, example).await?;
        match records.len() {
            1 => Ok(records.remove(0)),
            0 => Err(self.fail(SceneError::NotFound {
                class: class.name.clone(),
            })),
            count => Err(self.fail(SceneError::MultipleMatches {
                class: class.name.clone(),
                count,
            })),
        }
    }

    /// The record of `class` with primary key `id`, or the only record of
    /// `class` when `id` is `None`.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub async fn get(&self, class: &RecordClass, id: Option<Value>) -> Result<Record, SceneError> {
        let mut example = Fields::new();
        if let Some(id) = id {
            example.insert(class.primary_key.clone(), id);
        }
        self.load(class, example).await
    }

    async fn storage_call<T, F>(
        &self,
        op: &'static str,
        resource: &str,
        call: F,
    ) -> Result<T, SceneError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        tracing::debug!(op, resource, "storage call");
        match call.instrument(self.operation.tracing_span()).await {
            Ok(value) => {
                metrics::counter!("scene_storage_calls_total", "op" => op, "outcome" => "ok")
                    .increment(1);
                Ok(value)
            }
            Err(err) => {
                metrics::counter!("scene_storage_calls_total", "op" => op, "outcome" => "error")
                    .increment(1);
                Err(self.fail(SceneError::Port(err)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures_util::FutureExt;
    use parking_lot::Mutex;
    use scene_core::{fields, Operation};

    use super::*;
    use crate::scene::test_support::UnreachableProtocol;
    use crate::scene::{RecordingSubscriber, SceneConfig};
    use crate::traits::{StoragePort, Subscriber};

    /// One observed port call: operation name, calling Scene, and detail.
    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        op: &'static str,
        scene: usize,
        span_id: String,
        detail: String,
    }

    fn address(scene: &Scene) -> usize {
        std::ptr::from_ref(scene) as usize
    }

    /// Fake storage port that records calls and replays canned rows.
    #[derive(Default)]
    struct FakeStorage {
        calls: Mutex<Vec<Call>>,
        rows: Mutex<Vec<Record>>,
        fail_with: Mutex<Option<String>>,
    }

    impl FakeStorage {
        fn with_rows(rows: Vec<Record>) -> Self {
            let storage = Self::default();
            *storage.rows.lock() = rows;
            storage
        }

        fn record(&self, scene: &Scene, op: &'static str, detail: String) -> anyhow::Result<()> {
            self.calls.lock().push(Call {
                op,
                scene: address(scene),
                span_id: scene.operation().span_id().to_string(),
                detail,
            });
            match self.fail_with.lock().clone() {
                Some(message) => Err(anyhow::anyhow!(message)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl StoragePort for FakeStorage {
        async fn insert(
            &self,
            scene: &Scene,
            class: &RecordClass,
            mut fields: Fields,
        ) -> anyhow::Result<Record> {
            self.record(scene, "insert", class.name.clone())?;
            fields.insert("id".to_string(), Value::from("o1"));
            Ok(Record::new(class.clone(), fields))
        }

        async fn update(&self, scene: &Scene, record: &Record) -> anyhow::Result<()> {
            self.record(scene, "update", record.class.name.clone())
        }

        async fn delete(&self, scene: &Scene, record: &Record) -> anyhow::Result<()> {
            self.record(scene, "delete", record.class.name.clone())
        }

        async fn query_by_example(
            &self,
            scene: &Scene,
            class: &RecordClass,
            example: &Fields,
        ) -> anyhow::Result<Vec<Record>> {
            self.record(scene, "query_by_example", format!("{}:{example:?}", class.name))?;
            Ok(self
                .rows
                .lock()
                .iter()
                .filter(|r| r.class == *class && r.matches(example))
                .cloned()
                .collect())
        }

        async fn execute_sql(
            &self,
            scene: &Scene,
            sql: &str,
            vars: &[Value],
            _hints: &SqlHints,
        ) -> anyhow::Result<Vec<Fields>> {
            self.record(scene, "execute_sql", format!("{sql}:{}", vars.len()))?;
            Ok(vec![fields([("count", Value::Int(2))])])
        }
    }

    fn orders() -> RecordClass {
        RecordClass::new("orders")
    }

    fn order(id: &str, a: i64, b: i64) -> Record {
        Record::new(
            orders(),
            fields([("id", Value::from(id)), ("a", Value::Int(a)), ("b", Value::Int(b))]),
        )
    }

    fn scene_with(storage: Arc<FakeStorage>) -> Scene {
        Scene::with_config(
            Arc::new(Operation::new("checkout")),
            storage,
            Arc::new(UnreachableProtocol),
            SceneConfig::with_project("main"),
        )
    }

    fn change_log(scene: &Scene) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        scene.set_notify_change(Arc::new(move |resource: &str| {
            sink.lock().push(resource.to_string());
        }));
        log
    }

    fn recorder(scene: &Scene) -> Arc<RecordingSubscriber> {
        let recorder = Arc::new(RecordingSubscriber::new());
        scene
            .subscribers()
            .join(Arc::clone(&recorder) as Arc<dyn Subscriber>);
        recorder
    }

    #[tokio::test]
    async fn checkout_insert_end_to_end() {
        let storage = Arc::new(FakeStorage::default());
        let scene = scene_with(Arc::clone(&storage));

        let record = scene
            .insert(&orders(), fields([("total", Value::Int(42))]))
            .await
            .unwrap();

        assert_eq!(
            record,
            Record::new(orders(), fields([("id", Value::from("o1")), ("total", Value::Int(42))]))
        );
        let calls = storage.calls.lock().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].op, "insert");
        assert_eq!(calls[0].scene, address(&scene));
        assert_eq!(calls[0].span_id, scene.operation().span_id());
    }

    #[tokio::test]
    async fn ports_see_the_calling_scene_not_its_fork() {
        let storage = Arc::new(FakeStorage::default());
        let scene = scene_with(Arc::clone(&storage));
        let forked = scene.fork();

        scene.insert(&orders(), Fields::new()).await.unwrap();
        forked.insert(&orders(), Fields::new()).await.unwrap();

        let calls = storage.calls.lock().clone();
        assert_eq!(calls[0].scene, address(&scene));
        assert_eq!(calls[1].scene, address(&forked));
        assert_ne!(calls[0].scene, calls[1].scene);
        assert_eq!(calls[0].span_id, calls[1].span_id);
    }

    #[tokio::test]
    async fn writes_notify_after_success() {
        let storage = Arc::new(FakeStorage::default());
        let scene = scene_with(Arc::clone(&storage));
        let changes = change_log(&scene);

        let record = scene.insert(&orders(), Fields::new()).await.unwrap();
        scene.update(&record).await.unwrap();
        scene.delete(&record).await.unwrap();

        assert_eq!(*changes.lock(), vec!["orders", "orders", "orders"]);
        let ops: Vec<_> = storage.calls.lock().iter().map(|c| c.op).collect();
        assert_eq!(ops, vec!["insert", "update", "delete"]);
    }

    #[tokio::test]
    async fn failed_writes_do_not_notify() {
        let storage = Arc::new(FakeStorage::default());
        *storage.fail_with.lock() = Some("unique constraint violated".to_string());
        let scene = scene_with(Arc::clone(&storage));
        let changes = change_log(&scene);

        let err = scene.insert(&orders(), Fields::new()).await.unwrap_err();
        assert!(matches!(err, SceneError::Port(_)));
        assert_eq!(err.to_string(), "unique constraint violated");
        assert!(changes.lock().is_empty());
    }

    #[tokio::test]
    async fn port_failures_reach_error_hook_unchanged() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let operation = Operation::new("checkout").with_on_error(Arc::new(
            move |err: &(dyn std::error::Error + 'static)| sink.lock().push(err.to_string()),
        ));
        let storage = Arc::new(FakeStorage::default());
        *storage.fail_with.lock() = Some("disk full".to_string());
        let scene = Scene::with_config(
            Arc::new(operation),
            storage,
            Arc::new(UnreachableProtocol),
            SceneConfig::with_project("main"),
        );

        let err = scene.delete(&order("o1", 1, 1)).await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(*seen.lock(), vec!["disk full".to_string()]);
    }

    #[tokio::test]
    async fn query_by_example_is_equality_and() {
        let storage = Arc::new(FakeStorage::with_rows(vec![
            order("o1", 1, 2),
            order("o2", 1, 3),
            order("o3", 2, 2),
        ]));
        let scene = scene_with(storage);

        let found = scene
            .query_by_example(&orders(), fields([("a", Value::Int(1)), ("b", Value::Int(2))]))
            .await
            .unwrap();
        assert_eq!(found, vec![order("o1", 1, 2)]);

        let literal = scene
            .query_by_example(&orders(), fields([("b", Value::from(">= 2"))]))
            .await
            .unwrap();
        assert!(literal.is_empty());
    }

    #[tokio::test]
    async fn reads_subscribe_the_class() {
        let storage = Arc::new(FakeStorage::with_rows(vec![order("o1", 1, 2)]));
        let scene = scene_with(storage);
        let recorder = recorder(&scene);

        scene.query_by_example(&orders(), Fields::new()).await.unwrap();
        scene
            .query_by_example(&RecordClass::new("users"), Fields::new())
            .await
            .unwrap();

        assert_eq!(recorder.resources(), vec!["orders", "users"]);
    }

    #[tokio::test]
    async fn failed_reads_do_not_subscribe() {
        let storage = Arc::new(FakeStorage::default());
        *storage.fail_with.lock() = Some("timeout".to_string());
        let scene = scene_with(storage);
        let recorder = recorder(&scene);

        assert!(scene.query_by_example(&orders(), Fields::new()).await.is_err());
        assert_eq!(recorder.notifications(), 0);
    }

    #[tokio::test]
    async fn load_requires_exactly_one_match() {
        let storage = Arc::new(FakeStorage::with_rows(vec![
            order("o1", 1, 2),
            order("o2", 1, 3),
        ]));
        let scene = scene_with(storage);

        let none = scene
            .load(&orders(), fields([("a", Value::Int(9))]))
            .await
            .unwrap_err();
        assert!(matches!(none, SceneError::NotFound { ref class } if class == "orders"));

        let one = scene
            .load(&orders(), fields([("b", Value::Int(3))]))
            .await
            .unwrap();
        assert_eq!(one, order("o2", 1, 3));

        let many = scene
            .load(&orders(), fields([("a", Value::Int(1))]))
            .await
            .unwrap_err();
        assert!(matches!(many, SceneError::MultipleMatches { count: 2, .. }));
    }

    #[tokio::test]
    async fn get_filters_by_primary_key() {
        let users = RecordClass::new("users").with_primary_key("email");
        let alice = Record::new(users.clone(), fields([("email", Value::from("a@x.io"))]));
        let bob = Record::new(users.clone(), fields([("email", Value::from("b@x.io"))]));
        let storage = Arc::new(FakeStorage::with_rows(vec![alice.clone(), bob]));
        let scene = scene_with(Arc::clone(&storage));

        let found = scene.get(&users, Some(Value::from("a@x.io"))).await.unwrap();
        assert_eq!(found, alice);

        let ambiguous = scene.get(&users, None).await.unwrap_err();
        assert!(matches!(ambiguous, SceneError::MultipleMatches { count: 2, .. }));

        let details: Vec<_> = storage.calls.lock().iter().map(|c| c.detail.clone()).collect();
        assert!(details[0].contains("email"));
        assert_eq!(details[1], "users:{}");
    }

    #[tokio::test]
    async fn get_without_id_loads_the_unique_row() {
        let settings = RecordClass::new("settings");
        let only = Record::new(settings.clone(), fields([("id", Value::Int(1))]));
        let scene = scene_with(Arc::new(FakeStorage::with_rows(vec![only.clone()])));

        assert_eq!(scene.get(&settings, None).await.unwrap(), only);
    }

    #[tokio::test]
    async fn execute_sql_applies_hints_after_success() {
        let storage = Arc::new(FakeStorage::default());
        let scene = scene_with(Arc::clone(&storage));
        let recorder = recorder(&scene);
        let changes = change_log(&scene);

        let rows = scene
            .execute_sql(
                "UPDATE orders SET state = ? WHERE total > ?",
                &[Value::from("closed"), Value::Int(10)],
                SqlHints {
                    read: vec![RecordClass::new("users")],
                    write: vec![orders()],
                },
            )
            .await
            .unwrap();

        assert_eq!(rows, vec![fields([("count", Value::Int(2))])]);
        assert_eq!(recorder.resources(), vec!["users"]);
        assert_eq!(*changes.lock(), vec!["orders"]);
        assert_eq!(storage.calls.lock()[0].detail, "UPDATE orders SET state = ? WHERE total > ?:2");
    }

    #[tokio::test]
    async fn query_dispatches_on_the_variant() {
        let storage = Arc::new(FakeStorage::with_rows(vec![order("o1", 1, 2), order("o2", 5, 2)]));
        let scene = scene_with(storage);

        let filtered = scene
            .query(Query::filter(orders(), fields([("a", Value::Int(5))])))
            .await
            .unwrap();
        assert_eq!(filtered, vec![order("o2", 5, 2)]);

        let seen_vars = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen_vars);
        let view = FnView::new(move |scene: &Scene, vars: Fields| {
            *sink.lock() = Some(vars.clone());
            async move { scene.query_by_example(&orders(), vars).await }.boxed()
        });
        let viewed = scene
            .query(Query::view(Arc::new(view), fields([("a", Value::Int(1))])))
            .await
            .unwrap();
        assert_eq!(viewed, vec![order("o1", 1, 2)]);
        assert_eq!(*seen_vars.lock(), Some(fields([("a", Value::Int(1))])));
    }

    #[tokio::test]
    async fn query_view_returns_any_output() {
        struct CountView;

        #[async_trait]
        impl View for CountView {
            type Output = usize;

            async fn run(&self, scene: &Scene, vars: Fields) -> Result<usize, SceneError> {
                Ok(scene.query_by_example(&orders(), vars).await?.len())
            }
        }

        let storage = Arc::new(FakeStorage::with_rows(vec![order("o1", 1, 2), order("o2", 1, 3)]));
        let scene = scene_with(storage);
        let count = scene
            .query_view(&CountView, fields([("a", Value::Int(1))]))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn concurrent_calls_on_one_scene() {
        let storage = Arc::new(FakeStorage::with_rows(vec![order("o1", 1, 2)]));
        let scene = scene_with(Arc::clone(&storage));

        let class = orders();
        let (a, b, c) = tokio::join!(
            scene.query_by_example(&class, Fields::new()),
            scene.insert(&class, Fields::new()),
            scene.get(&class, Some(Value::from("o1"))),
        );
        assert_eq!(a.unwrap().len(), 1);
        assert!(b.is_ok());
        assert!(c.is_ok());
        assert_eq!(storage.calls.lock().len(), 3);
    }
}
