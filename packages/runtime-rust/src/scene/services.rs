//! Remote-call facade: name-based dispatch through the bound [`ServiceProtocol`].
//!
//! [`Scene::use_services`] returns a [`ServiceClient`] for one project. Its
//! [`invoke`](ServiceClient::invoke) accepts any method name and forwards it,
//! with the arguments unvalidated, as exactly one `ServiceProtocol::call`.
//! Typed clients are generated at compile time with [`service_client!`](crate::service_client).
//!
//! [`ServiceProtocol`]: crate::traits::ServiceProtocol

use serde::de::DeserializeOwned;
use serde::Serialize;
use scene_core::Value;
use tracing::Instrument;

use super::Scene;
use crate::error::SceneError;

/// Call-through client for the services of one project.
#[derive(Debug, Clone)]
pub struct ServiceClient<'s> {
    scene: &'s Scene,
    project: String,
}

impl Scene {
    /// Client for the services of `project`, or of the Scene's default
    /// project when `project` is `None`.
    #[must_use]
    pub fn use_services(&self, project: Option<&str>) -> ServiceClient<'_> {
        ServiceClient {
            scene: self,
            project: project.unwrap_or(&self.default_project).to_string(),
        }
    }
}

impl<'s> ServiceClient<'s> {
    /// Project every call of this client targets.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub fn scene(&self) -> &'s Scene {
        self.scene
    }

    /// Calls `method` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Port`] carrying the protocol's failure unchanged.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, SceneError> {
        let scene = self.scene;
        tracing::debug!(project = %self.project, method, args = args.len(), "remote call");
        let result = scene
            .service_protocol
            .call(scene, &self.project, method, args)
            .instrument(scene.operation.tracing_span())
            .await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            "scene_rpc_calls_total",
            "project" => self.project.clone(),
            "method" => method.to_string(),
            "outcome" => outcome,
        )
        .increment(1);
        result.map_err(|err| scene.fail(SceneError::Port(err)))
    }

    /// Calls `method` with serializable arguments and decodes the result.
    ///
    /// `args` is converted to a value list: a sequence (tuple, `Vec`, array)
    /// spreads into positional arguments, unit becomes no arguments, and any
    /// other value becomes a single argument.
    ///
    /// Arguments and results are converted through JSON-shaped values. Byte
    /// results arrive as arrays of integers, which decode into `Vec<u8>`.
    /// Integers outside the `i64` range are rejected rather than widened to
    /// floats.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Codec`] if `args` or the result cannot be
    /// converted, otherwise the same errors as [`invoke`](Self::invoke).
    pub async fn call<A, R>(&self, method: &str, args: A) -> Result<R, SceneError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let args = encode_args(&args).map_err(|e| self.scene.fail(e))?;
        let result = self.invoke(method, args).await?;
        serde_json::from_value(result.into_json())
            .map_err(|e| self.scene.fail(SceneError::Codec(format!("result of `{method}`: {e}"))))
    }
}

fn encode_args<A: Serialize>(args: &A) -> Result<Vec<Value>, SceneError> {
    let json = serde_json::to_value(args).map_err(|e| SceneError::Codec(e.to_string()))?;
    check_int_range(&json)?;
    Ok(match json {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(items) => items.into_iter().map(Value::from_json).collect(),
        other => vec![Value::from_json(other)],
    })
}

fn check_int_range(json: &serde_json::Value) -> Result<(), SceneError> {
    match json {
        serde_json::Value::Number(n) if n.is_u64() && n.as_i64().is_none() => {
            Err(SceneError::Codec(format!("integer {n} does not fit in i64")))
        }
        serde_json::Value::Array(items) => items.iter().try_for_each(check_int_range),
        serde_json::Value::Object(map) => map.values().try_for_each(check_int_range),
        _ => Ok(()),
    }
}

/// Generates a typed client whose methods forward to [`ServiceClient::call`].
///
/// Each method is sent under its Rust name unless a wire name is given after `=`.
///
/// ```
/// use scene_runtime::service_client;
///
/// service_client! {
///     /// Client for the order service.
///     pub struct OrderService {
///         fn total(order_id: String) -> i64;
///         fn place_order(sku: String, quantity: i64) -> String = "placeOrder";
///     }
/// }
/// ```
#[macro_export]
macro_rules! service_client {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$method_meta:meta])*
                fn $method:ident ( $($arg:ident : $ty:ty),* $(,)? ) -> $ret:ty $(= $wire:literal)?;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name<'s> {
            client: $crate::scene::ServiceClient<'s>,
        }

        impl<'s> $name<'s> {
            /// Wraps a service client obtained from `Scene::use_services`.
            #[must_use]
            $vis fn new(client: $crate::scene::ServiceClient<'s>) -> Self {
                Self { client }
            }

            $(
                $(#[$method_meta])*
                #[allow(clippy::missing_errors_doc)]
                $vis async fn $method(
                    &self,
                    $($arg: $ty),*
                ) -> ::std::result::Result<$ret, $crate::SceneError> {
                    self.client
                        .call($crate::__service_method_name!($method $(, $wire)?), ($($arg,)*))
                        .await
                }
            )*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __service_method_name {
    ($method:ident) => {
        stringify!($method)
    };
    ($method:ident, $wire:literal) => {
        $wire
    };
}
