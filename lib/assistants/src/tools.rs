//! Glue between domain services and tool handlers.
//!
//! Registries are built once per assistant kind. The restaurant a call acts
//! on is set for the duration of a turn with [`in_restaurant`] and read by
//! every handler when it runs.

use brigade_conversation::{HandlerError, ToolHandler, handler_fn};
use brigade_core::RestaurantId;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT_RESTAURANT: RestaurantId;
}

/// Runs `fut` with tool calls acting on `restaurant`.
pub(crate) async fn in_restaurant<F: Future>(restaurant: RestaurantId, fut: F) -> F::Output {
    CURRENT_RESTAURANT.scope(restaurant, fut).await
}

fn current_restaurant() -> Result<RestaurantId, HandlerError> {
    CURRENT_RESTAURANT
        .try_with(RestaurantId::clone)
        .map_err(|_| HandlerError::new("no restaurant is set for this call"))
}

/// Binds an operation to a service. The restaurant is resolved per call.
pub(crate) fn bind<S, F, Fut>(service: &Arc<S>, op: F) -> Arc<dyn ToolHandler>
where
    S: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<S>, RestaurantId, JsonValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<JsonValue, HandlerError>> + Send + 'static,
{
    let service = Arc::clone(service);
    handler_fn(move |args| {
        let call = current_restaurant().map(|restaurant| op(Arc::clone(&service), restaurant, args));
        async move { call?.await }
    })
}

/// Serializes a domain result as tool output.
pub(crate) fn output<T: Serialize>(value: &T) -> Result<JsonValue, HandlerError> {
    serde_json::to_value(value)
        .map_err(|e| HandlerError::new(format!("could not encode result: {e}")))
}

/// A registry whose calls act on one restaurant.
#[cfg(test)]
pub(crate) struct RestaurantTools {
    registry: brigade_conversation::ToolRegistry,
    restaurant: RestaurantId,
}

#[cfg(test)]
impl RestaurantTools {
    pub(crate) fn new(registry: brigade_conversation::ToolRegistry, restaurant: &str) -> Self {
        Self {
            registry,
            restaurant: restaurant.parse().unwrap(),
        }
    }

    pub(crate) async fn invoke(
        &self,
        name: &str,
        arguments: JsonValue,
    ) -> Result<JsonValue, brigade_conversation::ToolError> {
        in_restaurant(
            self.restaurant.clone(),
            self.registry.invoke(name, arguments),
        )
        .await
    }
}

#[cfg(test)]
impl std::ops::Deref for RestaurantTools {
    type Target = brigade_conversation::ToolRegistry;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brigade_conversation::{SchemaSpec, ToolDefinition, ToolError, ToolRegistry};
    use serde_json::json;

    fn echo_restaurant() -> ToolRegistry {
        let service = Arc::new(());
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDefinition::new(
                "whereAmI",
                "Returns the restaurant of the call",
                SchemaSpec::new(),
                bind(&service, |_, restaurant, _| async move {
                    Ok::<_, HandlerError>(json!(restaurant.to_string()))
                }),
            ))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn handlers_act_on_the_scoped_restaurant() {
        let registry = echo_restaurant();
        let r1 = in_restaurant("r1".parse().unwrap(), registry.invoke("whereAmI", json!({})))
            .await
            .unwrap();
        let r2 = in_restaurant("r2".parse().unwrap(), registry.invoke("whereAmI", json!({})))
            .await
            .unwrap();
        assert_eq!(r1, "r1");
        assert_eq!(r2, "r2");
    }

    #[tokio::test]
    async fn unscoped_call_fails() {
        let err = echo_restaurant()
            .invoke("whereAmI", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
