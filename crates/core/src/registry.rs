//! Callable Functions
//!
//! A remote model can ask for a local function to run, identified only by
//! name and a JSON argument string. This module maps those names onto typed
//! handlers. Each handler declares its argument type, which is used both to
//! decode the incoming arguments and to generate the JSON schema advertised
//! to the model.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::{DeckError, Result};
use crate::presentation::PresentationBuilder;
use crate::slide::DeckRequest;

/// The declaration of a function as shown to the remote model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A function the remote model may call.
#[async_trait]
pub trait Function: Send + Sync + 'static {
    /// Decoded from the call's JSON arguments.
    type Args: DeserializeOwned + JsonSchema + Send;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    async fn invoke(&self, args: Self::Args) -> Result<String>;
}

/// Object-safe view of a [`Function`], working on raw JSON.
#[async_trait]
trait ErasedFunction: Send + Sync {
    fn spec(&self) -> FunctionSpec;
    async fn call(&self, arguments: &str) -> Result<String>;
}

struct Erased<F: Function> {
    function: F,
    _args: PhantomData<fn() -> F::Args>,
}

#[async_trait]
impl<F: Function> ErasedFunction for Erased<F> {
    fn spec(&self) -> FunctionSpec {
        let mut parameters = schemars::schema_for!(F::Args).to_value();
        if let Some(object) = parameters.as_object_mut() {
            object.remove("$schema");
            object.remove("title");
        }
        FunctionSpec {
            name: F::NAME.to_string(),
            description: F::DESCRIPTION.to_string(),
            parameters,
        }
    }

    async fn call(&self, arguments: &str) -> Result<String> {
        let args: F::Args =
            serde_json::from_str(arguments).map_err(|e| DeckError::InvalidArguments {
                function: F::NAME.to_string(),
                message: e.to_string(),
            })?;
        self.function.invoke(args).await
    }
}

/// The static dispatch table consulted when a run asks for a function.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<&'static str, Box<dyn ErasedFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `function` under its `NAME`, replacing any previous entry.
    pub fn register<F: Function>(&mut self, function: F) -> &mut Self {
        self.functions.insert(
            F::NAME,
            Box::new(Erased {
                function,
                _args: PhantomData,
            }),
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Fails with [`DeckError::UnknownCallback`] if `name` is not registered.
    pub fn ensure_known(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(DeckError::UnknownCallback(name.to_string()))
        }
    }

    /// Declarations of every registered function, ordered by name.
    pub fn specs(&self) -> Vec<FunctionSpec> {
        self.functions.values().map(|f| f.spec()).collect()
    }

    /// Decodes `arguments` for `name` and runs the handler.
    pub async fn call(&self, name: &str, arguments: &str) -> Result<String> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| DeckError::UnknownCallback(name.to_string()))?;
        info!(function = name, "Invoking callback function");
        function.call(arguments).await
    }
}

/// Arguments of the `create_presentation` function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct CreatePresentationArgs {
    /// Topic of the presentation, e.g. United Nations & It's Role
    pub topic: String,
    /// Number Of Slides Required
    #[serde(deserialize_with = "slide_count_from_string_or_number")]
    #[schemars(with = "String")]
    pub num_slides: u32,
}

/// Models send the count either as `"5"` or `5`.
fn slide_count_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u32),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(text) => text.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("num_slides '{}' is not a positive integer", text))
        }),
    }
}

/// Builds a deck and returns the path it was written to.
pub struct CreatePresentation {
    builder: Arc<PresentationBuilder>,
}

impl CreatePresentation {
    pub fn new(builder: Arc<PresentationBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Function for CreatePresentation {
    type Args = CreatePresentationArgs;

    const NAME: &'static str = "create_presentation";
    const DESCRIPTION: &'static str = "Create presentation for the slide based on the topic & number of slides required passed as a parameter";

    async fn invoke(&self, args: Self::Args) -> Result<String> {
        let request = DeckRequest::new(args.topic, args.num_slides).map_err(|e| {
            DeckError::InvalidArguments {
                function: Self::NAME.to_string(),
                message: e.to_string(),
            }
        })?;
        let path: PathBuf = self.builder.build(&request).await?;
        Ok(path.display().to_string())
    }
}

/// A registry holding only `create_presentation`.
pub fn presentation_registry(builder: Arc<PresentationBuilder>) -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry.register(CreatePresentation::new(builder));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContentService;
    use crate::deck::DeckAssembler;
    use crate::illustration::DisabledImageService;

    struct Echo;

    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        text: String,
    }

    #[async_trait]
    impl Function for Echo {
        type Args = EchoArgs;
        const NAME: &'static str = "echo";
        const DESCRIPTION: &'static str = "Returns its input";

        async fn invoke(&self, args: EchoArgs) -> Result<String> {
            Ok(args.text)
        }
    }

    #[tokio::test]
    async fn test_call_dispatches_by_name() {
        let mut registry = FunctionRegistry::new();
        registry.register(Echo);

        let out = registry.call("echo", r#"{"text":"hi"}"#).await.unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn test_unknown_name_is_typed_error() {
        let mut registry = FunctionRegistry::new();
        registry.register(Echo);

        assert!(matches!(
            registry.call("create_presentations", "{}").await,
            Err(DeckError::UnknownCallback(name)) if name == "create_presentations"
        ));
        assert!(registry.ensure_known("echo").is_ok());
        assert!(registry.ensure_known("nope").is_err());
    }

    #[tokio::test]
    async fn test_bad_arguments_are_rejected() {
        let mut registry = FunctionRegistry::new();
        registry.register(Echo);

        match registry.call("echo", r#"{"txt":"hi"}"#).await {
            Err(DeckError::InvalidArguments { function, .. }) => assert_eq!(function, "echo"),
            other => panic!("expected InvalidArguments, got {:?}", other),
        }
    }

    #[test]
    fn test_spec_carries_argument_schema() {
        let mut registry = FunctionRegistry::new();
        registry.register(Echo);

        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
        assert_eq!(specs[0].parameters["type"], "object");
        assert_eq!(specs[0].parameters["properties"]["text"]["type"], "string");
        assert!(specs[0].parameters.get("$schema").is_none());
    }

    #[test]
    fn test_create_presentation_args_accept_string_or_number() {
        let args: CreatePresentationArgs =
            serde_json::from_str(r#"{"topic":"Pollution","num_slides":"5"}"#).unwrap();
        assert_eq!(args.num_slides, 5);

        let args: CreatePresentationArgs =
            serde_json::from_str(r#"{"topic":"Pollution","num_slides":7}"#).unwrap();
        assert_eq!(args.num_slides, 7);

        assert!(
            serde_json::from_str::<CreatePresentationArgs>(
                r#"{"topic":"Pollution","num_slides":"five"}"#
            )
            .is_err()
        );
    }

    fn offline_builder(dir: &std::path::Path) -> Arc<PresentationBuilder> {
        Arc::new(PresentationBuilder::new(
            Arc::new(StaticContentService),
            Arc::new(DisabledImageService),
            DeckAssembler::new(dir),
        ))
    }

    #[test]
    fn test_create_presentation_schema() {
        let dir = tempfile::tempdir().unwrap();
        let registry = presentation_registry(offline_builder(dir.path()));
        let spec = &registry.specs()[0];

        assert_eq!(spec.name, "create_presentation");
        assert_eq!(spec.parameters["properties"]["num_slides"]["type"], "string");
        let required = spec.parameters["required"].as_array().unwrap();
        assert!(required.contains(&"topic".into()) && required.contains(&"num_slides".into()));
    }

    #[tokio::test]
    async fn test_create_presentation_returns_deck_path() {
        let dir = tempfile::tempdir().unwrap();
        let registry = presentation_registry(offline_builder(dir.path()));

        let output = registry
            .call(
                "create_presentation",
                r#"{"topic":"Frontend Development","num_slides":"5"}"#,
            )
            .await
            .unwrap();

        let expected = dir.path().join("Frontend Development.pptx");
        assert_eq!(output, expected.display().to_string());
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_create_presentation_rejects_zero_slides() {
        let dir = tempfile::tempdir().unwrap();
        let registry = presentation_registry(offline_builder(dir.path()));

        let err = registry
            .call("create_presentation", r#"{"topic":"X","num_slides":0}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::InvalidArguments { .. }));
    }
}
