//! Remote Assistant Runs
//!
//! An assistant run is a conversation executed by the remote service. It may
//! pause to ask for local functions to be executed; the caller answers with
//! the function outputs and the run resumes. This module defines the
//! resource contract as a trait, with domain types that carry no client
//! specifics, and an implementation backed by the OpenAI Assistants API.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        AssistantTools, AssistantToolsFunction, CreateAssistantRequestArgs,
        CreateMessageRequestArgs, CreateRunRequestArgs, CreateThreadRequestArgs,
        FunctionObjectArgs, MessageContent, MessageRole, RequiredAction, RunObject,
        RunStatus as RemoteRunStatus, SubmitToolOutputsRunRequest, ToolsOutputs,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::error::Result;
use crate::registry::{FunctionRegistry, FunctionSpec};

pub const DEFAULT_INSTRUCTIONS: &str =
    "You are an expert in creating highly engaging powerpoint presentations";
pub const DEFAULT_PROMPT: &str = "Can you please create presentations for the title Frontend Development & required number of slides is 5 ?";

/// Identifies a run within its thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub thread_id: String,
    pub run_id: String,
}

/// A request from the run to execute a local function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub id: String,
    pub function_name: String,
    /// JSON object, decoded by the function's handler.
    pub arguments: String,
}

/// The output of one executed [`CallbackRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResult {
    /// Matches the originating request id.
    pub id: String,
    pub output: String,
}

/// Observed state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Running,
    RequiresCallback(Vec<CallbackRequest>),
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => f.write_str("User"),
            TurnRole::Assistant => f.write_str("Assistant"),
        }
    }
}

/// One message of the thread's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl fmt::Display for ConversationTurn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

/// The asynchronous run resource.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    /// Returns the new assistant's id.
    async fn create_assistant(
        &self,
        instructions: &str,
        functions: &[FunctionSpec],
    ) -> Result<String>;

    /// Returns the new thread's id.
    async fn create_thread(&self) -> Result<String>;

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<()>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunHandle>;

    async fn retrieve_run(&self, run: &RunHandle) -> Result<RunStatus>;

    /// Submits every result of one callback batch in a single call.
    async fn submit_callback_results(
        &self,
        run: &RunHandle,
        results: Vec<CallbackResult>,
    ) -> Result<()>;

    /// The thread's messages, in the order the service returns them.
    async fn list_turns(&self, thread_id: &str) -> Result<Vec<ConversationTurn>>;
}

/// An `AssistantClient` for the OpenAI Assistants API.
pub struct OpenAIAssistantClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIAssistantClient {
    /// # Arguments
    ///
    /// * `config` - OpenAI API configuration (API key, base URL, etc.).
    /// * `model` - A model that supports function calling (e.g., "gpt-4-1106-preview").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

/// Maps a remote run onto the states the dispatch loop understands.
pub fn run_status_of(run: &RunObject) -> RunStatus {
    map_run_status(
        &run.status,
        run.required_action.as_ref(),
        run.last_error.as_ref().map(|e| e.message.as_str()),
    )
}

fn map_run_status(
    status: &RemoteRunStatus,
    required_action: Option<&RequiredAction>,
    last_error: Option<&str>,
) -> RunStatus {
    match status {
        RemoteRunStatus::Queued => RunStatus::Queued,
        RemoteRunStatus::InProgress | RemoteRunStatus::Cancelling => RunStatus::Running,
        RemoteRunStatus::RequiresAction => match required_action {
            Some(action) => RunStatus::RequiresCallback(
                action
                    .submit_tool_outputs
                    .tool_calls
                    .iter()
                    .map(|call| CallbackRequest {
                        id: call.id.clone(),
                        function_name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    })
                    .collect(),
            ),
            // Nothing to act on yet.
            None => RunStatus::Running,
        },
        RemoteRunStatus::Completed => RunStatus::Completed,
        RemoteRunStatus::Failed => RunStatus::Failed(last_error.unwrap_or("failed").to_string()),
        RemoteRunStatus::Cancelled => RunStatus::Failed("cancelled".to_string()),
        RemoteRunStatus::Expired => RunStatus::Failed("expired".to_string()),
        RemoteRunStatus::Incomplete => RunStatus::Failed("incomplete".to_string()),
    }
}

#[async_trait]
impl AssistantClient for OpenAIAssistantClient {
    async fn create_assistant(
        &self,
        instructions: &str,
        functions: &[FunctionSpec],
    ) -> Result<String> {
        let tools = functions
            .iter()
            .map(|spec| {
                Ok(AssistantTools::Function(AssistantToolsFunction {
                    function: FunctionObjectArgs::default()
                        .name(spec.name.clone())
                        .description(spec.description.clone())
                        .parameters(spec.parameters.clone())
                        .build()?,
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        let request = CreateAssistantRequestArgs::default()
            .model(&self.model)
            .instructions(instructions)
            .tools(tools)
            .build()?;
        let assistant = self.client.assistants().create(request).await?;
        info!(assistant_id = %assistant.id, model = %self.model, "Assistant created");
        Ok(assistant.id)
    }

    async fn create_thread(&self) -> Result<String> {
        let thread = self
            .client
            .threads()
            .create(CreateThreadRequestArgs::default().build()?)
            .await?;
        Ok(thread.id)
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<()> {
        let request = CreateMessageRequestArgs::default()
            .role(MessageRole::User)
            .content(content)
            .build()?;
        self.client
            .threads()
            .messages(thread_id)
            .create(request)
            .await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunHandle> {
        let request = CreateRunRequestArgs::default()
            .assistant_id(assistant_id)
            .build()?;
        let run = self.client.threads().runs(thread_id).create(request).await?;
        info!(thread_id, run_id = %run.id, "Run created");
        Ok(RunHandle {
            thread_id: thread_id.to_string(),
            run_id: run.id,
        })
    }

    async fn retrieve_run(&self, run: &RunHandle) -> Result<RunStatus> {
        let object = self
            .client
            .threads()
            .runs(&run.thread_id)
            .retrieve(&run.run_id)
            .await?;
        debug!(run_id = %run.run_id, status = ?object.status, "Run retrieved");
        Ok(run_status_of(&object))
    }

    async fn submit_callback_results(
        &self,
        run: &RunHandle,
        results: Vec<CallbackResult>,
    ) -> Result<()> {
        let request = SubmitToolOutputsRunRequest {
            tool_outputs: results
                .into_iter()
                .map(|result| ToolsOutputs {
                    tool_call_id: Some(result.id),
                    output: Some(result.output),
                })
                .collect(),
            stream: None,
        };
        self.client
            .threads()
            .runs(&run.thread_id)
            .submit_tool_outputs(&run.run_id, request)
            .await?;
        Ok(())
    }

    async fn list_turns(&self, thread_id: &str) -> Result<Vec<ConversationTurn>> {
        let messages = self
            .client
            .threads()
            .messages(thread_id)
            .list(&[("limit", "100")])
            .await?;

        Ok(messages
            .data
            .into_iter()
            .map(|message| {
                let role = match message.role {
                    MessageRole::User => TurnRole::User,
                    MessageRole::Assistant => TurnRole::Assistant,
                };
                let content = message
                    .content
                    .into_iter()
                    .find_map(|part| match part {
                        MessageContent::Text(text) => Some(text.text.value),
                        _ => None,
                    })
                    .unwrap_or_default();
                ConversationTurn { role, content }
            })
            .collect())
    }
}

/// Sets up an assistant offering every registered function, posts `prompt`
/// to a fresh thread and starts a run on it.
pub async fn start_conversation(
    client: &dyn AssistantClient,
    registry: &FunctionRegistry,
    instructions: &str,
    prompt: &str,
) -> Result<RunHandle> {
    let assistant_id = client
        .create_assistant(instructions, &registry.specs())
        .await?;
    let thread_id = client.create_thread().await?;
    client.add_user_message(&thread_id, prompt).await?;
    client.create_run(&thread_id, &assistant_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_action_maps_to_callback_batch() {
        let action: RequiredAction = serde_json::from_value(serde_json::json!({
            "type": "submit_tool_outputs",
            "submit_tool_outputs": {
                "tool_calls": [
                    {"id": "call_a", "type": "function", "function": {"name": "create_presentation", "arguments": "{\"topic\":\"A\",\"num_slides\":\"2\"}"}},
                    {"id": "call_b", "type": "function", "function": {"name": "create_presentation", "arguments": "{\"topic\":\"B\",\"num_slides\":\"3\"}"}}
                ]
            }
        }))
        .unwrap();

        match map_run_status(&RemoteRunStatus::RequiresAction, Some(&action), None) {
            RunStatus::RequiresCallback(batch) => {
                let ids: Vec<_> = batch.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids, vec!["call_a", "call_b"]);
                assert_eq!(batch[0].function_name, "create_presentation");
                assert!(batch[1].arguments.contains("\"B\""));
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_status_mapping() {
        let status = |s: RemoteRunStatus| map_run_status(&s, None, None);
        assert_eq!(status(RemoteRunStatus::Queued), RunStatus::Queued);
        assert_eq!(status(RemoteRunStatus::InProgress), RunStatus::Running);
        assert_eq!(status(RemoteRunStatus::Cancelling), RunStatus::Running);
        assert_eq!(status(RemoteRunStatus::Completed), RunStatus::Completed);
        assert_eq!(
            status(RemoteRunStatus::Expired),
            RunStatus::Failed("expired".into())
        );
        assert_eq!(
            status(RemoteRunStatus::Cancelled),
            RunStatus::Failed("cancelled".into())
        );
        // requires_action without a payload has nothing to dispatch yet
        assert_eq!(status(RemoteRunStatus::RequiresAction), RunStatus::Running);
        assert_eq!(
            map_run_status(&RemoteRunStatus::Failed, None, Some("rate_limit_exceeded")),
            RunStatus::Failed("rate_limit_exceeded".into())
        );
    }

    #[test]
    fn test_turn_display() {
        let turn = ConversationTurn {
            role: TurnRole::Assistant,
            content: "Your deck is ready.".to_string(),
        };
        assert_eq!(turn.to_string(), "Assistant: Your deck is ready.");
    }
}
