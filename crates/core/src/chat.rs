//! Single-shot function calling over chat completions.
//!
//! The user's request is sent once with every registered function offered
//! as a tool. If the model answers with tool calls, they are executed
//! locally, appended to the conversation, and a second completion produces
//! the final reply.

use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolArgs, FunctionObjectArgs,
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::llm_client::{LLMAction, LLMClient, LLMStreamEvent};
use crate::registry::FunctionRegistry;

pub const DEFAULT_PROMPT: &str =
    "I want to create presentation for topic Pollution which contains 5 slides";

pub struct ChatFlow {
    llm: Arc<dyn LLMClient>,
    registry: Arc<FunctionRegistry>,
}

impl ChatFlow {
    pub fn new(llm: Arc<dyn LLMClient>, registry: Arc<FunctionRegistry>) -> Self {
        Self { llm, registry }
    }

    fn tools(&self) -> Result<Vec<ChatCompletionTool>> {
        self.registry
            .specs()
            .into_iter()
            .map(|spec| -> Result<ChatCompletionTool> {
                Ok(ChatCompletionToolArgs::default()
                    .function(
                        FunctionObjectArgs::default()
                            .name(spec.name)
                            .description(spec.description)
                            .parameters(spec.parameters)
                            .build()?,
                    )
                    .build()?)
            })
            .collect()
    }

    /// Sends `prompt`, runs any requested functions and returns the final reply.
    pub async fn run(&self, prompt: &str) -> Result<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into(),
        ];

        let tool_calls = match self.llm.decide_action(messages.clone(), self.tools()?).await? {
            LLMAction::TextResponse(text) => return Ok(text),
            LLMAction::ToolCall(tool_calls) => tool_calls,
        };

        for call in &tool_calls {
            self.registry.ensure_known(&call.function.name)?;
        }
        let mut outputs = Vec::with_capacity(tool_calls.len());
        for call in &tool_calls {
            info!(
                function = %call.function.name,
                arguments = %call.function.arguments,
                "Model requested a function"
            );
            outputs.push(
                self.registry
                    .call(&call.function.name, &call.function.arguments)
                    .await?,
            );
        }

        messages.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .tool_calls(tool_calls.clone())
                .build()?
                .into(),
        );
        for (call, output) in tool_calls.iter().zip(outputs) {
            messages.push(
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(call.id.clone())
                    .content(output)
                    .build()?
                    .into(),
            );
        }

        let mut reply = String::new();
        let mut stream = self.llm.stream_after_tools(messages).await?;
        while let Some(event) = stream.next().await {
            let LLMStreamEvent::TextChunk(chunk) = event?;
            reply.push_str(&chunk);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeckError;
    use crate::llm_client::{LLMStream, ToolCall};
    use crate::registry::Function;
    use async_trait::async_trait;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::Mutex;

    struct FakeLLM {
        action: LLMAction,
        follow_up: Vec<&'static str>,
        decide_tools: Mutex<Vec<String>>,
        follow_up_history: Mutex<Option<Vec<ChatCompletionRequestMessage>>>,
    }

    impl FakeLLM {
        fn new(action: LLMAction, follow_up: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                action,
                follow_up,
                decide_tools: Mutex::new(Vec::new()),
                follow_up_history: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LLMClient for FakeLLM {
        async fn decide_action(
            &self,
            _messages: Vec<ChatCompletionRequestMessage>,
            tools: Vec<ChatCompletionTool>,
        ) -> Result<LLMAction> {
            *self.decide_tools.lock().unwrap() =
                tools.into_iter().map(|t| t.function.name).collect();
            Ok(self.action.clone())
        }

        async fn stream_after_tools(
            &self,
            history: Vec<ChatCompletionRequestMessage>,
        ) -> Result<LLMStream> {
            *self.follow_up_history.lock().unwrap() = Some(history);
            let chunks: Vec<_> = self
                .follow_up
                .iter()
                .map(|c| Ok(LLMStreamEvent::TextChunk(c.to_string())))
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    #[derive(Deserialize, JsonSchema)]
    struct TopicArgs {
        topic: String,
    }

    struct Deck;

    #[async_trait]
    impl Function for Deck {
        type Args = TopicArgs;
        const NAME: &'static str = "create_presentation";
        const DESCRIPTION: &'static str = "test double";

        async fn invoke(&self, args: TopicArgs) -> Result<String> {
            Ok(format!("powerpoint-ppt/{}.pptx", args.topic))
        }
    }

    fn registry() -> Arc<FunctionRegistry> {
        let mut registry = FunctionRegistry::new();
        registry.register(Deck);
        Arc::new(registry)
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "type": "function",
            "function": {"name": name, "arguments": arguments}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_text_response_is_returned_directly() {
        let llm = FakeLLM::new(LLMAction::TextResponse("Which topic?".into()), vec![]);
        let flow = ChatFlow::new(llm.clone(), registry());

        assert_eq!(flow.run(DEFAULT_PROMPT).await.unwrap(), "Which topic?");
        assert_eq!(*llm.decide_tools.lock().unwrap(), vec!["create_presentation"]);
        assert!(llm.follow_up_history.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tool_call_result_is_fed_back() {
        let llm = FakeLLM::new(
            LLMAction::ToolCall(vec![tool_call(
                "call_9",
                "create_presentation",
                r#"{"topic":"Pollution"}"#,
            )]),
            vec!["Saved to ", "powerpoint-ppt/Pollution.pptx"],
        );
        let flow = ChatFlow::new(llm.clone(), registry());

        let reply = flow.run(DEFAULT_PROMPT).await.unwrap();
        assert_eq!(reply, "Saved to powerpoint-ppt/Pollution.pptx");

        let history = llm.follow_up_history.lock().unwrap().clone().unwrap();
        assert_eq!(history.len(), 3);
        assert!(matches!(history[1], ChatCompletionRequestMessage::Assistant(_)));
        match &history[2] {
            ChatCompletionRequestMessage::Tool(tool) => assert_eq!(tool.tool_call_id, "call_9"),
            other => panic!("expected tool message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fatal() {
        let llm = FakeLLM::new(
            LLMAction::ToolCall(vec![tool_call("call_1", "create_presentations", "{}")]),
            vec!["never"],
        );
        let flow = ChatFlow::new(llm.clone(), registry());

        let err = flow.run(DEFAULT_PROMPT).await.unwrap_err();
        assert!(matches!(err, DeckError::UnknownCallback(_)));
        assert!(llm.follow_up_history.lock().unwrap().is_none());
    }
}
