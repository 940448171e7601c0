use askdb::llm::{CompletionClient, LlmError};
use askdb::pipeline::{Pipeline, PipelineOptions};
use askdb::schema::SchemaDescriptor;
use askdb::store::Store;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Completion client that replays canned replies and records prompts.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(user.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::Empty))
    }
}

pub fn seeded_store() -> Store {
    Store::in_memory(&SchemaDescriptor::products()).unwrap()
}

pub fn pipeline_with(client: Arc<ScriptedClient>, store: Store) -> Pipeline {
    Pipeline::new(
        client,
        Arc::new(SchemaDescriptor::products()),
        store,
        PipelineOptions::default(),
    )
}
