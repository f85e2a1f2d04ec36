//! A routing completion client for orchestration tests.

use std::sync::Mutex;

use anonplay_ai::schema::{PRIVACY_SCHEMA_NAME, UTILITY_SCHEMA_NAME};
use anonplay_ai::{AiError, CompletionClient, CompletionRequest};
use async_trait::async_trait;
use serde_json::{Map, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Privacy,
    Utility,
    Rewrite,
}

impl Kind {
    fn of(request: &CompletionRequest) -> Self {
        match request.schema_name() {
            Some(PRIVACY_SCHEMA_NAME) => Kind::Privacy,
            Some(UTILITY_SCHEMA_NAME) => Kind::Utility,
            _ => Kind::Rewrite,
        }
    }
}

type Handler = Box<dyn Fn(Kind, &CompletionRequest, usize) -> Result<String, AiError> + Send + Sync>;

/// Answers each request by kind and logs every call in arrival order.
///
/// The handler also receives how many calls of that kind came before.
pub struct Routed {
    handler: Handler,
    pub log: Mutex<Vec<(Kind, String)>>,
}

impl Routed {
    pub fn new(
        handler: impl Fn(Kind, &CompletionRequest, usize) -> Result<String, AiError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Well-formed answers for every kind.
    pub fn happy() -> Self {
        Self::new(|kind, request, _| Ok(answer(kind, request)))
    }

    pub fn kinds(&self) -> Vec<Kind> {
        self.log.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    pub fn count(&self, kind: Kind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn inputs(&self, kind: Kind) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, input)| input.clone())
            .collect()
    }
}

/// A well-formed answer: confident guesses for every requested attribute, a
/// high utility verdict, or a delimited rewrite.
pub fn answer(kind: Kind, request: &CompletionRequest) -> String {
    match kind {
        Kind::Privacy => privacy_answer(request),
        Kind::Utility => json!({
            "readability": { "explanation": "clear", "score": 9 },
            "meaning": { "explanation": "kept", "score": 8 },
            "hallucinations": { "explanation": "none", "score": 1 },
        })
        .to_string(),
        Kind::Rewrite => "Generalize the city.\n#\nI live somewhere.".to_string(),
    }
}

fn privacy_answer(request: &CompletionRequest) -> String {
    let schema = &request.schema.as_ref().unwrap().schema;
    let mut body = Map::new();
    for attribute in schema["required"].as_array().unwrap() {
        let name = attribute.as_str().unwrap();
        let value = if name == "age" { json!([30, 40]) } else { json!(["guess"]) };
        body.insert(
            name.to_string(),
            json!({ "inference": "from the text", "value": value, "confidence": 4 }),
        );
    }
    serde_json::Value::Object(body).to_string()
}

#[async_trait]
impl CompletionClient for Routed {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        let kind = Kind::of(request);
        let seen = {
            let mut log = self.log.lock().unwrap();
            let seen = log.iter().filter(|(k, _)| *k == kind).count();
            log.push((kind, request.input.clone()));
            seen
        };
        (self.handler)(kind, request, seen)
    }
}
