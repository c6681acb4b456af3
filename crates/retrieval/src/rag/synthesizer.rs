//! Grounded answer generation over retrieved incident chunks.

use crate::rag::types::{Answer, RetrievalResult};
use incidex_core::{AppError, AppResult};
use incidex_llm::{ClientFactory, LlmClient, LlmRequest};
use incidex_prompt::{build_answer_prompt, PromptTemplate};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// An immutable model/client pair. Replaced whole on a model switch.
pub struct Generator {
    model_id: String,
    client: Arc<dyn LlmClient>,
}

impl Generator {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("model_id", &self.model_id)
            .field("provider", &self.client.provider_name())
            .finish()
    }
}

pub struct Synthesizer {
    factory: Arc<dyn ClientFactory>,
    template: PromptTemplate,
    active: RwLock<Arc<Generator>>,
    switch_gate: tokio::sync::Mutex<()>,
    timeout: Duration,
    temperature: Option<f32>,
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("template", &self.template.id)
            .field("active_model", &self.active_model())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Synthesizer {
    /// Create a synthesizer with `default_model` active.
    ///
    /// # Errors
    /// `ProviderInit` if the factory cannot produce a client for the model.
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        default_model: &str,
        template: PromptTemplate,
        timeout: Duration,
    ) -> AppResult<Self> {
        let generator = Self::make_generator(factory.as_ref(), default_model)?;
        Ok(Self {
            factory,
            template,
            active: RwLock::new(Arc::new(generator)),
            switch_gate: tokio::sync::Mutex::new(()),
            timeout,
            temperature: None,
        })
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn active_model(&self) -> String {
        self.current().model_id.clone()
    }

    /// Answer `question` from the retrieved chunks using `model_id`, or the
    /// active model when none is given.
    #[instrument(skip(self, question, retrieval), fields(chunks = retrieval.len()))]
    pub async fn synthesize(
        &self,
        question: &str,
        retrieval: &RetrievalResult,
        model_id: Option<&str>,
    ) -> AppResult<Answer> {
        // Captured once; a concurrent switch does not affect this request.
        let generator = self.generator_for(model_id).await?;

        let context = retrieval.context();
        let prompt = build_answer_prompt(&self.template, &context, question)?;

        let mut request = LlmRequest::new(prompt, generator.model_id.clone());
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        debug!(
            model = %generator.model_id,
            context_chars = context.len(),
            "Sending generation request"
        );

        let response = tokio::time::timeout(self.timeout, generator.client.complete(&request))
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "generation with '{}' exceeded {:?}",
                    generator.model_id, self.timeout
                ))
            })?
            .map_err(|e| match e {
                AppError::Generation(msg) => AppError::Generation(msg),
                other => AppError::Generation(format!(
                    "model '{}' failed: {}",
                    generator.model_id, other
                )),
            })?;

        let Some(text) = response.answer() else {
            warn!(model = %generator.model_id, "Generation returned an empty answer");
            return Err(AppError::Generation(format!(
                "model '{}' returned an empty answer",
                generator.model_id
            )));
        };
        debug!(
            model = %generator.model_id,
            tokens = ?response.total_tokens(),
            "Generation complete"
        );

        Ok(Answer {
            text: text.to_string(),
            model: generator.model_id.clone(),
        })
    }

    /// Make `model_id` the active model.
    pub async fn switch_model(&self, model_id: &str) -> AppResult<()> {
        self.generator_for(Some(model_id)).await.map(|_| ())
    }

    async fn generator_for(&self, model_id: Option<&str>) -> AppResult<Arc<Generator>> {
        let current = self.current();
        let wanted = match model_id {
            Some(id) if id != current.model_id => id,
            _ => return Ok(current),
        };

        let _gate = self.switch_gate.lock().await;

        // Someone else may have switched to the same model while we waited.
        let current = self.current();
        if current.model_id == wanted {
            return Ok(current);
        }

        let generator = Arc::new(Self::make_generator(self.factory.as_ref(), wanted)?);
        *self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = generator.clone();

        info!(from = %current.model_id, to = %wanted, "Switched generation model");
        Ok(generator)
    }

    fn current(&self) -> Arc<Generator> {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn make_generator(factory: &dyn ClientFactory, model_id: &str) -> AppResult<Generator> {
        let client = factory.create(model_id).map_err(|e| match e {
            AppError::ProviderInit(msg) => AppError::ProviderInit(msg),
            other => AppError::ProviderInit(format!(
                "could not create client for '{}': {}",
                model_id, other
            )),
        })?;

        Ok(Generator {
            model_id: model_id.to_string(),
            client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::rag::types::RetrievedChunk;
    use incidex_llm::{MockBehavior, MockLlmClient};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Hands out one recording mock per model id and counts creations.
    #[derive(Default)]
    struct RecordingFactory {
        clients: Mutex<HashMap<String, Arc<MockLlmClient>>>,
        created: Mutex<Vec<String>>,
    }

    impl RecordingFactory {
        fn client(&self, model: &str) -> Arc<MockLlmClient> {
            self.clients.lock().unwrap()[model].clone()
        }

        fn created(&self) -> Vec<String> {
            self.created.lock().unwrap().clone()
        }
    }

    impl ClientFactory for RecordingFactory {
        fn create(&self, model_id: &str) -> AppResult<Arc<dyn LlmClient>> {
            if model_id.is_empty() {
                return Err(AppError::ProviderInit("empty model".to_string()));
            }
            self.created.lock().unwrap().push(model_id.to_string());
            let client = Arc::new(MockLlmClient::new());
            self.clients
                .lock()
                .unwrap()
                .insert(model_id.to_string(), client.clone());
            Ok(client)
        }
    }

    /// Factory producing a single canned client.
    struct FixedFactory(Arc<MockLlmClient>);

    impl ClientFactory for FixedFactory {
        fn create(&self, _model_id: &str) -> AppResult<Arc<dyn LlmClient>> {
            Ok(self.0.clone())
        }
    }

    fn retrieval() -> RetrievalResult {
        RetrievalResult {
            hits: vec![
                RetrievedChunk {
                    chunk: Chunk::new("Incident ID: 1\nType: Flood\nLocation: Kottara", 1, 0),
                    distance: 0.2,
                },
                RetrievedChunk {
                    chunk: Chunk::new("Incident ID: 5\nType: Flood\nLocation: Jeppu", 5, 0),
                    distance: 0.3,
                },
            ],
        }
    }

    fn synthesizer(factory: Arc<dyn ClientFactory>) -> Synthesizer {
        Synthesizer::new(
            factory,
            "mistral",
            PromptTemplate::incident_answer(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_prompt_carries_context_in_order() {
        let factory = Arc::new(RecordingFactory::default());
        let synth = synthesizer(factory.clone());

        let answer = synth
            .synthesize("Where did floods happen?", &retrieval(), None)
            .await
            .unwrap();
        assert_eq!(answer.model, "mistral");
        assert!(answer.text.contains("2 incident section"));

        let requests = factory.client("mistral").requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].prompt;
        assert!(prompt.contains(
            "Location: Kottara\n\nIncident ID: 5\nType: Flood\nLocation: Jeppu"
        ));
        assert!(prompt.contains("Where did floods happen?"));
    }

    #[tokio::test]
    async fn test_switch_model_uses_new_model_exclusively() {
        let factory = Arc::new(RecordingFactory::default());
        let synth = synthesizer(factory.clone());

        synth.synthesize("floods?", &retrieval(), None).await.unwrap();
        synth.switch_model("llama2").await.unwrap();
        assert_eq!(synth.active_model(), "llama2");

        let answer = synth.synthesize("floods?", &retrieval(), None).await.unwrap();
        assert_eq!(answer.model, "llama2");

        let llama = factory.client("llama2").requests();
        assert_eq!(llama.len(), 1);
        assert_eq!(llama[0].model, "llama2");
        assert_eq!(factory.client("mistral").requests().len(), 1);
    }

    #[tokio::test]
    async fn test_same_model_does_not_rebuild_client() {
        let factory = Arc::new(RecordingFactory::default());
        let synth = synthesizer(factory.clone());

        synth
            .synthesize("floods?", &retrieval(), Some("mistral"))
            .await
            .unwrap();
        synth.switch_model("mistral").await.unwrap();
        assert_eq!(factory.created(), vec!["mistral".to_string()]);
    }

    #[tokio::test]
    async fn test_bad_model_is_provider_init_and_keeps_active() {
        let factory = Arc::new(RecordingFactory::default());
        let synth = synthesizer(factory);

        let err = synth.switch_model("").await.unwrap_err();
        assert!(matches!(err, AppError::ProviderInit(_)));
        assert_eq!(synth.active_model(), "mistral");
    }

    #[tokio::test]
    async fn test_empty_answer_is_generation_error() {
        let client = Arc::new(MockLlmClient::with_behavior(MockBehavior::Fixed(
            "   \n".to_string(),
        )));
        let synth = synthesizer(Arc::new(FixedFactory(client)));

        let err = synth
            .synthesize("floods?", &retrieval(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Generation(_)));
    }

    #[tokio::test]
    async fn test_runtime_failure_is_generation_error() {
        let client = Arc::new(MockLlmClient::with_behavior(MockBehavior::Fail(
            "model not found".to_string(),
        )));
        let synth = synthesizer(Arc::new(FixedFactory(client)));

        let err = synth
            .synthesize("floods?", &retrieval(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Generation(ref m) if m.contains("model not found")));
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let client = Arc::new(MockLlmClient::new().with_delay(Duration::from_secs(5)));
        let synth = Synthesizer::new(
            Arc::new(FixedFactory(client)),
            "mistral",
            PromptTemplate::incident_answer(),
            Duration::from_millis(50),
        )
        .unwrap();

        let err = synth
            .synthesize("floods?", &retrieval(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        assert!(err.is_retryable());
    }
}
