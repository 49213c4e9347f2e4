use async_trait::async_trait;
use proctor_core::model::{QuizDefinition, QuizId, SubmissionOutcome, SubmissionRequest};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::QuizDataService;
use crate::config::GradingConfig;
use crate::error::QuizDataError;

/// JSON-over-HTTP client for the quiz-data service.
#[derive(Clone)]
pub struct HttpQuizDataService {
    client: Client,
    config: GradingConfig,
}

impl HttpQuizDataService {
    /// # Errors
    ///
    /// Returns `QuizDataError::Http` if the HTTP client cannot be built.
    pub fn new(config: GradingConfig) -> Result<Self, QuizDataError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, QuizDataError> {
        if !response.status().is_success() {
            return Err(QuizDataError::HttpStatus(response.status()));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl QuizDataService for HttpQuizDataService {
    async fn fetch_quiz(&self, id: QuizId) -> Result<QuizDefinition, QuizDataError> {
        let url = self.config.endpoint(&format!("quizzes/{id}"))?;
        let response = self.authorize(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(QuizDataError::NotFound(id));
        }
        Self::decode(response).await
    }

    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionOutcome, QuizDataError> {
        let url = self
            .config
            .endpoint(&format!("quizzes/{}/submissions", request.quiz_id))?;
        let response = self
            .authorize(self.client.post(url))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }
}
