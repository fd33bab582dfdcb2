use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::runtime::client::{CompletionClient, CompletionRequest, complete};
use crate::runtime::sanitize::sanitize;
use crate::runtime::types::{CompletionError, ModelAttempt, ModelDescriptor, SequenceError};

/// Trial order for a task: `preferred` first, then every candidate in its
/// configured order, each name at most once.
pub fn candidate_order(preferred: &str, candidates: &[String]) -> Vec<String> {
    let mut order = vec![preferred.to_owned()];
    for name in candidates {
        if !order.iter().any(|seen| seen == name) {
            order.push(name.clone());
        }
    }
    order
}

/// Output of the first model that produced acceptable text.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequenced<T> {
    pub model: String,
    pub output: T,
    /// Models that failed before the successful one, in trial order.
    pub failures: Vec<ModelAttempt>,
}

/// Tries models strictly one after another until one succeeds.
///
/// Each attempt is: completion call, sanitize, then the caller's `decode`.
/// Any failure moves on to the next model, except cancellation which ends
/// the sequence immediately. A slow model consumes its whole timeout before
/// the next one starts.
#[derive(Clone)]
pub struct FallbackSequencer {
    client: Arc<dyn CompletionClient>,
}

impl std::fmt::Debug for FallbackSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FallbackSequencer")
    }
}

impl FallbackSequencer {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub async fn run<T, F>(
        &self,
        models: &[ModelDescriptor],
        request: &CompletionRequest,
        mut cancel: watch::Receiver<bool>,
        decode: F,
    ) -> Result<Sequenced<T>, SequenceError>
    where
        F: Fn(&str) -> Result<T, String>,
    {
        let mut failures = Vec::new();

        for (idx, model) in models.iter().enumerate() {
            info!(
                model = %model.name,
                attempt = idx + 1,
                of = models.len(),
                "trying model"
            );

            let outcome = complete(self.client.as_ref(), model, request, &mut cancel)
                .await
                .and_then(|raw| sanitize(&raw))
                .and_then(|text| decode(&text).map_err(CompletionError::Rejected));

            match outcome {
                Ok(output) => {
                    info!(model = %model.name, attempt = idx + 1, "model succeeded");
                    return Ok(Sequenced {
                        model: model.name.clone(),
                        output,
                        failures,
                    });
                }
                Err(CompletionError::Cancelled) => {
                    failures.push(ModelAttempt {
                        model: model.name.clone(),
                        error: CompletionError::Cancelled,
                    });
                    return Err(SequenceError::Cancelled { attempts: failures });
                }
                Err(error) => {
                    warn!(model = %model.name, attempt = idx + 1, %error, "model failed");
                    failures.push(ModelAttempt {
                        model: model.name.clone(),
                        error,
                    });
                }
            }
        }

        warn!(tried = failures.len(), "all models failed");
        Err(SequenceError::AllModelsFailed { attempts: failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::runtime::client::GenerationOptions;

    /// Replies with a canned result per model and records call order.
    struct Canned {
        replies: Vec<(&'static str, Result<&'static str, CompletionError>)>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionClient for Canned {
        async fn generate(
            &self,
            model: &str,
            _request: &CompletionRequest,
        ) -> Result<String, CompletionError> {
            self.calls.lock().unwrap().push(model.to_owned());
            match self.replies.iter().find(|(name, _)| *name == model) {
                Some((_, reply)) => reply.clone().map(str::to_owned),
                None => Err(CompletionError::ServiceError { status: 404 }),
            }
        }
    }

    fn canned(
        replies: Vec<(&'static str, Result<&'static str, CompletionError>)>,
    ) -> Arc<Canned> {
        Arc::new(Canned {
            replies,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn models(names: &[&str]) -> Vec<ModelDescriptor> {
        names
            .iter()
            .map(|n| ModelDescriptor::new(*n, Duration::from_secs(1)))
            .collect()
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new("prompt", GenerationOptions::default())
    }

    fn identity(text: &str) -> Result<String, String> {
        Ok(text.to_owned())
    }

    #[test]
    fn order_puts_preferred_first_without_duplicates() {
        let candidates = vec!["a".to_owned(), "b".to_owned(), "a".to_owned(), "c".to_owned()];
        assert_eq!(candidate_order("b", &candidates), vec!["b", "a", "c"]);
        assert_eq!(candidate_order("z", &[]), vec!["z"]);
    }

    #[tokio::test]
    async fn first_success_stops_the_sequence() {
        let client = canned(vec![("a", Ok("alpha")), ("b", Ok("beta"))]);
        let (_tx, rx) = watch::channel(false);
        let out = FallbackSequencer::new(client.clone())
            .run(&models(&["a", "b"]), &request(), rx, identity)
            .await
            .expect("sequence");

        assert_eq!(out.model, "a");
        assert_eq!(out.output, "alpha");
        assert_eq!(*client.calls.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn reasoning_only_reply_falls_through() {
        let client = canned(vec![("a", Ok("<think>only</think>")), ("b", Ok("beta"))]);
        let (_tx, rx) = watch::channel(false);
        let out = FallbackSequencer::new(client.clone())
            .run(&models(&["a", "b"]), &request(), rx, identity)
            .await
            .expect("sequence");

        assert_eq!(out.output, "beta");
        assert_eq!(
            out.failures,
            vec![ModelAttempt {
                model: "a".to_owned(),
                error: CompletionError::EmptyAfterSanitize
            }]
        );
    }

    #[tokio::test]
    async fn rejected_output_falls_through() {
        let client = canned(vec![("a", Ok("not json")), ("b", Ok("42"))]);
        let (_tx, rx) = watch::channel(false);
        let out = FallbackSequencer::new(client)
            .run(&models(&["a", "b"]), &request(), rx, |t| {
                t.parse::<u32>().map_err(|e| e.to_string())
            })
            .await
            .expect("sequence");
        assert_eq!(out.output, 42);
        assert!(matches!(out.failures[0].error, CompletionError::Rejected(_)));
    }

    #[tokio::test]
    async fn exhaustion_reports_every_attempt_in_order() {
        let client = canned(vec![
            ("a", Err(CompletionError::TransportError("refused".into()))),
            ("b", Err(CompletionError::ServiceError { status: 500 })),
        ]);
        let (_tx, rx) = watch::channel(false);
        let err = FallbackSequencer::new(client)
            .run(&models(&["a", "b"]), &request(), rx, identity)
            .await
            .unwrap_err();

        let names: Vec<_> = err.attempts().iter().map(|a| a.model.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(matches!(err, SequenceError::AllModelsFailed { .. }));
        assert_eq!(
            err.to_string(),
            "all models failed: a: transport error: refused; b: service returned HTTP 500"
        );
    }

    #[tokio::test]
    async fn raised_cancel_flag_stops_before_any_call() {
        let client = canned(vec![("a", Ok("alpha"))]);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let err = FallbackSequencer::new(client.clone())
            .run(&models(&["a", "b"]), &request(), rx, identity)
            .await
            .unwrap_err();

        assert!(matches!(err, SequenceError::Cancelled { .. }));
        assert!(client.calls.lock().unwrap().is_empty());
    }
}
