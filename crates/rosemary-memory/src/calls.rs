// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deadline-bound wrappers around provider calls.
//!
//! Every embedding and completion request made by the engine goes through
//! these helpers so a hung provider surfaces as [`RosemaryError::Timeout`].

use std::future::Future;
use std::time::Duration;

use rosemary_core::types::{CompletionRequest, EmbeddingInput};
use rosemary_core::{CompletionAdapter, EmbeddingAdapter, RosemaryError};

/// Runs `fut` with a deadline.
pub async fn with_deadline<T, F>(
    operation: &str,
    duration: Duration,
    fut: F,
) -> Result<T, RosemaryError>
where
    F: Future<Output = Result<T, RosemaryError>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(RosemaryError::Timeout {
            operation: operation.to_string(),
            duration,
        }),
    }
}

/// Embeds one text and checks the vector against the provider's declared width.
pub async fn embed_one(
    embedder: &dyn EmbeddingAdapter,
    text: &str,
    operation: &str,
    deadline: Duration,
) -> Result<Vec<f32>, RosemaryError> {
    let input = EmbeddingInput {
        texts: vec![text.to_string()],
    };
    let output = with_deadline(operation, deadline, embedder.embed(input)).await?;
    let vector = output.embeddings.into_iter().next().ok_or_else(|| {
        RosemaryError::provider(format!("{operation}: embedding provider returned no vectors"))
    })?;
    let expected = embedder.dimensions();
    if vector.len() != expected {
        return Err(RosemaryError::Config(format!(
            "{operation}: embedding has {} dimensions, provider `{}` declares {expected}",
            vector.len(),
            embedder.name()
        )));
    }
    Ok(vector)
}

/// Sends a completion request and returns the trimmed reply text.
pub async fn complete_text(
    completion: &dyn CompletionAdapter,
    request: CompletionRequest,
    deadline: Duration,
) -> Result<String, RosemaryError> {
    let operation = request.purpose.to_string();
    let response = with_deadline(&operation, deadline, completion.complete(request)).await?;
    Ok(response.text.trim().to_string())
}

/// Shortens text for log fields and error messages.
pub fn preview(text: &str) -> String {
    const MAX: usize = 48;
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX {
        flat
    } else {
        let cut: String = flat.chars().take(MAX - 3).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_elapses_into_timeout_error() {
        let result: Result<(), RosemaryError> = with_deadline(
            "embed",
            Duration::from_secs(2),
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            },
        )
        .await;
        match result {
            Err(RosemaryError::Timeout {
                operation,
                duration,
            }) => {
                assert_eq!(operation, "embed");
                assert_eq!(duration, Duration::from_secs(2));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_passes_through_result() {
        let value = with_deadline("x", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\n b"), "a b");
        let long = "word ".repeat(30);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 48);
    }
}
