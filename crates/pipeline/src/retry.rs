use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Run `op` up to `max_attempts` times (at least once), returning the first
/// success or the last error. `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(max_attempts: u32, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                warn!(attempt, max_attempts, error = %e, "{} failed, retrying", label);
                attempt += 1;
            }
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "{} failed, giving up", label);
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn succeeds_on_second_attempt() {
        let calls = Cell::new(0);
        let result: Result<u32, String> = retry(2, "fetch", |attempt| {
            calls.set(calls.get() + 1);
            async move {
                if attempt == 1 {
                    Err("boom".to_string())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn returns_last_error_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), String> = retry(2, "fetch", |attempt| {
            calls.set(calls.get() + 1);
            async move { Err(format!("failure {attempt}")) }
        })
        .await;
        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = Cell::new(0);
        let result: Result<(), &str> = retry(0, "fetch", |_| {
            calls.set(calls.get() + 1);
            async { Err("nope") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
