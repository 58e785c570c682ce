use std::future::Future;

/// A fixed number of attempts shared across any number of `retry` calls.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    remaining: usize,
    used: usize,
}

impl RetryBudget {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            remaining: max_attempts,
            used: 0,
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Runs `attempt` until it yields a value or the budget runs dry.
    /// Failed attempts are spent; a successful one is spent too.
    pub async fn retry<T, F, Fut>(&mut self, mut attempt: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        while self.remaining > 0 {
            self.remaining -= 1;
            self.used += 1;
            if let Some(value) = attempt().await {
                return Some(value);
            }
        }
        None
    }
}

pub async fn retry<T, F, Fut>(max_attempts: usize, attempt: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    RetryBudget::new(max_attempts).retry(attempt).await
}
