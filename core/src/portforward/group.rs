//! Wait-for-all task group with first-error capture.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::error::{ForwardError, Result};

/// Runs each future as an independent task.
///
/// [`TaskGroup::wait`] returns only after every task has finished. Failing
/// tasks do not cancel their siblings; the first error recorded wins.
pub struct TaskGroup<T> {
    handles: Vec<JoinHandle<Option<T>>>,
    first_error: Arc<Mutex<Option<ForwardError>>>,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            first_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn a task. Its result keeps its spawn position in [`TaskGroup::wait`].
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let first_error = self.first_error.clone();
        self.handles.push(tokio::spawn(async move {
            match task.await {
                Ok(value) => Some(value),
                Err(e) => {
                    first_error.lock().get_or_insert(e);
                    None
                }
            }
        }));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every task, then return all results in spawn order.
    pub async fn wait(self) -> Result<Vec<T>> {
        let joined = join_all(self.handles).await;

        if let Some(err) = self.first_error.lock().take() {
            return Err(err);
        }

        joined
            .into_iter()
            .map(|outcome| match outcome {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(ForwardError::TaskFailed(
                    "task failed without recording an error".to_string(),
                )),
                Err(e) => Err(ForwardError::TaskFailed(e.to_string())),
            })
            .collect()
    }
}

impl<T: Send + 'static> Default for TaskGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_spawn_order() {
        let mut group = TaskGroup::new();
        for (i, delay) in [30u64, 10, 20].into_iter().enumerate() {
            group.spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(i)
            });
        }
        assert_eq!(group.len(), 3);

        assert_eq!(group.wait().await.unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_all_tasks_finish_before_error_returns() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::new();

        group.spawn(async { Err(ForwardError::InvalidSource("first".to_string())) });
        for _ in 0..3 {
            let finished = finished.clone();
            group.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let err = group.wait().await.unwrap_err();
        assert!(matches!(err, ForwardError::InvalidSource(ref s) if s == "first"));
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_recorded_error_wins() {
        let mut group: TaskGroup<()> = TaskGroup::new();
        group.spawn(async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Err(ForwardError::InvalidSource("late".to_string()))
        });
        group.spawn(async { Err(ForwardError::InvalidSource("early".to_string())) });

        let err = group.wait().await.unwrap_err();
        assert!(matches!(err, ForwardError::InvalidSource(ref s) if s == "early"));
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let mut group: TaskGroup<()> = TaskGroup::new();
        let explode = true;
        group.spawn(async move {
            if explode {
                panic!("boom");
            }
            Ok(())
        });

        let err = group.wait().await.unwrap_err();
        assert!(matches!(err, ForwardError::TaskFailed(_)));
    }

    #[tokio::test]
    async fn test_empty_group() {
        let group: TaskGroup<u8> = TaskGroup::new();
        assert!(group.is_empty());
        assert!(group.wait().await.unwrap().is_empty());
    }
}
