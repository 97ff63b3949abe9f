use std::{future::Future, sync::Arc};

use tokio::{
    spawn,
    sync::{AcquireError, Semaphore},
    task::{JoinError, JoinSet},
};

/// A join set that runs at most `max_tasks` futures at once.
pub struct BoundedJoinSet<T> {
    semaphore: Arc<Semaphore>,
    join_set: JoinSet<T>,
}

impl<T: Send + 'static> BoundedJoinSet<T> {
    pub fn new(max_tasks: usize) -> Self {
        let semaphore = Arc::new(Semaphore::new(max_tasks.max(1)));
        let join_set = JoinSet::new();
        BoundedJoinSet {
            semaphore,
            join_set,
        }
    }

    /// Spawns `task` once a slot is free. If the task panics or is
    /// cancelled, `recover` turns the join error into a regular value so
    /// the caller still receives exactly one result per spawned task.
    pub async fn spawn_or_recover<F, R>(&mut self, task: F, recover: R) -> Result<(), AcquireError>
    where
        F: Future<Output = T> + Send + 'static,
        R: FnOnce(JoinError) -> T + Send + 'static,
    {
        let permit = self.semaphore.clone().acquire_owned().await?;
        self.join_set.spawn(async move {
            let value = match spawn(task).await {
                Ok(value) => value,
                Err(err) => recover(err),
            };

            drop(permit);
            value
        });

        Ok(())
    }

    pub async fn join_next(&mut self) -> Option<Result<T, JoinError>> {
        self.join_set.join_next().await
    }
}
