use tokio::sync::{Mutex, MutexGuard};

const STRIPES: usize = 64;

/// A striped lock set keyed by transaction/order id.
///
/// Operations on the same id are serialized; distinct ids proceed in parallel unless they share a
/// stripe. The fixed array cannot leak, unlike a lazily grown lock map with delete-on-unlock.
pub(crate) struct LockSet {
    stripes: Vec<Mutex<()>>,
}

impl LockSet {
    pub fn new() -> Self {
        Self { stripes: (0..STRIPES).map(|_| Mutex::new(())).collect() }
    }

    pub async fn lock(&self, id: i64) -> MutexGuard<'_, ()> {
        let index = id.rem_euclid(STRIPES as i64) as usize;
        self.stripes[index].lock().await
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn same_id_is_serialized() {
        let locks = Arc::new(LockSet::new());
        let guard = locks.lock(42).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(42).await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn distinct_stripes_do_not_contend() {
        let locks = LockSet::new();
        let _first = locks.lock(1).await;
        let _second = locks.lock(2).await;
    }
}
