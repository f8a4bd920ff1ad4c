use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Currently connected command clients. Membership only; clients are not
/// coordinated with each other.
#[derive(Debug, Clone, Default)]
pub struct ClientSet {
    inner: Arc<Mutex<BTreeMap<u64, SocketAddr>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer; it is removed again when the guard drops.
    pub fn join(&self, peer: SocketAddr) -> ClientGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, peer);
        ClientGuard { set: self.clone(), id }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn peers(&self) -> Vec<SocketAddr> {
        self.lock().values().copied().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, SocketAddr>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct ClientGuard {
    set: ClientSet,
    id: u64,
}

impl ClientGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_track_membership() {
        let set = ClientSet::new();
        let a: SocketAddr = "10.0.0.2:5000".parse().unwrap();
        let b: SocketAddr = "10.0.0.3:5000".parse().unwrap();

        let ga = set.join(a);
        let gb = set.join(b);
        assert_ne!(ga.id(), gb.id());
        assert_eq!(set.peers(), vec![a, b]);

        drop(ga);
        assert_eq!(set.peers(), vec![b]);
        drop(gb);
        assert!(set.is_empty());
    }

    #[test]
    fn same_peer_twice_counts_twice() {
        let set = ClientSet::new();
        let a: SocketAddr = "10.0.0.2:5000".parse().unwrap();
        let _g1 = set.join(a);
        let _g2 = set.join(a);
        assert_eq!(set.len(), 2);
    }
}
