use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use catalog_core::{CatalogEntry, ManagerNode, PlatformApi, SessionToken};

/// What the dashboard has already shown one browser session.
///
/// Later requests name managers and events; they are resolved against this
/// view instead of being trusted from the form.
#[derive(Default)]
struct SessionView {
    managers: Vec<ManagerNode>,
    catalogs: HashMap<String, Vec<CatalogEntry>>,
}

/// One browser session and its platform handle.
pub struct Session {
    token: SessionToken,
    client: Arc<dyn PlatformApi>,
    created_at: DateTime<Utc>,
    last_seen: AtomicU64,
    view: RwLock<SessionView>,
}

impl Session {
    fn new(token: SessionToken, client: Arc<dyn PlatformApi>) -> Self {
        Self {
            token,
            client,
            created_at: Utc::now(),
            last_seen: AtomicU64::new(now_millis()),
            view: RwLock::new(SessionView::default()),
        }
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn client(&self) -> &Arc<dyn PlatformApi> {
        &self.client
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.is_authenticated()
    }

    pub fn touch(&self) {
        self.last_seen.store(now_millis(), Ordering::Relaxed);
    }

    fn idle(&self) -> Duration {
        let last = self.last_seen.load(Ordering::Relaxed);
        Duration::from_millis(now_millis().saturating_sub(last))
    }

    /// Replace the manager list. Catalogs fetched for the old list are dropped.
    pub fn set_managers(&self, managers: Vec<ManagerNode>) {
        let mut view = self.view.write();
        view.managers = managers;
        view.catalogs.clear();
    }

    pub fn managers(&self) -> Vec<ManagerNode> {
        self.view.read().managers.clone()
    }

    /// Look up a manager previously listed for this session.
    pub fn manager(&self, name: &str) -> Option<ManagerNode> {
        self.view
            .read()
            .managers
            .iter()
            .find(|m| m.name == name)
            .cloned()
    }

    pub fn store_catalog(&self, manager: &str, entries: Vec<CatalogEntry>) {
        self.view.write().catalogs.insert(manager.to_string(), entries);
    }

    /// Look up an event in the catalog last shown for `manager`.
    pub fn catalog_entry(&self, manager: &str, event: &str) -> Option<CatalogEntry> {
        self.view
            .read()
            .catalogs
            .get(manager)?
            .iter()
            .find(|e| e.name() == event)
            .cloned()
    }

    /// Drop the access token and everything fetched with it.
    pub fn sign_out(&self) {
        self.client.clear_access_token();
        *self.view.write() = SessionView::default();
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Registry of live browser sessions, keyed by opaque token.
pub struct SessionRegistry {
    sessions: DashMap<SessionToken, Arc<Session>>,
    /// Serializes admission so the capacity check, eviction and insert of
    /// one `create` cannot interleave with another's.
    admission: Mutex<()>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            admission: Mutex::new(()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Register a fresh session around `client`.
    ///
    /// At capacity, expired sessions are swept first. Then signed-out
    /// sessions are evicted before signed-in ones, least recently seen first.
    pub fn create(&self, client: Arc<dyn PlatformApi>) -> Arc<Session> {
        let _admission = self.admission.lock();
        if self.sessions.len() >= self.max_sessions {
            self.sweep_expired();
            while self.sessions.len() >= self.max_sessions {
                if !self.evict_one() {
                    break;
                }
            }
        }

        let session = Arc::new(Session::new(SessionToken::new(), client));
        self.sessions
            .insert(session.token().clone(), Arc::clone(&session));
        session
    }

    /// Resolve a token and mark the session as seen.
    ///
    /// Expired sessions are removed on lookup and reported as missing.
    pub fn get(&self, token: &SessionToken) -> Option<Arc<Session>> {
        {
            // Touch under the shard guard so a concurrent sweep's re-check
            // sees the refreshed time.
            let entry = self.sessions.get(token)?;
            if !self.is_expired(entry.value()) {
                entry.value().touch();
                return Some(Arc::clone(entry.value()));
            }
        }
        self.remove_expired(token);
        None
    }

    pub fn remove(&self, token: &SessionToken) -> bool {
        match self.sessions.remove(token) {
            Some((_, session)) => {
                session.client.clear_access_token();
                true
            }
            None => false,
        }
    }

    /// Remove `token` only if it is still expired when the entry is locked.
    fn remove_expired(&self, token: &SessionToken) -> bool {
        match self
            .sessions
            .remove_if(token, |_, session| self.is_expired(session))
        {
            Some((_, session)) => {
                session.client.clear_access_token();
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    fn is_expired(&self, session: &Session) -> bool {
        session.idle() >= self.ttl
    }

    /// Remove every session idle for longer than the TTL.
    pub fn sweep_expired(&self) -> usize {
        let expired: Vec<SessionToken> = self
            .sessions
            .iter()
            .filter(|entry| self.is_expired(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for token in expired {
            if self.remove_expired(&token) {
                removed += 1;
                tracing::debug!(session = %token.fingerprint(), "expired session removed");
            }
        }
        removed
    }

    fn evict_one(&self) -> bool {
        let victim = self
            .sessions
            .iter()
            .min_by_key(|entry| {
                let session = entry.value();
                (
                    session.is_authenticated(),
                    session.last_seen.load(Ordering::Relaxed),
                )
            })
            .map(|entry| {
                let session = entry.value();
                (entry.key().clone(), session.created_at, session.is_authenticated())
            });

        match victim {
            Some((token, created_at, authenticated)) => {
                tracing::info!(
                    session = %token.fingerprint(),
                    authenticated,
                    age_secs = (Utc::now() - created_at).num_seconds(),
                    "session evicted at capacity"
                );
                self.remove(&token)
            }
            None => false,
        }
    }
}

/// Start a background task that periodically sweeps expired sessions.
pub fn start_sweeper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = registry.sweep_expired();
                    if removed > 0 {
                        tracing::info!(removed, remaining = registry.count(), "session sweep");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    use catalog_core::{AccessToken, EventType};
    use catalog_platform::MockPlatformFactory;

    fn registry(max: usize) -> (SessionRegistry, MockPlatformFactory) {
        (
            SessionRegistry::new(Duration::from_secs(60), max),
            MockPlatformFactory::new(),
        )
    }

    fn backdate(session: &Session, by: Duration) {
        let then = now_millis().saturating_sub(by.as_millis() as u64);
        session.last_seen.store(then, Ordering::Relaxed);
    }

    #[test]
    fn create_and_get() {
        let (registry, factory) = registry(8);
        let session = registry.create(Arc::new(factory.platform()));
        assert_eq!(registry.count(), 1);

        let found = registry.get(session.token()).unwrap();
        assert!(Arc::ptr_eq(&found, &session));
        assert!(!found.is_authenticated());
    }

    #[test]
    fn sessions_get_distinct_tokens_and_clients() {
        let (registry, factory) = registry(8);
        let a = registry.create(Arc::new(factory.platform()));
        let b = registry.create(Arc::new(factory.platform()));
        assert_ne!(a.token(), b.token());

        a.client().set_access_token(AccessToken::new("t"));
        assert!(a.is_authenticated());
        assert!(!b.is_authenticated());
    }

    #[test]
    fn unknown_token_is_missing() {
        let (registry, _) = registry(8);
        assert!(registry.get(&SessionToken::from_raw("sess_nope")).is_none());
    }

    #[test]
    fn expired_session_is_removed_on_lookup() {
        let (registry, factory) = registry(8);
        let session = registry.create(Arc::new(factory.platform()));
        backdate(&session, Duration::from_secs(61));

        assert!(registry.get(session.token()).is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn lookup_refreshes_idle_time() {
        let (registry, factory) = registry(8);
        let session = registry.create(Arc::new(factory.platform()));
        backdate(&session, Duration::from_secs(59));

        assert!(registry.get(session.token()).is_some());
        assert!(session.idle() < Duration::from_secs(1));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let (registry, factory) = registry(8);
        let stale = registry.create(Arc::new(factory.platform()));
        let fresh = registry.create(Arc::new(factory.platform()));
        stale.client().set_access_token(AccessToken::new("t"));
        backdate(&stale, Duration::from_secs(120));

        assert_eq!(registry.sweep_expired(), 1);
        assert_eq!(registry.count(), 1);
        assert!(registry.get(fresh.token()).is_some());
        assert!(!stale.is_authenticated());
    }

    #[test]
    fn capacity_evicts_least_recently_seen() {
        let (registry, factory) = registry(2);
        let old = registry.create(Arc::new(factory.platform()));
        let recent = registry.create(Arc::new(factory.platform()));
        backdate(&old, Duration::from_secs(30));

        let newest = registry.create(Arc::new(factory.platform()));
        assert_eq!(registry.count(), 2);
        assert!(registry.get(old.token()).is_none());
        assert!(registry.get(recent.token()).is_some());
        assert!(registry.get(newest.token()).is_some());
    }

    #[test]
    fn capacity_evicts_signed_out_before_signed_in() {
        let (registry, factory) = registry(2);
        let operator = registry.create(Arc::new(factory.platform()));
        operator.client().set_access_token(AccessToken::new("t"));
        backdate(&operator, Duration::from_secs(30));
        let anonymous = registry.create(Arc::new(factory.platform()));

        registry.create(Arc::new(factory.platform()));
        assert!(registry.get(operator.token()).is_some());
        assert!(registry.get(anonymous.token()).is_none());
        assert!(operator.is_authenticated());
    }

    #[test]
    fn concurrent_creates_respect_capacity() {
        let registry = Arc::new(SessionRegistry::new(Duration::from_secs(60), 1));
        let factory = MockPlatformFactory::new();
        let worst = Arc::new(AtomicUsize::new(0));

        for _ in 0..200 {
            let barrier = Arc::new(Barrier::new(8));
            let threads: Vec<_> = (0..8)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    let factory = factory.clone();
                    let barrier = Arc::clone(&barrier);
                    let worst = Arc::clone(&worst);
                    std::thread::spawn(move || {
                        barrier.wait();
                        registry.create(Arc::new(factory.platform()));
                        worst.fetch_max(registry.count(), Ordering::SeqCst);
                    })
                })
                .collect();
            for t in threads {
                t.join().unwrap();
            }
            assert_eq!(registry.count(), 1);
        }
        assert_eq!(worst.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refreshed_session_survives_expiry_removal() {
        let (registry, factory) = registry(8);
        let session = registry.create(Arc::new(factory.platform()));
        session.client().set_access_token(AccessToken::new("t"));
        backdate(&session, Duration::from_secs(120));

        // refreshed after a sweep picked it as a candidate
        session.touch();
        assert!(!registry.remove_expired(session.token()));
        assert_eq!(registry.sweep_expired(), 0);
        assert!(registry.get(session.token()).is_some());
        assert!(session.is_authenticated());
    }

    #[test]
    fn view_resolves_names() {
        let (registry, factory) = registry(8);
        let session = registry.create(Arc::new(factory.platform()));
        session.set_managers(vec![ManagerNode::new("east"), ManagerNode::new("west")]);
        assert_eq!(session.managers().len(), 2);
        assert_eq!(session.manager("west").unwrap().name, "west");
        assert!(session.manager("north").is_none());

        let entries = catalog_core::merge_catalog(vec![EventType::new("E1")], vec![], vec![]);
        session.store_catalog("east", entries);
        assert_eq!(session.catalog_entry("east", "E1").unwrap().name(), "E1");
        assert!(session.catalog_entry("east", "E2").is_none());
        assert!(session.catalog_entry("west", "E1").is_none());
    }

    #[test]
    fn new_manager_list_drops_old_catalogs() {
        let (registry, factory) = registry(8);
        let session = registry.create(Arc::new(factory.platform()));
        session.set_managers(vec![ManagerNode::new("east")]);
        let entries = catalog_core::merge_catalog(vec![EventType::new("E1")], vec![], vec![]);
        session.store_catalog("east", entries);

        session.set_managers(vec![ManagerNode::new("east")]);
        assert!(session.catalog_entry("east", "E1").is_none());
    }

    #[test]
    fn sign_out_clears_token_and_view() {
        let (registry, factory) = registry(8);
        let session = registry.create(Arc::new(factory.platform()));
        session.client().set_access_token(AccessToken::new("t"));
        session.set_managers(vec![ManagerNode::new("east")]);

        session.sign_out();
        assert!(!session.is_authenticated());
        assert!(session.managers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_until_cancelled() {
        let registry = Arc::new(SessionRegistry::new(Duration::from_secs(60), 8));
        let factory = MockPlatformFactory::new();
        let session = registry.create(Arc::new(factory.platform()));
        backdate(&session, Duration::from_secs(120));

        let cancel = CancellationToken::new();
        let handle = start_sweeper(Arc::clone(&registry), Duration::from_secs(5), cancel.clone());
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(registry.count(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
