//! crates/eduforge_core/src/credentials.rs
//!
//! The rotating pool of upstream API credentials.
//!
//! The pool only tracks which credential is active and how often it has been
//! used. It never gives up: rotation wraps around forever, and deciding when
//! the pool as a whole is exhausted is left to the caller.

use crate::domain::{Credential, PoolStatus};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("credential pool requires at least one token")]
    Empty,
    #[error("max uses per credential must be positive")]
    ZeroMaxUses,
}

#[derive(Debug)]
struct PoolState {
    active_index: usize,
    uses_on_active: u32,
}

#[derive(Debug)]
pub struct CredentialPool {
    tokens: Vec<Credential>,
    max_uses_per_credential: u32,
    state: Mutex<PoolState>,
}

impl CredentialPool {
    pub fn new(tokens: Vec<String>, max_uses_per_credential: u32) -> Result<Self, PoolError> {
        if tokens.is_empty() {
            return Err(PoolError::Empty);
        }
        if max_uses_per_credential == 0 {
            return Err(PoolError::ZeroMaxUses);
        }

        let tokens = tokens
            .into_iter()
            .enumerate()
            .map(|(index, secret)| Credential::new(index, secret))
            .collect();

        Ok(Self {
            tokens,
            max_uses_per_credential,
            state: Mutex::new(PoolState {
                active_index: 0,
                uses_on_active: 0,
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn max_uses_per_credential(&self) -> u32 {
        self.max_uses_per_credential
    }

    /// Returns the active credential without touching any counters.
    pub fn current(&self) -> Credential {
        let state = self.lock();
        self.tokens[state.active_index].clone()
    }

    /// Counts one successful use against the active credential.
    pub fn record_use(&self) {
        let mut state = self.lock();
        state.uses_on_active += 1;
    }

    /// Advances to the next credential, wrapping to the first after the last.
    pub fn rotate(&self) {
        let mut state = self.lock();
        self.advance(&mut state);
    }

    /// Rotates only if `index` is still the active credential.
    ///
    /// Two requests failing on the same credential at once advance the pool a
    /// single step instead of skipping a healthy credential.
    pub fn rotate_from(&self, index: usize) -> bool {
        let mut state = self.lock();
        if state.active_index != index {
            return false;
        }
        self.advance(&mut state);
        true
    }

    /// Returns the credential to use for the next call, rotating first when the
    /// active one has reached its use limit.
    pub fn acquire(&self) -> Credential {
        let mut state = self.lock();
        if state.uses_on_active >= self.max_uses_per_credential {
            self.advance(&mut state);
        }
        self.tokens[state.active_index].clone()
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.lock();
        PoolStatus {
            active_index: state.active_index,
            uses_on_active: state.uses_on_active,
            total: self.tokens.len(),
            max_uses_per_credential: self.max_uses_per_credential,
        }
    }

    fn advance(&self, state: &mut PoolState) {
        state.active_index = (state.active_index + 1) % self.tokens.len();
        state.uses_on_active = 0;
        info!("Rotated to API key {}", state.active_index + 1);
    }

    // The state is two integers, so a panic mid-update cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(size: usize, max_uses: u32) -> CredentialPool {
        let tokens = (0..size).map(|i| format!("key-{i}")).collect();
        CredentialPool::new(tokens, max_uses).unwrap()
    }

    #[test]
    fn rejects_empty_pool_and_zero_limit() {
        assert_eq!(CredentialPool::new(vec![], 5).unwrap_err(), PoolError::Empty);
        assert_eq!(
            CredentialPool::new(vec!["a".into()], 0).unwrap_err(),
            PoolError::ZeroMaxUses
        );
    }

    #[test]
    fn starts_on_first_credential() {
        let pool = pool(4, 20);
        let status = pool.status();
        assert_eq!(status.active_index, 0);
        assert_eq!(status.uses_on_active, 0);
        assert_eq!(status.total, 4);
        assert_eq!(status.max_uses_per_credential, 20);
        assert_eq!(pool.current().secret(), "key-0");
    }

    #[test]
    fn rotate_advances_and_resets_uses() {
        let pool = pool(3, 20);
        pool.record_use();
        pool.record_use();
        pool.rotate();

        let status = pool.status();
        assert_eq!(status.active_index, 1);
        assert_eq!(status.uses_on_active, 0);
    }

    #[test]
    fn rotate_wraps_around_from_last_index() {
        let pool = pool(3, 20);
        pool.rotate();
        pool.rotate();
        assert_eq!(pool.current().index(), 2);

        pool.rotate();
        assert_eq!(pool.current().index(), 0);
    }

    #[test]
    fn acquire_rotates_once_limit_is_reached() {
        let pool = pool(2, 2);
        assert_eq!(pool.acquire().index(), 0);
        pool.record_use();
        assert_eq!(pool.acquire().index(), 0);
        pool.record_use();

        let next = pool.acquire();
        assert_eq!(next.index(), 1);
        assert_eq!(pool.status().uses_on_active, 0);
    }

    #[test]
    fn rotate_from_ignores_stale_index() {
        let pool = pool(3, 20);
        assert!(pool.rotate_from(0));
        assert!(!pool.rotate_from(0));
        assert_eq!(pool.current().index(), 1);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let pool = pool(1, 1);
        let rendered = format!("{:?}", pool.current());
        assert!(!rendered.contains("key-0"));
        assert!(rendered.contains("redacted"));
    }
}
