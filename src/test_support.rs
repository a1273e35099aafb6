//! In-memory identity and settings stores for handler and email tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::identity::{
    IdentityProvider, Principal, SortDirection, User, UserPage, UserQuery, normalize_email,
};
use crate::settings::{SettingsStore, SystemSettings};

#[derive(Default)]
struct IdentityState {
    users: Vec<User>,
    memberships: HashMap<String, BTreeSet<String>>,
    sessions: HashMap<String, String>,
    roles: BTreeSet<String>,
}

#[derive(Default)]
pub(crate) struct MemoryIdentity {
    state: Mutex<IdentityState>,
}

impl MemoryIdentity {
    fn state(&self) -> MutexGuard<'_, IdentityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add_user(&self, id: &str, email: &str) {
        self.state().users.push(User {
            id: id.to_string(),
            email: email.to_string(),
            two_factor_enabled: false,
        });
    }

    pub(crate) fn enable_two_factor(&self, id: &str) {
        if let Some(user) = self.state().users.iter_mut().find(|user| user.id == id) {
            user.two_factor_enabled = true;
        }
    }

    pub(crate) fn grant(&self, id: &str, role: &str) {
        let mut state = self.state();
        state.roles.insert(role.to_string());
        state
            .memberships
            .entry(id.to_string())
            .or_default()
            .insert(role.to_string());
    }

    pub(crate) fn add_session(&self, token: &str, id: &str) {
        self.state()
            .sessions
            .insert(token.to_string(), id.to_string());
    }

    pub(crate) fn has_session(&self, token: &str) -> bool {
        self.state().sessions.contains_key(token)
    }

    pub(crate) fn has_user(&self, id: &str) -> bool {
        self.state().users.iter().any(|user| user.id == id)
    }

    pub(crate) fn roles_of(&self, id: &str) -> Vec<String> {
        self.state()
            .memberships
            .get(id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn known_roles(&self) -> Vec<String> {
        self.state().roles.iter().cloned().collect()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn authenticate(&self, session_token: &str) -> Result<Option<Principal>> {
        let state = self.state();
        let Some(user_id) = state.sessions.get(session_token) else {
            return Ok(None);
        };
        let Some(user) = state.users.iter().find(|user| &user.id == user_id) else {
            return Ok(None);
        };
        let roles = state
            .memberships
            .get(user_id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default();
        Ok(Some(Principal {
            user_id: user.id.clone(),
            email: user.email.clone(),
            roles,
        }))
    }

    async fn sign_out(&self, session_token: &str) -> Result<()> {
        self.state().sessions.remove(session_token);
        Ok(())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|user| user.id == user_id)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let wanted = normalize_email(email);
        Ok(self
            .state()
            .users
            .iter()
            .find(|user| normalize_email(&user.email) == wanted)
            .cloned())
    }

    async fn is_in_role(&self, user: &User, role: &str) -> Result<bool> {
        Ok(self
            .state()
            .memberships
            .get(&user.id)
            .is_some_and(|roles| roles.contains(role)))
    }

    async fn add_to_role(&self, user: &User, role: &str) -> Result<()> {
        self.grant(&user.id, role);
        Ok(())
    }

    async fn remove_from_role(&self, user: &User, role: &str) -> Result<()> {
        if let Some(roles) = self.state().memberships.get_mut(&user.id) {
            roles.remove(role);
        }
        Ok(())
    }

    async fn get_roles(&self, user: &User) -> Result<Vec<String>> {
        Ok(self.roles_of(&user.id))
    }

    async fn get_two_factor_enabled(&self, user: &User) -> Result<bool> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|stored| stored.id == user.id)
            .is_some_and(|stored| stored.two_factor_enabled))
    }

    async fn delete(&self, user: &User) -> Result<()> {
        let mut state = self.state();
        state.users.retain(|stored| stored.id != user.id);
        state.memberships.remove(&user.id);
        state.sessions.retain(|_, owner| owner != &user.id);
        Ok(())
    }

    async fn search(&self, query: &UserQuery) -> Result<UserPage> {
        let needle = query
            .filter_text
            .as_deref()
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase);

        let mut matches: Vec<User> = self
            .state()
            .users
            .iter()
            .filter(|user| {
                needle
                    .as_deref()
                    .is_none_or(|needle| user.email.to_lowercase().contains(needle))
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| a.email.cmp(&b.email));
        if query.direction == SortDirection::Descending {
            matches.reverse();
        }

        let total = i64::try_from(matches.len()).unwrap_or(i64::MAX);
        let skip = usize::try_from(query.skip.max(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(query.take.max(0)).unwrap_or(usize::MAX);

        Ok(UserPage {
            total,
            users: matches.into_iter().skip(skip).take(take).collect(),
        })
    }

    async fn ensure_role(&self, role: &str) -> Result<()> {
        self.state().roles.insert(role.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemorySettings {
    settings: Mutex<Option<SystemSettings>>,
}

impl MemorySettings {
    pub(crate) fn with(settings: SystemSettings) -> Self {
        Self {
            settings: Mutex::new(Some(settings)),
        }
    }

    pub(crate) fn current(&self) -> Option<SystemSettings> {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn load(&self) -> Result<Option<SystemSettings>> {
        Ok(self.current())
    }

    async fn save(&self, settings: &SystemSettings) -> Result<()> {
        let mut stored = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        // Mirrors `UPDATE ... WHERE id = 1`: nothing to update without a row.
        if stored.is_some() {
            *stored = Some(settings.clone());
        }
        Ok(())
    }

    async fn ensure_exists(&self) -> Result<()> {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(SystemSettings::default);
        Ok(())
    }
}
