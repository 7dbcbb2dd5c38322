//! Session store for deployments without session tracking.

use super::{errors::SessionResult, models::OnlineInfo, registry::SessionStore};
use uuid::Uuid;

/// Accepts every call and remembers nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySessionStore;

impl SessionStore for EmptySessionStore {
    /// Returns a fresh id each time
    fn login(&self, _username: &str, _address: &str, _api_key: Option<&str>) -> SessionResult<Uuid> {
        Ok(Uuid::new_v4())
    }

    fn update_now(&self, _uuid: Uuid, _api_key: Option<&str>) -> SessionResult<()> {
        Ok(())
    }

    fn get_by_session_id(&self, _uuid: Uuid) -> Option<OnlineInfo> {
        None
    }

    fn list(&self) -> Vec<OnlineInfo> {
        Vec::new()
    }

    fn count(&self) -> usize {
        0
    }

    fn logout_by_session_id(&self, _uuid: Uuid) {}

    fn logout_by_username(&self, _username: &str) {}

    fn is_online_exists(&self, _username: &str, _address: &str) -> SessionResult<()> {
        Ok(())
    }

    fn delete_expired(&self) -> usize {
        0
    }

    fn load(&self) -> SessionResult<()> {
        Ok(())
    }

    fn store(&self) -> SessionResult<()> {
        Ok(())
    }
}
