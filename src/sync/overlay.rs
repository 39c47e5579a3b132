use crate::domain::{ClientId, Origin, ThreadEntity};

/// Not-yet-confirmed entities of one scope, newest first.
#[derive(Debug, Clone)]
pub struct PendingOverlay<E> {
    entries: Vec<E>,
}

impl<E> Default for PendingOverlay<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: ThreadEntity> PendingOverlay<E> {
    /// Inserts a pending entity at the front. Confirmed entities are ignored.
    pub fn add(&mut self, entity: E) -> bool {
        if !entity.origin().is_pending() {
            return false;
        }
        self.entries.insert(0, entity);
        true
    }

    /// Removes the entry created with `client_id`. Removing twice is a no-op.
    pub fn remove_by_client_id(&mut self, client_id: ClientId) -> Option<E> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.origin().client_id() == Some(client_id))?;
        Some(self.entries.remove(index))
    }

    /// Removes every entry `resolved` accepts, returning how many were dropped.
    pub fn remove_where(&mut self, mut resolved: impl FnMut(&E) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !resolved(entry));
        before - self.entries.len()
    }

    /// Records the authoritative id returned by the create call.
    pub fn tag_server_id(&mut self, client_id: ClientId, server_id: &str) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.origin().client_id() == Some(client_id))
        else {
            return false;
        };

        *entry.origin_mut() = Origin::Pending {
            client_id,
            server_id: Some(server_id.to_owned()),
        };
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, client_id: ClientId) -> Option<&E> {
        self.entries
            .iter()
            .find(|entry| entry.origin().client_id() == Some(client_id))
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
