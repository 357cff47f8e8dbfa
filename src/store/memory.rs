//! In-memory [`UserStore`] implementation.
//!
//! Backs tests and single-process deployments. State lives behind one
//! `std::sync::Mutex`; callers reach this through `spawn_blocking`, so the
//! short critical sections here never touch an async executor thread.

use crate::protocol::types::{ContactInfo, ContactState, MessageInfo, UserId, UserInfo, UserName};
use crate::store::{StoreError, UserStore};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Clone)]
struct UserRow {
    id: UserId,
    name: UserName,
    password: String,
}

struct MessageRow {
    sender: UserId,
    recipient: UserId,
    text: String,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: HashMap<UserId, UserRow>,
    ids_by_name: HashMap<UserName, UserId>,
    /// user -> (contact, state), insertion-ordered
    contacts: HashMap<UserId, Vec<(UserId, ContactState)>>,
    messages: Vec<MessageRow>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend(String::from("store mutex poisoned")))
    }
}

impl Inner {
    fn build_user(&self, row: &UserRow) -> UserInfo {
        let mut user = UserInfo::new(Some(row.id), row.name.clone(), row.password.clone());
        if let Some(entries) = self.contacts.get(&row.id) {
            user.contacts = entries
                .iter()
                .filter_map(|(contact_id, state)| {
                    self.users.get(contact_id).map(|contact_row| {
                        ContactInfo::new(
                            // shallow: a contact entry does not nest the
                            // contact's own contact list
                            UserInfo::new(
                                Some(contact_row.id),
                                contact_row.name.clone(),
                                contact_row.password.clone(),
                            ),
                            *state,
                        )
                    })
                })
                .collect();
        }
        user
    }

    /// Substitute `user`'s stored contact list, applied as deltas against
    /// the previous list.
    fn apply_contact_deltas(&mut self, user_id: UserId, new_list: &[ContactInfo]) {
        let previous = self.contacts.entry(user_id).or_default();

        let mut next: Vec<(UserId, ContactState)> = Vec::with_capacity(new_list.len());
        for entry in new_list {
            if let Some(contact_id) = entry.contact.id {
                next.push((contact_id, entry.state));
            }
        }

        let inserts = next
            .iter()
            .filter(|(id, _)| !previous.iter().any(|(p, _)| p == id))
            .count();
        let deletes = previous
            .iter()
            .filter(|(id, _)| !next.iter().any(|(n, _)| n == id))
            .count();
        let updates = next
            .iter()
            .filter(|(id, state)| {
                previous
                    .iter()
                    .any(|(p, p_state)| p == id && p_state != state)
            })
            .count();
        debug!(
            user_id = user_id.0,
            inserts, deletes, updates, "contact list substituted"
        );

        *previous = next;
    }
}

impl UserStore for MemoryStore {
    fn get_user_by_name(&self, name: &UserName) -> Result<Option<UserInfo>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .ids_by_name
            .get(name)
            .and_then(|id| inner.users.get(id))
            .map(|row| inner.build_user(&row.clone())))
    }

    fn get_user_by_id(&self, id: UserId) -> Result<Option<UserInfo>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.users.get(&id).map(|row| inner.build_user(&row.clone())))
    }

    fn persist_user(&self, user: UserInfo) -> Result<UserInfo, StoreError> {
        let mut inner = self.lock()?;
        let id = match user.id {
            None => {
                // create: public name is the unique key
                if inner.ids_by_name.contains_key(&user.name) {
                    return Err(StoreError::AlreadyExists(user.name.to_string()));
                }
                inner.next_id += 1;
                let id = UserId(inner.next_id);
                inner.users.insert(
                    id,
                    UserRow {
                        id,
                        name: user.name.clone(),
                        password: user.password.clone(),
                    },
                );
                inner.ids_by_name.insert(user.name.clone(), id);
                id
            }
            Some(id) => {
                let row = inner
                    .users
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::NotFound(user.name.to_string()))?;
                row.password = user.password.clone();
                id
            }
        };
        inner.apply_contact_deltas(id, &user.contacts);

        let row = inner.users[&id].clone();
        Ok(inner.build_user(&row))
    }

    fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let row = inner
            .users
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user id {}", id.0)))?;
        inner.ids_by_name.remove(&row.name);
        inner.contacts.remove(&id);
        for entries in inner.contacts.values_mut() {
            entries.retain(|(contact_id, _)| *contact_id != id);
        }
        inner
            .messages
            .retain(|m| m.recipient != id && m.sender != id);
        Ok(())
    }

    fn get_contacts(&self, user: UserId) -> Result<Vec<ContactInfo>, StoreError> {
        let inner = self.lock()?;
        let row = inner
            .users
            .get(&user)
            .ok_or_else(|| StoreError::NotFound(format!("user id {}", user.0)))?;
        Ok(inner.build_user(&row.clone()).contacts)
    }

    fn get_contact_of_users(
        &self,
        contact: UserId,
        state: ContactState,
    ) -> Result<Vec<ContactInfo>, StoreError> {
        let inner = self.lock()?;
        let mut holders = Vec::new();
        for (holder_id, entries) in &inner.contacts {
            if entries.iter().any(|(c, s)| *c == contact && *s == state) {
                if let Some(row) = inner.users.get(holder_id) {
                    holders.push(ContactInfo::new(
                        UserInfo::new(Some(row.id), row.name.clone(), row.password.clone()),
                        state,
                    ));
                }
            }
        }
        Ok(holders)
    }

    fn insert_message(
        &self,
        sender: UserId,
        recipient: UserId,
        text: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.users.contains_key(&recipient) {
            return Err(StoreError::NotFound(format!("user id {}", recipient.0)));
        }
        inner.messages.push(MessageRow {
            sender,
            recipient,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn get_messages(&self, recipient: UserId) -> Result<Vec<MessageInfo>, StoreError> {
        let inner = self.lock()?;
        inner
            .messages
            .iter()
            .filter(|m| m.recipient == recipient)
            .map(|m| {
                let sender_name = inner
                    .users
                    .get(&m.sender)
                    .map(|row| row.name.clone())
                    .ok_or_else(|| StoreError::NotFound(format!("user id {}", m.sender.0)))?;
                MessageInfo::new(Some(sender_name), None, m.text.clone())
                    .map_err(|e| StoreError::Backend(e.to_string()))
            })
            .collect()
    }

    fn delete_messages_for(&self, recipient: UserId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.messages.retain(|m| m.recipient != recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn name(s: &str) -> UserName {
        UserName::new(s).unwrap()
    }

    fn create(store: &MemoryStore, s: &str) -> UserInfo {
        store
            .persist_user(UserInfo::new(None, name(s), "pw"))
            .unwrap()
    }

    #[test]
    fn test_create_then_lookup() {
        let store = MemoryStore::new();
        let alice = create(&store, "Alice");
        assert!(alice.id.is_some());

        let found = store.get_user_by_name(&name("Alice")).unwrap().unwrap();
        assert_eq!(found.id, alice.id);
        assert!(store.get_user_by_name(&name("Bob")).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_create_is_already_exists() {
        let store = MemoryStore::new();
        create(&store, "Alice");
        let err = store
            .persist_user(UserInfo::new(None, name("Alice"), "other"))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn test_contact_list_substitution() {
        let store = MemoryStore::new();
        let mut alice = create(&store, "Alice");
        let bob = create(&store, "Bob");
        let carol = create(&store, "Carol");

        alice.contacts = vec![
            ContactInfo::new(bob.clone(), ContactState::Pending),
            ContactInfo::new(carol.clone(), ContactState::Contact),
        ];
        let alice = store.persist_user(alice).unwrap();
        assert_eq!(alice.contacts.len(), 2);

        // substitute: drop Carol, promote Bob
        let mut alice2 = alice.clone();
        alice2.contacts = vec![ContactInfo::new(bob.clone(), ContactState::Contact)];
        let alice2 = store.persist_user(alice2).unwrap();
        assert_eq!(alice2.contacts.len(), 1);
        assert_eq!(alice2.contacts[0].state, ContactState::Contact);
        assert_eq!(alice2.contacts[0].contact.name, name("Bob"));
    }

    #[test]
    fn test_contact_of_users_inverse_lookup() {
        let store = MemoryStore::new();
        let mut alice = create(&store, "Alice");
        let bob = create(&store, "Bob");

        alice.contacts = vec![ContactInfo::new(bob.clone(), ContactState::Pending)];
        store.persist_user(alice).unwrap();

        let holders = store
            .get_contact_of_users(bob.id.unwrap(), ContactState::Pending)
            .unwrap();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].contact.name, name("Alice"));

        let contacts = store
            .get_contact_of_users(bob.id.unwrap(), ContactState::Contact)
            .unwrap();
        assert!(contacts.is_empty());
    }

    #[test]
    fn test_message_queue_roundtrip() {
        let store = MemoryStore::new();
        let alice = create(&store, "Alice");
        let bob = create(&store, "Bob");

        store
            .insert_message(alice.id.unwrap(), bob.id.unwrap(), "hi")
            .unwrap();

        let msgs = store.get_messages(bob.id.unwrap()).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].sender, Some(name("Alice")));
        assert_eq!(msgs[0].text(), "hi");

        store.delete_messages_for(bob.id.unwrap()).unwrap();
        assert!(store.get_messages(bob.id.unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_delete_user_clears_references() {
        let store = MemoryStore::new();
        let mut alice = create(&store, "Alice");
        let bob = create(&store, "Bob");

        alice.contacts = vec![ContactInfo::new(bob.clone(), ContactState::Contact)];
        let alice = store.persist_user(alice).unwrap();
        store
            .insert_message(alice.id.unwrap(), bob.id.unwrap(), "hi")
            .unwrap();

        store.delete_user(bob.id.unwrap()).unwrap();
        let alice = store.get_user_by_name(&name("Alice")).unwrap().unwrap();
        assert!(alice.contacts.is_empty());
        assert!(store.get_user_by_name(&name("Bob")).unwrap().is_none());
    }
}
