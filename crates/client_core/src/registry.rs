use std::collections::BTreeMap;

use crate::{engine::ServerEngine, error::RegistryError};

/// Something the registry can key by server name and guard against removal.
pub trait RegistryEntry {
    fn name(&self) -> &str;
    fn is_connected(&self) -> bool;
}

impl RegistryEntry for ServerEngine {
    fn name(&self) -> &str {
        ServerEngine::name(self)
    }

    fn is_connected(&self) -> bool {
        ServerEngine::is_connected(self)
    }
}

/// Owns every configured server, keyed by server name. Entries are engines
/// or handles to engines running on their own task.
pub struct ServerRegistry<E = ServerEngine> {
    entries: BTreeMap<String, E>,
}

impl<E> Default for ServerRegistry<E> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<E: RegistryEntry> ServerRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: E) -> Result<(), RegistryError> {
        let name = entry.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&E, RegistryError> {
        self.entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownServer(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Removes a server; refused while it still has a live connection.
    pub fn remove(&mut self, name: &str) -> Result<E, RegistryError> {
        match self.entries.get(name) {
            None => Err(RegistryError::UnknownServer(name.to_string())),
            Some(entry) if entry.is_connected() => {
                Err(RegistryError::StillConnected(name.to_string()))
            }
            Some(_) => self
                .entries
                .remove(name)
                .ok_or_else(|| RegistryError::UnknownServer(name.to_string())),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> impl Iterator<Item = E> {
        self.entries.into_values()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::{EngineOptions, ServerConfig},
        surface::MemorySurfaces,
        test_support::{FakeConnector, FakeWire},
    };

    fn engine(name: &str, connector: FakeConnector) -> ServerEngine {
        let config = ServerConfig::new(name, "example.org", 8448).with_credentials("alice", "pw");
        ServerEngine::new(config, Arc::new(EngineOptions::default()), Arc::new(connector))
    }

    #[test]
    fn names_are_unique() {
        let mut registry = ServerRegistry::new();
        registry
            .insert(engine("home", FakeConnector::refusing()))
            .expect("first");
        assert_eq!(
            registry.insert(engine("home", FakeConnector::refusing())),
            Err(RegistryError::Duplicate("home".into()))
        );
        registry
            .insert(engine("work", FakeConnector::refusing()))
            .expect("second");
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["home", "work"]);
        assert_eq!(registry.len(), 2);
        assert!(matches!(
            registry.get("nowhere"),
            Err(RegistryError::UnknownServer(_))
        ));
    }

    #[test]
    fn connected_server_cannot_be_removed() {
        let wire = FakeWire::new();
        let mut surfaces = MemorySurfaces::new();
        let mut home = engine("home", FakeConnector::accepting(wire.clone()));
        home.connect().expect("connect");
        home.on_connect_result(&mut surfaces, Ok(Box::new(wire.transport())));

        let mut registry = ServerRegistry::new();
        registry.insert(home).expect("insert");
        registry
            .insert(engine("work", FakeConnector::refusing()))
            .expect("insert");

        assert!(matches!(
            registry.remove("home"),
            Err(RegistryError::StillConnected(_))
        ));
        assert!(registry.contains("home"));
        assert_eq!(registry.remove("work").map(|e| e.name().to_string()), Ok("work".to_string()));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["home"]);
    }
}
