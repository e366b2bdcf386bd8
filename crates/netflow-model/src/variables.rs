use std::collections::HashMap;

/// Column index of a decision variable in the LP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// Identity of a decision variable.
///
/// Fields are indices into the request's entity tables: `path` into
/// `NetworkData::paths`, `site` into the node table of [`crate::NetworkIndex`],
/// `product`, `period` and `vehicle_type` into their arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKey {
    Flow {
        path: usize,
        product: usize,
        period: usize,
    },
    Production {
        site: usize,
        product: usize,
        period: usize,
    },
    Trip {
        path: usize,
        vehicle_type: usize,
        period: usize,
    },
}

impl VarKey {
    pub fn is_integer(&self) -> bool {
        matches!(self, VarKey::Trip { .. })
    }
}

/// Arena of variable keys in creation order, with reverse lookup
#[derive(Debug, Clone, Default)]
pub struct VariableArena {
    keys: Vec<VarKey>,
    lookup: HashMap<VarKey, VarId>,
}

impl VariableArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key`, returning the existing id if it was already registered
    pub fn insert(&mut self, key: VarKey) -> VarId {
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = VarId(self.keys.len());
        self.keys.push(key);
        self.lookup.insert(key, id);
        id
    }

    pub fn get(&self, key: &VarKey) -> Option<VarId> {
        self.lookup.get(key).copied()
    }

    pub fn key(&self, id: VarId) -> &VarKey {
        &self.keys[id.0]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &VarKey)> {
        self.keys.iter().enumerate().map(|(i, k)| (VarId(i), k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent_and_ordered() {
        let mut arena = VariableArena::new();
        let a = arena.insert(VarKey::Flow { path: 0, product: 0, period: 0 });
        let b = arena.insert(VarKey::Production { site: 2, product: 0, period: 0 });
        let again = arena.insert(VarKey::Flow { path: 0, product: 0, period: 0 });

        assert_eq!(a, VarId(0));
        assert_eq!(b, VarId(1));
        assert_eq!(again, a);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(&VarKey::Production { site: 2, product: 0, period: 0 }), Some(b));
        assert_eq!(arena.get(&VarKey::Trip { path: 0, vehicle_type: 0, period: 0 }), None);
    }
}
