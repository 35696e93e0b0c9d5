// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Type identity registry.
//!
//! Every state payload type gets one stable small integer for the process
//! lifetime. Equality of these indices is the sole "is entity in state S"
//! mechanism; no runtime type lookup happens in the per-entity hot path.
//! The table is append-only and never torn down.

use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::BTreeMap;

/// Stable small integer identifying a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeIndex(i32);

impl TypeIndex {
    /// Sentinel for "no state yet": markers start here until the first
    /// transition completes.
    pub const UNSET: TypeIndex = TypeIndex(-1);

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_unset(self) -> bool {
        self == Self::UNSET
    }
}

impl std::fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

static TYPE_INDICES: RwLock<BTreeMap<TypeId, TypeIndex>> = RwLock::new(BTreeMap::new());

/// Look up (registering on first use) the type index of `T`.
///
/// Repeated calls return the same value; registration may race across
/// threads. Already-registered types only take the read lock.
pub fn type_index_of<T: 'static>() -> TypeIndex {
    let key = TypeId::of::<T>();

    if let Some(&index) = TYPE_INDICES.read().get(&key) {
        return index;
    }

    let mut table = TYPE_INDICES.write();
    let next = TypeIndex(table.len() as i32);
    *table.entry(key).or_insert(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_stable_and_distinct() {
        let a = type_index_of::<Alpha>();
        let b = type_index_of::<Beta>();

        assert_ne!(a, b);
        assert_eq!(a, type_index_of::<Alpha>());
        assert_eq!(b, type_index_of::<Beta>());
        assert!(!a.is_unset());
        assert!(!b.is_unset());
    }

    #[test]
    fn test_unset_sentinel() {
        assert_eq!(TypeIndex::UNSET.raw(), -1);
        assert!(TypeIndex::UNSET.is_unset());
    }

    #[test]
    fn test_concurrent_registration_agrees() {
        struct Gamma;

        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(type_index_of::<Gamma>))
            .collect();
        let indices: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(indices.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(indices[0], type_index_of::<Gamma>());
    }
}
