//! Collections keyed with ahash. Asset keys are not attacker controlled, so there is no need for
//! the DoS-resistant default hasher.

pub type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
pub type HashSet<T> = std::collections::HashSet<T, ahash::RandomState>;
