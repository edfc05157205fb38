use parking_lot::Mutex;
use std::sync::Arc;

/// Conteneur partagé du bridge (résultat agrégé, vues capteurs) :
/// un seul écrivain, lecteurs multiples, remplacement d'un bloc sous le verrou
pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
