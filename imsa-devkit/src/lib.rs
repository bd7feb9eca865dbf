/*!
# IMSA DevKit - doublures de test

- `MockTransport` : transport de chat qui enregistre les envois, avec pannes injectables
- `TestHarness` : annuaire SQLite en mémoire + répertoire de données temporaire
*/

pub mod transport_stub;
pub mod test_utils;

pub use transport_stub::{Failure, MockTransport, SentMessage};
pub use test_utils::TestHarness;
