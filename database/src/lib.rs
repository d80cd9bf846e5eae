mod db;
mod writer;

pub mod prelude {
    pub use super::db::{delete_db, ConnBuilder, DB};
    pub use super::writer::{BatchDbWriter, DbWriter, DirectDbWriter, MemoryWriter};
}
