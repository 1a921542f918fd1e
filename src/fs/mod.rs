mod env;
mod manager;
mod record;

pub use env::Env;
pub use env::StdEnv;
pub use env::SyncMode;
pub use env::WriteMode;
pub use manager::FsManager;
pub use record::read_record;
pub use record::write_record;
pub use record::RecordError;
