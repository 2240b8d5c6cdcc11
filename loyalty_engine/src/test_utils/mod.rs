mod prepare_env;
mod scripted_lookup;

pub use prepare_env::{create_database, drop_database, prepare_test_env, random_db_path};
pub use scripted_lookup::{ScriptedLookup, ScriptedResponse};
