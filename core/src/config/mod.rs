mod load;
mod types;

pub use load::{get_evidex_data_dir, load_default, load_explicit, load_from_path, StoragePaths};
pub use types::*;
