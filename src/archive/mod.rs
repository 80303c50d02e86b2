pub mod inst_cfg;
pub mod writer;

pub use inst_cfg::{parse_inst_cfg, InstCfg};
pub use writer::{safe_file_name, write_profile_archive, ArchiveRequest};
