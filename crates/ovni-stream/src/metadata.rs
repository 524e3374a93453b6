use serde::Deserialize;
use std::collections::HashMap;

/// `proc.<pid>/metadata.json`: per-process declaration of app id, optional
/// rank, and the set of physical CPUs visible to the process.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcMetadata {
    pub version: u32,
    pub app_id: i64,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub nranks: Option<i64>,
    #[serde(default)]
    pub cpus: Vec<CpuDecl>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CpuDecl {
    pub index: i64,
    pub phyid: i64,
}

/// `thread.<tid>.json`: per-thread instrumentation-library bookkeeping.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMetadata {
    pub version: u32,
    pub ovni: OvniMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OvniMeta {
    pub lib: LibMeta,
    #[serde(default)]
    pub require: HashMap<String, String>,
    #[serde(default)]
    pub finished: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibMeta {
    pub version: String,
    pub commit: String,
}
