use crate::error::Error;
use crate::metadata::{ProcMetadata, ThreadMetadata};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One discovered `.obs` file paired with the metadata needed to place it in
/// the loom/process/thread graph. Does not open the stream itself — that
/// happens lazily via [`crate::Stream::open`].
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub hostname: String,
    pub loom_id: String,
    pub pid: i64,
    pub tid: i64,
    /// Path relative to the trace directory root; this is the stream's identity.
    pub relpath: String,
    pub obs_path: PathBuf,
    /// Shared by every thread of the same process.
    pub proc_meta: Arc<ProcMetadata>,
    pub thread_meta: ThreadMetadata,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let bytes = fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_loom_dirname(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix("loom.")?;
    let (hostname, loom_id) = rest.rsplit_once('.')?;
    Some((hostname.to_string(), loom_id.to_string()))
}

fn parse_proc_dirname(name: &str) -> Option<i64> {
    name.strip_prefix("proc.")?.parse().ok()
}

fn parse_thread_obs_filename(name: &str) -> Option<i64> {
    name.strip_prefix("thread.")?.strip_suffix(".obs")?.parse().ok()
}

fn sorted_dir_entries(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}

/// Scans `tracedir` for `loom.<hostname>.<loom-id>/proc.<pid>/thread.<tid>.obs`
/// files and their sibling metadata, returning one [`StreamEntry`] per
/// thread stream found. Entries are returned in a deterministic
/// (lexicographic directory walk) order; final ordering for the player is
/// established later by [the system builder](`crate`'s consumer), not here.
pub fn discover(tracedir: &Path) -> Result<Vec<StreamEntry>, Error> {
    let mut out = Vec::new();

    for loom_dir in sorted_dir_entries(tracedir)? {
        if !loom_dir.is_dir() {
            continue;
        }
        let loom_name = loom_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::MalformedPath {
                path: loom_dir.clone(),
            })?;
        let Some((hostname, loom_id)) = parse_loom_dirname(loom_name) else {
            continue;
        };

        for proc_dir in sorted_dir_entries(&loom_dir)? {
            if !proc_dir.is_dir() {
                continue;
            }
            let proc_name = proc_dir
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| Error::MalformedPath {
                    path: proc_dir.clone(),
                })?;
            let Some(pid) = parse_proc_dirname(proc_name) else {
                continue;
            };

            let proc_meta: Arc<ProcMetadata> =
                Arc::new(read_json(&proc_dir.join("metadata.json"))?);

            for obs_path in sorted_dir_entries(&proc_dir)? {
                if !obs_path.is_file() {
                    continue;
                }
                let obs_name = obs_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| Error::MalformedPath {
                        path: obs_path.clone(),
                    })?;
                let Some(tid) = parse_thread_obs_filename(obs_name) else {
                    continue;
                };

                let thread_json_path = proc_dir.join(format!("thread.{tid}.json"));
                let thread_meta: ThreadMetadata = read_json(&thread_json_path)?;

                let relpath = obs_path
                    .strip_prefix(tracedir)
                    .map_err(|_| Error::MalformedPath {
                        path: obs_path.clone(),
                    })?
                    .to_string_lossy()
                    .into_owned();

                out.push(StreamEntry {
                    hostname: hostname.clone(),
                    loom_id: loom_id.clone(),
                    pid,
                    tid,
                    relpath,
                    obs_path,
                    proc_meta: Arc::clone(&proc_meta),
                    thread_meta,
                });
            }
        }
    }

    Ok(out)
}
