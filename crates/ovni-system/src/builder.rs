//! System Builder: turns a flat list of discovered streams into the
//! loom/process/thread/CPU graph with stable, densely assigned global
//! indices.

use crate::entities::{Cpu, ExtSlots, Loom, Process, Thread};
use crate::error::Error;
use crate::machine::ThreadState;
use crate::system::System;
use ovni_stream::{ClockOffsetTable, StreamEntry};
use std::collections::BTreeMap;

struct LoomGroup {
    hostname: String,
    loom_id: String,
    rank: Option<i64>,
    /// pid -> tid -> entry, both ordered for deterministic thread numbering.
    by_pid: BTreeMap<i64, BTreeMap<i64, StreamEntry>>,
}

/// Builds a [`System`] from the streams `discover` found. `n_models` sizes
/// every entity's per-model extension slot array (see
/// [`crate::entities::ExtSlots`]); pass the number of models that will end
/// up `create`-enabled.
pub fn build(
    entries: Vec<StreamEntry>,
    clockoffsets: &ClockOffsetTable,
    n_models: usize,
) -> Result<System, Error> {
    // 1-2. Group by (hostname, loom-id), then by pid, then by tid.
    let mut groups: BTreeMap<(String, String), LoomGroup> = BTreeMap::new();
    for entry in entries {
        let key = (entry.hostname.clone(), entry.loom_id.clone());
        let group = groups.entry(key).or_insert_with(|| LoomGroup {
            hostname: entry.hostname.clone(),
            loom_id: entry.loom_id.clone(),
            rank: None,
            by_pid: BTreeMap::new(),
        });
        let by_tid = group.by_pid.entry(entry.pid).or_default();
        if by_tid.insert(entry.tid, entry.clone()).is_some() {
            return Err(Error::InvalidSystem(format!(
                "duplicate thread tid {} for pid {} in loom {}.{}",
                entry.tid, entry.pid, entry.hostname, entry.loom_id
            )));
        }
    }

    // Compute each loom's representative rank: the minimum declared rank
    // across its processes, or None if any process lacks one.
    let mut loom_list: Vec<LoomGroup> = groups.into_values().collect();
    for group in loom_list.iter_mut() {
        let mut rank: Option<i64> = Some(i64::MAX);
        for threads in group.by_pid.values() {
            let Some(first) = threads.values().next() else {
                continue;
            };
            match first.proc_meta.rank {
                Some(r) => {
                    rank = rank.map(|cur| cur.min(r));
                }
                None => {
                    rank = None;
                    break;
                }
            }
        }
        group.rank = rank;
    }

    // 4 (loom ordering). Sort by rank only if every loom declared one;
    // otherwise keep the (hostname, loom-id) order BTreeMap already gave us.
    if loom_list.iter().all(|g| g.rank.is_some()) {
        loom_list.sort_by_key(|g| g.rank.unwrap());
    }

    let mut cpus: Vec<Cpu> = Vec::new();
    let mut looms: Vec<Loom> = Vec::new();
    let mut processes: Vec<Process> = Vec::new();
    let mut threads: Vec<Thread> = Vec::new();

    for (loom_gindex, group) in loom_list.into_iter().enumerate() {
        // 3. Union of declared physical CPUs across this loom's processes,
        // deduplicated by phyid, sorted ascending, densely numbered.
        let mut phyid_to_index: BTreeMap<i64, i64> = BTreeMap::new();
        for threads_by_tid in group.by_pid.values() {
            let Some(first) = threads_by_tid.values().next() else {
                continue;
            };
            for cpu_decl in &first.proc_meta.cpus {
                match phyid_to_index.get(&cpu_decl.phyid) {
                    Some(&existing) if existing != cpu_decl.index => {
                        return Err(Error::InvalidSystem(format!(
                            "inconsistent cpu index for phyid {} in loom {}.{}",
                            cpu_decl.phyid, group.hostname, group.loom_id
                        )));
                    }
                    _ => {
                        phyid_to_index.insert(cpu_decl.phyid, cpu_decl.index);
                    }
                }
            }
        }

        let mut loom_cpus = Vec::with_capacity(phyid_to_index.len());
        for &phyid in phyid_to_index.keys() {
            let gindex = cpus.len();
            cpus.push(Cpu {
                gindex,
                loom_gindex,
                phyid: Some(phyid),
                occupants: Vec::new(),
                running_count: 0,
                ext: ExtSlots::with_capacity(n_models),
            });
            loom_cpus.push(gindex);
        }

        let vcpu_gindex = cpus.len();
        cpus.push(Cpu {
            gindex: vcpu_gindex,
            loom_gindex,
            phyid: None,
            occupants: Vec::new(),
            running_count: 0,
            ext: ExtSlots::with_capacity(n_models),
        });

        // 2/5. Processes in pid order; threads in tid order within each.
        let mut loom_processes = Vec::with_capacity(group.by_pid.len());
        for (pid, by_tid) in group.by_pid {
            let proc_gindex = processes.len();
            let first = by_tid
                .values()
                .next()
                .ok_or_else(|| Error::InvalidSystem(format!("empty process pid {pid}")))?;
            let app_id = first.proc_meta.app_id;
            let rank = first.proc_meta.rank;

            let mut proc_threads = Vec::with_capacity(by_tid.len());
            for (tid, entry) in by_tid {
                let thread_gindex = threads.len();
                threads.push(Thread {
                    gindex: thread_gindex,
                    loom_gindex,
                    proc_gindex,
                    tid,
                    relpath: entry.relpath,
                    state: ThreadState::Unknown,
                    cpu: None,
                    ext: ExtSlots::with_capacity(n_models),
                });
                proc_threads.push(thread_gindex);
            }

            processes.push(Process {
                gindex: proc_gindex,
                loom_gindex,
                pid,
                app_id,
                rank,
                threads: proc_threads,
                ext: ExtSlots::with_capacity(n_models),
            });
            loom_processes.push(proc_gindex);
        }

        let clock_offset = clockoffsets.offset(&group.hostname, &group.loom_id);
        looms.push(Loom {
            gindex: loom_gindex,
            hostname: group.hostname,
            loom_id: group.loom_id,
            clock_offset,
            cpus: loom_cpus,
            vcpu: vcpu_gindex,
            processes: loom_processes,
            ext: ExtSlots::with_capacity(n_models),
        });
    }

    Ok(System {
        looms,
        processes,
        threads,
        cpus,
    })
}
