use crate::entities::{Cpu, Gindex, Loom, Process, Thread};
use crate::error::Error;

/// The whole loom/process/thread/CPU graph, indexed by dense global index.
///
/// Built once by [`crate::builder::build`] and then only mutated through
/// [`crate::machine`]'s abstract-machine operations; entities are never
/// removed once built.
pub struct System {
    pub looms: Vec<Loom>,
    pub processes: Vec<Process>,
    pub threads: Vec<Thread>,
    pub cpus: Vec<Cpu>,
}

impl System {
    pub fn find_physical_cpu(&self, loom_gindex: Gindex, phyid: i64) -> Result<Gindex, Error> {
        self.looms[loom_gindex]
            .cpus
            .iter()
            .copied()
            .find(|&c| self.cpus[c].phyid == Some(phyid))
            .ok_or(Error::UnknownCpu { loom_gindex, phyid })
    }

    pub fn find_thread_in_process(&self, proc_gindex: Gindex, tid: i64) -> Option<Gindex> {
        self.processes[proc_gindex]
            .threads
            .iter()
            .copied()
            .find(|&t| self.threads[t].tid == tid)
    }

    pub fn find_thread_in_loom(&self, loom_gindex: Gindex, tid: i64) -> Option<Gindex> {
        self.looms[loom_gindex].processes.iter().copied().find_map(|p| {
            self.processes[p]
                .threads
                .iter()
                .copied()
                .find(|&t| self.threads[t].tid == tid)
        })
    }

    pub fn thread_by_relpath(&self, relpath: &str) -> Option<Gindex> {
        self.threads.iter().position(|t| t.relpath == relpath)
    }
}
