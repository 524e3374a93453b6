//! The abstract-machine thread state machine and CPU occupancy rules.

use crate::entities::Gindex;
use crate::error::Error;
use crate::system::System;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    Unknown,
    Running,
    Paused,
    Cooling,
    Warming,
    Dead,
}

impl ThreadState {
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, ThreadState::Running | ThreadState::Cooling | ThreadState::Warming)
    }

    /// Applies one transition trigger (`x`, `e`, `p`, `r`, `c`, `w`), returning
    /// the new state or `BadTransition` if the combination is not in the
    /// table (every cell not listed as a valid arrow, including the ones
    /// explicitly marked `err`, is illegal).
    fn apply(self, event: char) -> Option<ThreadState> {
        use ThreadState::*;
        match (self, event) {
            (Unknown, 'x') => Some(Running),
            (Running, 'e') => Some(Dead),
            (Running, 'p') => Some(Paused),
            (Running, 'c') => Some(Cooling),
            (Paused, 'r') => Some(Running),
            (Paused, 'w') => Some(Warming),
            (Cooling, 'e') => Some(Dead),
            (Cooling, 'p') => Some(Paused),
            (Warming, 'r') => Some(Running),
            _ => None,
        }
    }
}

/// Aggregate state of a CPU's occupants, as pushed to its tracking channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuAggregate {
    Idle,
    Running(Gindex),
    Oversubscribed,
}

impl System {
    /// Applies a bare state-machine transition to `thread`, without touching
    /// CPU occupancy. Used for events that change state but not placement
    /// (e.g. pause/resume/cool/warm).
    pub fn apply_transition(&mut self, thread: Gindex, event: char) -> Result<(), Error> {
        let state = self.threads[thread].state;
        let new_state = state.apply(event).ok_or(Error::BadTransition {
            gindex: thread,
            state,
            event,
        })?;
        self.threads[thread].state = new_state;

        // Pause/resume/cool/warm leave the thread bound to its CPU but move
        // it in or out of the specific RUNNING state cpu_aggregate keys off,
        // so running_count has to track that even though occupancy itself
        // doesn't change here.
        if let Some(cpu) = self.threads[thread].cpu {
            let was_running = state == ThreadState::Running;
            let now_running = new_state == ThreadState::Running;
            if was_running && !now_running {
                let c = &mut self.cpus[cpu];
                if c.running_count > 0 {
                    c.running_count -= 1;
                }
            } else if !was_running && now_running {
                self.cpus[cpu].running_count += 1;
            }
        }
        Ok(())
    }

    /// `x` (execute): transitions UNKNOWN -> RUNNING and binds the thread to
    /// the CPU with the given `phyid` within its own loom.
    pub fn execute(&mut self, thread: Gindex, phyid: i64) -> Result<(), Error> {
        self.apply_transition(thread, 'x')?;
        let loom_gindex = self.threads[thread].loom_gindex;
        let cpu = self.find_physical_cpu(loom_gindex, phyid)?;
        self.bind_thread_to_cpu(thread, cpu);
        Ok(())
    }

    /// `e` (end): transitions to DEAD and releases the thread's CPU.
    ///
    /// Unbinds before applying the transition: `running_count` bookkeeping
    /// keys off the occupant's state at unbind time, and by the time the
    /// thread is DEAD it no longer looks RUNNING to the CPU it is leaving.
    pub fn end(&mut self, thread: Gindex) -> Result<(), Error> {
        let state = self.threads[thread].state;
        let new_state = state.apply('e').ok_or(Error::BadTransition {
            gindex: thread,
            state,
            event: 'e',
        })?;
        self.unbind_thread(thread);
        self.threads[thread].state = new_state;
        Ok(())
    }

    /// `p`/`r`/`c`/`w`: pure state transitions, no CPU effect.
    pub fn pause(&mut self, thread: Gindex) -> Result<(), Error> {
        self.apply_transition(thread, 'p')
    }

    pub fn resume(&mut self, thread: Gindex) -> Result<(), Error> {
        self.apply_transition(thread, 'r')
    }

    pub fn cool(&mut self, thread: Gindex) -> Result<(), Error> {
        self.apply_transition(thread, 'c')
    }

    pub fn warm(&mut self, thread: Gindex) -> Result<(), Error> {
        self.apply_transition(thread, 'w')
    }

    /// `OAs` (affinity set): migrates `thread` to a new CPU within its own
    /// loom. No-op if already on that CPU.
    pub fn affinity_set(&mut self, thread: Gindex, phyid: i64) -> Result<(), Error> {
        let loom_gindex = self.threads[thread].loom_gindex;
        let new_cpu = self.find_physical_cpu(loom_gindex, phyid)?;
        if self.threads[thread].cpu == Some(new_cpu) {
            return Ok(());
        }
        self.unbind_thread(thread);
        self.bind_thread_to_cpu(thread, new_cpu);
        Ok(())
    }

    /// `OAr` (affinity remote): migrates the thread identified by `target_tid`
    /// (looked up first in `from_thread`'s own process, then across the rest
    /// of the loom) onto the CPU with the given `phyid`.
    pub fn affinity_remote(
        &mut self,
        from_thread: Gindex,
        phyid: i64,
        target_tid: i64,
    ) -> Result<(), Error> {
        let loom_gindex = self.threads[from_thread].loom_gindex;
        let own_proc = self.threads[from_thread].proc_gindex;
        let target = self
            .find_thread_in_process(own_proc, target_tid)
            .or_else(|| self.find_thread_in_loom(loom_gindex, target_tid))
            .ok_or(Error::UnknownThread {
                loom_gindex,
                tid: target_tid,
            })?;

        let target_state = self.threads[target].state;
        if target_state == ThreadState::Dead || target_state == ThreadState::Unknown {
            return Err(Error::UnknownThread {
                loom_gindex,
                tid: target_tid,
            });
        }

        let new_cpu = self.find_physical_cpu(loom_gindex, phyid)?;
        if self.threads[target].cpu == Some(new_cpu) {
            return Ok(());
        }
        self.unbind_thread(target);
        self.bind_thread_to_cpu(target, new_cpu);
        Ok(())
    }

    /// Derives the aggregate occupancy state of a CPU from its running
    /// occupants: 0 running -> idle, 1 -> that thread, >1 -> oversubscribed.
    pub fn cpu_aggregate(&self, cpu: Gindex) -> CpuAggregate {
        let c = &self.cpus[cpu];
        if c.running_count == 0 {
            return CpuAggregate::Idle;
        }
        if c.running_count > 1 {
            return CpuAggregate::Oversubscribed;
        }
        let running = c
            .occupants
            .iter()
            .copied()
            .find(|&t| self.threads[t].state == ThreadState::Running)
            .expect("running_count == 1 implies exactly one RUNNING occupant");
        CpuAggregate::Running(running)
    }

    fn bind_thread_to_cpu(&mut self, thread: Gindex, cpu: Gindex) {
        self.threads[thread].cpu = Some(cpu);
        self.cpus[cpu].occupants.push(thread);
        if self.threads[thread].state == ThreadState::Running {
            self.cpus[cpu].running_count += 1;
        }
    }

    fn unbind_thread(&mut self, thread: Gindex) {
        if let Some(cpu) = self.threads[thread].cpu.take() {
            let c = &mut self.cpus[cpu];
            c.occupants.retain(|&t| t != thread);
            if self.threads[thread].state == ThreadState::Running && c.running_count > 0 {
                c.running_count -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Cpu, ExtSlots, Loom, Process, Thread};

    fn two_thread_one_cpu_system() -> System {
        let threads = vec![
            Thread {
                gindex: 0,
                loom_gindex: 0,
                proc_gindex: 0,
                tid: 1,
                relpath: "t0".into(),
                state: ThreadState::Unknown,
                cpu: None,
                ext: ExtSlots::with_capacity(0),
            },
            Thread {
                gindex: 1,
                loom_gindex: 0,
                proc_gindex: 0,
                tid: 2,
                relpath: "t1".into(),
                state: ThreadState::Unknown,
                cpu: None,
                ext: ExtSlots::with_capacity(0),
            },
        ];
        let processes = vec![Process {
            gindex: 0,
            loom_gindex: 0,
            pid: 1,
            app_id: 1,
            rank: None,
            threads: vec![0, 1],
            ext: ExtSlots::with_capacity(0),
        }];
        let cpus = vec![Cpu {
            gindex: 0,
            loom_gindex: 0,
            phyid: Some(0),
            occupants: vec![],
            running_count: 0,
            ext: ExtSlots::with_capacity(0),
        }];
        let looms = vec![Loom {
            gindex: 0,
            hostname: "h".into(),
            loom_id: "0".into(),
            clock_offset: 0,
            cpus: vec![0],
            vcpu: 1,
            processes: vec![0],
            ext: ExtSlots::with_capacity(0),
        }];
        System { looms, processes, threads, cpus }
    }

    #[test]
    fn execute_binds_thread_and_marks_cpu_running() {
        let mut sys = two_thread_one_cpu_system();
        sys.execute(0, 0).unwrap();
        assert_eq!(sys.threads[0].state, ThreadState::Running);
        assert_eq!(sys.threads[0].cpu, Some(0));
        assert_eq!(sys.cpu_aggregate(0), CpuAggregate::Running(0));
    }

    #[test]
    fn end_frees_the_cpu_back_to_idle() {
        let mut sys = two_thread_one_cpu_system();
        sys.execute(0, 0).unwrap();
        sys.end(0).unwrap();
        assert_eq!(sys.threads[0].state, ThreadState::Dead);
        assert_eq!(sys.threads[0].cpu, None);
        assert_eq!(sys.cpu_aggregate(0), CpuAggregate::Idle);
    }

    #[test]
    fn two_runners_on_one_cpu_are_oversubscribed() {
        let mut sys = two_thread_one_cpu_system();
        sys.execute(0, 0).unwrap();
        sys.execute(1, 0).unwrap();
        assert_eq!(sys.cpu_aggregate(0), CpuAggregate::Oversubscribed);
        sys.end(1).unwrap();
        assert_eq!(sys.cpu_aggregate(0), CpuAggregate::Running(0));
    }

    #[test]
    fn pause_resume_round_trip_preserves_cpu_binding() {
        let mut sys = two_thread_one_cpu_system();
        sys.execute(0, 0).unwrap();
        sys.pause(0).unwrap();
        assert_eq!(sys.threads[0].state, ThreadState::Paused);
        // A paused thread stops counting as a CPU runner.
        assert_eq!(sys.cpu_aggregate(0), CpuAggregate::Idle);
        sys.resume(0).unwrap();
        assert_eq!(sys.threads[0].state, ThreadState::Running);
        assert_eq!(sys.threads[0].cpu, Some(0));
        assert_eq!(sys.cpu_aggregate(0), CpuAggregate::Running(0));
    }

    #[test]
    fn cool_then_warm_returns_to_running() {
        let mut sys = two_thread_one_cpu_system();
        sys.execute(0, 0).unwrap();
        sys.cool(0).unwrap();
        assert_eq!(sys.threads[0].state, ThreadState::Cooling);
        sys.pause(0).unwrap();
        assert_eq!(sys.threads[0].state, ThreadState::Paused);
        sys.warm(0).unwrap();
        assert_eq!(sys.threads[0].state, ThreadState::Warming);
        sys.resume(0).unwrap();
        assert_eq!(sys.threads[0].state, ThreadState::Running);
    }

    #[test]
    fn executing_an_already_running_thread_is_a_bad_transition() {
        let mut sys = two_thread_one_cpu_system();
        sys.execute(0, 0).unwrap();
        let err = sys.execute(0, 0).unwrap_err();
        assert!(matches!(err, Error::BadTransition { event: 'x', .. }));
    }

    #[test]
    fn execute_on_unknown_phyid_is_rejected() {
        let mut sys = two_thread_one_cpu_system();
        let err = sys.execute(0, 99).unwrap_err();
        assert!(matches!(err, Error::UnknownCpu { phyid: 99, .. }));
    }

    #[test]
    fn affinity_set_migrates_a_running_thread_between_cpus() {
        let mut sys = two_thread_one_cpu_system();
        sys.cpus.push(Cpu {
            gindex: 1,
            loom_gindex: 0,
            phyid: Some(1),
            occupants: vec![],
            running_count: 0,
            ext: ExtSlots::with_capacity(0),
        });
        sys.looms[0].cpus.push(1);

        sys.execute(0, 0).unwrap();
        sys.affinity_set(0, 1).unwrap();
        assert_eq!(sys.threads[0].cpu, Some(1));
        assert_eq!(sys.cpu_aggregate(0), CpuAggregate::Idle);
        assert_eq!(sys.cpu_aggregate(1), CpuAggregate::Running(0));
    }

    #[test]
    fn affinity_remote_moves_the_named_thread_not_the_caller() {
        let mut sys = two_thread_one_cpu_system();
        sys.cpus.push(Cpu {
            gindex: 1,
            loom_gindex: 0,
            phyid: Some(1),
            occupants: vec![],
            running_count: 0,
            ext: ExtSlots::with_capacity(0),
        });
        sys.looms[0].cpus.push(1);

        sys.execute(0, 0).unwrap();
        sys.execute(1, 0).unwrap();
        // thread 0 (tid 1) asks to move thread 1 (tid 2) onto cpu phyid 1.
        sys.affinity_remote(0, 1, 2).unwrap();
        assert_eq!(sys.threads[0].cpu, Some(0));
        assert_eq!(sys.threads[1].cpu, Some(1));
        assert_eq!(sys.cpu_aggregate(0), CpuAggregate::Running(0));
        assert_eq!(sys.cpu_aggregate(1), CpuAggregate::Running(1));
    }

    #[test]
    fn affinity_remote_rejects_an_unknown_target_tid() {
        let mut sys = two_thread_one_cpu_system();
        sys.execute(0, 0).unwrap();
        let err = sys.affinity_remote(0, 0, 999).unwrap_err();
        assert!(matches!(err, Error::UnknownThread { tid: 999, .. }));
    }

    #[test]
    fn affinity_remote_rejects_a_dead_target() {
        let mut sys = two_thread_one_cpu_system();
        sys.execute(1, 0).unwrap();
        sys.end(1).unwrap();
        let err = sys.affinity_remote(0, 0, 2).unwrap_err();
        assert!(matches!(err, Error::UnknownThread { tid: 2, .. }));
    }
}
