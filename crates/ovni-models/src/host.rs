//! The host model (`'O'`): thread lifecycle and CPU affinity.
//!
//! Category `'H'` carries the thread state machine triggers (`x`/`e`/`p`/
//! `r`/`c`/`w`, plus a no-op `'C'` for thread creation), category `'A'`
//! carries affinity migrations (`'s'` set, `'r'` remote), both with the CPU
//! `phyid` as a little-endian `i32` at payload offset 0 (and the target
//! `tid` at offset 4 for `'r'`).
//!
//! Every thread gets a scalar "state" channel; every CPU (including each
//! loom's virtual CPU) gets a [`ovni_chan::Track`] whose inputs are that
//! loom's thread-state channels in a fixed order. The CPU's published
//! display value, though, comes straight from [`System::cpu_aggregate`]
//! rather than the track's own mux output, since that is the one place the
//! idle/running/oversubscribed distinction already lives.

use crate::error::Error;
use crate::registry::{Model, ProbeCtx, ProbeVerdict};
use ovni_chan::{Bay, ChanId, Channel, Track, Value};
use ovni_output::PcfBuilder;
use ovni_stream::DecodedEvent;
use ovni_system::{CpuAggregate, Gindex, System, ThreadState};

pub const MODEL_BYTE: u8 = b'O';

/// PRV type constant for the per-thread state row.
pub const THREAD_STATE_PRV_TYPE: u32 = 10;
/// PRV type constant for the per-CPU occupancy row.
pub const CPU_STATE_PRV_TYPE: u32 = 11;

struct ThreadExt {
    state_chan: ChanId,
}

struct CpuExt {
    selector: ChanId,
}

/// Stateless: every piece of bookkeeping this model needs lives in the
/// `System`'s own per-entity extension slots, keyed by this model's
/// registration id.
pub struct HostModel;

impl HostModel {
    pub fn new() -> Self {
        HostModel
    }

    /// The channel a driver should subscribe a `thread.prv` writer to for
    /// this thread's state row.
    pub fn thread_state_channel(sys: &System, model_id: usize, thread: Gindex) -> ChanId {
        sys.threads[thread].ext.get::<ThreadExt>(model_id).unwrap().state_chan
    }

    /// The channel a driver should subscribe a `cpu.prv` writer to for this
    /// CPU's occupancy row.
    pub fn cpu_channel(sys: &System, model_id: usize, cpu: Gindex) -> ChanId {
        sys.cpus[cpu].ext.get::<CpuExt>(model_id).unwrap().selector
    }
}

impl Default for HostModel {
    fn default() -> Self {
        Self::new()
    }
}

fn state_value(state: ThreadState) -> Value {
    match state {
        ThreadState::Unknown => Value::Null,
        ThreadState::Running => Value::Int(1),
        ThreadState::Paused => Value::Int(2),
        ThreadState::Cooling => Value::Int(3),
        ThreadState::Warming => Value::Int(4),
        ThreadState::Dead => Value::Int(5),
    }
}

fn read_i32(payload: &[u8], offset: usize, model: &'static str, category: u8, value: u8) -> Result<i32, Error> {
    payload
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(i32::from_le_bytes)
        .ok_or_else(|| Error::MalformedPayload {
            model,
            category,
            value,
            reason: format!("expected at least {} bytes, got {}", offset + 4, payload.len()),
        })
}

fn loom_thread_order(sys: &System, loom_gindex: Gindex) -> Vec<Gindex> {
    sys.looms[loom_gindex]
        .processes
        .iter()
        .flat_map(|&p| sys.processes[p].threads.iter().copied())
        .collect()
}

impl Model for HostModel {
    fn name(&self) -> &'static str {
        "host"
    }

    fn model_byte(&self) -> u8 {
        MODEL_BYTE
    }

    fn probe(&mut self, _model_id: usize, ctx: &ProbeCtx) -> ProbeVerdict {
        if ctx.n_threads == 0 {
            return ProbeVerdict::Disable;
        }
        ProbeVerdict::Enable
    }

    fn create(&mut self, model_id: usize, sys: &mut System, bay: &mut Bay) -> Result<(), Error> {
        for gindex in 0..sys.threads.len() {
            let chan = bay.add_channel(Channel::new_scalar(format!("thread.{}.state", gindex + 1)));
            sys.threads[gindex].ext.set(model_id, ThreadExt { state_chan: chan });
        }
        Ok(())
    }

    fn connect(&mut self, model_id: usize, sys: &mut System, bay: &mut Bay) -> Result<(), Error> {
        for loom_gindex in 0..sys.looms.len() {
            let loom_threads = loom_thread_order(sys, loom_gindex);
            let inputs: Vec<ChanId> = loom_threads
                .iter()
                .map(|&t| sys.threads[t].ext.get::<ThreadExt>(model_id).unwrap().state_chan)
                .collect();

            let cpus: Vec<Gindex> = sys.looms[loom_gindex]
                .cpus
                .iter()
                .copied()
                .chain(std::iter::once(sys.looms[loom_gindex].vcpu))
                .collect();

            for cpu_gindex in cpus {
                let selector = bay.add_channel(Channel::new_scalar(format!("cpu.{}.sel", cpu_gindex + 1)));
                let track = Track::new(bay, format!("cpu.{}.track", cpu_gindex + 1), selector, inputs.clone());
                sys.cpus[cpu_gindex].ext.set(
                    model_id,
                    CpuExt {
                        selector: track.selector(),
                    },
                );
            }
        }
        Ok(())
    }

    fn event(
        &mut self,
        model_id: usize,
        sys: &mut System,
        bay: &mut Bay,
        gindex: usize,
        event: &DecodedEvent,
        _pcf: &mut PcfBuilder,
    ) -> Result<(), Error> {
        match event.category {
            b'H' => self.event_thread(model_id, sys, bay, gindex, event),
            b'A' => self.event_affinity(model_id, sys, bay, gindex, event),
            other => Err(Error::UnexpectedEvent {
                model: self.name(),
                model_byte: event.model,
                category: other,
                value: event.value,
            }),
        }
    }

    fn finish(&mut self, _model_id: usize, _sys: &System, _bay: &Bay) -> Result<(), Error> {
        Ok(())
    }
}

impl HostModel {
    fn event_thread(
        &mut self,
        model_id: usize,
        sys: &mut System,
        bay: &mut Bay,
        gindex: usize,
        event: &DecodedEvent,
    ) -> Result<(), Error> {
        let old_cpu = sys.threads[gindex].cpu;
        match event.value {
            b'C' => {
                tracing::debug!(tid = sys.threads[gindex].tid, "thread create event, no state change");
                return Ok(());
            }
            b'x' => {
                let phyid = read_i32(&event.payload, 0, self.name(), event.category, event.value)? as i64;
                sys.execute(gindex, phyid)?;
            }
            b'e' => sys.end(gindex)?,
            b'p' => sys.pause(gindex)?,
            b'r' => sys.resume(gindex)?,
            b'c' => sys.cool(gindex)?,
            b'w' => sys.warm(gindex)?,
            other => {
                return Err(Error::UnexpectedEvent {
                    model: self.name(),
                    model_byte: event.model,
                    category: event.category,
                    value: other,
                });
            }
        }

        let state_chan = sys.threads[gindex].ext.get::<ThreadExt>(model_id).unwrap().state_chan;
        bay.set_scalar(state_chan, state_value(sys.threads[gindex].state))?;

        let new_cpu = sys.threads[gindex].cpu;
        if let Some(cpu) = old_cpu {
            recompute_track(sys, bay, model_id, cpu)?;
        }
        if new_cpu != old_cpu {
            if let Some(cpu) = new_cpu {
                recompute_track(sys, bay, model_id, cpu)?;
            }
        }
        Ok(())
    }

    fn event_affinity(
        &mut self,
        model_id: usize,
        sys: &mut System,
        bay: &mut Bay,
        gindex: usize,
        event: &DecodedEvent,
    ) -> Result<(), Error> {
        match event.value {
            b's' => {
                let phyid = read_i32(&event.payload, 0, self.name(), event.category, event.value)? as i64;
                let old_cpu = sys.threads[gindex].cpu;
                sys.affinity_set(gindex, phyid)?;
                let new_cpu = sys.threads[gindex].cpu;
                if new_cpu != old_cpu {
                    if let Some(cpu) = old_cpu {
                        recompute_track(sys, bay, model_id, cpu)?;
                    }
                    if let Some(cpu) = new_cpu {
                        recompute_track(sys, bay, model_id, cpu)?;
                    }
                }
                Ok(())
            }
            b'r' => {
                let phyid = read_i32(&event.payload, 0, self.name(), event.category, event.value)? as i64;
                let target_tid = read_i32(&event.payload, 4, self.name(), event.category, event.value)? as i64;

                let own_proc = sys.threads[gindex].proc_gindex;
                let loom_gindex = sys.threads[gindex].loom_gindex;
                let target = sys
                    .find_thread_in_process(own_proc, target_tid)
                    .or_else(|| sys.find_thread_in_loom(loom_gindex, target_tid));
                let old_cpu = target.and_then(|t| sys.threads[t].cpu);

                sys.affinity_remote(gindex, phyid, target_tid)?;

                let new_cpu = target.and_then(|t| sys.threads[t].cpu);
                if new_cpu != old_cpu {
                    if let Some(cpu) = old_cpu {
                        recompute_track(sys, bay, model_id, cpu)?;
                    }
                    if let Some(cpu) = new_cpu {
                        recompute_track(sys, bay, model_id, cpu)?;
                    }
                }
                Ok(())
            }
            other => {
                tracing::warn!(value = other, "unknown affinity event value, ignoring");
                Ok(())
            }
        }
    }
}

/// Recomputes this CPU's display value from [`System::cpu_aggregate`]: the
/// 1-based id of its sole `RUNNING` occupant (1-based so a thread's id never
/// collides with the `null` encoding idle uses), `null` when idle, or the
/// `bad` sentinel when oversubscribed.
fn recompute_track(sys: &System, bay: &mut Bay, model_id: usize, cpu: Gindex) -> Result<(), Error> {
    let ext = sys.cpus[cpu].ext.get::<CpuExt>(model_id).unwrap();
    let value = match sys.cpu_aggregate(cpu) {
        CpuAggregate::Idle => Value::Null,
        CpuAggregate::Running(thread) => Value::Int(thread as i64 + 1),
        CpuAggregate::Oversubscribed => Value::Bad,
    };
    let selector = ext.selector;
    bay.set_scalar(selector, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovni_system::{Cpu, ExtSlots, Loom, Process, Thread};

    fn two_thread_system() -> System {
        let threads = vec![
            Thread {
                gindex: 0,
                loom_gindex: 0,
                proc_gindex: 0,
                tid: 1,
                relpath: "t0".into(),
                state: ThreadState::Unknown,
                cpu: None,
                ext: ExtSlots::with_capacity(1),
            },
            Thread {
                gindex: 1,
                loom_gindex: 0,
                proc_gindex: 0,
                tid: 2,
                relpath: "t1".into(),
                state: ThreadState::Unknown,
                cpu: None,
                ext: ExtSlots::with_capacity(1),
            },
        ];
        let processes = vec![Process {
            gindex: 0,
            loom_gindex: 0,
            pid: 100,
            app_id: 1,
            rank: None,
            threads: vec![0, 1],
            ext: ExtSlots::with_capacity(1),
        }];
        let cpus = vec![
            Cpu {
                gindex: 0,
                loom_gindex: 0,
                phyid: Some(0),
                occupants: vec![],
                running_count: 0,
                ext: ExtSlots::with_capacity(1),
            },
            Cpu {
                gindex: 1,
                loom_gindex: 0,
                phyid: None,
                occupants: vec![],
                running_count: 0,
                ext: ExtSlots::with_capacity(1),
            },
        ];
        let looms = vec![Loom {
            gindex: 0,
            hostname: "host".into(),
            loom_id: "0".into(),
            clock_offset: 0,
            cpus: vec![0],
            vcpu: 1,
            processes: vec![0],
            ext: ExtSlots::with_capacity(1),
        }];
        System {
            looms,
            processes,
            threads,
            cpus,
        }
    }

    fn event(category: u8, value: u8, payload: Vec<u8>) -> DecodedEvent {
        DecodedEvent {
            flags: 0,
            model: MODEL_BYTE,
            category,
            value,
            raw_clock: 0,
            payload,
        }
    }

    #[test]
    fn execute_sets_state_and_cpu_track() {
        let mut sys = two_thread_system();
        let mut bay = Bay::new();
        let mut model = HostModel::new();

        model.create(0, &mut sys, &mut bay).unwrap();
        model.connect(0, &mut sys, &mut bay).unwrap();
        let mut pcf = PcfBuilder::new();

        let ev = event(b'H', b'x', 0i32.to_le_bytes().to_vec());
        model.event(0, &mut sys, &mut bay, 0, &ev, &mut pcf).unwrap();
        bay.propagate().unwrap();

        assert_eq!(sys.threads[0].state, ThreadState::Running);
        assert_eq!(sys.threads[0].cpu, Some(0));

        let thread_chan = sys.threads[0].ext.get::<ThreadExt>(0).unwrap().state_chan;
        assert_eq!(bay.last(thread_chan), Value::Int(1));

        let cpu_ext = sys.cpus[0].ext.get::<CpuExt>(0).unwrap();
        assert_eq!(bay.last(cpu_ext.selector), Value::Int(1));
    }

    #[test]
    fn end_clears_cpu_occupancy_and_track() {
        let mut sys = two_thread_system();
        let mut bay = Bay::new();
        let mut model = HostModel::new();
        model.create(0, &mut sys, &mut bay).unwrap();
        model.connect(0, &mut sys, &mut bay).unwrap();
        let mut pcf = PcfBuilder::new();

        let exec = event(b'H', b'x', 0i32.to_le_bytes().to_vec());
        model.event(0, &mut sys, &mut bay, 0, &exec, &mut pcf).unwrap();

        let end = event(b'H', b'e', vec![]);
        model.event(0, &mut sys, &mut bay, 0, &end, &mut pcf).unwrap();
        bay.propagate().unwrap();

        assert_eq!(sys.threads[0].state, ThreadState::Dead);
        assert_eq!(sys.threads[0].cpu, None);
        let cpu_ext = sys.cpus[0].ext.get::<CpuExt>(0).unwrap();
        assert_eq!(bay.last(cpu_ext.selector), Value::Null);
    }

    #[test]
    fn affinity_set_migrates_thread_between_cpus() {
        let mut sys = two_thread_system();
        sys.cpus.push(Cpu {
            gindex: 2,
            loom_gindex: 0,
            phyid: Some(1),
            occupants: vec![],
            running_count: 0,
            ext: ExtSlots::with_capacity(1),
        });
        sys.looms[0].cpus.push(2);
        sys.looms[0].vcpu = 3;
        sys.cpus.push(Cpu {
            gindex: 3,
            loom_gindex: 0,
            phyid: None,
            occupants: vec![],
            running_count: 0,
            ext: ExtSlots::with_capacity(1),
        });

        let mut bay = Bay::new();
        let mut model = HostModel::new();
        model.create(0, &mut sys, &mut bay).unwrap();
        model.connect(0, &mut sys, &mut bay).unwrap();
        let mut pcf = PcfBuilder::new();

        let exec = event(b'H', b'x', 0i32.to_le_bytes().to_vec());
        model.event(0, &mut sys, &mut bay, 0, &exec, &mut pcf).unwrap();

        let migrate = event(b'A', b's', 1i32.to_le_bytes().to_vec());
        model.event(0, &mut sys, &mut bay, 0, &migrate, &mut pcf).unwrap();
        bay.propagate().unwrap();

        assert_eq!(sys.threads[0].cpu, Some(2));
        let old_cpu_ext = sys.cpus[0].ext.get::<CpuExt>(0).unwrap();
        assert_eq!(bay.last(old_cpu_ext.selector), Value::Null);
        let new_cpu_ext = sys.cpus[2].ext.get::<CpuExt>(0).unwrap();
        assert_eq!(bay.last(new_cpu_ext.selector), Value::Int(1));
    }

    #[test]
    fn pausing_a_running_thread_drops_cpu_to_idle_without_unbinding() {
        let mut sys = two_thread_system();
        let mut bay = Bay::new();
        let mut model = HostModel::new();
        model.create(0, &mut sys, &mut bay).unwrap();
        model.connect(0, &mut sys, &mut bay).unwrap();
        let mut pcf = PcfBuilder::new();

        let exec = event(b'H', b'x', 0i32.to_le_bytes().to_vec());
        model.event(0, &mut sys, &mut bay, 0, &exec, &mut pcf).unwrap();

        let pause = event(b'H', b'p', vec![]);
        model.event(0, &mut sys, &mut bay, 0, &pause, &mut pcf).unwrap();
        bay.propagate().unwrap();

        assert_eq!(sys.threads[0].state, ThreadState::Paused);
        // Still affine to the same CPU, just no longer counted as running it.
        assert_eq!(sys.threads[0].cpu, Some(0));
        let cpu_ext = sys.cpus[0].ext.get::<CpuExt>(0).unwrap();
        assert_eq!(bay.last(cpu_ext.selector), Value::Null);

        let resume = event(b'H', b'r', vec![]);
        model.event(0, &mut sys, &mut bay, 0, &resume, &mut pcf).unwrap();
        bay.propagate().unwrap();
        assert_eq!(bay.last(cpu_ext.selector), Value::Int(1));
    }

    #[test]
    fn two_threads_running_on_one_cpu_report_oversubscribed() {
        let mut sys = two_thread_system();
        let mut bay = Bay::new();
        let mut model = HostModel::new();
        model.create(0, &mut sys, &mut bay).unwrap();
        model.connect(0, &mut sys, &mut bay).unwrap();
        let mut pcf = PcfBuilder::new();

        let exec = event(b'H', b'x', 0i32.to_le_bytes().to_vec());
        model.event(0, &mut sys, &mut bay, 0, &exec, &mut pcf).unwrap();
        model.event(0, &mut sys, &mut bay, 1, &exec, &mut pcf).unwrap();
        bay.propagate().unwrap();

        let cpu_ext = sys.cpus[0].ext.get::<CpuExt>(0).unwrap();
        assert_eq!(bay.last(cpu_ext.selector), Value::Bad);
    }
}
