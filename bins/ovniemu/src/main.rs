//! `ovniemu`: walks a trace directory, replays every thread's event stream
//! in synchronized-clock order through the registered models, and writes
//! the resulting `thread.prv`/`cpu.prv` rows plus their shared `.pcf` label
//! dictionary.
//!
//! Opens everything up front, loops until the [`Player`] is exhausted, and
//! rate-reports progress along the way.

use anyhow::Context;
use clap::Parser;
use ovni_chan::Bay;
use ovni_config::Cli;
use ovni_models::{
    HostModel, ProbeCtx, Registry, XtasksModel, CPU_STATE_PRV_TYPE, SUBSYSTEM_PRV_TYPE,
    THREAD_STATE_PRV_TYPE,
};
use ovni_output::{PcfBuilder, PrvWriter};
use ovni_player::{Player, Step, StreamSlot};
use ovni_progress::Reporter;
use ovni_stream::{discover, ClockOffsetTable, Stream};
use ovni_system::build;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")))
        .init();

    let cli = Cli::parse();
    cli.validate().context("invalid arguments")?;

    let entries = discover(&cli.tracedir).context("failed to discover trace streams")?;
    let obs_paths: HashMap<String, PathBuf> =
        entries.iter().map(|e| (e.relpath.clone(), e.obs_path.clone())).collect();

    let clockoffsets = match &cli.clock_offsets {
        Some(path) => ClockOffsetTable::load(path).context("failed to load clock offset table")?,
        None => ClockOffsetTable::empty(),
    };

    let mut registry = Registry::new(cli.linter);
    let host_id = registry.register(Box::new(HostModel::new()));
    let xtasks_id = registry.register(Box::new(XtasksModel::new()));

    let mut sys = build(entries, &clockoffsets, registry.n_models())
        .context("failed to build the abstract machine")?;

    let probe_ctx = ProbeCtx { n_threads: sys.threads.len() };
    registry.probe_all(&probe_ctx, cli.enable_all).context("model probe failed")?;

    let mut bay = Bay::new();
    registry.create_all(&mut sys, &mut bay).context("model create failed")?;
    registry.connect_all(&mut sys, &mut bay).context("model connect failed")?;

    let mut thread_prv = PrvWriter::create(cli.tracedir.join("thread.prv"))?;
    if registry.is_enabled(host_id) {
        for gindex in 0..sys.threads.len() {
            let chan = HostModel::thread_state_channel(&sys, host_id, gindex);
            thread_prv.subscribe(chan, gindex as u64 + 1, THREAD_STATE_PRV_TYPE);
        }
    }
    if registry.is_enabled(xtasks_id) {
        for gindex in 0..sys.threads.len() {
            let chan = XtasksModel::subsystem_channel(&sys, xtasks_id, gindex);
            thread_prv.subscribe(chan, gindex as u64 + 1, SUBSYSTEM_PRV_TYPE);
        }
    }

    let mut cpu_prv = PrvWriter::create(cli.tracedir.join("cpu.prv"))?;
    if registry.is_enabled(host_id) {
        for gindex in 0..sys.cpus.len() {
            let chan = HostModel::cpu_channel(&sys, host_id, gindex);
            cpu_prv.subscribe(chan, gindex as u64 + 1, CPU_STATE_PRV_TYPE);
        }
    }

    let mut pcf = PcfBuilder::new();
    pcf.register_type(THREAD_STATE_PRV_TYPE, "Thread state");
    pcf.register_value(THREAD_STATE_PRV_TYPE, 1, "Running");
    pcf.register_value(THREAD_STATE_PRV_TYPE, 2, "Paused");
    pcf.register_value(THREAD_STATE_PRV_TYPE, 3, "Cooling");
    pcf.register_value(THREAD_STATE_PRV_TYPE, 4, "Warming");
    pcf.register_value(THREAD_STATE_PRV_TYPE, 5, "Dead");
    pcf.register_type(CPU_STATE_PRV_TYPE, "CPU occupancy");
    pcf.register_value(CPU_STATE_PRV_TYPE, 0xffffffff, "Oversubscribed");
    // Subsystem stack values are API-call ids defined by whatever runtime
    // produced the trace; the xtasks model registers each one's label as it
    // is first seen, so only the type itself is declared up front here.
    pcf.register_type(SUBSYSTEM_PRV_TYPE, "Subsystem");

    let mut slots = Vec::with_capacity(sys.threads.len());
    for thread in &sys.threads {
        let obs_path = obs_paths
            .get(&thread.relpath)
            .with_context(|| format!("no .obs file discovered for {}", thread.relpath))?;
        let stream = Stream::open(obs_path, thread.relpath.clone())?;
        slots.push(StreamSlot {
            gindex: thread.gindex,
            path: obs_path.clone(),
            stream,
            clock_offset: sys.looms[thread.loom_gindex].clock_offset,
        });
    }

    let mut player = Player::init(slots, cli.linter);
    let mut reporter = Reporter::new();

    loop {
        match player.step()? {
            Step::End => break,
            Step::Event(ev) => {
                registry.dispatch_event(&mut sys, &mut bay, ev.gindex, &ev.event, &mut pcf)?;
                bay.propagate()?;
                thread_prv.emit(ev.synchronized_clock, &bay)?;
                cpu_prv.emit(ev.synchronized_clock, &bay)?;
                if !cli.quiet {
                    reporter.tick(player.progress(), player.nprocessed());
                }
            }
        }
    }

    registry.finish_all(&sys, &bay).context("model finish failed")?;
    thread_prv.flush()?;
    cpu_prv.flush()?;
    pcf.write(cli.tracedir.join("ovni.pcf"))?;

    Ok(())
}
