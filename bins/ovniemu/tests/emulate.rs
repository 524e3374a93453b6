//! End-to-end tests: build a tiny synthetic trace tree, run the compiled
//! `ovniemu` binary against it, and check the `.prv`/`.pcf` files it writes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn ovniemu_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ovniemu"))
}

fn write_event(buf: &mut Vec<u8>, model: u8, category: u8, value: u8, clock: u64, payload: &[u8]) {
    assert!(payload.len() <= 16);
    let flags = if payload.is_empty() { 0u8 } else { (payload.len() - 1) as u8 };
    buf.push(flags);
    buf.push(model);
    buf.push(category);
    buf.push(value);
    buf.extend_from_slice(&clock.to_le_bytes());
    buf.extend_from_slice(&[0u8; 4]);
    buf.extend_from_slice(payload);
}

fn stream_bytes(events: &[(u8, u8, u8, u64, &[u8])]) -> Vec<u8> {
    let mut buf = b"OVNI\x01".to_vec();
    for &(model, category, value, clock, payload) in events {
        write_event(&mut buf, model, category, value, clock, payload);
    }
    buf
}

fn write_thread(
    tracedir: &Path,
    host: &str,
    loom_id: &str,
    pid: i64,
    tid: i64,
    cpus: &str,
    events: &[(u8, u8, u8, u64, &[u8])],
) {
    let proc_dir = tracedir
        .join(format!("loom.{host}.{loom_id}"))
        .join(format!("proc.{pid}"));
    fs::create_dir_all(&proc_dir).unwrap();
    fs::write(
        proc_dir.join("metadata.json"),
        format!(r#"{{"version":1,"app_id":1,"cpus":{cpus}}}"#),
    )
    .unwrap();
    fs::write(proc_dir.join(format!("thread.{tid}.obs")), stream_bytes(events)).unwrap();
    fs::write(
        proc_dir.join(format!("thread.{tid}.json")),
        r#"{"version":1,"ovni":{"lib":{"version":"1.0","commit":"abc"},"require":{},"finished":true}}"#,
    )
    .unwrap();
}

#[test]
fn single_thread_execute_and_end_produce_prv_rows() {
    let dir = tempfile::tempdir().unwrap();
    let phyid0 = 0i32.to_le_bytes();
    write_thread(
        dir.path(),
        "host1",
        "0",
        1,
        1,
        r#"[{"index":0,"phyid":0}]"#,
        &[
            (b'O', b'H', b'x', 100, &phyid0),
            (b'O', b'H', b'e', 200, &[]),
        ],
    );

    let status = Command::new(ovniemu_bin()).arg(dir.path()).status().unwrap();
    assert!(status.success());

    // Every subscribed row gets a baseline line the first time it is
    // observed, even a row (here: the xtasks subsystem row, since this
    // trace carries no `'X'` events, and the virtual CPU's occupancy row)
    // that never actually changes.
    let thread_prv = fs::read_to_string(dir.path().join("thread.prv")).unwrap();
    assert_eq!(thread_prv, "100:1:10:1\n100:1:20:0\n200:1:10:5\n");

    let cpu_prv = fs::read_to_string(dir.path().join("cpu.prv")).unwrap();
    assert_eq!(cpu_prv, "100:1:11:1\n100:2:11:0\n200:1:11:0\n");

    let pcf = fs::read_to_string(dir.path().join("ovni.pcf")).unwrap();
    assert!(pcf.contains("Thread state"));
    assert!(pcf.contains("1\tRunning"));
    assert!(pcf.contains("CPU occupancy"));
    assert!(pcf.contains("Oversubscribed"));
    assert!(pcf.contains("Subsystem"));
}

#[test]
fn two_threads_on_one_cpu_report_oversubscription() {
    let dir = tempfile::tempdir().unwrap();
    let phyid0 = 0i32.to_le_bytes();
    write_thread(
        dir.path(),
        "host1",
        "0",
        1,
        1,
        r#"[{"index":0,"phyid":0}]"#,
        &[(b'O', b'H', b'x', 100, &phyid0), (b'O', b'H', b'e', 300, &[])],
    );
    write_thread(
        dir.path(),
        "host1",
        "0",
        1,
        2,
        r#"[{"index":0,"phyid":0}]"#,
        &[(b'O', b'H', b'x', 110, &phyid0), (b'O', b'H', b'e', 120, &[])],
    );

    let status = Command::new(ovniemu_bin()).arg(dir.path()).status().unwrap();
    assert!(status.success());

    let cpu_prv = fs::read_to_string(dir.path().join("cpu.prv")).unwrap();
    // thread 1 alone at t=100 (plus the virtual CPU's one-time baseline
    // line), both running (oversubscribed) at t=110, back to thread 1
    // alone at t=120, idle at t=300.
    assert_eq!(
        cpu_prv,
        format!("100:1:11:1\n100:2:11:0\n110:1:11:{}\n120:1:11:1\n300:1:11:0\n", 0xffffffffu32)
    );
}

#[test]
fn repeated_runs_produce_identical_output() {
    let phyid0 = 0i32.to_le_bytes();
    let events: &[(u8, u8, u8, u64, &[u8])] = &[
        (b'O', b'H', b'x', 100, &phyid0),
        (b'O', b'H', b'p', 150, &[]),
        (b'O', b'H', b'r', 175, &[]),
        (b'O', b'H', b'e', 200, &[]),
    ];

    let mut runs = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        write_thread(dir.path(), "host1", "0", 1, 1, r#"[{"index":0,"phyid":0}]"#, events);
        let status = Command::new(ovniemu_bin()).arg(dir.path()).status().unwrap();
        assert!(status.success());
        runs.push(fs::read_to_string(dir.path().join("thread.prv")).unwrap());
    }
    assert_eq!(runs[0], runs[1]);
}

#[test]
fn xtasks_push_and_pop_produce_subsystem_rows_and_pcf_label() {
    let dir = tempfile::tempdir().unwrap();
    let phyid0 = 0i32.to_le_bytes();

    fn subsystem_payload(id: u32, kind: u32) -> Vec<u8> {
        let mut p = Vec::with_capacity(16);
        p.extend_from_slice(&0u64.to_le_bytes());
        p.extend_from_slice(&id.to_le_bytes());
        p.extend_from_slice(&kind.to_le_bytes());
        p
    }
    let push = subsystem_payload(0x4e, 0);
    let pop = subsystem_payload(0x4e, 1);

    write_thread(
        dir.path(),
        "host1",
        "0",
        1,
        1,
        r#"[{"index":0,"phyid":0}]"#,
        &[
            (b'O', b'H', b'x', 50, &phyid0),
            (b'X', b's', b'e', 100, &push),
            (b'X', b's', b'e', 200, &pop),
            (b'O', b'H', b'e', 300, &[]),
        ],
    );

    let status = Command::new(ovniemu_bin()).arg(dir.path()).status().unwrap();
    assert!(status.success());

    let thread_prv = fs::read_to_string(dir.path().join("thread.prv")).unwrap();
    assert!(thread_prv.contains("100:1:20:78\n"));
    assert!(thread_prv.contains("200:1:20:0\n"));

    let pcf = fs::read_to_string(dir.path().join("ovni.pcf")).unwrap();
    assert!(pcf.contains("Subsystem"));
    assert!(pcf.contains("78\t0x4e"));
}

#[test]
fn linter_mode_rejects_a_clock_regression() {
    let dir = tempfile::tempdir().unwrap();
    write_thread(
        dir.path(),
        "host1",
        "0",
        1,
        1,
        r#"[{"index":0,"phyid":0}]"#,
        &[(b'O', b'H', b'x', 200, &0i32.to_le_bytes()), (b'O', b'H', b'e', 0, &[])],
    );

    let status = Command::new(ovniemu_bin())
        .arg(dir.path())
        .arg("--linter")
        .status()
        .unwrap();
    assert!(!status.success());
}
