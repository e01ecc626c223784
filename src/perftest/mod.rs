//! A fork/thread fan-out performance harness over a shared-memory region,
//! grounded on `C-kern/test/perftest.c`.
//!
//! [`exec`] folds the teacher's `new_perftest` + `measure_perftest` +
//! `delete_perftest` trio into one call, matching the public contract
//! spec.md §4.4 describes directly. Three pipes carry the barrier
//! protocol (prepare / run+process-start / ready); a single `MAP_SHARED`
//! region carries the per-instance timing fields back across `fork`.

mod layout;

use crate::platform::pages::Pages;
use crate::platform::pipe::{self, PipeRead, PipeWrite};
use crate::platform::process::{self, ExitState};
use crate::platform::thread;
use crate::platform::PlatformError;
use layout::{region_size, Region};
use std::sync::Arc;
use thiserror::Error;

/// Every barrier/ready read uses this timeout (spec.md §4.4).
const TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum PerfTestError {
    #[error("nrprocess and nrthread_per_process must both be nonzero")]
    InvalidArgument,
    #[error("nrprocess * nrthread_per_process overflows a 32-bit instance count")]
    SizeOverflow,
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("a worker reported cancellation during {0}")]
    Cancelled(&'static str),
    #[error("a worker process exited abnormally")]
    ProcessFailed,
}

/// A callback invoked once per instance per phase; zero means success,
/// matching spec.md §6's `fn(instance) -> i32` surface.
pub type Callback = Arc<dyn Fn(&mut Instance) -> i32 + Send + Sync>;

/// The three optional phase callbacks a [`exec`] run drives per instance.
#[derive(Clone, Default)]
pub struct Implementation {
    pub prepare: Option<Callback>,
    pub run: Option<Callback>,
    pub unprepare: Option<Callback>,
}

/// A single worker's view of its own record plus the caller's shared
/// payload (spec.md §3.5: "four user-writable fields... back-pointer").
pub struct Instance {
    id: u32,
    shared_addr: *mut u8,
    shared_size: usize,
    region: Region,
}

impl Instance {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The caller-owned shared payload passed into [`exec`], visible
    /// identically in every process (it lives in the same `MAP_SHARED`
    /// region as the instance records).
    pub fn shared(&self) -> (*mut u8, usize) {
        (self.shared_addr, self.shared_size)
    }

    pub fn nrops(&self) -> u64 {
        unsafe { self.region.instance(self.id).nrops }
    }

    pub fn set_nrops(&mut self, n: u64) {
        unsafe { self.region.instance(self.id).nrops = n };
    }

    pub fn set_addr(&mut self, addr: usize) {
        unsafe { self.region.instance(self.id).addr = addr };
    }

    pub fn set_size(&mut self, size: usize) {
        unsafe { self.region.instance(self.id).size = size };
    }
}

/// Writes `count` bytes of `value` to `pipe`, in chunks, ignoring the
/// result — used only for best-effort abort signalling during teardown
/// (spec.md §7: "teardown is best-effort... never masks a more specific
/// prior error").
fn signal_abort_best_effort(pipe: &PipeWrite, count: u32) {
    if count == 0 {
        return;
    }
    let buf = vec![1u8; count as usize];
    let _ = pipe.write_all(&buf, TIMEOUT_MS);
}

/// Runs `impl_` over `nrprocess * nrthread_per_process` instances, each
/// seeing `shared_addr`/`shared_size` as its shared payload. Returns
/// `(total_ops, max_usec)` — the sum of every instance's `nrops` and the
/// largest per-instance elapsed run time (spec.md §4.4/§8 invariant 9).
pub fn exec(
    impl_: Implementation,
    shared_addr: *mut u8,
    shared_size: usize,
    nrprocess: u16,
    nrthread_per_process: u16,
) -> Result<(u64, u64), PerfTestError> {
    if nrprocess == 0 || nrthread_per_process == 0 {
        return Err(PerfTestError::InvalidArgument);
    }
    let nrinstance = (nrprocess as u32)
        .checked_mul(nrthread_per_process as u32)
        .ok_or(PerfTestError::SizeOverflow)?;
    let bytes = region_size(nrinstance).ok_or(PerfTestError::SizeOverflow)?;

    // State 1: shared region.
    let pages = Pages::alloc(bytes, true)?;
    let region = Region::new(pages.as_ptr());
    unsafe {
        let header = region.header_mut();
        header.pagesize = pages.len();
        header.nrinstance = nrinstance;
        header.nrprocess = nrprocess;
        header.nrthread = nrthread_per_process;
        header.shared_addr = shared_addr as usize;
        header.shared_size = shared_size;
        header.start_secs = 0;
        header.start_nanos = 0;
        for id in 0..nrinstance {
            let inst = region.instance(id);
            inst.id = id;
            inst.nrops = 0;
            inst.usec = 0;
            inst.addr = 0;
            inst.size = 0;
        }
    }

    // States 2-4: the three barrier pipes.
    let (prep_r, prep_w) = pipe::create()?;
    let (run_r, run_w) = pipe::create()?;
    let (ready_r, ready_w) = pipe::create()?;

    let prep_r_fd = prep_r.as_raw_fd();
    let run_r_fd = run_r.as_raw_fd();
    let ready_w_fd = ready_w.as_raw_fd();

    // State 5: fork nrprocess children.
    let mut children = Vec::with_capacity(nrprocess as usize);
    for pid in 0..nrprocess {
        let impl_for_child = impl_.clone();
        let first_id = pid as u32 * nrthread_per_process as u32;
        match process::fork_exec(move || {
            run_child_process(
                region,
                first_id,
                nrthread_per_process,
                impl_for_child,
                prep_r_fd,
                run_r_fd,
                ready_w_fd,
            )
        }) {
            Ok(handle) => children.push(handle),
            Err(e) => {
                signal_abort_best_effort(&run_w, nrprocess as u32);
                reap_best_effort(children);
                return Err(e.into());
            }
        }
    }

    // Release the process-start gate (spec.md §4.4, "run barrier... one
    // byte per process").
    if let Err(e) = run_w.write_all(&vec![0u8; nrprocess as usize], TIMEOUT_MS) {
        signal_abort_best_effort(&prep_w, nrinstance);
        reap_best_effort(children);
        return Err(e.into());
    }

    // Wait for every thread's "I started" ack.
    if let Err(e) = drain_ready(&ready_r, nrinstance) {
        signal_abort_best_effort(&prep_w, nrinstance);
        reap_best_effort(children);
        return Err(e);
    }

    // Prepare phase.
    if let Err(e) = write_release(&prep_w, nrinstance) {
        reap_best_effort(children);
        return Err(e);
    }
    if let Err(e) = drain_ready(&ready_r, nrinstance) {
        signal_abort_best_effort(&run_w, nrinstance);
        reap_best_effort(children);
        return Err(e);
    }

    // Run phase: stamp the start time, then release.
    let start = crate::platform::clock::Timestamp::now();
    unsafe {
        let header = region.header_mut();
        header.start_secs = start.secs;
        header.start_nanos = start.nanos;
    }
    if let Err(e) = write_release(&run_w, nrinstance) {
        reap_best_effort(children);
        return Err(e);
    }

    // Reap every process; any abnormal exit is reported as ProcessFailed
    // but teardown of the remaining children still proceeds.
    let mut first_err = None;
    for child in children {
        match process::wait(child) {
            Ok(ExitState::Exited(0)) => {}
            Ok(_) => first_err.get_or_insert(PerfTestError::ProcessFailed),
            Err(e) => first_err.get_or_insert(e.into()),
        };
    }
    if let Some(e) = first_err {
        return Err(e);
    }

    let mut total_ops = 0u64;
    let mut max_usec = 0u64;
    unsafe {
        for id in 0..nrinstance {
            let inst = region.instance(id);
            total_ops += inst.nrops;
            max_usec = max_usec.max(inst.usec);
        }
    }
    Ok((total_ops, max_usec))
}

fn write_release(pipe: &PipeWrite, nrinstance: u32) -> Result<(), PerfTestError> {
    pipe.write_all(&vec![0u8; nrinstance as usize], TIMEOUT_MS)
        .map_err(PerfTestError::from)
}

fn drain_ready(ready_r: &PipeRead, nrinstance: u32) -> Result<(), PerfTestError> {
    for _ in 0..nrinstance {
        match ready_r.read_byte(TIMEOUT_MS) {
            Ok(0) => {}
            Ok(_) => return Err(PerfTestError::Cancelled("ready report")),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn reap_best_effort(children: Vec<process::ProcessHandle>) {
    for child in children {
        let _ = process::wait(child);
    }
}

/// Runs inside a freshly forked child: spawns `nrthread` worker threads
/// covering instances `[first_id, first_id + nrthread)`, joins them, and
/// returns the process's exit code (0 = every worker succeeded).
fn run_child_process(
    region: Region,
    first_id: u32,
    nrthread: u16,
    impl_: Implementation,
    prep_r_fd: std::os::fd::RawFd,
    run_r_fd: std::os::fd::RawFd,
    ready_w_fd: std::os::fd::RawFd,
) -> i32 {
    // SAFETY: these fds were duplicated into this process by `fork`, each
    // still open and not yet owned by anything else here.
    let prep_r = Arc::new(unsafe { PipeRead::from_raw_fd(prep_r_fd) });
    let run_r = Arc::new(unsafe { PipeRead::from_raw_fd(run_r_fd) });
    let ready_w = Arc::new(unsafe { PipeWrite::from_raw_fd(ready_w_fd) });

    // Process-level start gate: the first `nrprocess` bytes on the run
    // pipe (spec.md §4.4, "release process startup").
    match run_r.read_byte(TIMEOUT_MS) {
        Ok(0) => {}
        _ => return 1,
    }

    let handles: Vec<_> = (0..nrthread)
        .map(|t| {
            let id = first_id + t as u32;
            let impl_ = impl_.clone();
            let prep_r = prep_r.clone();
            let run_r = run_r.clone();
            let ready_w = ready_w.clone();
            thread::spawn(move || run_worker_thread(region, id, impl_, prep_r, run_r, ready_w))
        })
        .collect();

    let mut iserr = false;
    for h in handles {
        match thread::join(h) {
            Some(0) => {}
            _ => iserr = true,
        }
    }
    if iserr {
        1
    } else {
        0
    }
}

/// One worker's full lifecycle: announce start, wait for the prepare
/// barrier, run `prepare`/`run`/`unprepare`, reporting `1` on the ready
/// channel at the first failure (spec.md §4.4's per-thread cascade).
fn run_worker_thread(
    region: Region,
    id: u32,
    impl_: Implementation,
    prep_r: Arc<PipeRead>,
    run_r: Arc<PipeRead>,
    ready_w: Arc<PipeWrite>,
) -> i32 {
    if ready_w.write_byte(0, TIMEOUT_MS).is_err() {
        return 1;
    }

    match prep_r.read_byte(TIMEOUT_MS) {
        Ok(0) => {}
        _ => return 1,
    }

    let mut instance = Instance {
        id,
        shared_addr: unsafe { region.header().shared_addr as *mut u8 },
        shared_size: unsafe { region.header().shared_size },
        region,
    };

    let mut prepared = false;
    if let Some(cb) = &impl_.prepare {
        if cb(&mut instance) != 0 {
            let _ = ready_w.write_byte(1, TIMEOUT_MS);
            return 1;
        }
    }
    prepared = true;

    if ready_w.write_byte(0, TIMEOUT_MS).is_err() {
        if let Some(cb) = &impl_.unprepare {
            cb(&mut instance);
        }
        return 1;
    }

    match run_r.read_byte(TIMEOUT_MS) {
        Ok(0) => {}
        _ => {
            if prepared {
                if let Some(cb) = &impl_.unprepare {
                    cb(&mut instance);
                }
            }
            let _ = ready_w.write_byte(1, TIMEOUT_MS);
            return 1;
        }
    }

    let mut run_failed = false;
    if let Some(cb) = &impl_.run {
        if cb(&mut instance) != 0 {
            run_failed = true;
        }
    }
    if !run_failed {
        let now = crate::platform::clock::Timestamp::now();
        let start = unsafe {
            let header = region.header();
            crate::platform::clock::Timestamp {
                secs: header.start_secs,
                nanos: header.start_nanos,
            }
        };
        unsafe {
            region.instance(id).usec = now.since(start).as_micros() as u64;
        }
    }

    if let Some(cb) = &impl_.unprepare {
        if cb(&mut instance) != 0 {
            let _ = ready_w.write_byte(1, TIMEOUT_MS);
            return 1;
        }
    }

    if run_failed {
        let _ = ready_w.write_byte(1, TIMEOUT_MS);
        return 1;
    }
    0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_zero_process_or_thread_counts() {
        assert!(matches!(
            exec(Implementation::default(), std::ptr::null_mut(), 0, 0, 1),
            Err(PerfTestError::InvalidArgument)
        ));
        assert!(matches!(
            exec(Implementation::default(), std::ptr::null_mut(), 0, 1, 0),
            Err(PerfTestError::InvalidArgument)
        ));
    }

    #[test]
    fn five_by_four_with_a_sleeping_run_reports_twenty_ops() {
        crate::testsupport::resourceusage::assert_no_leaks(|| {
            let run: Callback = Arc::new(|inst: &mut Instance| {
                inst.set_nrops(1);
                std::thread::sleep(std::time::Duration::from_millis(12));
                0
            });
            let impl_ = Implementation {
                prepare: None,
                run: Some(run),
                unprepare: None,
            };
            let (total_ops, max_usec) =
                exec(impl_, std::ptr::null_mut(), 0, 5, 4).expect("exec succeeds");
            assert_eq!(total_ops, 20);
            assert!(max_usec >= 12_000, "max_usec={max_usec}");
            assert!(max_usec <= 50_000, "max_usec={max_usec}");
        });
    }

    #[test]
    fn a_failing_prepare_cancels_the_whole_run() {
        crate::testsupport::resourceusage::assert_no_leaks(|| {
            let prepare: Callback = Arc::new(|inst: &mut Instance| if inst.id() == 0 { 1 } else { 0 });
            let impl_ = Implementation {
                prepare: Some(prepare),
                run: None,
                unprepare: None,
            };
            let result = exec(impl_, std::ptr::null_mut(), 0, 2, 2);
            assert!(result.is_err());
        });
    }
}
