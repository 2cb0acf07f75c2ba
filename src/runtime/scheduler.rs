//! Thread-per-block scheduler for flow graphs
//!
//! Spawns a dedicated driver thread for each block and manages the run's
//! lifecycle. Each driver repeatedly sizes an invocation against the
//! block's forecast, calls `general_work`, audits the consume/produce/tag
//! accounting, and publishes buffer cursors. A block is therefore
//! serialized with respect to itself while different blocks run in
//! parallel, synchronized only through the stream buffers they share.
//!
//! Blocking happens *between* work calls: a driver whose block is
//! input-starved or output-blocked parks on the buffer condvars until a
//! neighbor's cursor advance (or end-of-stream, or a stop) wakes it.
//!
//! Fatal conditions — contract violations, work errors, panics out of
//! `general_work` — raise the run-wide stop flag, propagate end-of-stream
//! downstream, and surface as a [`RunError`] from [`Scheduler::wait`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use super::block::{Block, WorkReturn};
use super::detail::BlockDetail;
use super::errors::RunError;
use super::ports::{InputPort, OutputPort};
use super::tag::Tag;
use super::watchdog::Watchdog;

/// Idle pause when a block makes no progress and there is nothing concrete
/// to wait on.
const IDLE_SLICE: Duration = Duration::from_millis(10);

type Completion = (String, Result<(), RunError>);

/// Runtime scheduler that executes a flow graph
pub struct Scheduler {
    threads: Vec<(String, JoinHandle<()>)>,
    stop_signal: Arc<AtomicBool>,
    completion_tx: Sender<Completion>,
    completion_rx: Option<Receiver<Completion>>,
    watchdog: Watchdog,
    watchdog_handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Create a new scheduler with watchdog monitoring
    pub(crate) fn new() -> Self {
        let (completion_tx, completion_rx) = unbounded();
        let watchdog = Watchdog::new();
        let watchdog_handle = watchdog.start_monitoring_thread();
        Self {
            threads: Vec::new(),
            stop_signal: Arc::new(AtomicBool::new(false)),
            completion_tx,
            completion_rx: Some(completion_rx),
            watchdog,
            watchdog_handle: Some(watchdog_handle),
        }
    }

    /// Get a reference to the watchdog
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Spawn the driver thread for one block. The block must already have
    /// had its `start` hook invoked.
    pub(crate) fn start_block(&mut self, mut block: Box<dyn Block>, mut detail: BlockDetail) {
        let name = block.name().to_string();
        for (i, reader) in detail.inputs.iter_mut().enumerate() {
            reader.attach_watchdog(self.watchdog.register(&name, "input", i));
        }
        for (j, writer) in detail.outputs.iter_mut().enumerate() {
            writer.attach_watchdog(self.watchdog.register(&name, "output", j));
        }

        let stop_signal = Arc::clone(&self.stop_signal);
        let completion_tx = self.completion_tx.clone();
        let thread_name = name.clone();

        debug!("Starting block driver: {}", name);

        let handle = thread::spawn(move || {
            detail.mark_running();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                drive_block(&thread_name, block.as_mut(), &mut detail, &stop_signal)
            }))
            .unwrap_or_else(|_| {
                Err(RunError::ContractViolation {
                    block: thread_name.clone(),
                    reason: "general_work panicked".to_string(),
                })
            });

            if let Err(ref e) = result {
                error!("[{}] fatal: {}", thread_name, e);
                // Abort the run; peers wind down on their next wait slice.
                stop_signal.store(true, Ordering::Relaxed);
            }

            // Downstream must always see end-of-stream, whatever the exit
            // path was.
            detail.propagate_done();

            detail.mark_stopping();
            if detail.mark_stopped() {
                if let Err(e) = block.stop() {
                    warn!("[{}] stop hook failed: {}", thread_name, e);
                }
            }

            info!("[{}] shutdown", thread_name);
            let _ = completion_tx.send((thread_name.clone(), result));
        });

        self.threads.push((name, handle));
    }

    /// Signal every block driver to stop
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::Relaxed);
    }

    /// Wait for all block drivers to complete, returning the first fatal
    /// error if the run failed.
    ///
    /// Uses a completion notification channel to join threads as they
    /// finish.
    pub fn wait(mut self) -> Result<(), RunError> {
        let completion_rx = self
            .completion_rx
            .take()
            .expect("completion_rx already taken");

        // Drop the main completion sender so the channel closes when all
        // threads complete.
        drop(self.completion_tx);

        let total_threads = self.threads.len();
        let mut completed = 0;
        let mut first_error = None;

        debug!("Waiting for {} block drivers to complete...", total_threads);

        let mut threads_by_name: HashMap<String, JoinHandle<()>> =
            self.threads.into_iter().collect();

        while completed < total_threads {
            match completion_rx.recv() {
                Ok((thread_name, result)) => {
                    completed += 1;
                    if let Err(e) = result {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                    if let Some(handle) = threads_by_name.remove(&thread_name) {
                        match handle.join() {
                            Ok(_) => debug!(
                                "[{}] driver completed ({}/{})",
                                thread_name, completed, total_threads
                            ),
                            Err(e) => error!(
                                "[{}] driver panicked ({}/{}): {:?}",
                                thread_name, completed, total_threads, e
                            ),
                        }
                    }
                }
                Err(_) => break,
            }
        }

        info!("All {} block drivers completed", total_threads);

        self.watchdog.stop();
        if let Some(handle) = self.watchdog_handle.take() {
            let _ = handle.join();
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Get the number of running block drivers
    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    /// Get the names of all running block drivers
    pub fn thread_names(&self) -> Vec<String> {
        self.threads.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// The per-block driver loop: size, forecast, invoke, audit, publish.
fn drive_block(
    name: &str,
    block: &mut dyn Block,
    detail: &mut BlockDetail,
    stop: &AtomicBool,
) -> Result<(), RunError> {
    let multiple = block.output_multiple().max(1);
    let history = block.history().max(1);
    let had_consumers = detail.outputs.iter().any(|w| w.has_readers());

    'driver: while !stop.load(Ordering::Relaxed) {
        // Every consumer this block ever had has departed: nothing it
        // could produce will ever be read, so downstream end-of-stream
        // implies this block is done too.
        if had_consumers && detail.outputs.iter().all(|w| !w.has_readers()) {
            debug!("[{}] all consumers departed", name);
            break 'driver;
        }

        // ── 1. Candidate output size ─────────────────────────────
        let mut residual = false;
        let mut candidate = if detail.outputs.is_empty() {
            // Sinks are sized from input availability instead.
            let min_avail = detail
                .inputs
                .iter()
                .map(|r| r.items_available())
                .min()
                .unwrap_or(0);
            let usable = min_avail.saturating_sub(history - 1);
            usable - usable % multiple
        } else {
            let space = detail
                .outputs
                .iter()
                .map(|w| w.space_available())
                .min()
                .unwrap_or(0);
            space - space % multiple
        };

        if candidate == 0 {
            if detail.outputs.is_empty() {
                if detail.inputs.iter().all(|r| r.is_done()) {
                    if detail.inputs_drained() {
                        break 'driver;
                    }
                    // Leftovers smaller than history + multiple: one last
                    // call with the residual.
                    residual = true;
                    candidate = multiple;
                } else if let Some(shortest) = detail
                    .inputs
                    .iter()
                    .min_by_key(|r| r.items_available())
                {
                    shortest.wait_for_items(history - 1 + multiple, stop);
                    continue 'driver;
                }
            } else {
                // Output-blocked.
                if let Some(fullest) = detail
                    .outputs
                    .iter()
                    .min_by_key(|w| w.space_available())
                {
                    fullest.wait_for_space(multiple, stop);
                }
                continue 'driver;
            }
        }

        // ── 2. Fit the candidate to the inputs ───────────────────
        if !detail.inputs.is_empty() && !residual {
            if block.fixed_rate() {
                // Exact conversions let us size the call without probing
                // forecast repeatedly.
                let min_avail = detail
                    .inputs
                    .iter()
                    .map(|r| r.items_available())
                    .min()
                    .unwrap_or(0);
                let supported = block.fixed_rate_ninput_to_noutput(min_avail);
                let supported = supported - supported % multiple;
                candidate = candidate.min(supported.max(multiple));
            }

            let mut required = vec![0usize; detail.inputs.len()];
            loop {
                block.forecast(candidate, &mut required);
                let short = detail
                    .inputs
                    .iter()
                    .zip(&required)
                    .position(|(r, &req)| r.items_available() < req);
                let Some(idx) = short else { break };

                if candidate > multiple {
                    // Scale the request toward what this input supports;
                    // the forecast is close to linear for most blocks.
                    let avail = detail.inputs[idx].items_available();
                    let scaled = candidate * avail / required[idx].max(1);
                    let next = scaled.clamp(multiple, candidate - multiple);
                    candidate = next - next % multiple;
                    continue;
                }
                if detail.inputs.iter().any(|r| r.is_done()) {
                    if detail.inputs_drained() {
                        break 'driver;
                    }
                    // A terminal upstream can never satisfy the forecast:
                    // run with the residual.
                    break;
                }
                // Input-blocked: wait for the shortfall, then re-plan.
                detail.inputs[idx].wait_for_items(required[idx], stop);
                continue 'driver;
            }
        }

        if stop.load(Ordering::Relaxed) {
            break 'driver;
        }
        if !detail.inputs.is_empty() && detail.inputs_drained() {
            break 'driver;
        }

        // ── 3. Invoke ────────────────────────────────────────────
        let navails: Vec<usize> = detail
            .inputs
            .iter()
            .map(|r| r.items_available())
            .collect();
        let (readers, writers) = detail.endpoints();
        let mut in_ports: Vec<InputPort<'_>> = readers
            .iter()
            .zip(&navails)
            .map(|(r, &n)| InputPort::new(r, n))
            .collect();
        let mut out_ports: Vec<OutputPort<'_>> = writers
            .iter_mut()
            .map(|w| OutputPort::new(w, candidate))
            .collect();

        let ret = match block.general_work(candidate, &mut in_ports, &mut out_ports) {
            Ok(ret) => ret,
            Err(source) => {
                return Err(RunError::WorkFailed {
                    block: name.to_string(),
                    source,
                });
            }
        };
        let terminal = matches!(ret, WorkReturn::Done);
        let uniform = match ret {
            WorkReturn::Items(n) => Some(n),
            _ => None,
        };

        // ── 4. Audit the accounting ──────────────────────────────
        let mut contract_err: Option<String> = None;

        if let Some(n) = uniform {
            if n > candidate {
                contract_err = Some(format!(
                    "returned {} items with noutput_items = {}",
                    n, candidate
                ));
            } else if out_ports.iter().any(|p| p.produced().is_some()) {
                contract_err =
                    Some("returned an item count but also called produce()".to_string());
            }
        }
        for (i, port) in in_ports.iter().enumerate() {
            match port.consumed() {
                None if !terminal && contract_err.is_none() => {
                    contract_err = Some(format!(
                        "input {} was never consumed (declare consume(0) for none)",
                        i
                    ));
                }
                Some(c) if c > navails[i] && contract_err.is_none() => {
                    contract_err = Some(format!(
                        "consumed {} items on input {} with only {} available",
                        c, i, navails[i]
                    ));
                }
                _ => {}
            }
        }

        // ── 5. Tag propagation ───────────────────────────────────
        if contract_err.is_none()
            && !in_ports.is_empty()
            && !out_ports.is_empty()
            && !out_ports.iter().any(|p| p.has_user_tags())
        {
            for port in out_ports.iter_mut() {
                port.begin_propagation();
            }
            block.propagate_tags(&in_ports, &mut out_ports);
        }

        // ── 6. Extract accounting, release the ports ─────────────
        let consumed: Vec<usize> = in_ports
            .iter()
            .map(|p| p.consumed().unwrap_or(0))
            .collect();
        drop(in_ports);
        let accounting: Vec<(Option<usize>, Vec<(Tag, bool)>)> =
            out_ports.into_iter().map(|p| p.into_accounting()).collect();
        let produced: Vec<usize> = accounting
            .iter()
            .map(|(per_port, _)| uniform.unwrap_or(per_port.unwrap_or(0)))
            .collect();

        if contract_err.is_none() {
            if let Some(j) = produced.iter().position(|&n| n > candidate) {
                contract_err = Some(format!(
                    "output {} produced {} items with noutput_items = {}",
                    j, produced[j], candidate
                ));
            }
        }

        // ── 7. Validate tags, flush, publish cursors ─────────────
        if contract_err.is_none() {
            'tags: for (j, (_, tags)) in accounting.iter().enumerate() {
                let written = detail.outputs[j].nitems_written();
                let end = written + produced[j] as u64;
                for (tag, user) in tags {
                    if *user && (tag.offset < written || tag.offset >= end) {
                        contract_err = Some(format!(
                            "tag at offset {} outside produced range [{}, {}) on output {}",
                            tag.offset, written, end, j
                        ));
                        break 'tags;
                    }
                }
            }
        }

        if let Some(reason) = contract_err {
            return Err(RunError::ContractViolation {
                block: name.to_string(),
                reason,
            });
        }

        for (j, (_, tags)) in accounting.into_iter().enumerate() {
            let writer = &mut detail.outputs[j];
            let written = writer.nitems_written();
            for (mut tag, user) in tags {
                // Propagated tags may reference items still to come, but
                // never ones already published.
                if !user && tag.offset < written {
                    tag.offset = written;
                }
                writer.add_tag(tag);
            }
            writer.produce(produced[j]);
        }
        for (i, reader) in detail.inputs.iter().enumerate() {
            reader.consume(consumed[i]);
        }

        // ── 8. End-of-stream and progress ────────────────────────
        if terminal {
            debug!("[{}] work done", name);
            break 'driver;
        }
        let progressed =
            produced.iter().any(|&n| n > 0) || consumed.iter().any(|&n| n > 0);
        if !progressed {
            if !detail.inputs.is_empty() && detail.inputs.iter().all(|r| r.is_done()) {
                // Residual fully absorbed (trailing history, partial
                // multiples): nothing more will ever arrive.
                break 'driver;
            }
            // Avoid spinning when the block declined to make progress.
            if let Some(first) = detail.inputs.first() {
                first.wait_for_items(first.items_available() + 1, stop);
            } else {
                thread::sleep(IDLE_SLICE);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Head, Identity, NullSink, VectorSink, VectorSource};
    use crate::runtime::errors::{WorkError, WorkResult};
    use crate::runtime::graph::FlowGraph;
    use crate::runtime::signature::StreamSignature;
    use crate::runtime::tag::TagValue;

    #[test]
    fn test_straight_pipe_source_to_sink() {
        let data: Vec<u32> = (0..1000).collect();
        let source = VectorSource::new(data.clone());
        let sink = VectorSink::<u32>::new();
        let store = sink.store();

        let mut graph = FlowGraph::new();
        graph.add_block("src", source).unwrap();
        graph.add_block("snk", sink).unwrap();
        graph.connect("src", 0, "snk", 0).unwrap();
        graph.run().unwrap();

        assert_eq!(store.items(), data);
    }

    #[test]
    fn test_identity_preserves_stream_and_counts() {
        let data: Vec<f32> = (0..257).map(|i| i as f32 * 0.5).collect();
        let sink = VectorSink::<f32>::new();
        let store = sink.store();

        let mut graph = FlowGraph::new();
        graph.add_block("src", VectorSource::new(data.clone())).unwrap();
        graph.add_block("id", Identity::<f32>::new()).unwrap();
        graph.add_block("snk", sink).unwrap();
        graph.connect("src", 0, "id", 0).unwrap();
        graph.connect("id", 0, "snk", 0).unwrap();
        graph.run().unwrap();

        assert_eq!(store.items(), data);
    }

    #[test]
    fn test_tag_traversal_through_identity() {
        let data: Vec<u32> = (0..64).collect();
        let source =
            VectorSource::new(data).with_tag(10, "burst", TagValue::Int(1));
        let sink = VectorSink::<u32>::new();
        let store = sink.store();

        let mut graph = FlowGraph::new();
        graph.add_block("src", source).unwrap();
        graph.add_block("id", Identity::<u32>::new()).unwrap();
        graph.add_block("snk", sink).unwrap();
        graph.connect("src", 0, "id", 0).unwrap();
        graph.connect("id", 0, "snk", 0).unwrap();
        graph.run().unwrap();

        let tags = store.tags();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].offset, 10);
        assert_eq!(tags[0].key, "burst".into());
        assert_eq!(tags[0].value, TagValue::Int(1));
    }

    #[test]
    fn test_head_truncates_and_terminates() {
        // An endless-ish source upstream: Head must cut the run short.
        let data: Vec<u32> = (0..100_000).collect();
        let sink = VectorSink::<u32>::new();
        let store = sink.store();

        let mut graph = FlowGraph::new();
        graph.add_block("src", VectorSource::new(data)).unwrap();
        graph.add_block("head", Head::<u32>::new(100)).unwrap();
        graph.add_block("snk", sink).unwrap();
        graph.connect("src", 0, "head", 0).unwrap();
        graph.connect("head", 0, "snk", 0).unwrap();
        graph.run().unwrap();

        assert_eq!(store.items(), (0..100).collect::<Vec<u32>>());
    }

    /// A two-output block that reports per-output counts through produce()
    /// and returns CalledProduce.
    struct AsymmetricSource {
        rounds: usize,
    }

    impl Block for AsymmetricSource {
        fn name(&self) -> &str {
            "asymmetric_source"
        }

        fn input_signature(&self) -> StreamSignature {
            StreamSignature::null()
        }

        fn output_signature(&self) -> StreamSignature {
            StreamSignature::of_fixed::<u32>(2)
        }

        fn general_work(
            &mut self,
            noutput_items: usize,
            _inputs: &mut [InputPort<'_>],
            outputs: &mut [OutputPort<'_>],
        ) -> WorkResult<WorkReturn> {
            if self.rounds == 0 {
                return Ok(WorkReturn::Done);
            }
            self.rounds -= 1;
            if noutput_items < 7 {
                return Err(WorkError::msg("needs at least 7 output slots"));
            }
            let a = outputs[0].slice_mut::<u32>().unwrap();
            a[..5].copy_from_slice(&[0, 1, 2, 3, 4]);
            let b = outputs[1].slice_mut::<u32>().unwrap();
            b[..7].copy_from_slice(&[10, 11, 12, 13, 14, 15, 16]);
            outputs[0].produce(5);
            outputs[1].produce(7);
            Ok(WorkReturn::CalledProduce)
        }
    }

    #[test]
    fn test_produce_asymmetry() {
        let sink_a = VectorSink::<u32>::new();
        let sink_b = VectorSink::<u32>::new();
        let store_a = sink_a.store();
        let store_b = sink_b.store();

        let mut graph = FlowGraph::new();
        graph
            .add_block("src", AsymmetricSource { rounds: 1 })
            .unwrap();
        graph.add_block("a", sink_a).unwrap();
        graph.add_block("b", sink_b).unwrap();
        graph.connect("src", 0, "a", 0).unwrap();
        graph.connect("src", 1, "b", 0).unwrap();
        graph.run().unwrap();

        assert_eq!(store_a.items(), vec![0, 1, 2, 3, 4]);
        assert_eq!(store_b.items(), vec![10, 11, 12, 13, 14, 15, 16]);
    }

    /// Sink that counts stop invocations so shutdown behavior is checkable.
    struct CountingSink {
        received: std::sync::Arc<parking_lot::Mutex<usize>>,
        stops: std::sync::Arc<parking_lot::Mutex<usize>>,
    }

    impl Block for CountingSink {
        fn name(&self) -> &str {
            "counting_sink"
        }

        fn input_signature(&self) -> StreamSignature {
            StreamSignature::of_fixed::<u32>(1)
        }

        fn output_signature(&self) -> StreamSignature {
            StreamSignature::null()
        }

        fn general_work(
            &mut self,
            _noutput_items: usize,
            inputs: &mut [InputPort<'_>],
            _outputs: &mut [OutputPort<'_>],
        ) -> WorkResult<WorkReturn> {
            let n = inputs[0].items_available();
            *self.received.lock() += n;
            inputs[0].consume(n);
            Ok(WorkReturn::Items(0))
        }

        fn stop(&mut self) -> WorkResult {
            *self.stops.lock() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_graceful_shutdown_after_eos() {
        let received = std::sync::Arc::new(parking_lot::Mutex::new(0usize));
        let stops = std::sync::Arc::new(parking_lot::Mutex::new(0usize));
        let sink = CountingSink {
            received: std::sync::Arc::clone(&received),
            stops: std::sync::Arc::clone(&stops),
        };

        let data: Vec<u32> = (0..1000).collect();
        let mut graph = FlowGraph::new();
        graph.add_block("src", VectorSource::new(data)).unwrap();
        graph.add_block("snk", sink).unwrap();
        graph.connect("src", 0, "snk", 0).unwrap();
        graph.run().unwrap();

        assert_eq!(*received.lock(), 1000);
        assert_eq!(*stops.lock(), 1);
    }

    /// A block that forgets its consume obligation.
    struct ForgetfulBlock;

    impl Block for ForgetfulBlock {
        fn name(&self) -> &str {
            "forgetful"
        }

        fn input_signature(&self) -> StreamSignature {
            StreamSignature::of_fixed::<u32>(1)
        }

        fn output_signature(&self) -> StreamSignature {
            StreamSignature::null()
        }

        fn general_work(
            &mut self,
            _noutput_items: usize,
            _inputs: &mut [InputPort<'_>],
            _outputs: &mut [OutputPort<'_>],
        ) -> WorkResult<WorkReturn> {
            Ok(WorkReturn::Items(0))
        }
    }

    #[test]
    fn test_missing_consume_is_contract_violation() {
        let mut graph = FlowGraph::new();
        graph
            .add_block("src", VectorSource::new((0u32..16).collect::<Vec<_>>()))
            .unwrap();
        graph.add_block("bad", ForgetfulBlock).unwrap();
        graph.connect("src", 0, "bad", 0).unwrap();

        let err = graph.run().unwrap_err();
        assert!(matches!(err, RunError::ContractViolation { .. }));
        assert!(err.to_string().contains("forgetful"));
    }

    /// A source whose start hook fails.
    struct FailingStart;

    impl Block for FailingStart {
        fn name(&self) -> &str {
            "failing_start"
        }

        fn input_signature(&self) -> StreamSignature {
            StreamSignature::null()
        }

        fn output_signature(&self) -> StreamSignature {
            StreamSignature::of_fixed::<u32>(1)
        }

        fn start(&mut self) -> WorkResult {
            Err(WorkError::msg("no hardware"))
        }

        fn general_work(
            &mut self,
            _noutput_items: usize,
            _inputs: &mut [InputPort<'_>],
            _outputs: &mut [OutputPort<'_>],
        ) -> WorkResult<WorkReturn> {
            Ok(WorkReturn::Done)
        }
    }

    #[test]
    fn test_start_failure_aborts_run() {
        let mut graph = FlowGraph::new();
        graph.add_block("src", FailingStart).unwrap();
        graph.add_block("snk", NullSink::<u32>::new()).unwrap();
        graph.connect("src", 0, "snk", 0).unwrap();

        let err = graph.run().unwrap_err();
        assert!(matches!(err, RunError::StartFailure { .. }));
    }

    #[test]
    fn test_endless_source_stops_when_downstream_departs() {
        // Head cuts the chain after 1000 items; the endless source must
        // notice its only consumer is gone and wind down rather than
        // producing forever and hanging the run.
        let sink = VectorSink::<u32>::new();
        let store = sink.store();

        let mut graph = FlowGraph::new();
        graph
            .add_block("src", crate::blocks::NullSource::<u32>::new())
            .unwrap();
        graph.add_block("head", Head::<u32>::new(1000)).unwrap();
        graph.add_block("snk", sink).unwrap();
        graph.connect("src", 0, "head", 0).unwrap();
        graph.connect("head", 0, "snk", 0).unwrap();
        graph.run().unwrap();

        assert_eq!(store.items(), vec![0u32; 1000]);
    }

    #[test]
    fn test_explicit_stop_unblocks_running_graph() {
        // A source with no terminator paired with a sink: stop() must wind
        // the graph down.
        let mut graph = FlowGraph::new();
        graph
            .add_block("src", crate::blocks::NullSource::<u32>::new())
            .unwrap();
        graph.add_block("snk", NullSink::<u32>::new()).unwrap();
        graph.connect("src", 0, "snk", 0).unwrap();

        let scheduler = graph.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        scheduler.stop();
        scheduler.wait().unwrap();
    }
}
