//! Scenario driver.
//!
//! Builds one sink and one [`PacedGenerator`] per flow, schedules each
//! flow's start, stop and optional rate change at absolute times, runs the
//! simulator to the configured stop time and then stops every generator.
//! The driver only ever touches a generator through `configure`, `start`,
//! `stop` and `set_rate`.

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{error, info};
use std::cell::RefCell;
use std::collections::HashSet;
use std::net::SocketAddrV4;
use std::rc::Rc;

use super::config::{Config, FlowConfig, SinkSpec, DEFAULT_SINK_PORT};
use super::recorder::{FlowRecorder, FlowStats, TraceLog};
use super::report::{FlowReport, ScenarioReport};
use crate::app::{DataRate, GeneratorConfig, PacedGenerator};
use crate::net::{ErrorModel, MemorySocket, SharedSink, SinkRegistry, SocketKind};
use crate::sim::{Scheduler, SimTime, Simulator};

/// Seed used for loss models when the scenario does not set one.
pub const DEFAULT_SEED: u64 = 12345;

/// Everything a finished run produced.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub report: ScenarioReport,
    /// Present when tracing is enabled
    pub trace: Option<TraceLog>,
}

/// A wired flow kept alive for the duration of the run.
struct FlowHandle {
    name: String,
    kind: SocketKind,
    sink_addr: SocketAddrV4,
    initial_rate: DataRate,
    generator: PacedGenerator,
    sink: SharedSink,
    stats: Rc<RefCell<FlowStats>>,
}

impl FlowHandle {
    fn report(&self) -> FlowReport {
        let stats = self.stats.borrow();
        let sink = self.sink.borrow();
        FlowReport {
            name: self.name.clone(),
            kind: self.kind.to_string(),
            sink: self.sink_addr.to_string(),
            packet_size: self.generator.packet_size(),
            packet_budget: self.generator.packet_budget(),
            initial_rate: self.initial_rate.to_string(),
            final_rate: self.generator.rate().to_string(),
            packets_attempted: self.generator.packets_sent(),
            packets_sent: stats.packets_sent,
            bytes_sent: stats.bytes_sent,
            send_errors: stats.send_errors,
            pacing_halts: stats.pacing_halts,
            rate_changes: stats.rate_changes,
            started_at_s: stats.started_at.map(SimTime::as_secs_f64),
            stopped_at_s: stats.stopped_at.map(SimTime::as_secs_f64),
            budget_exhausted_at_s: stats.budget_exhausted_at.map(SimTime::as_secs_f64),
            start_error: stats.start_error.clone(),
            sink_rx_packets: sink.rx_packets,
            sink_rx_bytes: sink.rx_bytes,
            first_rx_s: sink.first_rx.map(SimTime::as_secs_f64),
            last_rx_s: sink.last_rx.map(SimTime::as_secs_f64),
            goodput_bps: sink.goodput_bps(),
        }
    }
}

pub struct ScenarioDriver {
    name: String,
    config: Config,
}

impl ScenarioDriver {
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the scenario to completion.
    ///
    /// Configuration problems and sink installation failures abort the run.
    /// A flow that fails to start is logged and reported; the other flows
    /// keep running.
    pub fn run(&self) -> Result<ScenarioOutcome> {
        self.config.validate()?;
        let stop_time = self.config.stop_time()?;
        let seed = self.config.general.seed.unwrap_or(DEFAULT_SEED);

        info!(
            "Running scenario '{}': {} flow(s) until {}",
            self.name,
            self.config.flows.len(),
            stop_time
        );

        let mut sim = Simulator::new();
        let registry = Rc::new(SinkRegistry::new());
        let trace = self
            .config
            .trace_enabled()
            .then(|| Rc::new(RefCell::new(TraceLog::new())));

        let sink_addrs = self.assign_sinks()?;
        let mut flows = Vec::with_capacity(self.config.flows.len());
        for (index, (flow, sink_addr)) in self.config.flows.iter().zip(sink_addrs).enumerate() {
            let handle = Self::install_flow(
                &mut sim,
                &registry,
                flow,
                sink_addr,
                seed.wrapping_add(index as u64),
                trace.clone(),
            )?;
            flows.push(handle);
        }

        sim.run_until(stop_time);

        for flow in &flows {
            flow.generator.stop(&mut sim);
        }

        let stats = sim.stats();
        let report = ScenarioReport {
            scenario: self.name.clone(),
            stop_time_s: stop_time.as_secs_f64(),
            events_scheduled: stats.scheduled,
            events_executed: stats.executed,
            events_cancelled: stats.cancelled,
            flows: flows.iter().map(FlowHandle::report).collect(),
        };

        info!("Scenario '{}' complete at {}", self.name, sim.now());

        let trace = trace.map(|log| std::mem::take(&mut *log.borrow_mut()));
        Ok(ScenarioOutcome { report, trace })
    }

    /// Resolve every flow's sink address. Explicit addresses are reserved
    /// first so automatic assignment skips them.
    fn assign_sinks(&self) -> Result<Vec<SocketAddrV4>> {
        let mut allocator = self.config.allocator()?;
        let specs = self
            .config
            .flows
            .iter()
            .map(FlowConfig::sink_spec)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut reserved = HashSet::new();
        for spec in &specs {
            if let SinkSpec::Addr(addr) = spec {
                // Several sinks may share a host on different ports.
                if reserved.insert(*addr.ip()) {
                    allocator.reserve(*addr.ip())?;
                }
            }
        }

        let mut addrs = Vec::with_capacity(specs.len());
        for spec in specs {
            let addr = match spec {
                SinkSpec::Addr(addr) => addr,
                SinkSpec::Auto => SocketAddrV4::new(allocator.allocate()?, DEFAULT_SINK_PORT),
            };
            addrs.push(addr);
        }
        Ok(addrs)
    }

    fn install_flow(
        sim: &mut Simulator,
        registry: &Rc<SinkRegistry>,
        flow: &FlowConfig,
        sink_addr: SocketAddrV4,
        seed: u64,
        trace: Option<Rc<RefCell<TraceLog>>>,
    ) -> Result<FlowHandle> {
        let sink = registry
            .install(sink_addr, flow.kind)
            .wrap_err_with(|| format!("Failed to install sink for flow '{}'", flow.name))?;

        let mut socket = MemorySocket::new(flow.kind, Rc::clone(registry));
        if let Some(loss) = flow.loss.filter(|loss| *loss > 0.0) {
            socket = socket.with_error_model(ErrorModel::new(loss, seed));
        }

        let generator = PacedGenerator::new(flow.name.clone());
        let stats = Rc::new(RefCell::new(FlowStats::default()));
        generator.add_observer(Box::new(FlowRecorder::new(
            flow.name.clone(),
            Rc::clone(&stats),
            trace,
        )));
        generator
            .configure(
                Box::new(socket),
                sink_addr,
                GeneratorConfig::new(flow.packet_size, flow.packet_budget, flow.rate),
            )
            .wrap_err_with(|| format!("Failed to configure flow '{}'", flow.name))?;

        let start = flow.start_time()?;
        {
            let generator = generator.clone();
            let stats = Rc::clone(&stats);
            sim.schedule_at(
                start,
                Box::new(move |sched: &mut dyn Scheduler| {
                    if let Err(e) = generator.start(sched) {
                        error!(
                            "Flow '{}' failed to start at {}: {}",
                            generator.name(),
                            sched.now(),
                            e
                        );
                        stats.borrow_mut().start_error = Some(e.to_string());
                    }
                }),
            );
        }

        if let Some(stop) = flow.stop_time()? {
            let generator = generator.clone();
            sim.schedule_at(
                stop,
                Box::new(move |sched: &mut dyn Scheduler| generator.stop(sched)),
            );
        }

        if let (Some(change), Some(at)) = (&flow.rate_change, flow.rate_change_time()?) {
            let generator = generator.clone();
            let rate = change.rate;
            sim.schedule_at(
                at,
                Box::new(move |sched: &mut dyn Scheduler| {
                    info!(
                        "Flow '{}': rate {} -> {} at {}",
                        generator.name(),
                        generator.rate(),
                        rate,
                        sched.now()
                    );
                    if let Err(e) = generator.set_rate(rate) {
                        error!("Flow '{}' rejected rate change: {}", generator.name(), e);
                    }
                }),
            );
        }

        info!(
            "Flow '{}': {} {} B x {} @ {} -> {}, start {}{}",
            flow.name,
            flow.kind,
            flow.packet_size,
            if flow.packet_budget == 0 {
                "unbounded".to_string()
            } else {
                flow.packet_budget.to_string()
            },
            flow.rate,
            sink_addr,
            start,
            flow.stop
                .as_deref()
                .map(|stop| format!(", stop {}", stop))
                .unwrap_or_default()
        );

        Ok(FlowHandle {
            name: flow.name.clone(),
            kind: flow.kind,
            sink_addr,
            initial_rate: flow.rate,
            generator,
            sink,
            stats,
        })
    }
}
