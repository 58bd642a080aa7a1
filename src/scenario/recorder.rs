//! Per-flow statistics and the packet trace, collected through
//! [`PacingObserver`] hooks.

use log::info;
use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use crate::app::{DataRate, GeneratorError, GeneratorState, PacingObserver};
use crate::net::{Packet, TransportError};
use crate::sim::SimTime;

/// Counters accumulated over every run of one generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub pacing_halts: u64,
    pub rate_changes: u64,
    pub first_tx: Option<SimTime>,
    pub last_tx: Option<SimTime>,
    pub started_at: Option<SimTime>,
    pub stopped_at: Option<SimTime>,
    pub budget_exhausted_at: Option<SimTime>,
    pub start_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    Start,
    Tx,
    Drop,
    Halt,
    BudgetExhausted,
    Stop,
}

impl TraceEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceEvent::Start => "start",
            TraceEvent::Tx => "tx",
            TraceEvent::Drop => "drop",
            TraceEvent::Halt => "halt",
            TraceEvent::BudgetExhausted => "budget",
            TraceEvent::Stop => "stop",
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub at: SimTime,
    pub flow: String,
    pub event: TraceEvent,
    pub bytes: u32,
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.9}\t{}\t{}\t{}",
            self.at.as_secs_f64(),
            self.flow,
            self.event,
            self.bytes
        )
    }
}

/// Time-ordered trace shared by all flows of a scenario.
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    records: Vec<TraceRecord>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TraceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write tab-separated `time flow event bytes` lines.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "# time\tflow\tevent\tbytes")?;
        for record in &self.records {
            writeln!(writer, "{}", record)?;
        }
        writer.flush()?;
        info!("Wrote {} trace records to {:?}", self.records.len(), path);
        Ok(())
    }
}

/// Observer feeding one flow's [`FlowStats`] and, optionally, the shared trace.
pub struct FlowRecorder {
    flow: String,
    stats: Rc<RefCell<FlowStats>>,
    trace: Option<Rc<RefCell<TraceLog>>>,
}

impl FlowRecorder {
    pub fn new(
        flow: impl Into<String>,
        stats: Rc<RefCell<FlowStats>>,
        trace: Option<Rc<RefCell<TraceLog>>>,
    ) -> Self {
        Self {
            flow: flow.into(),
            stats,
            trace,
        }
    }

    fn trace(&self, at: SimTime, event: TraceEvent, bytes: u32) {
        if let Some(trace) = &self.trace {
            trace.borrow_mut().push(TraceRecord {
                at,
                flow: self.flow.clone(),
                event,
                bytes,
            });
        }
    }
}

impl PacingObserver for FlowRecorder {
    fn on_packet_sent(&mut self, at: SimTime, packet: &Packet) {
        {
            let mut stats = self.stats.borrow_mut();
            stats.packets_sent += 1;
            stats.bytes_sent += u64::from(packet.size);
            stats.first_tx.get_or_insert(at);
            stats.last_tx = Some(at);
        }
        self.trace(at, TraceEvent::Tx, packet.size);
    }

    fn on_send_error(&mut self, at: SimTime, packet: &Packet, _error: &TransportError) {
        self.stats.borrow_mut().send_errors += 1;
        self.trace(at, TraceEvent::Drop, packet.size);
    }

    fn on_pacing_halted(&mut self, at: SimTime, _reason: &GeneratorError) {
        self.stats.borrow_mut().pacing_halts += 1;
        self.trace(at, TraceEvent::Halt, 0);
    }

    fn on_budget_exhausted(&mut self, at: SimTime, _packets_sent: u64) {
        self.stats.borrow_mut().budget_exhausted_at = Some(at);
        self.trace(at, TraceEvent::BudgetExhausted, 0);
    }

    fn on_rate_changed(&mut self, _old: DataRate, _new: DataRate) {
        self.stats.borrow_mut().rate_changes += 1;
    }

    fn on_state_changed(&mut self, at: SimTime, state: GeneratorState) {
        let event = match state {
            GeneratorState::Running => {
                self.stats.borrow_mut().started_at.get_or_insert(at);
                TraceEvent::Start
            }
            GeneratorState::Stopped => {
                self.stats.borrow_mut().stopped_at = Some(at);
                TraceEvent::Stop
            }
        };
        self.trace(at, event, 0);
    }
}
