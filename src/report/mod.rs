//! Typed model of one Monit agent report
//!
//! A report is decoded once, up front, into the structures below. Nothing
//! downstream of [`decode_report`] looks at XML again.
//!
//! ## Layers
//!
//! - [`tree`]: XML syntax → element tree (attribute merging, numeric coercion)
//! - [`decode`]: element tree → [`Report`], applying [`defaults`]
//!
//! ## Service payloads
//!
//! Every service shares a common record ([`ServiceDescriptor`]); what differs
//! per service kind lives in the tagged [`ServicePayload`]. The metric
//! recorder dispatches on that tag through
//! [`ServiceDescriptor::metric_samples`].

pub mod decode;
pub mod defaults;
pub mod tree;

pub use decode::decode_report;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while decoding a payload
///
/// Only syntax-level problems end up here. Missing domain fields are filled
/// from [`defaults`] instead.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    #[error("payload is not valid in its declared encoding")]
    Encoding,

    #[error("payload contains more than one root element")]
    MultipleRoots,

    #[error("payload is empty")]
    EmptyDocument,

    #[error("unexpected root element <{0}>, expected <monit>")]
    UnexpectedRoot(String),
}

/// One complete agent report
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub host: HostDescriptor,
    pub services: Vec<ServiceDescriptor>,
    pub events: Vec<EventDescriptor>,
    pub groups: Vec<ServiceGroupDescriptor>,
}

/// The reporting agent and the machine it runs on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostDescriptor {
    pub hostname: String,
    /// Agent-assigned identity, stable across restarts
    pub monit_id: String,
    /// Restart counter; changes when the agent process restarts
    pub incarnation: i64,
    pub version: String,
    pub description: String,
    pub control_file: String,
    pub httpd: HttpdDescriptor,
    pub credentials: Credentials,
    /// Poll interval in seconds
    pub poll: i64,
    pub start_delay: i64,
    pub uptime: i64,
    pub platform: PlatformDescriptor,
}

/// The agent's advertised embedded HTTP server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpdDescriptor {
    pub address: String,
    pub port: i64,
    pub ssl: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credentials {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformDescriptor {
    pub name: String,
    pub release: String,
    pub version: String,
    pub machine: String,
    pub cpu: i64,
    pub memory: i64,
    pub swap: i64,
}

/// Service kind derived from the Monit type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Filesystem,
    Directory,
    File,
    Process,
    /// Remote host checks (ping, port connections)
    RemoteHost,
    System,
    Fifo,
    Program,
    Network,
    Unknown,
}

impl ServiceKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ServiceKind::Filesystem,
            1 => ServiceKind::Directory,
            2 => ServiceKind::File,
            3 => ServiceKind::Process,
            4 => ServiceKind::RemoteHost,
            5 => ServiceKind::System,
            6 => ServiceKind::Fifo,
            7 => ServiceKind::Program,
            8 => ServiceKind::Network,
            _ => ServiceKind::Unknown,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceKind::Filesystem => "filesystem",
            ServiceKind::Directory => "directory",
            ServiceKind::File => "file",
            ServiceKind::Process => "process",
            ServiceKind::RemoteHost => "remote_host",
            ServiceKind::System => "system",
            ServiceKind::Fifo => "fifo",
            ServiceKind::Program => "program",
            ServiceKind::Network => "network",
            ServiceKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One supervised service as reported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Raw Monit type code (kept verbatim for storage)
    pub type_code: i64,
    pub kind: ServiceKind,
    /// Status bitmask, 0 means ok
    pub status: i64,
    pub status_hint: i64,
    pub monitoring_state: i64,
    pub monitoring_mode: i64,
    pub on_reboot: i64,
    pub collected_sec: i64,
    pub collected_usec: i64,
    pub file_descriptors: Option<FileDescriptors>,
    pub payload: ServicePayload,
}

/// Kind-specific part of a service report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServicePayload {
    System(SystemStats),
    Process(ProcessStats),
    Filesystem(FilesystemStats),
    Program(ProgramStatus),
    NetworkPort(PortStatus),
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemStats {
    pub load: LoadAverage,
    pub cpu: CpuUsage,
    pub memory: Usage,
    pub swap: Usage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadAverage {
    pub avg01: Option<f64>,
    pub avg05: Option<f64>,
    pub avg15: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuUsage {
    pub user: Option<f64>,
    pub system: Option<f64>,
    pub nice: Option<f64>,
    pub wait: Option<f64>,
    pub hardirq: Option<f64>,
    pub softirq: Option<f64>,
    pub steal: Option<f64>,
    pub guest: Option<f64>,
    pub guestnice: Option<f64>,
}

/// Percent + absolute usage pair (memory, swap)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Usage {
    pub percent: Option<f64>,
    pub kilobyte: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessStats {
    pub pid: Option<i64>,
    pub ppid: Option<i64>,
    pub uptime: Option<i64>,
    pub children: Option<i64>,
    pub memory: Usage,
    pub cpu_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilesystemStats {
    pub percent: Option<f64>,
    pub usage: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgramStatus {
    pub started: Option<i64>,
    pub status: Option<i64>,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortStatus {
    pub hostname: Option<String>,
    pub port: Option<i64>,
    pub protocol: Option<String>,
    /// Response time in seconds
    pub response_time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileDescriptors {
    pub allocated: Option<f64>,
    pub unused: Option<f64>,
    pub maximum: Option<f64>,
}

/// One named value a service may emit; `None` when not reported
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    pub name: &'static str,
    pub value: Option<f64>,
}

impl MetricSample {
    const fn new(name: &'static str, value: Option<f64>) -> Self {
        Self { name, value }
    }
}

impl ServiceDescriptor {
    /// Every metric this service can emit, in a fixed order
    ///
    /// The set is exhaustive per payload kind; absent values are kept as
    /// `None` and skipped by the recorder.
    pub fn metric_samples(&self) -> Vec<MetricSample> {
        let mut samples = match &self.payload {
            ServicePayload::System(system) => vec![
                MetricSample::new("load_avg01", system.load.avg01),
                MetricSample::new("load_avg05", system.load.avg05),
                MetricSample::new("load_avg15", system.load.avg15),
                MetricSample::new("cpu_user", system.cpu.user),
                MetricSample::new("cpu_system", system.cpu.system),
                MetricSample::new("cpu_nice", system.cpu.nice),
                MetricSample::new("cpu_wait", system.cpu.wait),
                MetricSample::new("cpu_hardirq", system.cpu.hardirq),
                MetricSample::new("cpu_softirq", system.cpu.softirq),
                MetricSample::new("cpu_steal", system.cpu.steal),
                MetricSample::new("cpu_guest", system.cpu.guest),
                MetricSample::new("cpu_guestnice", system.cpu.guestnice),
                MetricSample::new("memory_percent", system.memory.percent),
                MetricSample::new("memory_kilobyte", system.memory.kilobyte),
                MetricSample::new("swap_percent", system.swap.percent),
                MetricSample::new("swap_kilobyte", system.swap.kilobyte),
            ],
            ServicePayload::Process(process) => vec![
                MetricSample::new("process_memory_percent", process.memory.percent),
                MetricSample::new("process_memory_kilobyte", process.memory.kilobyte),
            ],
            ServicePayload::Filesystem(fs) => vec![
                MetricSample::new("filesystem_percent", fs.percent),
                MetricSample::new("filesystem_usage", fs.usage),
            ],
            ServicePayload::NetworkPort(port) => {
                vec![MetricSample::new("port_responsetime", port.response_time)]
            }
            ServicePayload::Program(_) | ServicePayload::None => Vec::new(),
        };

        if let Some(fds) = &self.file_descriptors {
            samples.extend([
                MetricSample::new("filedescriptors_allocated", fds.allocated),
                MetricSample::new("filedescriptors_unused", fds.unused),
                MetricSample::new("filedescriptors_maximum", fds.maximum),
            ]);
        }

        samples
    }
}

/// A discrete state change reported by the agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDescriptor {
    /// Name of the service the event belongs to
    pub service: String,
    pub service_type: i64,
    pub event_id: i64,
    pub state: i64,
    pub action: i64,
    pub message: String,
    pub collected_sec: i64,
    pub collected_usec: i64,
}

/// A named group of services and its current members
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceGroupDescriptor {
    pub name: String,
    pub members: Vec<String>,
}
