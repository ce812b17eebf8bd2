//! Typed layer of the report decoder
//!
//! Maps the element tree produced by [`super::tree`] onto [`Report`]. Field
//! lookups accept the shapes different Monit versions send: identity fields
//! either as attributes of `<monit>` or inside `<server>`, services/events/
//! groups either directly below the root or inside their plural wrapper.

use chrono::{DateTime, Utc};
use tracing::{instrument, trace};

use super::defaults;
use super::tree::{Element, parse_document, transcode};
use super::{
    Credentials, CpuUsage, DecodeError, EventDescriptor, FileDescriptors, FilesystemStats,
    HostDescriptor, HttpdDescriptor, LoadAverage, PlatformDescriptor, PortStatus, ProcessStats,
    ProgramStatus, Report, ServiceDescriptor, ServiceGroupDescriptor, ServiceKind, ServicePayload,
    SystemStats, Usage,
};

const ROOT: &str = "monit";

/// Decode a raw agent payload
///
/// `now` stands in for every timestamp the agent did not send.
#[instrument(skip_all, fields(bytes = payload.len()))]
pub fn decode_report(payload: &[u8], now: DateTime<Utc>) -> Result<Report, DecodeError> {
    let text = transcode(payload)?;
    let root = parse_document(&text)?;

    if root.name != ROOT {
        return Err(DecodeError::UnexpectedRoot(root.name));
    }

    let report = Report {
        host: decode_host(&root, now),
        services: root
            .collect("services", "service")
            .into_iter()
            .map(|service| decode_service(service, now))
            .collect(),
        events: root
            .collect("events", "event")
            .into_iter()
            .map(|event| decode_event(event, now))
            .collect(),
        groups: root
            .collect("servicegroups", "servicegroup")
            .into_iter()
            .map(decode_group)
            .collect(),
    };

    trace!(
        host = %report.host.hostname,
        services = report.services.len(),
        events = report.events.len(),
        groups = report.groups.len(),
        "decoded report"
    );

    Ok(report)
}

fn decode_host(root: &Element, now: DateTime<Utc>) -> HostDescriptor {
    let empty = Element::default();
    let server = root.child("server").unwrap_or(&empty);
    let platform = root.child("platform").unwrap_or(&empty);

    let hostname = text(server, &["localhostname"], defaults::HOSTNAME);

    let monit_id = root
        .text_at(&["id"])
        .or_else(|| server.text_at(&["id"]))
        .map(str::to_string)
        .unwrap_or_else(|| defaults::monit_id(&hostname, now));

    let incarnation = root
        .number_at(&["incarnation"])
        .or_else(|| server.number_at(&["incarnation"]))
        .map(|n| n as i64)
        .unwrap_or(defaults::INCARNATION);

    let version = root
        .text_at(&["version"])
        .or_else(|| server.text_at(&["version"]))
        .unwrap_or(defaults::VERSION)
        .to_string();

    HostDescriptor {
        monit_id,
        incarnation,
        version,
        description: text(server, &["description"], defaults::DESCRIPTION),
        control_file: text(server, &["controlfile"], defaults::CONTROL_FILE),
        httpd: HttpdDescriptor {
            address: text(server, &["httpd", "address"], defaults::HTTPD_ADDRESS),
            port: integer(server, &["httpd", "port"], defaults::HTTPD_PORT),
            ssl: server
                .text_at(&["httpd", "ssl"])
                .map(is_truthy)
                .unwrap_or(defaults::HTTPD_SSL),
        },
        credentials: Credentials {
            username: text(server, &["credentials", "username"], defaults::USERNAME),
            password: text(server, &["credentials", "password"], defaults::PASSWORD),
        },
        poll: integer(server, &["poll"], defaults::POLL),
        start_delay: integer(server, &["startdelay"], defaults::START_DELAY),
        uptime: integer(server, &["uptime"], defaults::UPTIME),
        platform: PlatformDescriptor {
            name: text(platform, &["name"], defaults::PLATFORM_TEXT),
            release: text(platform, &["release"], defaults::PLATFORM_TEXT),
            version: text(platform, &["version"], defaults::PLATFORM_TEXT),
            machine: text(platform, &["machine"], defaults::PLATFORM_TEXT),
            cpu: integer(platform, &["cpu"], defaults::PLATFORM_NUMBER),
            memory: integer(platform, &["memory"], defaults::PLATFORM_NUMBER),
            swap: integer(platform, &["swap"], defaults::PLATFORM_NUMBER),
        },
        hostname,
    }
}

fn decode_service(service: &Element, now: DateTime<Utc>) -> ServiceDescriptor {
    let type_code = integer(service, &["type"], defaults::SERVICE_CODE);
    let kind = ServiceKind::from_code(type_code);

    ServiceDescriptor {
        name: text(service, &["name"], defaults::SERVICE_NAME),
        type_code,
        kind,
        status: integer(service, &["status"], defaults::SERVICE_CODE),
        status_hint: integer(service, &["status_hint"], defaults::SERVICE_CODE),
        monitoring_state: integer(service, &["monitor"], defaults::SERVICE_CODE),
        monitoring_mode: integer(service, &["monitormode"], defaults::SERVICE_CODE),
        on_reboot: integer(service, &["onreboot"], defaults::SERVICE_CODE),
        collected_sec: integer(service, &["collected_sec"], defaults::collected_sec(now)),
        collected_usec: integer(service, &["collected_usec"], defaults::COLLECTED_USEC),
        file_descriptors: service.child("filedescriptors").map(|fds| FileDescriptors {
            allocated: fds.number_at(&["allocated"]),
            unused: fds.number_at(&["unused"]),
            maximum: fds.number_at(&["maximum"]),
        }),
        payload: decode_payload(service, kind),
    }
}

fn decode_payload(service: &Element, kind: ServiceKind) -> ServicePayload {
    if let Some(system) = service.child("system") {
        return ServicePayload::System(SystemStats {
            load: LoadAverage {
                avg01: system.number_at(&["load", "avg01"]),
                avg05: system.number_at(&["load", "avg05"]),
                avg15: system.number_at(&["load", "avg15"]),
            },
            cpu: CpuUsage {
                user: system.number_at(&["cpu", "user"]),
                system: system.number_at(&["cpu", "system"]),
                nice: system.number_at(&["cpu", "nice"]),
                wait: system.number_at(&["cpu", "wait"]),
                hardirq: system.number_at(&["cpu", "hardirq"]),
                softirq: system.number_at(&["cpu", "softirq"]),
                steal: system.number_at(&["cpu", "steal"]),
                guest: system.number_at(&["cpu", "guest"]),
                guestnice: system.number_at(&["cpu", "guestnice"]),
            },
            memory: usage(system, "memory"),
            swap: usage(system, "swap"),
        });
    }

    // Older agents wrap process data in <process>, newer ones put it on the service
    let process = service
        .child("process")
        .or((kind == ServiceKind::Process).then_some(service));
    if let Some(process) = process {
        return ServicePayload::Process(ProcessStats {
            pid: optional_integer(process, &["pid"]),
            ppid: optional_integer(process, &["ppid"]),
            uptime: optional_integer(process, &["uptime"]),
            children: optional_integer(process, &["children"]),
            memory: usage(process, "memory"),
            cpu_percent: process.number_at(&["cpu", "percent"]),
        });
    }

    if let Some(block) = service.child("block") {
        return ServicePayload::Filesystem(FilesystemStats {
            percent: block.number_at(&["percent"]),
            usage: block.number_at(&["usage"]),
            total: block.number_at(&["total"]),
        });
    }

    if let Some(program) = service.child("program") {
        return ServicePayload::Program(ProgramStatus {
            started: optional_integer(program, &["started"]),
            status: optional_integer(program, &["status"]),
            output: program.text_at(&["output"]).map(str::to_string),
        });
    }

    if let Some(port) = service.child("port") {
        return ServicePayload::NetworkPort(PortStatus {
            hostname: port.text_at(&["hostname"]).map(str::to_string),
            port: optional_integer(port, &["portnumber"]),
            protocol: port.text_at(&["protocol"]).map(str::to_string),
            response_time: port.number_at(&["responsetime"]),
        });
    }

    ServicePayload::None
}

fn decode_event(event: &Element, now: DateTime<Utc>) -> EventDescriptor {
    EventDescriptor {
        service: text(event, &["service"], defaults::EVENT_SERVICE),
        service_type: integer(event, &["type"], defaults::EVENT_CODE),
        event_id: integer(event, &["id"], defaults::EVENT_CODE),
        state: integer(event, &["state"], defaults::EVENT_CODE),
        action: integer(event, &["action"], defaults::EVENT_CODE),
        message: text(event, &["message"], defaults::EVENT_MESSAGE),
        collected_sec: integer(event, &["collected_sec"], defaults::collected_sec(now)),
        collected_usec: integer(event, &["collected_usec"], defaults::COLLECTED_USEC),
    }
}

fn decode_group(group: &Element) -> ServiceGroupDescriptor {
    let members = group
        .children("service")
        .filter_map(|member| {
            // <service>nginx</service> or <service name="nginx"/>
            member
                .value
                .as_ref()
                .map(|v| v.as_str())
                .filter(|name| !name.trim().is_empty())
                .or_else(|| member.text_at(&["name"]))
                .map(str::to_string)
        })
        .collect();

    ServiceGroupDescriptor {
        name: text(group, &["name"], defaults::GROUP_NAME),
        members,
    }
}

fn usage(parent: &Element, tag: &str) -> Usage {
    Usage {
        percent: parent.number_at(&[tag, "percent"]),
        kilobyte: parent.number_at(&[tag, "kilobyte"]),
    }
}

fn text(element: &Element, path: &[&str], default: &str) -> String {
    element.text_at(path).unwrap_or(default).to_string()
}

fn integer(element: &Element, path: &[&str], default: i64) -> i64 {
    optional_integer(element, path).unwrap_or(default)
}

fn optional_integer(element: &Element, path: &[&str]) -> Option<i64> {
    element.number_at(path).map(|n| n as i64)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}
