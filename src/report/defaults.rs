//! Defaults applied while decoding a report
//!
//! Every optional field of the typed report resolves to one of the values
//! below. A default applies when the field is absent, empty, or (for numeric
//! fields) not numeric; an explicit `0` in the payload is kept as-is.
//!
//! | Field                                   | Default                         |
//! |-----------------------------------------|---------------------------------|
//! | host name                               | `"unknown"`                     |
//! | monit id                                | `"{hostname}-{unix millis}"`    |
//! | incarnation                             | `0`                             |
//! | version, description, control file      | `""`                            |
//! | httpd address / port / ssl              | `"0.0.0.0"` / `2812` / `false`  |
//! | credentials                             | `""`                            |
//! | poll / start delay / uptime             | `120` / `0` / `0`               |
//! | platform strings / numbers              | `""` / `0`                      |
//! | service name                            | `"unknown"`                     |
//! | service codes (type, status, …)         | `0`                             |
//! | service and event collected_sec         | decode time                     |
//! | service and event collected_usec        | `0`                             |
//! | event service                           | `"unknown"`                     |
//! | event codes / message                   | `0` / `""`                      |
//! | service group name                      | `"unknown"`                     |

use chrono::{DateTime, Utc};

pub const HOSTNAME: &str = "unknown";
pub const INCARNATION: i64 = 0;
pub const VERSION: &str = "";
pub const DESCRIPTION: &str = "";
pub const CONTROL_FILE: &str = "";

pub const HTTPD_ADDRESS: &str = "0.0.0.0";
pub const HTTPD_PORT: i64 = 2812;
pub const HTTPD_SSL: bool = false;

pub const USERNAME: &str = "";
pub const PASSWORD: &str = "";

pub const POLL: i64 = 120;
pub const START_DELAY: i64 = 0;
pub const UPTIME: i64 = 0;

pub const PLATFORM_TEXT: &str = "";
pub const PLATFORM_NUMBER: i64 = 0;

pub const SERVICE_NAME: &str = "unknown";
pub const SERVICE_CODE: i64 = 0;
pub const COLLECTED_USEC: i64 = 0;

pub const EVENT_SERVICE: &str = "unknown";
pub const EVENT_CODE: i64 = 0;
pub const EVENT_MESSAGE: &str = "";

pub const GROUP_NAME: &str = "unknown";

/// Identity synthesized for agents that do not send one
pub fn monit_id(hostname: &str, now: DateTime<Utc>) -> String {
    format!("{hostname}-{}", now.timestamp_millis())
}

/// Collection time used when the agent omits one
pub fn collected_sec(now: DateTime<Utc>) -> i64 {
    now.timestamp()
}
