pub mod dispatcher;
pub mod fanout;
pub mod heartbeat;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::ReportDispatcher;
pub use fanout::{DeliveryReport, fan_out};
pub use heartbeat::{HeartbeatScheduler, ping_body};
pub use transport::{DEFAULT_TIMEOUT, HttpTransport, OutboundRequest, Transport};
