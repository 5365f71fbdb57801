// Domain layer: record models and the transport port.

pub mod model;
pub mod ports;

pub use model::{DetailFields, DocumentLink, ProjectDetail, ProjectListing};
pub use ports::{RawResponse, Transport, TransportError};
