use crate::spead::ItemName;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A fixed-width header or block was truncated. Offsets past this point cannot be trusted.
    #[error("malformed frame: {layer} needs {minimum} bytes, got {actual}")]
    MalformedFrame {
        layer: &'static str,
        actual: usize,
        minimum: usize,
    },

    #[error("packet has no {0} item")]
    MissingItem(ItemName),

    #[error("invalid heap shape: heap_size={heap_size} payload_size={payload_size}")]
    InvalidHeapShape { heap_size: u64, payload_size: u64 },

    /// Packets for the same stream disagree on heap_size/payload_size.
    #[error("channel index {channel} out of bounds for heap with {nchan} channels")]
    ChannelIndexOutOfBounds { channel: u64, nchan: usize },

    #[error("stream feng_id={feng_id} frequency={frequency} is already closed")]
    StreamClosed { feng_id: u64, frequency: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error("rendering DADA header: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("invalid DADA header: {0}")]
    DadaHeader(String),

    #[error(transparent)]
    Capture(#[from] pcap_file::PcapError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
