use std::io::Write;

use ndarray::{Array4, ArrayView3, ArrayView4, Axis};

use crate::spead::{Packet, NDIM, NPOL, NSAMPS_PER_PACKET};
use crate::{Error, Result};

/// One timestamp's worth of samples for a single antenna/subband.
///
/// Storage is channel major, `[chan][sample][pol][re/im]`, so each packet is a single
/// contiguous copy. Output files are sample major, see [Heap::to_output_order].
#[derive(Debug, Clone)]
pub struct Heap {
    data: Array4<i8>,
    num_packets: usize,
}

impl Heap {
    #[must_use]
    pub fn new(nchan: usize) -> Self {
        Heap {
            data: Array4::zeros((nchan, NSAMPS_PER_PACKET, NPOL, NDIM)),
            num_packets: 0,
        }
    }

    #[must_use]
    pub fn nchan(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Number of packets added since creation or the last reset.
    #[must_use]
    pub fn num_packets(&self) -> usize {
        self.num_packets
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_packets == 0
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }

    /// Copy the packet's samples into the channel given by `heap_offset / payload_size`.
    ///
    /// # Errors
    /// [Error::ChannelIndexOutOfBounds] if the channel does not fit this heap, which means
    /// packets of the same stream disagree on the heap shape.
    pub fn add(&mut self, packet: &Packet) -> Result<()> {
        let channel = packet.channel_index()?;
        let nchan = self.nchan();
        let idx = usize::try_from(channel)
            .ok()
            .filter(|idx| *idx < nchan)
            .ok_or(Error::ChannelIndexOutOfBounds { channel, nchan })?;

        let samples = ArrayView3::from_shape((NSAMPS_PER_PACKET, NPOL, NDIM), &packet.samples[..])?;
        self.data.index_axis_mut(Axis(0), idx).assign(&samples);
        self.num_packets += 1;
        Ok(())
    }

    /// Zero all samples in place.
    pub fn reset(&mut self) {
        self.data.fill(0);
        self.num_packets = 0;
    }

    /// View with the channel and sample axes swapped, `[sample][chan][pol][re/im]`.
    #[must_use]
    pub fn to_output_order(&self) -> ArrayView4<'_, i8> {
        self.data.view().permuted_axes([1, 0, 2, 3])
    }

    /// Bytes in output order.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_output_order().iter().map(|v| *v as u8).collect()
    }

    /// Write the heap in output order.
    ///
    /// # Errors
    /// Any ``std::io::Error`` writing
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}
