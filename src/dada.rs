//! DADA file header.
//!
//! A DADA file starts with a fixed [HEADER_LEN] byte ASCII header of `KEY VALUE` lines, padded
//! with NUL bytes, followed immediately by the raw samples.
use std::collections::BTreeMap;

use chrono::DateTime;
use handlebars::Handlebars;
use serde::Serialize;
use tracing::warn;

use crate::config::ObservationConfig;
use crate::spead::{Packet, NBIT, NDIM, NPOL};
use crate::{Error, Result};

/// Size of every DADA header.
pub const HEADER_LEN: usize = 4096;

/// MJD of 1970-01-01T00:00:00Z
const UNIX_EPOCH_MJD: f64 = 40587.0;
const SECS_PER_DAY: f64 = 86400.0;

const TEMPLATE: &str = r"HEADER       DADA                # Distributed aquisition and data analysis
HDR_VERSION  1.0                 # Version of this ASCII header
HDR_SIZE     4096                # Size of the header in bytes
DADA_VERSION 1.0                 # Version of the DADA Software
PIC_VERSION  1.0                 # Version of the PIC FPGA Software

OBS_ID       {{obs_id}}
PRIMARY      unset
SECONDARY    unset
FILE_NAME    unset
FILE_SIZE    {{file_size}}
FILE_NUMBER  0

# time of the rising edge of the first time sample
UTC_START    {{utc_start}}
MJD_START    {{mjd_start}}
OBS_OFFSET   0
OBS_OVERLAP  0

SOURCE       {{source}}
RA           {{ra}}
DEC          {{dec}}

TELESCOPE    {{telescope}}
INSTRUMENT   {{instrument}}
RECEIVER     {{receiver}}
FREQ         {{freq_mhz}}        # centre frequency in MHz
BW           {{bw_mhz}}          # bandwidth in MHz
TSAMP        {{tsamp_us}}        # sampling interval in microseconds
BYTES_PER_SECOND {{bytes_per_second}}

NBIT         {{nbit}}
NDIM         {{ndim}}
NPOL         {{npol}}
NCHAN        {{nchan}}
RESOLUTION   {{resolution}}
DSB          {{dsb}}
# end of header
";

/// Fields rendered into a stream's header.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DadaHeader {
    pub obs_id: String,
    pub file_size: u64,
    /// `YYYY-MM-DD-hh:mm:ss.fffffffff`
    pub utc_start: String,
    pub mjd_start: f64,
    pub source: String,
    pub ra: String,
    pub dec: String,
    pub telescope: String,
    pub instrument: String,
    pub receiver: String,
    pub freq_mhz: f64,
    pub bw_mhz: f64,
    pub tsamp_us: f64,
    pub bytes_per_second: f64,
    pub nbit: usize,
    pub ndim: usize,
    pub npol: usize,
    pub nchan: usize,
    pub resolution: u32,
    pub dsb: u32,
}

impl Default for DadaHeader {
    fn default() -> Self {
        DadaHeader {
            obs_id: "unset".to_string(),
            file_size: 2_500_000_000,
            utc_start: "unset".to_string(),
            mjd_start: 55555.55555,
            source: "B1937+21".to_string(),
            ra: "00:00:00.00".to_string(),
            dec: "00:00:00.00".to_string(),
            telescope: "MeerKAT".to_string(),
            instrument: "feng".to_string(),
            receiver: "lband".to_string(),
            freq_mhz: 1260.0,
            bw_mhz: 16.0,
            tsamp_us: 0.0625,
            bytes_per_second: 0.0,
            nbit: NBIT,
            ndim: NDIM,
            npol: NPOL,
            nchan: 1,
            resolution: 1,
            dsb: 0,
        }
    }
}

impl DadaHeader {
    /// Compute the header for the stream `first` belongs to.
    ///
    /// The stream covers `heap_size / payload_size` channels starting at the packet's
    /// `frequency` channel index.
    ///
    /// # Errors
    /// If the packet is missing items or has an invalid heap shape, or the configuration's
    /// sync epoch is not representable.
    pub fn for_stream(config: &ObservationConfig, first: &Packet) -> Result<Self> {
        config.validate()?;
        let nchan = first.channels_per_heap()?;
        let frequency = first.frequency()?;

        let chan_bw = config.channel_bandwidth_mhz();
        let bw_mhz = nchan as f64 * chan_bw;
        let mid_channel = frequency as f64 + (nchan / 2) as f64;
        let freq_mhz = chan_bw * mid_channel + config.centre_freq_mhz - config.bandwidth_mhz / 2.0;
        let (utc_start, mjd_start) = start_time(config.sync_epoch)?;

        let mut header = DadaHeader {
            obs_id: config.obs_id.clone(),
            utc_start,
            mjd_start,
            source: config.source.clone(),
            ra: config.ra.clone(),
            dec: config.dec.clone(),
            telescope: config.telescope.clone(),
            instrument: config.instrument.clone(),
            receiver: config.receiver.clone(),
            freq_mhz,
            bw_mhz,
            tsamp_us: 1.0 / chan_bw,
            nchan,
            ..DadaHeader::default()
        };
        header.bytes_per_second = header.compute_bytes_per_second();
        Ok(header)
    }

    /// `bw * 1e6 * nchan * ndim * npol * nbit / 8`
    #[must_use]
    pub fn compute_bytes_per_second(&self) -> f64 {
        self.bw_mhz * 1e6 * (self.nchan * self.ndim * self.npol * self.nbit) as f64 / 8.0
    }

    /// Render to exactly [HEADER_LEN] bytes, NUL padded. Text past [HEADER_LEN] is dropped.
    ///
    /// # Errors
    /// [Error::Template] if rendering fails.
    pub fn render(&self) -> Result<Vec<u8>> {
        let mut hb = Handlebars::new();
        hb.register_escape_fn(handlebars::no_escape);
        hb.set_strict_mode(true);

        let mut buf = hb.render_template(TEMPLATE, self)?.into_bytes();
        if buf.len() > HEADER_LEN {
            warn!(
                len = buf.len(),
                "rendered DADA header too long; truncating to {HEADER_LEN} bytes"
            );
        }
        buf.resize(HEADER_LEN, 0);
        Ok(buf)
    }
}

/// UTC start string and MJD for a unix time in seconds.
fn start_time(epoch: f64) -> Result<(String, f64)> {
    let mut secs = epoch.floor() as i64;
    let mut nanos = ((epoch - epoch.floor()) * 1e9).round() as u32;
    if nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    let dt = DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| Error::Config(format!("sync epoch {epoch} out of range")))?;

    Ok((
        dt.format("%Y-%m-%d-%H:%M:%S%.9f").to_string(),
        epoch / SECS_PER_DAY + UNIX_EPOCH_MJD,
    ))
}

/// Parse `KEY VALUE` pairs from the first [HEADER_LEN] bytes of a DADA file.
///
/// Comments (`#` to end of line) and blank lines are ignored and parsing stops at the first
/// NUL byte.
///
/// # Errors
/// [Error::DadaHeader] if there are fewer than [HEADER_LEN] bytes, the text is not UTF-8, or
/// the header does not start with `HEADER DADA`.
pub fn parse_header(buf: &[u8]) -> Result<BTreeMap<String, String>> {
    if buf.len() < HEADER_LEN {
        return Err(Error::DadaHeader(format!(
            "need {HEADER_LEN} bytes, got {}",
            buf.len()
        )));
    }
    let text = &buf[..HEADER_LEN];
    let end = text.iter().position(|b| *b == 0).unwrap_or(HEADER_LEN);
    let text = std::str::from_utf8(&text[..end]).map_err(|e| Error::DadaHeader(e.to_string()))?;

    let mut fields = BTreeMap::default();
    for line in text.lines() {
        let line = line.split_once('#').map_or(line, |(head, _)| head).trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        fields.insert(key.to_string(), value.trim().to_string());
    }

    if fields.get("HEADER").map(String::as_str) != Some("DADA") {
        return Err(Error::DadaHeader("missing 'HEADER DADA'".to_string()));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spead::tests::fixture_packet;

    fn config() -> ObservationConfig {
        ObservationConfig::builder()
            .feng_nchan(4096)
            .sync_epoch(1_554_000_000.0)
            .build()
    }

    #[test]
    fn test_for_stream() {
        let packet = fixture_packet(0, 4, 2, 0, 8);
        let header = DadaHeader::for_stream(&config(), &packet).unwrap();

        let chan_bw = 856.0 / 4096.0;
        assert_eq!(header.nchan, 8);
        assert_eq!(header.bw_mhz, 8.0 * chan_bw);
        assert_eq!(header.freq_mhz, chan_bw * 6.0 + 1284.0 - 428.0);
        assert_eq!(header.tsamp_us, 1.0 / chan_bw);
        assert_eq!(header.bytes_per_second, 53_500_000.0);
        assert_eq!(header.utc_start, "2019-03-31-02:40:00.000000000");
        assert!((header.mjd_start - 58573.111_111_111).abs() < 1e-6);
    }

    #[test]
    fn test_start_time_fractional() {
        let (utc, mjd) = start_time(0.25).unwrap();
        assert_eq!(utc, "1970-01-01-00:00:00.250000000");
        assert_eq!(mjd, UNIX_EPOCH_MJD + 0.25 / SECS_PER_DAY);
    }

    #[test]
    fn test_render_and_parse() {
        let packet = fixture_packet(0, 4, 2, 0, 8);
        let header = DadaHeader::for_stream(&config(), &packet).unwrap();
        let buf = header.render().unwrap();

        assert_eq!(buf.len(), HEADER_LEN);
        assert_eq!(*buf.last().unwrap(), 0);

        let fields = parse_header(&buf).unwrap();
        assert_eq!(fields["HDR_SIZE"], "4096");
        assert_eq!(fields["NCHAN"], "8");
        assert_eq!(fields["NBIT"], "8");
        assert_eq!(fields["NDIM"], "2");
        assert_eq!(fields["NPOL"], "2");
        assert_eq!(fields["BW"], "1.671875");
        assert_eq!(fields["BYTES_PER_SECOND"], "53500000.0");
        assert_eq!(fields["UTC_START"], "2019-03-31-02:40:00.000000000");
        assert_eq!(fields["SOURCE"], "B1937+21");
        assert_eq!(fields["TELESCOPE"], "MeerKAT");
        assert_eq!(fields["FILE_SIZE"], "2500000000");
        assert_eq!(fields["FREQ"].parse::<f64>().unwrap(), header.freq_mhz);
    }

    #[test]
    fn test_render_truncates_long_fields() {
        let header = DadaHeader {
            source: "x".repeat(2 * HEADER_LEN),
            ..DadaHeader::default()
        };
        let buf = header.render().unwrap();
        assert_eq!(buf.len(), HEADER_LEN);
        assert!(buf.iter().all(|b| *b != 0));
    }

    #[test]
    fn test_render_len_independent_of_content() {
        for name in ["", "J0437-4715", "a-very-long-observation-identifier-0123456789"] {
            let header = DadaHeader {
                obs_id: name.to_string(),
                ..DadaHeader::default()
            };
            assert_eq!(header.render().unwrap().len(), HEADER_LEN);
        }
    }

    #[test]
    fn test_parse_rejects_short_and_foreign() {
        assert!(matches!(
            parse_header(&[0u8; 100]),
            Err(Error::DadaHeader(_))
        ));
        let mut buf = b"NOT A DADA HEADER\n".to_vec();
        buf.resize(HEADER_LEN, 0);
        assert!(matches!(parse_header(&buf), Err(Error::DadaHeader(_))));
    }
}
