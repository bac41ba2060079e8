use std::io::{stdout, Write};
use std::path::Path;

use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use serde::Serialize;
use spead2dada::capture::open_capture;
use spead2dada::{
    stream_to_buffers, FileOutput, ObservationConfig, RingBufferManager, RunSummary, StreamOptions,
};
use tracing::info;

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    input: String,
    config: &'a ObservationConfig,
    options: &'a StreamOptions,
    run: &'a RunSummary,
}

pub fn convert(
    input: &Path,
    output_dir: &Path,
    prefix: Option<String>,
    config: ObservationConfig,
    options: &StreamOptions,
    format: &Format,
) -> Result<()> {
    config.validate().context("invalid observation configuration")?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir {output_dir:?}"))?;

    let frames = open_capture(input).with_context(|| format!("opening capture {input:?}"))?;
    info!("converting {input:?} to {output_dir:?}");

    let manager = RingBufferManager::new(config.clone(), FileOutput::new(output_dir, prefix));
    let run = stream_to_buffers(frames, manager, options).context("converting capture")?;

    let report = Report {
        input: input.to_string_lossy().to_string(),
        config: &config,
        options,
        run: &run,
    };
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &report).context("serializing to json")?;
            writeln!(stdout()).context("writing to stdout")
        }
        Format::Text => {
            let data = render_text(&report).context("serializing summary")?;
            stdout()
                .write_all(data.as_bytes())
                .context("writing to stdout")
        }
    }
}

fn render_text(report: &Report) -> Result<String> {
    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let width = usize::try_from(num).unwrap_or(0);
        format!("{v:>width$}")
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("summary", TEXT_TEMPLATE)
        .context("parsing summary template")?;

    hb.render("summary", report).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ input }}
===============================================================================================
Frames:    {{ run.frames_read }}
Inserted:  {{ run.packets_inserted }}
Discarded: {{ run.packets_discarded }}
Streams:   {{ run.streams.length }}
-----------------------------------------------------------------------------------------------
FENG  SUBBAND  NCHAN   PACKETS  DISCARDED   HEAPS          BYTES  PATH
-----------------------------------------------------------------------------------------------
{{ #each run.streams }}{{ lpad 4 key.feng_id }}  {{ lpad 7 key.frequency }}  {{ lpad 5 nchan }}  {{ lpad 8 stats.packets_inserted }}  {{ lpad 9 stats.packets_discarded }}  {{ lpad 6 stats.heaps_written }}  {{ lpad 13 stats.bytes_written }}  {{ path }}
{{/each }}
";
