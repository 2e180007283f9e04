//! CLI tool for inspecting and editing dirfiles.

mod error;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dirfile_core::{
    Dirfile, DirfileError, FieldFilter, OpenOptions, SampleRange, Samples,
    entry::{Entry, EntryKind},
    fragment::IncludeOptions,
    types::{Complex, ElementType},
};
use snafu::{OptionExt, ResultExt};
use tracing_subscriber::EnvFilter;

use crate::error::{
    CliResult, InvalidValueSnafu, OpenDirfileSnafu, OperationSnafu, RenderSnafu, UnknownKindSnafu,
    UnknownTypeSnafu,
};

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an empty dirfile (just a root format document)
    Create {
        #[arg(long)]
        dirfile: PathBuf,

        /// Remove everything already in the directory
        #[arg(long, default_value_t = false)]
        truncate: bool,
    },

    /// List field names
    Fields {
        #[arg(long)]
        dirfile: PathBuf,

        /// Only fields of this kind (RAW, LINCOM, CONST, ...)
        #[arg(long)]
        kind: Option<String>,

        /// Include hidden fields
        #[arg(long, default_value_t = false)]
        hidden: bool,

        /// List the meta-fields of this parent instead
        #[arg(long)]
        meta: Option<String>,
    },

    /// Print one field definition as JSON
    Entry {
        #[arg(long)]
        dirfile: PathBuf,

        field: String,
    },

    /// Print samples of a field, one per line
    Get {
        #[arg(long)]
        dirfile: PathBuf,

        field: String,

        #[arg(long = "first-frame", default_value_t = 0)]
        first_frame: i64,

        #[arg(long = "first-sample", default_value_t = 0)]
        first_sample: i64,

        #[arg(long, default_value_t = 1)]
        frames: usize,

        #[arg(long, default_value_t = 0)]
        samples: usize,
    },

    /// Write samples through a field
    Put {
        #[arg(long)]
        dirfile: PathBuf,

        field: String,

        #[arg(long = "first-frame", default_value_t = 0)]
        first_frame: i64,

        #[arg(long = "first-sample", default_value_t = 0)]
        first_sample: i64,

        /// Values to write
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<String>,
    },

    /// Define a raw field
    AddRaw {
        #[arg(long)]
        dirfile: PathBuf,

        field: String,

        /// Element type, e.g. int8, uint16, float64
        #[arg(long = "type")]
        data_type: String,

        #[arg(long, default_value_t = 1)]
        spf: u32,

        /// Fragment to define the field in
        #[arg(long, default_value_t = 0)]
        fragment: usize,
    },

    /// List fragments with their attributes
    Fragments {
        #[arg(long)]
        dirfile: PathBuf,
    },

    /// Include a fragment document below a parent fragment
    Include {
        #[arg(long)]
        dirfile: PathBuf,

        file: PathBuf,

        #[arg(long, default_value_t = 0)]
        parent: usize,

        /// Create the document if it does not exist
        #[arg(long, default_value_t = false)]
        create: bool,

        #[arg(long)]
        namespace: Option<String>,

        #[arg(long, default_value = "")]
        prefix: String,

        #[arg(long, default_value = "")]
        suffix: String,
    },

    /// Detach a fragment and its children
    Uninclude {
        #[arg(long)]
        dirfile: PathBuf,

        index: usize,

        /// Also delete the fragment documents
        #[arg(long, default_value_t = false)]
        delete: bool,
    },
}

#[derive(Debug, Parser)]
#[command(name = "dirfile", version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

fn open(path: &Path, options: OpenOptions) -> CliResult<Dirfile> {
    Dirfile::open(path, options).context(OpenDirfileSnafu {
        path: path.display().to_string(),
    })
}

fn op<T>(action: &str, result: Result<T, DirfileError>) -> CliResult<T> {
    result.context(OperationSnafu { action })
}

fn cmd_create(path: &Path, truncate: bool) -> CliResult<()> {
    let dirfile = open(path, OpenOptions::new().create(true).truncate(truncate))?;
    op("close", dirfile.close())?;
    println!("Created dirfile at {}", path.display());
    Ok(())
}

fn cmd_fields(path: &Path, kind: Option<String>, hidden: bool, meta: Option<String>) -> CliResult<()> {
    let dirfile = open(path, OpenOptions::new())?;
    let mut filter = FieldFilter::new().include_hidden(hidden);
    if let Some(name) = kind {
        let kind = EntryKind::parse_name(&name).context(UnknownKindSnafu { name })?;
        filter = filter.kind(kind);
    }
    if let Some(parent) = meta {
        filter = filter.meta(parent);
    }
    for name in dirfile.field_list(&filter) {
        println!("{name}");
    }
    Ok(())
}

fn cmd_entry(path: &Path, field: &str) -> CliResult<()> {
    let dirfile = open(path, OpenOptions::new())?;
    let entry = op("lookup", dirfile.entry(field))?;
    let json = serde_json::to_string_pretty(&entry).context(RenderSnafu { what: field })?;
    println!("{json}");
    Ok(())
}

fn cmd_get(path: &Path, field: &str, range: SampleRange) -> CliResult<()> {
    let dirfile = open(path, OpenOptions::new())?;
    let native = op("read", dirfile.native_type(field))?;
    if native == ElementType::Text {
        for value in op("read", dirfile.get_text(field, range))? {
            println!("{value}");
        }
    } else if native.is_complex() {
        for c in op("read", dirfile.get_data::<Complex<f64>>(field, range))? {
            println!("{}{:+}i", c.re, c.im);
        }
    } else {
        for value in op("read", dirfile.get_data::<f64>(field, range))? {
            println!("{value}");
        }
    }
    Ok(())
}

fn cmd_put(path: &Path, field: &str, first_frame: i64, first_sample: i64, values: &[String]) -> CliResult<()> {
    let parsed = values
        .iter()
        .map(|v| v.parse::<f64>().context(InvalidValueSnafu { value: v.as_str() }))
        .collect::<CliResult<Vec<f64>>>()?;
    let mut dirfile = open(path, OpenOptions::new().write(true))?;
    let range = SampleRange::new(first_frame, first_sample, 0, parsed.len());
    let written = op("write", dirfile.put_samples(field, range, &Samples::Float64(parsed)))?;
    op("close", dirfile.close())?;
    println!("Wrote {written} samples to {field}");
    Ok(())
}

fn cmd_add_raw(path: &Path, field: &str, data_type: &str, spf: u32, fragment: usize) -> CliResult<()> {
    let ty = ElementType::parse_name(data_type).context(UnknownTypeSnafu { name: data_type })?;
    let mut dirfile = open(path, OpenOptions::new().write(true))?;
    let entry = op("define", Entry::raw(field, ty, spf).map_err(DirfileError::from))?;
    op("add", dirfile.add(entry.in_fragment(fragment)))?;
    op("close", dirfile.close())?;
    println!("Added RAW field {field} ({ty}, spf {spf})");
    Ok(())
}

fn cmd_fragments(path: &Path) -> CliResult<()> {
    let dirfile = open(path, OpenOptions::new())?;
    for (index, fragment) in dirfile.fragments().iter().enumerate() {
        let parent = fragment.parent().map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "{index}\t{}\tparent={parent}\toffset={}\tencoding={}\tprotect={}",
            fragment.file().display(),
            fragment.frame_offset(),
            fragment.encoding(),
            fragment.protection(),
        );
    }
    Ok(())
}

struct IncludeArgs {
    file: PathBuf,
    parent: usize,
    create: bool,
    namespace: Option<String>,
    prefix: String,
    suffix: String,
}

fn cmd_include(path: &Path, args: IncludeArgs) -> CliResult<()> {
    let mut options = if args.create {
        IncludeOptions::create()
    } else {
        IncludeOptions::default()
    };
    if let Some(ns) = args.namespace {
        options = options.namespace(ns);
    }
    options = options.affixes(args.prefix, args.suffix);

    let mut dirfile = open(path, OpenOptions::new().write(true))?;
    let index = op("include", dirfile.include(&args.file, args.parent, options))?;
    op("close", dirfile.close())?;
    println!("Included {} as fragment {index}", args.file.display());
    Ok(())
}

fn cmd_uninclude(path: &Path, index: usize, delete: bool) -> CliResult<()> {
    let mut dirfile = open(path, OpenOptions::new().write(true))?;
    op("uninclude", dirfile.uninclude(index, delete))?;
    op("close", dirfile.close())?;
    println!("Removed fragment {index}");
    Ok(())
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    tracing::debug!(target: "dirfile", command = ?cli.cmd, "dispatching");

    match cli.cmd {
        Command::Create { dirfile, truncate } => cmd_create(&dirfile, truncate),

        Command::Fields {
            dirfile,
            kind,
            hidden,
            meta,
        } => cmd_fields(&dirfile, kind, hidden, meta),

        Command::Entry { dirfile, field } => cmd_entry(&dirfile, &field),

        Command::Get {
            dirfile,
            field,
            first_frame,
            first_sample,
            frames,
            samples,
        } => cmd_get(
            &dirfile,
            &field,
            SampleRange::new(first_frame, first_sample, frames, samples),
        ),

        Command::Put {
            dirfile,
            field,
            first_frame,
            first_sample,
            values,
        } => cmd_put(&dirfile, &field, first_frame, first_sample, &values),

        Command::AddRaw {
            dirfile,
            field,
            data_type,
            spf,
            fragment,
        } => cmd_add_raw(&dirfile, &field, &data_type, spf, fragment),

        Command::Fragments { dirfile } => cmd_fragments(&dirfile),

        Command::Include {
            dirfile,
            file,
            parent,
            create,
            namespace,
            prefix,
            suffix,
        } => cmd_include(
            &dirfile,
            IncludeArgs {
                file,
                parent,
                create,
                namespace,
                prefix,
                suffix,
            },
        ),

        Command::Uninclude {
            dirfile,
            index,
            delete,
        } => cmd_uninclude(&dirfile, index, delete),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
