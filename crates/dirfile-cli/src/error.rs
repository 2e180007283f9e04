use dirfile_core::DirfileError;

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Unknown element type '{name}'. Use one of: uint8, int8, ..., float64, complex128"))]
    UnknownType { name: String },

    #[snafu(display("Unknown field kind '{name}'. Use a keyword such as RAW, LINCOM or CONST"))]
    UnknownKind { name: String },

    #[snafu(display("Invalid sample value '{value}': expected a number"))]
    InvalidValue {
        value: String,
        source: std::num::ParseFloatError,
    },

    #[snafu(display(
        "Failed to open dirfile at {path}. \
         Ensure it exists (see `dirfile create`) and contains a format document."
    ))]
    OpenDirfile {
        path: String,
        #[snafu(source(from(DirfileError, Box::new)))]
        source: Box<DirfileError>,
    },

    #[snafu(display("{action} failed: {source}"))]
    Operation {
        action: String,
        #[snafu(source(from(DirfileError, Box::new)))]
        source: Box<DirfileError>,
    },

    #[snafu(display("Failed to render {what} as JSON"))]
    Render {
        what: String,
        source: serde_json::Error,
    },
}
