//! Application related stuff

use clap::Parser;

lazy_static! {
    /// The global application options.
    pub static ref OPTIONS: Options = Options::parse();
}

/// Process-level options. The physics knobs are runtime constants assembled
/// in `main`; these only control where output lands and how chatty the
/// process is.
#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Options {
    /// Directory output files are written to.
    #[arg(
        long = "outdir",
        short = 'o',
        value_name = "DIR",
        default_value = ".",
        help = "Write output files to the given directory."
    )]
    pub out_dir: String,

    /// Suppress all text output other than error messages.
    #[arg(long, help = "Suppress all text output other than error messages.")]
    pub quiet: bool,
}
